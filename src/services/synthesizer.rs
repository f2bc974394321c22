//! Assembly and persistence of the bibliography file

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{CitationError, Result};
use crate::models::BibliographicEntry;

/// Joins entries into one document and writes it in place of the old one
pub struct BibliographySynthesizer;

impl BibliographySynthesizer {
    /// The document text: entries in order, one blank line between them
    ///
    /// Fails if two entries declare the same entry key.
    pub fn render(entries: &[BibliographicEntry]) -> Result<String> {
        check_unique_keys(entries)?;

        let mut document = entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !document.is_empty() {
            document.push('\n');
        }
        Ok(document)
    }

    /// Render and atomically replace the file at `path`
    ///
    /// Returns the number of entries written. On any failure the previous
    /// file, if there was one, is left as it was.
    pub fn write(entries: &[BibliographicEntry], path: &Path) -> Result<usize> {
        let document = Self::render(entries)?;
        persist_atomically(path, |file| file.write_all(document.as_bytes()))?;

        info!("Wrote {} entries to {}", entries.len(), path.display());
        Ok(entries.len())
    }
}

/// Every entry key must be declared once across all entries
///
/// BibTeX tools match keys without regard to case, so `Foo` and `foo` collide.
pub fn check_unique_keys(entries: &[BibliographicEntry]) -> Result<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();

    for entry in entries {
        for key in entry.keys() {
            let folded = key.to_ascii_lowercase();
            if let Some(first) = owners.insert(folded, entry.identifier.as_str()) {
                return Err(CitationError::DuplicateEntryKey {
                    key,
                    first: first.to_string(),
                    second: entry.identifier.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Fill a temporary file next to `path`, then rename it over `path`
///
/// The temporary file is removed if `fill` or the rename fails.
pub(crate) fn persist_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CitationError::Io(e.error))?;
    Ok(())
}
