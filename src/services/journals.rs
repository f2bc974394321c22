//! Journal macro expansion
//!
//! ADS exports journal names as LaTeX macros (`journal = {\prd}`) that only
//! compile with the AASTeX macro definitions. They are replaced by the
//! names from the official ADS list.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static JOURNAL_MACRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\\(\w+)\}").expect("valid journal macro pattern"));

static JOURNAL_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("aj", "AJ"),
        ("actaa", "Acta Astron."),
        ("araa", r"ARA\&A"),
        ("apj", "ApJ"),
        ("apjl", "ApJ"),
        ("apjlett", "ApJ"),
        ("apjs", "ApJS"),
        ("apjsupp", "ApJS"),
        ("ao", "Appl.~Opt."),
        ("applopt", "Appl.~Opt."),
        ("apss", r"Ap\&SS"),
        ("aap", r"A\&A"),
        ("astap", r"A\&A"),
        ("aapr", r"A\&A~Rev."),
        ("aaps", r"A\&AS"),
        ("azh", "AZh"),
        ("baas", "BAAS"),
        ("bac", "Bull. astr. Inst. Czechosl."),
        ("caa", "Chinese Astron. Astrophys."),
        ("cjaa", "Chinese J. Astron. Astrophys"),
        ("icarus", "Icarus"),
        ("jcap", "J. Cosmology Astropart. Phys."),
        ("jrasc", "JRASC"),
        ("memras", "MmRAS"),
        ("mnras", "MNRAS"),
        ("na", "New A"),
        ("nar", "New A Rev."),
        ("pra", "Phys.~Rev.~A"),
        ("prb", "Phys.~Rev.~B"),
        ("prc", "Phys.~Rev.~C"),
        ("prd", "Phys.~Rev.~D"),
        ("pre", "Phys.~Rev.~E"),
        ("prl", "Phys.~Rev.~Lett."),
        ("pasa", "PASA"),
        ("pasp", "PASP"),
        ("pasj", "PASJ"),
        ("rmxaa", "Rev. Mexicana Astron. Astrofis."),
        ("qjras", "QJRAS"),
        ("skytel", r"S\&T"),
        ("solphys", "Sol.~Phys."),
        ("sovast", "Soviet~Ast."),
        ("ssr", "Space~Sci.~Rev."),
        ("zap", "ZAp"),
        ("nat", "Nature"),
        ("iaucirc", "IAU~Circ."),
        ("aplett", "Astrophys.~Lett."),
        ("apspr", "Astrophys.~Space~Phys.~Res."),
        ("bain", "Bull.~Astron.~Inst.~Netherlands"),
        ("fcp", "Fund.~Cosmic~Phys."),
        ("gca", "Geochim.~Cosmochim.~Acta"),
        ("grl", "Geophys.~Res.~Lett."),
        ("jcp", "J.~Chem.~Phys."),
        ("jgr", "J.~Geophys.~Res."),
        ("jqsrt", "J.~Quant.~Spec.~Radiat.~Transf."),
        ("memsai", "Mem.~Soc.~Astron.~Italiana"),
        ("nphysa", "Nucl.~Phys.~A"),
        ("physrep", "Phys.~Rep."),
        ("physscr", "Phys.~Scr"),
        ("planss", "Planet.~Space~Sci."),
        ("procspie", "Proc.~SPIE"),
    ])
});

/// Replace every `{\macro}` group with the journal name it stands for
///
/// Unknown macros lose their backslash: `{\lol}` becomes `{lol}`.
pub fn expand_journal_macros(bibtex: &str) -> String {
    JOURNAL_MACRO
        .replace_all(bibtex, |caps: &Captures| {
            let name = &caps[1];
            let expanded = JOURNAL_NAMES.get(name).copied().unwrap_or(name);
            format!("{{{}}}", expanded)
        })
        .into_owned()
}
