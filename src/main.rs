//! citebib - write the bibliography of every work citing a set of papers

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use citebib::utils::logging::{default_log_dir, init_logging};
use citebib::{CitationPipeline, CitationsConfig, Result};

#[derive(Parser, Debug)]
#[command(name = "citebib")]
#[command(about = "Collect the citing works of seed papers into one BibTeX file")]
struct Args {
    /// JSON config file; command-line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed bibcode (can be specified multiple times)
    #[arg(short, long = "seed", value_name = "BIBCODE")]
    seeds: Vec<String>,

    /// Bibliography file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// ADS API token
    #[arg(long, env = "ADS_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Deadline for the whole run, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Also write daily log files to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write daily log files to the default log directory
    #[arg(long, conflicts_with = "log_dir")]
    log_file: bool,
}

impl Args {
    fn into_config(self) -> Result<CitationsConfig> {
        let mut config = match &self.config {
            Some(path) => CitationsConfig::load(path)?,
            None => CitationsConfig::default(),
        };

        if !self.seeds.is_empty() {
            config.seeds = self.seeds;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if self.token.is_some() {
            config.token = self.token;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_dir = args
        .log_dir
        .clone()
        .or_else(|| if args.log_file { default_log_dir() } else { None });
    let _guard = init_logging(log_dir.as_deref());

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match CitationPipeline::new(config).run().await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to serialize report: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), "Run aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
