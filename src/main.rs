use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use mail_digest::config::{AuthConfig, DEFAULT_CONFIG_PATH};
use mail_digest::digest::{Digest, RunOptions};
use mail_digest::llm::{LlmConfig, create_provider};
use mail_digest::output::DEFAULT_OUTPUT_DIR;
use mail_digest::pipeline::TlsConnector;
use mail_digest::summary::LlmSummarizer;

const AFTER_HELP: &str = "\
Writes two files into the output directory:
  {date}_{days}_{account}[_partial].txt   raw Subject/Sender/Content dump
  {date}_{days}_{account}[_partial].md    categorized Markdown summary

Examples:
  mail-digest icloud                        last day of the 'icloud' account
  mail-digest work --days 7                 last week of 'work'
  mail-digest icloud --filter-name family   only senders in the 'family' group
  mail-digest work --partial                today's mail from 9 AM onwards

The summarizer reads OPENAI_API_KEY (or ANTHROPIC_API_KEY with
MAIL_DIGEST_BACKEND=anthropic); MAIL_DIGEST_MODEL overrides the model.";

/// Summarize recent email from an IMAP account.
#[derive(Debug, Parser)]
#[command(name = "mail-digest", version, after_help = AFTER_HELP)]
struct Cli {
    /// Account name as defined in the config file
    account: String,

    /// Number of days back to fetch
    #[arg(long, default_value_t = 1)]
    days: u32,

    /// Optional filter group name from the account's `filters`
    #[arg(long = "filter-name")]
    filter_name: Option<String>,

    /// Fetch only today's emails sent after 9am (requires --days 1)
    #[arg(long)]
    partial: bool,

    /// Account configuration file
    #[arg(long, env = "MAIL_DIGEST_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for the raw dump and summary
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = RunOptions {
        account: cli.account,
        days: cli.days,
        filter_name: cli.filter_name,
        partial: cli.partial,
    };
    options.validate()?;

    let config = AuthConfig::load(&cli.config)?;

    let llm_config = LlmConfig::from_env()?;
    let llm = create_provider(&llm_config)?;
    let summarizer = Arc::new(LlmSummarizer::new(llm, chrono::Local::now().date_naive()));

    let digest = Digest::new(TlsConnector, summarizer, cli.output_dir);
    let report = digest.run(&config, &options).await?;

    println!("Wrote raw emails to {}", report.paths.raw.display());
    println!("Wrote summary to {}", report.paths.summary.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn crypto_provider_installs_once() {
        assert!(rustls::crypto::ring::default_provider().install_default().is_ok());
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["mail-digest", "icloud"]).unwrap();
        assert_eq!(cli.account, "icloud");
        assert_eq!(cli.days, 1);
        assert!(!cli.partial);
        assert!(cli.filter_name.is_none());
        assert_eq!(cli.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }
}
