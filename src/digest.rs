//! One end-to-end digest run: mailbox → raw dump → summary.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::info;

use crate::config::AuthConfig;
use crate::error::{ConfigError, Error, Result};
use crate::output::OutputPaths;
use crate::pipeline::{Connector, Selection, retrieve, threshold_today};
use crate::summary::Summarizer;

/// Partial mode keeps today's messages from this hour onwards.
pub const PARTIAL_AFTER_HOUR: u32 = 9;

/// Parameters for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub account: String,
    pub days: u32,
    pub filter_name: Option<String>,
    pub partial: bool,
}

impl RunOptions {
    /// Reject parameter combinations before anything touches the network.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.partial && self.days != 1 {
            return Err(ConfigError::InvalidValue {
                key: "partial".to_string(),
                message: "--partial can only be used with --days 1".to_string(),
            });
        }
        Ok(())
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct DigestReport {
    pub paths: OutputPaths,
    pub records: usize,
    pub skipped: usize,
}

/// Wires a mailbox connector and a summarizer to the output directory.
pub struct Digest<C: Connector> {
    connector: Arc<C>,
    summarizer: Arc<dyn Summarizer>,
    output_dir: PathBuf,
}

impl<C: Connector> Digest<C> {
    pub fn new(connector: C, summarizer: Arc<dyn Summarizer>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            connector: Arc::new(connector),
            summarizer,
            output_dir: output_dir.into(),
        }
    }

    /// Run against the current local time.
    pub async fn run(&self, config: &AuthConfig, options: &RunOptions) -> Result<DigestReport> {
        self.run_at(config, options, Local::now()).await
    }

    /// Run as if the current local time were `now`.
    ///
    /// The raw dump is written before summarizing, so it survives a
    /// summarizer failure; the Markdown file only appears on success.
    pub async fn run_at(
        &self,
        config: &AuthConfig,
        options: &RunOptions,
        now: DateTime<Local>,
    ) -> Result<DigestReport> {
        options.validate()?;

        let account = config.account(&options.account)?.clone();
        let allowed = match &options.filter_name {
            Some(name) => account.filter(&options.account, name)?.to_vec(),
            None => Vec::new(),
        };

        let mut selection = Selection::lookback(&now, options.days)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "days".to_string(),
                message: format!("a lookback of {} days is out of range", options.days),
            })?
            .with_allowed_suffixes(allowed);
        if options.partial {
            let threshold =
                threshold_today(now, PARTIAL_AFTER_HOUR).ok_or_else(|| ConfigError::InvalidValue {
                    key: "partial".to_string(),
                    message: format!("cannot place {PARTIAL_AFTER_HOUR}:00 on today's date"),
                })?;
            selection = selection.with_threshold(threshold);
        }

        let connector = Arc::clone(&self.connector);
        let artifact =
            tokio::task::spawn_blocking(move || retrieve(&*connector, &account, &selection))
                .await
                .map_err(|e| Error::Task(e.to_string()))??;

        let records = artifact.records();
        let skipped = artifact.skipped();
        let text = artifact.into_text();

        let paths = OutputPaths::new(
            &self.output_dir,
            now.date_naive(),
            options.days,
            &options.account,
            options.partial,
        );
        paths.write_raw(&text)?;
        info!(path = %paths.raw.display(), records, skipped, "Wrote raw emails");

        let summary = self.summarizer.summarize(&text).await?;
        paths.write_summary(&summary)?;
        info!(path = %paths.summary.display(), "Wrote summary");

        Ok(DigestReport {
            paths,
            records,
            skipped,
        })
    }
}
