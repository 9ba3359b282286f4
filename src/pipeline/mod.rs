//! Email retrieval pipeline.
//!
//! One run moves through:
//! 1. `Connecting`: open and authenticate the mailbox session
//! 2. `Selecting`: read-only inbox select and day-granular SEARCH SINCE
//! 3. `Filtering`: optional same-day time-of-day filter (partial mode)
//! 4. `Fetching`: per-message fetch, sender filter and MIME decode
//! 5. `Disconnected`: logout, on success and failure alike

pub mod retrieval;
pub mod selector;

pub use retrieval::{Artifact, FetchOutcome, MessageRecord, NO_EMAILS, SkipReason, build_artifact};
pub use selector::{
    filter_same_day_after, search_cutoff, select_candidates, select_candidates_since,
    threshold_today,
};

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use tracing::info;

use crate::config::AccountConfig;
use crate::error::ImapError;
use crate::imap::{ImapSession, Mailbox, SessionGuard, TlsStream, connect_tls};

/// Opens an authenticated mailbox session for an account.
///
/// The seam that lets runs go against an in-memory mailbox in tests.
pub trait Connector: Send + Sync + 'static {
    type Mailbox: Mailbox;

    fn connect(&self, account: &AccountConfig) -> Result<Self::Mailbox, ImapError>;
}

/// Connects over implicit TLS and logs in with LOGIN.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector;

impl Connector for TlsConnector {
    type Mailbox = ImapSession<TlsStream>;

    fn connect(&self, account: &AccountConfig) -> Result<Self::Mailbox, ImapError> {
        let mut session = connect_tls(&account.server, account.port)?;
        session.login(&account.username, &account.password)?;
        Ok(session)
    }
}

/// What to collect once connected.
#[derive(Debug, Clone)]
pub struct Selection {
    /// First day passed to SEARCH SINCE.
    pub since: NaiveDate,
    /// Same-day lower bound for partial mode.
    pub threshold: Option<DateTime<FixedOffset>>,
    /// Allowed sender suffixes; empty keeps everyone.
    pub allowed_suffixes: Vec<String>,
}

impl Selection {
    /// Everything received in the last `lookback_days` days as of `now`.
    ///
    /// `None` when the window starts before the earliest representable date.
    pub fn lookback<Tz: TimeZone>(now: &DateTime<Tz>, lookback_days: u32) -> Option<Self> {
        Some(Self {
            since: search_cutoff(now, lookback_days)?,
            threshold: None,
            allowed_suffixes: Vec::new(),
        })
    }

    pub fn with_threshold(mut self, threshold: DateTime<FixedOffset>) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_allowed_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.allowed_suffixes = suffixes;
        self
    }
}

/// Run selection and retrieval on an open mailbox, logging out afterwards.
pub fn collect<M: Mailbox>(mailbox: M, selection: &Selection) -> Result<Artifact, ImapError> {
    let mut session = SessionGuard::new(mailbox);

    let mut ids = select_candidates_since(&mut *session, selection.since)?;
    if let Some(threshold) = selection.threshold {
        ids = filter_same_day_after(&mut *session, &ids, threshold)?;
    }

    info!(count = ids.len(), "Fetching messages");
    build_artifact(&ids, &mut *session, &selection.allowed_suffixes)
}

/// Connect with `connector` and collect the artifact for one account.
pub fn retrieve<C: Connector>(
    connector: &C,
    account: &AccountConfig,
    selection: &Selection,
) -> Result<Artifact, ImapError> {
    info!(server = %account.server, user = %account.username, "Connecting to mailbox");
    let mailbox = connector.connect(account)?;
    collect(mailbox, selection)
}
