//! Mailbox access.
//!
//! The [`Mailbox`] trait is the narrow set of read-only operations one digest
//! run needs. [`ImapSession`] implements it over a blocking TLS stream; tests
//! implement it in memory.

pub mod session;

pub use session::{ImapSession, TlsStream, connect_tls};

use std::fmt;
use std::ops::{Deref, DerefMut};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::ImapError;

/// Server-assigned message sequence number within the selected folder.
///
/// Only valid for the lifetime of one folder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only mailbox operations used by the retrieval pipeline.
///
/// Fetch methods return `Ok(None)` when the server answers without content;
/// callers treat that as a skippable absence rather than a failure.
pub trait Mailbox {
    /// Select the inbox without allowing flag changes.
    fn select_inbox_readonly(&mut self) -> Result<(), ImapError>;

    /// Identifiers of messages received on or after `since` (day granularity).
    fn search_since(&mut self, since: NaiveDate) -> Result<Vec<MessageId>, ImapError>;

    /// Raw header block containing only the `Date` field.
    fn fetch_date_header(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError>;

    /// Raw RFC 5322 message.
    fn fetch_message(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError>;

    /// End the session.
    fn logout(&mut self) -> Result<(), ImapError>;
}

impl<M: Mailbox + ?Sized> Mailbox for &mut M {
    fn select_inbox_readonly(&mut self) -> Result<(), ImapError> {
        (**self).select_inbox_readonly()
    }

    fn search_since(&mut self, since: NaiveDate) -> Result<Vec<MessageId>, ImapError> {
        (**self).search_since(since)
    }

    fn fetch_date_header(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
        (**self).fetch_date_header(id)
    }

    fn fetch_message(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
        (**self).fetch_message(id)
    }

    fn logout(&mut self) -> Result<(), ImapError> {
        (**self).logout()
    }
}

/// Owns a logged-in mailbox and logs it out when dropped.
///
/// Logout runs on every exit path: normal return, early `?` return, or
/// unwinding. A failed logout is only logged.
pub struct SessionGuard<M: Mailbox> {
    mailbox: M,
}

impl<M: Mailbox> SessionGuard<M> {
    pub fn new(mailbox: M) -> Self {
        Self { mailbox }
    }
}

impl<M: Mailbox> Deref for SessionGuard<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.mailbox
    }
}

impl<M: Mailbox> DerefMut for SessionGuard<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.mailbox
    }
}

impl<M: Mailbox> Drop for SessionGuard<M> {
    fn drop(&mut self) {
        match self.mailbox.logout() {
            Ok(()) => debug!("Mailbox session closed"),
            Err(e) => warn!(error = %e, "Mailbox logout failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingMailbox {
        logouts: usize,
        fail_logout: bool,
    }

    impl Mailbox for CountingMailbox {
        fn select_inbox_readonly(&mut self) -> Result<(), ImapError> {
            Err(ImapError::ConnectionClosed)
        }

        fn search_since(&mut self, _since: NaiveDate) -> Result<Vec<MessageId>, ImapError> {
            Ok(vec![])
        }

        fn fetch_date_header(&mut self, _id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
            Ok(None)
        }

        fn fetch_message(&mut self, _id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
            Ok(None)
        }

        fn logout(&mut self) -> Result<(), ImapError> {
            self.logouts += 1;
            if self.fail_logout {
                Err(ImapError::ConnectionClosed)
            } else {
                Ok(())
            }
        }
    }

    fn select_through(mailbox: &mut CountingMailbox) -> Result<(), ImapError> {
        let mut guard = SessionGuard::new(mailbox);
        guard.select_inbox_readonly()?;
        Ok(())
    }

    #[test]
    fn guard_logs_out_on_error_path() {
        let mut mailbox = CountingMailbox::default();
        assert!(select_through(&mut mailbox).is_err());
        assert_eq!(mailbox.logouts, 1);
    }

    #[test]
    fn guard_logs_out_on_success_path() {
        let mut mailbox = CountingMailbox::default();
        {
            let mut guard = SessionGuard::new(&mut mailbox);
            assert!(guard.search_since(NaiveDate::MIN).unwrap().is_empty());
        }
        assert_eq!(mailbox.logouts, 1);
    }

    #[test]
    fn guard_swallows_logout_failure() {
        let mut mailbox = CountingMailbox {
            fail_logout: true,
            ..Default::default()
        };
        drop(SessionGuard::new(&mut mailbox));
        assert_eq!(mailbox.logouts, 1);
    }

    #[test]
    fn message_id_display() {
        assert_eq!(MessageId(42).to_string(), "42");
    }
}
