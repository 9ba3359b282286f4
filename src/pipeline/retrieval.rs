//! Per-message fetch, filter and decode, folded into one text artifact.

use std::fmt;

use mail_parser::{HeaderName, MessageParser};
use tracing::{debug, info};

use crate::error::ImapError;
use crate::imap::{Mailbox, MessageId};
use crate::mail::mime::{decode_header_first, extract_content, raw_header};
use crate::mail::sender::{extract_address, is_allowed};

/// Placeholder written when no message qualified.
pub const NO_EMAILS: &str = "No emails processed.\n";

/// Decoded fields of one message, ready to be appended to the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Subject with its first encoded segment decoded.
    pub subject: String,
    /// Raw `From` header.
    pub sender: String,
    /// Bare address taken from `sender`.
    pub sender_address: String,
    /// Plain-text body.
    pub body: String,
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subject: {}\nSender: {}\nContent:\n{}\n\n",
            self.subject, self.sender, self.body
        )
    }
}

/// Why a message did not make it into the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The server returned no content for the identifier.
    EmptyFetch,
    /// The bytes could not be parsed as a message.
    Unparseable,
    /// The sender address matched none of the allowed suffixes.
    SenderNotAllowed { address: String },
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyFetch => "empty fetch",
            Self::Unparseable => "unparseable message",
            Self::SenderNotAllowed { .. } => "sender not allowed",
        }
    }
}

/// Result of handling one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Record(MessageRecord),
    Skipped(SkipReason),
}

/// Decode raw message bytes, applying the sender allow-list.
pub fn decode_record(raw: &[u8], allowed_suffixes: &[String]) -> FetchOutcome {
    let Some(message) = MessageParser::default().parse(raw) else {
        return FetchOutcome::Skipped(SkipReason::Unparseable);
    };

    let subject = decode_header_first(&raw_header(&message, HeaderName::Subject));
    let sender = raw_header(&message, HeaderName::From);
    let sender_address = extract_address(&sender).to_string();

    if !is_allowed(&sender_address, allowed_suffixes) {
        return FetchOutcome::Skipped(SkipReason::SenderNotAllowed {
            address: sender_address,
        });
    }

    FetchOutcome::Record(MessageRecord {
        subject,
        body: extract_content(&message),
        sender,
        sender_address,
    })
}

/// Fetch one message and decode it.
///
/// Only transport failures are errors; everything else is an outcome.
pub fn fetch_record<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    id: MessageId,
    allowed_suffixes: &[String],
) -> Result<FetchOutcome, ImapError> {
    match mailbox.fetch_message(id)? {
        Some(raw) if !raw.is_empty() => Ok(decode_record(&raw, allowed_suffixes)),
        _ => Ok(FetchOutcome::Skipped(SkipReason::EmptyFetch)),
    }
}

/// Concatenated message records, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    text: String,
    records: usize,
    skipped: usize,
}

impl Artifact {
    pub fn push(&mut self, record: &MessageRecord) {
        self.text.push_str(&record.to_string());
        self.records += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Final text, with the placeholder standing in for an empty artifact.
    pub fn into_text(self) -> String {
        if self.text.is_empty() {
            NO_EMAILS.to_string()
        } else {
            self.text
        }
    }
}

/// Fetch every identifier in order and build the artifact.
///
/// A message that is empty, malformed or from a disallowed sender is skipped;
/// the run only stops on a transport failure.
pub fn build_artifact<M: Mailbox + ?Sized>(
    ids: &[MessageId],
    mailbox: &mut M,
    allowed_suffixes: &[String],
) -> Result<Artifact, ImapError> {
    let mut artifact = Artifact::default();
    for &id in ids {
        match fetch_record(mailbox, id, allowed_suffixes)? {
            FetchOutcome::Record(record) => {
                debug!(id = %id, sender = %record.sender_address, "Collected message");
                artifact.push(&record);
            }
            FetchOutcome::Skipped(reason) => {
                debug!(id = %id, reason = reason.label(), "Skipped message");
                artifact.skipped += 1;
            }
        }
    }
    info!(
        records = artifact.records,
        skipped = artifact.skipped,
        bytes = artifact.text.len(),
        "Built email artifact"
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct FixedMailbox {
        messages: HashMap<u32, Vec<u8>>,
    }

    impl Mailbox for FixedMailbox {
        fn select_inbox_readonly(&mut self) -> Result<(), ImapError> {
            Ok(())
        }

        fn search_since(&mut self, _since: NaiveDate) -> Result<Vec<MessageId>, ImapError> {
            Ok(vec![])
        }

        fn fetch_date_header(&mut self, _id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
            Ok(None)
        }

        fn fetch_message(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
            if id.0 == 99 {
                return Err(ImapError::ConnectionClosed);
            }
            Ok(self.messages.get(&id.0).cloned())
        }

        fn logout(&mut self) -> Result<(), ImapError> {
            Ok(())
        }
    }

    fn raw(from: &str, subject: &str, body: &str) -> Vec<u8> {
        format!("From: {from}\r\nSubject: {subject}\r\n\r\n{body}").into_bytes()
    }

    #[test]
    fn record_format() {
        let record = MessageRecord {
            subject: "Hi".into(),
            sender: "Boss <boss@work.com>".into(),
            sender_address: "boss@work.com".into(),
            body: "Body text".into(),
        };
        assert_eq!(
            record.to_string(),
            "Subject: Hi\nSender: Boss <boss@work.com>\nContent:\nBody text\n\n"
        );
    }

    #[test]
    fn decode_record_fields() {
        let outcome = decode_record(
            &raw("Boss <boss@work.com>", "=?utf-8?q?R=C3=A9union?=", "See you"),
            &[],
        );
        let FetchOutcome::Record(record) = outcome else {
            panic!("expected a record");
        };
        assert_eq!(record.subject, "Réunion");
        assert_eq!(record.sender, "Boss <boss@work.com>");
        assert_eq!(record.sender_address, "boss@work.com");
        assert_eq!(record.body, "See you");
    }

    #[test]
    fn decode_record_rejects_sender() {
        let outcome = decode_record(
            &raw("ads@shop.com", "Sale", "50% off"),
            &["work.com".to_string()],
        );
        assert_eq!(
            outcome,
            FetchOutcome::Skipped(SkipReason::SenderNotAllowed {
                address: "ads@shop.com".into()
            })
        );
    }

    #[test]
    fn missing_headers_become_empty_fields() {
        let FetchOutcome::Record(record) = decode_record(b"X-Other: 1\r\n\r\nbody", &[]) else {
            panic!("expected a record");
        };
        assert_eq!(record.subject, "");
        assert_eq!(record.sender, "");
        assert_eq!(record.body, "body");
    }

    #[test]
    fn bytes_without_header_block_are_unparseable() {
        assert_eq!(
            decode_record(b"just some text without headers\r\n", &[]),
            FetchOutcome::Skipped(SkipReason::Unparseable)
        );
    }

    #[test]
    fn build_artifact_keeps_order_and_skips() {
        let mut mailbox = FixedMailbox {
            messages: HashMap::from([
                (1, raw("a@work.com", "First", "one")),
                (2, raw("b@shop.com", "Ad", "buy")),
                (4, Vec::new()),
                (5, raw("c@work.com", "Second", "two")),
            ]),
        };
        let ids = [1, 2, 3, 4, 5].map(MessageId);
        let artifact = build_artifact(&ids, &mut mailbox, &["work.com".to_string()]).unwrap();

        assert_eq!(artifact.records(), 2);
        assert_eq!(artifact.skipped(), 3);
        assert_eq!(
            artifact.text(),
            "Subject: First\nSender: a@work.com\nContent:\none\n\n\
             Subject: Second\nSender: c@work.com\nContent:\ntwo\n\n"
        );
    }

    #[test]
    fn empty_artifact_becomes_placeholder() {
        let artifact = Artifact::default();
        assert!(artifact.is_empty());
        assert_eq!(artifact.into_text(), NO_EMAILS);
    }

    #[test]
    fn transport_failure_aborts() {
        let mut mailbox = FixedMailbox {
            messages: HashMap::from([(1, raw("a@work.com", "First", "one"))]),
        };
        let ids = [MessageId(1), MessageId(99)];
        assert!(matches!(
            build_artifact(&ids, &mut mailbox, &[]),
            Err(ImapError::ConnectionClosed)
        ));
    }
}
