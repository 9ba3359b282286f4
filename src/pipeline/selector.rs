//! Candidate selection: day-granular server search, then an optional
//! same-day time-of-day filter driven by each message's `Date` header.

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};
use mail_parser::{HeaderName, MessageParser};
use tracing::{debug, info};

use crate::error::ImapError;
use crate::imap::{Mailbox, MessageId};
use crate::mail::mime::raw_header;

/// Zone-less `Date` formats accepted after RFC 2822 parsing fails.
const NAIVE_DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M",
];

/// First calendar day covered by a lookback window, or `None` when the
/// window reaches past the representable calendar.
pub fn search_cutoff<Tz: TimeZone>(now: &DateTime<Tz>, lookback_days: u32) -> Option<NaiveDate> {
    now.clone()
        .checked_sub_signed(Duration::days(i64::from(lookback_days)))
        .map(|cutoff| cutoff.date_naive())
}

/// Select the inbox read-only and list messages received since the cutoff.
///
/// A window older than the calendar itself selects everything.
pub fn select_candidates<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    lookback_days: u32,
) -> Result<Vec<MessageId>, ImapError> {
    let since = search_cutoff(&Local::now(), lookback_days).unwrap_or(NaiveDate::MIN);
    select_candidates_since(mailbox, since)
}

/// Like [`select_candidates`] with an explicit cutoff day.
pub fn select_candidates_since<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    since: NaiveDate,
) -> Result<Vec<MessageId>, ImapError> {
    mailbox.select_inbox_readonly()?;
    let ids = mailbox.search_since(since)?;
    info!(since = %since, count = ids.len(), "Selected candidate messages");
    Ok(ids)
}

/// Today's threshold at `hour:00:00` in the current local offset.
pub fn threshold_today(now: DateTime<Local>, hour: u32) -> Option<DateTime<FixedOffset>> {
    now.fixed_offset()
        .with_hour(hour)?
        .with_minute(0)?
        .with_second(0)?
        .with_nanosecond(0)
}

/// Keep candidates dated on the threshold's day at or after its time.
///
/// Only the `Date` header is fetched per candidate. A missing or unparseable
/// header drops that candidate; a transport failure aborts.
pub fn filter_same_day_after<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    ids: &[MessageId],
    threshold: DateTime<FixedOffset>,
) -> Result<Vec<MessageId>, ImapError> {
    let mut keep = Vec::new();
    for &id in ids {
        let Some(raw) = mailbox.fetch_date_header(id)? else {
            debug!(id = %id, "No Date header returned");
            continue;
        };
        let Some(date) = date_from_header_block(&raw) else {
            debug!(id = %id, "Missing or unparseable Date header");
            continue;
        };
        if same_day_at_or_after(date, threshold) {
            keep.push(id);
        }
    }
    info!(
        threshold = %threshold,
        kept = keep.len(),
        of = ids.len(),
        "Filtered candidates by time of day"
    );
    Ok(keep)
}

/// Whether `date`, seen in the threshold's zone, falls on the threshold's
/// day and not before it.
pub fn same_day_at_or_after(date: DateTime<FixedOffset>, threshold: DateTime<FixedOffset>) -> bool {
    let local = date.with_timezone(&threshold.timezone());
    local.date_naive() == threshold.date_naive() && local >= threshold
}

/// Parse the `Date` field out of a fetched header block.
fn date_from_header_block(raw: &[u8]) -> Option<DateTime<FixedOffset>> {
    let message = MessageParser::default().parse(raw)?;
    let value = raw_header(&message, HeaderName::Date);
    if value.is_empty() {
        return None;
    }
    parse_date_header(&value)
}

/// Parse an RFC 2822 date, assuming the local zone when none is given.
pub fn parse_date_header(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = strip_comment(value.trim());
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date);
    }

    let naive = NAIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|d| d.fixed_offset())
}

/// Drop a trailing `(comment)` such as `(UTC)` or `(PDT)`.
fn strip_comment(value: &str) -> &str {
    match value.rfind('(') {
        Some(open) if value.ends_with(')') => value[..open].trim_end(),
        _ => value,
    }
}
