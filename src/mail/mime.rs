//! MIME text extraction.
//!
//! Decoding here is total: every input yields some text. Bytes that are not
//! valid UTF-8 are replaced with U+FFFD instead of failing the message.

use std::sync::LazyLock;

use mail_parser::{HeaderName, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use regex::Regex;

/// RFC 2047 encoded word: `=?charset?B|Q?text?=`.
static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?]*?)\?([qQbB])\?(.*?)\?=").expect("encoded-word regex is valid")
});

/// Decoded content of one body part; empty when the part carries none.
pub fn decode_payload(part: &MessagePart<'_>) -> String {
    let bytes = part.contents();
    if bytes.is_empty() {
        return String::new();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Plain-text body of a message.
///
/// Multipart messages are walked depth-first and the first `text/plain` part
/// wins. Otherwise the top-level payload is decoded as-is, which for a
/// multipart message without any plain part is empty.
pub fn extract_content(message: &Message<'_>) -> String {
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    if matches!(root.body, PartType::Multipart(_))
        && let Some(part) = first_plain_part(message)
    {
        return decode_payload(part);
    }

    decode_payload(root)
}

/// Depth-first search for the first `text/plain` part, descending into
/// attached messages.
fn first_plain_part<'a, 'x>(message: &'a Message<'x>) -> Option<&'a MessagePart<'x>> {
    for part in &message.parts {
        if is_text_plain(part) {
            return Some(part);
        }
        if let PartType::Message(inner) = &part.body
            && let Some(found) = first_plain_part(inner)
        {
            return Some(found);
        }
    }
    None
}

/// Parts without a Content-Type header default to `text/plain`.
fn is_text_plain(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .is_some_and(|sub| sub.eq_ignore_ascii_case("plain"))
        }
        None => matches!(part.body, PartType::Text(_)),
    }
}

/// Raw, unfolded value of a header, or empty when absent.
pub fn raw_header(message: &Message<'_>, name: HeaderName<'static>) -> String {
    message.header_raw(name).map(unfold).unwrap_or_default()
}

/// Join folded header lines and trim surrounding whitespace.
pub fn unfold(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.trim().chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {}
            '\n' => {
                // A fold keeps its leading whitespace; a bare newline becomes a space.
                if !chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                    out.push(' ');
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Decode the first segment of a MIME-encoded header value.
///
/// A value without encoded words is returned unfolded. Otherwise the value is
/// split into segments (leading plain text, then runs of encoded words
/// sharing one charset) and only the first segment is decoded. Subjects that
/// mix charsets or plain text after encoded words come back truncated.
pub fn decode_header_first(raw: &str) -> String {
    let value = unfold(raw);
    if !ENCODED_WORD.is_match(&value) {
        return value;
    }

    let mut segments: Vec<Segment<'_>> = Vec::new();
    let mut last = 0;
    for caps in ENCODED_WORD.captures_iter(&value) {
        let Some(word) = caps.get(0) else { continue };
        let between = &value[last..word.start()];
        last = word.end();

        let follows_encoded = matches!(segments.last(), Some(Segment::Encoded { .. }));
        let between = if segments.is_empty() {
            between.trim_start()
        } else {
            between
        };
        // Whitespace between two encoded words is not part of the text.
        if !between.is_empty() && !(follows_encoded && between.trim().is_empty()) {
            segments.push(Segment::Plain(between));
        }

        let charset = caps
            .get(1)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        match segments.last_mut() {
            Some(Segment::Encoded {
                charset: prev,
                words,
            }) if *prev == charset => words.push(word.as_str()),
            _ => segments.push(Segment::Encoded {
                charset,
                words: vec![word.as_str()],
            }),
        }
    }

    match segments.into_iter().next() {
        Some(Segment::Plain(text)) => text.to_string(),
        Some(Segment::Encoded { words, .. }) => decode_encoded_words(&words.join(" ")),
        None => value,
    }
}

enum Segment<'a> {
    Plain(&'a str),
    Encoded { charset: String, words: Vec<&'a str> },
}

/// Let the MIME parser decode a run of same-charset encoded words.
fn decode_encoded_words(words: &str) -> String {
    let synthetic = format!("Subject: {words}\r\n\r\n");
    MessageParser::default()
        .parse(synthetic.as_bytes())
        .and_then(|m| m.subject().map(str::to_string))
        .unwrap_or_else(|| words.to_string())
}
