//! Sender address extraction and domain allow-list matching.

use std::sync::LazyLock;

use regex::Regex;

static ANGLE_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("angle-address regex is valid"));

/// Bare address from a `From` header.
///
/// `Name <addr>` yields `addr`; anything without angle brackets is taken
/// whole.
pub fn extract_address(from_header: &str) -> &str {
    ANGLE_ADDR
        .captures(from_header)
        .and_then(|caps| caps.get(1))
        .map_or(from_header, |m| m.as_str())
}

/// Whether an address passes the allow-list.
///
/// An empty list lets everything through. Otherwise the address must end with
/// one of the suffixes. This is a plain, case-sensitive string suffix test,
/// so `x.com` also admits `a@notx.com`.
pub fn is_allowed(address: &str, allowed_suffixes: &[String]) -> bool {
    allowed_suffixes.is_empty()
        || allowed_suffixes
            .iter()
            .any(|suffix| address.ends_with(suffix.as_str()))
}

/// Extract the address from a `From` header and test it against the list.
pub fn matches(from_header: &str, allowed_suffixes: &[String]) -> bool {
    is_allowed(extract_address(from_header), allowed_suffixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extract_from_display_name_form() {
        assert_eq!(extract_address("Boss <boss@work.com>"), "boss@work.com");
        assert_eq!(
            extract_address("\"Doe, Jane\" <jane@example.org>"),
            "jane@example.org"
        );
    }

    #[test]
    fn extract_bare_address() {
        assert_eq!(extract_address("boss@work.com"), "boss@work.com");
    }

    #[test]
    fn extract_first_bracketed_address() {
        assert_eq!(extract_address("A <a@x.com>, B <b@y.com>"), "a@x.com");
    }

    #[test]
    fn empty_list_accepts_everything() {
        assert!(matches("anyone@anywhere.net", &[]));
        assert!(matches("", &[]));
    }

    #[test]
    fn suffix_match() {
        let allowed = list(&["x.com"]);
        assert!(matches("a@x.com", &allowed));
        assert!(!matches("a@y.com", &allowed));
    }

    #[test]
    fn suffix_match_is_loose() {
        let allowed = list(&["x.com"]);
        assert!(matches("a@notx.com", &allowed));
        assert!(matches("Sub <a@sub.x.com>", &allowed));
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        let allowed = list(&["work.com"]);
        assert!(!matches("boss@WORK.COM", &allowed));
    }

    #[test]
    fn any_suffix_in_list() {
        let allowed = list(&["mom@gmail.com", "brother@gmail.com"]);
        assert!(matches("Mom <mom@gmail.com>", &allowed));
        assert!(matches("brother@gmail.com", &allowed));
        assert!(!matches("sister@gmail.com", &allowed));
    }

    #[test]
    fn display_name_is_not_matched() {
        let allowed = list(&["work.com"]);
        assert!(!matches("boss@work.com <boss@evil.org>", &allowed));
    }
}
