//! Message decoding: MIME text extraction and sender filtering.

pub mod mime;
pub mod sender;

pub use mime::{decode_header_first, decode_payload, extract_content};
pub use sender::{extract_address, is_allowed, matches};
