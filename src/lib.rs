//! mail-digest: fetch a window of IMAP mail and summarize it with an LLM.

pub mod config;
pub mod digest;
pub mod error;
pub mod imap;
pub mod llm;
pub mod mail;
pub mod output;
pub mod pipeline;
pub mod summary;
