//! Blocking IMAP4rev1 client over rustls.
//!
//! Only the read-only subset a digest run needs: LOGIN, EXAMINE, SEARCH,
//! FETCH and LOGOUT. Server literals (`{n}\r\n` followed by `n` bytes) are
//! read exactly, so message bodies come back byte-for-byte.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{Mailbox, MessageId};
use crate::error::ImapError;

/// TLS stream used for real server connections.
pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a TLS connection and read the server greeting.
pub fn connect_tls(server: &str, port: u16) -> Result<ImapSession<TlsStream>, ImapError> {
    let tcp = TcpStream::connect((server, port))?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))?;
    tcp.set_write_timeout(Some(READ_TIMEOUT))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(server.to_string())
        .map_err(|e| ImapError::InvalidServerName(format!("{server}: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| ImapError::Tls(e.to_string()))?;

    info!(server, port, "Connected to IMAP server");
    ImapSession::handshake(rustls::StreamOwned::new(conn, tcp), server)
}

/// Completion status of a tagged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    No,
    Bad,
}

/// One untagged (`* ...`) response, with any literals it carried.
#[derive(Debug, Default)]
struct Untagged {
    text: String,
    literals: Vec<Vec<u8>>,
}

/// Everything the server sent for one command.
#[derive(Debug)]
struct Response {
    untagged: Vec<Untagged>,
    status: Status,
    text: String,
}

/// A stateful IMAP session over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
    server: String,
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap an already-connected stream and consume the greeting.
    pub fn handshake(stream: S, server: &str) -> Result<Self, ImapError> {
        let mut session = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
            server: server.to_string(),
        };

        let greeting = session.read_line()?;
        if !(greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH")) {
            return Err(ImapError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    /// Authenticate with LOGIN.
    pub fn login(&mut self, username: &str, password: &SecretString) -> Result<(), ImapError> {
        let command = format!(
            "LOGIN {} {}",
            quote(username),
            quote(password.expose_secret())
        );
        let response = self.run("LOGIN", &command)?;
        if response.status != Status::Ok {
            return Err(ImapError::AuthFailed {
                server: self.server.clone(),
            });
        }
        info!(server = %self.server, "Logged in");
        Ok(())
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    fn next_tag(&mut self) -> String {
        let tag = format!("A{:04}", self.next_tag);
        self.next_tag += 1;
        tag
    }

    /// Send a tagged command and collect the server's answer.
    ///
    /// `name` is what gets logged, so credentials never reach the log.
    fn run(&mut self, name: &str, command: &str) -> Result<Response, ImapError> {
        let tag = self.next_tag();
        debug!(tag = %tag, command = name, "IMAP command");

        let stream = self.stream.get_mut();
        stream.write_all(format!("{tag} {command}\r\n").as_bytes())?;
        stream.flush()?;

        let tagged_prefix = format!("{tag} ");
        let mut untagged = Vec::new();
        loop {
            let item = self.read_response_item()?;
            if let Some(rest) = item.text.strip_prefix(&tagged_prefix) {
                let (status, text) = parse_status(rest)?;
                return Ok(Response {
                    untagged,
                    status,
                    text,
                });
            }
            if item.text.starts_with("* ") {
                untagged.push(item);
            } else if item.text.starts_with('+') {
                return Err(ImapError::Protocol(format!(
                    "unexpected continuation request for {name}"
                )));
            } else {
                return Err(ImapError::Protocol(format!(
                    "unrecognised response line: {}",
                    item.text
                )));
            }
        }
    }

    /// Like [`run`](Self::run) but anything other than OK is an error.
    fn run_ok(&mut self, name: &str, command: &str) -> Result<Response, ImapError> {
        let response = self.run(name, command)?;
        match response.status {
            Status::Ok => Ok(response),
            Status::No | Status::Bad => Err(ImapError::CommandFailed {
                command: name.to_string(),
                response: response.text,
            }),
        }
    }

    /// FETCH one data item and return the first literal the server sent for `id`.
    ///
    /// A NO answer means the message is gone; BAD is a real failure.
    fn fetch_literal(&mut self, id: MessageId, item: &str) -> Result<Option<Vec<u8>>, ImapError> {
        let response = self.run("FETCH", &format!("FETCH {id} {item}"))?;
        match response.status {
            Status::Ok => {}
            Status::No => {
                debug!(id = %id, reason = %response.text, "FETCH returned NO");
                return Ok(None);
            }
            Status::Bad => {
                return Err(ImapError::CommandFailed {
                    command: "FETCH".to_string(),
                    response: response.text,
                });
            }
        }

        let prefix = format!("* {id} FETCH");
        Ok(response
            .untagged
            .into_iter()
            .filter(|u| u.text.starts_with(&prefix))
            .flat_map(|u| u.literals)
            .find(|literal| !literal.is_empty()))
    }

    /// Read one response line plus any literals it announces.
    fn read_response_item(&mut self) -> Result<Untagged, ImapError> {
        let mut item = Untagged::default();
        loop {
            let line = self.read_line()?;
            let line = line.trim_end_matches(['\r', '\n']);
            match literal_len(line) {
                Some(len) => {
                    item.text.push_str(line);
                    let mut literal = vec![0u8; len];
                    self.stream.read_exact(&mut literal)?;
                    item.literals.push(literal);
                }
                None => {
                    item.text.push_str(line);
                    return Ok(item);
                }
            }
        }
    }

    fn read_line(&mut self) -> Result<String, ImapError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(ImapError::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<S: Read + Write> Mailbox for ImapSession<S> {
    fn select_inbox_readonly(&mut self) -> Result<(), ImapError> {
        self.run_ok("EXAMINE", "EXAMINE INBOX")?;
        Ok(())
    }

    fn search_since(&mut self, since: NaiveDate) -> Result<Vec<MessageId>, ImapError> {
        let command = format!("SEARCH SINCE {}", imap_date(since));
        let response = self.run_ok("SEARCH", &command)?;

        let mut ids = Vec::new();
        for line in &response.untagged {
            let Some(rest) = line.text.strip_prefix("* SEARCH") else {
                continue;
            };
            for token in rest.split_whitespace() {
                let n = token.parse::<u32>().map_err(|_| {
                    ImapError::Protocol(format!("bad SEARCH result token: {token}"))
                })?;
                ids.push(MessageId(n));
            }
        }
        Ok(ids)
    }

    fn fetch_date_header(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
        self.fetch_literal(id, "(BODY.PEEK[HEADER.FIELDS (DATE)])")
    }

    fn fetch_message(&mut self, id: MessageId) -> Result<Option<Vec<u8>>, ImapError> {
        self.fetch_literal(id, "(BODY.PEEK[])")
    }

    fn logout(&mut self) -> Result<(), ImapError> {
        self.run("LOGOUT", "LOGOUT")?;
        Ok(())
    }
}

/// `16-Oct-2026`, the date form SEARCH SINCE expects.
pub fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Quote a string argument, escaping `\` and `"`.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Byte count of a trailing `{n}` literal marker, if the line ends with one.
fn literal_len(line: &str) -> Option<usize> {
    let body = line.strip_suffix('}')?;
    let open = body.rfind('{')?;
    body[open + 1..].trim_end_matches('+').parse().ok()
}

fn parse_status(rest: &str) -> Result<(Status, String), ImapError> {
    let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let status = match word.to_ascii_uppercase().as_str() {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        other => {
            return Err(ImapError::Protocol(format!(
                "unknown completion status: {other}"
            )));
        }
    };
    Ok((status, text.to_string()))
}
