//! POP3 response helpers
//!
//! The handful of wire idioms the session relies on: the `+OK` status
//! prefix, `LIST`/`STAT` items of two integers, and dot-stuffed
//! multi-line bodies (RFC 1939 section 3).

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Status marker that starts every successful reply.
pub const OK: &[u8] = b"+OK";

/// Line that terminates a multi-line response.
pub const TERMINATOR: &[u8] = b".";

/// Message number assigned by the server.
///
/// Only meaningful inside the session that listed it; servers renumber
/// messages between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MessageId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// One entry of a `LIST` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: MessageId,
    pub octets: u64,
}

/// Result of `STAT`: message count and total mailbox size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MailboxStat {
    pub count: u32,
    pub octets: u64,
}

/// Parse a `LIST` item of the form `<id> <octets>`.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] unless the input holds exactly
/// two whitespace-separated integers.
pub fn parse_listing_token(raw: &str) -> Result<Listing> {
    let (id, octets) = parse_pair(raw)?;
    Ok(Listing {
        id: MessageId(id),
        octets,
    })
}

/// Parse the text following `+OK` in a `STAT` reply.
pub(crate) fn parse_stat(raw: &str) -> Result<MailboxStat> {
    let (count, octets) = parse_pair(raw)?;
    Ok(MailboxStat { count, octets })
}

fn parse_pair(raw: &str) -> Result<(u32, u64)> {
    let malformed = || Error::MalformedResponse(raw.to_string());

    let mut tokens = raw.split_whitespace();
    let (Some(first), Some(second), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(malformed());
    };

    let first = first.parse().map_err(|_| malformed())?;
    let second = second.parse().map_err(|_| malformed())?;
    Ok((first, second))
}

/// True iff the reply starts with `+OK`.
#[must_use]
pub fn is_success(line: &[u8]) -> bool {
    line.starts_with(OK)
}

/// The diagnostic text after the status token, e.g. `no such message`
/// for `-ERR no such message`.
#[must_use]
pub fn status_text(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    match text.split_once(' ') {
        Some((_, rest)) => rest.trim().to_string(),
        None => String::new(),
    }
}

/// Remove byte-stuffing from one line of a multi-line response.
///
/// Lines the server prefixed with an extra `.` lose it; everything else
/// is returned unchanged.
#[must_use]
pub fn unstuff(line: &[u8]) -> &[u8] {
    if line.starts_with(b"..") {
        &line[1..]
    } else {
        line
    }
}

/// Strip the trailing CRLF (or bare LF) from a line read off the wire.
#[must_use]
pub fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
