//! Test data model for the fake POP3 server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .credentials("alice", "secret")
//!     .message(raw_rfc5322_bytes)
//!     .message(raw_rfc5322_bytes)
//!     .fail_next("LIST", 1)
//!     .build();
//! ```
//!
//! Messages are numbered from 1 in insertion order, which is how a
//! POP3 server assigns message numbers for a session. Faults let tests
//! simulate the transient failures the client is expected to ride out.

/// A mailbox: one user's messages plus the faults to inject.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub username: String,
    pub password: String,
    pub messages: Vec<Vec<u8>>,
    /// Remaining `-ERR` replies to send, per command keyword.
    pub failures: Vec<(String, usize)>,
    /// Number of upcoming connections to drop right after login.
    pub drops_after_login: usize,
}

impl Mailbox {
    /// Look up a message by its 1-based number.
    pub fn get(&self, number: usize) -> Option<&[u8]> {
        number
            .checked_sub(1)
            .and_then(|i| self.messages.get(i))
            .map(Vec::as_slice)
    }

    /// Consume one injected failure for `command`, if any is left.
    pub fn take_failure(&mut self, command: &str) -> bool {
        for (keyword, remaining) in &mut self.failures {
            if keyword.eq_ignore_ascii_case(command) && *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }

    /// Consume one scheduled post-login drop, if any is left.
    pub fn take_drop(&mut self) -> bool {
        if self.drops_after_login > 0 {
            self.drops_after_login -= 1;
            true
        } else {
            false
        }
    }
}

/// Split a raw message into lines without their CRLF.
pub fn message_lines(raw: &[u8]) -> Vec<&[u8]> {
    let raw = raw.strip_suffix(b"\r\n").unwrap_or(raw);
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

/// Builder for constructing a `Mailbox` step by step.
pub struct MailboxBuilder {
    mailbox: Mailbox,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            mailbox: Mailbox {
                username: "testuser".to_string(),
                password: "testpass".to_string(),
                messages: Vec::new(),
                failures: Vec::new(),
                drops_after_login: 0,
            },
        }
    }

    /// Credentials the server accepts (default `testuser`/`testpass`).
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.mailbox.username = username.to_string();
        self.mailbox.password = password.to_string();
        self
    }

    /// Append a message; it gets the next message number.
    pub fn message(mut self, raw: &[u8]) -> Self {
        self.mailbox.messages.push(raw.to_vec());
        self
    }

    /// Answer the next `times` uses of `command` with `-ERR`.
    pub fn fail_next(mut self, command: &str, times: usize) -> Self {
        self.mailbox.failures.push((command.to_string(), times));
        self
    }

    /// Hang up on the next `times` connections right after login, as a
    /// server enforcing an idle timeout would.
    pub fn drop_after_login(mut self, times: usize) -> Self {
        self.mailbox.drops_after_login = times;
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        self.mailbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_numbered_from_one() {
        let mailbox = MailboxBuilder::new().message(b"a").message(b"b").build();
        assert_eq!(mailbox.get(1), Some(&b"a"[..]));
        assert_eq!(mailbox.get(2), Some(&b"b"[..]));
        assert_eq!(mailbox.get(0), None);
        assert_eq!(mailbox.get(3), None);
    }

    #[test]
    fn failures_are_consumed() {
        let mut mailbox = MailboxBuilder::new().fail_next("LIST", 2).build();
        assert!(mailbox.take_failure("LIST"));
        assert!(mailbox.take_failure("list"));
        assert!(!mailbox.take_failure("LIST"));
        assert!(!mailbox.take_failure("RETR"));
    }

    #[test]
    fn lines_drop_crlf() {
        let lines = message_lines(b"Subject: x\r\n\r\nbody\r\n");
        assert_eq!(lines, vec![&b"Subject: x"[..], b"", b"body"]);
    }
}
