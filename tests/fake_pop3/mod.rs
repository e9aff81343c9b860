//! Fake POP3 server for integration testing
//!
//! This module provides an in-process POP3S server that speaks enough
//! of RFC 1939 to test `Session` end-to-end:
//!
//! TCP -> TLS handshake -> greeting -> USER/PASS -> commands -> QUIT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, and connection dispatch
//! - `handlers/` -- one file per POP3 command (LIST, RETR, TOP, ...)
//! - `mailbox` -- test data model (messages, credentials, faults)
//! - `io` -- shared write helpers

#![allow(dead_code)]

mod handlers;
pub mod mailbox;

pub use mailbox::MailboxBuilder;
pub use server::FakePop3Server;
