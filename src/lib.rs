//! POP3 client library
//!
//! Retrieves messages from a POP3 mailbox over implicit TLS and decodes
//! their MIME structure. A [`Session`] keeps one authenticated
//! connection and transparently reconnects once when the server drops
//! it or answers `-ERR`; [`ParsedMessage`] exposes headers, the
//! flattened part list and typed content views of a retrieved message.
//!
//! ```no_run
//! # async fn run() -> qpop::Result<()> {
//! use qpop::{PopConfig, Session};
//!
//! let config = PopConfig::from_env()?;
//! let session = Session::open(&config).await?;
//! let text = session
//!     .scoped(async |s| {
//!         let listing = s.list_messages().await?;
//!         let Some(first) = listing.first() else {
//!             return Ok(String::new());
//!         };
//!         s.retrieve_and_parse(first.id).await?.plain_text()
//!     })
//!     .await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod connection;
mod error;
mod message;
mod session;

pub use codec::{Listing, MailboxStat, MessageId, is_success, parse_listing_token};
pub use config::{DEFAULT_PORT, PopConfig};
pub use connection::{Connector, Pop3Stream, TlsConnector};
pub use error::{Error, Result};
pub use message::{Content, Headers, ParsedMessage, Part, PartBody};
pub use session::{DEFAULT_PREVIEW_LINES, Session};
