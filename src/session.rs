//! Authenticated POP3 session with reconnect-and-retry

use crate::codec::{Listing, MailboxStat, MessageId};
use crate::config::PopConfig;
use crate::connection::{Connector, Pop3Stream, TlsConnector};
use crate::error::{Error, Result};
use crate::message::ParsedMessage;
use tracing::{debug, info, warn};

/// Body lines fetched by a preview when the caller has no preference.
pub const DEFAULT_PREVIEW_LINES: usize = 20;

/// Reconnects allowed for retrieval commands.
const RETRIEVAL_RETRIES: u32 = 1;

/// A POP3 mailbox session.
///
/// Holds at most one live, authenticated connection. Retrieval calls
/// that hit a transient failure (an `-ERR` reply, or the server
/// dropping an idle connection) reconnect once and try again.
///
/// Dropping a session closes the socket without `QUIT`; call
/// [`Session::disconnect`] or use [`Session::scoped`] for a clean
/// logout.
pub struct Session<C: Connector = TlsConnector> {
    connector: C,
    username: String,
    password: String,
    conn: Option<Pop3Stream<C::Stream>>,
}

impl Session<TlsConnector> {
    /// Connect and log in using `config`.
    ///
    /// Prompts for the password on the terminal if the config has none.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS setup, the connection, or the login
    /// fails.
    pub async fn open(config: &PopConfig) -> Result<Self> {
        let connector = TlsConnector::new(config)?;
        let password = config.resolve_password()?;
        Self::with_connector(connector, &config.username, password).await
    }
}

impl<C: Connector> Session<C> {
    /// Connect and log in through an arbitrary [`Connector`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the login fails.
    pub async fn with_connector(
        connector: C,
        username: &str,
        password: impl Into<String>,
    ) -> Result<Self> {
        let mut session = Self {
            connector,
            username: username.to_string(),
            password: password.into(),
            conn: None,
        };
        session.connect().await?;
        Ok(session)
    }

    /// Run `f` with this session, then disconnect whatever `f`
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`.
    pub async fn scoped<T, F>(mut self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        let result = f(&mut self).await;
        self.disconnect().await;
        result
    }

    /// Whether a live connection is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Drop any current connection and log in on a fresh one.
    ///
    /// Never retried; the retrieval methods decide whether to call it
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] for network or TLS failures and
    /// [`Error::Authentication`] if the credentials are rejected.
    pub async fn connect(&mut self) -> Result<()> {
        self.disconnect().await;

        let stream = self.connector.open().await?;
        let conn = Pop3Stream::login(stream, &self.username, &self.password).await?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Send `QUIT` and release the connection.
    ///
    /// Best effort: a failing `QUIT` is logged and ignored, and no
    /// reconnect is attempted.
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            match conn.quit().await {
                Ok(()) => info!("Disconnected from POP3 server"),
                Err(e) => warn!("QUIT failed, dropping connection: {}", e),
            }
        }
    }

    /// Message count and total size.
    ///
    /// # Errors
    ///
    /// Returns an error if `STAT` fails after the retry budget.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        self.with_retry(RETRIEVAL_RETRIES, async |conn| conn.stat().await)
            .await
    }

    /// Every message id with its size, in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if `LIST` fails after the retry budget, or
    /// [`Error::MalformedResponse`] if an entry does not parse.
    pub async fn list_messages(&mut self) -> Result<Vec<Listing>> {
        let listing = self
            .with_retry(RETRIEVAL_RETRIES, async |conn| conn.list().await)
            .await?;
        debug!("Mailbox lists {} message(s)", listing.len());
        Ok(listing)
    }

    /// The full message as raw lines.
    ///
    /// # Errors
    ///
    /// Returns an error if `RETR` fails after the retry budget. The
    /// server decides whether `id` exists.
    pub async fn retrieve_message(&mut self, id: MessageId) -> Result<Vec<Vec<u8>>> {
        self.with_retry(RETRIEVAL_RETRIES, async |conn| conn.retr(id).await)
            .await
    }

    /// Headers plus the first `lines` body lines.
    ///
    /// # Errors
    ///
    /// Returns an error if `TOP` fails after the retry budget.
    pub async fn retrieve_message_preview(
        &mut self,
        id: MessageId,
        lines: usize,
    ) -> Result<Vec<Vec<u8>>> {
        self.with_retry(RETRIEVAL_RETRIES, async |conn| conn.top(id, lines).await)
            .await
    }

    /// Retrieve a message and build its MIME model.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or MIME parsing fails.
    pub async fn retrieve_and_parse(&mut self, id: MessageId) -> Result<ParsedMessage> {
        let lines = self.retrieve_message(id).await?;
        ParsedMessage::from_lines(lines)
    }

    /// Run `op` on the live connection, reconnecting and re-running it
    /// up to `budget` times while it fails transiently.
    async fn with_retry<T, F>(&mut self, budget: u32, mut op: F) -> Result<T>
    where
        F: AsyncFnMut(&mut Pop3Stream<C::Stream>) -> Result<T>,
    {
        let mut result = self.attempt(&mut op).await;

        for retry in 1..=budget {
            let err = match result {
                Err(err) if err.is_transient() => err,
                done => return done,
            };
            warn!("Retry {}/{} after transient error: {}", retry, budget, err);

            result = match self.connect().await {
                Ok(()) => self.attempt(&mut op).await,
                Err(e) if e.is_transient() => Err(e),
                Err(e) => return Err(e),
            };
        }

        result
    }

    async fn attempt<T, F>(&mut self, op: &mut F) -> Result<T>
    where
        F: AsyncFnMut(&mut Pop3Stream<C::Stream>) -> Result<T>,
    {
        let conn = self.conn.as_mut().ok_or(Error::NotConnected)?;
        op(conn).await
    }
}
