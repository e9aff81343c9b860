//! POP3 command handlers for the fake server.
//!
//! Each handler lives in its own module and answers a single POP3
//! command (USER/PASS, STAT, LIST, RETR, TOP, QUIT).

mod retr;

pub use auth::handle_pass;
pub use list::handle_list;
pub use quit::handle_quit;
pub use retr::handle_retr;
pub use stat::handle_stat;
pub use top::handle_top;

#[cfg(test)]
pub mod testing {
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream};

    /// Run a handler against an in-memory stream and return what it
    /// wrote to the client.
    pub async fn capture<F>(handler: F) -> String
    where
        F: AsyncFnOnce(&mut BufReader<DuplexStream>),
    {
        let (client, server) = tokio::io::duplex(8192);
        let mut stream = BufReader::new(server);

        handler(&mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        BufReader::new(client).read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }
}
