//! RETR command handler.
//!
//! Sends the whole message as a multi-line reply. Lines starting with
//! a dot are byte-stuffed so they cannot be mistaken for the
//! terminator.

use crate::fake_pop3::io::{write_line, write_multiline};
use crate::fake_pop3::mailbox::{Mailbox, message_lines};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_retr<S: AsyncRead + AsyncWrite + Unpin>(
    number: usize,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    let Some(raw) = mailbox.get(number) else {
        let _ = write_line(stream, "-ERR no such message").await;
        return;
    };

    let resp = format!("+OK {} octets", raw.len());
    if write_line(stream, &resp).await.is_err() {
        return;
    }
    let _ = write_multiline(stream, &message_lines(raw)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_pop3::handlers::testing::capture;
    use crate::fake_pop3::mailbox::MailboxBuilder;

    #[tokio::test]
    async fn stuffs_leading_dots() {
        let mailbox = MailboxBuilder::new()
            .message(b"Subject: x\r\n\r\n.hidden\r\n")
            .build();
        let output = capture(async |s| handle_retr(1, &mailbox, s).await).await;
        assert!(output.contains("\r\n..hidden\r\n"));
        assert!(output.ends_with("\r\n.\r\n"));
    }

    #[tokio::test]
    async fn unknown_number_is_an_error() {
        let mailbox = MailboxBuilder::new().build();
        let output = capture(async |s| handle_retr(4, &mailbox, s).await).await;
        assert_eq!(output, "-ERR no such message\r\n");
    }
}
