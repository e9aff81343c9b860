#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for reading a POP3 mailbox (read-only)

use clap::{Parser, Subcommand};
use qpop::{DEFAULT_PREVIEW_LINES, MessageId, ParsedMessage, Part, PopConfig, Session};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qpop-cli")]
#[command(about = "Read-only CLI for POP3 mailboxes over TLS")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List message ids and sizes
    List,

    /// Show headers and plain text of a message
    Show {
        /// Message id (default: first listed message)
        id: Option<u32>,
    },

    /// Show headers and the first lines of a message
    Top {
        /// Message id (default: first listed message)
        id: Option<u32>,

        /// Number of body lines to fetch
        #[arg(long, default_value_t = DEFAULT_PREVIEW_LINES)]
        lines: usize,
    },

    /// Show the MIME part tree of a message
    Parts {
        /// Message id (default: first listed message)
        id: Option<u32>,
    },
}

#[derive(Serialize)]
struct MessageView {
    id: MessageId,
    headers: qpop::Headers,
    text: String,
}

#[derive(Serialize)]
struct PartView<'a> {
    depth: usize,
    content_type: &'a str,
    filename: Option<&'a str>,
    size: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = PopConfig::from_env()?;
    let mut session = Session::open(&config).await?;

    let result = match &args.command {
        Command::List => cmd_list(&mut session, &args).await,
        Command::Show { id } => cmd_show(&mut session, &args, *id).await,
        Command::Top { id, lines } => cmd_top(&mut session, &args, *id, *lines).await,
        Command::Parts { id } => cmd_parts(&mut session, &args, *id).await,
    };

    session.disconnect().await;
    result
}

/// The requested id, or the first message the server lists.
async fn resolve_id(session: &mut Session, id: Option<u32>) -> anyhow::Result<MessageId> {
    if let Some(id) = id {
        return Ok(MessageId(id));
    }
    let listing = session.list_messages().await?;
    listing
        .first()
        .map(|entry| entry.id)
        .ok_or_else(|| anyhow::anyhow!("Mailbox is empty"))
}

async fn cmd_list(session: &mut Session, args: &Args) -> anyhow::Result<()> {
    let listing = session.list_messages().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.is_empty() {
        println!("No messages found.");
        return Ok(());
    }

    println!("{:<8} {:>10}", "ID", "Octets");
    println!("{}", "-".repeat(19));
    for entry in &listing {
        println!("{:<8} {:>10}", entry.id, entry.octets);
    }
    println!("\n{} message(s)", listing.len());
    Ok(())
}

async fn cmd_show(session: &mut Session, args: &Args, id: Option<u32>) -> anyhow::Result<()> {
    let id = resolve_id(session, id).await?;
    let message = session.retrieve_and_parse(id).await?;
    print_message(args, id, &message)
}

async fn cmd_top(session: &mut Session, args: &Args, id: Option<u32>, lines: usize) -> anyhow::Result<()> {
    let id = resolve_id(session, id).await?;
    let preview = session.retrieve_message_preview(id, lines).await?;
    let message = ParsedMessage::from_lines(preview)?;
    print_message(args, id, &message)
}

async fn cmd_parts(session: &mut Session, args: &Args, id: Option<u32>) -> anyhow::Result<()> {
    let id = resolve_id(session, id).await?;
    let message = session.retrieve_and_parse(id).await?;

    if args.json {
        let parts: Vec<PartView<'_>> = message
            .parts()
            .iter()
            .map(|part| PartView {
                depth: part.depth(),
                content_type: part.content_type(),
                filename: part.filename(),
                size: part.payload().map(<[u8]>::len),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&parts)?);
        return Ok(());
    }

    println!("Message ID: {id}");
    let headers = message.headers();
    for (name, value) in headers.entries() {
        if matches!(name, "From" | "To" | "Subject") {
            println!("{name}: {}", value.unwrap_or(""));
        }
    }
    print_part(&message, message.root());
    Ok(())
}

fn print_message(args: &Args, id: MessageId, message: &ParsedMessage) -> anyhow::Result<()> {
    let text = message.plain_text()?;

    if args.json {
        let view = MessageView {
            id,
            headers: message.headers(),
            text,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Message ID: {id}");
    let headers = message.headers();
    for (name, value) in headers.entries() {
        if let Some(value) = value {
            println!("{:<13} {value}", format!("{name}:"));
        }
    }
    if let Some(date) = message.date() {
        println!("{:<13} {}", "Parsed-Date:", date.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("\n--- Text ---\n");
    println!("{text}");
    Ok(())
}

fn print_part(message: &ParsedMessage, part: &Part) {
    let indent = " ".repeat(part.depth());

    if part.is_multipart() {
        for (n, child) in message.children(part).enumerate() {
            println!("{indent}part {n}");
            println!("{indent}--------------------");
            print_part(message, child);
        }
        return;
    }

    match part.content_type() {
        "text/plain" | "text/html" => match part.text() {
            Ok(text) => println!("{indent}Text: {text}..."),
            Err(e) => println!("{indent}Text: <{e}>"),
        },
        other => println!("{indent}Attachment: {other}"),
    }
}
