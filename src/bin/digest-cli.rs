#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for storing and retrieving page digests in a mailbox

use anyhow::Context;
use clap::{Parser, Subcommand};
use email_digest::{
    Config, DEFAULT_MAX_IMAGE_SIZE, DigestBundle, DigestClient, DigestEncoder, OutboundMessage,
    Reassembly,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "digest-cli")]
#[command(about = "Store captured web pages as email digests over IMAP/SMTP")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the messages a digest file encodes to, without sending
    Encode {
        /// Digest JSON file
        file: PathBuf,

        /// Images larger than this many bytes are sent as chunks
        #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
        max_image_size: usize,
    },

    /// Encode a digest file and send it
    Send {
        /// Digest JSON file
        file: PathBuf,
    },

    /// Fetch and reassemble all digests
    Fetch {
        /// Folder to fetch from (default: IMAP_FOLDER)
        #[arg(long)]
        folder: Option<String>,

        /// Write each digest to <DIR>/<id>.json (and <id>.html)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete every message of one digest
    Delete {
        /// Digest id
        id: String,

        /// Folder to delete from (default: IMAP_FOLDER)
        #[arg(long)]
        folder: Option<String>,
    },
}

#[derive(Serialize)]
struct EncodedMessage<'a> {
    kind: &'a str,
    subject: &'a str,
    bytes: usize,
}

#[derive(Serialize)]
struct FetchReport<'a> {
    digests: &'a [DigestBundle],
    incomplete: &'a [String],
    incomplete_images: Vec<String>,
    skipped: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match &args.command {
        Command::Encode {
            file,
            max_image_size,
        } => {
            let bundle = read_bundle(file)?;
            let messages = DigestEncoder::new(*max_image_size).encode(&bundle)?;
            print_messages(&args, &messages)?;
        }
        Command::Send { file } => {
            let bundle = read_bundle(file)?;
            let client = DigestClient::new(Config::from_env()?);
            let sent = client.send_digest(&bundle).await?;
            if args.json {
                println!("{}", serde_json::json!({ "id": bundle.id, "messages": sent }));
            } else {
                println!("Sent digest {} in {sent} message(s)", bundle.id);
            }
        }
        Command::Fetch { folder, out } => {
            let client = DigestClient::new(Config::from_env()?);
            let folder = folder.as_deref().unwrap_or(&client.config().imap.folder);
            let result = email_digest::sync::fetch_digests(&client, folder).await?;
            if let Some(dir) = out {
                write_digests(dir, &result)?;
            }
            print_reassembly(&args, &result)?;
        }
        Command::Delete { id, folder } => {
            let client = DigestClient::new(Config::from_env()?);
            let folder = folder.as_deref().unwrap_or(&client.config().imap.folder);
            let deleted = email_digest::sync::delete_digest(&client, folder, id).await?;
            if args.json {
                println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
            } else {
                println!("Deleted {deleted} message(s) of digest {id}");
            }
        }
    }

    Ok(())
}

fn read_bundle(path: &Path) -> anyhow::Result<DigestBundle> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a digest", path.display()))
}

fn write_digests(dir: &Path, result: &Reassembly) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for bundle in &result.digests {
        let path = dir.join(format!("{}.json", bundle.id));
        std::fs::write(&path, serde_json::to_string_pretty(bundle)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if let Some(html) = result.html(&bundle.id) {
            let path = dir.join(format!("{}.html", bundle.id));
            std::fs::write(&path, html)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

fn print_messages(args: &Args, messages: &[OutboundMessage]) -> anyhow::Result<()> {
    if args.json {
        let rows: Vec<EncodedMessage<'_>> = messages
            .iter()
            .map(|m| EncodedMessage {
                kind: m.kind.as_str(),
                subject: &m.subject,
                bytes: m.body.len(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<6} {:>10}  {}", "Kind", "Bytes", "Subject");
    println!("{}", "-".repeat(100));
    for message in messages {
        println!(
            "{:<6} {:>10}  {}",
            message.kind,
            message.body.len(),
            message.subject
        );
    }
    println!("\n{} message(s)", messages.len());
    Ok(())
}

fn print_reassembly(args: &Args, result: &Reassembly) -> anyhow::Result<()> {
    if args.json {
        let report = FetchReport {
            digests: &result.digests,
            incomplete: &result.incomplete,
            incomplete_images: result
                .incomplete_images
                .iter()
                .map(ToString::to_string)
                .collect(),
            skipped: result.skipped.len(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if result.digests.is_empty() {
        println!("No digests found.");
    } else {
        println!("{:<36} {:<24} {:>6}  {}", "ID", "Created", "Images", "Title");
        println!("{}", "-".repeat(100));
        for bundle in &result.digests {
            println!(
                "{:<36} {:<24} {:>6}  {}",
                bundle.id,
                bundle.created_at,
                bundle.images.len(),
                truncate(&bundle.title, 40)
            );
        }
        println!("\n{} digest(s)", result.digests.len());
    }

    if !result.incomplete.is_empty() {
        println!("{} incomplete digest(s): {}", result.incomplete.len(), result.incomplete.join(", "));
    }
    for gap in &result.incomplete_images {
        println!("Incomplete {gap}");
    }
    if !result.skipped.is_empty() {
        println!("{} message(s) skipped", result.skipped.len());
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
