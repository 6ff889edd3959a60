//! Packet source boundary: descriptor replay from NDJSON streams.
//!
//! The engine consumes [`PacketDescriptor`]s from an mpsc channel and does
//! not care who produces them. This module is the thin adapter shipped with
//! the binary: it reads one JSON descriptor per line from a file or stdin,
//! skips malformed lines with a warning, and closes the channel at EOF so
//! the engine shuts down cleanly.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::PacketDescriptor;

/// Parses one NDJSON line. Blank lines yield `None`; parse failures come
/// back as `Err` so the caller can log them with the offending content.
fn parse_line(line: &str) -> Result<Option<PacketDescriptor>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let descriptor =
        serde_json::from_str(trimmed).context("invalid packet descriptor line")?;
    Ok(Some(descriptor))
}

async fn stream_lines<R>(reader: R, tx: mpsc::Sender<PacketDescriptor>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(descriptor)) => {
                // A closed receiver means the engine is gone; stop reading.
                if tx.send(descriptor).await.is_err() {
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("skipping malformed descriptor line: {:#}", e);
            }
        }
    }

    Ok(forwarded)
}

/// Replays descriptors from an NDJSON file into the channel.
pub async fn stream_file<P: AsRef<Path>>(
    path: P,
    tx: mpsc::Sender<PacketDescriptor>,
) -> Result<u64> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open descriptor file: {}", path.as_ref().display()))?;
    stream_lines(BufReader::new(file), tx).await
}

/// Replays descriptors from stdin into the channel.
pub async fn stream_stdin(tx: mpsc::Sender<PacketDescriptor>) -> Result<u64> {
    stream_lines(BufReader::new(tokio::io::stdin()), tx).await
}
