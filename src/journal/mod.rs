// nexus_exchange/src/journal/mod.rs
//
// The JSONL journal. One record per line, UTF-8, LF-terminated. Every
// write is flushed immediately so a crash loses at most the in-flight
// line — the Log-Then-Act discipline this was adapted from, just with a
// human-diffable wire format instead of a binary WAL, because replay
// must be able to reconstruct state from nothing but `header` +
// `command` records played back against a fresh simulator.

use crate::command::{Command, CommandResult};
use crate::matching::MatchEvent;
use crate::snapshot::MarketSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalRecord {
    Header {
        seed: u64,
        config: crate::config::Config,
        started_at: u64,
    },
    Command {
        tick: u64,
        command: Command,
        result: CommandResult,
    },
    Event {
        tick: u64,
        event: MatchEvent,
    },
    Snapshot {
        tick: u64,
        snapshot: Box<MarketSnapshot>,
    },
}

pub struct JournalWriter {
    writer: BufWriter<File>,
}

impl JournalWriter {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    /// Append one record as a single JSON line, flushing immediately.
    pub fn append(&mut self, record: &JournalRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

pub struct JournalReader {
    lines: std::io::Lines<BufReader<File>>,
}

impl JournalReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self { lines: BufReader::new(file).lines() })
    }
}

impl Iterator for JournalReader {
    type Item = io::Result<JournalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        Some(match line {
            Ok(line) if line.is_empty() => return self.next(),
            Ok(line) => serde_json::from_str(&line).map_err(io::Error::from),
            Err(e) => Err(e),
        })
    }
}
