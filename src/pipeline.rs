//! The streaming pipeline shared by all three tools.
//!
//! One blocking reader task decompresses stdin and splits it into lines; one
//! filter worker parses, applies the predicate, and emits matches. The two
//! sides talk only through a bounded channel, so memory stays flat no matter
//! how large the dump is, and matches come out in input order.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::io::{self, BufRead, BufReader, Read, Write};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use crate::matcher::{SubnetList, WordMatcher};
use crate::parse;

// Sinks matched records can be written to.
pub trait RecordSink: Write + Send {}
impl RecordSink for std::io::Stdout {}

// flate2 keeps returning the same error once the stream is corrupt; allow a
// few consecutive failures for genuinely transient errors, then stop.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 3;

pub struct Config {
    pub mode: Mode,
    pub queue_depth: usize,
    pub stats_every: u64,
}

/// Which study is being filtered, and with what predicate. The output shape
/// follows the mode: word matches are pretty-printed JSON with the payload
/// decoded, subnet matches are a debug dump of the whole record.
pub enum Mode {
    Word { matcher: WordMatcher },
    Subnet { subnets: SubnetList },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub parsed: u64,
    pub skipped: u64,
    pub matched: u64,
}

pub async fn run<R>(cfg: Config, input: R, sink: Box<dyn RecordSink>) -> Result<Stats>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Vec<u8>>(cfg.queue_depth);

    // Reader task (blocking): decompress and push lines.
    let reader_jh = tokio::task::spawn_blocking(move || read_lines(input, tx));

    // Filter worker: parse, match, emit.
    let worker_jh = tokio::spawn(filter_worker(rx, cfg.mode, sink, cfg.stats_every));

    let stats = worker_jh.await?;
    let lines = reader_jh.await??;
    tracing::info!(
        lines,
        parsed = stats.parsed,
        skipped = stats.skipped,
        matched = stats.matched,
        "stream complete"
    );
    Ok(stats)
}

fn is_gzip(head: &[u8]) -> bool {
    // Gzip magic per RFC 1952.
    matches!(head, [0x1f, 0x8b, ..])
}

/// Read newline-terminated records off the decompressed stream and push them
/// into the queue. Returns the number of complete lines sent. A truncated
/// trailing fragment is dropped; read errors other than end-of-stream are
/// logged and skipped.
fn read_lines<R: Read>(input: R, tx: mpsc::Sender<Vec<u8>>) -> Result<u64> {
    let mut raw = BufReader::new(input);
    let head = raw.fill_buf().context("read input")?;
    if !is_gzip(head) {
        bail!("input is not a gzip stream");
    }
    let mut reader = BufReader::new(GzDecoder::new(raw));

    let mut lines = 0u64;
    let mut errors = 0u32;
    loop {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            // Clean end of stream.
            Ok(0) => break,
            Ok(_) => {
                if !buf.ends_with(b"\n") {
                    // Stream ended mid-record; the fragment is dropped.
                    break;
                }
                errors = 0;
                lines += 1;
                // Send blocks when the worker falls behind.
                if tx.blocking_send(buf).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                errors += 1;
                if errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    tracing::error!(error = %e, "read failing persistently, stopping");
                    break;
                }
                tracing::warn!(error = %e, "read error");
            }
        }
    }
    Ok(lines)
}

async fn filter_worker(
    mut rx: mpsc::Receiver<Vec<u8>>,
    mode: Mode,
    mut sink: Box<dyn RecordSink>,
    stats_every: u64,
) -> Stats {
    let mut stats = Stats::default();
    let mut tick = interval(Duration::from_secs(stats_every.max(1)));

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                // Channel closed and drained: we are done.
                let Some(line) = maybe else { break };
                filter_line(&line, &mode, &mut *sink, &mut stats);
            }
            _ = tick.tick() => {
                tracing::info!(
                    parsed = stats.parsed,
                    skipped = stats.skipped,
                    matched = stats.matched,
                    "progress"
                );
            }
        }
    }
    stats
}

fn filter_line(line: &[u8], mode: &Mode, sink: &mut dyn RecordSink, stats: &mut Stats) {
    match mode {
        Mode::Word { matcher } => match parse::parse_banner(line) {
            Ok((mut record, payload)) => {
                stats.parsed += 1;
                if !matcher.matches(&payload) {
                    return;
                }
                record.data = String::from_utf8_lossy(&payload).into_owned();
                match serde_json::to_string_pretty(&record) {
                    Ok(out) => emit(sink, &out, stats),
                    Err(e) => tracing::warn!(error = %e, "serialize failed"),
                }
            }
            Err(e) => {
                stats.skipped += 1;
                tracing::warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(line).trim_end(),
                    "dropping banner record"
                );
            }
        },
        Mode::Subnet { subnets } => {
            match parse::parse_probe(&String::from_utf8_lossy(line)) {
                Ok(record) => {
                    stats.parsed += 1;
                    // An unparseable source address never matches.
                    let hit = record
                        .source_addr
                        .map_or(false, |addr| subnets.contains(addr));
                    if hit {
                        emit(sink, &format!("{record:?}"), stats);
                    }
                }
                Err(e) => {
                    stats.skipped += 1;
                    tracing::warn!(
                        error = %e,
                        line = %String::from_utf8_lossy(line).trim_end(),
                        "dropping probe record"
                    );
                }
            }
        }
    }
}

fn emit(sink: &mut dyn RecordSink, out: &str, stats: &mut Stats) {
    // A failed write loses one match, never the stream.
    if let Err(e) = writeln!(sink, "{out}").and_then(|()| sink.flush()) {
        tracing::warn!(error = %e, "write failed");
        return;
    }
    stats.matched += 1;
}
