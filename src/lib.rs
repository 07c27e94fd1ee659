//! Streaming filters for gzip'd Sonar OpenData scan dumps.
//!
//! Three thin binaries share one pipeline: `hgrep` and `hsgrep` grep the
//! decoded payload of http/https banner records, `usgrep` filters UDP probe
//! records by source subnet. Input is always a gzip stream on stdin; matches
//! go to stdout and diagnostics to stderr.

pub mod matcher;
pub mod parse;
pub mod pipeline;
pub mod types;
