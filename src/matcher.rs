//! Match predicates: substring containment over payload bytes and
//! subnet membership for probe source addresses.

use anyhow::{bail, Context, Result};
use regex::bytes::{Regex, RegexBuilder};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

/// Substring predicate over decoded payload bytes.
///
/// Case-sensitive mode is byte-exact containment. Case-insensitive mode uses
/// the regex engine's Unicode case folding, so `"café"` finds `"CAFÉ"`.
/// An empty word matches every payload.
pub struct WordMatcher {
    re: Regex,
}

impl WordMatcher {
    pub fn new(word: &str, ignore_case: bool) -> Result<Self, regex::Error> {
        let re = RegexBuilder::new(&regex::escape(word))
            .case_insensitive(ignore_case)
            .build()?;
        Ok(Self { re })
    }

    pub fn matches(&self, payload: &[u8]) -> bool {
        self.re.is_match(payload)
    }
}

/// One CIDR block. Containment is a prefix-mask compare on the raw address
/// bits; families never match across v4/v6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    addr: IpAddr,
    prefix_len: u8,
}

impl Subnet {
    /// Parse `"10.0.0.0/8"` style notation. A bare address without a prefix
    /// length is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let Some((addr, prefix)) = s.split_once('/') else {
            bail!("invalid CIDR (missing prefix length): {s}");
        };
        let addr: IpAddr = addr
            .parse()
            .with_context(|| format!("invalid CIDR address: {s}"))?;
        let prefix_len: u8 = prefix
            .parse()
            .with_context(|| format!("invalid CIDR prefix length: {s}"))?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            bail!("CIDR prefix length out of range: {s}");
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => Self::contains_v4(net, ip, self.prefix_len),
            (IpAddr::V6(net), IpAddr::V6(ip)) => Self::contains_v6(net, ip, self.prefix_len),
            _ => false,
        }
    }

    fn contains_v4(net: Ipv4Addr, ip: Ipv4Addr, prefix_len: u8) -> bool {
        if prefix_len == 0 {
            return true;
        }
        let mask = !0u32 << (32 - prefix_len);
        (u32::from(ip) & mask) == (u32::from(net) & mask)
    }

    fn contains_v6(net: Ipv6Addr, ip: Ipv6Addr, prefix_len: u8) -> bool {
        if prefix_len == 0 {
            return true;
        }
        let mask = !0u128 << (128 - prefix_len);
        (u128::from(ip) & mask) == (u128::from(net) & mask)
    }
}

/// The subnets of interest, loaded once before the stream starts and
/// immutable for the rest of the run. An empty list matches nothing.
#[derive(Debug, Clone, Default)]
pub struct SubnetList {
    subnets: Vec<Subnet>,
}

impl SubnetList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load newline-separated CIDR blocks. Blank lines and `#` comments are
    /// skipped; anything else must parse or loading fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("open subnets file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("parse subnets file {}", path.display()))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut subnets = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read line {}", n + 1))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            subnets.push(Subnet::parse(line).with_context(|| format!("line {}", n + 1))?);
        }
        Ok(Self { subnets })
    }

    /// True when `ip` falls inside any block; first hit wins.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.subnets.iter().any(|s| s.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.subnets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty()
    }
}
