//! Per-line record parsers for the two study formats.
//!
//! Both parsers take one raw line (trailing newline tolerated) and either
//! produce a populated record or a [`ParseError`]. Parse failures are never
//! fatal to the stream; the caller logs and moves on.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::DateTime;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::types::{BannerRecord, ProbeRecord};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("bad banner json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("banner payload is not base64: {0}")]
    Payload(#[from] base64::DecodeError),

    #[error("expected 8 fields, got {got}: {line}")]
    FieldCount { got: usize, line: String },

    #[error("invalid {field}: {value}")]
    Field { field: &'static str, value: String },
}

/// Parse one line of the http/https study and decode its payload.
///
/// Returns the record (with `data` still base64) together with the decoded
/// payload bytes; the payload may be arbitrary binary, not necessarily UTF-8.
/// JSON and base64 failures are distinct variants: a line can deserialize
/// fine and still be dropped because its payload does not decode.
pub fn parse_banner(line: &[u8]) -> Result<(BannerRecord, Vec<u8>), ParseError> {
    let record: BannerRecord = serde_json::from_slice(line)?;
    let payload = BASE64.decode(record.data.as_bytes())?;
    Ok((record, payload))
}

/// Parse one line of the UDP study.
///
/// Exactly 8 comma-separated fields. The integer fields are strict and name
/// the offending field on failure; the two address fields degrade to `None`
/// instead. The payload field is taken verbatim, so a payload containing a
/// literal comma shifts the split and fails the arity check.
pub fn parse_probe(line: &str) -> Result<ProbeRecord, ParseError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let tokens: Vec<&str> = line.split(',').collect();
    if tokens.len() != 8 {
        return Err(ParseError::FieldCount {
            got: tokens.len(),
            line: line.to_string(),
        });
    }

    let secs: i64 = int_field("timestamp", tokens[0])?;
    let timestamp = DateTime::from_timestamp(secs, 0).ok_or(ParseError::Field {
        field: "timestamp",
        value: tokens[0].to_string(),
    })?;

    Ok(ProbeRecord {
        timestamp,
        source_addr: IpAddr::from_str(tokens[1]).ok(),
        source_port: int_field("source port", tokens[2])?,
        destination_addr: IpAddr::from_str(tokens[3]).ok(),
        destination_port: int_field("destination port", tokens[4])?,
        ip_id: int_field("ip id", tokens[5])?,
        ttl: int_field("ttl", tokens[6])?,
        data: tokens[7].to_string(),
    })
}

fn int_field<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ParseError> {
    raw.parse().map_err(|_| ParseError::Field {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = r#"{"data":"aGVsbG8=","host":"a.com","ip":"1.2.3.4","path":"/","port":80,"vhost":""}"#;

    #[test]
    fn test_parse_banner_decodes_payload() {
        let (record, payload) = parse_banner(BANNER.as_bytes()).unwrap();
        assert_eq!(record.host, "a.com");
        assert_eq!(record.port, 80);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_parse_banner_tolerates_trailing_newline() {
        let line = format!("{BANNER}\n");
        let (record, _) = parse_banner(line.as_bytes()).unwrap();
        assert_eq!(record.ip, "1.2.3.4");
    }

    #[test]
    fn test_parse_banner_bad_json() {
        let err = parse_banner(b"{not json}\n").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn test_parse_banner_bad_base64_after_good_json() {
        // Deserializes fine; only the second stage fails.
        let line = r#"{"data":"not base64!","host":"a","ip":"1.1.1.1","path":"/","port":80,"vhost":""}"#;
        let err = parse_banner(line.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Payload(_)));
    }

    const PROBE: &str = "1700000000,10.0.0.5,5353,224.0.0.251,5353,1,64,payload";

    #[test]
    fn test_parse_probe_all_fields() {
        let record = parse_probe(&format!("{PROBE}\n")).unwrap();
        assert_eq!(record.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(record.source_addr.unwrap().to_string(), "10.0.0.5");
        assert_eq!(record.source_port, 5353);
        assert_eq!(
            record.destination_addr.unwrap().to_string(),
            "224.0.0.251"
        );
        assert_eq!(record.destination_port, 5353);
        assert_eq!(record.ip_id, 1);
        assert_eq!(record.ttl, 64);
        assert_eq!(record.data, "payload");
    }

    #[test]
    fn test_parse_probe_wrong_arity() {
        let err = parse_probe("1,2,3\n").unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { got: 3, .. }));

        // A comma inside the payload shifts the split.
        let err = parse_probe("1700000000,10.0.0.5,5353,224.0.0.251,5353,1,64,pay,load").unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { got: 9, .. }));
    }

    #[test]
    fn test_parse_probe_names_bad_integer_field() {
        let err = parse_probe("1700000000,10.0.0.5,http,224.0.0.251,5353,1,64,x").unwrap_err();
        match err {
            ParseError::Field { field, value } => {
                assert_eq!(field, "source port");
                assert_eq!(value, "http");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_probe("soon,10.0.0.5,5353,224.0.0.251,5353,1,64,x").unwrap_err();
        assert!(matches!(err, ParseError::Field { field: "timestamp", .. }));
    }

    #[test]
    fn test_parse_probe_addresses_are_lenient() {
        let record = parse_probe("1700000000,garbage,5353,also-garbage,5353,1,64,x").unwrap();
        assert_eq!(record.source_addr, None);
        assert_eq!(record.destination_addr, None);
    }

    #[test]
    fn test_parse_probe_ttl_out_of_range() {
        let err = parse_probe("1700000000,10.0.0.5,5353,224.0.0.251,5353,1,999,x").unwrap_err();
        assert!(matches!(err, ParseError::Field { field: "ttl", .. }));
    }

    #[test]
    fn test_parse_probe_ipv6_source() {
        let record = parse_probe("1700000000,2001:db8::1,5353,10.0.0.1,5353,1,64,x").unwrap();
        assert!(record.source_addr.unwrap().is_ipv6());
    }
}
