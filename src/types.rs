use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One line of the Sonar http/https study: an NDJSON record whose `data`
/// field carries the base64-encoded response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannerRecord {
    pub data: String,
    pub host: String,
    pub ip: String,
    pub path: String,
    pub port: u16,
    /// TLS certificate subject; https study only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    pub vhost: String,
}

/// Certificate subject fields as they appear in the https study. Every field
/// is optional and absent fields stay out of the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "C", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "CN", skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(rename = "businessCategory", skip_serializing_if = "Option::is_none")]
    pub business_category: Option<String>,
    #[serde(rename = "jurisdictionST", skip_serializing_if = "Option::is_none")]
    pub jurisdiction_st: Option<String>,
    #[serde(rename = "serialNumber", skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(rename = "L", skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(rename = "O", skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(rename = "ST", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "street", skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(rename = "jurisdictionL", skip_serializing_if = "Option::is_none")]
    pub jurisdiction_l: Option<String>,
    #[serde(rename = "postalCode", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(rename = "OU", skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "jurisdictionC", skip_serializing_if = "Option::is_none")]
    pub jurisdiction_c: Option<String>,
}

/// One line of the Sonar UDP study: an 8-field CSV probe record.
///
/// Address fields are `None` when the study emitted something unparseable;
/// the integer fields are strict and reject the whole line on failure.
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    pub timestamp: DateTime<Utc>,
    pub source_addr: Option<IpAddr>,
    pub source_port: u16,
    pub destination_addr: Option<IpAddr>,
    pub destination_port: u16,
    pub ip_id: u16,
    pub ttl: u8,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_absent_fields_stay_out() {
        let rec: BannerRecord = serde_json::from_str(
            r#"{"data":"","host":"h","ip":"1.2.3.4","path":"/","port":443,
                "subject":{"CN":"example.org","O":"Example"},"vhost":""}"#,
        )
        .unwrap();
        let subject = rec.subject.as_ref().unwrap();
        assert_eq!(subject.common_name.as_deref(), Some("example.org"));
        assert_eq!(subject.country, None);

        let out = serde_json::to_string(&rec).unwrap();
        assert!(out.contains("\"CN\":\"example.org\""));
        assert!(!out.contains("\"C\":"));
        assert!(!out.contains("businessCategory"));
    }

    #[test]
    fn test_http_record_has_no_subject_key() {
        let rec: BannerRecord = serde_json::from_str(
            r#"{"data":"","host":"h","ip":"1.2.3.4","path":"/","port":80,"vhost":""}"#,
        )
        .unwrap();
        assert!(rec.subject.is_none());
        let out = serde_json::to_string(&rec).unwrap();
        assert!(!out.contains("subject"));
    }
}
