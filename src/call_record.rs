//! Finalized outbound-call observation
//!
//! A [`CallRecord`] is assembled exactly once per observed call, either when the
//! response body has been fully received or when the transport fails. Once it
//! enters the hub it is shared as `Arc<CallRecord>` and never mutated again.
//!
//! # Wire Mapping
//!
//! ```text
//! CallRecord (Rust)                    →  JSON key
//! ├─ time: DateTime<Utc>               →  "time"            ISO-8601, millisecond precision
//! ├─ duration_ms: u64                  →  "ms"
//! ├─ method: String                    →  "method"
//! ├─ url: String                       →  "url"
//! ├─ status_code: i32                  →  "statusCode"      -1 on transport failure
//! ├─ request_headers: Option<..>       →  "requestHeaders"  omitted when absent
//! ├─ response_headers: Option<..>      →  "responseHeaders" omitted when absent
//! ├─ request_body: String              →  "requestBody"
//! ├─ response_body: String             →  "responseBody"
//! └─ error: Option<String>             →  "error"           failure records only
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status value reserved for records produced from a connection-level error
/// rather than a received response.
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

/// Header mapping as captured on the wire (lower-cased names)
pub type HeaderMap = BTreeMap<String, String>;

/// One finalized outbound-call observation
///
/// # Example
///
/// ```
/// use http_observe::call_record::CallRecord;
///
/// let record = CallRecord::builder("POST", "https://api.example.com/v1/items")
///     .status(201)
///     .duration_ms(42)
///     .request_body(r#"{"name":"widget"}"#)
///     .response_body(r#"{"id":7}"#)
///     .build();
///
/// assert!(!record.is_failure());
/// let json = serde_json::to_string(&record).unwrap();
/// assert!(json.contains(r#""statusCode":201"#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Call-completion timestamp
    #[serde(with = "iso_millis")]
    pub time: DateTime<Utc>,

    /// Wall-clock milliseconds from call start to completion
    #[serde(rename = "ms")]
    pub duration_ms: u64,

    /// HTTP method, upper-cased
    pub method: String,

    /// Fully resolved scheme + host + path + query
    pub url: String,

    /// Application status, or [`TRANSPORT_FAILURE_STATUS`]
    pub status_code: i32,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_headers: Option<HeaderMap>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_headers: Option<HeaderMap>,

    /// Captured request text, possibly ending in a truncation marker
    #[serde(default)]
    pub request_body: String,

    /// Captured response text, possibly ending in a truncation marker
    #[serde(default)]
    pub response_body: String,

    /// Transport error message, present only on failure records
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl CallRecord {
    /// Start building a record for `method` + `url`
    pub fn builder(method: impl Into<String>, url: impl Into<String>) -> CallRecordBuilder {
        CallRecordBuilder {
            record: CallRecord {
                time: Utc::now(),
                duration_ms: 0,
                method: method.into(),
                url: url.into(),
                status_code: 0,
                request_headers: None,
                response_headers: None,
                request_body: String::new(),
                response_body: String::new(),
                error: None,
            },
        }
    }

    /// True when this record came from a transport-level failure
    pub fn is_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE_STATUS
    }
}

/// Builder for [`CallRecord`]
#[derive(Debug, Clone)]
pub struct CallRecordBuilder {
    record: CallRecord,
}

impl CallRecordBuilder {
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.record.time = time;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.record.duration_ms = ms;
        self
    }

    pub fn status(mut self, status: i32) -> Self {
        self.record.status_code = status;
        self
    }

    pub fn request_headers(mut self, headers: Option<HeaderMap>) -> Self {
        self.record.request_headers = headers;
        self
    }

    pub fn response_headers(mut self, headers: Option<HeaderMap>) -> Self {
        self.record.response_headers = headers;
        self
    }

    pub fn request_body(mut self, body: impl Into<String>) -> Self {
        self.record.request_body = body.into();
        self
    }

    pub fn response_body(mut self, body: impl Into<String>) -> Self {
        self.record.response_body = body.into();
        self
    }

    /// Mark the record as a transport failure carrying `message`
    ///
    /// Sets the sentinel status and clears the response body.
    pub fn failure(mut self, message: impl Into<String>) -> Self {
        self.record.status_code = TRANSPORT_FAILURE_STATUS;
        self.record.response_body.clear();
        self.record.error = Some(message.into());
        self
    }

    pub fn build(self) -> CallRecord {
        self.record
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
            + chrono::Duration::milliseconds(250)
    }

    #[test]
    fn test_json_field_names() {
        let record = CallRecord::builder("GET", "http://localhost/ping")
            .time(fixed_time())
            .duration_ms(12)
            .status(200)
            .response_body("pong")
            .build();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["time"], "2024-05-01T12:30:00.250Z");
        assert_eq!(value["ms"], 12);
        assert_eq!(value["method"], "GET");
        assert_eq!(value["url"], "http://localhost/ping");
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["requestBody"], "");
        assert_eq!(value["responseBody"], "pong");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let record = CallRecord::builder("GET", "http://localhost/").build();
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("error"));
        assert!(!obj.contains_key("requestHeaders"));
        assert!(!obj.contains_key("responseHeaders"));
    }

    #[test]
    fn test_failure_sets_sentinel_and_clears_response() {
        let record = CallRecord::builder("POST", "https://example.com/upload")
            .request_body("partial")
            .response_body("should vanish")
            .failure("connection refused")
            .build();

        assert!(record.is_failure());
        assert_eq!(record.status_code, -1);
        assert_eq!(record.request_body, "partial");
        assert_eq!(record.response_body, "");
        assert_eq!(record.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_json_round_trip_with_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type".into(), "application/json".into());

        let record = CallRecord::builder("PUT", "https://example.com/a?b=c")
            .time(fixed_time())
            .status(204)
            .request_headers(Some(headers.clone()))
            .response_headers(Some(headers))
            .build();

        let json = serde_json::to_string(&record).unwrap();
        let back: CallRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
