//! Wire types for the archive.org endpoints.
//!
//! Fields the service sometimes omits are defaulted so a sparse body still
//! parses; interpretation happens in the client.

use std::collections::BTreeMap;

use serde::Deserialize;

/// `GET /wayback/available`
#[derive(Debug, Deserialize)]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchivedSnapshots {
    #[serde(default)]
    pub closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct ClosestSnapshot {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl AvailabilityResponse {
    /// URL of the closest existing snapshot, if the service reports one.
    pub fn snapshot_url(&self) -> Option<&str> {
        self.archived_snapshots
            .closest
            .as_ref()
            .filter(|c| c.available && !c.url.is_empty())
            .map(|c| c.url.as_str())
    }
}

/// `POST /save/` body when the request was queued.
#[derive(Debug, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /save/status/{job_id}`
#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub http_status: Option<serde_json::Value>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub status_ext: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Lifecycle of a capture job as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Success { timestamp: Option<String> },
    Other(String),
}

impl JobStatusResponse {
    pub fn state(&self) -> JobState {
        match self.status.as_str() {
            "pending" => JobState::Pending,
            "success" => JobState::Success { timestamp: self.timestamp.clone().filter(|t| !t.is_empty()) },
            other => JobState::Other(other.to_string()),
        }
    }
}

/// `GET /__wb/sparkline/`
#[derive(Debug, Deserialize)]
pub struct SparklineResponse {
    #[serde(default)]
    pub years: BTreeMap<String, Vec<u32>>,
    #[serde(default)]
    pub first_ts: Option<String>,
    #[serde(default)]
    pub last_ts: Option<String>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVAILABLE_JSON: &str = r#"{
        "url": "example.com",
        "archived_snapshots": {
            "closest": {
                "status": "200",
                "available": true,
                "url": "http://web.archive.org/web/20230101000000/https://example.com/",
                "timestamp": "20230101000000"
            }
        }
    }"#;

    #[test]
    fn test_availability_found() {
        let resp: AvailabilityResponse = serde_json::from_str(AVAILABLE_JSON).unwrap();
        assert_eq!(resp.snapshot_url(), Some("http://web.archive.org/web/20230101000000/https://example.com/"));
    }

    #[test]
    fn test_availability_empty() {
        let resp: AvailabilityResponse =
            serde_json::from_str(r#"{"url": "example.com", "archived_snapshots": {}}"#).unwrap();
        assert_eq!(resp.snapshot_url(), None);

        let resp: AvailabilityResponse = serde_json::from_str(
            r#"{"archived_snapshots": {"closest": {"available": false, "url": "http://x"}}}"#,
        )
        .unwrap();
        assert_eq!(resp.snapshot_url(), None);
    }

    #[test]
    fn test_job_states() {
        let pending: JobStatusResponse = serde_json::from_str(r#"{"status": "pending", "job_id": "abc"}"#).unwrap();
        assert_eq!(pending.state(), JobState::Pending);

        let done: JobStatusResponse =
            serde_json::from_str(r#"{"status": "success", "timestamp": "20230101000000", "http_status": 200}"#)
                .unwrap();
        assert_eq!(done.state(), JobState::Success { timestamp: Some("20230101000000".into()) });

        let failed: JobStatusResponse =
            serde_json::from_str(r#"{"status": "error", "status_ext": "error:too-many-daily-captures"}"#).unwrap();
        assert_eq!(failed.state(), JobState::Other("error".into()));
    }

    #[test]
    fn test_sparkline_parse() {
        let json = r#"{
            "years": {"2022": [0,0,0,0,0,0,0,0,0,0,1,2], "2023": [3,0,0,0,0,0,0,0,0,0,0,0]},
            "first_ts": "20221105120000",
            "last_ts": "20230114093000",
            "status": {"2022": "422222222222", "2023": "242222222222"}
        }"#;
        let resp: SparklineResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.years.len(), 2);
        assert_eq!(resp.years["2022"][11], 2);
        assert_eq!(resp.first_ts.as_deref(), Some("20221105120000"));
    }
}
