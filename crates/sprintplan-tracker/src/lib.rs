//! # sprintplan-tracker
//!
//! Client for the upstream work-tracking board and the normalizer that turns
//! its raw records into the internal model.
//!
//! The fetch is blocking and runs entirely before scheduling: a WIQL query
//! scoped to the configured area path returns the work-item ids, then a
//! batch endpoint returns the fields. Any transport, authentication or
//! empty-result failure aborts the run; a partial snapshot is never handed
//! to the scheduler.
//!
//! The same raw records can be read from a JSON snapshot on disk, which is
//! how offline re-runs and the CLI tests work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub mod normalize;

pub use normalize::{normalize, Backlog};

/// Fields requested from the batch endpoint, in one place so the query and
/// the deserializer cannot drift apart.
const FIELDS: [&str; 8] = [
    "System.Id",
    "System.Title",
    "System.WorkItemType",
    "System.State",
    "System.AreaPath",
    "System.IterationPath",
    "System.AssignedTo",
    "Microsoft.VSTS.Scheduling.OriginalEstimate",
];

/// Batch endpoint page size
const BATCH_SIZE: usize = 200;

/// Upstream fetch failure (always fatal, pre-scheduling)
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("transport error talking to the tracker: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tracker rejected the credentials (HTTP {0})")]
    Auth(u16),

    #[error("tracker returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("tracker returned no work items for the configured area path")]
    EmptyResponse,

    #[error("cannot read snapshot {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    SnapshotFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Wire Records
// ============================================================================

/// A work item exactly as the board returns it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawWorkItem {
    pub id: u64,
    pub fields: RawFields,
}

/// The field bag of a work item; names are the board's reference names
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFields {
    #[serde(rename = "System.Title")]
    pub title: String,

    #[serde(rename = "System.WorkItemType")]
    pub item_type: String,

    #[serde(rename = "System.State", default)]
    pub state: String,

    #[serde(rename = "System.AreaPath", default)]
    pub area_path: String,

    #[serde(rename = "System.IterationPath", default)]
    pub iteration_path: String,

    #[serde(
        rename = "System.AssignedTo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<RawIdentity>,

    #[serde(
        rename = "Microsoft.VSTS.Scheduling.OriginalEstimate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_estimate: Option<f64>,

    #[serde(rename = "System.Parent", default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
}

/// Identity reference as the board serializes assignees
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawIdentity {
    #[serde(rename = "uniqueName")]
    pub unique_name: String,
}

#[derive(Debug, Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems")]
    work_items: Vec<WiqlRef>,
}

#[derive(Debug, Deserialize)]
struct WiqlRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    value: Vec<RawWorkItem>,
}

// ============================================================================
// Client
// ============================================================================

/// Blocking client for the board's REST surface
pub struct TrackerClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl TrackerClient {
    /// `base_url` is the project collection root; `token` a personal access
    /// token presented as basic-auth password.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TrackerError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Fetch every user story and task under `area_path` for `iteration`.
    ///
    /// The result is the complete snapshot or an error; never a partial one.
    pub fn fetch_work_items(
        &self,
        area_path: &str,
        iteration: &str,
    ) -> Result<Vec<RawWorkItem>, TrackerError> {
        let query = format!(
            "SELECT [System.Id] FROM WorkItems \
             WHERE [System.AreaPath] UNDER '{area_path}' \
             AND [System.IterationPath] = '{iteration}' \
             AND [System.WorkItemType] IN ('User Story', 'Task') \
             ORDER BY [System.Id]"
        );
        debug!(%query, "running WIQL query");

        let url = format!("{}/_apis/wit/wiql?api-version=7.0", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth("", Some(&self.token))
            .json(&serde_json::json!({ "query": query }))
            .send()?;
        let wiql: WiqlResponse = Self::check(response)?.json()?;

        let ids: Vec<u64> = wiql.work_items.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Err(TrackerError::EmptyResponse);
        }
        info!(count = ids.len(), "work items matched the query");

        let mut items = Vec::with_capacity(ids.len());
        let url = format!("{}/_apis/wit/workitemsbatch?api-version=7.0", self.base_url);
        for chunk in ids.chunks(BATCH_SIZE) {
            let response = self
                .http
                .post(&url)
                .basic_auth("", Some(&self.token))
                .json(&serde_json::json!({ "ids": chunk, "fields": FIELDS }))
                .send()?;
            let batch: BatchResponse = Self::check(response)?.json()?;
            items.extend(batch.value);
        }

        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    fn check(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, TrackerError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TrackerError::Auth(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TrackerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Read raw work items from a JSON snapshot file (same wire shape)
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Vec<RawWorkItem>, TrackerError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| TrackerError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut items: Vec<RawWorkItem> =
        serde_json::from_str(&raw).map_err(|source| TrackerError::SnapshotFormat {
            path: path.to_path_buf(),
            source,
        })?;
    if items.is_empty() {
        return Err(TrackerError::EmptyResponse);
    }
    items.sort_by_key(|item| item.id);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_fields_deserialize_by_reference_name() {
        let raw = r#"
        {
            "id": 3101,
            "fields": {
                "System.Title": "[BE] payment gateway",
                "System.WorkItemType": "Task",
                "System.State": "Active",
                "System.AreaPath": "Acme\\Checkout",
                "System.IterationPath": "Acme\\2024\\Q1\\S6",
                "System.AssignedTo": { "uniqueName": "ana@acme.com" },
                "Microsoft.VSTS.Scheduling.OriginalEstimate": 6.0,
                "System.Parent": 3100
            }
        }"#;

        let item: RawWorkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.id, 3101);
        assert_eq!(item.fields.title, "[BE] payment gateway");
        assert_eq!(item.fields.original_estimate, Some(6.0));
        assert_eq!(
            item.fields.assigned_to.as_ref().unwrap().unique_name,
            "ana@acme.com"
        );
        assert_eq!(item.fields.parent, Some(3100));
    }

    #[test]
    fn optional_fields_default_to_none() {
        let raw = r#"
        {
            "id": 9,
            "fields": {
                "System.Title": "[QA] Plano de Testes",
                "System.WorkItemType": "Task"
            }
        }"#;

        let item: RawWorkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.fields.assigned_to, None);
        assert_eq!(item.fields.original_estimate, None);
        assert_eq!(item.fields.parent, None);
        assert_eq!(item.fields.state, "");
    }

    #[test]
    fn wire_records_round_trip() {
        let item = RawWorkItem {
            id: 7,
            fields: RawFields {
                title: "[FE] form".into(),
                item_type: "Task".into(),
                state: "New".into(),
                area_path: "A".into(),
                iteration_path: "A\\S1".into(),
                assigned_to: Some(RawIdentity {
                    unique_name: "bia@acme.com".into(),
                }),
                original_estimate: Some(3.0),
                parent: None,
            },
        };

        let json = serde_json::to_string(&item).unwrap();
        let back: RawWorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
