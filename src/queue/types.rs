//! Wire types for the render-queue API. Field names follow the queue's
//! camelCase JSON contract.

use serde::{Deserialize, Serialize};

use crate::classify::StemType;

/// One queued render job as returned by `GET /api/worker/pending-renders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRender {
    pub id: String,
    /// Display title, diagnostic only.
    pub title: String,
    /// Archive locator: absolute URL or a path relative to the API base.
    pub project_archive_url: String,
}

/// Envelope of the pending-renders response.
#[derive(Debug, Deserialize)]
pub struct PendingResponse {
    #[serde(default)]
    pub tracks: Vec<PendingRender>,
}

/// One classified stem in the completion report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StemUpload {
    pub stem_url: String,
    pub stem_type: StemType,
    pub label: String,
    pub order: u32,
}

/// Body of `POST /api/worker/tracks/{id}/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub stems: Vec<StemUpload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_url: Option<String>,
}
