use serde::{Deserialize, Serialize};

/// Durable identity of an uploaded asset. Created only after a successful
/// remote upload; the sole artifact that survives past this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReference {
    /// Remote store file id, usable to request deletion later.
    pub asset_id: String,
    /// Path of the asset under the remote store root (e.g. `/locations/abc.jpg`).
    pub path: String,
    /// Publicly accessible URL.
    pub url: String,
    /// Thumbnail URL derived via query-parameter transformation, not a
    /// separately stored asset.
    pub thumbnail_url: String,
}
