//! Cloud-side collaborators: measurement uploads and style recommendation

use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("camera capture failed: {0}")]
    Capture(String),

    #[error("reverse image search failed: {0}")]
    Search(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Stores a daily skin moisture reading in the user's drive
pub trait SkinConditionUploader: Send {
    fn upload(&mut self, value: i32, date: NaiveDate) -> Result<(), RemoteError>;
}

/// Captures the user's outfit and finds similar styles
pub trait StyleRecommender: Send {
    /// `Ok(None)` means the search service found nothing usable
    fn capture_and_search(&mut self) -> Result<Option<Value>, RemoteError>;

    /// Publish results for the companion app to pick up
    fn upload(&mut self, results: &Value) -> Result<(), RemoteError>;
}
