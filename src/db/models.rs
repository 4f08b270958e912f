use crate::session::snapshot::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Listing row for a saved session; the snapshot itself is loaded on demand.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SavedSessionInfo {
    pub id: String,
    pub title: String,
    pub experience: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SavedSession {
    #[serde(flatten)]
    pub info: SavedSessionInfo,
    pub snapshot: SessionSnapshot,
}
