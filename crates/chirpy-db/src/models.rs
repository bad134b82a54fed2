//! On-disk document types. Distinct from chirpy-types API models so the
//! storage layer stays independent of what clients see.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The whole database. Serialized as one JSON object; map keys for users and
/// chirps are the decimal form of the id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub chirps: BTreeMap<u64, ChirpRecord>,
    /// Highest chirp id ever assigned. Never decremented.
    #[serde(default)]
    pub chirp_last_id: u64,
    #[serde(default)]
    pub users: BTreeMap<u64, UserRecord>,
    #[serde(default)]
    pub revoked_tokens: BTreeMap<String, RevokedTokenRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub email: String,
    #[serde(rename = "password")]
    pub hashed_password: String,
    #[serde(rename = "is_chirpy_red", default)]
    pub is_upgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChirpRecord {
    pub id: u64,
    pub author_id: u64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedTokenRecord {
    pub token: String,
    pub revoked_at: DateTime<Utc>,
}
