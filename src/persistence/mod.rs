//! On-disk checkpoints
//!
//! Snapshots are wrapped in a versioned JSON envelope. Writes go to a
//! temporary file first and are renamed into place, so a crash mid-write
//! never leaves a truncated save behind.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoint::Snapshot;

/// Bumped whenever the snapshot layout changes incompatibly
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("checkpoint io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint json invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("checkpoint version {found} not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    snapshot: Snapshot,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Encode a snapshot as an envelope
pub fn to_json(snapshot: &Snapshot) -> Result<String, PersistError> {
    let envelope = Envelope {
        version: SAVE_VERSION,
        snapshot: snapshot.clone(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode an envelope, checking the version before the payload
pub fn from_json(json: &str) -> Result<Snapshot, PersistError> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    if probe.version != SAVE_VERSION {
        return Err(PersistError::Version {
            found: probe.version,
            expected: SAVE_VERSION,
        });
    }
    let envelope: Envelope = serde_json::from_str(json)?;
    Ok(envelope.snapshot)
}

/// Write a snapshot to `path` (tmp file, then rename)
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), PersistError> {
    let json = to_json(snapshot)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    log::info!(
        "Checkpoint {} written to {} (score {})",
        snapshot.id,
        path.display(),
        snapshot.score()
    );
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<Snapshot, PersistError> {
    let json = fs::read_to_string(path)?;
    let snapshot = from_json(&json)?;
    log::info!("Checkpoint {} loaded from {}", snapshot.id, path.display());
    Ok(snapshot)
}
