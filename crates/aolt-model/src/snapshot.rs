//! Snapshot codec for chassis records.
//!
//! A snapshot is a JSON object:
//!
//! ```text
//! {"version": 1, "logical": {...}, "physical": {...}}
//! ```
//!
//! Back-references, logical-to-physical bindings and the binder cursor are
//! never written. [`decode`] relinks both trees, validates their shape and
//! replays the binder over the stored line cards in order.
//!
//! Blobs without a `version` field use the legacy layout: a bare physical
//! chassis. The logical chassis is then regenerated from its site, rack and
//! shelf.

use crate::error::{ChassisError, ChassisResult};
use crate::logical::LogicalChassis;
use crate::physical::PhysicalChassis;
use crate::record::ChassisRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u64,
    logical: &'a LogicalChassis,
    physical: &'a PhysicalChassis,
}

#[derive(Deserialize)]
struct SnapshotIn {
    logical: LogicalChassis,
    physical: PhysicalChassis,
}

/// Serializes a record.
pub fn encode(record: &ChassisRecord) -> ChassisResult<Vec<u8>> {
    let out = SnapshotOut {
        version: SNAPSHOT_VERSION,
        logical: record.logical(),
        physical: record.physical(),
    };
    Ok(serde_json::to_vec(&out)?)
}

/// Rebuilds a record, including its port bindings, from a snapshot.
pub fn decode(blob: &[u8]) -> ChassisResult<ChassisRecord> {
    let value: serde_json::Value = serde_json::from_slice(blob)?;
    if value.get("version").is_none() {
        let physical: PhysicalChassis = serde_json::from_value(value)?;
        info!(site = %physical.site, cards = physical.line_cards.len(), "loading legacy snapshot layout");
        let logical = LogicalChassis::generate(physical.site.clone(), physical.rack, physical.shelf);
        return ChassisRecord::from_parts(logical, physical);
    }

    if value["version"].as_u64() != Some(SNAPSHOT_VERSION) {
        return Err(ChassisError::snapshot(format!(
            "unsupported snapshot version {}",
            value["version"]
        )));
    }
    let snapshot: SnapshotIn = serde_json::from_value(value)?;
    ChassisRecord::from_parts(snapshot.logical, snapshot.physical)
}
