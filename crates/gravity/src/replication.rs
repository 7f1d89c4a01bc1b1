//! Server → client correction messages for networked sessions.
//!
//! The server runs the authoritative pipeline and periodically publishes one
//! [`CorrectionRecord`] per body. Clients run the same pipeline as prediction and
//! snap to the latest correction they receive. Transport is up to the host.

use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::registry::BodyId;

/// Which side of a session this system is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkRole {
    #[default]
    Standalone,
    /// Authoritative; publishes corrections.
    Server,
    /// Predicts locally; applies corrections.
    Client,
}

/// Authoritative state of one body at `timestamp` (simulation seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub body_id: BodyId,
    pub position: DVec3,
    pub velocity: DVec3,
    pub timestamp: f64,
}

/// Fixed-layout view of a [`CorrectionRecord`] for byte-level transports.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CorrectionRecordRaw {
    pub body_id: u64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub timestamp: f64,
}

impl From<&CorrectionRecord> for CorrectionRecordRaw {
    fn from(record: &CorrectionRecord) -> Self {
        Self {
            body_id: record.body_id.0,
            position: record.position.to_array(),
            velocity: record.velocity.to_array(),
            timestamp: record.timestamp,
        }
    }
}

impl From<CorrectionRecordRaw> for CorrectionRecord {
    fn from(raw: CorrectionRecordRaw) -> Self {
        Self {
            body_id: BodyId(raw.body_id),
            position: DVec3::from_array(raw.position),
            velocity: DVec3::from_array(raw.velocity),
            timestamp: raw.timestamp,
        }
    }
}

/// Pack records into a contiguous byte buffer.
pub fn encode_records(records: &[CorrectionRecord]) -> Vec<u8> {
    let raw: Vec<CorrectionRecordRaw> = records.iter().map(CorrectionRecordRaw::from).collect();
    bytemuck::cast_slice(&raw).to_vec()
}

/// Unpack a buffer produced by [`encode_records`]. Returns `None` on a length mismatch.
pub fn decode_records(bytes: &[u8]) -> Option<Vec<CorrectionRecord>> {
    let size = std::mem::size_of::<CorrectionRecordRaw>();
    if bytes.len() % size != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(size)
            .map(|chunk| CorrectionRecord::from(bytemuck::pod_read_unaligned::<CorrectionRecordRaw>(chunk)))
            .collect(),
    )
}

/// Decides when a server should broadcast.
#[derive(Debug, Clone)]
pub struct ReplicationPublisher {
    interval: f64,
    accumulator: f64,
}

impl ReplicationPublisher {
    pub fn new(interval: f64) -> Self {
        Self {
            interval: if interval.is_finite() && interval > 0.0 { interval } else { 0.1 },
            accumulator: 0.0,
        }
    }

    /// Advance by `dt`; true when a broadcast is due.
    pub fn advance(&mut self, dt: f64) -> bool {
        self.accumulator += dt.max(0.0);
        if self.accumulator >= self.interval {
            self.accumulator %= self.interval;
            true
        } else {
            false
        }
    }
}
