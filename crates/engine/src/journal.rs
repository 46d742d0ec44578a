//! Sparse record of host inputs, keyed by the tick they were applied
//! on. A journal plus the seed is enough to re-run a session.

use serde::{Deserialize, Serialize};

use crate::engine::InputSnapshot;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputJournal {
    pub format_version: u16,
    pub build_id: String,
    pub seed: u64,
    pub inputs: Vec<InputRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputRecord {
    /// Tick the payload was applied on.
    pub seq: u64,
    pub payload: InputPayload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum InputPayload {
    Tick(InputSnapshot),
}

impl InputJournal {
    pub fn new(seed: u64) -> Self {
        Self {
            format_version: 1,
            build_id: "dev".to_string(),
            seed,
            inputs: Vec::new(),
        }
    }

    /// Record a non-default snapshot. Default ticks are left out; the
    /// dense expansion fills them back in.
    pub fn append_tick(&mut self, seq: u64, snapshot: InputSnapshot) {
        self.inputs.push(InputRecord { seq, payload: InputPayload::Tick(snapshot) });
    }

    /// Expand the sparse records into one snapshot per tick, default
    /// snapshots filling the gaps, sized to cover the last record.
    pub fn dense_inputs(&self) -> Vec<InputSnapshot> {
        let len = self
            .inputs
            .iter()
            .map(|r| r.seq + 1)
            .max()
            .unwrap_or(0) as usize;
        let mut out = vec![InputSnapshot::default(); len];
        for record in &self.inputs {
            let InputPayload::Tick(snapshot) = &record.payload;
            out[record.seq as usize] = *snapshot;
        }
        out
    }
}
