//! Deterministic re-run of a journaled session: a fresh engine, the
//! journal's seed, and its input stream must land on the same
//! snapshot hash the live session did.

use crate::engine::Engine;
use crate::journal::InputJournal;
use crate::types::{ScriptError, StopReason};

#[derive(Debug, PartialEq)]
pub enum ReplayError {
    /// The engine was built with a different seed than the journal
    /// was recorded under.
    SeedMismatch { engine: u64, journal: u64 },
    /// Replay requires a fresh engine; a partially advanced one
    /// cannot reproduce the recorded run.
    StaleEngine { tick: u64 },
    /// A journaled command tripped a rule fault mid-replay.
    RuleFault(ScriptError),
}

#[derive(Debug, PartialEq)]
pub struct ReplayResult {
    pub final_stop: StopReason,
    pub final_snapshot_hash: u64,
    pub final_tick: u64,
}

/// Drive `engine` through the journal's recorded window and on until
/// `max_ticks`, something requests a quit, or the player dies.
pub fn replay_to_end(
    engine: &mut Engine,
    journal: &InputJournal,
    max_ticks: u32,
) -> Result<ReplayResult, ReplayError> {
    if engine.seed() != journal.seed {
        return Err(ReplayError::SeedMismatch {
            engine: engine.seed(),
            journal: journal.seed,
        });
    }
    if engine.current_tick() != 0 {
        return Err(ReplayError::StaleEngine { tick: engine.current_tick() });
    }

    let inputs = journal.dense_inputs();
    let batch = engine.advance(max_ticks, &inputs).map_err(ReplayError::RuleFault)?;

    Ok(ReplayResult {
        final_stop: batch.stop_reason,
        final_snapshot_hash: engine.snapshot_hash(),
        final_tick: engine.current_tick(),
    })
}
