//! Sparse checkpoint tables for sequence-driven behaviors.
//!
//! A sequence is a per-entity countdown; only the literal values
//! listed here trigger effects, and the effect differs qualitatively
//! at each threshold. Each behavior kind keys its own table — these
//! are not percentage timers.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::types::SoundId;

/// Effects of the wander-then-act walker's sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaintEffect {
    /// Ambient hum, first variant.
    Hum,
    /// Ambient hum, second variant.
    Hum2,
    /// Face 90 degrees clockwise from the saved travel direction.
    LookRight,
    /// Face 90 degrees counter-clockwise.
    LookLeft,
    /// Perform a "use" against whatever occupies the tile ahead.
    UseAhead,
    /// Clear the used-something latch.
    ClearUsed,
    /// Drop back to standing frames.
    Stand,
    /// Restore the saved direction and resume walking.
    Resume,
    /// Roll a random direction and walk off (4-way junction).
    Decide,
}

/// Effects of the wait-then-decide chaser and the ambient idler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChaserEffect {
    /// Roll a random facing, optionally with an ambient sound.
    LookRoll { sound: Option<SoundId> },
    /// Commit a bounded random wander leg (chaser) or re-arm (idler).
    Wander,
}

/// Use-an-object sequence, armed at 64 when the walker stops on a
/// stop marker: hum, use, unlatch, stand, resume.
pub fn maint_use_table() -> &'static BTreeMap<u16, MaintEffect> {
    static TABLE: OnceLock<BTreeMap<u16, MaintEffect>> = OnceLock::new();
    TABLE.get_or_init(|| {
        BTreeMap::from([
            (50, MaintEffect::Hum),
            (30, MaintEffect::UseAhead),
            (25, MaintEffect::ClearUsed),
            (20, MaintEffect::Stand),
            (0, MaintEffect::Resume),
        ])
    })
}

/// Four-way junction sequence, armed at 64: hum, glance right, glance
/// left, hum again, pick a direction and go.
pub fn maint_junction_table() -> &'static BTreeMap<u16, MaintEffect> {
    static TABLE: OnceLock<BTreeMap<u16, MaintEffect>> = OnceLock::new();
    TABLE.get_or_init(|| {
        BTreeMap::from([
            (50, MaintEffect::Hum),
            (40, MaintEffect::LookRight),
            (30, MaintEffect::LookLeft),
            (25, MaintEffect::Hum2),
            (0, MaintEffect::Decide),
        ])
    })
}

/// Wait-then-decide look-around: random facings at 50/40/30/20/10
/// (ambient cues at the first and last), wander commit at 0.
pub fn chaser_wait_table() -> &'static BTreeMap<u16, ChaserEffect> {
    static TABLE: OnceLock<BTreeMap<u16, ChaserEffect>> = OnceLock::new();
    TABLE.get_or_init(|| {
        BTreeMap::from([
            (50, ChaserEffect::LookRoll { sound: Some(SoundId::DeadEyeAmbient1) }),
            (40, ChaserEffect::LookRoll { sound: None }),
            (30, ChaserEffect::LookRoll { sound: None }),
            (20, ChaserEffect::LookRoll { sound: None }),
            (10, ChaserEffect::LookRoll { sound: Some(SoundId::DeadEyeAmbient2) }),
            (0, ChaserEffect::Wander),
        ])
    })
}
