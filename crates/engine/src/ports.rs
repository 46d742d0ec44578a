//! Outbound ports. The engine core stays headless; audio (and any
//! future presentation concern) is reached through a trait object the
//! host injects at construction time.

use crate::types::SoundId;

pub trait SoundPort {
    fn play_sound(&mut self, id: SoundId, looping: bool);
    fn stop_all(&mut self) {}
}

/// Default port for headless runs and tests: swallows everything but
/// counts requests so tests can assert on emission.
#[derive(Debug, Default)]
pub struct NullSound {
    pub played: Vec<SoundId>,
}

impl SoundPort for NullSound {
    fn play_sound(&mut self, id: SoundId, _looping: bool) {
        self.played.push(id);
    }
}
