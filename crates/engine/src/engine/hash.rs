//! Stable snapshot hashing for deterministic verification.
//! Kept separate so hashing concerns stay out of the tick loop.

use std::hash::Hasher;

use xxhash_rust::xxh3::Xxh3;

use super::*;

impl Engine {
    /// Canonical state hash used by replay equality checks. Covers
    /// everything a tick can mutate: entities, tile flags, script
    /// variables, and the scroll pair.
    pub fn snapshot_hash(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.write_u64(self.seed);
        hasher.write_u64(self.tick);
        hasher.write_u8(u8::from(self.quit_requested));
        hasher.write_u8(u8::from(self.paused));
        hasher.write_u8(match self.player_dead {
            None => 0,
            Some(DeathCause::Normal) => 1,
            Some(DeathCause::Fried) => 2,
            Some(DeathCause::Shocked) => 3,
            Some(DeathCause::Grabbed) => 4,
        });

        for (_, e) in self.registry.iter() {
            hasher.write_u8(e.kind as u8);
            hasher.write_i32(e.x);
            hasher.write_i32(e.y);
            hasher.write_u8(e.level);
            hasher.write_u8(e.dir as u8);
            hasher.write_i32(e.x_vel);
            hasher.write_i32(e.y_vel);
            match e.goal {
                None => hasher.write_u8(0),
                Some(goal) => {
                    hasher.write_u8(1);
                    hasher.write_i32(goal.x);
                    hasher.write_i32(goal.y);
                }
            }
        }

        for word in self.world.flag_words() {
            hasher.write_u32(word);
        }

        if let Some(script) = &self.script {
            hasher.write_u8(script.state.room);
            hasher.write_u8(script.state.moves);
            hasher.write_u8(u8::from(script.state.is_dark));
            for &v in &script.state.vars {
                hasher.write_u8(v);
            }
        }

        let (sx, sy) = self.compositor.scroll();
        hasher.write_i32(sx);
        hasher.write_i32(sy);
        hasher.finish()
    }
}
