//! Fixed-tick driver: polls an input snapshot, runs the behavior pass
//! over every live entity in registry order, redraws the surface, and
//! services countdown timers, one logical tick at a time on a single
//! thread.

use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::behavior::{self, Ctx};
use crate::entity::Registry;
use crate::gfx::{BlitOptions, Compositor, Image};
use crate::ports::{NullSound, SoundPort};
use crate::script::{Interp, RuleSet, ScriptState};
use crate::snapshot::{EntityRecord, Snapshot};
use crate::types::{
    AdvanceResult, DeathCause, Dir, EngineConfig, EntityId, EntityKind, LogEvent, Pos,
    ScriptError, SnapshotError, StopReason,
};
use crate::world::WorldGrid;

mod hash;

#[cfg(test)]
mod tests;

/// Ticks the engine lingers after a player death before an advance
/// batch reports it, so the death pose gets drawn.
const DEATH_LINGER: u16 = 16;

/// Abstract per-tick input. Raw device polling stays outside the
/// core; hosts translate whatever they read into this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    /// Movement intent; `Dir::None` means no movement key held.
    pub dir: Dir,
    /// Toggles the modal pause.
    pub pause: bool,
    pub quit: bool,
    /// Verb/noun pair to run a full rule pass with this tick.
    pub command: Option<(u8, u8)>,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self { dir: Dir::None, pause: false, quit: false, command: None }
    }
}

pub struct Engine {
    seed: u64,
    tick: u64,
    config: EngineConfig,
    rng: ChaCha8Rng,
    world: WorldGrid,
    registry: Registry,
    compositor: Compositor,
    tile_sprites: BTreeMap<u16, Image>,
    entity_sprites: BTreeMap<u16, Image>,
    sound: Box<dyn SoundPort>,
    rules: Option<RuleSet>,
    script: Option<Interp>,
    log: Vec<LogEvent>,
    paused: bool,
    quit_requested: bool,
    player_dead: Option<DeathCause>,
    death_timer: Option<u16>,
}

impl Engine {
    pub fn new(seed: u64, config: EngineConfig, world: WorldGrid) -> Self {
        let surface_w =
            (world.width() as i32 * config.tile_size).max(config.viewport_width);
        let surface_h =
            (world.height() as i32 * config.tile_size).max(config.viewport_height);
        Self {
            seed,
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            registry: Registry::new(&config),
            compositor: Compositor::new(surface_w, surface_h, &config),
            config,
            world,
            tile_sprites: BTreeMap::new(),
            entity_sprites: BTreeMap::new(),
            sound: Box::new(NullSound::default()),
            rules: None,
            script: None,
            log: Vec::new(),
            paused: false,
            quit_requested: false,
            player_dead: None,
            death_timer: None,
        }
    }

    pub fn with_sound(mut self, sound: Box<dyn SoundPort>) -> Self {
        self.sound = sound;
        self
    }

    /// Attach a parsed rule set and the script world it acts on.
    pub fn attach_rules(&mut self, rules: RuleSet, state: ScriptState) {
        self.rules = Some(rules);
        self.script = Some(Interp::new(state));
    }

    pub fn load_tile_sprite(&mut self, picture: u16, image: Image) {
        self.tile_sprites.insert(picture, image);
    }

    pub fn load_entity_sprite(&mut self, key: u16, image: Image) {
        self.entity_sprites.insert(key, image);
    }

    /// Bank key of an entity's current frame. Hosts load one image
    /// per (kind, direction, frame) slot under this key.
    pub fn sprite_key(kind: EntityKind, dir: Dir, frame: u8) -> u16 {
        let dir_slot = match dir {
            Dir::None | Dir::Up => 0u16,
            Dir::Down => 1,
            Dir::Left => 2,
            Dir::Right => 3,
        };
        (kind as u16) << 8 | dir_slot << 4 | frame as u16
    }

    pub fn spawn(&mut self, kind: EntityKind, dir: Dir, tile: Pos, level: u8) -> EntityId {
        let id = self.registry.spawn(kind, dir, tile, level);
        self.log.push(LogEvent::Spawned { id, kind, tile });
        id
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldGrid {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldGrid {
        &mut self.world
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn script(&self) -> Option<&Interp> {
        self.script.as_ref()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn log(&self) -> &[LogEvent] {
        &self.log
    }

    pub fn player_dead(&self) -> Option<DeathCause> {
        self.player_dead
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// One logical tick. While the modal pause is active only input
    /// polling runs, so the resume keypress is still seen.
    pub fn tick(&mut self, input: &InputSnapshot) -> Result<(), ScriptError> {
        if input.quit {
            self.quit_requested = true;
        }
        if input.pause {
            self.paused = !self.paused;
        }
        if self.paused || self.quit_requested {
            return Ok(());
        }

        self.apply_player_intent(input.dir);

        if let Some((verb, noun)) = input.command
            && let (Some(rules), Some(script)) = (&self.rules, &mut self.script)
        {
            script.run_all(rules, verb, noun, &mut self.log)?;
            if script.quit_requested() {
                self.quit_requested = true;
            }
        }

        // Behavior pass: registry order is stable, which push chains
        // and same-tick shoot timing rely on.
        let ids = self.registry.ids();
        let mut ctx = Ctx {
            world: &mut self.world,
            registry: &mut self.registry,
            sound: &mut *self.sound,
            rng: &mut self.rng,
            log: &mut self.log,
            config: &self.config,
            player_dead: &mut self.player_dead,
        };
        for id in ids {
            behavior::run_entity(id, &mut ctx);
        }

        self.redraw();
        self.service_timers();
        self.tick += 1;
        Ok(())
    }

    /// Batch driver: run up to `max_ticks` ticks with the given input
    /// stream (ticks beyond the stream get the default snapshot) and
    /// report why the batch stopped.
    pub fn advance(
        &mut self,
        max_ticks: u32,
        inputs: &[InputSnapshot],
    ) -> Result<AdvanceResult, ScriptError> {
        let mut simulated_ticks = 0;
        let default = InputSnapshot::default();
        while simulated_ticks < max_ticks {
            if self.quit_requested {
                return Ok(AdvanceResult {
                    simulated_ticks,
                    stop_reason: StopReason::QuitRequested,
                });
            }
            if self.death_timer == Some(0) {
                return Ok(AdvanceResult {
                    simulated_ticks,
                    stop_reason: StopReason::PlayerDead,
                });
            }
            let input = inputs.get(simulated_ticks as usize).unwrap_or(&default);
            self.tick(input)?;
            simulated_ticks += 1;
        }
        Ok(AdvanceResult { simulated_ticks, stop_reason: StopReason::BudgetExhausted })
    }

    /// Feed held movement keys into the player's goal. A blocked
    /// direction still turns the player to face it.
    fn apply_player_intent(&mut self, dir: Dir) {
        let Some(player) = self.registry.player_id() else {
            return;
        };
        if self.player_dead.is_some() || dir == Dir::None {
            return;
        }
        if self.registry.get(player).is_some_and(|p| p.goal.is_some()) {
            return;
        }
        let Some(p) = self.registry.get(player) else {
            return;
        };
        let level = p.level;
        let (dx, dy) = dir.delta();
        let ahead = p.tile.offset(dx, dy);
        let (hit, ok) = self.registry.legal_move(&self.world, ahead, level);
        if ok && hit.is_none() {
            if let Some(p) = self.registry.get_mut(player) {
                p.dir = dir;
                p.state = crate::types::EntityState::moving(dir);
            }
            self.registry.set_goal(player, ahead);
        } else if let Some(p) = self.registry.get_mut(player) {
            p.dir = dir;
            p.state = crate::types::EntityState::standing(dir);
        }
    }

    /// Recompute scroll from the player anchor, refresh visibility
    /// culls, and composite background, entities, and foreground onto
    /// the surface.
    pub fn redraw(&mut self) {
        if let Some(p) = self.registry.player() {
            self.compositor.follow_anchor(p.x, p.y);
        }
        self.update_visibility();
        self.compositor.clear(0);

        let tile_size = self.config.tile_size;
        for y in 0..self.world.height() as i32 {
            for x in 0..self.world.width() as i32 {
                let pos = Pos { y, x };
                let Some(tile) = self.world.tile_at(pos) else {
                    continue;
                };
                if let Some(pic) = tile.bg_picture
                    && let Some(image) = self.tile_sprites.get(&pic)
                {
                    self.compositor.blit(
                        image,
                        x * tile_size,
                        y * tile_size,
                        &BlitOptions::opaque(),
                    );
                }
            }
        }

        // Lower level first so upper-level walkers draw on top.
        for level in 1..=2u8 {
            for (_, e) in self.registry.iter() {
                if e.level != level || !e.on_screen {
                    continue;
                }
                let key = Self::sprite_key(e.kind, e.dir, e.anim_frame);
                if let Some(image) = self.entity_sprites.get(&key) {
                    self.compositor.blit(image, e.x, e.y, &BlitOptions::transparent());
                }
            }
        }

        for y in 0..self.world.height() as i32 {
            for x in 0..self.world.width() as i32 {
                let pos = Pos { y, x };
                let Some(tile) = self.world.tile_at(pos) else {
                    continue;
                };
                if let Some(pic) = tile.fg_picture
                    && let Some(image) = self.tile_sprites.get(&pic)
                {
                    self.compositor.blit(
                        image,
                        x * tile_size,
                        y * tile_size,
                        &BlitOptions::transparent(),
                    );
                }
            }
        }
    }

    /// On-screen flag: pixel rect intersects the scrolled viewport.
    fn update_visibility(&mut self) {
        let (sx, sy) = self.compositor.scroll();
        let (vw, vh) = (self.config.viewport_width, self.config.viewport_height);
        let tile_size = self.config.tile_size;
        let ids = self.registry.ids();
        for id in ids {
            if let Some(e) = self.registry.get_mut(id) {
                e.on_screen = e.x + tile_size > sx
                    && e.x < sx + vw
                    && e.y + tile_size > sy
                    && e.y < sy + vh;
            }
        }
    }

    /// Flatten the live state into a named snapshot.
    pub fn take_snapshot(&self, name: &str) -> Snapshot {
        let entities = self
            .registry
            .iter()
            .map(|(_, e)| EntityRecord {
                kind: e.kind,
                dir: e.dir,
                level: e.level,
                x: e.x,
                y: e.y,
                move_speed: e.move_speed,
                goal: e.goal,
            })
            .collect();
        let variables =
            self.script.as_ref().map(|s| s.state.vars.clone()).unwrap_or_default();
        Snapshot {
            name: name.to_string(),
            tick: self.tick,
            tile_flags: self.world.flag_words(),
            entities,
            variables,
        }
    }

    /// Replace the live state with a snapshot's. Validation happens
    /// before any mutation, so a rejected snapshot leaves the engine
    /// exactly as it was.
    pub fn restore_snapshot(&mut self, snap: &Snapshot) -> Result<(), SnapshotError> {
        let expected = self.world.width() as u32 * self.world.height() as u32;
        if snap.tile_flags.len() as u32 != expected {
            return Err(SnapshotError::LengthMismatch {
                found: snap.tile_flags.len() as u32,
                expected,
            });
        }

        let var_slots = self.script.as_ref().map_or(0, |s| s.state.vars.len());
        if snap.variables.len() != var_slots {
            return Err(SnapshotError::VariableCountMismatch {
                found: snap.variables.len() as u32,
                expected: var_slots as u32,
            });
        }

        self.world.restore_flag_words(&snap.tile_flags);

        let tile_size = self.config.tile_size;
        let mut registry = Registry::new(&self.config);
        for record in &snap.entities {
            let tile = Pos { y: record.y / tile_size, x: record.x / tile_size };
            let id = registry.spawn(record.kind, record.dir, tile, record.level);
            if let Some(e) = registry.get_mut(id) {
                e.x = record.x;
                e.y = record.y;
                e.move_speed = record.move_speed;
            }
            if let Some(goal) = record.goal {
                registry.set_goal(id, goal);
            }
        }
        self.registry = registry;

        if let Some(script) = &mut self.script {
            script.state.vars.copy_from_slice(&snap.variables);
        }

        self.tick = snap.tick;
        self.paused = false;
        self.player_dead = None;
        self.death_timer = None;
        Ok(())
    }

    /// Uniform countdown service: every engine-owned timer is
    /// decremented exactly once per tick, floored at zero.
    fn service_timers(&mut self) {
        if self.player_dead.is_some() && self.death_timer.is_none() {
            self.death_timer = Some(DEATH_LINGER);
        }
        if let Some(t) = &mut self.death_timer {
            *t = t.saturating_sub(1);
        }
    }
}
