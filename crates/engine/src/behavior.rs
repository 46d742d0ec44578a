//! Per-entity behavior interpreter: one state machine per entity kind,
//! invoked once per tick. Every variant follows the same shape — a
//! sequence-active branch driven by sparse checkpoint tables, an
//! active-movement branch that walks toward a pending goal while
//! hit-testing the player, and a decision branch that commits a new
//! goal or sequence when neither is active.
//!
//! Behavior functions take the world, registry, and ports as explicit
//! context; there is no global engine handle.

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::Rng;

use crate::entity::Registry;
use crate::ports::SoundPort;
use crate::types::{
    DeathCause, Dir, EngineConfig, EntityId, EntityKind, EntityState, LogEvent, Pos, SoundId,
};
use crate::world::WorldGrid;

pub mod checkpoints;
mod chaser;
mod pusher;
mod rail;
mod shooters;
mod wall;
mod wander;

#[cfg(test)]
mod tests;

use checkpoints::ChaserEffect;

/// Per-kind behavior state. Selecting the variant by kind at spawn
/// time replaces the original engines' untyped `value1`/`value2`/
/// `sequence` scratch fields: the compiler now enforces which fields
/// exist for which kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BehaviorState {
    Player,
    Prop,
    /// Turn-on-wall patroller.
    Patrol,
    /// Right-hand wall follower.
    WallFollow,
    /// Patrolling shooter with a refire countdown.
    PatrolShooter { refire: u16 },
    /// Fixed-post shooter that rotates on its own cadence.
    Turret { refire: u16, rotate: u16 },
    /// Crate/barrel pusher.
    Pusher,
    /// Wander-then-act walker driven by path markers.
    Wanderer { sequence: u16, mode: WanderMode, saved_dir: Dir, used_something: bool },
    /// Wait-then-decide player chaser. `step` is the unit tile delta
    /// of the wander leg in flight.
    Chaser { sequence: u16, blink: u16, step: (i32, i32) },
    /// Scripted rail rider.
    Rail { sequence: i16 },
    Missile,
    /// Ambient idle looper (checkpoint-driven look-around).
    Idle { sequence: u16 },
}

/// What a wanderer's active sequence is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WanderMode {
    UseObject,
    Junction,
}

impl BehaviorState {
    pub fn initial(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Player => BehaviorState::Player,
            EntityKind::Crate | EntityKind::LightBarrel | EntityKind::HeavyBarrel => {
                BehaviorState::Prop
            }
            EntityKind::TurnBot => BehaviorState::Patrol,
            EntityKind::RightBot => BehaviorState::WallFollow,
            EntityKind::OmniBot => BehaviorState::PatrolShooter { refire: 0 },
            EntityKind::FourFirer => BehaviorState::Turret { refire: 0, rotate: 0 },
            EntityKind::PushBot => BehaviorState::Pusher,
            EntityKind::MaintBot => BehaviorState::Wanderer {
                sequence: 0,
                mode: WanderMode::UseObject,
                saved_dir: Dir::None,
                used_something: false,
            },
            EntityKind::DeadEye => {
                BehaviorState::Chaser { sequence: 64, blink: 0, step: (0, 0) }
            }
            EntityKind::RailRider => BehaviorState::Rail { sequence: 0 },
            EntityKind::Missile => BehaviorState::Missile,
            EntityKind::Idler => BehaviorState::Idle { sequence: 64 },
        }
    }
}

/// Tick context handed to every behavior function.
pub struct Ctx<'a> {
    pub world: &'a mut WorldGrid,
    pub registry: &'a mut Registry,
    pub sound: &'a mut dyn SoundPort,
    pub rng: &'a mut ChaCha8Rng,
    pub log: &'a mut Vec<LogEvent>,
    pub config: &'a EngineConfig,
    pub player_dead: &'a mut Option<DeathCause>,
}

impl Ctx<'_> {
    pub fn play_sound(&mut self, id: SoundId) {
        self.sound.play_sound(id, false);
        self.log.push(LogEvent::Sound { id, looping: false });
    }

    pub fn kill_player(&mut self, cause: DeathCause) {
        if self.player_dead.is_none() {
            *self.player_dead = Some(cause);
            self.log.push(LogEvent::PlayerKilled { cause });
        }
    }

    pub fn player_dead(&self) -> bool {
        self.player_dead.is_some()
    }

    /// Uniform roll in `0..n`.
    pub fn rand_below(&mut self, n: u32) -> u32 {
        debug_assert!(n > 0);
        (self.rng.next_u64() % u64::from(n)) as u32
    }

    /// Pixel-proximity collision with the player (within half a tile
    /// on both axes, same level implied by the caller).
    pub fn hit_player(&self, x: i32, y: i32) -> bool {
        let Some(p) = self.registry.player() else {
            return false;
        };
        let half = self.config.tile_size / 2;
        (p.x - x).abs() < half && (p.y - y).abs() < half
    }

    pub fn spawn(&mut self, kind: EntityKind, dir: Dir, tile: Pos, level: u8) -> EntityId {
        let id = self.registry.spawn(kind, dir, tile, level);
        self.log.push(LogEvent::Spawned { id, kind, tile });
        id
    }

    pub fn remove(&mut self, id: EntityId) {
        if let Some(e) = self.registry.remove(id) {
            self.log.push(LogEvent::Removed { id, kind: e.kind });
        }
    }
}

/// Run one entity's behavior for this tick. Missing ids (removed
/// earlier in the same tick) are skipped silently.
pub fn run_entity(id: EntityId, ctx: &mut Ctx) {
    let Some(kind) = ctx.registry.get(id).map(|e| e.kind) else {
        return;
    };
    match kind {
        EntityKind::Player => player_tick(id, ctx),
        EntityKind::TurnBot => patrol(id, ctx),
        EntityKind::RightBot => wall::wall_follow(id, ctx),
        EntityKind::OmniBot => shooters::patrol_shooter(id, ctx),
        EntityKind::FourFirer => shooters::turret(id, ctx),
        EntityKind::Missile => shooters::missile(id, ctx),
        EntityKind::PushBot => pusher::push_walker(id, ctx),
        EntityKind::MaintBot => wander::wanderer(id, ctx),
        EntityKind::DeadEye => chaser::chaser(id, ctx),
        EntityKind::RailRider => rail::rail_rider(id, ctx),
        EntityKind::Crate | EntityKind::LightBarrel | EntityKind::HeavyBarrel => {
            prop_tick(id, ctx)
        }
        EntityKind::Idler => idle_tick(id, ctx),
    }
}

/// The player only consumes goals here; goal selection happens in the
/// engine's input pass.
fn player_tick(id: EntityId, ctx: &mut Ctx) {
    if ctx.registry.get(id).is_some_and(|e| e.goal.is_some()) {
        ctx.registry.walk_step(id);
    } else if let Some(e) = ctx.registry.get_mut(id) {
        e.animate_frames();
    }
}

/// Pushed props walk their assigned goal; otherwise they sit still.
fn prop_tick(id: EntityId, ctx: &mut Ctx) {
    if ctx.registry.get(id).is_some_and(|e| e.goal.is_some()) {
        ctx.registry.walk_step(id);
    }
}

/// Ambient idler: look-around driven by the chaser checkpoint table,
/// re-arming at the terminal checkpoint instead of wandering.
fn idle_tick(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let on_screen = e.on_screen;
    let BehaviorState::Idle { sequence } = e.behavior else {
        return;
    };
    let sequence = sequence.saturating_sub(1);
    let mut next = sequence;
    if let Some(effect) = checkpoints::chaser_wait_table().get(&sequence) {
        match effect {
            ChaserEffect::LookRoll { sound } => {
                let dir = roll_direction(ctx);
                if let Some(sound) = *sound
                    && on_screen
                {
                    ctx.play_sound(sound);
                }
                if let Some(e) = ctx.registry.get_mut(id) {
                    e.dir = dir;
                    e.state = EntityState::standing(dir);
                }
            }
            ChaserEffect::Wander => next = 64,
        }
    }
    if let Some(e) = ctx.registry.get_mut(id) {
        e.behavior = BehaviorState::Idle { sequence: next };
        e.animate_frames();
    }
}

/// Turn-on-wall patrol: walk ahead until the next tile is solid or
/// water, then rotate 90 degrees clockwise in place.
fn patrol(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let has_goal = e.goal.is_some();
    let (x, y) = (e.x, e.y);
    let on_screen = e.on_screen;
    let tile_size = ctx.config.tile_size;

    if has_goal {
        ctx.registry.walk_step(id);
    } else {
        patrol_choose(id, ctx);
        ctx.registry.walk_step(id);
        if on_screen {
            ctx.play_sound(SoundId::TurnBotTurn);
        }
    }

    let on_even = x % tile_size == 0 && y % tile_size == 0;
    if on_screen && on_even && ctx.hit_player(x, y) && !ctx.player_dead() {
        ctx.kill_player(DeathCause::Normal);
    }
}

fn patrol_choose(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let dir = e.dir;
    let tile = e.tile;
    let (dx, dy) = dir.delta();
    let ahead = tile.offset(dx, dy);
    let blockers = crate::types::TileFlags::SOLID.union(crate::types::TileFlags::WATER);

    if ctx.world.flags_at(ahead).contains(blockers) {
        let turned = dir.clockwise();
        if let Some(e) = ctx.registry.get_mut(id) {
            e.x_vel = 0;
            e.y_vel = 0;
            e.anim_frame = 0;
            e.anim_delay = e.anim_cycle;
            e.dir = turned;
            e.state = EntityState::standing(turned);
        }
    } else {
        if let Some(e) = ctx.registry.get_mut(id) {
            e.state = EntityState::moving(dir);
        }
        ctx.registry.set_goal(id, ahead);
    }
}

pub(crate) fn roll_direction(ctx: &mut Ctx) -> Dir {
    match ctx.rand_below(4) {
        0 => Dir::Up,
        1 => Dir::Down,
        2 => Dir::Left,
        _ => Dir::Right,
    }
}

/// Maint-effect application shared by the wanderer module and tests.
pub(crate) use wander::apply_maint_effect;
