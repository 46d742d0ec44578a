use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;

use crate::entity::Registry;
use crate::ports::NullSound;
use crate::types::{
    DeathCause, Dir, EngineConfig, EntityId, EntityKind, EntityState, LogEvent, Pos,
    SoundId, TileFlags,
};
use crate::world::{MarkerKind, PathMarker, WorldGrid};

use super::checkpoints::MaintEffect;
use super::{BehaviorState, Ctx, WanderMode, run_entity, shooters};

/// Standalone tick context: a world, a registry, and null ports.
struct Harness {
    world: WorldGrid,
    registry: Registry,
    sound: NullSound,
    rng: ChaCha8Rng,
    log: Vec<LogEvent>,
    config: EngineConfig,
    player_dead: Option<DeathCause>,
}

impl Harness {
    fn new(world: WorldGrid) -> Self {
        Self::with_config(world, EngineConfig::default())
    }

    fn with_config(world: WorldGrid, config: EngineConfig) -> Self {
        Self {
            world,
            registry: Registry::new(&config),
            sound: NullSound::default(),
            rng: ChaCha8Rng::seed_from_u64(7),
            log: Vec::new(),
            config,
            player_dead: None,
        }
    }

    fn ctx(&mut self) -> Ctx<'_> {
        Ctx {
            world: &mut self.world,
            registry: &mut self.registry,
            sound: &mut self.sound,
            rng: &mut self.rng,
            log: &mut self.log,
            config: &self.config,
            player_dead: &mut self.player_dead,
        }
    }

    /// Spawn already marked on-screen, which is what the visibility
    /// pass would do for anything inside the viewport.
    fn spawn(&mut self, kind: EntityKind, dir: Dir, tile: Pos, level: u8) -> EntityId {
        let id = self.registry.spawn(kind, dir, tile, level);
        self.registry.get_mut(id).unwrap().on_screen = true;
        id
    }

    fn tick(&mut self, id: EntityId) {
        let mut ctx = self.ctx();
        run_entity(id, &mut ctx);
    }

    fn tile_of(&self, id: EntityId) -> Pos {
        self.registry.get(id).unwrap().tile
    }

    fn missile_count(&self) -> usize {
        self.registry.iter().filter(|(_, e)| e.kind == EntityKind::Missile).count()
    }
}

fn walled(width: usize, height: usize) -> WorldGrid {
    let mut grid = WorldGrid::new(width, height);
    for x in 0..width as i32 {
        grid.set_tile_flags(Pos { y: 0, x }, TileFlags::SOLID);
        grid.set_tile_flags(Pos { y: height as i32 - 1, x }, TileFlags::SOLID);
    }
    for y in 0..height as i32 {
        grid.set_tile_flags(Pos { y, x: 0 }, TileFlags::SOLID);
        grid.set_tile_flags(Pos { y, x: width as i32 - 1 }, TileFlags::SOLID);
    }
    grid
}

// ---------------------------------------------------------------------------
// Turn-on-wall patrol
// ---------------------------------------------------------------------------

#[test]
fn patroller_turns_clockwise_at_a_wall() {
    let mut h = Harness::new(walled(8, 8));
    let bot = h.spawn(EntityKind::TurnBot, Dir::Right, Pos { y: 3, x: 6 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Down);
    assert!(e.goal.is_none());
    assert_eq!(e.state, EntityState::standing(Dir::Down));
}

#[test]
fn patroller_walks_open_ground_one_tile_at_a_time() {
    let mut h = Harness::new(walled(8, 8));
    let bot = h.spawn(EntityKind::TurnBot, Dir::Right, Pos { y: 3, x: 2 }, 1);

    h.tick(bot);
    assert_eq!(h.registry.get(bot).unwrap().goal, Some(Pos { y: 3, x: 3 }));
    for _ in 0..16 {
        h.tick(bot);
    }
    // Two walls away; never past them.
    assert!(h.tile_of(bot).x <= 6);
}

// ---------------------------------------------------------------------------
// Right-hand wall follower
// ---------------------------------------------------------------------------

#[test]
fn follower_runs_along_the_wall_on_its_flank() {
    // Corridor at y=5 hugging the bottom wall of an 10x7 grid; the
    // follower faces east with the wall on its right flank.
    let mut h = Harness::new(walled(10, 7));
    let bot = h.spawn(EntityKind::RightBot, Dir::Right, Pos { y: 5, x: 2 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Right);
    // Scans forward to the far corner in one decision.
    assert_eq!(e.goal, Some(Pos { y: 5, x: 8 }));
}

#[test]
fn follower_rounds_a_pillar_keeping_it_on_the_right() {
    // Single pillar dead ahead; the follower ends up circling it,
    // which means heading up with the pillar on its right flank.
    let mut grid = walled(8, 8);
    grid.set_tile_flags(Pos { y: 3, x: 4 }, TileFlags::SOLID);
    let mut h = Harness::new(grid);
    let bot = h.spawn(EntityKind::RightBot, Dir::Right, Pos { y: 3, x: 3 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Up);
    assert_eq!(e.goal, Some(Pos { y: 2, x: 3 }));
}

#[test]
fn boxed_in_follower_reverses_instead_of_spinning() {
    let mut grid = walled(8, 8);
    for (y, x) in [(2, 3), (4, 3), (3, 4)] {
        grid.set_tile_flags(Pos { y, x }, TileFlags::SOLID);
    }
    // Only the tile behind is open.
    let mut h = Harness::new(grid);
    let bot = h.spawn(EntityKind::RightBot, Dir::Right, Pos { y: 3, x: 3 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Left);
    assert_eq!(e.goal, Some(Pos { y: 3, x: 2 }));
}

#[test]
fn follower_probe_ignores_the_player() {
    let mut h = Harness::new(walled(10, 7));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 5, x: 5 }, 1);
    let bot = h.spawn(EntityKind::RightBot, Dir::Right, Pos { y: 5, x: 2 }, 1);

    h.tick(bot);
    // Same corner goal as with no player in the corridor.
    assert_eq!(h.registry.get(bot).unwrap().goal, Some(Pos { y: 5, x: 8 }));
}

// ---------------------------------------------------------------------------
// Shooting sub-protocol
// ---------------------------------------------------------------------------

#[test]
fn aligned_shot_spawns_one_double_speed_projectile() {
    let mut h = Harness::new(walled(10, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 7 }, 1);
    let bot = h.spawn(EntityKind::OmniBot, Dir::Right, Pos { y: 2, x: 2 }, 1);

    let armed = {
        let mut ctx = h.ctx();
        shooters::try_shoot(bot, &mut ctx, SoundId::OmniBotFire)
    };
    let armed = armed.expect("clear shot");
    assert!((16..24).contains(&armed));
    assert_eq!(h.missile_count(), 1);

    let (_, missile) =
        h.registry.iter().find(|(_, e)| e.kind == EntityKind::Missile).unwrap();
    assert_eq!(missile.x_vel, h.config.base_move_speed * 2);
    assert_eq!(missile.y_vel, 0);
    assert_eq!(missile.tile, Pos { y: 2, x: 3 });
}

#[test]
fn reduced_mode_halves_projectile_velocity() {
    let config = EngineConfig { action_mode: false, ..EngineConfig::default() };
    let mut h = Harness::with_config(walled(10, 6), config);
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 7 }, 1);
    let bot = h.spawn(EntityKind::OmniBot, Dir::Right, Pos { y: 2, x: 2 }, 1);

    let mut ctx = h.ctx();
    shooters::try_shoot(bot, &mut ctx, SoundId::OmniBotFire).expect("clear shot");
    drop(ctx);
    let (_, missile) =
        h.registry.iter().find(|(_, e)| e.kind == EntityKind::Missile).unwrap();
    assert_eq!(missile.x_vel, h.config.base_move_speed);
}

#[test]
fn misaligned_or_offscreen_shooters_hold_fire() {
    let mut h = Harness::new(walled(10, 8));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 5, x: 7 }, 1);
    let bot = h.spawn(EntityKind::OmniBot, Dir::Right, Pos { y: 2, x: 2 }, 1);

    {
        let mut ctx = h.ctx();
        assert!(shooters::try_shoot(bot, &mut ctx, SoundId::OmniBotFire).is_none());
    }

    // Aligned but culled off-screen.
    let mut h = Harness::new(walled(10, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 7 }, 1);
    let bot = h.spawn(EntityKind::OmniBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
    h.registry.get_mut(bot).unwrap().on_screen = false;
    let mut ctx = h.ctx();
    assert!(shooters::try_shoot(bot, &mut ctx, SoundId::OmniBotFire).is_none());
}

#[test]
fn refire_window_limits_shots_to_one() {
    let mut h = Harness::new(walled(12, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 9 }, 1);
    let bot = h.spawn(EntityKind::OmniBot, Dir::Right, Pos { y: 2, x: 2 }, 1);

    // 14 ticks: the bot reaches its first tile boundary and fires
    // there, and the shortest possible refire window (16) keeps the
    // trigger closed for every remaining tick.
    for _ in 0..14 {
        h.tick(bot);
    }
    let shots = h
        .log
        .iter()
        .filter(|e| matches!(e, LogEvent::Spawned { kind: EntityKind::Missile, .. }))
        .count();
    assert_eq!(shots, 1);
}

#[test]
fn turret_rotates_on_cadence_without_moving() {
    let mut h = Harness::new(walled(8, 8));
    let bot = h.spawn(EntityKind::FourFirer, Dir::Up, Pos { y: 3, x: 3 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Right);
    assert_eq!(e.tile, Pos { y: 3, x: 3 });
    // Second turn only after the 16-tick cadence runs out.
    for _ in 0..15 {
        h.tick(bot);
    }
    assert_eq!(h.registry.get(bot).unwrap().dir, Dir::Right);
    h.tick(bot);
    assert_eq!(h.registry.get(bot).unwrap().dir, Dir::Down);
}

// ---------------------------------------------------------------------------
// Pusher
// ---------------------------------------------------------------------------

#[test]
fn pusher_moves_the_pair_in_lockstep() {
    let mut h = Harness::new(walled(10, 6));
    let bot = h.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
    let boxed = h.spawn(EntityKind::Crate, Dir::None, Pos { y: 2, x: 3 }, 1);

    h.tick(bot);
    assert_eq!(h.registry.get(bot).unwrap().goal, Some(Pos { y: 2, x: 3 }));
    assert_eq!(h.registry.get(boxed).unwrap().goal, Some(Pos { y: 2, x: 4 }));
    assert!(h.log.contains(&LogEvent::Sound { id: SoundId::CrateSlide, looping: false }));
    assert!(!h.log.contains(&LogEvent::Sound { id: SoundId::PushBotStrain, looping: false }));

    // Walk both until the step completes; they never share a tile.
    for _ in 0..10 {
        h.tick(bot);
        h.tick(boxed);
        assert_ne!(h.tile_of(bot), h.tile_of(boxed));
    }
    assert_eq!(h.tile_of(bot), Pos { y: 2, x: 3 });
    assert_eq!(h.tile_of(boxed), Pos { y: 2, x: 4 });
}

#[test]
fn pusher_reverses_when_the_push_lane_is_closed() {
    let mut grid = walled(10, 6);
    grid.set_tile_flags(Pos { y: 2, x: 4 }, TileFlags::SOLID);
    let mut h = Harness::new(grid);
    let bot = h.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
    h.spawn(EntityKind::Crate, Dir::None, Pos { y: 2, x: 3 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Left);
    assert_eq!(e.goal, Some(Pos { y: 2, x: 1 }));
    assert!(h.log.contains(&LogEvent::Sound { id: SoundId::PushBotStrain, looping: false }));
}

#[test]
fn floating_props_are_walked_over_not_pushed() {
    let mut h = Harness::new(walled(10, 6));
    let bot = h.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
    let raft = h.spawn(EntityKind::Crate, Dir::None, Pos { y: 2, x: 3 }, 1);
    if let Some(o) = h.registry.get_mut(raft) {
        o.state = EntityState::Floating;
    }

    h.tick(bot);
    assert_eq!(h.registry.get(bot).unwrap().goal, Some(Pos { y: 2, x: 3 }));
    assert!(h.registry.get(raft).unwrap().goal.is_none());
    assert!(!h.log.iter().any(|event| matches!(event, LogEvent::Sound { .. })));
}

#[test]
fn barrel_pushes_play_the_matching_slide_sound() {
    let mut h = Harness::new(walled(10, 6));
    let bot = h.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
    h.spawn(EntityKind::HeavyBarrel, Dir::None, Pos { y: 2, x: 3 }, 1);

    h.tick(bot);
    assert!(h.log.contains(&LogEvent::Sound { id: SoundId::HeavySlide, looping: false }));
}

#[test]
fn pushed_prop_inherits_the_bot_speed() {
    let config = EngineConfig { action_mode: false, ..EngineConfig::default() };
    let mut h = Harness::with_config(walled(10, 6), config);
    let bot = h.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
    let boxed = h.spawn(EntityKind::Crate, Dir::None, Pos { y: 2, x: 3 }, 1);

    h.tick(bot);
    let (bot_speed, prop_speed) = (
        h.registry.get(bot).unwrap().move_speed,
        h.registry.get(boxed).unwrap().move_speed,
    );
    assert_eq!(bot_speed, prop_speed);
    assert_eq!(
        h.registry.get(boxed).unwrap().x_vel,
        h.registry.get(bot).unwrap().x_vel,
    );
}

#[test]
fn cornered_pusher_stays_put() {
    let mut grid = walled(10, 6);
    grid.set_tile_flags(Pos { y: 2, x: 3 }, TileFlags::SOLID);
    grid.set_tile_flags(Pos { y: 2, x: 1 }, TileFlags::SOLID);
    let mut h = Harness::new(grid);
    let bot = h.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert!(e.goal.is_none());
    assert_eq!((e.x_vel, e.y_vel), (0, 0));
    assert_eq!(e.tile, Pos { y: 2, x: 2 });
}

// ---------------------------------------------------------------------------
// Wander-then-act walker
// ---------------------------------------------------------------------------

fn wanderer_with_sequence(h: &mut Harness, sequence: u16, mode: WanderMode) -> EntityId {
    let bot = h.spawn(EntityKind::MaintBot, Dir::Right, Pos { y: 3, x: 3 }, 1);
    h.registry.get_mut(bot).unwrap().behavior = BehaviorState::Wanderer {
        sequence,
        mode,
        saved_dir: Dir::Right,
        used_something: false,
    };
    bot
}

#[test]
fn stop_marker_arms_the_use_sequence() {
    let mut grid = walled(8, 8);
    grid.add_marker(PathMarker {
        tile: Pos { y: 3, x: 3 },
        kind: MarkerKind::Stop,
        dir: Dir::None,
    });
    let mut h = Harness::new(grid);
    let bot = h.spawn(EntityKind::MaintBot, Dir::Right, Pos { y: 3, x: 3 }, 1);

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(
        e.behavior,
        BehaviorState::Wanderer {
            sequence: 64,
            mode: WanderMode::UseObject,
            saved_dir: Dir::Right,
            used_something: false,
        }
    );
    assert_eq!((e.x_vel, e.y_vel), (0, 0));
}

#[test]
fn use_checkpoint_latches_on_an_occupied_tile_ahead() {
    let mut h = Harness::new(walled(8, 8));
    let bot = wanderer_with_sequence(&mut h, 31, WanderMode::UseObject);
    h.spawn(EntityKind::Crate, Dir::None, Pos { y: 3, x: 4 }, 1);

    // 31 -> 30 fires UseAhead.
    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.state, EntityState::using(Dir::Right));
    assert!(matches!(
        e.behavior,
        BehaviorState::Wanderer { sequence: 30, used_something: true, .. }
    ));
    assert!(
        h.log.contains(&LogEvent::Sound { id: SoundId::MaintBotWhistle, looping: false })
    );

    // Count down to 25, which clears the latch.
    for _ in 0..5 {
        h.tick(bot);
    }
    assert!(matches!(
        h.registry.get(bot).unwrap().behavior,
        BehaviorState::Wanderer { sequence: 25, used_something: false, .. }
    ));
}

#[test]
fn use_checkpoint_skips_the_latch_when_nothing_is_ahead() {
    let mut h = Harness::new(walled(8, 8));
    let bot = wanderer_with_sequence(&mut h, 31, WanderMode::UseObject);

    h.tick(bot);
    assert!(matches!(
        h.registry.get(bot).unwrap().behavior,
        BehaviorState::Wanderer { used_something: false, .. }
    ));
    assert!(
        !h.log.contains(&LogEvent::Sound { id: SoundId::MaintBotWhistle, looping: false })
    );
}

#[test]
fn sequence_end_resumes_the_saved_direction() {
    let mut h = Harness::new(walled(8, 8));
    let bot = wanderer_with_sequence(&mut h, 1, WanderMode::UseObject);

    // 1 -> 0 fires Resume, which walks off in the saved direction.
    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.dir, Dir::Right);
    assert_eq!(e.goal, Some(Pos { y: 3, x: 4 }));
}

#[test]
fn junction_checkpoints_glance_both_ways() {
    let mut h = Harness::new(walled(8, 8));
    let bot = wanderer_with_sequence(&mut h, 41, WanderMode::Junction);

    // 41 -> 40 is the clockwise glance.
    h.tick(bot);
    assert_eq!(h.registry.get(bot).unwrap().dir, Dir::Down);
    // 30 is the counter-clockwise glance.
    for _ in 0..10 {
        h.tick(bot);
    }
    assert_eq!(h.registry.get(bot).unwrap().dir, Dir::Up);
}

#[test]
fn maint_effects_apply_without_a_live_sequence() {
    let mut h = Harness::new(walled(8, 8));
    let bot = wanderer_with_sequence(&mut h, 10, WanderMode::UseObject);

    let mut ctx = h.ctx();
    super::apply_maint_effect(bot, &mut ctx, MaintEffect::LookLeft);
    drop(ctx);
    assert_eq!(h.registry.get(bot).unwrap().dir, Dir::Up);
}

// ---------------------------------------------------------------------------
// Wait-then-decide chaser
// ---------------------------------------------------------------------------

/// A chaser one waiting tick away from deciding, facing east.
fn chaser_ready(h: &mut Harness, tile: Pos) -> EntityId {
    let bot = h.spawn(EntityKind::DeadEye, Dir::Right, tile, 1);
    h.registry.get_mut(bot).unwrap().behavior =
        BehaviorState::Chaser { sequence: 1, blink: 0, step: (0, 0) };
    bot
}

#[test]
fn clear_sight_line_starts_a_double_speed_charge() {
    let mut h = Harness::new(walled(12, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 8 }, 1);
    let bot = chaser_ready(&mut h, Pos { y: 2, x: 2 });

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.move_speed, h.config.base_move_speed * 2);
    assert_eq!(e.dir, Dir::Right);
    assert_eq!(e.goal, Some(Pos { y: 2, x: 8 }));
    assert!(matches!(e.behavior, BehaviorState::Chaser { sequence: 0, blink: 20, .. }));
}

#[test]
fn blocked_sight_line_charges_up_to_the_obstruction() {
    let mut grid = walled(12, 6);
    grid.set_tile_flags(Pos { y: 2, x: 5 }, TileFlags::SOLID);
    let mut h = Harness::new(grid);
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 8 }, 1);
    let bot = chaser_ready(&mut h, Pos { y: 2, x: 2 });

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.move_speed, h.config.base_move_speed * 2);
    assert_eq!(e.goal, Some(Pos { y: 2, x: 4 }));
    assert!(matches!(e.behavior, BehaviorState::Chaser { sequence: 0, blink: 20, .. }));
}

#[test]
fn cornered_sighting_burns_the_wait_without_moving() {
    let mut grid = walled(12, 6);
    grid.set_tile_flags(Pos { y: 2, x: 3 }, TileFlags::SOLID);
    let mut h = Harness::new(grid);
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 8 }, 1);
    let bot = chaser_ready(&mut h, Pos { y: 2, x: 2 });
    h.registry.get_mut(bot).unwrap().behavior =
        BehaviorState::Chaser { sequence: 40, blink: 0, step: (0, 0) };

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert!(e.goal.is_none());
    assert_eq!(e.move_speed, h.config.base_move_speed);
    assert!(matches!(e.behavior, BehaviorState::Chaser { sequence: 0, blink: 20, .. }));
}

#[test]
fn player_off_the_facing_line_goes_unseen() {
    let mut h = Harness::new(walled(12, 6));
    // Clear row to the east, but the bot looks south.
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 8 }, 1);
    let bot = h.spawn(EntityKind::DeadEye, Dir::Down, Pos { y: 2, x: 2 }, 1);
    h.registry.get_mut(bot).unwrap().behavior =
        BehaviorState::Chaser { sequence: 40, blink: 0, step: (0, 0) };

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert!(e.goal.is_none());
    assert_eq!(e.move_speed, h.config.base_move_speed);
    assert!(matches!(e.behavior, BehaviorState::Chaser { sequence: 39, .. }));
}

#[test]
fn sighting_interrupts_the_wait_sequence() {
    let mut h = Harness::new(walled(12, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 8 }, 1);
    let bot = chaser_ready(&mut h, Pos { y: 2, x: 2 });
    h.registry.get_mut(bot).unwrap().behavior =
        BehaviorState::Chaser { sequence: 40, blink: 0, step: (0, 0) };

    h.tick(bot);
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.goal, Some(Pos { y: 2, x: 8 }));
    assert!(matches!(e.behavior, BehaviorState::Chaser { sequence: 0, .. }));
}

#[test]
fn charging_contact_grabs_the_player() {
    let mut h = Harness::new(walled(12, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 5 }, 1);
    let bot = chaser_ready(&mut h, Pos { y: 2, x: 2 });

    for _ in 0..20 {
        h.tick(bot);
    }
    assert_eq!(h.player_dead, Some(DeathCause::Grabbed));
}

#[test]
fn finished_wander_leg_resets_speed_and_rearms() {
    // No player present, so nothing can interrupt the leg.
    let mut h = Harness::new(walled(12, 6));
    let bot = chaser_ready(&mut h, Pos { y: 2, x: 2 });
    // Mid-leg heading into the east wall.
    h.registry.get_mut(bot).unwrap().behavior =
        BehaviorState::Chaser { sequence: 0, blink: 0, step: (1, 0) };
    h.registry.get_mut(bot).unwrap().move_speed = h.config.base_move_speed * 2;

    // Walk the leg tile by tile until the wall stops it.
    for _ in 0..100 {
        h.tick(bot);
    }
    let e = h.registry.get(bot).unwrap();
    assert_eq!(e.tile, Pos { y: 2, x: 10 });
    assert_eq!(e.move_speed, h.config.base_move_speed);
    assert!(matches!(e.behavior, BehaviorState::Chaser { step: (0, 0), .. }));
}

// ---------------------------------------------------------------------------
// Rail rider
// ---------------------------------------------------------------------------

#[test]
fn rider_boards_carries_and_ejects_the_player() {
    let mut grid = walled(12, 6);
    grid.add_marker(PathMarker {
        tile: Pos { y: 2, x: 5 },
        kind: MarkerKind::Go,
        dir: Dir::Right,
    });
    grid.add_marker(PathMarker {
        tile: Pos { y: 2, x: 7 },
        kind: MarkerKind::Stop,
        dir: Dir::None,
    });
    let mut h = Harness::new(grid);
    let player = h.spawn(EntityKind::Player, Dir::Right, Pos { y: 2, x: 4 }, 1);
    let car = h.spawn(EntityKind::RailRider, Dir::Right, Pos { y: 2, x: 5 }, 1);

    // Standing next to the car, facing it: boards immediately.
    h.tick(car);
    assert!(matches!(
        h.registry.get(car).unwrap().behavior,
        BehaviorState::Rail { sequence: 1 }
    ));
    assert!(
        h.log.contains(&LogEvent::Sound { id: SoundId::RailRiderBoard, looping: false })
    );
    assert_eq!(h.tile_of(player), Pos { y: 2, x: 5 });

    // Ride to the stop marker, player pinned to the car throughout.
    for _ in 0..40 {
        h.tick(car);
        let (c, p) =
            (h.registry.get(car).unwrap(), h.registry.get(player).unwrap());
        assert_eq!((c.x, c.y), (p.x, p.y));
        if matches!(c.behavior, BehaviorState::Rail { sequence: 2 }) {
            break;
        }
    }
    assert_eq!(h.tile_of(car), Pos { y: 2, x: 7 });
    assert!(matches!(
        h.registry.get(car).unwrap().behavior,
        BehaviorState::Rail { sequence: 2 }
    ));

    // Eject: the car assigns an exit goal, the player's own tick
    // walks it, and the car returns to waiting once they clear.
    h.tick(car);
    assert!(h.registry.get(player).unwrap().goal.is_some());
    for _ in 0..10 {
        h.tick(player);
    }
    assert_ne!(h.tile_of(player), h.tile_of(car));
    h.tick(car);
    assert!(matches!(
        h.registry.get(car).unwrap().behavior,
        BehaviorState::Rail { sequence: 0 }
    ));
}

#[test]
fn rider_ignores_a_player_facing_away() {
    let mut h = Harness::new(walled(10, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 4 }, 1);
    let car = h.spawn(EntityKind::RailRider, Dir::Right, Pos { y: 2, x: 5 }, 1);

    h.tick(car);
    assert!(matches!(
        h.registry.get(car).unwrap().behavior,
        BehaviorState::Rail { sequence: 0 }
    ));
}

// ---------------------------------------------------------------------------
// Contact kills
// ---------------------------------------------------------------------------

#[test]
fn patroller_contact_kills_once() {
    let mut h = Harness::new(walled(8, 8));
    h.spawn(EntityKind::Player, Dir::Down, Pos { y: 3, x: 3 }, 1);
    let bot = h.spawn(EntityKind::TurnBot, Dir::Right, Pos { y: 3, x: 3 }, 1);

    h.tick(bot);
    assert_eq!(h.player_dead, Some(DeathCause::Normal));
    let kills = h
        .log
        .iter()
        .filter(|e| matches!(e, LogEvent::PlayerKilled { .. }))
        .count();
    assert_eq!(kills, 1);

    // A second contact does not double-report.
    h.tick(bot);
    let kills = h
        .log
        .iter()
        .filter(|e| matches!(e, LogEvent::PlayerKilled { .. }))
        .count();
    assert_eq!(kills, 1);
}

#[test]
fn missile_contact_kill_is_reported_with_its_cause() {
    let mut h = Harness::new(walled(10, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 2, x: 4 }, 1);
    let missile = h.spawn(EntityKind::Missile, Dir::Right, Pos { y: 2, x: 3 }, 1);
    h.registry.get_mut(missile).unwrap().x_vel = 32;

    h.tick(missile);
    assert_eq!(h.player_dead, Some(DeathCause::Normal));
    // The projectile is consumed by the hit.
    assert_eq!(h.missile_count(), 0);
}

#[test]
fn missile_explodes_against_solid_tiles() {
    let mut h = Harness::new(walled(10, 6));
    h.spawn(EntityKind::Player, Dir::Left, Pos { y: 4, x: 4 }, 1);
    let missile = h.spawn(EntityKind::Missile, Dir::Right, Pos { y: 2, x: 8 }, 1);
    h.registry.get_mut(missile).unwrap().x_vel = 32;

    h.tick(missile);
    assert_eq!(h.missile_count(), 0);
    assert!(h.log.contains(&LogEvent::Sound { id: SoundId::Explosion, looping: false }));
    assert!(h.player_dead.is_none());
}
