use super::*;
use crate::script::{Item, Room, read_rules};
use crate::types::{StopReason, TileFlags};
use crate::world::WorldGrid;

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

fn engine_with_player(seed: u64) -> (Engine, EntityId) {
    let mut engine = Engine::new(seed, EngineConfig::default(), walled(10, 10));
    let player = engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 4, x: 4 }, 1);
    (engine, player)
}

fn move_input(dir: Dir) -> InputSnapshot {
    InputSnapshot { dir, ..Default::default() }
}

#[test]
fn held_direction_walks_the_player_one_tile() {
    let (mut engine, player) = engine_with_player(1);
    for _ in 0..8 {
        engine.tick(&move_input(Dir::Right)).unwrap();
    }
    let p = engine.registry().get(player).unwrap();
    assert_eq!(p.tile, Pos { y: 4, x: 5 });
    assert!(p.goal.is_none());
}

#[test]
fn blocked_direction_turns_without_moving() {
    let mut engine = Engine::new(1, EngineConfig::default(), walled(10, 10));
    let player = engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 4, x: 1 }, 1);

    engine.tick(&move_input(Dir::Left)).unwrap();
    let p = engine.registry().get(player).unwrap();
    assert_eq!(p.tile, Pos { y: 4, x: 1 });
    assert_eq!(p.dir, Dir::Left);
    assert!(p.goal.is_none());
}

#[test]
fn modal_pause_freezes_simulation_but_keeps_polling() {
    let (mut engine, player) = engine_with_player(1);
    let pause = InputSnapshot { pause: true, ..Default::default() };

    engine.tick(&pause).unwrap();
    assert!(engine.paused());
    assert_eq!(engine.current_tick(), 0);

    // Movement is swallowed while paused, and ticks do not count.
    engine.tick(&move_input(Dir::Right)).unwrap();
    assert_eq!(engine.current_tick(), 0);
    assert!(engine.registry().get(player).unwrap().goal.is_none());

    // The resume keypress is still seen.
    engine.tick(&pause).unwrap();
    assert!(!engine.paused());
    engine.tick(&move_input(Dir::Right)).unwrap();
    assert_eq!(engine.current_tick(), 2);
    assert!(engine.registry().get(player).unwrap().goal.is_some());
}

#[test]
fn advance_reports_quit_and_budget_stops() {
    let (mut engine, _) = engine_with_player(1);
    let result = engine.advance(5, &[]).unwrap();
    assert_eq!(result.simulated_ticks, 5);
    assert_eq!(result.stop_reason, StopReason::BudgetExhausted);

    let quit = InputSnapshot { quit: true, ..Default::default() };
    let result = engine.advance(10, &[quit]).unwrap();
    assert_eq!(result.stop_reason, StopReason::QuitRequested);
}

#[test]
fn player_death_lingers_then_stops_the_batch() {
    let mut engine = Engine::new(1, EngineConfig::default(), walled(10, 10));
    engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 4, x: 4 }, 1);
    // A patroller on the same tile makes contact as soon as the
    // visibility pass marks it on-screen.
    engine.spawn(EntityKind::TurnBot, Dir::Right, Pos { y: 4, x: 4 }, 1);

    let result = engine.advance(100, &[]).unwrap();
    assert_eq!(result.stop_reason, StopReason::PlayerDead);
    assert_eq!(engine.player_dead(), Some(DeathCause::Normal));
    // The linger window ran before the batch stopped.
    assert!(result.simulated_ticks >= u32::from(super::DEATH_LINGER));
    assert!(result.simulated_ticks < 100);
}

#[test]
fn same_seed_and_inputs_reproduce_the_same_hash() {
    let build = |seed| {
        let mut engine = Engine::new(seed, EngineConfig::default(), walled(12, 12));
        engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 2, x: 2 }, 1);
        engine.spawn(EntityKind::DeadEye, Dir::Up, Pos { y: 8, x: 8 }, 1);
        engine.spawn(EntityKind::TurnBot, Dir::Right, Pos { y: 5, x: 2 }, 1);
        engine
    };
    let inputs: Vec<InputSnapshot> = (0..30).map(|_| move_input(Dir::Right)).collect();

    let mut a = build(123);
    let mut b = build(123);
    a.advance(80, &inputs).unwrap();
    b.advance(80, &inputs).unwrap();
    assert_eq!(a.snapshot_hash(), b.snapshot_hash());

    let mut c = build(124);
    c.advance(80, &inputs).unwrap();
    assert_ne!(a.snapshot_hash(), c.snapshot_hash());
}

#[test]
fn command_input_runs_a_full_rule_pass() {
    let (mut engine, _) = engine_with_player(1);
    // One rule: verb 2 / noun 3 in room 1 prints message 5.
    let bytes = [1, 2, 3, 8, 0, 1, 0x09, 5, 0xff];
    let rules = read_rules(&bytes).unwrap();
    let rooms =
        vec![Room { connections: [0; 6], picture: 1, cur_picture: 1 }];
    let state = ScriptState::new(rooms, Vec::<Item>::new(), 4);
    engine.attach_rules(rules, state);

    let command =
        InputSnapshot { command: Some((2, 3)), ..Default::default() };
    engine.tick(&command).unwrap();
    assert!(engine.log().contains(&LogEvent::Message { id: 5 }));

    // A non-matching pair leaves the log untouched.
    let before = engine.log().len();
    let command =
        InputSnapshot { command: Some((9, 9)), ..Default::default() };
    engine.tick(&command).unwrap();
    assert_eq!(engine.log().len(), before);
}

#[test]
fn snapshot_restores_world_entities_and_tick() {
    let mut engine = Engine::new(5, EngineConfig::default(), walled(10, 10));
    engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 4, x: 4 }, 1);
    engine.spawn(EntityKind::Crate, Dir::None, Pos { y: 6, x: 6 }, 1);

    engine.advance(3, &[]).unwrap();
    let snap = engine.take_snapshot("mid-run");
    let hash_at_save = engine.snapshot_hash();

    // Diverge: walk right and punch a hole in a wall.
    let inputs: Vec<InputSnapshot> =
        (0..10).map(|_| move_input(Dir::Right)).collect();
    engine.advance(10, &inputs).unwrap();
    engine.world_mut().set_tile_flags(Pos { y: 0, x: 3 }, TileFlags::NONE);
    assert_ne!(engine.snapshot_hash(), hash_at_save);

    engine.restore_snapshot(&snap).unwrap();
    assert_eq!(engine.current_tick(), 3);
    assert_eq!(engine.snapshot_hash(), hash_at_save);
}

#[test]
fn snapshot_for_a_different_map_is_rejected_without_damage() {
    let mut small = Engine::new(5, EngineConfig::default(), walled(6, 6));
    small.spawn(EntityKind::Player, Dir::Down, Pos { y: 2, x: 2 }, 1);
    let snap = small.take_snapshot("small");

    let mut big = Engine::new(5, EngineConfig::default(), walled(10, 10));
    big.spawn(EntityKind::Player, Dir::Down, Pos { y: 4, x: 4 }, 1);
    let hash_before = big.snapshot_hash();

    assert_eq!(
        big.restore_snapshot(&snap),
        Err(crate::types::SnapshotError::LengthMismatch { found: 36, expected: 100 })
    );
    assert_eq!(big.snapshot_hash(), hash_before);
}

#[test]
fn snapshot_with_the_wrong_variable_count_is_rejected_without_damage() {
    let (mut engine, _) = engine_with_player(3);
    let rules = read_rules(&[0xff]).unwrap();
    let rooms = vec![Room { connections: [0; 6], picture: 1, cur_picture: 1 }];
    engine.attach_rules(rules, ScriptState::new(rooms, Vec::<Item>::new(), 4));

    let mut snap = engine.take_snapshot("vars");
    assert_eq!(snap.variables.len(), 4);
    snap.variables = vec![9, 9];

    let hash_before = engine.snapshot_hash();
    assert_eq!(
        engine.restore_snapshot(&snap),
        Err(crate::types::SnapshotError::VariableCountMismatch { found: 2, expected: 4 })
    );
    assert_eq!(engine.snapshot_hash(), hash_before);
}

#[test]
fn behavior_pass_runs_in_stable_registry_order() {
    // Two pushers sharing a lane: the same ordering every run means
    // the same winner every run.
    let build = || {
        let mut engine = Engine::new(9, EngineConfig::default(), walled(12, 6));
        engine.spawn(EntityKind::Player, Dir::Down, Pos { y: 4, x: 1 }, 1);
        engine.spawn(EntityKind::PushBot, Dir::Right, Pos { y: 2, x: 2 }, 1);
        engine.spawn(EntityKind::Crate, Dir::None, Pos { y: 2, x: 5 }, 1);
        engine.spawn(EntityKind::PushBot, Dir::Left, Pos { y: 2, x: 8 }, 1);
        engine
    };
    let mut a = build();
    let mut b = build();
    a.advance(60, &[]).unwrap();
    b.advance(60, &[]).unwrap();
    assert_eq!(a.snapshot_hash(), b.snapshot_hash());
}
