//! Maintenance walker: follows path markers laid down by the level,
//! stopping to run a checkpoint sequence at stop markers and picking
//! a fresh direction at four-way junctions.

use crate::types::{Dir, EntityId, EntityState, SoundId};
use crate::world::MarkerKind;

use super::checkpoints::{MaintEffect, maint_junction_table, maint_use_table};
use super::{BehaviorState, Ctx, WanderMode, roll_direction};

pub(super) fn wanderer(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let BehaviorState::Wanderer { sequence, mode, saved_dir, used_something } = e.behavior
    else {
        return;
    };
    let has_goal = e.goal.is_some();
    let (x, y) = (e.x, e.y);
    let on_screen = e.on_screen;

    // Sequence in flight: count down and fire checkpoint effects.
    if sequence > 0 {
        let next = sequence - 1;
        if let Some(e) = ctx.registry.get_mut(id) {
            e.behavior =
                BehaviorState::Wanderer { sequence: next, mode, saved_dir, used_something };
        }
        let table = match mode {
            WanderMode::UseObject => maint_use_table(),
            WanderMode::Junction => maint_junction_table(),
        };
        if let Some(&effect) = table.get(&next) {
            apply_maint_effect(id, ctx, effect);
        }
        if let Some(e) = ctx.registry.get_mut(id) {
            e.animate_frames();
        }
        return;
    }

    if has_goal {
        // Bumping the player is harmless here; the walker just
        // grumbles and keeps going.
        let tile_size = ctx.config.tile_size;
        let on_even = x % tile_size == 0 && y % tile_size == 0;
        if on_screen && on_even && ctx.hit_player(x, y) {
            ctx.play_sound(SoundId::MaintBotHum);
        }
        ctx.registry.walk_step(id);
    } else {
        find_goal(id, ctx);
        if let Some(e) = ctx.registry.get_mut(id) {
            e.animate_frames();
        }
    }
}

fn arm(id: EntityId, ctx: &mut Ctx, mode: WanderMode) {
    if let Some(e) = ctx.registry.get_mut(id) {
        let dir = e.dir;
        let used = matches!(
            e.behavior,
            BehaviorState::Wanderer { used_something: true, .. }
        );
        e.behavior = BehaviorState::Wanderer {
            sequence: 64,
            mode,
            saved_dir: dir,
            used_something: used,
        };
        e.x_vel = 0;
        e.y_vel = 0;
        e.state = EntityState::standing(dir);
    }
}

/// Commit the next tile in `dir` as the goal if it is open. Returns
/// whether a goal was set.
fn try_walk(id: EntityId, ctx: &mut Ctx, dir: Dir) -> bool {
    let Some(e) = ctx.registry.get(id) else {
        return false;
    };
    let level = e.level;
    let (dx, dy) = dir.delta();
    let ahead = e.tile.offset(dx, dy);
    let (hit, ok) = ctx.registry.legal_move(ctx.world, ahead, level);
    if !ok || hit.is_some() {
        return false;
    }
    if let Some(e) = ctx.registry.get_mut(id) {
        e.dir = dir;
        e.state = EntityState::moving(dir);
    }
    ctx.registry.set_goal(id, ahead);
    true
}

/// Roll random directions until an open one turns up, falling back to
/// an exhaustive clockwise sweep so a walkable walker never stalls.
fn decide(id: EntityId, ctx: &mut Ctx) {
    let mut dir = roll_direction(ctx);
    for _ in 0..4 {
        if try_walk(id, ctx, dir) {
            return;
        }
        dir = dir.clockwise();
    }
}

fn find_goal(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let tile = e.tile;
    let dir = e.dir;

    match ctx.world.marker_at(tile).copied() {
        Some(m) if m.kind == MarkerKind::Stop => arm(id, ctx, WanderMode::UseObject),
        Some(m) if m.kind == MarkerKind::FourWay => arm(id, ctx, WanderMode::Junction),
        Some(m) => {
            // Go marker: turn to its direction and keep walking.
            if !try_walk(id, ctx, m.dir) {
                decide(id, ctx);
            }
        }
        None => {
            if !try_walk(id, ctx, dir) {
                decide(id, ctx);
            }
        }
    }
}

/// Apply one checkpoint effect to the walker. Shared with the
/// behavior test harness so sequences can be probed tick by tick.
pub(crate) fn apply_maint_effect(id: EntityId, ctx: &mut Ctx, effect: MaintEffect) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let BehaviorState::Wanderer { sequence, mode, saved_dir, used_something } = e.behavior
    else {
        return;
    };
    let on_screen = e.on_screen;
    let level = e.level;
    let tile = e.tile;

    match effect {
        MaintEffect::Hum => {
            if on_screen {
                ctx.play_sound(SoundId::MaintBotHum);
            }
        }
        MaintEffect::Hum2 => {
            if on_screen {
                ctx.play_sound(SoundId::MaintBotHum2);
            }
        }
        MaintEffect::LookRight => {
            let faced = saved_dir.clockwise();
            if let Some(e) = ctx.registry.get_mut(id) {
                e.dir = faced;
                e.state = EntityState::standing(faced);
            }
        }
        MaintEffect::LookLeft => {
            let faced = saved_dir.counter_clockwise();
            if let Some(e) = ctx.registry.get_mut(id) {
                e.dir = faced;
                e.state = EntityState::standing(faced);
            }
        }
        MaintEffect::UseAhead => {
            let (dx, dy) = saved_dir.delta();
            let ahead = tile.offset(dx, dy);
            let target = ctx.registry.find_at_level(ahead, level);
            if let Some(e) = ctx.registry.get_mut(id) {
                e.state = EntityState::using(saved_dir);
                e.behavior = BehaviorState::Wanderer {
                    sequence,
                    mode,
                    saved_dir,
                    used_something: target.is_some(),
                };
            }
            if target.is_some() && on_screen {
                ctx.play_sound(SoundId::MaintBotWhistle);
            }
        }
        MaintEffect::ClearUsed => {
            if let Some(e) = ctx.registry.get_mut(id) {
                e.behavior = BehaviorState::Wanderer {
                    sequence,
                    mode,
                    saved_dir,
                    used_something: false,
                };
            }
        }
        MaintEffect::Stand => {
            if let Some(e) = ctx.registry.get_mut(id) {
                e.state = EntityState::standing(saved_dir);
            }
        }
        MaintEffect::Resume => {
            if let Some(e) = ctx.registry.get_mut(id) {
                e.dir = saved_dir;
                e.state = EntityState::moving(saved_dir);
            }
            if !try_walk(id, ctx, saved_dir) {
                decide(id, ctx);
            }
        }
        MaintEffect::Decide => decide(id, ctx),
    }
}
