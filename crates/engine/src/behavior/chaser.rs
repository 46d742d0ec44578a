//! Wait-then-decide chaser: stands and looks around on a checkpoint
//! sequence, wanders a straight leg when the sequence runs out, and
//! charges at double speed when it spots the player down its facing
//! line.

use crate::types::{DeathCause, Dir, EntityId, EntityState, Pos};

use super::checkpoints::{ChaserEffect, chaser_wait_table};
use super::{BehaviorState, Ctx, roll_direction};

/// Ticks of the wide-eyed charge animation after a sighting.
const BLINK_FRAMES: u16 = 20;

pub(super) fn chaser(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let BehaviorState::Chaser { sequence, blink, step } = e.behavior else {
        return;
    };
    let has_goal = e.goal.is_some();
    let (x, y) = (e.x, e.y);
    let on_screen = e.on_screen;
    let blink = blink.saturating_sub(1);

    if sequence > 0 {
        let next = sequence - 1;
        let mut step = step;

        // Spotting the player ends the wait on the spot, even when
        // the charge lane turns out to be closed.
        if on_screen && blink == 0 && sees_player(id, ctx) {
            let reach = charge_reach(id, ctx);
            let double_speed = ctx.config.base_move_speed * 2;
            if let Some(e) = ctx.registry.get_mut(id) {
                e.behavior =
                    BehaviorState::Chaser { sequence: 0, blink: BLINK_FRAMES, step: (0, 0) };
                e.animate_frames();
            }
            if let Some(goal) = reach {
                if let Some(e) = ctx.registry.get_mut(id) {
                    e.move_speed = double_speed;
                    e.state = EntityState::moving(e.dir);
                }
                ctx.registry.set_goal(id, goal);
            }
            return;
        }

        if let Some(&effect) = chaser_wait_table().get(&next) {
            match effect {
                ChaserEffect::LookRoll { sound } => {
                    let dir = roll_direction(ctx);
                    if let Some(sound) = sound
                        && on_screen
                    {
                        ctx.play_sound(sound);
                    }
                    if let Some(e) = ctx.registry.get_mut(id) {
                        e.dir = dir;
                        e.state = EntityState::standing(dir);
                    }
                }
                ChaserEffect::Wander => {
                    let dir = roll_direction(ctx);
                    step = dir.delta();
                    if let Some(e) = ctx.registry.get_mut(id) {
                        e.dir = dir;
                        e.state = EntityState::moving(dir);
                    }
                }
            }
        }
        if let Some(e) = ctx.registry.get_mut(id) {
            e.behavior = BehaviorState::Chaser { sequence: next, blink, step };
            e.animate_frames();
        }
        return;
    }

    if has_goal {
        if ctx.hit_player(x, y) && !ctx.player_dead() {
            ctx.kill_player(DeathCause::Grabbed);
            return;
        }
        ctx.registry.walk_step(id);
        if let Some(e) = ctx.registry.get_mut(id) {
            e.behavior = BehaviorState::Chaser { sequence, blink, step };
        }
        return;
    }

    // No wait and no goal: continue the wander leg, or rest and rearm.
    if step != (0, 0) {
        let Some(e) = ctx.registry.get(id) else {
            return;
        };
        let ahead = e.tile.offset(step.0, step.1);
        let level = e.level;
        let (hit, ok) = ctx.registry.legal_move(ctx.world, ahead, level);
        let player_ahead = hit.is_some() && hit == ctx.registry.player_id();
        if ok && (hit.is_none() || player_ahead) {
            ctx.registry.set_goal(id, ahead);
            if let Some(e) = ctx.registry.get_mut(id) {
                e.behavior = BehaviorState::Chaser { sequence, blink, step };
            }
            return;
        }
    }

    // Blocked or leg finished: stop, reset speed, wait out a new
    // sequence before moving again.
    let base_speed = ctx.config.base_move_speed;
    if let Some(e) = ctx.registry.get_mut(id) {
        let dir = e.dir;
        e.move_speed = base_speed;
        e.x_vel = 0;
        e.y_vel = 0;
        e.state = EntityState::standing(dir);
        e.behavior = BehaviorState::Chaser { sequence: 64, blink, step: (0, 0) };
    }
}

/// Positional sight test: the player sits somewhere along the bot's
/// facing direction, same row or column, same level. Occlusion does
/// not matter here; the charge leg handles that.
fn sees_player(id: EntityId, ctx: &Ctx) -> bool {
    let Some(e) = ctx.registry.get(id) else {
        return false;
    };
    let Some(p) = ctx.registry.player() else {
        return false;
    };
    if p.level != e.level || ctx.player_dead() {
        return false;
    }
    let from = e.tile;
    let to = p.tile;
    match e.dir {
        Dir::Up => to.x == from.x && to.y < from.y,
        Dir::Down => to.x == from.x && to.y > from.y,
        Dir::Left => to.y == from.y && to.x < from.x,
        Dir::Right => to.y == from.y && to.x > from.x,
        Dir::None => false,
    }
}

/// Walk the facing line tile by tile to find how far a charge can
/// get. Stops on the player's tile when the line is clear, or on the
/// last open tile before the first obstruction; `None` when even the
/// first step is blocked.
fn charge_reach(id: EntityId, ctx: &Ctx) -> Option<Pos> {
    let e = ctx.registry.get(id)?;
    let p = ctx.registry.player()?;
    let (dx, dy) = e.dir.delta();
    let mut reach = e.tile;
    loop {
        let next = reach.offset(dx, dy);
        let (hit, ok) = ctx.registry.legal_move(ctx.world, next, e.level);
        let blocked = !ok || hit.is_some_and(|h| Some(h) != ctx.registry.player_id());
        if blocked {
            break;
        }
        reach = next;
        if reach == p.tile {
            break;
        }
    }
    (reach != e.tile).then_some(reach)
}
