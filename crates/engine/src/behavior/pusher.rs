//! Shove bot: marches along one axis, pushing loose objects ahead of
//! it and reversing when the way forward is closed.

use crate::types::{DeathCause, Dir, EntityId, EntityKind, EntityState, Pos, SoundId};

use super::Ctx;

pub(super) fn push_walker(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    if e.goal.is_some() {
        let (x, y) = (e.x, e.y);
        if e.on_screen && ctx.hit_player(x, y) && !ctx.player_dead() {
            ctx.kill_player(DeathCause::Normal);
        }
        ctx.registry.walk_step(id);
    } else {
        find_goal(id, ctx);
        if let Some(e) = ctx.registry.get_mut(id) {
            e.animate_frames();
        }
    }
}

/// One probe forward. An open tile is the next goal; a pushable
/// object with room behind it gets shoved (both goals are written in
/// the same tick, so the pair moves in lockstep no matter which of
/// them the engine steps first); a floating or melted prop is walked
/// over instead of pushed; anything else turns the bot around, and if
/// the reversed lane is also closed it stays put.
fn find_goal(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let level = e.level;
    let tile = e.tile;
    let on_screen = e.on_screen;
    let speed = e.move_speed;
    let mut dir = e.dir;

    for attempt in 0..2 {
        let (dx, dy) = dir.delta();
        let ahead = tile.offset(dx, dy);
        let (hit, ok) = ctx.registry.legal_move(ctx.world, ahead, level);

        if ok && hit.is_none() {
            commit(id, ctx, dir, ahead);
            return;
        }

        if let Some(hit) = hit {
            if Some(hit) == ctx.registry.player_id() {
                // The player soaks the hit instead of being pushed.
                if !ctx.player_dead() {
                    ctx.kill_player(DeathCause::Normal);
                }
                return;
            }
            let Some(prop) = ctx.registry.get(hit) else {
                return;
            };
            let (prop_kind, prop_state) = (prop.kind, prop.state);
            if prop_kind.is_pushable() {
                if rides_over(prop_state) {
                    // Sunk or melted props are solid footing, not cargo.
                    commit(id, ctx, dir, ahead);
                    return;
                }
                let beyond = ahead.offset(dx, dy);
                let (beyond_hit, beyond_ok) =
                    ctx.registry.legal_move(ctx.world, beyond, level);
                // Shoving onto a floating or melted object is allowed.
                let beyond_clear = beyond_hit
                    .is_none_or(|b| ctx.registry.get(b).is_some_and(|o| rides_over(o.state)));
                if beyond_ok && beyond_clear && prop_state != EntityState::Exploding {
                    // Speed is written before the goal so the prop's
                    // velocity matches the bot's for the whole step.
                    if let Some(o) = ctx.registry.get_mut(hit) {
                        o.dir = dir;
                        o.state = EntityState::moving(dir);
                        o.move_speed = speed;
                    }
                    ctx.registry.set_goal(hit, beyond);
                    commit(id, ctx, dir, ahead);
                    ctx.play_sound(slide_sound(prop_kind));
                    return;
                }
                if on_screen {
                    ctx.play_sound(SoundId::PushBotStrain);
                }
            }
        }

        if attempt == 0 {
            dir = dir.reverse();
        }
    }

    // Both lanes closed: stand facing the current direction.
    if let Some(e) = ctx.registry.get_mut(id) {
        e.dir = dir;
        e.state = EntityState::standing(dir);
        e.x_vel = 0;
        e.y_vel = 0;
    }
}

fn rides_over(state: EntityState) -> bool {
    matches!(state, EntityState::Floating | EntityState::Melted)
}

fn slide_sound(kind: EntityKind) -> SoundId {
    match kind {
        EntityKind::Crate => SoundId::CrateSlide,
        EntityKind::HeavyBarrel => SoundId::HeavySlide,
        _ => SoundId::LightSlide,
    }
}

fn commit(id: EntityId, ctx: &mut Ctx, dir: Dir, goal: Pos) {
    if let Some(e) = ctx.registry.get_mut(id) {
        e.dir = dir;
        e.state = EntityState::moving(dir);
    }
    ctx.registry.set_goal(id, goal);
}
