//! Rail rider: a conveyance that waits at a station, carries the
//! player along Go markers when boarded, and ejects them at the next
//! Stop marker. Driven by a small sequence machine rather than a
//! checkpoint table; the states are ordered, not timed.

use crate::types::{Dir, EntityId, EntityState, SoundId};
use crate::world::MarkerKind;

use super::{BehaviorState, Ctx};

const WAITING: i16 = 0;
const RIDING: i16 = 1;
const EJECTING: i16 = 2;

pub(super) fn rail_rider(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let BehaviorState::Rail { sequence } = e.behavior else {
        return;
    };
    match sequence {
        RIDING => ride(id, ctx),
        EJECTING => eject(id, ctx),
        _ => wait(id, ctx),
    }
}

fn set_sequence(id: EntityId, ctx: &mut Ctx, sequence: i16) {
    if let Some(e) = ctx.registry.get_mut(id) {
        e.behavior = BehaviorState::Rail { sequence };
    }
}

/// Parked at a station. Boards the player the moment they stand next
/// to the car facing it.
fn wait(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let tile = e.tile;
    let level = e.level;
    let boarded = ctx.registry.player().is_some_and(|p| {
        let (dx, dy) = p.dir.delta();
        p.level == level && p.goal.is_none() && p.tile.offset(dx, dy) == tile
    });
    if boarded && !ctx.player_dead() {
        ctx.play_sound(SoundId::RailRiderBoard);
        carry_player(id, ctx);
        set_sequence(id, ctx, RIDING);
    } else if let Some(e) = ctx.registry.get_mut(id) {
        e.animate_frames();
    }
}

/// Underway. Go markers steer, Stop markers end the ride, and open
/// track continues straight; rails cross water freely. The player is
/// dragged pixel-for-pixel so they never lag the car.
fn ride(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let has_goal = e.goal.is_some();
    let tile = e.tile;
    let dir = e.dir;
    let level = e.level;

    if has_goal {
        ctx.registry.walk_step(id);
        carry_player(id, ctx);
        return;
    }

    let steer = match ctx.world.marker_at(tile).copied() {
        Some(m) if m.kind == MarkerKind::Stop => {
            set_sequence(id, ctx, EJECTING);
            return;
        }
        Some(m) if m.kind == MarkerKind::Go => m.dir,
        _ => dir,
    };
    let (dx, dy) = steer.delta();
    let ahead = tile.offset(dx, dy);
    if steer != Dir::None && ctx.world.passable_over_water(ahead, level) {
        if let Some(e) = ctx.registry.get_mut(id) {
            e.dir = steer;
            e.state = EntityState::moving(steer);
        }
        ctx.registry.set_goal(id, ahead);
        ctx.registry.walk_step(id);
        carry_player(id, ctx);
    } else {
        // Track ran out without a stop marker; end the ride here.
        set_sequence(id, ctx, EJECTING);
    }
}

/// Push the player off onto the first open neighboring tile, then go
/// back to waiting once they have cleared the car.
fn eject(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let tile = e.tile;
    let level = e.level;
    let player_here = ctx.registry.player().is_some_and(|p| p.tile == tile);
    if !player_here {
        set_sequence(id, ctx, WAITING);
        return;
    }
    let Some(player) = ctx.registry.player_id() else {
        return;
    };
    // The player's own tick consumes the exit goal; only assign it.
    if ctx.registry.get(player).is_some_and(|p| p.goal.is_some()) {
        return;
    }
    for dir in [Dir::Up, Dir::Down, Dir::Left, Dir::Right] {
        let (dx, dy) = dir.delta();
        let out = tile.offset(dx, dy);
        let (hit, ok) = ctx.registry.legal_move(ctx.world, out, level);
        if ok && hit.is_none() {
            if let Some(p) = ctx.registry.get_mut(player) {
                p.dir = dir;
                p.state = EntityState::moving(dir);
            }
            ctx.registry.set_goal(player, out);
            return;
        }
    }
}

/// Snap the player to the car while riding.
fn carry_player(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let (x, y, tile, level) = (e.x, e.y, e.tile, e.level);
    let Some(player) = ctx.registry.player_id() else {
        return;
    };
    if let Some(p) = ctx.registry.get_mut(player) {
        p.x = x;
        p.y = y;
        p.tile = tile;
        p.level = level;
        p.goal = None;
        p.x_vel = 0;
        p.y_vel = 0;
    }
}
