//! Right-hand wall follower: keeps a wall on its flank, rotating
//! clockwise at dead ends and reversing outright when boxed in.

use crate::types::{DeathCause, Dir, EntityId, EntityState, Pos, SoundId, TileFlags};

use super::Ctx;

pub(super) fn wall_follow(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let has_goal = e.goal.is_some();
    let (x, y) = (e.x, e.y);
    let on_screen = e.on_screen;
    let level = e.level;

    if has_goal {
        let player = ctx.registry.player();
        let player_alive_here =
            player.is_some_and(|p| p.level == level && p.state != EntityState::Dead);
        if on_screen && player_alive_here && ctx.hit_player(x, y) && !ctx.player_dead() {
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

/// Probe a tile the way the follower sees the world: the player never
/// blocks, everything else does, and probe-blocking flags include
/// special tiles.
fn probe_blocked(ctx: &Ctx, tile: Pos, level: u8) -> bool {
    if ctx.world.flags_at(tile).contains(TileFlags::probe_blockers()) {
        return true;
    }
    match ctx.registry.find_at_level(tile, level) {
        Some(hit) => Some(hit) != ctx.registry.player_id(),
        None => false,
    }
}

/// Offsets probed each scan step, relative to the travel direction:
/// dead ahead, ahead-and-to-the-right (diagonal), and the right flank.
fn probe_offsets(dir: Dir) -> [(i32, i32); 3] {
    let (ax, ay) = dir.delta();
    let (rx, ry) = dir.clockwise().delta();
    [(ax, ay), (ax + rx, ay + ry), (rx, ry)]
}

/// Selecting the next goal. Scans forward while the front is open and
/// the flank is closed; on a dead end, turns clockwise if the flank
/// opened up, counter-clockwise if only the front is open, and does a
/// forced 180-degree reversal (stepping one tile back) when boxed
/// into a corner. The rotate counter caps same-tick re-probing so a
/// fully enclosed follower settles instead of spinning forever.
fn find_goal(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let level = e.level;
    let start = e.tile;
    let mut dir = e.dir;
    let mut scan = start;
    let mut rotate = 0;

    loop {
        let [(ax, ay), (dx, dy), (rx, ry)] = probe_offsets(dir);

        // Advance until a wall ahead or empty space on the flank.
        loop {
            let ahead_blocked = probe_blocked(ctx, scan.offset(ax, ay), level);
            let diag_blocked = probe_blocked(ctx, scan.offset(dx, dy), level);
            let flank_blocked = probe_blocked(ctx, scan.offset(rx, ry), level);
            if !ahead_blocked && (diag_blocked || flank_blocked) {
                scan = scan.offset(ax, ay);
                rotate = 0;
            } else {
                break;
            }
        }

        // Stuck in place? Work out which way to turn.
        if scan == start {
            rotate += 1;
            let (lx, ly) = dir.counter_clockwise().delta();
            let left_blocked = probe_blocked(ctx, start.offset(lx, ly), level);
            let right_blocked = probe_blocked(ctx, start.offset(rx, ry), level);

            if !right_blocked {
                dir = dir.clockwise();
            } else if !left_blocked {
                dir = dir.counter_clockwise();
            } else {
                // Boxed in: reverse and step one tile backward.
                dir = dir.reverse();
                let (bx, by) = dir.delta();
                scan = scan.offset(bx, by);
                rotate = 4;
            }
        }

        if !(1..4).contains(&rotate) {
            break;
        }
    }

    if let Some(e) = ctx.registry.get_mut(id) {
        e.dir = dir;
        e.state = EntityState::moving(dir);
    }
    if scan != start {
        ctx.registry.set_goal(id, scan);
        if ctx.registry.get(id).is_some_and(|e| e.on_screen) {
            ctx.play_sound(SoundId::RightBotTurn);
        }
    }
}
