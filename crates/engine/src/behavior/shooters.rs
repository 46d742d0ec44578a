//! Shooter variants and the shared shooting sub-protocol, plus the
//! projectile they spawn.

use crate::types::{DeathCause, Dir, EntityId, EntityKind, EntityState, Pos, SoundId};

use super::{BehaviorState, Ctx, patrol_choose};

/// Refire cadence base; each shot re-arms to this plus bounded jitter.
const REFIRE_BASE: u16 = 16;
const REFIRE_JITTER: u32 = 8;

/// Shared shooting sub-protocol. Fires only when the shooter sits on
/// an exact tile boundary, the player is aligned on the facing row or
/// column, and the tile ahead is non-solid and unoccupied (the player
/// itself does not block). Returns the armed refire countdown on
/// success.
pub(super) fn try_shoot(id: EntityId, ctx: &mut Ctx, fire_sound: SoundId) -> Option<u16> {
    let e = ctx.registry.get(id)?;
    if !e.on_even_tile(ctx.config.tile_size) || !e.on_screen {
        return None;
    }
    let (ex, ey) = (e.x, e.y);
    let dir = e.dir;
    let tile = e.tile;
    let level = e.level;

    let p = ctx.registry.player()?;
    if p.level != level || ctx.player_dead() {
        return None;
    }
    let aligned = match dir {
        Dir::Up => p.x == ex && p.y < ey,
        Dir::Down => p.x == ex && p.y > ey,
        Dir::Left => p.y == ey && p.x < ex,
        Dir::Right => p.y == ey && p.x > ex,
        Dir::None => false,
    };
    if !aligned {
        return None;
    }

    let (dx, dy) = dir.delta();
    let target = tile.offset(dx, dy);
    let (hit, ok) = ctx.registry.legal_move_over_water(ctx.world, target, level);
    let hit = hit.filter(|&h| Some(h) != ctx.registry.player_id());
    if hit.is_some() || !ok {
        return None;
    }

    let missile = ctx.spawn(EntityKind::Missile, dir, target, level);
    let mut xv = dx * ctx.config.base_move_speed * 2;
    let mut yv = dy * ctx.config.base_move_speed * 2;
    if !ctx.config.action_mode {
        xv >>= 1;
        yv >>= 1;
    }
    if let Some(m) = ctx.registry.get_mut(missile) {
        m.x_vel = xv;
        m.y_vel = yv;
        m.state = EntityState::moving(dir);
    }
    ctx.play_sound(fire_sound);
    Some(REFIRE_BASE + ctx.rand_below(REFIRE_JITTER) as u16)
}

/// Patrolling shooter: walks like the turn-on-wall patroller, takes a
/// shot whenever the refire window is open and the player lines up.
pub(super) fn patrol_shooter(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let has_goal = e.goal.is_some();
    let (x, y) = (e.x, e.y);
    let on_screen = e.on_screen;
    let level = e.level;
    let BehaviorState::PatrolShooter { refire } = e.behavior else {
        return;
    };

    let mut refire = refire;
    if has_goal {
        if refire == 0 {
            ctx.registry.walk_step(id);
            let player_level = ctx.registry.player().map(|p| p.level);
            if ctx.hit_player(x, y) && player_level == Some(level) {
                ctx.kill_player(DeathCause::Fried);
                return;
            }
            if let Some(armed) = try_shoot(id, ctx, SoundId::OmniBotFire) {
                refire = armed;
            }
        } else if let Some(e) = ctx.registry.get_mut(id) {
            e.animate_frames();
        }
    } else {
        patrol_choose(id, ctx);
        if on_screen {
            ctx.play_sound(SoundId::OmniBotAmbient);
        }
    }

    refire = refire.saturating_sub(1);
    if let Some(e) = ctx.registry.get_mut(id) {
        let BehaviorState::PatrolShooter { refire: stored } = &mut e.behavior else {
            return;
        };
        *stored = refire;
    }
}

/// Fixed-post shooter: rotates clockwise on its own cadence, never
/// moves, fires on alignment when its refire window is open.
pub(super) fn turret(id: EntityId, ctx: &mut Ctx) {
    let Some(e) = ctx.registry.get(id) else {
        return;
    };
    let on_screen = e.on_screen;
    let dir = e.dir;
    let BehaviorState::Turret { refire, rotate } = e.behavior else {
        return;
    };

    let mut refire = refire;
    let mut rotate = rotate;

    // Time to turn?
    if rotate == 0 {
        let turned = dir.clockwise();
        if let Some(e) = ctx.registry.get_mut(id) {
            e.dir = turned;
            e.state = EntityState::standing(turned);
        }
        rotate = 16;
        if on_screen {
            ctx.play_sound(SoundId::FourFirerTurn);
        }
    }
    rotate -= 1;

    // Waiting before firing again?
    if refire > 0 {
        refire -= 1;
    } else {
        if let Some(e) = ctx.registry.get_mut(id) {
            e.animate_frames();
        }
        if let Some(armed) = try_shoot(id, ctx, SoundId::FourFirerFire) {
            refire = armed;
        }
    }

    if let Some(e) = ctx.registry.get_mut(id) {
        let BehaviorState::Turret { refire: r, rotate: rot } = &mut e.behavior else {
            return;
        };
        *r = refire;
        *rot = rotate;
    }
}

/// Straight-line projectile: advances by raw velocity every tick,
/// explodes against anything a projectile cannot cross, and kills the
/// player on exact tile boundaries.
pub(super) fn missile(id: EntityId, ctx: &mut Ctx) {
    let tile_size = ctx.config.tile_size;
    let Some(e) = ctx.registry.get_mut(id) else {
        return;
    };
    e.animate_frames();
    e.x += e.x_vel;
    e.y += e.y_vel;
    e.tile = Pos { y: e.y / tile_size, x: e.x / tile_size };
    let (x, y) = (e.x, e.y);
    let tile = e.tile;
    let level = e.level;

    let (hit, ok) = ctx.registry.legal_move_over_water_ignore(ctx.world, tile, level, id);
    let hit = hit.filter(|&h| Some(h) != ctx.registry.player_id());
    if hit.is_some() || !ok {
        ctx.play_sound(SoundId::Explosion);
        ctx.remove(id);
        return;
    }

    let on_even = x % tile_size == 0 && y % tile_size == 0;
    if on_even
        && ctx.hit_player(x, y)
        && ctx.registry.player().map(|p| p.level) == Some(level)
    {
        ctx.kill_player(DeathCause::Normal);
        ctx.play_sound(SoundId::Explosion);
        ctx.remove(id);
    }
}
