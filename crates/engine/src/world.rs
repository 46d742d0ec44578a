//! Tile grid: per-tile traversal flags and picture ids, with the
//! legality queries used by movement and the behavior interpreter.
//! Tile state is read-only during a tick except through the explicit
//! mutators, which only interpreter actions call.

use serde::{Deserialize, Serialize};

use crate::types::{Dir, Pos, TileFlags};

/// What a path marker asks of a walker that arrives on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    /// Stop and run the use-an-object sequence.
    Stop,
    /// Turn to the marker's direction and keep walking.
    Go,
    /// Stop and run the junction sequence (pick any open direction).
    FourWay,
}

/// Authoring-time path marker on a tile, consumed by the walker and
/// rail behaviors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMarker {
    pub tile: Pos,
    pub kind: MarkerKind,
    pub dir: Dir,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub bg_flags: TileFlags,
    pub fg_flags: TileFlags,
    pub bg_picture: Option<u16>,
    pub fg_picture: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldGrid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    markers: Vec<PathMarker>,
}

impl WorldGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, tiles: vec![Tile::default(); width * height], markers: Vec::new() }
    }

    pub fn add_marker(&mut self, marker: PathMarker) {
        if self.in_bounds(marker.tile) {
            self.markers.push(marker);
        }
    }

    pub fn marker_at(&self, pos: Pos) -> Option<&PathMarker> {
        self.markers.iter().find(|m| m.tile == pos)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.height
    }

    fn index(&self, pos: Pos) -> usize {
        (pos.y as usize) * self.width + (pos.x as usize)
    }

    /// Background flags at a tile. Out-of-bounds reads return Solid as
    /// a safe default, never an error.
    pub fn flags_at(&self, pos: Pos) -> TileFlags {
        if !self.in_bounds(pos) {
            return TileFlags::SOLID;
        }
        self.tiles[self.index(pos)].bg_flags
    }

    pub fn fg_flags_at(&self, pos: Pos) -> TileFlags {
        if !self.in_bounds(pos) {
            return TileFlags::NONE;
        }
        self.tiles[self.index(pos)].fg_flags
    }

    pub fn tile_at(&self, pos: Pos) -> Option<&Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(&self.tiles[self.index(pos)])
    }

    /// Tile legality for a ground walker on the given level. Level 2
    /// entities walk over solid tiles that carry a foreground grating.
    pub fn passable_ground(&self, pos: Pos, level: u8) -> bool {
        let bg = self.flags_at(pos);
        if bg.contains(TileFlags::ground_blockers()) {
            if level >= 2 && self.fg_flags_at(pos).contains(TileFlags::GRATING) {
                return !bg.contains(TileFlags::WATER.union(TileFlags::SLIME));
            }
            return false;
        }
        true
    }

    /// Legality for entities that may cross water and slime
    /// (projectiles, floating props): only Solid blocks.
    pub fn passable_over_water(&self, pos: Pos, level: u8) -> bool {
        let bg = self.flags_at(pos);
        if bg.contains(TileFlags::SOLID) {
            return level >= 2 && self.fg_flags_at(pos).contains(TileFlags::GRATING);
        }
        true
    }

    pub fn set_tile_flags(&mut self, pos: Pos, flags: TileFlags) {
        if !self.in_bounds(pos) {
            return;
        }
        let idx = self.index(pos);
        self.tiles[idx].bg_flags = flags;
    }

    pub fn set_fg_tile_flags(&mut self, pos: Pos, flags: TileFlags) {
        if !self.in_bounds(pos) {
            return;
        }
        let idx = self.index(pos);
        self.tiles[idx].fg_flags = flags;
    }

    pub fn set_tile_picture(&mut self, pos: Pos, picture: Option<u16>) {
        if !self.in_bounds(pos) {
            return;
        }
        let idx = self.index(pos);
        self.tiles[idx].bg_picture = picture;
    }

    pub fn set_fg_tile_picture(&mut self, pos: Pos, picture: Option<u16>) {
        if !self.in_bounds(pos) {
            return;
        }
        let idx = self.index(pos);
        self.tiles[idx].fg_picture = picture;
    }

    /// Flag values of every tile in row-major order, for snapshots.
    pub fn flag_words(&self) -> Vec<u32> {
        self.tiles.iter().map(|t| t.bg_flags.0).collect()
    }

    pub fn restore_flag_words(&mut self, words: &[u32]) {
        debug_assert_eq!(words.len(), self.tiles.len());
        for (tile, &word) in self.tiles.iter_mut().zip(words) {
            tile.bg_flags = TileFlags(word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled_grid() -> WorldGrid {
        let mut grid = WorldGrid::new(8, 8);
        for x in 0..8 {
            grid.set_tile_flags(Pos { y: 0, x }, TileFlags::SOLID);
            grid.set_tile_flags(Pos { y: 7, x }, TileFlags::SOLID);
        }
        for y in 0..8 {
            grid.set_tile_flags(Pos { y, x: 0 }, TileFlags::SOLID);
            grid.set_tile_flags(Pos { y, x: 7 }, TileFlags::SOLID);
        }
        grid
    }

    #[test]
    fn out_of_bounds_reads_are_solid_not_errors() {
        let grid = WorldGrid::new(4, 4);
        assert_eq!(grid.flags_at(Pos { y: -1, x: 0 }), TileFlags::SOLID);
        assert_eq!(grid.flags_at(Pos { y: 0, x: 4 }), TileFlags::SOLID);
        assert_eq!(grid.flags_at(Pos { y: 99, x: 99 }), TileFlags::SOLID);
    }

    #[test]
    fn ground_walkers_are_blocked_by_water_and_slime() {
        let mut grid = walled_grid();
        grid.set_tile_flags(Pos { y: 2, x: 2 }, TileFlags::WATER);
        grid.set_tile_flags(Pos { y: 3, x: 2 }, TileFlags::SLIME);
        assert!(!grid.passable_ground(Pos { y: 2, x: 2 }, 1));
        assert!(!grid.passable_ground(Pos { y: 3, x: 2 }, 1));
        assert!(grid.passable_ground(Pos { y: 4, x: 2 }, 1));
        // Over-water traversal only stops at solid.
        assert!(grid.passable_over_water(Pos { y: 2, x: 2 }, 1));
        assert!(!grid.passable_over_water(Pos { y: 0, x: 0 }, 1));
    }

    #[test]
    fn gratings_carry_upper_level_walkers_over_solid() {
        let mut grid = walled_grid();
        let pos = Pos { y: 3, x: 3 };
        grid.set_tile_flags(pos, TileFlags::SOLID);
        grid.set_fg_tile_flags(pos, TileFlags::GRATING);
        assert!(!grid.passable_ground(pos, 1));
        assert!(grid.passable_ground(pos, 2));
    }

    #[test]
    fn mutators_ignore_out_of_bounds_writes() {
        let mut grid = WorldGrid::new(4, 4);
        grid.set_tile_flags(Pos { y: -1, x: 0 }, TileFlags::WATER);
        grid.set_tile_picture(Pos { y: 9, x: 9 }, Some(3));
        assert_eq!(grid.flag_words(), vec![0; 16]);
    }

    #[test]
    fn flag_words_round_trip_through_restore() {
        let mut grid = walled_grid();
        let words = grid.flag_words();
        let mut fresh = WorldGrid::new(8, 8);
        fresh.restore_flag_words(&words);
        assert_eq!(fresh.flag_words(), words);
        grid.set_tile_flags(Pos { y: 4, x: 4 }, TileFlags::METAL);
        assert_ne!(grid.flag_words(), words);
    }
}
