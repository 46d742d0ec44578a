//! Live entity set: spawn/remove lifecycle, id-based lookup, goal
//! assignment, and the generic walk-step primitive every behavior
//! delegates to.

use slotmap::SlotMap;

use crate::behavior::BehaviorState;
use crate::types::{Dir, EngineConfig, EntityId, EntityKind, EntityState, Pos};
use crate::world::WorldGrid;

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub dir: Dir,
    pub state: EntityState,
    /// Pixel position. `tile` is derived and kept consistent:
    /// `tile = pixel / tile_size`, recomputed whenever pixels change.
    pub x: i32,
    pub y: i32,
    pub tile: Pos,
    pub x_vel: i32,
    pub y_vel: i32,
    pub move_speed: i32,
    pub goal: Option<Pos>,
    pub level: u8,
    pub on_screen: bool,
    pub anim_frame: u8,
    pub anim_delay: u8,
    pub anim_cycle: u8,
    pub frames_per_dir: u8,
    pub behavior: BehaviorState,
}

impl Entity {
    /// Exactly on a tile boundary in both axes.
    pub fn on_even_tile(&self, tile_size: i32) -> bool {
        self.x % tile_size == 0 && self.y % tile_size == 0
    }

    /// Advance the animation frame on its cycle delay.
    pub fn animate_frames(&mut self) {
        if self.anim_delay > 0 {
            self.anim_delay -= 1;
            return;
        }
        self.anim_delay = self.anim_cycle;
        self.anim_frame += 1;
        if self.anim_frame >= self.frames_per_dir.max(1) {
            self.anim_frame = 0;
        }
    }
}

pub struct Registry {
    entities: SlotMap<EntityId, Entity>,
    player: Option<EntityId>,
    tile_size: i32,
    base_move_speed: i32,
    action_mode: bool,
}

impl Registry {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            entities: SlotMap::with_key(),
            player: None,
            tile_size: config.tile_size,
            base_move_speed: config.base_move_speed,
            action_mode: config.action_mode,
        }
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Spawn an entity on a tile boundary and run its kind-specific
    /// initializer (speed, pose, behavior state).
    pub fn spawn(&mut self, kind: EntityKind, dir: Dir, tile: Pos, level: u8) -> EntityId {
        let move_speed = self.initial_speed(kind);
        let entity = Entity {
            id: EntityId::default(), // Will be overwritten
            kind,
            dir,
            state: EntityState::standing(dir),
            x: tile.x * self.tile_size,
            y: tile.y * self.tile_size,
            tile,
            x_vel: 0,
            y_vel: 0,
            move_speed,
            goal: None,
            level,
            on_screen: false,
            anim_frame: 0,
            anim_delay: 0,
            anim_cycle: 3,
            frames_per_dir: 4,
            behavior: BehaviorState::initial(kind),
        };
        let id = self.entities.insert(entity);
        self.entities[id].id = id;
        if kind == EntityKind::Player {
            self.player = Some(id);
        }
        id
    }

    fn initial_speed(&self, kind: EntityKind) -> i32 {
        let mut speed = self.base_move_speed;
        // Bots slow to half speed outside action mode; the player and
        // inert props keep the base value.
        if kind.is_hostile() && !self.action_mode {
            speed >>= 1;
        }
        speed
    }

    /// Mark the entity dead and detach it from the live set. Pending
    /// goal/velocity state dies with it.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if self.player == Some(id) {
            self.player = None;
        }
        self.entities.remove(id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player.and_then(|id| self.entities.get(id))
    }

    /// Registry-order id snapshot for the tick loop. Iteration order
    /// is stable between mutations, which push-chain resolution and
    /// same-tick shoot timing rely on.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Linear scan for an entity occupying a tile. Fine at this scale
    /// (tens to low hundreds of entities).
    pub fn find_at(&self, tile: Pos) -> Option<EntityId> {
        self.entities.iter().find(|(_, e)| e.tile == tile).map(|(id, _)| id)
    }

    pub fn find_at_level(&self, tile: Pos, level: u8) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.tile == tile && e.level == level)
            .map(|(id, _)| id)
    }

    pub fn find_kind_at(&self, kind: EntityKind, tile: Pos) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.kind == kind && e.tile == tile)
            .map(|(id, _)| id)
    }

    /// Ground-walker move legality combining tile flags with entity
    /// occupancy: `(blocking entity if any, tile itself passable)`.
    pub fn legal_move(
        &self,
        world: &WorldGrid,
        tile: Pos,
        level: u8,
    ) -> (Option<EntityId>, bool) {
        (self.find_at_level(tile, level), world.passable_ground(tile, level))
    }

    /// Projectile variant: water and slime do not block.
    pub fn legal_move_over_water(
        &self,
        world: &WorldGrid,
        tile: Pos,
        level: u8,
    ) -> (Option<EntityId>, bool) {
        (self.find_at_level(tile, level), world.passable_over_water(tile, level))
    }

    /// Same, ignoring one entity (a projectile testing its own tile).
    pub fn legal_move_over_water_ignore(
        &self,
        world: &WorldGrid,
        tile: Pos,
        level: u8,
        ignore: EntityId,
    ) -> (Option<EntityId>, bool) {
        let occupant = self
            .entities
            .iter()
            .find(|(id, e)| *id != ignore && e.tile == tile && e.level == level)
            .map(|(id, _)| id);
        (occupant, world.passable_over_water(tile, level))
    }

    /// Commit a pending move target and the velocity toward it. The
    /// behavior interpreter's walk primitive consumes the goal.
    pub fn set_goal(&mut self, id: EntityId, goal: Pos) {
        let tile_size = self.tile_size;
        let Some(e) = self.entities.get_mut(id) else {
            return;
        };
        let dx = (goal.x - e.tile.x).signum();
        let dy = (goal.y - e.tile.y).signum();
        e.goal = Some(goal);
        e.x_vel = dx * e.move_speed;
        e.y_vel = dy * e.move_speed;
        e.state = EntityState::moving(e.dir);
        debug_assert!(e.x % tile_size == 0 || dy == 0);
    }

    /// One step of the generic walk routine: advance the pixel
    /// position toward the goal at the entity's speed, snapping
    /// exactly onto the goal's tile-boundary pixels (never
    /// overshooting), and clear the goal on arrival. Returns true on
    /// the arrival tick.
    pub fn walk_step(&mut self, id: EntityId) -> bool {
        let tile_size = self.tile_size;
        let Some(e) = self.entities.get_mut(id) else {
            return false;
        };
        let Some(goal) = e.goal else {
            return false;
        };
        let goal_x = goal.x * tile_size;
        let goal_y = goal.y * tile_size;

        e.x = step_toward(e.x, goal_x, e.x_vel);
        e.y = step_toward(e.y, goal_y, e.y_vel);
        e.tile = Pos { y: e.y / tile_size, x: e.x / tile_size };
        e.animate_frames();

        if e.x == goal_x && e.y == goal_y {
            e.goal = None;
            e.x_vel = 0;
            e.y_vel = 0;
            e.state = EntityState::standing(e.dir);
            return true;
        }
        false
    }
}

fn step_toward(current: i32, target: i32, vel: i32) -> i32 {
    if vel == 0 {
        return current;
    }
    let next = current + vel;
    if (vel > 0 && next > target) || (vel < 0 && next < target) {
        target
    } else {
        next
    }
}
