use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct EntityId;
}

/// Tile coordinate. Pixel coordinates live on `Entity` and are kept
/// consistent with this via `tile = pixel / tile_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub y: i32,
    pub x: i32,
}

impl Pos {
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self { y: self.y + dy, x: self.x + dx }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dir {
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    /// Unit tile delta for this direction, `(dx, dy)`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::None => (0, 0),
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
        }
    }

    pub fn clockwise(self) -> Self {
        match self {
            Dir::None => Dir::None,
            Dir::Up => Dir::Right,
            Dir::Right => Dir::Down,
            Dir::Down => Dir::Left,
            Dir::Left => Dir::Up,
        }
    }

    pub fn counter_clockwise(self) -> Self {
        match self {
            Dir::None => Dir::None,
            Dir::Up => Dir::Left,
            Dir::Left => Dir::Down,
            Dir::Down => Dir::Right,
            Dir::Right => Dir::Up,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Dir::None => Dir::None,
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }

    /// Inverse of `as u8`, for fixed-size record decoding.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Dir::None),
            1 => Some(Dir::Up),
            2 => Some(Dir::Down),
            3 => Some(Dir::Left),
            4 => Some(Dir::Right),
            _ => None,
        }
    }
}

/// Per-tile traversal flags, stored as a plain bitset the way the map
/// layer delivers them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileFlags(pub u32);

impl TileFlags {
    pub const NONE: TileFlags = TileFlags(0);
    pub const SOLID: TileFlags = TileFlags(1 << 0);
    pub const WATER: TileFlags = TileFlags(1 << 1);
    pub const SLIME: TileFlags = TileFlags(1 << 2);
    pub const METAL: TileFlags = TileFlags(1 << 3);
    pub const SPECIAL: TileFlags = TileFlags(1 << 4);
    pub const GRATING: TileFlags = TileFlags(1 << 5);

    pub fn contains(self, other: TileFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: TileFlags) -> TileFlags {
        TileFlags(self.0 | other.0)
    }

    /// Flags that block ground movement.
    pub fn ground_blockers() -> TileFlags {
        TileFlags::SOLID.union(TileFlags::WATER).union(TileFlags::SLIME)
    }

    /// Flags that stop a wall-follow probe (special tiles count as walls).
    pub fn probe_blockers() -> TileFlags {
        TileFlags::ground_blockers().union(TileFlags::SPECIAL)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    TurnBot,
    RightBot,
    OmniBot,
    FourFirer,
    PushBot,
    MaintBot,
    DeadEye,
    RailRider,
    Missile,
    Crate,
    LightBarrel,
    HeavyBarrel,
    Idler,
}

impl EntityKind {
    /// Inverse of `as u8`, for fixed-size record decoding.
    pub fn from_raw(raw: u8) -> Option<Self> {
        const KINDS: [EntityKind; 14] = [
            EntityKind::Player,
            EntityKind::TurnBot,
            EntityKind::RightBot,
            EntityKind::OmniBot,
            EntityKind::FourFirer,
            EntityKind::PushBot,
            EntityKind::MaintBot,
            EntityKind::DeadEye,
            EntityKind::RailRider,
            EntityKind::Missile,
            EntityKind::Crate,
            EntityKind::LightBarrel,
            EntityKind::HeavyBarrel,
            EntityKind::Idler,
        ];
        KINDS.get(raw as usize).copied()
    }

    pub fn is_pushable(self) -> bool {
        matches!(self, EntityKind::Crate | EntityKind::LightBarrel | EntityKind::HeavyBarrel)
    }

    pub fn is_hostile(self) -> bool {
        matches!(
            self,
            EntityKind::TurnBot
                | EntityKind::RightBot
                | EntityKind::OmniBot
                | EntityKind::FourFirer
                | EntityKind::PushBot
                | EntityKind::MaintBot
                | EntityKind::DeadEye
                | EntityKind::Missile
        )
    }
}

/// Animation/pose state. `Floating` and `Melted` props are walked over
/// by pushers instead of being pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    None,
    StandUp,
    StandDown,
    StandLeft,
    StandRight,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    UseUp,
    UseDown,
    UseLeft,
    UseRight,
    Floating,
    Melted,
    Exploding,
    Dead,
}

impl EntityState {
    pub fn moving(dir: Dir) -> Self {
        match dir {
            Dir::None => EntityState::None,
            Dir::Up => EntityState::MoveUp,
            Dir::Down => EntityState::MoveDown,
            Dir::Left => EntityState::MoveLeft,
            Dir::Right => EntityState::MoveRight,
        }
    }

    pub fn standing(dir: Dir) -> Self {
        match dir {
            Dir::None => EntityState::None,
            Dir::Up => EntityState::StandUp,
            Dir::Down => EntityState::StandDown,
            Dir::Left => EntityState::StandLeft,
            Dir::Right => EntityState::StandRight,
        }
    }

    pub fn using(dir: Dir) -> Self {
        match dir {
            Dir::None => EntityState::None,
            Dir::Up => EntityState::UseUp,
            Dir::Down => EntityState::UseDown,
            Dir::Left => EntityState::UseLeft,
            Dir::Right => EntityState::UseRight,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    Normal,
    Fried,
    Shocked,
    Grabbed,
}

/// Sound cues surfaced to the external audio collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundId {
    TurnBotTurn,
    RightBotTurn,
    OmniBotFire,
    OmniBotAmbient,
    FourFirerTurn,
    FourFirerFire,
    PushBotStrain,
    CrateSlide,
    LightSlide,
    HeavySlide,
    MaintBotHum,
    MaintBotHum2,
    MaintBotWhistle,
    DeadEyeAmbient1,
    DeadEyeAmbient2,
    RailRiderBoard,
    Explosion,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEvent {
    Sound { id: SoundId, looping: bool },
    Spawned { id: EntityId, kind: EntityKind, tile: Pos },
    Removed { id: EntityId, kind: EntityKind },
    PlayerKilled { cause: DeathCause },
    Message { id: u8 },
    RoomChanged { room: u8 },
    BlockedExit,
    ItemRefused { noun: u8 },
    ItemNotHere { noun: u8 },
    NotCarried { noun: u8 },
    RuleQuit,
    Restarted,
}

/// Why an `advance` batch stopped before its tick budget ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    QuitRequested,
    PlayerDead,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceResult {
    pub simulated_ticks: u32,
    pub stop_reason: StopReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tile edge length in pixels; pixel positions are multiples of
    /// this exactly when the entity is on a tile boundary.
    pub tile_size: i32,
    /// Base per-tick pixel speed of the player and most bots.
    pub base_move_speed: i32,
    /// Full action intensity. When false, bot and projectile speeds
    /// are halved.
    pub action_mode: bool,
    pub viewport_width: i32,
    pub viewport_height: i32,
    /// Screen row where the perspective scale factor is exactly 1.
    pub scale_baseline_row: i32,
    /// Linear scale change per row of vertical distance from the
    /// baseline, in 1/1000ths.
    pub scale_per_row_milli: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: 32,
            base_move_speed: 4,
            action_mode: true,
            viewport_width: 480,
            viewport_height: 480,
            scale_baseline_row: 300,
            scale_per_row_milli: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Malformed compressed image data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Source stream ran out mid-run.
    CorruptData { offset: usize },
    /// Declared dimensions are zero or do not fit the destination.
    BadDimensions { width: u32, height: u32 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptData { offset } => {
                write!(f, "compressed stream exhausted mid-run at byte {offset}")
            }
            Self::BadDimensions { width, height } => {
                write!(f, "bad image dimensions {width}x{height}")
            }
        }
    }
}

/// Fatal failures of the rule interpreter. None of these are
/// recoverable: instruction widths are opcode-dependent, so skipping
/// a bad instruction would desynchronize all later decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptError {
    InvalidConditionOpcode { opcode: u8, offset: usize },
    InvalidActionOpcode { opcode: u8, offset: usize },
    /// Opcode decode walked off the end of its argument window.
    CorruptScript { offset: usize },
    OutOfRangeItem { index: u8 },
    OutOfRangeRoom { index: u8 },
    OutOfRangeVariable { index: u8 },
    /// A restart/restore fired while an all-rules pass was mid-batch.
    ReentrancyViolation,
    TruncatedRuleStream,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConditionOpcode { opcode, offset } => {
                write!(f, "invalid condition opcode {opcode:#04x} at offset {offset}")
            }
            Self::InvalidActionOpcode { opcode, offset } => {
                write!(f, "invalid action opcode {opcode:#04x} at offset {offset}")
            }
            Self::CorruptScript { offset } => {
                write!(f, "script ended inside an instruction at offset {offset}")
            }
            Self::OutOfRangeItem { index } => write!(f, "item index {index} out of range"),
            Self::OutOfRangeRoom { index } => write!(f, "room index {index} out of range"),
            Self::OutOfRangeVariable { index } => {
                write!(f, "variable index {index} out of range")
            }
            Self::ReentrancyViolation => {
                write!(f, "restart/restore triggered while a rule batch was in flight")
            }
            Self::TruncatedRuleStream => write!(f, "rule stream ended before terminator"),
        }
    }
}

/// Hard failures while decoding a save snapshot. The caller keeps its
/// current state on any of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    BadMagic,
    VersionMismatch { found: u8, expected: u8 },
    /// Tile array length does not match the currently loaded map.
    LengthMismatch { found: u32, expected: u32 },
    /// Variable array length does not match the attached script.
    VariableCountMismatch { found: u32, expected: u32 },
    DigestMismatch,
    Truncated { offset: usize },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "snapshot magic tag mismatch"),
            Self::VersionMismatch { found, expected } => {
                write!(f, "snapshot version {found}, expected {expected}")
            }
            Self::LengthMismatch { found, expected } => {
                write!(f, "snapshot tile array length {found}, map has {expected}")
            }
            Self::VariableCountMismatch { found, expected } => {
                write!(f, "snapshot has {found} variables, script has {expected}")
            }
            Self::DigestMismatch => write!(f, "snapshot integrity digest mismatch"),
            Self::Truncated { offset } => write!(f, "snapshot truncated at byte {offset}"),
        }
    }
}
