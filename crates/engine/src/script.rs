//! Room-level rule interpreter: an ordered list of bytecode rules,
//! each filtered by room/verb/noun and gated on a side-effect-free
//! condition stream before its action stream runs.
//!
//! Instructions are variable-width and the widths are opcode-specific,
//! so an unknown opcode is fatal: skipping one wrong-length
//! instruction would desynchronize every later decode.

use serde::{Deserialize, Serialize};

use crate::types::{LogEvent, ScriptError};


/// Filter byte matching any room, verb, or noun.
pub const WILDCARD: u8 = 0xff;

/// `room = NO_ROOM` on an item means it is carried.
pub const NO_ROOM: u8 = 0xff;

const RULE_HEADER_LEN: usize = 6;
const CONNECTION_COUNT: usize = 6;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum CondOp {
    ItemInRoom = 0x01,
    MovesAtLeast = 0x02,
    VarEquals = 0x03,
    CurPicEquals = 0x04,
    ItemPicEquals = 0x05,
}

impl CondOp {
    fn decode(opcode: u8, offset: usize) -> Result<Self, ScriptError> {
        match opcode {
            0x01 => Ok(Self::ItemInRoom),
            0x02 => Ok(Self::MovesAtLeast),
            0x03 => Ok(Self::VarEquals),
            0x04 => Ok(Self::CurPicEquals),
            0x05 => Ok(Self::ItemPicEquals),
            _ => Err(ScriptError::InvalidConditionOpcode { opcode, offset }),
        }
    }

    /// Instruction width including the opcode byte.
    fn width(self) -> usize {
        match self {
            Self::MovesAtLeast | Self::CurPicEquals => 2,
            Self::ItemInRoom | Self::VarEquals | Self::ItemPicEquals => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum ActOp {
    VarAdd = 0x01,
    VarSub = 0x02,
    VarSet = 0x03,
    ListInventory = 0x04,
    MoveItem = 0x05,
    SetRoom = 0x06,
    SetCurPic = 0x07,
    SetPic = 0x08,
    PrintMessage = 0x09,
    SetLight = 0x0a,
    SetDark = 0x0b,
    Save = 0x0c,
    Load = 0x0d,
    Restart = 0x0e,
    Quit = 0x0f,
    PlaceItem = 0x10,
    SetItemPic = 0x11,
    ResetPic = 0x12,
    // The six Go opcodes stay consecutive: the room connection index
    // is `opcode - GoNorth`.
    GoNorth = 0x13,
    GoSouth = 0x14,
    GoEast = 0x15,
    GoWest = 0x16,
    GoUp = 0x17,
    GoDown = 0x18,
    TakeItem = 0x19,
    DropItem = 0x1a,
    SetRoomPic = 0x1b,
}

impl ActOp {
    fn decode(opcode: u8, offset: usize) -> Result<Self, ScriptError> {
        match opcode {
            0x01 => Ok(Self::VarAdd),
            0x02 => Ok(Self::VarSub),
            0x03 => Ok(Self::VarSet),
            0x04 => Ok(Self::ListInventory),
            0x05 => Ok(Self::MoveItem),
            0x06 => Ok(Self::SetRoom),
            0x07 => Ok(Self::SetCurPic),
            0x08 => Ok(Self::SetPic),
            0x09 => Ok(Self::PrintMessage),
            0x0a => Ok(Self::SetLight),
            0x0b => Ok(Self::SetDark),
            0x0c => Ok(Self::Save),
            0x0d => Ok(Self::Load),
            0x0e => Ok(Self::Restart),
            0x0f => Ok(Self::Quit),
            0x10 => Ok(Self::PlaceItem),
            0x11 => Ok(Self::SetItemPic),
            0x12 => Ok(Self::ResetPic),
            0x13 => Ok(Self::GoNorth),
            0x14 => Ok(Self::GoSouth),
            0x15 => Ok(Self::GoEast),
            0x16 => Ok(Self::GoWest),
            0x17 => Ok(Self::GoUp),
            0x18 => Ok(Self::GoDown),
            0x19 => Ok(Self::TakeItem),
            0x1a => Ok(Self::DropItem),
            0x1b => Ok(Self::SetRoomPic),
            _ => Err(ScriptError::InvalidActionOpcode { opcode, offset }),
        }
    }

    fn width(self) -> usize {
        match self {
            Self::ListInventory
            | Self::SetLight
            | Self::SetDark
            | Self::Save
            | Self::Load
            | Self::Restart
            | Self::Quit
            | Self::ResetPic
            | Self::TakeItem
            | Self::DropItem => 1,
            Self::SetRoom
            | Self::SetCurPic
            | Self::SetPic
            | Self::PrintMessage
            | Self::GoNorth
            | Self::GoSouth
            | Self::GoEast
            | Self::GoWest
            | Self::GoUp
            | Self::GoDown => 2,
            Self::VarAdd
            | Self::VarSub
            | Self::VarSet
            | Self::MoveItem
            | Self::SetItemPic
            | Self::SetRoomPic => 3,
            Self::PlaceItem => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Rules and state
// ---------------------------------------------------------------------------

/// One parsed rule. `script` is the raw condition stream followed by
/// the raw action stream; instruction boundaries are only discovered
/// while executing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub room: u8,
    pub verb: u8,
    pub noun: u8,
    pub num_cond: u8,
    pub num_act: u8,
    pub script: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemMobility {
    Fixed,
    Unmoved,
    Moved,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub noun: u8,
    pub room: u8,
    pub picture: u8,
    pub mobility: ItemMobility,
    /// Room pictures the item is visible in while still unmoved.
    pub room_pictures: Vec<u8>,
    pub description: u8,
    pub position: (u8, u8),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// North, south, east, west, up, down. Zero means no exit.
    pub connections: [u8; CONNECTION_COUNT],
    pub picture: u8,
    pub cur_picture: u8,
}

/// The mutable world the rules act on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptState {
    pub room: u8,
    pub moves: u8,
    pub is_dark: bool,
    pub vars: Vec<u8>,
    pub items: Vec<Item>,
    pub rooms: Vec<Room>,
}

impl ScriptState {
    pub fn new(rooms: Vec<Room>, items: Vec<Item>, var_count: usize) -> Self {
        Self { room: 1, moves: 0, is_dark: false, vars: vec![0; var_count], items, rooms }
    }

    fn var(&self, index: u8) -> Result<u8, ScriptError> {
        self.vars
            .get(index as usize)
            .copied()
            .ok_or(ScriptError::OutOfRangeVariable { index })
    }

    fn var_mut(&mut self, index: u8) -> Result<&mut u8, ScriptError> {
        self.vars
            .get_mut(index as usize)
            .ok_or(ScriptError::OutOfRangeVariable { index })
    }

    fn item(&self, index: u8) -> Result<&Item, ScriptError> {
        // Item indices are 1-based in the rule streams.
        index
            .checked_sub(1)
            .and_then(|i| self.items.get(i as usize))
            .ok_or(ScriptError::OutOfRangeItem { index })
    }

    fn item_mut(&mut self, index: u8) -> Result<&mut Item, ScriptError> {
        index
            .checked_sub(1)
            .and_then(|i| self.items.get_mut(i as usize))
            .ok_or(ScriptError::OutOfRangeItem { index })
    }

    fn room_ref(&self, index: u8) -> Result<&Room, ScriptError> {
        index
            .checked_sub(1)
            .and_then(|i| self.rooms.get(i as usize))
            .ok_or(ScriptError::OutOfRangeRoom { index })
    }

    fn room_mut(&mut self, index: u8) -> Result<&mut Room, ScriptError> {
        index
            .checked_sub(1)
            .and_then(|i| self.rooms.get_mut(i as usize))
            .ok_or(ScriptError::OutOfRangeRoom { index })
    }

    fn cur_room(&self) -> Result<&Room, ScriptError> {
        self.room_ref(self.room)
    }

    fn cur_room_mut(&mut self) -> Result<&mut Room, ScriptError> {
        self.room_mut(self.room)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a flat rule stream: per rule a six-byte header (room, verb,
/// noun, script size, condition count, action count) followed by the
/// raw script bytes; a room byte of `0xff` terminates the stream.
///
/// Parsing also discovers the save and restore verbs: a rule with no
/// conditions whose first action is Save (or Load) registers its
/// verb/noun pair.
pub fn read_rules(bytes: &[u8]) -> Result<RuleSet, ScriptError> {
    let mut rules = Vec::new();
    let mut save_verb_noun = None;
    let mut restore_verb_noun = None;
    let mut at = 0;

    loop {
        let Some(&room) = bytes.get(at) else {
            return Err(ScriptError::TruncatedRuleStream);
        };
        if room == WILDCARD {
            break;
        }
        if bytes.len() < at + RULE_HEADER_LEN {
            return Err(ScriptError::TruncatedRuleStream);
        }
        let verb = bytes[at + 1];
        let noun = bytes[at + 2];
        let script_len = (bytes[at + 3] as usize)
            .checked_sub(RULE_HEADER_LEN)
            .ok_or(ScriptError::TruncatedRuleStream)?;
        let num_cond = bytes[at + 4];
        let num_act = bytes[at + 5];
        at += RULE_HEADER_LEN;
        if bytes.len() < at + script_len {
            return Err(ScriptError::TruncatedRuleStream);
        }
        let script = bytes[at..at + script_len].to_vec();
        at += script_len;

        if num_cond == 0 && script.first() == Some(&(ActOp::Save as u8)) {
            save_verb_noun = Some((verb, noun));
        }
        if num_cond == 0 && script.first() == Some(&(ActOp::Load as u8)) {
            restore_verb_noun = Some((verb, noun));
        }

        rules.push(Rule { room, verb, noun, num_cond, num_act, script });
    }

    Ok(RuleSet { rules, save_verb_noun, restore_verb_noun })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub save_verb_noun: Option<(u8, u8)>,
    pub restore_verb_noun: Option<(u8, u8)>,
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

pub struct Interp {
    pub state: ScriptState,
    initial: ScriptState,
    saved: Option<ScriptState>,
    /// Restart prompts cannot read input here; hosts preconfigure the
    /// answer. Declining falls through to Quit, as the original rule
    /// set expects.
    pub decline_restart: bool,
    quit: bool,
    restarted: bool,
}

impl Interp {
    pub fn new(state: ScriptState) -> Self {
        Self {
            initial: state.clone(),
            state,
            saved: None,
            decline_restart: false,
            quit: false,
            restarted: false,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// First-match pass: stops at the first rule whose filters and
    /// conditions all pass, after running its actions.
    pub fn run_first(
        &mut self,
        rules: &RuleSet,
        verb: u8,
        noun: u8,
        log: &mut Vec<LogEvent>,
    ) -> Result<bool, ScriptError> {
        self.restarted = false;
        for rule in &rules.rules {
            if self.match_rule(rule, verb, noun, true, log)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All-matches pass: every rule is evaluated exactly once. A
    /// restart or restore firing mid-pass would leave the remaining
    /// rules running against reinitialized state, so it is a fatal
    /// reentrancy violation here.
    pub fn run_all(
        &mut self,
        rules: &RuleSet,
        verb: u8,
        noun: u8,
        log: &mut Vec<LogEvent>,
    ) -> Result<(), ScriptError> {
        self.restarted = false;
        for rule in &rules.rules {
            self.match_rule(rule, verb, noun, true, log)?;
            if self.restarted {
                return Err(ScriptError::ReentrancyViolation);
            }
            if self.quit {
                break;
            }
        }
        Ok(())
    }

    /// Whether a save rule would fire right now: the first rule
    /// matching the save verb/noun must itself be the unconditional
    /// save rule, not some overriding room rule.
    pub fn can_save_now(
        &mut self,
        rules: &RuleSet,
        log: &mut Vec<LogEvent>,
    ) -> Result<bool, ScriptError> {
        let Some((verb, noun)) = rules.save_verb_noun else {
            return Ok(false);
        };
        for rule in &rules.rules {
            if self.match_rule(rule, verb, noun, false, log)? {
                if rule.verb != verb || rule.noun != noun {
                    return Ok(false);
                }
                return Ok(rule.num_cond == 0
                    && rule.script.first() == Some(&(ActOp::Save as u8)));
            }
        }
        Ok(false)
    }

    /// Filter and condition pass; runs actions when `run` is set and
    /// everything matched. Conditions never mutate state.
    fn match_rule(
        &mut self,
        rule: &Rule,
        verb: u8,
        noun: u8,
        run: bool,
        log: &mut Vec<LogEvent>,
    ) -> Result<bool, ScriptError> {
        if rule.room != WILDCARD && rule.room != self.state.room {
            return Ok(false);
        }
        if rule.verb != WILDCARD && rule.verb != verb {
            return Ok(false);
        }
        if rule.noun != WILDCARD && rule.noun != noun {
            return Ok(false);
        }

        let mut offset = 0;
        for _ in 0..rule.num_cond {
            let opcode = *rule
                .script
                .get(offset)
                .ok_or(ScriptError::CorruptScript { offset })?;
            let op = CondOp::decode(opcode, offset)?;
            if rule.script.len() < offset + op.width() {
                return Err(ScriptError::CorruptScript { offset });
            }
            let arg = |n: usize| rule.script[offset + n];
            let pass = match op {
                CondOp::ItemInRoom => self.state.item(arg(1))?.room == arg(2),
                CondOp::MovesAtLeast => arg(1) <= self.state.moves,
                CondOp::VarEquals => self.state.var(arg(1))? == arg(2),
                CondOp::CurPicEquals => self.state.cur_room()?.cur_picture == arg(1),
                CondOp::ItemPicEquals => self.state.item(arg(1))?.picture == arg(2),
            };
            if !pass {
                return Ok(false);
            }
            offset += op.width();
        }

        if run {
            self.do_actions(rule, noun, offset, log)?;
        }
        Ok(true)
    }

    fn do_actions(
        &mut self,
        rule: &Rule,
        noun: u8,
        mut offset: usize,
        log: &mut Vec<LogEvent>,
    ) -> Result<(), ScriptError> {
        for _ in 0..rule.num_act {
            let opcode = *rule
                .script
                .get(offset)
                .ok_or(ScriptError::CorruptScript { offset })?;
            let op = ActOp::decode(opcode, offset)?;
            if rule.script.len() < offset + op.width() {
                return Err(ScriptError::CorruptScript { offset });
            }
            let arg = |n: usize| rule.script[offset + n];

            match op {
                ActOp::VarAdd => {
                    let v = self.state.var_mut(arg(2))?;
                    *v = v.wrapping_add(arg(1));
                }
                ActOp::VarSub => {
                    let v = self.state.var_mut(arg(2))?;
                    *v = v.wrapping_sub(arg(1));
                }
                ActOp::VarSet => *self.state.var_mut(arg(1))? = arg(2),
                ActOp::ListInventory => {
                    let carried: Vec<u8> = self
                        .state
                        .items
                        .iter()
                        .filter(|i| i.room == NO_ROOM)
                        .map(|i| i.description)
                        .collect();
                    for description in carried {
                        log.push(LogEvent::Message { id: description });
                    }
                }
                ActOp::MoveItem => {
                    let room = arg(2);
                    self.state.item_mut(arg(1))?.room = room;
                }
                ActOp::SetRoom => {
                    let cur = self.state.cur_room_mut()?;
                    cur.cur_picture = cur.picture;
                    self.state.room = arg(1);
                    log.push(LogEvent::RoomChanged { room: arg(1) });
                }
                ActOp::SetCurPic => self.state.cur_room_mut()?.cur_picture = arg(1),
                ActOp::SetPic => {
                    let cur = self.state.cur_room_mut()?;
                    cur.picture = arg(1);
                    cur.cur_picture = arg(1);
                }
                ActOp::PrintMessage => log.push(LogEvent::Message { id: arg(1) }),
                ActOp::SetLight => self.state.is_dark = false,
                ActOp::SetDark => self.state.is_dark = true,
                ActOp::Save => self.saved = Some(self.state.clone()),
                ActOp::Load => {
                    if let Some(saved) = &self.saved {
                        self.state = saved.clone();
                    }
                    // Quirk preserved from the source material: after
                    // a mid-rule load the remaining actions keep
                    // running against the freshly loaded state.
                }
                ActOp::Restart => {
                    if !self.decline_restart {
                        self.state = self.initial.clone();
                        self.restarted = true;
                        log.push(LogEvent::Restarted);
                        return Ok(());
                    }
                    // Declined: falls through to Quit.
                    self.quit = true;
                    log.push(LogEvent::RuleQuit);
                    return Ok(());
                }
                ActOp::Quit => {
                    self.quit = true;
                    log.push(LogEvent::RuleQuit);
                    return Ok(());
                }
                ActOp::PlaceItem => {
                    let (room, x, y) = (arg(2), arg(3), arg(4));
                    let item = self.state.item_mut(arg(1))?;
                    item.room = room;
                    item.position = (x, y);
                }
                ActOp::SetItemPic => {
                    let pic = arg(1);
                    self.state.item_mut(arg(2))?.picture = pic;
                }
                ActOp::ResetPic => {
                    let cur = self.state.cur_room_mut()?;
                    cur.cur_picture = cur.picture;
                }
                ActOp::GoNorth
                | ActOp::GoSouth
                | ActOp::GoEast
                | ActOp::GoWest
                | ActOp::GoUp
                | ActOp::GoDown => {
                    let exit = (op as u8 - ActOp::GoNorth as u8) as usize;
                    let room = self.state.cur_room()?.connections[exit];
                    if room == 0 {
                        log.push(LogEvent::BlockedExit);
                        return Ok(());
                    }
                    let cur = self.state.cur_room_mut()?;
                    cur.cur_picture = cur.picture;
                    self.state.room = room;
                    log.push(LogEvent::RoomChanged { room });
                    // Short-circuits the rest of the action list.
                    return Ok(());
                }
                ActOp::TakeItem => self.take_item(noun, log)?,
                ActOp::DropItem => self.drop_item(noun, log),
                ActOp::SetRoomPic => {
                    let pic = arg(2);
                    let room = self.state.room_mut(arg(1))?;
                    room.picture = pic;
                    room.cur_picture = pic;
                }
            }
            offset += op.width();
        }
        Ok(())
    }

    /// Take the noun's item from the current room. Fixed items refuse;
    /// previously moved items come along unconditionally; unmoved
    /// items only when the room's current picture is in their picture
    /// list.
    fn take_item(&mut self, noun: u8, log: &mut Vec<LogEvent>) -> Result<(), ScriptError> {
        let room = self.state.room;
        let cur_picture = self.state.cur_room()?.cur_picture;
        for item in &mut self.state.items {
            if item.noun != noun || item.room != room {
                continue;
            }
            match item.mobility {
                ItemMobility::Fixed => {
                    log.push(LogEvent::ItemRefused { noun });
                    return Ok(());
                }
                ItemMobility::Moved => {
                    item.room = NO_ROOM;
                    return Ok(());
                }
                ItemMobility::Unmoved => {
                    if item.room_pictures.contains(&cur_picture) {
                        item.room = NO_ROOM;
                        item.mobility = ItemMobility::Moved;
                        return Ok(());
                    }
                }
            }
        }
        log.push(LogEvent::ItemNotHere { noun });
        Ok(())
    }

    /// Drop the noun's item into the current room, if carried.
    fn drop_item(&mut self, noun: u8, log: &mut Vec<LogEvent>) {
        let room = self.state.room;
        for item in &mut self.state.items {
            if item.noun != noun || item.room != NO_ROOM {
                continue;
            }
            item.room = room;
            item.mobility = ItemMobility::Moved;
            return;
        }
        log.push(LogEvent::NotCarried { noun });
    }
}
