//! Flat save snapshot and its binary record format: magic tag,
//! version byte, fixed-width name, length-prefixed fixed-size tile
//! and entity records, length-prefixed variable array, SHA-256
//! trailer. Decoding is all-or-nothing; any mismatch leaves the
//! caller's state untouched. File I/O stays with the host.

use sha2::{Digest, Sha256};

use crate::types::{Dir, EntityKind, Pos, SnapshotError};

const MAGIC: [u8; 4] = *b"TBSV";
const VERSION: u8 = 1;
const NAME_LEN: usize = 32;
const DIGEST_LEN: usize = 32;
const ENTITY_RECORD_LEN: usize = 24;

/// One entity, flattened to a fixed-size record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub dir: Dir,
    pub level: u8,
    pub x: i32,
    pub y: i32,
    pub move_speed: i32,
    pub goal: Option<Pos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub tick: u64,
    pub tile_flags: Vec<u32>,
    pub entities: Vec<EntityRecord>,
    pub variables: Vec<u8>,
}

impl Snapshot {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);

        let mut name = [0u8; NAME_LEN];
        let bytes = self.name.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        name[..len].copy_from_slice(&bytes[..len]);
        out.extend_from_slice(&name);

        out.extend_from_slice(&self.tick.to_le_bytes());

        out.extend_from_slice(&(self.tile_flags.len() as u32).to_le_bytes());
        for &word in &self.tile_flags {
            out.extend_from_slice(&word.to_le_bytes());
        }

        out.extend_from_slice(&(self.entities.len() as u32).to_le_bytes());
        for record in &self.entities {
            record.encode_into(&mut out);
        }

        out.extend_from_slice(&(self.variables.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.variables);

        let digest = Sha256::digest(&out);
        out.extend_from_slice(&digest);
        out
    }

    /// Decode and validate against the currently loaded map's tile
    /// count. Magic, version, digest, or length trouble is a hard
    /// failure; nothing partial is ever returned.
    pub fn decode(bytes: &[u8], expected_tiles: u32) -> Result<Self, SnapshotError> {
        if bytes.len() < DIGEST_LEN {
            return Err(SnapshotError::Truncated { offset: bytes.len() });
        }
        let (body, trailer) = bytes.split_at(bytes.len() - DIGEST_LEN);
        let digest = Sha256::digest(body);
        if digest.as_slice() != trailer {
            return Err(SnapshotError::DigestMismatch);
        }

        let mut r = Reader { bytes: body, at: 0 };
        if r.take(4)? != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = r.u8()?;
        if version != VERSION {
            return Err(SnapshotError::VersionMismatch { found: version, expected: VERSION });
        }

        let name_bytes = r.take(NAME_LEN)?;
        let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        let tick = r.u64()?;

        let tile_count = r.u32()?;
        if tile_count != expected_tiles {
            return Err(SnapshotError::LengthMismatch {
                found: tile_count,
                expected: expected_tiles,
            });
        }
        let mut tile_flags = Vec::with_capacity(tile_count as usize);
        for _ in 0..tile_count {
            tile_flags.push(r.u32()?);
        }

        let entity_count = r.u32()?;
        let mut entities = Vec::with_capacity(entity_count as usize);
        for _ in 0..entity_count {
            entities.push(EntityRecord::decode_from(&mut r)?);
        }

        let var_count = r.u32()?;
        let variables = r.take(var_count as usize)?.to_vec();

        if r.at != body.len() {
            return Err(SnapshotError::Truncated { offset: r.at });
        }

        Ok(Self { name, tick, tile_flags, entities, variables })
    }
}

impl EntityRecord {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.kind as u8);
        out.push(self.dir as u8);
        out.push(self.level);
        match self.goal {
            None => out.push(0),
            Some(_) => out.push(1),
        }
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.move_speed.to_le_bytes());
        let goal = self.goal.unwrap_or(Pos { y: 0, x: 0 });
        out.extend_from_slice(&goal.x.to_le_bytes());
        out.extend_from_slice(&goal.y.to_le_bytes());
    }

    fn decode_from(r: &mut Reader) -> Result<Self, SnapshotError> {
        let start = r.at;
        let raw = r.take(ENTITY_RECORD_LEN)?;
        let kind = EntityKind::from_raw(raw[0])
            .ok_or(SnapshotError::Truncated { offset: start })?;
        let dir =
            Dir::from_raw(raw[1]).ok_or(SnapshotError::Truncated { offset: start + 1 })?;
        let level = raw[2];
        let has_goal = raw[3] != 0;
        let x = i32::from_le_bytes(raw[4..8].try_into().unwrap());
        let y = i32::from_le_bytes(raw[8..12].try_into().unwrap());
        let move_speed = i32::from_le_bytes(raw[12..16].try_into().unwrap());
        let gx = i32::from_le_bytes(raw[16..20].try_into().unwrap());
        let gy = i32::from_le_bytes(raw[20..24].try_into().unwrap());
        let goal = has_goal.then_some(Pos { y: gy, x: gx });
        Ok(Self { kind, dir, level, x, y, move_speed, goal })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        if self.bytes.len() < self.at + n {
            return Err(SnapshotError::Truncated { offset: self.at });
        }
        let out = &self.bytes[self.at..self.at + n];
        self.at += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}
