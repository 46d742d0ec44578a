pub mod behavior;
pub mod engine;
pub mod entity;
pub mod gfx;
pub mod journal;
pub mod ports;
pub mod replay;
pub mod script;
pub mod snapshot;
pub mod types;
pub mod world;

pub use engine::{Engine, InputSnapshot};
pub use journal::{InputJournal, InputPayload, InputRecord};
pub use replay::*;
pub use types::*;
