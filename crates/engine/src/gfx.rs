//! Sprite/background pixel pipeline: run-length codec, owned pixel
//! surfaces, and the compositor that blits decoded images onto the
//! world surface.

pub mod compositor;
pub mod rle;
pub mod surface;

pub use compositor::{BlitOptions, Compositor};
pub use rle::{ColumnDecoder, decode_column_major, decode_row_major, encode_column_major,
              encode_row_major};
pub use surface::{Image, Surface};
