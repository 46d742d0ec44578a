//! Run-length codec for compressed sprite and background images.
//!
//! Encoding alternates between two packet forms, chosen by a signed
//! selector byte:
//! - selector `>= 0`: repeat the single following byte `selector + 1`
//!   times;
//! - selector `< 0`: copy `-selector` explicit following bytes.
//!
//! `-128` never begins a packet; it is the continuation sentinel,
//! meaning "read a fresh selector before continuing". A decoder that
//! stops mid-run at a column boundary parks its state at `-128` (run
//! exhausted exactly) or keeps the residual count so the next column
//! resumes the same logically continuous stream.
//!
//! Two layouts are supported: column-major (the unit of coding is one
//! decoded column, continuation threaded across columns) and
//! row-major (mirror coding in 8-row strips).

use crate::types::CodecError;

use super::surface::Image;

/// Continuation sentinel: read a fresh selector.
const CONT: i32 = -128;

/// Largest literal run one negative selector can describe.
const MAX_LITERAL: usize = 127;

/// Largest repeat run one non-negative selector can describe.
const MAX_REPEAT: usize = 128;

/// Streaming column decoder. Each `decode_column` call produces one
/// full column of pixels and leaves the run state ready for the next
/// column.
pub struct ColumnDecoder<'a> {
    src: &'a [u8],
    pos: usize,
    cont: i32,
}

impl<'a> ColumnDecoder<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0, cont: CONT }
    }

    /// Byte offset of the next unread source byte.
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn read(&mut self) -> Result<u8, CodecError> {
        let byte =
            *self.src.get(self.pos).ok_or(CodecError::CorruptData { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_selector(&mut self) -> Result<i32, CodecError> {
        Ok(self.read()? as i8 as i32)
    }

    /// Decode exactly `out.len()` pixels into one column.
    pub fn decode_column(&mut self, out: &mut [u8]) -> Result<(), CodecError> {
        let mut remaining = out.len();
        if remaining == 0 {
            return Ok(());
        }
        let mut dst = 0;
        let mut a = self.cont;
        if a == CONT {
            a = self.read_selector()?;
        }

        loop {
            if a >= 0 {
                let color = self.read()?;
                loop {
                    out[dst] = color;
                    dst += 1;
                    remaining -= 1;
                    if remaining == 0 {
                        a -= 1;
                        if a < 0 {
                            a = CONT;
                        } else {
                            // Re-read the run color at the start of
                            // the next column.
                            self.pos -= 1;
                        }
                        self.cont = a;
                        return Ok(());
                    }
                    a -= 1;
                    if a < 0 {
                        break;
                    }
                }
            } else {
                loop {
                    out[dst] = self.read()?;
                    dst += 1;
                    remaining -= 1;
                    if remaining == 0 {
                        a += 1;
                        if a == 0 {
                            a = CONT;
                        }
                        self.cont = a;
                        return Ok(());
                    }
                    a += 1;
                    if a == 0 {
                        break;
                    }
                }
            }
            a = self.read_selector()?;
        }
    }
}

/// Decode a full column-major image: `width` columns of `height`
/// pixels each, run state threaded across column boundaries.
pub fn decode_column_major(src: &[u8], width: u32, height: u32) -> Result<Image, CodecError> {
    let mut image = Image::new(width, height)?;
    let mut decoder = ColumnDecoder::new(src);
    let mut column = vec![0u8; height as usize];
    for x in 0..width {
        decoder.decode_column(&mut column)?;
        for (y, &color) in column.iter().enumerate() {
            image.pixels[y * width as usize + x as usize] = color;
        }
    }
    Ok(image)
}

/// Decode a row-major image coded in strips of 8 rows. Each strip is
/// a self-contained stream (fresh selector at the strip start); runs
/// flow freely across row boundaries inside a strip.
pub fn decode_row_major(src: &[u8], width: u32, height: u32) -> Result<Image, CodecError> {
    if height % 8 != 0 {
        return Err(CodecError::BadDimensions { width, height });
    }
    let mut image = Image::new(width, height)?;
    let mut decoder = ColumnDecoder::new(src);
    let strip_len = (width * 8) as usize;
    let mut strip = vec![0u8; strip_len];
    for strip_index in 0..(height / 8) {
        decoder.cont = CONT;
        decoder.decode_column(&mut strip)?;
        let base = (strip_index * 8 * width) as usize;
        image.pixels[base..base + strip_len].copy_from_slice(&strip);
    }
    Ok(image)
}

/// Emit RLE packets for one logically continuous byte sequence.
fn encode_stream(data: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    let mut literal_start = i;
    while i < data.len() {
        // Measure the repeat run starting here.
        let mut run = 1;
        while i + run < data.len() && data[i + run] == data[i] && run < MAX_REPEAT {
            run += 1;
        }
        // A repeat shorter than 3 bytes is cheaper inside a literal.
        if run >= 3 {
            flush_literals(&data[literal_start..i], out);
            out.push((run - 1) as u8);
            out.push(data[i]);
            i += run;
            literal_start = i;
        } else {
            i += run;
        }
    }
    flush_literals(&data[literal_start..], out);
}

fn flush_literals(mut literals: &[u8], out: &mut Vec<u8>) {
    while !literals.is_empty() {
        let take = literals.len().min(MAX_LITERAL);
        out.push((-(take as i32)) as u8);
        out.extend_from_slice(&literals[..take]);
        literals = &literals[take..];
    }
}

/// Encode an image in the column-major layout accepted by
/// `decode_column_major`.
pub fn encode_column_major(image: &Image) -> Vec<u8> {
    let mut linear = Vec::with_capacity(image.pixels.len());
    for x in 0..image.width {
        for y in 0..image.height {
            linear.push(image.pixel(x, y));
        }
    }
    let mut out = Vec::new();
    encode_stream(&linear, &mut out);
    out
}

/// Encode an image in 8-row strips for `decode_row_major`.
pub fn encode_row_major(image: &Image) -> Vec<u8> {
    debug_assert!(image.height % 8 == 0);
    let strip_len = (image.width * 8) as usize;
    let mut out = Vec::new();
    for strip in image.pixels.chunks_exact(strip_len) {
        encode_stream(strip, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn image_from_rows(rows: &[&[u8]]) -> Image {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let pixels = rows.concat();
        Image::from_pixels(width, height, pixels).expect("image")
    }

    #[test]
    fn repeat_packet_expands_selector_plus_one_bytes() {
        // Selector 3 => four copies of 0x07, per column of height 4.
        let image = decode_column_major(&[3, 7], 1, 4).expect("decode");
        assert_eq!(image.pixels, vec![7, 7, 7, 7]);
    }

    #[test]
    fn literal_packet_copies_explicit_bytes() {
        // Selector -4 => four literal bytes.
        let src = [(-4i8) as u8, 1, 2, 3, 4];
        let image = decode_column_major(&src, 1, 4).expect("decode");
        assert_eq!(image.pixels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn repeat_run_continues_across_column_boundary() {
        // One repeat run of 6 spanning two columns of height 3.
        let image = decode_column_major(&[5, 9], 2, 3).expect("decode");
        assert_eq!(image.pixels, vec![9; 6]);
    }

    #[test]
    fn literal_run_continues_across_column_boundary() {
        let src = [(-6i8) as u8, 1, 2, 3, 4, 5, 6];
        let image = decode_column_major(&src, 2, 3).expect("decode");
        // Column-major order: column 0 gets 1,2,3; column 1 gets 4,5,6.
        assert_eq!(image.pixel(0, 0), 1);
        assert_eq!(image.pixel(0, 2), 3);
        assert_eq!(image.pixel(1, 0), 4);
        assert_eq!(image.pixel(1, 2), 6);
    }

    #[test]
    fn exhausted_stream_mid_run_is_corrupt_data() {
        // Claims 4 literals but supplies 2.
        let src = [(-4i8) as u8, 1, 2];
        let err = decode_column_major(&src, 1, 4).unwrap_err();
        assert!(matches!(err, crate::types::CodecError::CorruptData { .. }));
    }

    #[test]
    fn truncated_selector_is_corrupt_data() {
        let err = decode_column_major(&[], 1, 4).unwrap_err();
        assert!(matches!(err, crate::types::CodecError::CorruptData { offset: 0 }));
    }

    #[test]
    fn row_major_requires_eight_row_strips() {
        let err = decode_row_major(&[0, 0], 2, 5).unwrap_err();
        assert!(matches!(err, crate::types::CodecError::BadDimensions { .. }));
    }

    #[test]
    fn row_major_round_trip_of_structured_image() {
        let mut rows = Vec::new();
        for y in 0..8u8 {
            rows.push(vec![y; 5]);
        }
        let image =
            Image::from_pixels(5, 8, rows.concat()).expect("image");
        let encoded = encode_row_major(&image);
        let decoded = decode_row_major(&encoded, 5, 8).expect("decode");
        assert_eq!(decoded, image);
    }

    #[test]
    fn column_major_round_trip_of_mixed_runs() {
        let image = image_from_rows(&[
            &[0, 0, 0, 1],
            &[0, 5, 5, 1],
            &[0, 5, 5, 1],
            &[2, 3, 4, 1],
        ]);
        let encoded = encode_column_major(&image);
        let decoded = decode_column_major(&encoded, 4, 4).expect("decode");
        assert_eq!(decoded, image);
    }

    proptest! {
        #[test]
        fn column_major_round_trip(
            width in 1u32..12,
            height in 1u32..12,
            seed in any::<u64>(),
        ) {
            // Low-cardinality pixels so both run kinds appear.
            let mut state = seed;
            let mut pixels = Vec::new();
            for _ in 0..(width * height) {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                pixels.push(((state >> 56) % 4) as u8);
            }
            let image = Image::from_pixels(width, height, pixels).expect("image");
            let encoded = encode_column_major(&image);
            let decoded = decode_column_major(&encoded, width, height).expect("decode");
            prop_assert_eq!(decoded, image);
        }

        #[test]
        fn row_major_round_trip(
            width in 1u32..12,
            strips in 1u32..4,
            seed in any::<u64>(),
        ) {
            let height = strips * 8;
            let mut state = seed;
            let mut pixels = Vec::new();
            for _ in 0..(width * height) {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                pixels.push(((state >> 56) % 3) as u8);
            }
            let image = Image::from_pixels(width, height, pixels).expect("image");
            let encoded = encode_row_major(&image);
            let decoded = decode_row_major(&encoded, width, height).expect("decode");
            prop_assert_eq!(decoded, image);
        }
    }
}
