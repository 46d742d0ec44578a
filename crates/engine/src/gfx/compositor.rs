//! Blits decoded images onto the world surface with clipping,
//! transparency, masking, palette remapping, and perspective scaling.

use crate::types::EngineConfig;

use super::surface::{Image, Surface};

/// Per-blit options. The zero palette index is the transparent color
/// when `transparent` is set; `mask` gates per-pixel copy with a
/// parallel image; `scaled` resamples to a rectangle derived from the
/// destination row's perspective factor; `color_override` remaps one
/// source palette index on copy.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlitOptions<'a> {
    pub transparent: bool,
    pub mask: Option<&'a Image>,
    pub scaled: bool,
    pub color_override: Option<(u8, u8)>,
}

impl BlitOptions<'_> {
    /// Copy every pixel, zero included.
    pub fn opaque() -> Self {
        Self::default()
    }

    /// Skip zero-valued source pixels.
    pub fn transparent() -> Self {
        Self { transparent: true, ..Self::default() }
    }
}

/// Owns the world surface and the persistent scroll offset pair.
/// Horizontal and vertical scroll are independent; each is recomputed
/// once per tick from the scroll anchor entity's pixel position.
pub struct Compositor {
    surface: Surface,
    scroll_x: i32,
    scroll_y: i32,
    viewport_width: i32,
    viewport_height: i32,
    baseline_row: i32,
    scale_per_row_milli: i32,
}

impl Compositor {
    pub fn new(surface_width: i32, surface_height: i32, config: &EngineConfig) -> Self {
        Self {
            surface: Surface::new(surface_width, surface_height),
            scroll_x: 0,
            scroll_y: 0,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            baseline_row: config.scale_baseline_row,
            scale_per_row_milli: config.scale_per_row_milli,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn clear(&mut self, color: u8) {
        self.surface.fill(color);
    }

    pub fn scroll(&self) -> (i32, i32) {
        (self.scroll_x, self.scroll_y)
    }

    pub fn set_scroll(&mut self, x: i32, y: i32) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    /// Center the viewport on the anchor's pixel position, clamped to
    /// the surface edges. Axes are recomputed independently.
    pub fn follow_anchor(&mut self, anchor_x: i32, anchor_y: i32) {
        let max_x = (self.surface.width() - self.viewport_width).max(0);
        let max_y = (self.surface.height() - self.viewport_height).max(0);
        self.scroll_x = (anchor_x - self.viewport_width / 2).clamp(0, max_x);
        self.scroll_y = (anchor_y - self.viewport_height / 2).clamp(0, max_y);
    }

    /// Perspective scale factor for a destination row, in 1/1000ths.
    /// Linear in vertical distance from the baseline row, floored at
    /// zero.
    pub fn scale_factor_milli(&self, y: i32) -> i32 {
        (1000 + (y - self.baseline_row) * self.scale_per_row_milli).max(0)
    }

    /// Copy `image` onto the surface at `(x, y)` (pre-scroll surface
    /// coordinates). Fully clipped blits are a no-op, not an error.
    pub fn blit(&mut self, image: &Image, x: i32, y: i32, opts: &BlitOptions) {
        let x = x - self.scroll_x;
        let y = y - self.scroll_y;
        if opts.scaled {
            let factor = self.scale_factor_milli(y);
            self.blit_scaled(image, x, y, factor, opts);
        } else {
            self.blit_unscaled(image, x, y, opts);
        }
    }

    fn blit_unscaled(&mut self, image: &Image, x: i32, y: i32, opts: &BlitOptions) {
        let Some(clip) = clip_rect(
            x,
            y,
            image.width as i32,
            image.height as i32,
            self.surface.width(),
            self.surface.height(),
        ) else {
            return;
        };

        for row in 0..clip.height {
            for col in 0..clip.width {
                let sx = (clip.src_x + col) as u32;
                let sy = (clip.src_y + row) as u32;
                if let Some(mask) = opts.mask
                    && mask.pixel(sx, sy) == 0
                {
                    continue;
                }
                let mut color = image.pixel(sx, sy);
                if opts.transparent && color == 0 {
                    continue;
                }
                if let Some((from, to)) = opts.color_override
                    && color == from
                {
                    color = to;
                }
                self.surface.put_pixel(clip.dst_x + col, clip.dst_y + row, color);
            }
        }
    }

    /// Nearest-neighbor resample: destination rectangle size is the
    /// source size times the factor; each destination pixel samples
    /// `dest_px * src_size / dst_size` with integer truncation.
    fn blit_scaled(&mut self, image: &Image, x: i32, y: i32, factor_milli: i32, opts: &BlitOptions) {
        let src_w = image.width as i32;
        let src_h = image.height as i32;
        let dst_w = src_w * factor_milli / 1000;
        let dst_h = src_h * factor_milli / 1000;
        if dst_w == 0 || dst_h == 0 {
            return;
        }
        let Some(clip) = clip_rect(x, y, dst_w, dst_h, self.surface.width(), self.surface.height())
        else {
            return;
        };

        for row in 0..clip.height {
            for col in 0..clip.width {
                let dx = clip.src_x + col;
                let dy = clip.src_y + row;
                let sx = (dx * src_w / dst_w) as u32;
                let sy = (dy * src_h / dst_h) as u32;
                if let Some(mask) = opts.mask
                    && mask.pixel(sx, sy) == 0
                {
                    continue;
                }
                let mut color = image.pixel(sx, sy);
                if opts.transparent && color == 0 {
                    continue;
                }
                if let Some((from, to)) = opts.color_override
                    && color == from
                {
                    color = to;
                }
                self.surface.put_pixel(clip.dst_x + col, clip.dst_y + row, color);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ClippedRect {
    dst_x: i32,
    dst_y: i32,
    src_x: i32,
    src_y: i32,
    width: i32,
    height: i32,
}

/// Visible sub-rectangle of `(x, y, width, height)` against the
/// destination window. `None` when nothing is visible.
fn clip_rect(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    dest_width: i32,
    dest_height: i32,
) -> Option<ClippedRect> {
    let src_x = (-x).max(0);
    let src_y = (-y).max(0);
    let dst_x = x.max(0);
    let dst_y = y.max(0);
    let width = (width - src_x).min(dest_width - dst_x);
    let height = (height - src_y).min(dest_height - dst_y);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(ClippedRect { dst_x, dst_y, src_x, src_y, width, height })
}
