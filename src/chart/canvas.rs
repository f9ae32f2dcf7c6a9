//! Minimal raster drawing on top of `image::RgbImage`

use image::{Rgb, RgbImage};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Which way a triangle marker points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    TriangleDown,
    TriangleUp,
}

pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// White canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, WHITE),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Alpha-blend `color` onto one pixel; out-of-bounds writes are dropped
    pub fn blend(&mut self, x: i32, y: i32, color: Rgb<u8>, alpha: f32) {
        if x < 0 || y < 0 || x as u32 >= self.image.width() || y as u32 >= self.image.height() {
            return;
        }

        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let alpha = alpha.clamp(0.0, 1.0);
        for channel in 0..3 {
            let under = pixel.0[channel] as f32;
            let over = color.0[channel] as f32;
            pixel.0[channel] = (over * alpha + under * (1.0 - alpha)).round() as u8;
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>, alpha: f32) {
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                self.blend(x + dx, y + dy, color, alpha);
            }
        }
    }

    /// One-pixel rectangle outline
    pub fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
        let (w, h) = (width as i32, height as i32);
        self.line(x, y, x + w - 1, y, color, 1);
        self.line(x, y + h - 1, x + w - 1, y + h - 1, color, 1);
        self.line(x, y, x, y + h - 1, color, 1);
        self.line(x + w - 1, y, x + w - 1, y + h - 1, color, 1);
    }

    /// Bresenham line, `thickness` pixels wide
    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>, thickness: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;
        let offset = (thickness.max(1) as i32 - 1) / 2;

        loop {
            for ox in 0..thickness.max(1) as i32 {
                for oy in 0..thickness.max(1) as i32 {
                    self.blend(x + ox - offset, y + oy - offset, color, 1.0);
                }
            }

            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Filled triangle marker centred on (`cx`, `cy`) with half-size `size`
    pub fn marker(&mut self, cx: i32, cy: i32, size: i32, kind: Marker, color: Rgb<u8>, alpha: f32) {
        for row in 0..=2 * size {
            // Row 0 is the flat side for a down triangle and the apex for an up one
            let half_width = match kind {
                Marker::TriangleDown => size - row / 2,
                Marker::TriangleUp => row / 2,
            };
            let y = cy - size + row;
            for x in (cx - half_width)..=(cx + half_width) {
                self.blend(x, y, color, alpha);
            }
        }
    }
}
