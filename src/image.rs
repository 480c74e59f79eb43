use anyhow::{bail, Result};

use crate::my_types::*;

/// Row-major grayscale image storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Image {
    /// Create a black image
    pub fn new(width: usize, height: usize) -> Image {
        Image {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    /// Wrap a decoded frame buffer
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize) -> Result<Image> {
        if data.len() != width * height {
            bail!(
                "buffer of {} bytes does not match a {width} x {height} grayscale image",
                data.len()
            );
        }
        Ok(Image {
            data,
            width,
            height,
        })
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    #[inline(always)]
    pub fn contains_i32(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline(always)]
    pub fn value_i32(&self, x: i32, y: i32) -> u8 {
        self.data[y as usize * self.width + x as usize]
    }

    /// Pixels outside the image read as black.
    #[inline(always)]
    pub fn value_or_zero(&self, x: i32, y: i32) -> u8 {
        if self.contains_i32(x, y) {
            self.value_i32(x, y)
        } else {
            0
        }
    }

    #[inline(always)]
    pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Copy `sub` with its top-left corner at `(x, y)`, dropping pixels that
    /// fall outside of `self`.
    pub fn set_sub_image_i32(&mut self, x: i32, y: i32, sub: &Image) {
        for sy in 0..sub.height as i32 {
            for sx in 0..sub.width as i32 {
                let (dx, dy) = (x + sx, y + sy);
                if self.contains_i32(dx, dy) {
                    self.set_value(dx as usize, dy as usize, sub.value_i32(sx, sy));
                }
            }
        }
    }

    /// Copy out a region. Parts of `rect` outside the image are black.
    pub fn crop(&self, rect: Rect) -> Image {
        let width = rect.width.max(0) as usize;
        let height = rect.height.max(0) as usize;
        let mut data = Vec::with_capacity(width * height);
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                data.push(self.value_or_zero(x, y));
            }
        }
        Image {
            data,
            width,
            height,
        }
    }
}
