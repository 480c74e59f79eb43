use anyhow::{bail, Result};
use clap::Parser;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::image::Image;
use crate::my_types::*;
use crate::timebase::TimeBase;

pub const SPRITE_EDGE: usize = 24;

/// Synthetic video: a textured square sliding over a static noise background.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
pub struct ClipConfig {
    #[clap(long, default_value = "320")]
    pub width: usize,
    #[clap(long, default_value = "240")]
    pub height: usize,
    #[clap(long, default_value = "60")]
    pub frame_count: usize,
    #[clap(long, default_value = "0")]
    pub first_timestamp: Timestamp,
    #[clap(long, default_value = "40")]
    pub timestamps_per_frame: i64,
    #[clap(long, default_value = "60")]
    pub start_x: i32,
    #[clap(long, default_value = "60")]
    pub start_y: i32,
    /// Sprite motion in pixels per frame
    #[clap(long, default_value = "3", allow_hyphen_values = true)]
    pub velocity_x: i32,
    #[clap(long, default_value = "2", allow_hyphen_values = true)]
    pub velocity_y: i32,
    /// First frame without the sprite
    #[clap(long)]
    pub vanish_at: Option<usize>,
    #[clap(long, default_value = "42")]
    pub seed: u64,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            frame_count: 60,
            first_timestamp: 0,
            timestamps_per_frame: 40,
            start_x: 60,
            start_y: 60,
            velocity_x: 3,
            velocity_y: 2,
            vanish_at: None,
            seed: 42,
        }
    }
}

pub struct InputFrame {
    pub index: usize,
    pub timestamp: Timestamp,
    pub image: Image,
}

pub struct SyntheticClip {
    config: ClipConfig,
    background: Image,
    sprite: Image,
    next: usize,
}

fn noise(rng: &mut Xoshiro256PlusPlus, width: usize, height: usize) -> Image {
    let mut image = Image::new(width, height);
    rng.fill(&mut image.data[..]);
    image
}

impl SyntheticClip {
    pub fn new(config: ClipConfig) -> Result<SyntheticClip> {
        if config.frame_count == 0 {
            bail!("clip needs at least one frame");
        }
        if config.timestamps_per_frame <= 0 {
            bail!(
                "timestamps per frame must be positive, got {}",
                config.timestamps_per_frame
            );
        }
        let half = (SPRITE_EDGE / 2) as i32;
        let bounds = Rect::new(
            half,
            half,
            config.width as i32 - 2 * half + 1,
            config.height as i32 - 2 * half + 1,
        );
        let last = config.frame_count as i32 - 1;
        for center in [
            Vector2i::new(config.start_x, config.start_y),
            Vector2i::new(
                config.start_x + last * config.velocity_x,
                config.start_y + last * config.velocity_y,
            ),
        ] {
            if !bounds.contains(center) {
                bail!(
                    "sprite at ({}, {}) leaves the {} x {} frame",
                    center.x,
                    center.y,
                    config.width,
                    config.height
                );
            }
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let background = noise(&mut rng, config.width, config.height);
        let sprite = noise(&mut rng, SPRITE_EDGE, SPRITE_EDGE);
        debug!(
            "synthetic clip {} x {}, {} frames",
            config.width, config.height, config.frame_count
        );
        Ok(SyntheticClip {
            config,
            background,
            sprite,
            next: 0,
        })
    }

    pub fn length(&self) -> u64 {
        self.config.frame_count as u64
    }

    pub fn size(&self) -> [usize; 2] {
        [self.config.width, self.config.height]
    }

    pub fn time_base(&self, source: &str) -> TimeBase {
        TimeBase::new(
            self.config.first_timestamp,
            self.config.timestamps_per_frame,
            source,
        )
    }

    pub fn timestamp(&self, index: usize) -> Timestamp {
        self.config.first_timestamp + index as i64 * self.config.timestamps_per_frame
    }

    /// Ground truth position of the sprite, `None` once it has vanished.
    pub fn sprite_center(&self, index: usize) -> Option<Vector2i> {
        if matches!(self.config.vanish_at, Some(vanish) if index >= vanish) {
            return None;
        }
        let i = index as i32;
        Some(Vector2i::new(
            self.config.start_x + i * self.config.velocity_x,
            self.config.start_y + i * self.config.velocity_y,
        ))
    }

    /// Render frame `index` without advancing the clip.
    pub fn frame(&self, index: usize) -> Image {
        let mut image = self.background.clone();
        if let Some(center) = self.sprite_center(index) {
            let half = (SPRITE_EDGE / 2) as i32;
            image.set_sub_image_i32(center.x - half, center.y - half, &self.sprite);
        }
        image
    }
}

impl Iterator for SyntheticClip {
    type Item = InputFrame;

    fn next(&mut self) -> Option<InputFrame> {
        if self.next >= self.config.frame_count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(InputFrame {
            index,
            timestamp: self.timestamp(index),
            image: self.frame(index),
        })
    }
}
