use anyhow::{bail, Result};

pub const DEFAULT_TEMPLATE_EDGE: usize = 20;
pub const DEFAULT_SEARCH_EXPANSION: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.80;
pub const DEFAULT_FADING_FRAMES: i64 = 12;

/// Tracking parameters, in native video pixels.
#[derive(Clone, Debug, PartialEq)]
#[derive(clap::Parser)]
pub struct TrackerConfig {
    /// Edge of the square template captured around each point
    #[clap(long, default_value = "20")]
    pub template_edge: usize,

    /// Search window edge as a multiple of the template edge
    #[clap(long, default_value = "5")]
    pub search_expansion: usize,

    /// Best match must score strictly above this to count
    #[clap(long, default_value = "0.8")]
    pub similarity_threshold: f64,

    /// Frames over which a stopped track fades out after its end
    #[clap(long, default_value = "12")]
    pub fading_frames: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            template_edge: DEFAULT_TEMPLATE_EDGE,
            search_expansion: DEFAULT_SEARCH_EXPANSION,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            fading_frames: DEFAULT_FADING_FRAMES,
        }
    }
}

impl TrackerConfig {
    pub fn search_edge(&self) -> usize {
        self.template_edge * self.search_expansion
    }

    pub fn validate(&self) -> Result<()> {
        if self.template_edge == 0 {
            bail!("template edge must be positive");
        }
        if self.search_expansion < 1 {
            bail!("search expansion must be at least 1, got {}", self.search_expansion);
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            bail!(
                "similarity threshold must lie in [0, 1], got {}",
                self.similarity_threshold
            );
        }
        if self.fading_frames < 1 {
            bail!("fading frames must be positive, got {}", self.fading_frames);
        }
        Ok(())
    }
}
