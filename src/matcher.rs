use log::debug;

use crate::config::TrackerConfig;
use crate::image::Image;
use crate::my_types::*;
use crate::patch::Patch;

/// Below this the intensity variance of a region is treated as zero.
const FLAT_VARIANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult {
    pub found: bool,
    /// Center of the best candidate, or of the search window when nothing
    /// could be evaluated.
    pub center: Vector2i,
    pub score: f64,
}

/// Exhaustive template search with normalized cross-correlation.
#[derive(Clone, Debug)]
pub struct Matcher {
    template_edge: usize,
    search_expansion: usize,
    similarity_threshold: f64,
}

impl Matcher {
    pub fn new(config: &TrackerConfig) -> Matcher {
        Matcher {
            template_edge: config.template_edge,
            search_expansion: config.search_expansion,
            similarity_threshold: config.similarity_threshold,
        }
    }

    pub fn template_edge(&self) -> usize {
        self.template_edge
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Square window centered on `center`, `search_expansion` template edges wide.
    pub fn search_window(&self, center: Vector2i) -> Rect {
        let edge = (self.template_edge * self.search_expansion) as i32;
        Rect::centered(center, edge, edge)
    }

    /// Find `patch` inside `window` of `frame`. Every placement of the template
    /// that fits entirely in the window (clipped to the frame) is scored; ties
    /// go to the placement closest to the window center.
    pub fn locate(&self, patch: &Patch, frame: &Image, window: Rect) -> MatchResult {
        let origin = Vector2i::new(window.x + window.width / 2, window.y + window.height / 2);
        let no_match = MatchResult {
            found: false,
            center: origin,
            score: 0.,
        };

        let (tw, th) = (patch.width(), patch.height());
        if tw == 0 || th == 0 {
            return no_match;
        }
        let area = match window.intersect(&frame.bounds()) {
            Some(area) => area,
            None => return no_match,
        };
        if (area.width as usize) < tw || (area.height as usize) < th {
            return no_match;
        }

        let template = fill_grid(patch.image(), patch.image().bounds());
        let grid = fill_grid(frame, area);
        let scores = correlation_map(&template, &grid);

        let half = Vector2i::new(tw as i32 / 2, th as i32 / 2);
        let mut best: Option<(f64, i32, Vector2i)> = None;
        for row in 0..scores.nrows() {
            for col in 0..scores.ncols() {
                let score = scores[(row, col)];
                let center = Vector2i::new(area.x + col as i32, area.y + row as i32) + half;
                let d = center - origin;
                let dist2 = d.x * d.x + d.y * d.y;
                let better = match best {
                    None => true,
                    Some((best_score, best_dist2, _)) => {
                        score > best_score || (score == best_score && dist2 < best_dist2)
                    }
                };
                if better {
                    best = Some((score, dist2, center));
                }
            }
        }

        let (score, _, center) = match best {
            Some(best) => best,
            None => return no_match,
        };
        let found = score > self.similarity_threshold;
        debug!(
            "template search around ({}, {}): best ({}, {}) score {:.3}, found {}",
            origin.x, origin.y, center.x, center.y, score, found
        );
        MatchResult {
            found,
            center,
            score,
        }
    }
}

/// Similarity of every template placement inside `grid`, indexed by the
/// placement's top-left corner.
fn correlation_map(template: &Matrixd, grid: &Matrixd) -> Matrixd {
    let (th, tw) = template.shape();
    let n = (th * tw) as f64;
    let st = template.sum();
    let var_t = template.norm_squared() - st * st / n;

    let rows = grid.nrows() - th + 1;
    let cols = grid.ncols() - tw + 1;
    Matrixd::from_fn(rows, cols, |row, col| {
        let candidate = grid.view((row, col), (th, tw));
        let sc = candidate.sum();
        let var_c = candidate.norm_squared() - sc * sc / n;
        let stc = candidate.dot(template);
        similarity(n, st, var_t, sc, var_c, stc)
    })
}

/// Zero-mean normalized cross-correlation clipped to [0, 1]. Pixel values are
/// integers so all the sums are exact and an identical region scores exactly 1.
fn similarity(n: f64, st: f64, var_t: f64, sc: f64, var_c: f64, stc: f64) -> f64 {
    match (var_t <= FLAT_VARIANCE, var_c <= FLAT_VARIANCE) {
        (true, true) => 1. - f64::min((st - sc).abs() / n / 255., 1.),
        (false, false) => {
            let covariance = stc - st * sc / n;
            (covariance / (var_t * var_c).sqrt()).clamp(0., 1.)
        }
        _ => 0.,
    }
}

/// Copy the pixels of `range` into a matrix, rows are image rows.
fn fill_grid(image: &Image, range: Rect) -> Matrixd {
    Matrixd::from_fn(range.height as usize, range.width as usize, |y, x| {
        image.value_or_zero(range.x + x as i32, range.y + y as i32) as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn noise(width: usize, height: usize, seed: u64) -> Image {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut data = vec![0u8; width * height];
        rng.fill(&mut data[..]);
        Image {
            data,
            width,
            height,
        }
    }

    #[test]
    fn test_exact_copy() {
        let matcher = Matcher::new(&TrackerConfig::default());
        let sprite = noise(20, 20, 1);
        let mut frame = noise(160, 120, 2);
        frame.set_sub_image_i32(63, 47, &sprite);

        // Previous point a few pixels away from the copy's center (73, 57).
        let window = matcher.search_window(Vector2i::new(68, 60));
        let result = matcher.locate(&Patch::from_image(sprite), &frame, window);
        assert!(result.found);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.center, Vector2i::new(73, 57));
    }

    #[test]
    fn test_no_match_in_noise() {
        let matcher = Matcher::new(&TrackerConfig::default());
        let patch = Patch::from_image(noise(20, 20, 3));
        let frame = noise(160, 120, 4);
        let window = matcher.search_window(Vector2i::new(80, 60));
        let result = matcher.locate(&patch, &frame, window);
        assert!(!result.found);
        assert!(result.score < 0.8);
    }

    #[test]
    fn test_window_clipped_to_frame() {
        let matcher = Matcher::new(&TrackerConfig::default());
        let sprite = noise(20, 20, 5);
        let mut frame = noise(64, 64, 6);
        frame.set_sub_image_i32(0, 0, &sprite);
        let window = matcher.search_window(Vector2i::new(5, 5));
        let result = matcher.locate(&Patch::from_image(sprite), &frame, window);
        assert!(result.found);
        assert_eq!(result.center, Vector2i::new(10, 10));
    }

    #[test]
    fn test_window_outside_frame() {
        let matcher = Matcher::new(&TrackerConfig::default());
        let patch = Patch::from_image(noise(20, 20, 7));
        let frame = noise(64, 64, 8);
        let window = matcher.search_window(Vector2i::new(-200, -200));
        let result = matcher.locate(&patch, &frame, window);
        assert!(!result.found);
        assert_eq!(result.center, Vector2i::new(-200, -200));
    }

    #[test]
    fn test_flat_region_stays_put() {
        let matcher = Matcher::new(&TrackerConfig::default());
        let frame = Image {
            data: vec![90; 200 * 200],
            width: 200,
            height: 200,
        };
        let center = Vector2i::new(100, 100);
        let patch = Patch::capture(&frame, center, 20);
        let result = matcher.locate(&patch, &frame, matcher.search_window(center));
        assert!(result.found);
        assert_eq!(result.center, center);
    }

    #[test]
    fn test_similarity_bounds() {
        // Inverted contrast correlates negatively and is clipped to zero.
        let a = Matrixd::from_row_slice(2, 2, &[0., 255., 255., 0.]);
        let b = Matrixd::from_row_slice(2, 2, &[255., 0., 0., 255.]);
        let scores = correlation_map(&a, &b);
        assert_eq!(scores[(0, 0)], 0.);
        let scores = correlation_map(&a, &a);
        assert_eq!(scores[(0, 0)], 1.);
    }
}
