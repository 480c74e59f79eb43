use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::my_types::*;
use crate::trajectory::TrajectoryPoint;

/// Horizontal distance between a point and a freshly placed label.
pub const LABEL_OFFSET_X: i32 = 25;
/// Padding added around the measured text.
const BACKGROUND_PADDING: (i32, i32) = (8, 4);

/// Entry of the host's keyframe list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Absolute.
    pub timestamp: Timestamp,
    pub title: String,
}

impl Keyframe {
    pub fn new(timestamp: Timestamp, title: impl Into<String>) -> Self {
        Self {
            timestamp,
            title: title.into(),
        }
    }
}

/// Size of rendered label text, provided by the host's font engine.
pub trait TextMeasure: Debug {
    fn measure(&self, text: &str) -> (i32, i32);
}

/// Every character has the same advance.
#[derive(Clone, Copy, Debug)]
pub struct FixedAdvance {
    pub char_width: i32,
    pub line_height: i32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        // Roughly an 8pt bold sans-serif.
        Self {
            char_width: 7,
            line_height: 13,
        }
    }
}

impl TextMeasure for FixedAdvance {
    fn measure(&self, text: &str) -> (i32, i32) {
        // Text is drawn with one space on each side.
        let chars = text.chars().count() as i32 + 2;
        (chars * self.char_width, self.line_height)
    }
}

fn background_size(text: &str, measure: &dyn TextMeasure) -> (i32, i32) {
    let (w, h) = measure.measure(text);
    (w + BACKGROUND_PADDING.0, h + BACKGROUND_PADDING.1)
}

/// Annotation bound to the trajectory point closest to a keyframe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyframeLabel {
    /// Absolute timestamp of the keyframe this label mirrors.
    pub keyframe_timestamp: Timestamp,
    /// Relative time of the attached trajectory point.
    pub attached_t: Timestamp,
    /// Canonical position of the attached point.
    pub anchor: Vector2i,
    pub text: String,
    /// Canonical (unscaled) background rectangle.
    pub background: Rect,
    /// Set once the user dragged the background; the position is then kept
    /// when the label is re-attached or retitled.
    pub user_positioned: bool,
}

impl KeyframeLabel {
    pub fn new(keyframe: &Keyframe, point: &TrajectoryPoint, measure: &dyn TextMeasure) -> Self {
        let (width, height) = background_size(&keyframe.title, measure);
        Self {
            keyframe_timestamp: keyframe.timestamp,
            attached_t: point.t,
            anchor: point.position(),
            text: keyframe.title.clone(),
            background: Rect::new(point.x + LABEL_OFFSET_X, point.y, width, height),
            user_positioned: false,
        }
    }

    /// Bind to another point. The background follows unless the user placed it.
    pub fn attach(&mut self, point: &TrajectoryPoint) {
        self.attached_t = point.t;
        self.anchor = point.position();
        if !self.user_positioned {
            self.background.x = point.x + LABEL_OFFSET_X;
            self.background.y = point.y;
        }
    }

    /// Change the text, resizing the background in place.
    pub fn set_text(&mut self, text: &str, measure: &dyn TextMeasure) {
        let (width, height) = background_size(text, measure);
        self.text = text.to_string();
        self.background.width = width;
        self.background.height = height;
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.background = self.background.offset(dx, dy);
        self.user_positioned = true;
    }

    pub fn hit_test(&self, point: Vector2i) -> bool {
        self.background.contains(point)
    }
}

/// The track's own label. Its background is relative to whichever point it
/// currently follows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainLabel {
    pub text: String,
    /// Background relative to the anchor point.
    pub background: Rect,
}

impl MainLabel {
    pub fn new(text: &str, measure: &dyn TextMeasure) -> Self {
        let (width, height) = background_size(text, measure);
        Self {
            text: text.to_string(),
            background: Rect::new(-20, -50, width, height),
        }
    }

    pub fn set_text(&mut self, text: &str, measure: &dyn TextMeasure) {
        let (width, height) = background_size(text, measure);
        self.text = text.to_string();
        self.background.width = width;
        self.background.height = height;
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.background = self.background.offset(dx, dy);
    }

    /// Canonical background when following `anchor`.
    pub fn background_at(&self, anchor: Vector2i) -> Rect {
        self.background.offset(anchor.x, anchor.y)
    }

    pub fn hit_test(&self, anchor: Vector2i, point: Vector2i) -> bool {
        self.background_at(anchor).contains(point)
    }
}
