use crate::label::{KeyframeLabel, MainLabel};
use crate::my_types::*;
use crate::trajectory::Trajectory;

/// Zoom and pan of the viewport over the native image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub stretch: f64,
    /// Canonical coordinates of the top-left corner of the view.
    pub pan: Vector2i,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            stretch: 1.,
            pan: Vector2i::zeros(),
        }
    }
}

impl ViewTransform {
    pub fn new(stretch: f64, pan: Vector2i) -> Self {
        Self { stretch, pan }
    }

    /// `(canonical - pan) * stretch`, truncated toward zero.
    pub fn project(&self, p: Vector2i) -> Vector2i {
        Vector2i::new(
            ((p.x - self.pan.x) as f64 * self.stretch) as i32,
            ((p.y - self.pan.y) as f64 * self.stretch) as i32,
        )
    }

    /// Screen to canonical, for mouse input.
    pub fn unproject(&self, p: Vector2i) -> Vector2i {
        Vector2i::new(
            (p.x as f64 / self.stretch) as i32 + self.pan.x,
            (p.y as f64 / self.stretch) as i32 + self.pan.y,
        )
    }

    pub fn project_rect(&self, r: Rect) -> Rect {
        let location = self.project(r.location());
        Rect::new(
            location.x,
            location.y,
            (r.width as f64 * self.stretch) as i32,
            (r.height as f64 * self.stretch) as i32,
        )
    }

    /// Scale only, for geometry expressed relative to a point.
    pub fn scale_rect(&self, r: Rect) -> Rect {
        Rect::new(
            (r.x as f64 * self.stretch) as i32,
            (r.y as f64 * self.stretch) as i32,
            (r.width as f64 * self.stretch) as i32,
            (r.height as f64 * self.stretch) as i32,
        )
    }
}

/// Screen-space shadow of a track's geometry. Derived data only: it is rebuilt
/// from canonical coordinates whenever the transform changes or after an edit.
#[derive(Clone, Debug, Default)]
pub struct DisplayCache {
    transform: Option<ViewTransform>,
    points: Vec<Vector2i>,
    labels: Vec<Rect>,
    main_label: Rect,
}

impl DisplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.transform = None;
    }

    pub fn is_valid_for(&self, transform: &ViewTransform) -> bool {
        self.transform.as_ref() == Some(transform)
    }

    /// Rebuild if `transform` differs from the cached one. Returns whether a
    /// rebuild happened.
    pub fn refresh(
        &mut self,
        transform: ViewTransform,
        trajectory: &Trajectory,
        labels: &[KeyframeLabel],
        main_label: &MainLabel,
    ) -> bool {
        if self.is_valid_for(&transform) {
            return false;
        }
        self.points.clear();
        self.points
            .extend(trajectory.points().iter().map(|p| transform.project(p.position())));
        self.labels.clear();
        self.labels
            .extend(labels.iter().map(|l| transform.project_rect(l.background)));
        self.main_label = transform.scale_rect(main_label.background);
        self.transform = Some(transform);
        true
    }

    pub fn transform(&self) -> Option<ViewTransform> {
        self.transform
    }

    pub fn points(&self) -> &[Vector2i] {
        &self.points
    }

    pub fn labels(&self) -> &[Rect] {
        &self.labels
    }

    /// Main label background relative to its projected anchor.
    pub fn main_label(&self) -> Rect {
        self.main_label
    }
}
