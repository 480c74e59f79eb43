use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::display::{DisplayCache, ViewTransform};
use crate::fading::Fading;
use crate::image::Image;
use crate::label::{FixedAdvance, Keyframe, KeyframeLabel, MainLabel, TextMeasure};
use crate::matcher::Matcher;
use crate::my_types::*;
use crate::patch::Patch;
use crate::reconciler::{reconcile, Reconciliation};
use crate::tracker::TrackState;
use crate::trajectory::{Trajectory, TrajectoryPoint};

/// Radius of the current point marker.
pub const CROSS_RADIUS: i32 = 4;
/// Extra pixels around the marker that still grab it.
const HIT_MARGIN: i32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackView {
    /// Whole path.
    #[default]
    Trajectory,
    /// Main label rides on the current point.
    LabelFollows,
    /// Arrow rides on the current point.
    ArrowFollows,
}

/// What a mutating call touched, for the host to forward to dependent views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub points: bool,
    pub labels: bool,
    pub state: bool,
}

impl Changes {
    pub fn any(&self) -> bool {
        self.points || self.labels || self.state
    }

    pub(crate) fn points() -> Self {
        Self {
            points: true,
            ..Default::default()
        }
    }

    pub(crate) fn state() -> Self {
        Self {
            state: true,
            ..Default::default()
        }
    }

    pub(crate) fn with_labels(mut self, reconciliation: &Reconciliation) -> Self {
        self.labels |= !reconciliation.is_noop();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    Miss,
    Cursor,
    MainLabel,
    /// Index into `Track::labels`.
    Label(usize),
}

/// Ask the host to jump to the frame whose point is closest to where the user
/// dragged, weighing screen distance against distance in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosestFrameRequest {
    /// Canonical mouse position.
    pub point: Vector2i,
    pub begin_timestamp: Timestamp,
    pub points: Vec<TrajectoryPoint>,
    pub flat_distance: i32,
    pub spatial_only: bool,
}

impl ClosestFrameRequest {
    /// Absolute timestamp of the chosen point. Time offsets from
    /// `current_timestamp` are brought to pixels using the ratio between the
    /// trajectory's time span and its flat distance.
    pub fn resolve(&self, current_timestamp: Timestamp) -> Timestamp {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return current_timestamp,
        };
        let time_span = last.t - first.t;
        let use_time = !self.spatial_only && self.flat_distance > 0 && time_span > 0;
        let scale = time_span as f64 / self.flat_distance as f64;

        let mut min_distance = f64::MAX;
        let mut closest = 0;
        for (i, p) in self.points.iter().enumerate() {
            let dx = (self.point.x - p.x) as f64;
            let dy = (self.point.y - p.y) as f64;
            let mut distance = dx * dx + dy * dy;
            if use_time {
                let elapsed = current_timestamp
                    .saturating_sub(self.begin_timestamp)
                    .saturating_sub(p.t);
                let dt = (elapsed as f64 / scale).trunc();
                distance += dt * dt;
            }
            if distance < min_distance {
                min_distance = distance;
                closest = i;
            }
        }
        self.points[closest].t + self.begin_timestamp
    }
}

/// One tracked point: its trajectory, keyframe labels and tracking state.
#[derive(Debug)]
pub struct Track {
    pub(crate) trajectory: Trajectory,
    pub(crate) labels: Vec<KeyframeLabel>,
    pub(crate) main_label: MainLabel,
    pub(crate) view: TrackView,
    pub(crate) state: TrackState,
    /// Point shown at the playhead.
    pub(crate) current: usize,
    /// Last keyframe list received from the host.
    pub(crate) keyframes: Vec<Keyframe>,
    pub(crate) matcher: Matcher,
    pub(crate) fading: Fading,
    pub(crate) display: DisplayCache,
    pub(crate) measure: Box<dyn TextMeasure>,
}

impl Track {
    /// Start a track where the user clicked. With a frame, the seed point gets
    /// its template right away.
    pub fn new(
        position: Vector2i,
        timestamp: Timestamp,
        frame: Option<&Image>,
        config: &TrackerConfig,
    ) -> Self {
        let mut seed = TrajectoryPoint::new(position.x, position.y, 0);
        if let Some(frame) = frame {
            seed = seed.with_patch(Patch::capture(frame, position, config.template_edge));
        }
        let trajectory = Trajectory::new(seed, timestamp);
        Self::from_parts(trajectory, vec![], TrackView::default(), TrackState::Editing, config)
    }

    pub(crate) fn from_parts(
        trajectory: Trajectory,
        labels: Vec<KeyframeLabel>,
        view: TrackView,
        state: TrackState,
        config: &TrackerConfig,
    ) -> Self {
        let measure: Box<dyn TextMeasure> = Box::new(FixedAdvance::default());
        Self {
            trajectory,
            labels,
            main_label: MainLabel::new("Label", measure.as_ref()),
            view,
            state,
            current: 0,
            keyframes: vec![],
            matcher: Matcher::new(config),
            fading: Fading::new(config.fading_frames, 1),
            display: DisplayCache::new(),
            measure,
        }
    }

    /// Use the host's font metrics for label backgrounds.
    pub fn with_text_measure(mut self, measure: Box<dyn TextMeasure>) -> Self {
        self.measure = measure;
        let text = self.main_label.text.clone();
        self.main_label.set_text(&text, self.measure.as_ref());
        self
    }

    /// Frame duration of the video, used for fading after the end.
    pub fn set_average_timestamps_per_frame(&mut self, average_timestamps_per_frame: i64) {
        self.fading.average_timestamps_per_frame = average_timestamps_per_frame;
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn labels(&self) -> &[KeyframeLabel] {
        &self.labels
    }

    pub fn main_label(&self) -> &MainLabel {
        &self.main_label
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn view(&self) -> TrackView {
        self.view
    }

    pub fn set_view(&mut self, view: TrackView) {
        self.view = view;
    }

    pub fn begin_timestamp(&self) -> Timestamp {
        self.trajectory.begin_timestamp()
    }

    pub fn end_timestamp(&self) -> Timestamp {
        self.trajectory.end_timestamp()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_point(&self) -> &TrajectoryPoint {
        &self.trajectory.points()[self.current]
    }

    /// Make the point closest to `timestamp` the current one.
    pub fn set_playhead(&mut self, timestamp: Timestamp) -> usize {
        self.current = self.trajectory.find_closest_point(timestamp);
        self.current
    }

    /// Nudge the last point while placing it by hand. Has no effect outside
    /// of editing. The template is not recaptured, see `refresh_patch`.
    pub fn move_current_point(&mut self, dx: i32, dy: i32) -> Changes {
        if self.state != TrackState::Editing {
            warn!("point move ignored in {:?} state", self.state);
            return Changes::default();
        }
        let last = self.trajectory.last_mut();
        last.x += dx;
        last.y += dy;
        self.current = self.trajectory.len() - 1;
        self.display.invalidate();
        Changes::points()
    }

    /// Recapture the last point's template from `frame`.
    pub fn refresh_patch(&mut self, frame: &Image) {
        let edge = self.matcher.template_edge();
        let last = self.trajectory.last_mut();
        last.patch = Some(Patch::capture(frame, last.position(), edge));
    }

    /// Dragging on a stopped track scrubs to the closest point instead of
    /// editing it.
    pub fn drag_to(&self, point: Vector2i) -> Option<ClosestFrameRequest> {
        if self.state != TrackState::Stopped || self.trajectory.len() < 2 {
            return None;
        }
        Some(ClosestFrameRequest {
            point,
            begin_timestamp: self.trajectory.begin_timestamp(),
            points: self
                .trajectory
                .points()
                .iter()
                .map(TrajectoryPoint::without_patch)
                .collect(),
            flat_distance: self.trajectory.flat_distance(),
            spatial_only: false,
        })
    }

    /// Points that `chop_trajectory(timestamp)` is about to remove, plus the
    /// kept closest point, for the undo stack.
    pub fn suffix_from(&self, timestamp: Timestamp) -> Vec<TrajectoryPoint> {
        self.trajectory.suffix_from(timestamp)
    }

    /// Delete everything after the point closest to `timestamp`.
    pub fn chop_trajectory(&mut self, timestamp: Timestamp) -> Changes {
        let removed = self.trajectory.chop(timestamp);
        if removed == 0 {
            return Changes::default();
        }
        info!("trajectory chopped at {timestamp}, {removed} points removed");
        self.current = usize::min(self.current, self.trajectory.len() - 1);
        self.display.invalidate();
        let labels = self.reconcile_labels();
        Changes::points().with_labels(&labels)
    }

    /// Undo of `chop_trajectory`: the suffix replaces any overlapping points.
    pub fn append_points(&mut self, suffix: Vec<TrajectoryPoint>) -> Changes {
        if suffix.is_empty() {
            return Changes::default();
        }
        self.trajectory.append_points(suffix);
        self.current = usize::min(self.current, self.trajectory.len() - 1);
        self.display.invalidate();
        let labels = self.reconcile_labels();
        Changes::points().with_labels(&labels)
    }

    /// Replace the host keyframe list and sync the labels with it.
    pub fn set_keyframes(&mut self, keyframes: &[Keyframe]) -> Changes {
        self.keyframes = keyframes.to_vec();
        let labels = self.reconcile_labels();
        Changes::default().with_labels(&labels)
    }

    pub(crate) fn reconcile_labels(&mut self) -> Reconciliation {
        let summary = reconcile(
            &mut self.labels,
            &self.keyframes,
            &self.trajectory,
            self.measure.as_ref(),
        );
        if !summary.is_noop() {
            self.display.invalidate();
        }
        summary
    }

    /// Drag a keyframe label background. Returns false for a bad index.
    pub fn move_label(&mut self, index: usize, dx: i32, dy: i32) -> bool {
        match self.labels.get_mut(index) {
            Some(label) => {
                label.move_by(dx, dy);
                self.display.invalidate();
                true
            }
            None => false,
        }
    }

    pub fn move_main_label(&mut self, dx: i32, dy: i32) {
        self.main_label.move_by(dx, dy);
        self.display.invalidate();
    }

    pub fn set_label_text(&mut self, text: &str) {
        self.main_label.set_text(text, self.measure.as_ref());
        self.display.invalidate();
    }

    /// Opacity at the playhead: full while the track lives, fading out after
    /// the end of a stopped track.
    pub fn opacity(&self, timestamp: Timestamp) -> f64 {
        let end = self.trajectory.end_timestamp();
        if self.state == TrackState::Stopped && timestamp > end {
            self.fading.opacity(end, timestamp)
        } else {
            1.
        }
    }

    /// What lies under `point` (canonical) at the given playhead time.
    pub fn hit_test(&self, point: Vector2i, timestamp: Timestamp) -> Hit {
        if timestamp < self.trajectory.begin_timestamp()
            || timestamp > self.trajectory.end_timestamp()
        {
            return Hit::Miss;
        }
        let anchor = self.current_point().position();
        if self.state == TrackState::Stopped {
            if self.view == TrackView::LabelFollows {
                if self.main_label.hit_test(anchor, point) {
                    return Hit::MainLabel;
                }
            } else if let Some(i) = self.labels.iter().position(|l| l.hit_test(point)) {
                return Hit::Label(i);
            }
        }
        let edge = (CROSS_RADIUS + HIT_MARGIN) * 2;
        if Rect::centered(anchor, edge, edge).contains(point) {
            return Hit::Cursor;
        }
        Hit::Miss
    }

    /// Screen geometry under `transform`, rebuilt only when needed.
    pub fn display(&mut self, transform: ViewTransform) -> &DisplayCache {
        self.display
            .refresh(transform, &self.trajectory, &self.labels, &self.main_label);
        &self.display
    }
}
