use log::{debug, info};

use crate::image::Image;
use crate::matcher::MatchResult;
use crate::my_types::*;
use crate::patch::Patch;
use crate::reconciler::Reconciliation;
use crate::track::{Changes, Track};
use crate::trajectory::TrajectoryPoint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    /// The user places the seed point by hand.
    Editing,
    /// Every new frame extends the trajectory.
    Tracking,
    /// Frozen until tracking is restarted.
    Stopped,
}

/// Outcome of feeding one frame to a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackStep {
    /// Not tracking, or the frame is not after the last recorded point.
    Ignored,
    /// Point appended at the matched location.
    Tracked { score: f64, labels: Reconciliation },
    /// Point appended at the previous location and tracking stopped.
    Lost { score: f64, labels: Reconciliation },
}

impl TrackStep {
    pub fn changes(&self) -> Changes {
        match self {
            TrackStep::Ignored => Changes::default(),
            TrackStep::Tracked { labels, .. } => Changes::points().with_labels(labels),
            TrackStep::Lost { labels, .. } => Changes {
                points: true,
                labels: false,
                state: true,
            }
            .with_labels(labels),
        }
    }
}

impl Track {
    /// Initial placement is done, start following the point.
    pub fn engage_tracking(&mut self) -> Changes {
        if self.state != TrackState::Editing {
            return Changes::default();
        }
        info!(
            "tracking engaged at ({}, {})",
            self.trajectory.last().x,
            self.trajectory.last().y
        );
        self.state = TrackState::Tracking;
        self.trajectory.open();
        Changes::state()
    }

    /// Advance the trajectory to `timestamp` (absolute) using `frame`.
    ///
    /// The last point's template is searched around the last position. On a
    /// match the new point goes to the matched center, otherwise it repeats the
    /// last position and the track stops. Either way the new point captures
    /// its own template from `frame` and labels are reconciled.
    pub fn track_current_position(&mut self, timestamp: Timestamp, frame: &Image) -> TrackStep {
        if self.state != TrackState::Tracking {
            return TrackStep::Ignored;
        }
        if timestamp <= self.trajectory.absolute(self.trajectory.last()) {
            debug!("frame {timestamp} already tracked");
            return TrackStep::Ignored;
        }

        let previous = self.trajectory.last();
        let origin = previous.position();
        let result = match &previous.patch {
            Some(patch) => self
                .matcher
                .locate(patch, frame, self.matcher.search_window(origin)),
            None => MatchResult {
                found: false,
                center: origin,
                score: 0.,
            },
        };

        let position = if result.found { result.center } else { origin };
        let t = timestamp - self.trajectory.begin_timestamp();
        let patch = Patch::capture(frame, position, self.matcher.template_edge());
        self.trajectory
            .push(TrajectoryPoint::new(position.x, position.y, t).with_patch(patch));
        self.current = self.trajectory.len() - 1;
        self.display.invalidate();
        let labels = self.reconcile_labels();

        if result.found {
            debug!(
                "tracked to ({}, {}) at {timestamp}, score {:.3}",
                position.x, position.y, result.score
            );
            TrackStep::Tracked {
                score: result.score,
                labels,
            }
        } else {
            info!(
                "tracking lost at {timestamp}, best score {:.3} below {:.2}",
                result.score,
                self.matcher.similarity_threshold()
            );
            self.stop();
            TrackStep::Lost {
                score: result.score,
                labels,
            }
        }
    }

    /// User stop. The end of the trajectory is pinned to its last point.
    pub fn stop_tracking(&mut self) -> Changes {
        if self.state == TrackState::Stopped {
            return Changes::default();
        }
        info!("tracking stopped by user");
        self.stop();
        Changes::state()
    }

    /// Resume after a stop. Recorded points are kept and the end is reopened.
    pub fn restart_tracking(&mut self) -> Changes {
        if self.state != TrackState::Stopped {
            return Changes::default();
        }
        info!(
            "tracking restarted from {}",
            self.trajectory.last_timestamp()
        );
        self.state = TrackState::Tracking;
        self.trajectory.open();
        self.display.invalidate();
        Changes::state()
    }

    fn stop(&mut self) {
        self.state = TrackState::Stopped;
        self.trajectory.close();
        self.display.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::label::Keyframe;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn sprite_frame(center: Vector2i) -> Image {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut sprite = Image::new(24, 24);
        for v in sprite.data.iter_mut() {
            *v = rng.gen();
        }
        let mut frame = Image::new(160, 120);
        frame.set_sub_image_i32(center.x - 12, center.y - 12, &sprite);
        frame
    }

    fn step(i: i32) -> Vector2i {
        Vector2i::new(60 + 3 * i, 50 + 2 * i)
    }

    /// Started at 1000 and tracked successfully through 1100, 1200 and 1300.
    fn tracked_track() -> Track {
        let config = TrackerConfig::default();
        let mut track = Track::new(step(0), 1000, Some(&sprite_frame(step(0))), &config);
        track.set_average_timestamps_per_frame(100);
        track.engage_tracking();
        for i in 1..=3 {
            let result = track.track_current_position(1000 + 100 * i as i64, &sprite_frame(step(i)));
            assert!(matches!(result, TrackStep::Tracked { .. }), "{result:?}");
        }
        track
    }

    #[test]
    fn test_tracks_moving_sprite() {
        let track = tracked_track();
        let ts: Vec<_> = track.trajectory().points().iter().map(|p| p.t).collect();
        assert_eq!(ts, vec![0, 100, 200, 300]);
        assert_eq!(track.trajectory().last().position(), step(3));
        assert_eq!(track.end_timestamp(), Timestamp::MAX);
        assert_eq!(track.state(), TrackState::Tracking);
    }

    #[test]
    fn test_lost_appends_unmoved_point_and_stops() {
        let mut track = tracked_track();
        let result = track.track_current_position(1400, &Image::new(160, 120));
        assert!(matches!(result, TrackStep::Lost { .. }));
        assert!(result.changes().state);
        assert_eq!(track.trajectory().len(), 5);
        assert_eq!(track.trajectory().last().t, 400);
        assert_eq!(track.trajectory().last().position(), step(3));
        assert_eq!(track.state(), TrackState::Stopped);
        assert_eq!(track.end_timestamp(), 1400);

        // Stopped tracks ignore new frames.
        let result = track.track_current_position(1500, &sprite_frame(step(4)));
        assert_eq!(result, TrackStep::Ignored);
        assert_eq!(track.trajectory().len(), 5);
    }

    #[test]
    fn test_chop_after_loss() {
        let mut track = tracked_track();
        track.track_current_position(1400, &Image::new(160, 120));
        let suffix = track.suffix_from(1200);
        assert!(track.chop_trajectory(1200).points);
        assert_eq!(track.trajectory().len(), 3);
        assert_eq!(track.end_timestamp(), 1200);

        track.append_points(suffix);
        assert_eq!(track.trajectory().len(), 5);
        assert_eq!(track.end_timestamp(), 1400);
    }

    #[test]
    fn test_refeeding_a_frame_is_a_noop() {
        let mut track = tracked_track();
        let before = track.trajectory().clone();
        assert_eq!(
            track.track_current_position(1300, &sprite_frame(step(3))),
            TrackStep::Ignored
        );
        assert_eq!(
            track.track_current_position(1250, &sprite_frame(step(3))),
            TrackStep::Ignored
        );
        assert_eq!(track.trajectory(), &before);
    }

    #[test]
    fn test_editing_ignores_frames() {
        let config = TrackerConfig::default();
        let mut track = Track::new(step(0), 1000, Some(&sprite_frame(step(0))), &config);
        assert_eq!(
            track.track_current_position(1100, &sprite_frame(step(1))),
            TrackStep::Ignored
        );
        assert_eq!(track.trajectory().len(), 1);
    }

    #[test]
    fn test_restart_extends_trajectory() {
        let mut track = tracked_track();
        assert!(track.stop_tracking().state);
        assert_eq!(track.end_timestamp(), 1300);
        assert!(!track.stop_tracking().any());

        assert!(track.restart_tracking().state);
        assert_eq!(track.end_timestamp(), Timestamp::MAX);
        let result = track.track_current_position(1400, &sprite_frame(step(4)));
        assert!(matches!(result, TrackStep::Tracked { .. }));
        assert_eq!(track.trajectory().len(), 5);
    }

    #[test]
    fn test_labels_follow_tracking() {
        let config = TrackerConfig::default();
        let mut track = Track::new(step(0), 1000, Some(&sprite_frame(step(0))), &config);
        track.set_keyframes(&[Keyframe::new(1000, "start"), Keyframe::new(1200, "apex")]);
        assert!(track.labels().is_empty());

        track.engage_tracking();
        track.track_current_position(1100, &sprite_frame(step(1)));
        assert!(track.labels().is_empty());
        match track.track_current_position(1200, &sprite_frame(step(2))) {
            TrackStep::Tracked { labels, .. } => assert_eq!(labels.added, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(track.labels()[0].anchor, step(2));
    }
}
