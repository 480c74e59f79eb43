use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::label::{Keyframe, KeyframeLabel, MainLabel};
use crate::my_types::*;
use crate::timebase::{Remapper, TimeBase};
use crate::track::{Track, TrackView};
use crate::tracker::TrackState;
use crate::trajectory::{Trajectory, TrajectoryPoint};

/// Describes the video a project was saved against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHeader {
    pub original_filename: String,
    pub image_size: [usize; 2],
    pub average_timestamps_per_frame: i64,
    pub first_timestamp: Timestamp,
    pub selection_start: Timestamp,
    #[serde(default = "default_duplication_factor")]
    pub duplication_factor: i64,
}

fn default_duplication_factor() -> i64 {
    1
}

impl ProjectHeader {
    pub fn new(time_base: &TimeBase, image_size: [usize; 2]) -> Self {
        Self {
            original_filename: time_base.source.clone(),
            image_size,
            average_timestamps_per_frame: time_base.average_timestamps_per_frame,
            first_timestamp: time_base.first_timestamp,
            selection_start: time_base.first_timestamp,
            duplication_factor: 1,
        }
    }

    pub fn time_base(&self) -> TimeBase {
        TimeBase::new(
            self.first_timestamp,
            self.average_timestamps_per_frame,
            &self.original_filename,
        )
    }

    /// How stored data maps into the video currently opened.
    pub fn load_context(&self, current: &TimeBase, current_size: [usize; 2]) -> LoadContext {
        let scale = |i: usize| {
            if self.image_size[i] == 0 {
                1.
            } else {
                current_size[i] as f64 / self.image_size[i] as f64
            }
        };
        LoadContext {
            scale: Vector2d::new(scale(0), scale(1)),
            remapper: Remapper::new(
                self.time_base(),
                self.selection_start,
                current.clone(),
                self.duplication_factor,
            ),
        }
    }
}

pub struct LoadContext {
    pub scale: Vector2d,
    pub remapper: Remapper,
}

impl LoadContext {
    pub fn identity(time_base: TimeBase) -> Self {
        Self {
            scale: Vector2d::new(1., 1.),
            remapper: Remapper::identity(time_base),
        }
    }

    fn position(&self, x: i32, y: i32) -> Vector2i {
        Vector2i::new(
            (x as f64 * self.scale.x) as i32,
            (y as f64 * self.scale.y) as i32,
        )
    }
}

/// A stored trajectory point. Written as `[x, y, t]`; older files carry
/// `"x;y;t"` strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPoint {
    Triple([i64; 3]),
    Text(String),
    Other(serde_json::Value),
}

impl RawPoint {
    fn parse(&self) -> Option<(i32, i32, Timestamp)> {
        match self {
            RawPoint::Triple([x, y, t]) => {
                Some((i32::try_from(*x).ok()?, i32::try_from(*y).ok()?, *t))
            }
            RawPoint::Text(text) => {
                let mut fields = text.split(';').map(str::trim);
                let x = fields.next()?.parse().ok()?;
                let y = fields.next()?.parse().ok()?;
                let t = fields.next()?.parse().ok()?;
                if fields.next().is_some() {
                    return None;
                }
                Some((x, y, t))
            }
            RawPoint::Other(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRecord {
    /// Absolute timestamp of the keyframe.
    pub time_position: Timestamp,
    /// Top-left of the background.
    pub space_position: [i32; 2],
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainLabelRecord {
    pub text: String,
    /// Background offset from the followed point.
    pub offset: [i32; 2],
}

impl Default for MainLabelRecord {
    fn default() -> Self {
        Self {
            text: "Label".to_string(),
            offset: [-20, -50],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRecord {
    /// Absolute begin timestamp.
    pub time_position: Timestamp,
    pub view: TrackView,
    pub points: Vec<RawPoint>,
    pub keyframe_labels: Vec<LabelRecord>,
    pub main_label: MainLabelRecord,
}

impl TrackRecord {
    /// Templates are not stored.
    pub fn from_track(track: &Track) -> Self {
        let main_label = track.main_label();
        Self {
            time_position: track.begin_timestamp(),
            view: track.view(),
            points: track
                .trajectory()
                .points()
                .iter()
                .map(|p| RawPoint::Triple([p.x as i64, p.y as i64, p.t]))
                .collect(),
            keyframe_labels: track
                .labels()
                .iter()
                .map(|l| LabelRecord {
                    time_position: l.keyframe_timestamp,
                    space_position: [l.background.x, l.background.y],
                    text: l.text.clone(),
                })
                .collect(),
            main_label: MainLabelRecord {
                text: main_label.text.clone(),
                offset: [main_label.background.x, main_label.background.y],
            },
        }
    }

    /// Rebuild a stopped track in the current video's space and time base.
    pub fn into_track(self, context: &LoadContext, config: &TrackerConfig) -> Track {
        let remapper = &context.remapper;
        let begin = remapper.remap(self.time_position, false);

        let mut points: Vec<TrajectoryPoint> = self
            .points
            .iter()
            .map(|raw| {
                // Times must be non-negative and keep `begin + t` representable.
                let parsed = raw
                    .parse()
                    .map(|(x, y, t)| (x, y, remapper.remap(t, true)))
                    .filter(|&(_, _, t)| t >= 0 && begin.checked_add(t).is_some());
                let (x, y, t) = parsed.unwrap_or_else(|| {
                    warn!("malformed trajectory point {raw:?}, using origin");
                    (0, 0, 0)
                });
                let position = context.position(x, y);
                TrajectoryPoint::new(position.x, position.y, t)
            })
            .collect();
        // Re-quantizing can merge neighboring frames.
        points.sort_by_key(|p| p.t);
        points.dedup_by_key(|p| p.t);
        let trajectory = Trajectory::from_points(points, begin);

        let mut track = Track::from_parts(
            trajectory,
            vec![],
            self.view,
            TrackState::Stopped,
            config,
        );
        track.set_average_timestamps_per_frame(remapper.output().average_timestamps_per_frame);

        for record in self.keyframe_labels {
            let timestamp = remapper.remap(record.time_position, false);
            if timestamp.checked_sub(begin).is_none() {
                warn!(
                    "keyframe label {:?} at {} out of range, dropped",
                    record.text, record.time_position
                );
                continue;
            }
            let index = track.trajectory.find_closest_point(timestamp);
            let point = &track.trajectory.points()[index];
            let mut label = KeyframeLabel::new(
                &Keyframe::new(timestamp, record.text),
                point,
                track.measure.as_ref(),
            );
            let position = context.position(record.space_position[0], record.space_position[1]);
            label.background.x = position.x;
            label.background.y = position.y;
            label.user_positioned = true;
            track.labels.push(label);
        }
        track.labels.sort_by_key(|l| l.keyframe_timestamp);

        let mut main_label = MainLabel::new(&self.main_label.text, track.measure.as_ref());
        let offset = context.position(self.main_label.offset[0], self.main_label.offset[1]);
        main_label.background.x = offset.x;
        main_label.background.y = offset.y;
        track.main_label = main_label;
        track
    }
}

/// Everything saved for one video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub header: ProjectHeader,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

impl ProjectFile {
    pub fn new(header: ProjectHeader, keyframes: &[Keyframe], tracks: &[Track]) -> Self {
        Self {
            header,
            keyframes: keyframes.to_vec(),
            tracks: tracks.iter().map(TrackRecord::from_track).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize project")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse project")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .context(format!("failed to write project {}", path.display()))?;
        info!("saved {} tracks to {}", self.tracks.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .context(format!("failed to read project {}", path.display()))?;
        Self::from_json(&json).context(format!("invalid project {}", path.display()))
    }

    /// Keyframes and tracks brought into the current video. Labels are
    /// reconciled against the remapped keyframes.
    pub fn restore(
        self,
        current: &TimeBase,
        current_size: [usize; 2],
        config: &TrackerConfig,
    ) -> (Vec<Keyframe>, Vec<Track>) {
        let context = self.header.load_context(current, current_size);
        if !context.remapper.is_identity() {
            info!(
                "remapping project from {} to {}",
                self.header.original_filename, current.source
            );
        }
        let keyframes: Vec<Keyframe> = self
            .keyframes
            .into_iter()
            .map(|k| Keyframe::new(context.remapper.remap(k.timestamp, false), k.title))
            .collect();
        let tracks = self
            .tracks
            .into_iter()
            .map(|record| {
                let mut track = record.into_track(&context, config);
                track.set_keyframes(&keyframes);
                track
            })
            .collect();
        (keyframes, tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_base() -> TimeBase {
        TimeBase::new(1000, 100, "clip")
    }

    fn stopped_track() -> Track {
        let points = (0..4)
            .map(|i| TrajectoryPoint::new(10 + i * 5, 20 + i * 2, i as i64 * 100))
            .collect();
        let mut track = Track::from_parts(
            Trajectory::from_points(points, 1000),
            vec![],
            TrackView::LabelFollows,
            TrackState::Stopped,
            &TrackerConfig::default(),
        );
        track.set_keyframes(&[Keyframe::new(1200, "apex")]);
        track.move_label(0, 4, -6);
        track.set_label_text("Ball");
        track
    }

    #[test]
    fn test_round_trip_same_video() {
        let track = stopped_track();
        let keyframes = track.keyframes().to_vec();
        let project = ProjectFile::new(ProjectHeader::new(&time_base(), [640, 480]), &keyframes, &[track]);
        let json = project.to_json().unwrap();

        let loaded = ProjectFile::from_json(&json).unwrap();
        let (loaded_keyframes, tracks) =
            loaded.restore(&time_base(), [640, 480], &TrackerConfig::default());
        assert_eq!(loaded_keyframes, keyframes);

        let original = stopped_track();
        let track = &tracks[0];
        assert_eq!(track.state(), TrackState::Stopped);
        assert_eq!(track.view(), TrackView::LabelFollows);
        assert_eq!(track.begin_timestamp(), 1000);
        assert_eq!(track.end_timestamp(), 1300);
        let positions = |t: &Track| -> Vec<_> {
            t.trajectory().points().iter().map(|p| (p.x, p.y, p.t)).collect()
        };
        assert_eq!(positions(track), positions(&original));
        assert_eq!(track.labels()[0].background, original.labels()[0].background);
        assert_eq!(track.labels()[0].text, "apex");
        assert_eq!(track.main_label(), original.main_label());
    }

    #[test]
    fn test_lenient_points() {
        let json = r#"{
            "header": {
                "original_filename": "clip",
                "image_size": [640, 480],
                "average_timestamps_per_frame": 100,
                "first_timestamp": 1000,
                "selection_start": 1000
            },
            "tracks": [{
                "time_position": 1000,
                "points": [[1, 2, 0], "3;4;100", "garbage", {"x": 1}, [5, 6, 200]]
            }]
        }"#;
        let project = ProjectFile::from_json(json).unwrap();
        assert_eq!(project.header.duplication_factor, 1);
        let (_, tracks) = project.restore(&time_base(), [640, 480], &TrackerConfig::default());
        let points: Vec<_> = tracks[0]
            .trajectory()
            .points()
            .iter()
            .map(|p| (p.x, p.y, p.t))
            .collect();
        // Malformed entries fall back to the origin and merge with the first point.
        assert_eq!(points, vec![(1, 2, 0), (3, 4, 100), (5, 6, 200)]);
        assert_eq!(tracks[0].main_label().text, "Label");
    }

    #[test]
    fn test_out_of_range_times_fall_back() {
        let json = r#"{
            "time_position": 1000,
            "points": [[1, 2, 0], [3, 4, 9223372036854775807], [5, 6, -100], [7, 8, 100]],
            "keyframe_labels": [
                {"time_position": -9223372036854775808, "text": "bad"},
                {"time_position": 1100, "space_position": [40, 40], "text": "ok"}
            ]
        }"#;
        let record: TrackRecord = serde_json::from_str(json).unwrap();
        let track = record.into_track(&LoadContext::identity(time_base()), &TrackerConfig::default());
        let points: Vec<_> = track
            .trajectory()
            .points()
            .iter()
            .map(|p| (p.x, p.y, p.t))
            .collect();
        assert_eq!(points, vec![(1, 2, 0), (7, 8, 100)]);
        assert_eq!(track.end_timestamp(), 1100);
        assert_eq!(track.labels().len(), 1);
        assert_eq!(track.labels()[0].text, "ok");
    }

    #[test]
    fn test_restore_into_other_video() {
        let track = stopped_track();
        let project = ProjectFile::new(ProjectHeader::new(&time_base(), [640, 480]), &[], &[track]);
        let other = TimeBase::new(0, 40, "export");
        let (_, tracks) = project.restore(&other, [320, 240], &TrackerConfig::default());
        let track = &tracks[0];
        assert_eq!(track.begin_timestamp(), 0);
        let points: Vec<_> = track
            .trajectory()
            .points()
            .iter()
            .map(|p| (p.x, p.y, p.t))
            .collect();
        assert_eq!(points, vec![(5, 10, 0), (7, 11, 40), (10, 12, 80), (12, 13, 120)]);
        // No keyframes in the project: the label is dropped on reconciliation.
        assert!(track.labels().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProjectFile::load(Path::new("/nonexistent/project.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read project"));
    }
}
