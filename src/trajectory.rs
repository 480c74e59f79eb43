use crate::my_types::*;
use crate::patch::Patch;

/// One tracked position. `t` is relative to the trajectory's begin timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrajectoryPoint {
    pub x: i32,
    pub y: i32,
    pub t: Timestamp,
    pub patch: Option<Patch>,
}

impl TrajectoryPoint {
    pub fn new(x: i32, y: i32, t: Timestamp) -> Self {
        Self {
            x,
            y,
            t,
            patch: None,
        }
    }

    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }

    pub fn position(&self) -> Vector2i {
        Vector2i::new(self.x, self.y)
    }

    /// Same point without its template, for handing out positions.
    pub fn without_patch(&self) -> Self {
        Self::new(self.x, self.y, self.t)
    }
}

/// Time-ordered positions of one tracked point, in canonical pixel space.
///
/// Never empty: it is seeded with one point at construction and truncation
/// always keeps at least the point closest to the cut.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
    begin_timestamp: Timestamp,
    /// `None` while the trajectory may still grow.
    end_timestamp: Option<Timestamp>,
    flat_distance: i32,
}

impl Trajectory {
    /// Open trajectory seeded with `seed`, whose `t` is forced to 0.
    pub fn new(mut seed: TrajectoryPoint, begin_timestamp: Timestamp) -> Self {
        seed.t = 0;
        let mut trajectory = Self {
            points: vec![seed],
            begin_timestamp,
            end_timestamp: None,
            flat_distance: 0,
        };
        trajectory.compute_flat_distance();
        trajectory
    }

    /// Closed trajectory from stored points. Points are sorted by time; an empty
    /// list becomes a single point at the origin.
    pub fn from_points(mut points: Vec<TrajectoryPoint>, begin_timestamp: Timestamp) -> Self {
        if points.is_empty() {
            points.push(TrajectoryPoint::new(0, 0, 0));
        }
        points.sort_by_key(|p| p.t);
        let mut trajectory = Self {
            points,
            begin_timestamp,
            end_timestamp: None,
            flat_distance: 0,
        };
        trajectory.close();
        trajectory.compute_flat_distance();
        trajectory
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, a trajectory keeps at least one point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &TrajectoryPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TrajectoryPoint {
        &self.points[self.points.len() - 1]
    }

    pub(crate) fn last_mut(&mut self) -> &mut TrajectoryPoint {
        let last = self.points.len() - 1;
        &mut self.points[last]
    }

    pub fn begin_timestamp(&self) -> Timestamp {
        self.begin_timestamp
    }

    /// Absolute end, `Timestamp::MAX` while open.
    pub fn end_timestamp(&self) -> Timestamp {
        self.end_timestamp.unwrap_or(Timestamp::MAX)
    }

    pub fn is_open(&self) -> bool {
        self.end_timestamp.is_none()
    }

    /// Absolute time of the last point.
    pub fn last_timestamp(&self) -> Timestamp {
        self.begin_timestamp + self.last().t
    }

    pub fn absolute(&self, point: &TrajectoryPoint) -> Timestamp {
        self.begin_timestamp + point.t
    }

    pub fn open(&mut self) {
        self.end_timestamp = None;
    }

    /// Fix the end to the last point.
    pub fn close(&mut self) {
        self.end_timestamp = Some(self.last_timestamp());
    }

    /// Bounding-box diagonal of all points, used to bring pixel and time
    /// distances to a common scale.
    pub fn flat_distance(&self) -> i32 {
        self.flat_distance
    }

    /// Append a point strictly after the last one. Returns false and leaves the
    /// trajectory untouched otherwise.
    pub(crate) fn push(&mut self, point: TrajectoryPoint) -> bool {
        if point.t <= self.last().t {
            return false;
        }
        self.points.push(point);
        self.after_mutation();
        true
    }

    /// Index of the point closest in time to `timestamp` (absolute). Ties go to
    /// the earliest point.
    pub fn find_closest_point(&self, timestamp: Timestamp) -> usize {
        let mut min_err = Timestamp::MAX;
        let mut closest = 0;
        for (i, point) in self.points.iter().enumerate() {
            let err = (self.begin_timestamp + point.t)
                .saturating_sub(timestamp)
                .saturating_abs();
            if err < min_err {
                min_err = err;
                closest = i;
            }
        }
        closest
    }

    /// Copies of every point at or after `timestamp` (absolute), patches
    /// included. Taken before `chop` so the removal can be undone.
    pub fn suffix_from(&self, timestamp: Timestamp) -> Vec<TrajectoryPoint> {
        let t = timestamp.saturating_sub(self.begin_timestamp);
        self.points.iter().filter(|p| p.t >= t).cloned().collect()
    }

    /// Keep the point closest to `timestamp` and everything before it.
    /// Returns the number of removed points.
    pub fn chop(&mut self, timestamp: Timestamp) -> usize {
        let keep = self.find_closest_point(timestamp) + 1;
        let removed = self.points.len() - keep;
        self.points.truncate(keep);
        self.after_mutation();
        removed
    }

    /// Re-insert a chopped suffix. Existing points at or after the suffix's
    /// first time are replaced by the suffix.
    pub fn append_points(&mut self, suffix: Vec<TrajectoryPoint>) {
        let first_t = match suffix.first() {
            Some(first) => first.t,
            None => return,
        };
        self.points.retain(|p| p.t < first_t);
        self.points.extend(suffix);
        self.after_mutation();
    }

    fn after_mutation(&mut self) {
        if self.end_timestamp.is_some() {
            self.close();
        }
        self.compute_flat_distance();
    }

    fn compute_flat_distance(&mut self) {
        let mut left = i32::MAX;
        let mut top = i32::MAX;
        let mut right = i32::MIN;
        let mut bottom = i32::MIN;
        for p in &self.points {
            left = left.min(p.x);
            right = right.max(p.x);
            top = top.min(p.y);
            bottom = bottom.max(p.y);
        }
        let w = (right - left) as f64;
        let h = (bottom - top) as f64;
        self.flat_distance = (w * w + h * h).sqrt() as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory(begin: Timestamp, ts: &[Timestamp]) -> Trajectory {
        let mut trajectory = Trajectory::new(TrajectoryPoint::new(0, 0, 0), begin);
        for (i, t) in ts.iter().enumerate() {
            let i = i as i32 + 1;
            assert!(trajectory.push(TrajectoryPoint::new(i * 3, i * 4, *t)));
        }
        trajectory
    }

    #[test]
    fn test_push_rejects_stale_time() {
        let mut trajectory = trajectory(1000, &[100]);
        assert!(!trajectory.push(TrajectoryPoint::new(9, 9, 100)));
        assert!(!trajectory.push(TrajectoryPoint::new(9, 9, 50)));
        assert_eq!(trajectory.len(), 2);
    }

    #[test]
    fn test_find_closest_point() {
        let trajectory = trajectory(1000, &[100, 200, 300]);
        assert_eq!(trajectory.find_closest_point(0), 0);
        assert_eq!(trajectory.find_closest_point(1190), 2);
        // Equidistant from t=100 and t=200: first wins.
        assert_eq!(trajectory.find_closest_point(1150), 1);
        assert_eq!(trajectory.find_closest_point(99999), 3);
    }

    #[test]
    fn test_chop_keeps_closest() {
        let mut trajectory = trajectory(1000, &[100, 200, 300, 400]);
        trajectory.close();
        assert_eq!(trajectory.chop(1200), 2);
        assert_eq!(trajectory.len(), 3);
        assert_eq!(trajectory.end_timestamp(), 1200);
    }

    #[test]
    fn test_chop_before_begin_keeps_seed() {
        let mut trajectory = trajectory(1000, &[100, 200]);
        assert_eq!(trajectory.chop(i64::MIN), 2);
        assert_eq!(trajectory.len(), 1);
        assert!(!trajectory.is_empty());
        assert_eq!(trajectory.suffix_from(i64::MIN).len(), 1);
    }

    #[test]
    fn test_chop_keeps_open_end() {
        let mut trajectory = trajectory(1000, &[100, 200]);
        trajectory.chop(1100);
        assert!(trajectory.is_open());
        assert_eq!(trajectory.end_timestamp(), Timestamp::MAX);
    }

    #[test]
    fn test_chop_then_append_round_trip() {
        let mut trajectory = trajectory(1000, &[100, 200, 300, 400]);
        trajectory.close();
        let original = trajectory.clone();

        let suffix = trajectory.suffix_from(1200);
        assert_eq!(suffix.iter().map(|p| p.t).collect::<Vec<_>>(), vec![200, 300, 400]);
        trajectory.chop(1200);
        trajectory.append_points(suffix);
        assert_eq!(trajectory, original);
    }

    #[test]
    fn test_append_overwrites_overlap() {
        let mut trajectory = trajectory(0, &[100, 200, 300]);
        let replacement = vec![
            TrajectoryPoint::new(50, 50, 150),
            TrajectoryPoint::new(60, 60, 250),
        ];
        trajectory.append_points(replacement);
        let ts: Vec<_> = trajectory.points().iter().map(|p| p.t).collect();
        assert_eq!(ts, vec![0, 100, 150, 250]);
        assert_eq!(trajectory.last().x, 60);
    }

    #[test]
    fn test_append_from_origin_replaces_all() {
        let mut trajectory = trajectory(0, &[100]);
        trajectory.append_points(vec![TrajectoryPoint::new(7, 7, 0)]);
        assert_eq!(trajectory.len(), 1);
        assert_eq!(trajectory.first().x, 7);

        trajectory.append_points(vec![]);
        assert_eq!(trajectory.len(), 1);
    }

    #[test]
    fn test_flat_distance_is_bounding_box_diagonal() {
        // Points go (0,0) -> (3,4) -> (6,8) -> back toward origin.
        let mut trajectory = trajectory(0, &[1, 2]);
        assert_eq!(trajectory.flat_distance(), 10);
        trajectory.push(TrajectoryPoint::new(0, 1, 3));
        assert_eq!(trajectory.flat_distance(), 10);
        trajectory.chop(1);
        assert_eq!(trajectory.flat_distance(), 5);
    }

    #[test]
    fn test_from_points_sorts_and_closes() {
        let trajectory = Trajectory::from_points(
            vec![TrajectoryPoint::new(1, 1, 200), TrajectoryPoint::new(0, 0, 0)],
            500,
        );
        assert_eq!(trajectory.first().t, 0);
        assert_eq!(trajectory.end_timestamp(), 700);

        let empty = Trajectory::from_points(vec![], 10);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty.end_timestamp(), 10);
    }
}
