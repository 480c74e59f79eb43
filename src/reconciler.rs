use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::label::{Keyframe, KeyframeLabel, TextMeasure};
use crate::my_types::*;
use crate::trajectory::Trajectory;

/// What a reconciliation pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub added: usize,
    pub retitled: usize,
    pub reattached: usize,
    pub removed: usize,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        *self == Reconciliation::default()
    }
}

/// Bring `labels` in line with `keyframes` over the span of `trajectory`.
///
/// A keyframe gets a label when its timestamp lies in `(begin, last point]`.
/// Existing labels are found by keyframe timestamp and only have their text
/// and attachment refreshed, so a user-dragged background survives. Labels
/// whose keyframe is gone or out of span are dropped. The result is sorted by
/// keyframe timestamp and does not depend on the order of `keyframes`.
/// Keyframes sharing a timestamp resolve to the smallest title.
pub fn reconcile(
    labels: &mut Vec<KeyframeLabel>,
    keyframes: &[Keyframe],
    trajectory: &Trajectory,
    measure: &dyn TextMeasure,
) -> Reconciliation {
    let begin = trajectory.begin_timestamp();
    let last = trajectory.last_timestamp();

    let mut wanted: BTreeMap<Timestamp, &str> = BTreeMap::new();
    for keyframe in keyframes {
        if keyframe.timestamp > begin && keyframe.timestamp <= last {
            let title = wanted
                .entry(keyframe.timestamp)
                .or_insert(keyframe.title.as_str());
            // Keyframes sharing a timestamp: the smallest title wins.
            if keyframe.title.as_str() < *title {
                *title = keyframe.title.as_str();
            }
        }
    }

    let mut summary = Reconciliation::default();

    let before = labels.len();
    labels.retain(|label| wanted.contains_key(&label.keyframe_timestamp));
    // Two labels for the same keyframe can only come from a bad load; keep the first.
    let mut seen = BTreeSet::new();
    labels.retain(|label| seen.insert(label.keyframe_timestamp));
    summary.removed = before - labels.len();

    for (&timestamp, &title) in &wanted {
        let point = &trajectory.points()[trajectory.find_closest_point(timestamp)];
        match labels
            .iter_mut()
            .find(|label| label.keyframe_timestamp == timestamp)
        {
            Some(label) => {
                if label.text != title {
                    label.set_text(title, measure);
                    summary.retitled += 1;
                }
                if label.attached_t != point.t || label.anchor != point.position() {
                    label.attach(point);
                    summary.reattached += 1;
                }
            }
            None => {
                labels.push(KeyframeLabel::new(
                    &Keyframe::new(timestamp, title),
                    point,
                    measure,
                ));
                summary.added += 1;
            }
        }
    }
    labels.sort_by_key(|label| label.keyframe_timestamp);

    if !summary.is_noop() {
        debug!("keyframe labels reconciled: {:?}", summary);
    }
    summary
}
