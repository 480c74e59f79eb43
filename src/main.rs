use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::PathBuf;

use indicatif::ProgressStyle;
use tracing::{info, info_span, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use point_tracker::config::TrackerConfig;
use point_tracker::dataset::*;
use point_tracker::label::Keyframe;
use point_tracker::persistence::{ProjectFile, ProjectHeader};
use point_tracker::track::Track;
use point_tracker::tracker::{TrackState, TrackStep};

#[derive(Parser)]
pub struct Args {
    /// Keyframe as `timestamp:title`, may be repeated
    #[clap(long = "keyframe", parse(try_from_str = parse_keyframe))]
    pub keyframes: Vec<Keyframe>,
    /// Save the project here and check that it loads back
    #[clap(short, long)]
    pub output: Option<PathBuf>,
    #[clap(short, long)]
    pub verbose: bool,
    #[clap(flatten)]
    pub tracker: TrackerConfig,
    #[clap(flatten)]
    pub clip: ClipConfig,
}

fn parse_keyframe(s: &str) -> Result<Keyframe, String> {
    let (timestamp, title) = s
        .split_once(':')
        .ok_or(format!("expected timestamp:title, got {s}"))?;
    let timestamp = timestamp
        .trim()
        .parse()
        .map_err(|e| format!("bad keyframe timestamp {timestamp}: {e}"))?;
    Ok(Keyframe::new(timestamp, title))
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();
    args.tracker.validate()?;

    // setup logging
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(indicatif_layer.get_stdout_writer())
                .with_filter(level),
        )
        .with(indicatif_layer)
        .init();

    // seed the track on the sprite in the first frame
    let mut clip = SyntheticClip::new(args.clip.clone())?;
    let time_base = clip.time_base("synthetic");
    let first = clip.next().ok_or(anyhow!("clip has no frames"))?;
    let seed = clip
        .sprite_center(first.index)
        .ok_or(anyhow!("sprite is not visible in the first frame"))?;
    let mut track = Track::new(seed, first.timestamp, Some(&first.image), &args.tracker);
    track.set_average_timestamps_per_frame(time_base.average_timestamps_per_frame);
    track.set_keyframes(&args.keyframes);
    track.engage_tracking();

    let header_span = info_span!("header");
    header_span.pb_set_style(&ProgressStyle::default_bar());
    header_span.pb_set_length(clip.length());
    let header_span_enter = header_span.enter();
    Span::current().pb_inc(1);

    for frame in clip.by_ref() {
        let step = track.track_current_position(frame.timestamp, &frame.image);
        Span::current().pb_inc(1);
        if let TrackStep::Lost { score, .. } = step {
            warn!(
                "lost the sprite at frame {} (score {:.3})",
                frame.index, score
            );
            break;
        }
    }

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    if track.state() == TrackState::Tracking {
        track.stop_tracking();
    }

    // compare against the ground truth
    let tpf = time_base.average_timestamps_per_frame;
    let mut error_sum = 0.;
    let mut compared = 0;
    for point in track.trajectory().points() {
        let index = (track.trajectory().absolute(point) - time_base.first_timestamp) / tpf;
        if let Some(truth) = clip.sprite_center(index as usize) {
            error_sum += (point.position() - truth).cast::<f64>().norm();
            compared += 1;
        }
    }
    info!(
        "{} points over [{}, {}], flat distance {}, mean error {:.2} px",
        track.trajectory().len(),
        track.begin_timestamp(),
        track.end_timestamp(),
        track.trajectory().flat_distance(),
        if compared > 0 { error_sum / compared as f64 } else { 0. }
    );
    for label in track.labels() {
        info!(
            "label {:?} at {} on ({}, {})",
            label.text, label.keyframe_timestamp, label.anchor.x, label.anchor.y
        );
    }

    if let Some(output) = &args.output {
        let project = ProjectFile::new(
            ProjectHeader::new(&time_base, clip.size()),
            &args.keyframes,
            std::slice::from_ref(&track),
        );
        project.save(output)?;

        let (_, tracks) = ProjectFile::load(output)?.restore(&time_base, clip.size(), &args.tracker);
        let reloaded = tracks
            .first()
            .ok_or(anyhow!("no track in {}", output.display()))?;
        if reloaded.trajectory().len() != track.trajectory().len()
            || reloaded.labels().len() != track.labels().len()
        {
            bail!("project {} did not load back identically", output.display());
        }
        info!("reloaded {} without loss", output.display());
    }

    Ok(())
}
