// Demo runner for the `larva_vision` library.
//
// Renders a synthetic larva crawling across a virtual arena under a camera that
// rides on a stage, runs one tracking session over the frames, and publishes
// every record on a `ResultBus`. One subscriber prints the world summaries as
// JSON lines; another keeps a tally for the closing log line.

use larva_vision::core_modules::geometry::Point2;
use larva_vision::core_modules::report::data_legend;
use larva_vision::core_modules::utils::image_helper::image_helper;
use larva_vision::{Frame, FrameReport, ResultBus, StageCalibration, StageResolver, Tracker, TrackerConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const INTERVAL_MS: u32 = 33;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let frames: u64 = std::env::var("LARVA_VISION_FRAMES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(150);
    let save_first = std::env::var("LARVA_VISION_SAVE_FRAME").ok();

    let calibration = StageCalibration::default();
    let resolver = StageResolver::fixed(calibration);
    let stage = resolver.position();
    let config = TrackerConfig {
        image_width: WIDTH,
        image_height: HEIGHT,
        ..TrackerConfig::default()
    };
    let mut tracker = Tracker::new(config, resolver)?;
    let mm_per_pixel = calibration.mm_per_pixel();

    let bus = ResultBus::new(64);
    let mut summaries = bus.subscribe_summaries();
    let printer = tokio::spawn(async move {
        loop {
            match summaries.recv().await {
                Ok(summary) => match serde_json::to_string(&summary) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "summary not serializable"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "summary printer lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    let mut records = bus.subscribe_records();
    let tally = tokio::spawn(async move {
        let mut count = 0u64;
        let mut degenerate = 0u64;
        let mut last_line = String::new();
        loop {
            match records.recv().await {
                Ok(record) => {
                    count += 1;
                    degenerate += record.degenerate as u64;
                    last_line = record.data_line();
                }
                Err(RecvError::Lagged(skipped)) => count += skipped,
                Err(RecvError::Closed) => break,
            }
        }
        (count, degenerate, last_line)
    });

    debug!(legend = %data_legend(), "data line columns");

    // The larva crawls along +x in arena millimetres, swinging its body.
    let speed_mm_s = 1.0;
    let start = Point2::new(5.0, 4.0);
    let (x0, y0) = calibration.mm_to_ticks(start.sub(Point2::new(200.0, 120.0).scale(mm_per_pixel)));
    stage.set(x0, y0);
    let mut missed = 0u64;
    for index in 0..frames {
        let t = (index * INTERVAL_MS as u64) as f64 / 1000.0;
        let head_world = Point2::new(start.x + speed_mm_s * t, start.y + 0.2 * (0.8 * t).sin());
        let bend = 0.5 * (1.3 * t).sin();

        let (sx, sy) = stage.get();
        let stage_mm = calibration.ticks_to_mm(sx, sy);
        let head_px = head_world.sub(stage_mm).scale(1.0 / mm_per_pixel);
        let spine = image_helper::crawl_spine(head_px, 0.0, 90.0, bend, 18);
        let image = image_helper::render_larva(WIDTH, HEIGHT, &spine, 9.0, 25, 210);

        if index == 0 {
            if let Some(path) = &save_first {
                image_helper::save(std::path::Path::new(path), &image)?;
                info!(path = %path, "first frame saved");
            }
        }

        match tracker.process_frame(&Frame::from_gray_image(&image, index, INTERVAL_MS))? {
            FrameReport::Detected(record) => {
                // Keep the animal centred: move the stage by the centroid's offset.
                let centre = Point2::new(WIDTH as f64 / 2.0, HEIGHT as f64 / 2.0);
                let offset_mm = record.centroid.sub(centre).scale(mm_per_pixel);
                if offset_mm.norm() > 0.2 {
                    let (dx, dy) = calibration.mm_to_ticks(offset_mm);
                    stage.move_by(dx, dy);
                }
                bus.publish(*record, mm_per_pixel);
            }
            FrameReport::NoDetection => missed += 1,
        }
        tokio::task::yield_now().await;
    }

    let track = tracker.arena_track().points();
    info!(
        analysed = tracker.analysed_frames(),
        missed,
        votes = ?tracker.votes(),
        arena_points = track.len(),
        "session finished"
    );

    drop(bus);
    printer.await?;
    let (count, degenerate, last_line) = tally.await?;
    info!(published = count, degenerate, last = %last_line.trim_end(), "records published");
    if let Some(latest) = tracker.latest() {
        debug!(sequence = latest.sequence, speed = latest.head_kinematics.speed, "latest head speed");
    }
    Ok(())
}
