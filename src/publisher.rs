// THEORY:
// The tracker itself never blocks and never talks to anyone. Consumers of its
// output (a rule service client, a data logger, a live overlay) each want every
// record, at their own pace. The `ResultBus` fans records out over tokio
// broadcast channels after `process_frame` returns:
//
// 1.  **Two streams**: full `HistoryRecord`s for loggers and overlays, compact
//     `WorldSummary`s for the rule service.
// 2.  **Fire and forget**: publishing never waits. With no subscribers the
//     message is dropped; a slow subscriber lags and skips old messages rather
//     than holding the tracker back.

use crate::core_modules::history::HistoryRecord;
use crate::core_modules::report::WorldSummary;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct ResultBus {
    pub records_tx: broadcast::Sender<Arc<HistoryRecord>>,
    pub summaries_tx: broadcast::Sender<WorldSummary>,
}

impl ResultBus {
    pub fn new(capacity: usize) -> Self {
        let (records_tx, _) = broadcast::channel::<Arc<HistoryRecord>>(capacity.max(1));
        let (summaries_tx, _) = broadcast::channel::<WorldSummary>(capacity.max(1));
        Self { records_tx, summaries_tx }
    }

    pub fn subscribe_records(&self) -> broadcast::Receiver<Arc<HistoryRecord>> {
        self.records_tx.subscribe()
    }

    pub fn subscribe_summaries(&self) -> broadcast::Receiver<WorldSummary> {
        self.summaries_tx.subscribe()
    }

    /// Publishes a record and its world summary. Returns how many record
    /// subscribers received it.
    pub fn publish(&self, record: HistoryRecord, mm_per_pixel: f64) -> usize {
        let summary = record.world_summary(mm_per_pixel);
        let _ = self.summaries_tx.send(summary);
        self.records_tx.send(Arc::new(record)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::Frame;
    use crate::core_modules::geometry::Point2;
    use crate::core_modules::utils::image_helper::image_helper::{crawl_spine, render_larva};
    use crate::core_modules::world::{StageCalibration, StageResolver};
    use crate::pipeline::{Tracker, TrackerConfig};

    fn one_record() -> HistoryRecord {
        let config = TrackerConfig {
            image_width: 120,
            image_height: 80,
            ..TrackerConfig::default()
        };
        let mut tracker =
            Tracker::new(config, StageResolver::fixed(StageCalibration::default())).expect("valid config");
        let spine = crawl_spine(Point2::new(90.0, 40.0), 0.0, 60.0, 0.0, 12);
        let image = render_larva(120, 80, &spine, 7.0, 20, 220);
        let report = tracker
            .process_frame(&Frame::from_gray_image(&image, 0, 33))
            .expect("frame");
        report.record().cloned().expect("detected")
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = ResultBus::new(4);
        assert_eq!(bus.publish(one_record(), 0.01), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_records_and_summaries() {
        let bus = ResultBus::new(4);
        let mut records = bus.subscribe_records();
        let mut summaries = bus.subscribe_summaries();

        let record = one_record();
        assert_eq!(bus.publish(record.clone(), 0.01), 1);

        let received = records.recv().await.expect("record");
        assert_eq!(*received, record);
        let summary = summaries.recv().await.expect("summary");
        assert_eq!(summary.sequence, 0);
        assert_eq!(summary, record.world_summary(0.01));
    }
}
