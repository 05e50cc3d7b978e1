//! # LogWriter — simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [created] scenario="scn-main-4f2a91b3" intersection="main-and-5th"
//! [started] scenario="scn-main-4f2a91b3"
//! [failed] scenario="scn-main-4f2a91b3" err="fetch_counts timed out after 2s"
//! [expired] scenario="scn-main-4f2a91b3" age=301s
//! [closed] scenario="scn-main-4f2a91b3"
//! [cycle-skipped] intersection="main-and-5th" err="scenario capacity exceeded: 10 active, limit 10"
//! [shutdown-requested]
//! [all-stopped-within-grace]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use — implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ScenarioCreated => {
                println!(
                    "[created] scenario={:?} intersection={:?}",
                    e.scenario, e.intersection
                );
            }
            EventKind::ScenarioStarted => {
                println!("[started] scenario={:?}", e.scenario);
            }
            EventKind::ScenarioCompleted => {
                println!(
                    "[completed] scenario={:?} elapsed={:?}",
                    e.scenario, e.elapsed
                );
            }
            EventKind::ScenarioFailed => {
                println!("[failed] scenario={:?} err={:?}", e.scenario, e.error);
            }
            EventKind::ScenarioClosed => {
                println!("[closed] scenario={:?}", e.scenario);
            }
            EventKind::ScenarioExpired => {
                println!("[expired] scenario={:?} age={:?}", e.scenario, e.elapsed);
            }
            EventKind::ResourceReleaseFailed => {
                println!(
                    "[release-failed] scenario={:?} resource={:?} err={:?}",
                    e.scenario, e.resource, e.error
                );
            }
            EventKind::CycleSkipped => {
                println!(
                    "[cycle-skipped] intersection={:?} err={:?}",
                    e.intersection, e.error
                );
            }
            EventKind::PlanApplied => {
                println!(
                    "[plan-applied] scenario={:?} intersection={:?}",
                    e.scenario, e.intersection
                );
            }
            EventKind::CycleCompleted => {
                println!(
                    "[cycle-completed] scenario={:?} intersection={:?}",
                    e.scenario, e.intersection
                );
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
