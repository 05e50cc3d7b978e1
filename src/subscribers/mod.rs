//! Event subscribers: the fan-out set and the built-in adapters.
//!
//! Internal modules:
//! - [`subscribe`]: the [`Subscribe`] extension trait;
//! - [`set`]: bounded-queue fan-out with panic isolation;
//! - [`telemetry`]: bridges cycle records to an external telemetry sink;
//! - `log`: stdout event printer (feature `logging`).

mod set;
mod subscribe;
mod telemetry;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;
pub use telemetry::TelemetryRelay;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
