//! Runtime events and the broadcast bus.
//!
//! Internal modules:
//! - [`event`]: typed events with monotonic sequence numbers;
//! - [`bus`]: non-blocking broadcast wrapper.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
