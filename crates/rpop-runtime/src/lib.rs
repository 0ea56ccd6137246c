#![forbid(unsafe_code)]

//! rpop runtime
//!
//! The pieces the popup controller is wired from, none of which know about
//! popups themselves:
//!
//! - [`FlagStore`] - boolean-valued string flags, session or durable
//! - [`TaskQueue`] - host-clocked delayed tasks with lifetime-bound cancellation
//! - [`EventTracker`] - timestamped, variant-tagged analytics events and sinks
//! - [`PopupConfig`] - keys, URLs, and animation timing

pub mod config;
pub mod flag_store;
pub mod logging;
pub mod scheduler;
pub mod tracking;

pub use config::PopupConfig;
#[cfg(feature = "state-persistence")]
pub use flag_store::FileFlagStore;
pub use flag_store::{FLAG_TRUE, FlagStore, MemoryFlagStore, StorageError, StorageResult};
pub use scheduler::{CancelToken, TaskQueue};
pub use tracking::{
    EventName, EventSink, EventTracker, FanoutSink, FnSink, LogSink, MemorySink, SinkError,
    TrackedEvent,
};
