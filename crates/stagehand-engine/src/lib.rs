//! Pipeline engine for stagehand
//!
//! Owns the state of a migration project and everything that touches it:
//!
//! - [`PipelineState`]: the single writer over stages, waves, jobs, manual
//!   reviews, connections and validation records
//! - [`SharedPipeline`] and [`spawn_event_loop`]: applying signals that
//!   arrive from other tasks
//! - [`test_connections`] and [`run_conversion`]: driving external
//!   collaborators under deadlines
//! - [`ProjectManifest`]: the TOML project definition
//! - [`store`] and [`ProjectHandle`]: persisted state behind a project lock

pub mod collaborators;
pub mod events;
pub mod handle;
pub mod manifest;
pub mod shared;
pub mod state;
pub mod store;

pub use collaborators::{
    ConnectionTester, ConversionEngine, ConversionOutcome, DriverReport, run_conversion,
    test_connections,
};
pub use events::{
    DEFAULT_EVENT_CAPACITY, EventLoopReport, PipelineEvent, event_channel, spawn_event_loop,
};
pub use handle::ProjectHandle;
pub use manifest::{InventoryJob, ProjectManifest, jobs_by_tier};
pub use shared::SharedPipeline;
pub use state::{PipelineSettings, PipelineState};
