//! Wave scheduling for stagehand
//!
//! Jobs are batched by complexity tier into waves that convert strictly in
//! order. The scheduler owns the per-wave counters and reports overall
//! conversion progress as a job-weighted percentage.

mod scheduler;
mod wave;

pub use scheduler::{DEFAULT_OPTIMIZATION_RATIO, JobsByTier, WaveScheduler};
pub use wave::{Wave, WaveStatus};
