//! Pipeline entry points for crawler operations.
//!
//! - `Reconciler`: one walk-then-submit cycle
//! - `Scheduler`: fires cycles on a cadence, never overlapping
//! - `run_service`: schedules every configured crawler
//! - `run_once`: a single cycle on demand
//! - `run_validate`: configuration checks without connecting

pub mod reconcile;
pub mod run;
pub mod scheduler;
pub mod validate;

pub use reconcile::{Reconciler, log_report};
pub use run::{CrawlerRun, run_once, run_service};
pub use scheduler::{Scheduler, SchedulerStats};
pub use validate::run_validate;
