//! Lifecycle components, leaves first.
//!
//! Each engine-facing stage opens one connection, performs one operation and
//! releases the connection before returning. None of them reports status or
//! decides what happens next; that is the controller's job.

pub mod attach;
pub mod cleanup;
pub mod detach;
pub mod probe;
pub mod procedure;
pub mod reaper;
pub mod verify;

pub use attach::attach_database;
pub use cleanup::{delete_files, CleanupDecision, CleanupReport, SkipReason};
pub use detach::detach_database;
pub use probe::probe_attachment;
pub use procedure::run_procedure;
pub use reaper::{close_connections, ReapSummary};
pub use verify::verify_files;
