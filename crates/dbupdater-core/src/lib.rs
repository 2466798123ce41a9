//! # DbUpdater Core
//!
//! Attach → upgrade → detach lifecycle for a file-based database, with the
//! physical files deleted only when the whole lifecycle provably completed.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Layout
//!
//! - [`stages`]: one function per lifecycle component (verify, probe, attach,
//!   procedure, reaper, detach, cleanup)
//! - [`lifecycle`]: the state machine and [`LifecycleController`]
//! - [`engine`]: the seam to the database engine
//! - [`report`] / [`trace`]: status events for the presentation side and the
//!   optional trace log

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
mod error;
pub mod lifecycle;
pub mod report;
pub mod stages;
pub mod trace;
pub mod types;

pub use config::{Config, PathSource};
pub use engine::{ConnectionScope, Engine, EngineConnection};
pub use error::{Error, Result};
pub use lifecycle::{
    preflight, LifecycleController, LifecyclePhase, LifecycleState, PreflightReport, UpgradePlan,
};
pub use report::{ChannelReporter, StatusReporter};
pub use trace::Trace;
pub use types::{
    AttachmentState, DatabaseFileSet, DatabaseName, FileKind, FileNames, LifecycleOutcome,
    ProcedureName, SessionId, Stage, StatusEvent,
};
