//! rollcall core library.
//!
//! Registration intake and Bible Bee division placement for a children's
//! program, over either an embedded document store or a hosted relational
//! service:
//!
//! - `storage`: the `StorageAdapter` contract and both backends
//! - `normalize`: turns loosely shaped submissions into a validated `RegistrationSubmission`
//! - `registrar`: writes a submission as households, children, registrations and enrollments
//! - `assignment`: previews and commits competition division placement
//! - `services`: builds the adapter from `Config` and wires the rest to it

pub mod assignment;
pub mod config;
pub mod credentials;
pub mod error;
pub mod grade;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod registrar;
pub mod scripture;
pub mod services;
pub mod storage;
pub mod utils;

pub use assignment::{
    AssignmentEngine, CommitError, CommitSummary, Diagnostic, PlacementStatus, Preview,
    PreviewCounts, PreviewRow,
};
pub use config::{BackendKind, Config, MinistryCodes};
pub use error::{Result, StorageError};
pub use grade::grade_code;
pub use normalize::{normalize_submission, RegistrationSubmission, ValidationErrors};
pub use registrar::{Registrar, RegistrationError, RegistrationOutcome};
pub use scripture::{ScriptureAssigner, StoreScriptureAssigner};
pub use services::Services;
pub use storage::{transaction, Atomicity, EmbeddedStore, ListQuery, RemoteStore, Repository, StorageAdapter};
