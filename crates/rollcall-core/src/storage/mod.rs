//! Storage adapter interface.
//!
//! `StorageAdapter` is the one contract both backends implement. It hands out a
//! `Repository<E>` per entity with the same five operations everywhere:
//!
//! - `get(id)` returns `None` for a missing id, never an error
//! - `create(draft)` generates the id, and sets `created_at == updated_at`
//! - `update(id, patch)` fails with `NotFound` naming the entity and id, and
//!   always moves `updated_at` strictly forward
//! - `list(query)` returns an empty list when nothing matches
//! - `delete(id)` is a hard delete; deleting a missing id is not an error
//!
//! The adapter instance is built once by the composition root and passed to
//! every collaborator as `Arc<dyn StorageAdapter>`.
//!
//! Transactions differ by backend and callers must not assume otherwise:
//! the embedded store rolls back every wrapped write on failure, the remote
//! service runs the wrapped calls one by one and leaves earlier writes
//! committed when a later one fails.
//!
//! A transaction belongs to the `transaction` call that opened it. Writes made
//! by the wrapped future (and by nested `transaction` calls inside it) are part
//! of it; writes from anywhere else are not. The embedded store makes other
//! writers wait until the transaction ends. Work spawned onto another task
//! leaves the transaction's scope and waits like any other writer.

pub mod embedded;
pub mod lifecycle;
pub mod query;
pub mod record;
pub mod remote;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::error;

use crate::error::{Result, StorageError};
use crate::models::{
    Attendance, Child, CompetitionCycle, Division, EmergencyContact, Enrollment,
    EnrollmentOverride, Guardian, Household, Incident, Ministry, MinistryEnrollment,
    Registration, RegistrationCycle, Scripture, StudentScripture,
};

pub use embedded::EmbeddedStore;
pub use lifecycle::LifecyclePolicy;
pub use query::ListQuery;
pub use record::{CollectionSchema, EntityKind, Record};
pub use remote::RemoteStore;

/// The five operations every entity supports.
#[async_trait]
pub trait Repository<E: Record>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<E>>;
    async fn create(&self, draft: E::Draft) -> Result<E>;
    async fn update(&self, id: &str, patch: E::Patch) -> Result<E>;
    async fn list(&self, query: &ListQuery) -> Result<Vec<E>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// What `transaction` guarantees on this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atomicity {
    /// Every wrapped write is undone on failure
    Atomic,
    /// Wrapped writes run one by one; earlier writes survive a later failure
    Sequential,
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn backend_name(&self) -> &'static str;
    fn atomicity(&self) -> Atomicity;

    fn households(&self) -> &dyn Repository<Household>;
    fn guardians(&self) -> &dyn Repository<Guardian>;
    fn emergency_contacts(&self) -> &dyn Repository<EmergencyContact>;
    fn children(&self) -> &dyn Repository<Child>;
    fn registration_cycles(&self) -> &dyn Repository<RegistrationCycle>;
    fn registrations(&self) -> &dyn Repository<Registration>;
    fn ministries(&self) -> &dyn Repository<Ministry>;
    fn ministry_enrollments(&self) -> &dyn Repository<MinistryEnrollment>;
    fn competition_cycles(&self) -> &dyn Repository<CompetitionCycle>;
    fn divisions(&self) -> &dyn Repository<Division>;
    fn enrollment_overrides(&self) -> &dyn Repository<EnrollmentOverride>;
    fn enrollments(&self) -> &dyn Repository<Enrollment>;
    fn scriptures(&self) -> &dyn Repository<Scripture>;
    fn student_scriptures(&self) -> &dyn Repository<StudentScripture>;
    fn attendance(&self) -> &dyn Repository<Attendance>;
    fn incidents(&self) -> &dyn Repository<Incident>;

    /// Start a transaction, or join the caller's open one.
    /// Called by `transaction`; the embedded store refuses calls made outside it.
    async fn begin_transaction(&self) -> Result<()>;
    async fn commit_transaction(&self) -> Result<()>;
    async fn rollback_transaction(&self) -> Result<()>;

    /// Flush and release the backend at shutdown
    async fn close(&self) -> Result<()>;
}

tokio::task_local! {
    static TRANSACTION: u64;
}

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

/// Id of the `transaction` call the current future runs under, if any
pub(crate) fn current_transaction() -> Option<u64> {
    TRANSACTION.try_with(|id| *id).ok()
}

/// Run `work` inside a transaction on `store`.
///
/// Commits when `work` succeeds, rolls back when it fails. See
/// `StorageAdapter::atomicity` for what rollback actually undoes. A call made
/// from inside another `transaction` joins it.
pub async fn transaction<T, E, Fut>(store: &dyn StorageAdapter, work: Fut) -> std::result::Result<T, E>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<StorageError>,
{
    if current_transaction().is_some() {
        return run_transaction(store, work).await;
    }
    let id = NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed);
    TRANSACTION.scope(id, run_transaction(store, work)).await
}

async fn run_transaction<T, E, Fut>(store: &dyn StorageAdapter, work: Fut) -> std::result::Result<T, E>
where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<StorageError>,
{
    store.begin_transaction().await?;
    match work.await {
        Ok(value) => {
            store.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback_transaction().await {
                error!(backend = store.backend_name(), error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
