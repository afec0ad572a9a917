//! Embedded storage adapter.
//!
//! Keeps every collection in memory behind one async mutex and, when opened on
//! a data directory, writes each changed collection back to its JSON file.
//! Inside a transaction writes only mark collections dirty; commit flushes
//! them and rollback restores the snapshot taken at begin, so nothing a failed
//! transaction wrote ever reaches disk.
//!
//! An open transaction holds the store's gate. Callers outside it wait for
//! the gate before touching the collections, so a rollback only ever undoes
//! the owner's writes.
//!
//! The store assumes a single writer process per data directory.

mod collection;
mod persist;

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::error::{Result, StorageError};
use crate::models::{
    Attendance, Child, CompetitionCycle, Division, EmergencyContact, Enrollment,
    EnrollmentOverride, Guardian, Household, Incident, Ministry, MinistryEnrollment,
    Registration, RegistrationCycle, Scripture, StudentScripture,
};
use crate::storage::record::{apply_patch, materialize, new_id, now};
use crate::storage::{
    current_transaction, Atomicity, EntityKind, ListQuery, Record, Repository, StorageAdapter,
};

use collection::Collection;
use persist::CollectionFiles;

pub use persist::CollectionFile;

struct TxState {
    /// `transaction` call that opened it
    owner: u64,
    depth: usize,
    snapshot: BTreeMap<EntityKind, Collection>,
    dirty: BTreeSet<EntityKind>,
    /// An inner transaction rolled back; the outer commit must fail
    rolled_back: bool,
    _gate: OwnedMutexGuard<()>,
}

struct Database {
    collections: BTreeMap<EntityKind, Collection>,
    tx: Option<TxState>,
}

impl Database {
    fn empty() -> Self {
        Self {
            collections: EntityKind::ALL
                .iter()
                .map(|kind| (*kind, Collection::new(*kind)))
                .collect(),
            tx: None,
        }
    }

    fn collection(&self, kind: EntityKind) -> Option<&Collection> {
        self.collections.get(&kind)
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut Collection {
        self.collections
            .entry(kind)
            .or_insert_with(|| Collection::new(kind))
    }

    /// Take the open transaction if `caller` owns it
    fn take_owned_tx(&mut self, caller: Option<u64>) -> Result<Option<TxState>> {
        match &self.tx {
            None => Ok(None),
            Some(tx) if Some(tx.owner) == caller => Ok(self.tx.take()),
            Some(_) => Err(StorageError::Transaction(
                "the open transaction belongs to another caller".to_string(),
            )),
        }
    }
}

/// Locked database, plus the gate when the caller had to wait for another
/// caller's transaction to finish.
struct Access<'a> {
    db: MutexGuard<'a, Database>,
    _gate: Option<OwnedMutexGuard<()>>,
}

impl Deref for Access<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

impl DerefMut for Access<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        &mut self.db
    }
}

struct Shared {
    db: Mutex<Database>,
    /// Held by the open transaction; lock order is gate then db
    gate: Arc<Mutex<()>>,
    files: Option<CollectionFiles>,
}

impl Shared {
    /// Lock the database, first waiting out a transaction owned by someone else
    async fn access(&self) -> Access<'_> {
        let caller = current_transaction();
        let db = self.db.lock().await;
        let foreign = db.tx.as_ref().is_some_and(|tx| Some(tx.owner) != caller);
        if !foreign {
            return Access { db, _gate: None };
        }
        drop(db);
        let gate = self.gate.clone().lock_owned().await;
        Access {
            db: self.db.lock().await,
            _gate: Some(gate),
        }
    }

    fn persist(&self, db: &Database, kind: EntityKind) -> Result<()> {
        let (Some(files), Some(collection)) = (&self.files, db.collection(kind)) else {
            return Ok(());
        };
        files.save(kind, collection)
    }

    /// Persist now, or defer to commit when a transaction is open
    fn after_write(&self, db: &mut Database, kind: EntityKind) -> Result<()> {
        match db.tx.as_mut() {
            Some(tx) => {
                tx.dirty.insert(kind);
                Ok(())
            }
            None => self.persist(db, kind),
        }
    }
}

/// Repository over one embedded collection.
pub struct EmbeddedCollection<E> {
    shared: Arc<Shared>,
    _record: PhantomData<fn() -> E>,
}

impl<E> EmbeddedCollection<E> {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            _record: PhantomData,
        }
    }
}

fn decode<E: Record>(doc: &Value) -> Result<E> {
    serde_json::from_value(doc.clone()).map_err(|e| StorageError::invalid_data(E::KIND, e.to_string()))
}

#[async_trait]
impl<E: Record> Repository<E> for EmbeddedCollection<E> {
    async fn get(&self, id: &str) -> Result<Option<E>> {
        let db = self.shared.access().await;
        db.collection(E::KIND)
            .and_then(|c| c.get(id))
            .map(decode::<E>)
            .transpose()
    }

    async fn create(&self, draft: E::Draft) -> Result<E> {
        let id = new_id();
        let record: E = materialize(&id, now(), &draft)?;
        let doc = serde_json::to_value(&record)?;

        let mut db = self.shared.access().await;
        db.collection_mut(E::KIND).insert(id.clone(), doc);
        self.shared.after_write(&mut db, E::KIND)?;
        debug!(entity = %E::KIND, id = %id, "Created");
        Ok(record)
    }

    async fn update(&self, id: &str, patch: E::Patch) -> Result<E> {
        let mut db = self.shared.access().await;
        let current: E = match db.collection(E::KIND).and_then(|c| c.get(id)) {
            Some(doc) => decode(doc)?,
            None => return Err(StorageError::not_found(E::KIND, id)),
        };
        let updated = apply_patch(&current, &patch)?;
        let doc = serde_json::to_value(&updated)?;
        db.collection_mut(E::KIND).insert(id.to_string(), doc);
        self.shared.after_write(&mut db, E::KIND)?;
        debug!(entity = %E::KIND, id = %id, "Updated");
        Ok(updated)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<E>> {
        query.validate(E::KIND)?;
        let docs = {
            let db = self.shared.access().await;
            db.collection(E::KIND)
                .map(|c| c.select(query))
                .unwrap_or_default()
        };

        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            match decode::<E>(doc) {
                Ok(record) => records.push(record),
                Err(e) => warn!(entity = %E::KIND, error = %e, "Skipping unreadable document"),
            }
        }
        Ok(query.paginate(records))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut db = self.shared.access().await;
        if db.collection_mut(E::KIND).remove(id).is_some() {
            self.shared.after_write(&mut db, E::KIND)?;
            debug!(entity = %E::KIND, id = %id, "Deleted");
        }
        Ok(())
    }
}

pub struct EmbeddedStore {
    shared: Arc<Shared>,
    households: EmbeddedCollection<Household>,
    guardians: EmbeddedCollection<Guardian>,
    emergency_contacts: EmbeddedCollection<EmergencyContact>,
    children: EmbeddedCollection<Child>,
    registration_cycles: EmbeddedCollection<RegistrationCycle>,
    registrations: EmbeddedCollection<Registration>,
    ministries: EmbeddedCollection<Ministry>,
    ministry_enrollments: EmbeddedCollection<MinistryEnrollment>,
    competition_cycles: EmbeddedCollection<CompetitionCycle>,
    divisions: EmbeddedCollection<Division>,
    enrollment_overrides: EmbeddedCollection<EnrollmentOverride>,
    enrollments: EmbeddedCollection<Enrollment>,
    scriptures: EmbeddedCollection<Scripture>,
    student_scriptures: EmbeddedCollection<StudentScripture>,
    attendance: EmbeddedCollection<Attendance>,
    incidents: EmbeddedCollection<Incident>,
}

impl EmbeddedStore {
    /// A store that never touches disk, for tests and previews
    pub fn in_memory() -> Self {
        Self::from_parts(Database::empty(), None)
    }

    /// Open (or create) a store persisted under `data_dir`
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let files = CollectionFiles::new(data_dir.clone())?;
        let mut db = Database::empty();
        for kind in EntityKind::ALL {
            db.collections.insert(kind, files.load(kind)?);
        }
        info!(path = %data_dir.display(), "Opened embedded store");
        Ok(Self::from_parts(db, Some(files)))
    }

    fn from_parts(db: Database, files: Option<CollectionFiles>) -> Self {
        let shared = Arc::new(Shared {
            db: Mutex::new(db),
            gate: Arc::new(Mutex::new(())),
            files,
        });
        Self {
            households: EmbeddedCollection::new(shared.clone()),
            guardians: EmbeddedCollection::new(shared.clone()),
            emergency_contacts: EmbeddedCollection::new(shared.clone()),
            children: EmbeddedCollection::new(shared.clone()),
            registration_cycles: EmbeddedCollection::new(shared.clone()),
            registrations: EmbeddedCollection::new(shared.clone()),
            ministries: EmbeddedCollection::new(shared.clone()),
            ministry_enrollments: EmbeddedCollection::new(shared.clone()),
            competition_cycles: EmbeddedCollection::new(shared.clone()),
            divisions: EmbeddedCollection::new(shared.clone()),
            enrollment_overrides: EmbeddedCollection::new(shared.clone()),
            enrollments: EmbeddedCollection::new(shared.clone()),
            scriptures: EmbeddedCollection::new(shared.clone()),
            student_scriptures: EmbeddedCollection::new(shared.clone()),
            attendance: EmbeddedCollection::new(shared.clone()),
            incidents: EmbeddedCollection::new(shared.clone()),
            shared,
        }
    }
}

#[async_trait]
impl StorageAdapter for EmbeddedStore {
    fn backend_name(&self) -> &'static str {
        "embedded"
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::Atomic
    }

    fn households(&self) -> &dyn Repository<Household> {
        &self.households
    }

    fn guardians(&self) -> &dyn Repository<Guardian> {
        &self.guardians
    }

    fn emergency_contacts(&self) -> &dyn Repository<EmergencyContact> {
        &self.emergency_contacts
    }

    fn children(&self) -> &dyn Repository<Child> {
        &self.children
    }

    fn registration_cycles(&self) -> &dyn Repository<RegistrationCycle> {
        &self.registration_cycles
    }

    fn registrations(&self) -> &dyn Repository<Registration> {
        &self.registrations
    }

    fn ministries(&self) -> &dyn Repository<Ministry> {
        &self.ministries
    }

    fn ministry_enrollments(&self) -> &dyn Repository<MinistryEnrollment> {
        &self.ministry_enrollments
    }

    fn competition_cycles(&self) -> &dyn Repository<CompetitionCycle> {
        &self.competition_cycles
    }

    fn divisions(&self) -> &dyn Repository<Division> {
        &self.divisions
    }

    fn enrollment_overrides(&self) -> &dyn Repository<EnrollmentOverride> {
        &self.enrollment_overrides
    }

    fn enrollments(&self) -> &dyn Repository<Enrollment> {
        &self.enrollments
    }

    fn scriptures(&self) -> &dyn Repository<Scripture> {
        &self.scriptures
    }

    fn student_scriptures(&self) -> &dyn Repository<StudentScripture> {
        &self.student_scriptures
    }

    fn attendance(&self) -> &dyn Repository<Attendance> {
        &self.attendance
    }

    fn incidents(&self) -> &dyn Repository<Incident> {
        &self.incidents
    }

    async fn begin_transaction(&self) -> Result<()> {
        let Some(caller) = current_transaction() else {
            return Err(StorageError::Transaction(
                "begin_transaction must run inside storage::transaction".to_string(),
            ));
        };
        {
            let mut db = self.shared.db.lock().await;
            if let Some(tx) = db.tx.as_mut().filter(|tx| tx.owner == caller) {
                tx.depth += 1;
                debug!(depth = tx.depth, "Joined open transaction");
                return Ok(());
            }
        }

        let gate = self.shared.gate.clone().lock_owned().await;
        let mut db = self.shared.db.lock().await;
        let snapshot = db.collections.clone();
        db.tx = Some(TxState {
            owner: caller,
            depth: 1,
            snapshot,
            dirty: BTreeSet::new(),
            rolled_back: false,
            _gate: gate,
        });
        debug!(transaction = caller, "Began transaction");
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut db = self.shared.db.lock().await;
        let Some(mut tx) = db.take_owned_tx(current_transaction())? else {
            return Err(StorageError::Transaction(
                "commit without an open transaction".to_string(),
            ));
        };
        if tx.depth > 1 {
            tx.depth -= 1;
            db.tx = Some(tx);
            return Ok(());
        }
        if tx.rolled_back {
            db.collections = tx.snapshot;
            return Err(StorageError::Transaction(
                "an inner transaction was rolled back".to_string(),
            ));
        }

        let mut failure = None;
        for kind in &tx.dirty {
            if let Err(e) = self.shared.persist(&db, *kind) {
                failure = Some(e);
                break;
            }
        }
        if let Some(err) = failure {
            // Put memory and the files already flushed back to the snapshot
            db.collections = tx.snapshot;
            for kind in &tx.dirty {
                if let Err(e) = self.shared.persist(&db, *kind) {
                    error!(collection = %kind, error = %e, "Failed to restore collection file");
                }
            }
            return Err(err);
        }
        debug!(collections = tx.dirty.len(), "Committed transaction");
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut db = self.shared.db.lock().await;
        let Some(mut tx) = db.take_owned_tx(current_transaction())? else {
            debug!("Rollback without an open transaction");
            return Ok(());
        };
        db.collections = tx.snapshot.clone();
        if tx.depth > 1 {
            tx.depth -= 1;
            tx.rolled_back = true;
            db.tx = Some(tx);
        }
        debug!("Rolled back transaction");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut db = self.shared.access().await;
        if let Some(tx) = db.tx.take() {
            warn!(depth = tx.depth, "Closing with an open transaction, discarding its writes");
            db.collections = tx.snapshot;
        }
        for kind in EntityKind::ALL {
            self.shared.persist(&db, kind)?;
        }
        info!("Closed embedded store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChildPatch, HouseholdPatch, NewChild, NewGuardian, NewHousehold};
    use crate::storage::transaction;

    fn household(name: &str) -> NewHousehold {
        NewHousehold {
            name: name.to_string(),
            address_line1: Some("1 Chapel Rd".to_string()),
            ..Default::default()
        }
    }

    fn child(household_id: &str, first: &str) -> NewChild {
        NewChild {
            household_id: household_id.to_string(),
            first_name: first.to_string(),
            last_name: "Lovelace".to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_update_moves_updated_at() {
        let store = EmbeddedStore::in_memory();
        let created = store.households().create(household("Lovelace")).await.unwrap();
        assert_eq!(created.created_at, created.updated_at);

        let patch = HouseholdPatch {
            name: Some("Byron".to_string()),
            ..Default::default()
        };
        let updated = store.households().update(&created.id, patch).await.unwrap();
        assert_eq!(updated.name, "Byron");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);

        let fetched = store.households().get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let store = EmbeddedStore::in_memory();
        assert!(store.children().get("nope").await.unwrap().is_none());
        assert!(store.children().delete("nope").await.is_ok());

        let err = store
            .children()
            .update("nope", ChildPatch::deactivate())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Child not found: nope");
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let store = EmbeddedStore::in_memory();
        let h = store.households().create(household("Lovelace")).await.unwrap();
        let first = store.children().create(child(&h.id, "Ada")).await.unwrap();
        let second = store.children().create(child(&h.id, "Anne")).await.unwrap();
        store.children().create(child("other", "Zed")).await.unwrap();

        let kids = store
            .children()
            .list(&ListQuery::new().eq("household_id", h.id.as_str()))
            .await
            .unwrap();
        let ids: Vec<&str> = kids.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

        let none = store
            .children()
            .list(&ListQuery::new().eq("household_id", "missing"))
            .await
            .unwrap();
        assert!(none.is_empty());

        let err = store
            .children()
            .list(&ListQuery::new().eq("allergies", "nuts"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidFilter { .. }));
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let store = EmbeddedStore::in_memory();
        let result: std::result::Result<(), StorageError> = transaction(&store, async {
            store.households().create(household("Lovelace")).await?;
            Err(StorageError::Transaction("boom".to_string()))
        })
        .await;
        assert!(result.is_err());
        let all = store.households().list(&ListQuery::new()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_nested_rollback_fails_outer_commit() {
        let store = EmbeddedStore::in_memory();
        let result: std::result::Result<(), StorageError> = transaction(&store, async {
            store.households().create(household("Outer")).await?;
            let inner: std::result::Result<(), StorageError> = transaction(&store, async {
                store.households().create(household("Inner")).await?;
                Err(StorageError::Transaction("inner".to_string()))
            })
            .await;
            assert!(inner.is_err());
            store.households().create(household("After")).await?;
            Ok(())
        })
        .await;

        assert!(result.is_err());
        assert!(store.households().list(&ListQuery::new()).await.unwrap().is_empty());
    }

    async fn names(store: &EmbeddedStore) -> Vec<String> {
        let mut names: Vec<String> = store
            .households()
            .list(&ListQuery::new())
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_concurrent_transactions_roll_back_independently() {
        let store = EmbeddedStore::in_memory();
        let (kept, dropped) = tokio::join!(
            transaction(&store, async {
                store.households().create(household("Kept")).await?;
                tokio::task::yield_now().await;
                store.households().create(household("Kept too")).await?;
                Ok::<_, StorageError>(())
            }),
            transaction(&store, async {
                store.households().create(household("Dropped")).await?;
                tokio::task::yield_now().await;
                Err::<(), StorageError>(StorageError::Transaction("boom".to_string()))
            }),
        );

        assert!(kept.is_ok());
        assert!(dropped.is_err());
        assert_eq!(names(&store).await, vec!["Kept", "Kept too"]);
    }

    #[tokio::test]
    async fn test_plain_write_survives_foreign_rollback() {
        let store = EmbeddedStore::in_memory();
        let (plain, failed) = tokio::join!(
            async {
                tokio::task::yield_now().await;
                store.households().create(household("Plain")).await
            },
            transaction(&store, async {
                store.households().create(household("Ghost")).await?;
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
                Err::<(), StorageError>(StorageError::Transaction("boom".to_string()))
            }),
        );

        assert!(plain.is_ok());
        assert!(failed.is_err());
        assert_eq!(names(&store).await, vec!["Plain"]);
    }

    #[tokio::test]
    async fn test_begin_outside_transaction_scope_is_refused() {
        let store = EmbeddedStore::in_memory();
        let err = store.begin_transaction().await.unwrap_err();
        assert!(matches!(err, StorageError::Transaction(_)));

        store.households().create(household("Lovelace")).await.unwrap();
        store.rollback_transaction().await.unwrap();
        assert_eq!(names(&store).await, vec!["Lovelace"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = EmbeddedStore::open(dir.path()).unwrap();
            let h = store.households().create(household("Lovelace")).await.unwrap();
            store.close().await.unwrap();
            h.id
        };

        let reopened = EmbeddedStore::open(dir.path()).unwrap();
        let h = reopened.households().get(&id).await.unwrap().unwrap();
        assert_eq!(h.name, "Lovelace");
    }

    #[tokio::test]
    async fn test_rolled_back_writes_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EmbeddedStore::open(dir.path()).unwrap();
            let result: std::result::Result<(), StorageError> = transaction(&store, async {
                store.households().create(household("Ghost")).await?;
                Err(StorageError::Transaction("boom".to_string()))
            })
            .await;
            assert!(result.is_err());
        }
        let reopened = EmbeddedStore::open(dir.path()).unwrap();
        assert!(reopened.households().list(&ListQuery::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_restores_memory_and_flushed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path()).unwrap();
        // Households flush before guardians; the guardians file cannot be replaced
        let blocked = dir.path().join("guardians.json");
        std::fs::remove_file(&blocked).ok();
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();

        let result: std::result::Result<(), StorageError> = transaction(&store, async {
            let h = store.households().create(household("Lovelace")).await?;
            store
                .guardians()
                .create(NewGuardian {
                    household_id: h.id.clone(),
                    first_name: "Ada".to_string(),
                    ..Default::default()
                })
                .await?;
            Ok(())
        })
        .await;

        assert!(result.is_err());
        assert!(names(&store).await.is_empty());
        drop(store);

        std::fs::remove_dir_all(&blocked).unwrap();
        let reopened = EmbeddedStore::open(dir.path()).unwrap();
        assert!(names(&reopened).await.is_empty());
    }
}
