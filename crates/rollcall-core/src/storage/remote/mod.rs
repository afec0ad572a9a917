//! Remote storage adapter.
//!
//! Speaks to a hosted relational service through its PostgREST API. Every
//! read and write goes through the row mappers, so callers only ever see
//! canonical records. The service has no client-side transaction support:
//! `begin`/`commit` only track nesting, and a rollback cannot undo writes the
//! service has already accepted.

mod client;
pub mod codec;
pub mod mappers;
mod query;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::models::{
    Attendance, Child, CompetitionCycle, Division, EmergencyContact, Enrollment,
    EnrollmentOverride, Guardian, Household, Incident, Ministry, MinistryEnrollment,
    Registration, RegistrationCycle, Scripture, StudentScripture,
};
use crate::storage::record::{apply_patch, materialize, new_id, now};
use crate::storage::{Atomicity, ListQuery, Repository, StorageAdapter};

pub use client::RestClient;
pub use mappers::RemoteRecord;

/// Repository over one remote table.
pub struct RemoteTable<E> {
    client: RestClient,
    _record: PhantomData<fn() -> E>,
}

impl<E> RemoteTable<E> {
    fn new(client: RestClient) -> Self {
        Self {
            client,
            _record: PhantomData,
        }
    }
}

impl<E: RemoteRecord> RemoteTable<E> {
    fn decode_rows(rows: Vec<E::Row>) -> Vec<E> {
        rows.into_iter()
            .filter_map(|row| match E::from_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(table = E::TABLE, error = %e, "Skipping unreadable row");
                    None
                }
            })
            .collect()
    }

    fn first_row(rows: Vec<E::Row>, id: &str) -> Result<E> {
        match rows.into_iter().next() {
            Some(row) => E::from_row(row),
            None => Err(StorageError::not_found(E::KIND, id)),
        }
    }
}

#[async_trait]
impl<E: RemoteRecord> Repository<E> for RemoteTable<E> {
    async fn get(&self, id: &str) -> Result<Option<E>> {
        let mut params = query::key_params::<E>(id);
        params.push(("limit".to_string(), "1".to_string()));
        let rows: Vec<E::Row> = self.client.select(E::TABLE, &params).await?;
        rows.into_iter().next().map(E::from_row).transpose()
    }

    async fn create(&self, draft: E::Draft) -> Result<E> {
        let id = new_id();
        let record: E = materialize(&id, now(), &draft)?;
        let row = record.to_row()?;
        let rows: Vec<E::Row> = self.client.insert(E::TABLE, &row).await?;
        debug!(entity = %E::KIND, id = %id, "Created");
        match rows.into_iter().next() {
            Some(row) => E::from_row(row),
            None => Ok(record),
        }
    }

    async fn update(&self, id: &str, patch: E::Patch) -> Result<E> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(E::KIND, id))?;
        let updated = apply_patch(&current, &patch)?;
        let row = updated.to_row()?;
        let rows: Vec<E::Row> = self
            .client
            .update(E::TABLE, &query::key_params::<E>(id), &row)
            .await?;
        debug!(entity = %E::KIND, id = %id, "Updated");
        // Removed between the read and the write
        Self::first_row(rows, id)
    }

    async fn list(&self, list_query: &ListQuery) -> Result<Vec<E>> {
        let params = query::list_params::<E>(list_query)?;
        let rows: Vec<E::Row> = self.client.select(E::TABLE, &params).await?;
        Ok(Self::decode_rows(rows))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete(E::TABLE, &query::key_params::<E>(id))
            .await?;
        debug!(entity = %E::KIND, id = %id, "Deleted");
        Ok(())
    }
}

pub struct RemoteStore {
    tx_depth: AtomicUsize,
    households: RemoteTable<Household>,
    guardians: RemoteTable<Guardian>,
    emergency_contacts: RemoteTable<EmergencyContact>,
    children: RemoteTable<Child>,
    registration_cycles: RemoteTable<RegistrationCycle>,
    registrations: RemoteTable<Registration>,
    ministries: RemoteTable<Ministry>,
    ministry_enrollments: RemoteTable<MinistryEnrollment>,
    competition_cycles: RemoteTable<CompetitionCycle>,
    divisions: RemoteTable<Division>,
    enrollment_overrides: RemoteTable<EnrollmentOverride>,
    enrollments: RemoteTable<Enrollment>,
    scriptures: RemoteTable<Scripture>,
    student_scriptures: RemoteTable<StudentScripture>,
    attendance: RemoteTable<Attendance>,
    incidents: RemoteTable<Incident>,
}

impl RemoteStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = RestClient::new(base_url, api_key)?;
        info!(url = base_url, "Using remote store");
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: RestClient) -> Self {
        Self {
            tx_depth: AtomicUsize::new(0),
            households: RemoteTable::new(client.clone()),
            guardians: RemoteTable::new(client.clone()),
            emergency_contacts: RemoteTable::new(client.clone()),
            children: RemoteTable::new(client.clone()),
            registration_cycles: RemoteTable::new(client.clone()),
            registrations: RemoteTable::new(client.clone()),
            ministries: RemoteTable::new(client.clone()),
            ministry_enrollments: RemoteTable::new(client.clone()),
            competition_cycles: RemoteTable::new(client.clone()),
            divisions: RemoteTable::new(client.clone()),
            enrollment_overrides: RemoteTable::new(client.clone()),
            enrollments: RemoteTable::new(client.clone()),
            scriptures: RemoteTable::new(client.clone()),
            student_scriptures: RemoteTable::new(client.clone()),
            attendance: RemoteTable::new(client.clone()),
            incidents: RemoteTable::new(client),
        }
    }

    fn leave_transaction(&self) -> Option<usize> {
        self.tx_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| depth.checked_sub(1))
            .ok()
    }
}

#[async_trait]
impl StorageAdapter for RemoteStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::Sequential
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
        let depth = self.tx_depth.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(depth = depth, "Began sequential transaction");
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        match self.leave_transaction() {
            Some(_) => Ok(()),
            None => Err(StorageError::Transaction(
                "commit without an open transaction".to_string(),
            )),
        }
    }

    async fn rollback_transaction(&self) -> Result<()> {
        if self.leave_transaction().is_some() {
            warn!("Rollback on remote store: writes already sent remain committed");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let open = self.tx_depth.swap(0, Ordering::SeqCst);
        if open > 0 {
            warn!(depth = open, "Closing remote store with an open transaction");
        }
        debug!("Closed remote store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::transaction;

    #[tokio::test]
    async fn test_sequential_transaction_bookkeeping() {
        let store = RemoteStore::new("https://db.example.org", "anon-key").unwrap();
        assert_eq!(store.atomicity(), Atomicity::Sequential);

        store.begin_transaction().await.unwrap();
        store.begin_transaction().await.unwrap();
        store.commit_transaction().await.unwrap();
        store.rollback_transaction().await.unwrap();
        assert!(store.commit_transaction().await.is_err());

        let out: std::result::Result<u8, StorageError> = transaction(&store, async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(store.tx_depth.load(Ordering::SeqCst), 0);
    }

    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    use serde_json::{json, Value};

    use crate::models::HouseholdPatch;

    struct Exchange {
        request_line: String,
        body: String,
    }

    /// Answer one connection per scripted (status, body) pair and hand back
    /// what each request asked for.
    fn serve(replies: Vec<(u16, Value)>) -> (String, JoinHandle<Vec<Exchange>>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, reply) in replies {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();

                let mut length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0; length];
                reader.read_exact(&mut body).unwrap();

                let reply = reply.to_string();
                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reply.len(),
                    reply
                )
                .unwrap();
                seen.push(Exchange {
                    request_line: request_line.trim_end().to_string(),
                    body: String::from_utf8(body).unwrap(),
                });
            }
            seen
        });
        (base_url, handle)
    }

    fn household_row(name: &str) -> Value {
        json!({
            "household_id": "h1",
            "name": name,
            "city": "Springfield",
            "email": "ada@example.com",
            "preferredScriptureTranslation": "NIV",
            "created_at": "2024-08-01T12:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_get_missing_row_is_none() {
        let (base_url, server) = serve(vec![(200, json!([]))]);
        let store = RemoteStore::new(&base_url, "anon-key").unwrap();

        assert!(store.households().get("h-missing").await.unwrap().is_none());

        let seen = server.join().unwrap();
        assert!(seen[0].request_line.starts_with("GET /rest/v1/households?"));
        assert!(seen[0].request_line.contains("household_id=eq.h-missing"));
        assert!(seen[0].request_line.contains("limit=1"));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let (base_url, server) = serve(vec![(200, json!([]))]);
        let store = RemoteStore::new(&base_url, "anon-key").unwrap();

        let patch = HouseholdPatch {
            name: Some("Byron".to_string()),
            ..Default::default()
        };
        let err = store.households().update("h1", patch).await.unwrap_err();
        assert!(err.is_not_found());

        // Only the read went out
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_patches_full_row() {
        let (base_url, server) = serve(vec![
            (200, json!([household_row("Lovelace")])),
            (200, json!([household_row("Byron")])),
        ]);
        let store = RemoteStore::new(&base_url, "anon-key").unwrap();

        let patch = HouseholdPatch {
            name: Some("Byron".to_string()),
            ..Default::default()
        };
        let updated = store.households().update("h1", patch).await.unwrap();
        assert_eq!(updated.name, "Byron");
        assert_eq!(updated.primary_email.as_deref(), Some("ada@example.com"));

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].request_line.starts_with("PATCH /rest/v1/households?"));
        assert!(seen[1].request_line.contains("household_id=eq.h1"));
        let sent: Value = serde_json::from_str(&seen[1].body).unwrap();
        assert_eq!(sent["name"], "Byron");
        assert_eq!(sent["city"], "Springfield");
        assert_eq!(sent["email"], "ada@example.com");
        assert_eq!(sent["preferred_scripture_translation"], "NIV");
        assert_eq!(sent["preferredScriptureTranslation"], "NIV");
        assert!(sent.get("primary_email").is_none());
    }

    #[tokio::test]
    async fn test_list_decodes_rows_and_skips_unreadable_ones() {
        let (base_url, server) = serve(vec![(
            200,
            json!([
                {
                    "ministry_id": "m1",
                    "code": "choir",
                    "name": "Joy Choir",
                    "is_active": "true",
                    "custom_questions": "[{\"id\":\"shirt_size\",\"label\":\"Shirt size\"}]",
                    "created_at": "2024-08-01T12:00:00Z"
                },
                {
                    "ministry_id": "m2",
                    "code": "art",
                    "name": "Art",
                    "custom_questions": "{not json",
                    "created_at": "2024-08-01T12:00:00Z"
                }
            ]),
        )]);
        let store = RemoteStore::new(&base_url, "anon-key").unwrap();

        let ministries = store
            .ministries()
            .list(&ListQuery::new().eq("is_active", true))
            .await
            .unwrap();
        assert_eq!(ministries.len(), 1);
        assert_eq!(ministries[0].id, "m1");
        assert_eq!(ministries[0].custom_questions[0].id, "shirt_size");

        let seen = server.join().unwrap();
        assert!(seen[0].request_line.starts_with("GET /rest/v1/ministries?"));
        assert!(seen[0].request_line.contains("is_active=eq.true"));
    }
}
