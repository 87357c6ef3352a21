//! Registration store.
//!
//! Owns the registration set and the queue of remote calls still to be
//! delivered. Every local mutation is written through to the key-value store
//! before any remote call is attempted; remote failures leave the call queued
//! for [`RegistrationStore::reconcile`].

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use validator::Validate;

use crate::models::{
    seed_registrations, AttendanceRequest, AttendanceRow, AttendanceStats, EventSummary,
    Participant, PendingSync, RegisterRequest, Registration,
};
use crate::ports::{
    KeyValueStore, RegistrationBackend, RemoteError, StorageError, PENDING_SYNC_KEY,
    REGISTRATIONS_KEY,
};
use crate::services::qr_codec::QrCodec;

/// Errors from registration and synchronisation operations.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Invalid event ID: {0}")]
    InvalidEventId(i64),

    #[error("Invalid participant: {0}")]
    InvalidParticipant(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Errors from marking a registration as attended.
#[derive(Debug, Error)]
pub enum MarkError {
    #[error("Registration {0} not found")]
    NotFound(String),

    /// Carries the record unchanged, original scan time included.
    #[error("Registration {} was already scanned", .0.registration_id)]
    AlreadyScanned(Box<Registration>),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub synced: usize,
    pub failed: usize,
}

/// Outcome of merging the backend's registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    registrations: Vec<Registration>,
    pending: Vec<PendingSync>,
}

/// Local registration set with write-through persistence.
pub struct RegistrationStore {
    storage: Arc<dyn KeyValueStore>,
    backend: Arc<dyn RegistrationBackend>,
    codec: QrCodec,
    clock: fn() -> DateTime<Utc>,
    state: RwLock<StoreState>,
    /// Held while queued calls are being sent, so no entry is sent twice at once.
    sync_gate: tokio::sync::Mutex<()>,
}

impl RegistrationStore {
    /// Rehydrates the store from `storage`.
    ///
    /// Missing or unreadable registration data yields the seed set; individual
    /// records that break an invariant are dropped.
    pub fn load(
        storage: Arc<dyn KeyValueStore>,
        backend: Arc<dyn RegistrationBackend>,
        codec: QrCodec,
    ) -> Self {
        let registrations = load_registrations(storage.as_ref());
        let pending = load_pending(storage.as_ref());
        tracing::info!(
            registrations = registrations.len(),
            pending = pending.len(),
            "Registration store loaded"
        );
        Self {
            storage,
            backend,
            codec,
            clock: Utc::now,
            state: RwLock::new(StoreState {
                registrations,
                pending,
            }),
            sync_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn codec(&self) -> &QrCodec {
        &self.codec
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Registers a participant for an event.
    ///
    /// Idempotent per `(event_id, participant.id)`: an existing registration
    /// is returned unchanged. A new one is committed locally, then announced
    /// to the backend; if that fails the call stays queued.
    pub async fn register(
        &self,
        event_id: i64,
        participant: &Participant,
    ) -> Result<Registration, RegistrationError> {
        shared::validation::validate_event_id(event_id)
            .map_err(|_| RegistrationError::InvalidEventId(event_id))?;
        participant.validate()?;

        let (registration, entry) = {
            let mut state = self.write_state();
            if let Some(existing) = state
                .registrations
                .iter()
                .find(|r| r.matches(event_id, &participant.id))
            {
                tracing::debug!(
                    event_id,
                    participant_id = %participant.id,
                    registration_id = %existing.registration_id,
                    "Already registered"
                );
                return Ok(existing.clone());
            }

            let now = self.now();
            let registration = Registration::new(
                self.codec.registration_id(event_id, &participant.id, now),
                event_id,
                participant,
                now,
            );
            let entry = PendingSync::register(&registration);

            let mut next = state.clone();
            next.registrations.push(registration.clone());
            next.pending.push(entry.clone());
            self.commit(&mut state, next)?;
            (registration, entry)
        };

        tracing::info!(
            event_id,
            participant_id = %registration.participant_id,
            registration_id = %registration.registration_id,
            "Registration created"
        );
        self.deliver(&entry).await;
        Ok(registration)
    }

    /// Looks up the registration a scanned payload refers to.
    ///
    /// A payload naming a known registration ID must also carry that
    /// registration's event and participant, otherwise it yields `None`.
    /// Falls back to an unscanned view built from the payload itself when the
    /// code was issued on another device. Malformed payloads yield `None`.
    pub fn validate(&self, payload_text: &str) -> Option<Registration> {
        let payload = match self.codec.decode(payload_text) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "Scanned payload rejected");
                return None;
            }
        };

        let state = self.read_state();
        let by_id = payload.registration_id.as_deref().and_then(|id| {
            state
                .registrations
                .iter()
                .find(|r| r.registration_id == id)
        });
        if let Some(registration) = by_id {
            if !registration.matches(payload.event_id, &payload.participant_id) {
                tracing::warn!(
                    registration_id = %registration.registration_id,
                    payload_event_id = payload.event_id,
                    payload_participant_id = %payload.participant_id,
                    "Scanned payload does not match the registration it names"
                );
                return None;
            }
            return Some(registration.clone());
        }

        let found = state
            .registrations
            .iter()
            .find(|r| r.matches(payload.event_id, &payload.participant_id));
        if let Some(registration) = found {
            return Some(registration.clone());
        }
        drop(state);

        let now = self.now();
        let fallback_id = self.codec.registration_id(
            payload.event_id,
            &payload.participant_id,
            payload.timestamp.unwrap_or(now),
        );
        Some(payload.into_transient(fallback_id, now))
    }

    /// Inserts a registration first seen through a scanned code.
    ///
    /// Returns the stored record, which is the existing one if the pair or
    /// the identifier is already known.
    pub fn adopt(&self, registration: Registration) -> Result<Registration, StorageError> {
        let mut state = self.write_state();
        if let Some(existing) = state.registrations.iter().find(|r| {
            r.registration_id == registration.registration_id
                || r.matches(registration.event_id, &registration.participant_id)
        }) {
            return Ok(existing.clone());
        }

        let mut next = state.clone();
        next.registrations.push(registration.clone());
        self.commit(&mut state, next)?;
        tracing::info!(
            event_id = registration.event_id,
            registration_id = %registration.registration_id,
            "Adopted registration from scanned code"
        );
        Ok(registration)
    }

    /// Marks a registration attended and pushes the change to the backend.
    pub async fn mark_scanned(&self, registration_id: &str) -> Result<Registration, MarkError> {
        let registration = self.mark_scanned_local(registration_id)?;
        self.deliver(&PendingSync::attendance(&registration)).await;
        Ok(registration)
    }

    /// Marks a registration attended locally and queues the remote call.
    pub fn mark_scanned_local(&self, registration_id: &str) -> Result<Registration, MarkError> {
        let mut state = self.write_state();
        let index = state
            .registrations
            .iter()
            .position(|r| r.registration_id == registration_id)
            .ok_or_else(|| MarkError::NotFound(registration_id.to_string()))?;

        let mut next = state.clone();
        let registration = &mut next.registrations[index];
        if !registration.record_scan(self.now()) {
            return Err(MarkError::AlreadyScanned(Box::new(registration.clone())));
        }
        let registration = registration.clone();
        next.pending.push(PendingSync::attendance(&registration));
        self.commit(&mut state, next)?;

        tracing::info!(
            event_id = registration.event_id,
            registration_id = %registration.registration_id,
            "Registration marked as scanned"
        );
        Ok(registration)
    }

    /// Host override of a single registration's attendance.
    pub fn set_attendance(
        &self,
        registration_id: &str,
        attended: bool,
    ) -> Result<Registration, MarkError> {
        let mut state = self.write_state();
        let index = state
            .registrations
            .iter()
            .position(|r| r.registration_id == registration_id)
            .ok_or_else(|| MarkError::NotFound(registration_id.to_string()))?;

        let mut next = state.clone();
        let now = self.now();
        next.registrations[index].set_attended(attended, now);
        let registration = next.registrations[index].clone();
        queue_override(&mut next.pending, &registration);
        self.commit(&mut state, next)?;

        tracing::info!(
            registration_id = %registration.registration_id,
            attended,
            "Attendance set manually"
        );
        Ok(registration)
    }

    /// Host override for every registration of an event. Returns how many
    /// records changed.
    pub fn mark_all(&self, event_id: i64, attended: bool) -> Result<usize, StorageError> {
        let mut state = self.write_state();
        let mut next = state.clone();
        let now = self.now();
        let mut changed = Vec::new();
        for registration in next
            .registrations
            .iter_mut()
            .filter(|r| r.event_id == event_id)
        {
            if registration.set_attended(attended, now) {
                changed.push(registration.clone());
            }
        }
        if changed.is_empty() {
            return Ok(0);
        }
        for registration in &changed {
            queue_override(&mut next.pending, registration);
        }
        self.commit(&mut state, next)?;

        tracing::info!(event_id, attended, changed = changed.len(), "Attendance set for event");
        Ok(changed.len())
    }

    pub fn get(&self, registration_id: &str) -> Option<Registration> {
        self.read_state()
            .registrations
            .iter()
            .find(|r| r.registration_id == registration_id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Registration> {
        self.read_state().registrations.clone()
    }

    pub fn list_by_event(&self, event_id: i64) -> Vec<Registration> {
        self.read_state()
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect()
    }

    pub fn list_by_participant(&self, participant_id: &str) -> Vec<Registration> {
        self.read_state()
            .registrations
            .iter()
            .filter(|r| r.participant_id == participant_id)
            .cloned()
            .collect()
    }

    pub fn is_registered(&self, event_id: i64, participant_id: &str) -> bool {
        self.read_state()
            .registrations
            .iter()
            .any(|r| r.matches(event_id, participant_id))
    }

    pub fn attendance_rows(&self, event_id: i64) -> Vec<AttendanceRow> {
        self.read_state()
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .map(AttendanceRow::from)
            .collect()
    }

    pub fn stats(&self, event_id: i64) -> AttendanceStats {
        AttendanceStats::from_registrations(
            self.read_state()
                .registrations
                .iter()
                .filter(|r| r.event_id == event_id),
        )
    }

    /// Remote calls still waiting to be delivered.
    pub fn pending(&self) -> Vec<PendingSync> {
        self.read_state().pending.clone()
    }

    /// Retries every queued remote call once.
    ///
    /// Returns an empty report without sending anything while another pass
    /// is in flight.
    pub async fn reconcile(&self) -> ReconcileReport {
        let _gate = match self.sync_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                tracing::debug!("Reconciliation already in progress");
                return ReconcileReport::default();
            }
        };
        let queued = self.pending();
        if queued.is_empty() {
            return ReconcileReport::default();
        }

        let mut delivered = Vec::new();
        let mut report = ReconcileReport::default();
        for entry in &queued {
            match self.send(entry).await {
                Ok(()) => {
                    report.synced += 1;
                    delivered.push(entry.clone());
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        kind = entry.kind(),
                        registration_id = %entry.registration_id(),
                        error = %e,
                        "Pending sync still failing"
                    );
                }
            }
        }

        self.dequeue(&delivered);
        tracing::info!(synced = report.synced, failed = report.failed, "Reconciliation pass finished");
        report
    }

    /// Merges the backend's registrations into the local set.
    ///
    /// Records are matched by `(event_id, participant_id)`. A remote scan is
    /// adopted; a local scan is never undone.
    pub async fn refresh_from_remote(&self) -> Result<RefreshReport, RegistrationError> {
        let remote = self.backend.fetch_registrations().await?;
        let now = self.now();

        let mut state = self.write_state();
        let mut next = state.clone();
        let mut report = RefreshReport::default();
        for record in remote {
            let incoming = match record.into_registration(now) {
                Ok(incoming) => incoming,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid remote registration");
                    report.skipped += 1;
                    continue;
                }
            };

            if let Some(local) = next
                .registrations
                .iter_mut()
                .find(|r| r.matches(incoming.event_id, &incoming.participant_id))
            {
                if incoming.scanned && !local.scanned {
                    local.scanned = true;
                    local.scan_timestamp = incoming.scan_timestamp;
                    local.attendance_method = incoming.attendance_method;
                    report.updated += 1;
                }
                continue;
            }

            if next
                .registrations
                .iter()
                .any(|r| r.registration_id == incoming.registration_id)
            {
                tracing::warn!(
                    registration_id = %incoming.registration_id,
                    "Remote registration ID collides with a local record"
                );
                report.skipped += 1;
                continue;
            }
            next.registrations.push(incoming);
            report.added += 1;
        }

        if report.added > 0 || report.updated > 0 {
            self.commit(&mut state, next)?;
        }
        tracing::info!(
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            "Merged remote registrations"
        );
        Ok(report)
    }

    /// Lists the backend's events.
    pub async fn events(&self) -> Result<Vec<EventSummary>, RemoteError> {
        self.backend.fetch_events().await
    }

    /// Drops every registration and queued call, in memory and in storage.
    pub fn reset_session(&self) -> Result<(), StorageError> {
        let mut state = self.write_state();
        self.storage.remove(REGISTRATIONS_KEY)?;
        self.storage.remove(PENDING_SYNC_KEY)?;
        *state = StoreState::default();
        tracing::info!("Session reset; local registrations cleared");
        Ok(())
    }

    /// Attempts one queued call and dequeues it on success.
    ///
    /// Leaves the call queued when a reconciliation pass is running.
    async fn deliver(&self, entry: &PendingSync) -> bool {
        let _gate = match self.sync_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                tracing::debug!(
                    registration_id = %entry.registration_id(),
                    "Reconciliation in progress; call left queued"
                );
                return false;
            }
        };
        match self.send(entry).await {
            Ok(()) => {
                self.dequeue(std::slice::from_ref(entry));
                true
            }
            Err(e) => {
                tracing::warn!(
                    kind = entry.kind(),
                    event_id = entry.event_id(),
                    registration_id = %entry.registration_id(),
                    error = %e,
                    "Remote call failed; queued for reconciliation"
                );
                false
            }
        }
    }

    async fn send(&self, entry: &PendingSync) -> Result<(), RemoteError> {
        match entry {
            PendingSync::Register {
                event_id,
                participant_id,
                registration_id,
            } => {
                let request = RegisterRequest {
                    user_id: participant_id.clone(),
                    registration_id: registration_id.clone(),
                };
                self.backend.register(*event_id, &request).await
            }
            PendingSync::Attendance {
                event_id,
                participant_id,
                registration_id,
            } => {
                let request = AttendanceRequest {
                    registration_id: registration_id.clone(),
                    user_id: participant_id.clone(),
                };
                self.backend.mark_attendance(*event_id, &request).await
            }
        }
    }

    fn dequeue(&self, delivered: &[PendingSync]) {
        if delivered.is_empty() {
            return;
        }
        let mut state = self.write_state();
        let mut next = state.clone();
        next.pending.retain(|entry| !delivered.contains(entry));
        if let Err(e) = self.commit(&mut state, next) {
            tracing::warn!(error = %e, "Failed to persist sync queue");
        }
    }

    /// Writes changed sections of `next` to storage, then installs it.
    ///
    /// A failed registrations write leaves memory untouched. A failed queue
    /// write is logged and the queue is rewritten on the next commit.
    fn commit(&self, state: &mut StoreState, next: StoreState) -> Result<(), StorageError> {
        if next.registrations != state.registrations {
            write_json(self.storage.as_ref(), REGISTRATIONS_KEY, &next.registrations)?;
        }
        if next.pending != state.pending {
            if let Err(e) = write_json(self.storage.as_ref(), PENDING_SYNC_KEY, &next.pending) {
                tracing::warn!(error = %e, "Failed to persist sync queue");
            }
        }
        *state = next;
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Queues an attendance push for a record marked present and drops any
/// queued push for one marked absent.
fn queue_override(pending: &mut Vec<PendingSync>, registration: &Registration) {
    let id = registration.registration_id.as_str();
    let is_queued = |entry: &PendingSync| {
        matches!(entry, PendingSync::Attendance { .. }) && entry.registration_id() == id
    };
    if registration.scanned {
        if !pending.iter().any(is_queued) {
            pending.push(PendingSync::attendance(registration));
        }
    } else {
        pending.retain(|entry| !is_queued(entry));
    }
}

fn write_json<T: Serialize>(
    storage: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(value)
        .map_err(|e| StorageError::Unavailable(format!("serialization failed: {}", e)))?;
    storage.set(key, &json)
}

fn load_registrations(storage: &dyn KeyValueStore) -> Vec<Registration> {
    let raw = match storage.get(REGISTRATIONS_KEY) {
        Ok(Some(raw)) if !raw.trim().is_empty() => raw,
        Ok(_) => {
            tracing::info!("No stored registrations; using seed data");
            return seed_registrations();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored registrations; using seed data");
            return seed_registrations();
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(error = %e, "Stored registrations are corrupt; using seed data");
            return seed_registrations();
        }
    };

    let mut registrations: Vec<Registration> = Vec::with_capacity(values.len());
    for value in values {
        let registration: Registration = match serde_json::from_value(value) {
            Ok(registration) => registration,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unreadable stored registration");
                continue;
            }
        };
        if !registration.is_consistent() || registration.event_id <= 0 {
            tracing::warn!(
                registration_id = %registration.registration_id,
                "Dropping inconsistent stored registration"
            );
            continue;
        }
        if registrations.iter().any(|r| {
            r.registration_id == registration.registration_id
                || r.matches(registration.event_id, &registration.participant_id)
        }) {
            tracing::warn!(
                registration_id = %registration.registration_id,
                "Dropping duplicate stored registration"
            );
            continue;
        }
        registrations.push(registration);
    }
    registrations
}

fn load_pending(storage: &dyn KeyValueStore) -> Vec<PendingSync> {
    match storage.get(PENDING_SYNC_KEY) {
        Ok(Some(raw)) if !raw.trim().is_empty() => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stored sync queue is corrupt; discarding");
            Vec::new()
        }),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored sync queue");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceMethod, FlexibleId, RemoteRegistration};
    use crate::ports::{MemoryStore, MockCall, MockRegistrationBackend};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 18, 12, 30, 0).unwrap()
    }

    fn codec() -> QrCodec {
        QrCodec::new("SPARC").unwrap()
    }

    fn store_with(
        storage: Arc<MemoryStore>,
        backend: Arc<MockRegistrationBackend>,
    ) -> RegistrationStore {
        RegistrationStore::load(storage, backend, codec()).with_clock(fixed_now)
    }

    /// Empty store backed by a working mock backend.
    fn empty_store() -> (RegistrationStore, Arc<MemoryStore>, Arc<MockRegistrationBackend>) {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::new());
        (
            store_with(storage.clone(), backend.clone()),
            storage,
            backend,
        )
    }

    fn ada() -> Participant {
        Participant::new("u1", "Ada Lovelace", "ada@example.com")
    }

    #[tokio::test]
    async fn test_register_creates_and_persists() {
        let (store, storage, backend) = empty_store();

        let reg = store.register(42, &ada()).await.unwrap();
        assert_eq!(reg.registration_id, "SPARC-42-u1-20241018");
        assert!(!reg.scanned);
        assert!(store.is_registered(42, "u1"));

        let raw = storage.get(REGISTRATIONS_KEY).unwrap().unwrap();
        assert!(raw.contains("SPARC-42-u1-20241018"));
        assert!(store.pending().is_empty());
        assert_eq!(
            backend.calls(),
            vec![MockCall::Register {
                event_id: 42,
                request: RegisterRequest {
                    user_id: "u1".to_string(),
                    registration_id: "SPARC-42-u1-20241018".to_string(),
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (store, _, backend) = empty_store();

        let first = store.register(42, &ada()).await.unwrap();
        let second = store.register(42, &ada()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list_by_event(42).len(), 1);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let (store, _, _) = empty_store();

        assert!(matches!(
            store.register(0, &ada()).await,
            Err(RegistrationError::InvalidEventId(0))
        ));
        let bad = Participant::new("u1", "Ada", "not-an-email");
        assert!(matches!(
            store.register(42, &bad).await,
            Err(RegistrationError::InvalidParticipant(_))
        ));
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn test_register_survives_remote_failure() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::failing());
        let store = store_with(storage.clone(), backend.clone());

        let reg = store.register(42, &ada()).await.unwrap();
        assert!(store.is_registered(42, "u1"));
        assert_eq!(store.pending(), vec![PendingSync::register(&reg)]);
        assert!(storage
            .get(PENDING_SYNC_KEY)
            .unwrap()
            .unwrap()
            .contains("\"kind\":\"register\""));
    }

    #[tokio::test]
    async fn test_reconcile_drains_queue_after_recovery() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::failing());
        let store = store_with(storage.clone(), backend.clone());

        let reg = store.register(42, &ada()).await.unwrap();
        store.mark_scanned(&reg.registration_id).await.unwrap();
        assert_eq!(store.pending().len(), 2);

        let report = store.reconcile().await;
        assert_eq!(report, ReconcileReport { synced: 0, failed: 2 });

        backend.set_failing(false);
        let report = store.reconcile().await;
        assert_eq!(report, ReconcileReport { synced: 2, failed: 0 });
        assert!(store.pending().is_empty());
        assert_eq!(storage.get(PENDING_SYNC_KEY).unwrap().as_deref(), Some("[]"));

        assert_eq!(store.reconcile().await, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_mark_scanned_once() {
        let (store, _, backend) = empty_store();
        let reg = store.register(42, &ada()).await.unwrap();

        let marked = store.mark_scanned(&reg.registration_id).await.unwrap();
        assert!(marked.scanned);
        assert_eq!(marked.scan_timestamp, Some(fixed_now()));
        assert_eq!(marked.attendance_method, Some(AttendanceMethod::QrScan));

        match store.mark_scanned(&reg.registration_id).await {
            Err(MarkError::AlreadyScanned(existing)) => {
                assert_eq!(existing.scan_timestamp, Some(fixed_now()));
            }
            other => panic!("expected AlreadyScanned, got {:?}", other),
        }
        let attendance_calls = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Attendance { .. }))
            .count();
        assert_eq!(attendance_calls, 1);
    }

    #[tokio::test]
    async fn test_mark_scanned_unknown_id() {
        let (store, _, _) = empty_store();
        assert!(matches!(
            store.mark_scanned("SPARC-1-nobody-20240101").await,
            Err(MarkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_finds_local_registration() {
        let (store, _, _) = empty_store();
        let reg = store.register(42, &ada()).await.unwrap();
        let payload = store.codec().encode(42, &ada(), fixed_now());

        assert_eq!(store.validate(&payload), Some(reg));
    }

    #[tokio::test]
    async fn test_validate_matches_pair_when_id_differs() {
        let (store, _, _) = empty_store();
        let reg = store.register(42, &ada()).await.unwrap();
        let text = r#"{"registrationId": "SPARC-42-u1-20240101", "eventId": 42, "userId": "u1"}"#;

        assert_eq!(store.validate(text), Some(reg));
    }

    #[tokio::test]
    async fn test_validate_rejects_id_naming_another_participant() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::new().with_registrations(vec![
            RemoteRegistration {
                id: FlexibleId::Int(11),
                event_id: FlexibleId::Int(42),
                user_id: FlexibleId::Text("u2".to_string()),
                user_name: Some("Grace".to_string()),
                user_email: Some("grace@example.com".to_string()),
                created_at: None,
                attended: Some(false),
                attendance_time: None,
            },
        ]));
        let store = store_with(storage, backend);
        store.refresh_from_remote().await.unwrap();

        let forged = r#"{"registrationId": "11", "eventId": 42, "userId": "u5"}"#;
        assert_eq!(store.validate(forged), None);
        let wrong_event = r#"{"registrationId": "11", "eventId": 43, "userId": "u2"}"#;
        assert_eq!(store.validate(wrong_event), None);

        let genuine = r#"{"registrationId": "11", "eventId": 42, "userId": "u2"}"#;
        assert_eq!(store.validate(genuine).unwrap().participant_id, "u2");
        assert!(!store.is_registered(42, "u5"));
    }

    #[test]
    fn test_validate_synthesizes_cross_device_registration() {
        let (store, _, _) = empty_store();
        let text = r#"{"eventId": 7, "userId": "u9", "userEmail": "u9@example.com"}"#;

        let reg = store.validate(text).unwrap();
        assert_eq!(reg.registration_id, "SPARC-7-u9-20241018");
        assert_eq!(reg.participant_email, "u9@example.com");
        assert!(!reg.scanned);
        assert!(store.get(&reg.registration_id).is_none());
    }

    #[test]
    fn test_validate_malformed_payload() {
        let (store, _, _) = empty_store();
        assert!(store.validate("hello").is_none());
        assert!(store.validate("").is_none());
    }

    #[test]
    fn test_adopt_is_idempotent() {
        let (store, _, _) = empty_store();
        let reg = store
            .validate(r#"{"eventId": 7, "userId": "u9"}"#)
            .unwrap();

        let adopted = store.adopt(reg.clone()).unwrap();
        assert_eq!(adopted, reg);
        assert_eq!(store.adopt(reg).unwrap(), adopted);
        assert_eq!(store.list_by_event(7).len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (store, _, _) = empty_store();
        store.register(1, &ada()).await.unwrap();
        store.register(2, &ada()).await.unwrap();
        store
            .register(2, &Participant::new("u2", "Grace", "grace@example.com"))
            .await
            .unwrap();

        assert_eq!(store.list_by_event(2).len(), 2);
        assert_eq!(store.list_by_participant("u1").len(), 2);
        assert!(store.list_by_event(3).is_empty());
    }

    #[test]
    fn test_load_seeds_when_storage_empty_or_corrupt() {
        let backend = Arc::new(MockRegistrationBackend::new());
        for storage in [
            MemoryStore::new(),
            MemoryStore::with_entry(REGISTRATIONS_KEY, "not json"),
            MemoryStore::with_entry(REGISTRATIONS_KEY, "{\"a\":1}"),
            MemoryStore::with_entry(REGISTRATIONS_KEY, "  "),
        ] {
            let store = store_with(Arc::new(storage), backend.clone());
            assert_eq!(store.all(), seed_registrations());
        }
    }

    #[test]
    fn test_load_drops_invalid_records() {
        let raw = r#"[
            {"registrationId": "SPARC-1-a-20240920", "eventId": 1, "participantId": "a",
             "participantName": "A", "participantEmail": "a@example.com",
             "timestamp": "2024-09-20T10:30:00Z", "scanned": false},
            {"registrationId": "SPARC-1-b-20240920", "eventId": 1, "participantId": "b",
             "participantName": "B", "participantEmail": "b@example.com",
             "timestamp": "2024-09-20T10:30:00Z", "scanned": true},
            {"registrationId": "SPARC-1-a-20240921", "eventId": 1, "participantId": "a",
             "participantName": "A", "participantEmail": "a@example.com",
             "timestamp": "2024-09-21T10:30:00Z", "scanned": false},
            {"unexpected": true}
        ]"#;
        let store = store_with(
            Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, raw)),
            Arc::new(MockRegistrationBackend::new()),
        );

        let all = store.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].registration_id, "SPARC-1-a-20240920");
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::new());
        let store = store_with(storage.clone(), backend.clone());

        let ada = store.register(42, &ada()).await.unwrap();
        store
            .register(42, &Participant::new("u2", "Grace Hopper", "grace@example.com"))
            .await
            .unwrap();
        let linus = store
            .register(7, &Participant::new("u3", "Linus", "linus@example.com"))
            .await
            .unwrap();
        store.mark_scanned(&ada.registration_id).await.unwrap();
        store.set_attendance(&linus.registration_id, true).unwrap();
        backend.set_failing(true);
        store
            .register(7, &Participant::new("u4", "Ken", "ken@example.com"))
            .await
            .unwrap();

        let reloaded = store_with(storage, backend);
        assert_eq!(reloaded.all().len(), 4);
        assert_eq!(reloaded.all(), store.all());
        assert_eq!(reloaded.pending(), store.pending());
        assert_eq!(reloaded.pending().len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_is_single_flight() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::failing());
        let store = store_with(storage, backend.clone());
        let reg = store.register(42, &ada()).await.unwrap();
        backend.set_failing(false);
        let calls_before = backend.calls().len();

        {
            let _in_flight = store.sync_gate.try_lock().unwrap();
            assert_eq!(store.reconcile().await, ReconcileReport::default());
            store.mark_scanned(&reg.registration_id).await.unwrap();
            assert_eq!(backend.calls().len(), calls_before);
            assert_eq!(store.pending().len(), 2);
        }

        let report = store.reconcile().await;
        assert_eq!(report, ReconcileReport { synced: 2, failed: 0 });
        assert_eq!(backend.calls().len(), calls_before + 2);
        assert!(store.pending().is_empty());
    }

    #[tokio::test]
    async fn test_manual_override_keeps_invariant() {
        let (store, _, _) = empty_store();
        let reg = store.register(42, &ada()).await.unwrap();

        let present = store.set_attendance(&reg.registration_id, true).unwrap();
        assert!(present.scanned && present.is_consistent());
        assert_eq!(present.attendance_method, Some(AttendanceMethod::Manual));
        assert_eq!(store.pending(), vec![PendingSync::attendance(&present)]);

        let absent = store.set_attendance(&reg.registration_id, false).unwrap();
        assert!(!absent.scanned && absent.is_consistent());
        assert!(store.pending().is_empty());

        assert!(matches!(
            store.set_attendance("missing", true),
            Err(MarkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_all() {
        let (store, _, _) = empty_store();
        store.register(42, &ada()).await.unwrap();
        store
            .register(42, &Participant::new("u2", "Grace", "grace@example.com"))
            .await
            .unwrap();
        store.register(7, &ada()).await.unwrap();

        assert_eq!(store.mark_all(42, true).unwrap(), 2);
        assert_eq!(store.mark_all(42, true).unwrap(), 0);
        assert_eq!(store.stats(42).present, 2);
        assert_eq!(store.stats(7).present, 0);

        let rows = store.attendance_rows(42);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.method == AttendanceMethod::Manual));
    }

    #[tokio::test]
    async fn test_refresh_merges_without_unscanning() {
        let (store, _, _) = empty_store();
        let local = store.register(42, &ada()).await.unwrap();
        store.mark_scanned(&local.registration_id).await.unwrap();

        let remote = vec![
            RemoteRegistration {
                id: FlexibleId::Int(10),
                event_id: FlexibleId::Int(42),
                user_id: FlexibleId::Text("u1".to_string()),
                user_name: None,
                user_email: None,
                created_at: None,
                attended: Some(false),
                attendance_time: None,
            },
            RemoteRegistration {
                id: FlexibleId::Int(11),
                event_id: FlexibleId::Int(42),
                user_id: FlexibleId::Text("u2".to_string()),
                user_name: Some("Grace".to_string()),
                user_email: Some("grace@example.com".to_string()),
                created_at: None,
                attended: Some(true),
                attendance_time: None,
            },
            RemoteRegistration {
                id: FlexibleId::Int(12),
                event_id: FlexibleId::Text("nope".to_string()),
                user_id: FlexibleId::Text("u3".to_string()),
                user_name: None,
                user_email: None,
                created_at: None,
                attended: None,
                attendance_time: None,
            },
        ];
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let backend = Arc::new(MockRegistrationBackend::new().with_registrations(remote));
        let merged = store_with(storage, backend);
        merged.adopt(store.get(&local.registration_id).unwrap()).unwrap();

        let report = merged.refresh_from_remote().await.unwrap();
        assert_eq!(
            report,
            RefreshReport {
                added: 1,
                updated: 0,
                skipped: 1
            }
        );
        assert!(merged.get(&local.registration_id).unwrap().scanned);
        let grace = merged.get("11").unwrap();
        assert!(grace.scanned && grace.is_consistent());
    }

    #[tokio::test]
    async fn test_refresh_propagates_remote_failure() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let store = store_with(storage, Arc::new(MockRegistrationBackend::failing()));
        assert!(matches!(
            store.refresh_from_remote().await,
            Err(RegistrationError::Remote(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_session() {
        let storage = Arc::new(MemoryStore::with_entry(REGISTRATIONS_KEY, "[]"));
        let store = store_with(storage.clone(), Arc::new(MockRegistrationBackend::failing()));
        store.register(42, &ada()).await.unwrap();

        store.reset_session().unwrap();
        assert!(store.all().is_empty());
        assert!(store.pending().is_empty());
        assert!(storage.get(REGISTRATIONS_KEY).unwrap().is_none());
        assert!(storage.get(PENDING_SYNC_KEY).unwrap().is_none());
    }
}
