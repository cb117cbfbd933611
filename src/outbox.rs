//! Record of the best-effort pushes of new passes to the sheet.
//!
//! Creating a pass never waits on the sheet. The flattened payload is queued
//! here and one delivery attempt runs in the background; its outcome is kept on
//! the entry so the user can see it and retry by hand.

use crate::sheet::{SheetClient, SheetPayload};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum SyncState {
    Pending,
    Delivered,
    Failed(String),
    /// No sheet endpoint was configured at queue time.
    Skipped(String),
}

/// Entries kept before settled ones are pruned, oldest first.
pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: String,
    pub gate_pass_id: String,
    pub payload: SheetPayload,
    pub state: SyncState,
    /// A push for this entry is running.
    pub in_flight: bool,
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Shared, cloneable outbox handle
#[derive(Clone)]
pub struct SyncOutbox {
    entries: Arc<Mutex<Vec<OutboxEntry>>>,
    capacity: usize,
}

impl Default for SyncOutbox {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Drop settled entries from the back until at most `capacity` remain.
/// Delivered entries go before failed or skipped ones; anything pending stays.
fn prune(entries: &mut Vec<OutboxEntry>, capacity: usize) {
    while entries.len() > capacity {
        let settled = |e: &OutboxEntry| !e.in_flight && e.state != SyncState::Pending;
        let victim = entries
            .iter()
            .rposition(|e| settled(e) && e.state == SyncState::Delivered)
            .or_else(|| entries.iter().rposition(settled));
        match victim {
            Some(index) => {
                entries.remove(index);
            }
            None => break,
        }
    }
}

impl SyncOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SyncOutbox {
            entries: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    /// Queue a payload and return the new entry's id.
    pub fn enqueue(&self, gate_pass_id: &str, payload: SheetPayload) -> String {
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            gate_pass_id: gate_pass_id.to_string(),
            payload,
            state: SyncState::Pending,
            in_flight: false,
            attempts: 0,
            queued_at: Utc::now(),
            last_attempt_at: None,
        };
        let id = entry.id.clone();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(0, entry);
            prune(&mut entries, self.capacity);
        }
        id
    }

    /// Newest first.
    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<OutboxEntry> {
        self.entries
            .lock()
            .ok()?
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Mark an entry as being sent. `None` when it is unknown, already
    /// delivered or already being sent.
    fn claim(&self, id: &str) -> Option<OutboxEntry> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.iter_mut().find(|e| e.id == id)?;
        if entry.in_flight || entry.state == SyncState::Delivered {
            return None;
        }
        entry.in_flight = true;
        entry.state = SyncState::Pending;
        Some(entry.clone())
    }

    fn finish(&self, id: &str, state: SyncState) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                entry.state = state;
                entry.in_flight = false;
                entry.attempts += 1;
                entry.last_attempt_at = Some(Utc::now());
            }
        }
    }

    /// Mark an entry as not sent because no endpoint is configured.
    pub fn skip(&self, id: &str, reason: &str) {
        log::warn!("Sheet sync {} skipped: {}", id, reason);
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id && !e.in_flight) {
                entry.state = SyncState::Skipped(reason.to_string());
            }
        }
    }

    async fn push(&self, entry: OutboxEntry, client: &SheetClient) {
        match client.push_gate_pass(&entry.payload).await {
            Ok(()) => {
                log::info!("Gate pass {} pushed to the sheet", entry.payload.gate_pass_no);
                self.finish(&entry.id, SyncState::Delivered);
            }
            Err(e) => {
                log::error!(
                    "Pushing gate pass {} to the sheet failed: {}",
                    entry.payload.gate_pass_no,
                    e
                );
                self.finish(&entry.id, SyncState::Failed(e.to_string()));
            }
        }
    }

    /// Make one delivery attempt and record its outcome on the entry.
    ///
    /// Returns false without sending anything when the entry is unknown,
    /// delivered, or already being sent.
    pub async fn deliver(&self, id: &str, client: &SheetClient) -> bool {
        let Some(entry) = self.claim(id) else {
            return false;
        };
        self.push(entry, client).await;
        true
    }

    /// Claim the entry now and push it on a background task.
    pub fn spawn_delivery(
        &self,
        id: String,
        client: SheetClient,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let entry = self.claim(&id)?;
        let outbox = self.clone();
        Some(tokio::spawn(async move { outbox.push(entry, &client).await }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SheetPayload {
        SheetPayload {
            gate_pass_no: "GP-01".into(),
            created_at: "05/01/2024, 10:00:00".into(),
            requester_name: "Rina".into(),
            department: "HR".into(),
            item_name: "Drill".into(),
            quantity: 1,
            unit: "Pcs".into(),
            pass_type: "Returnable".into(),
            status: "Approved".into(),
            purpose: "Repair".into(),
            vehicle_info: "N/A / N/A".into(),
        }
    }

    #[test]
    fn enqueue_and_skip() {
        let outbox = SyncOutbox::new();
        let id = outbox.enqueue("gp-1", payload());
        assert_eq!(outbox.get(&id).unwrap().state, SyncState::Pending);

        outbox.skip(&id, "no endpoint");
        let entry = outbox.get(&id).unwrap();
        assert_eq!(entry.state, SyncState::Skipped("no endpoint".into()));
        assert_eq!(entry.attempts, 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_recorded_as_failed() {
        let outbox = SyncOutbox::new();
        let id = outbox.enqueue("gp-1", payload());
        // nothing listens on the discard port
        let client =
            SheetClient::connect(reqwest::Client::new(), Some("http://127.0.0.1:9/exec")).unwrap();
        assert!(outbox.deliver(&id, &client).await);

        let entry = outbox.get(&id).unwrap();
        assert!(matches!(entry.state, SyncState::Failed(_)));
        assert!(!entry.in_flight);
        assert_eq!(entry.attempts, 1);
        assert!(entry.last_attempt_at.is_some());
    }

    #[test]
    fn state_serializes_with_reason() {
        let json = serde_json::to_value(SyncState::Failed("boom".into())).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "boom");
    }

    #[tokio::test]
    async fn entry_being_sent_is_not_sent_again() {
        let outbox = SyncOutbox::new();
        let id = outbox.enqueue("gp-1", payload());
        let client =
            SheetClient::connect(reqwest::Client::new(), Some("http://127.0.0.1:9/exec")).unwrap();

        let handle = outbox.spawn_delivery(id.clone(), client.clone()).unwrap();
        assert!(outbox.get(&id).unwrap().in_flight);
        assert!(outbox.spawn_delivery(id.clone(), client.clone()).is_none());
        assert!(!outbox.deliver(&id, &client).await);
        outbox.skip(&id, "no endpoint");
        assert_eq!(outbox.get(&id).unwrap().state, SyncState::Pending);

        handle.await.unwrap();
        let entry = outbox.get(&id).unwrap();
        assert_eq!(entry.attempts, 1);
        assert!(!entry.in_flight);
        // a failed entry can be retried
        assert!(outbox.deliver(&id, &client).await);
        assert_eq!(outbox.get(&id).unwrap().attempts, 2);
    }

    #[test]
    fn settled_entries_are_pruned_oldest_first() {
        let outbox = SyncOutbox::with_capacity(2);
        let first = outbox.enqueue("gp-1", payload());
        outbox.skip(&first, "no endpoint");
        let second = outbox.enqueue("gp-2", payload());
        outbox.finish(&second, SyncState::Delivered);

        let third = outbox.enqueue("gp-3", payload());
        let ids: Vec<String> = outbox.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![third.clone(), first.clone()]);

        let fourth = outbox.enqueue("gp-4", payload());
        let ids: Vec<String> = outbox.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![fourth.clone(), third.clone()]);

        // pending entries are never dropped
        outbox.enqueue("gp-5", payload());
        assert_eq!(outbox.entries().len(), 3);
    }
}
