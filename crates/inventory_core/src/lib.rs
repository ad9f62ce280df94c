use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use shared::{
    domain::{Item, ItemDraft, ItemId, SyncState},
    protocol::{RemoteId, RemoteItem},
};
use storage::Storage;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

const SYNC_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("'{0}' is not a valid price")]
    InvalidPrice(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Remote failures are uniform: transport error, non-success status, or a
/// body that does not parse. The manager absorbs all three.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response body")]
    Body,
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Remote collection service: list/create/delete over one resource.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError>;
    async fn create(&self, draft: &ItemDraft) -> Result<RemoteItem, RemoteError>;
    async fn delete(&self, id: &ItemId) -> Result<(), RemoteError>;
}

/// HTTP implementation of [`RemoteCatalog`] against a configured base URL.
pub struct HttpCatalog {
    http: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/productos", self.base_url.trim_end_matches('/'))
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status(status.as_u16()))
    }
}

#[async_trait]
impl RemoteCatalog for HttpCatalog {
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError> {
        let response = check_status(self.http.get(self.collection_url()).send().await?)?;
        response.json().await.map_err(|_| RemoteError::Body)
    }

    async fn create(&self, draft: &ItemDraft) -> Result<RemoteItem, RemoteError> {
        let response = check_status(
            self.http
                .post(self.collection_url())
                .json(draft)
                .send()
                .await?,
        )?;
        response.json().await.map_err(|_| RemoteError::Body)
    }

    async fn delete(&self, id: &ItemId) -> Result<(), RemoteError> {
        check_status(
            self.http
                .delete(format!("{}/{}", self.collection_url(), id))
                .send()
                .await?,
        )?;
        Ok(())
    }
}

/// Durable key-value store for the serialized collection snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;
    async fn save(&self, key: &str, payload: &str) -> Result<()>;
}

#[async_trait]
impl SnapshotStore for Storage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        self.get(key).await
    }

    async fn save(&self, key: &str, payload: &str) -> Result<()> {
        self.set(key, payload).await
    }
}

/// Presentation surface. Repainted with the full collection after every
/// mutation.
pub trait ListView: Send + Sync {
    fn render(&self, items: &[Item]);
}

pub struct ConsoleView;

impl ListView for ConsoleView {
    fn render(&self, items: &[Item]) {
        if items.is_empty() {
            println!("(inventory empty)");
            return;
        }
        for item in items {
            let marker = match item.sync {
                SyncState::Pending => " [pending]",
                SyncState::Confirmed => "",
            };
            println!("{} - ${}{marker}  (id {})", item.name, item.price, item.id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    Remote,
    LocalStore,
}

/// Completion signals for the fire-and-forget remote calls. Local state never
/// waits on these; they exist for diagnostics and deterministic tests.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Refreshed { source: RefreshSource },
    CreateConfirmed { temp_id: ItemId, final_id: ItemId },
    CreateFailed { temp_id: ItemId },
    DeleteConfirmed { id: ItemId },
    DeleteFailed { id: ItemId },
}

/// Owns the authoritative in-memory collection. Every mutation runs
/// local-mutate, persist, render, in that order, before the corresponding
/// remote call is spawned; remote outcomes never roll local state back.
///
/// Cheap to clone; clones share the same collection.
#[derive(Clone)]
pub struct InventoryManager {
    store: Arc<dyn SnapshotStore>,
    remote: Arc<dyn RemoteCatalog>,
    view: Arc<dyn ListView>,
    snapshot_key: String,
    items: Arc<Mutex<Vec<Item>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl InventoryManager {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        remote: Arc<dyn RemoteCatalog>,
        view: Arc<dyn ListView>,
        snapshot_key: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(SYNC_EVENT_CAPACITY);
        Self {
            store,
            remote,
            view,
            snapshot_key: snapshot_key.into(),
            items: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn items(&self) -> Vec<Item> {
        self.items.lock().await.clone()
    }

    /// Loads the collection: from the remote service when reachable, from the
    /// durable snapshot otherwise. Remote failures never escape; only a
    /// corrupt or unreadable snapshot returns `Err`.
    pub async fn initialize(&self) -> Result<(), InventoryError> {
        let (loaded, source) = match self.remote.list().await {
            Ok(entries) => (validate_remote_entries(entries), RefreshSource::Remote),
            Err(err) => {
                warn!("remote list unavailable, falling back to local snapshot: {err}");
                (self.load_snapshot().await?, RefreshSource::LocalStore)
            }
        };

        {
            let mut items = self.items.lock().await;
            *items = loaded;
            self.view.render(&items);
        }
        self.emit(SyncEvent::Refreshed { source });
        Ok(())
    }

    /// Validates the inputs, applies the add locally and durably, then spawns
    /// the create request. Returns the temporary id assigned to the item.
    pub async fn add(&self, name: &str, price_input: &str) -> Result<ItemId, InventoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InventoryError::EmptyName);
        }
        let price = price_input
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|price| price.is_finite())
            .ok_or_else(|| InventoryError::InvalidPrice(price_input.trim().to_string()))?;

        let temp_id = {
            let mut items = self.items.lock().await;
            let temp_id = fresh_temp_id(&items);
            items.push(Item {
                id: temp_id.clone(),
                name: name.to_string(),
                price,
                sync: SyncState::Pending,
            });
            self.persist(&items).await?;
            self.view.render(&items);
            temp_id
        };

        let manager = self.clone();
        let draft = ItemDraft {
            name: name.to_string(),
            price,
        };
        let pending = temp_id.clone();
        tokio::spawn(async move {
            manager.sync_create(pending, draft).await;
        });

        Ok(temp_id)
    }

    /// Removes the item locally and durably, then spawns the remote delete.
    /// Removing an absent id still persists and re-renders.
    pub async fn remove(&self, id: &ItemId) -> Result<(), InventoryError> {
        {
            let mut items = self.items.lock().await;
            items.retain(|item| item.id != *id);
            self.persist(&items).await?;
            self.view.render(&items);
        }

        let manager = self.clone();
        let id = id.clone();
        tokio::spawn(async move {
            manager.sync_delete(id).await;
        });

        Ok(())
    }

    async fn sync_create(&self, temp_id: ItemId, draft: ItemDraft) {
        match self.remote.create(&draft).await {
            Ok(created) => {
                let final_id = created
                    .id
                    .map(RemoteId::into_string)
                    .filter(|id| !id.is_empty());
                let Some(final_id) = final_id else {
                    warn!(
                        "create response for '{}' carried no id, keeping temporary id {temp_id}",
                        draft.name
                    );
                    self.emit(SyncEvent::CreateFailed { temp_id });
                    return;
                };
                let final_id = ItemId::new(final_id);
                self.confirm_created(&temp_id, &final_id).await;
                self.emit(SyncEvent::CreateConfirmed { temp_id, final_id });
            }
            Err(err) => {
                warn!(
                    "remote create for '{}' failed, item stays local-only: {err}",
                    draft.name
                );
                self.emit(SyncEvent::CreateFailed { temp_id });
            }
        }
    }

    /// Rewrites the temporary id to the server-assigned one, in memory and in
    /// the durable snapshot. A no-op when the item was removed while the
    /// create request was in flight.
    async fn confirm_created(&self, temp_id: &ItemId, final_id: &ItemId) {
        let mut items = self.items.lock().await;
        let Some(position) = items.iter().position(|item| item.id == *temp_id) else {
            info!("item {temp_id} was removed before the create ack, nothing to reconcile");
            return;
        };
        if items.iter().any(|item| item.id == *final_id) {
            warn!("server id {final_id} already present, keeping temporary id {temp_id}");
            return;
        }
        items[position].id = final_id.clone();
        items[position].sync = SyncState::Confirmed;
        if let Err(err) = self.persist(&items).await {
            error!("failed to persist reconciled id {final_id}: {err}");
        }
        self.view.render(&items);
    }

    async fn sync_delete(&self, id: ItemId) {
        match self.remote.delete(&id).await {
            Ok(()) => {
                info!("item {id} deleted on the remote service");
                self.emit(SyncEvent::DeleteConfirmed { id });
            }
            Err(err) => {
                warn!("remote delete of {id} failed, local removal stands: {err}");
                self.emit(SyncEvent::DeleteFailed { id });
            }
        }
    }

    async fn load_snapshot(&self) -> Result<Vec<Item>, InventoryError> {
        let Some(payload) = self.store.load(&self.snapshot_key).await? else {
            return Ok(Vec::new());
        };
        let items = serde_json::from_str(&payload)
            .with_context(|| format!("corrupt snapshot under key '{}'", self.snapshot_key))?;
        Ok(items)
    }

    async fn persist(&self, items: &[Item]) -> Result<(), InventoryError> {
        let payload =
            serde_json::to_string(items).context("failed to serialize collection snapshot")?;
        self.store.save(&self.snapshot_key, &payload).await?;
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine; the events exist for observers, not for state.
        let _ = self.events.send(event);
    }
}

fn validate_remote_entries(entries: Vec<RemoteItem>) -> Vec<Item> {
    let mut items: Vec<Item> = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.clone().into_item() {
            Some(item) => {
                if items.iter().any(|existing| existing.id == item.id) {
                    warn!("skipping remote entry with duplicate id {}", item.id);
                } else {
                    items.push(item);
                }
            }
            None => warn!("skipping malformed remote entry: {entry:?}"),
        }
    }
    items
}

/// Millisecond timestamp, stringified; bumped until it does not collide with
/// an id already in the collection.
fn fresh_temp_id(items: &[Item]) -> ItemId {
    let mut candidate = Utc::now().timestamp_millis();
    while items
        .iter()
        .any(|item| item.id.as_str() == candidate.to_string())
    {
        candidate += 1;
    }
    ItemId::new(candidate.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
