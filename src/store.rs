use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{
    self, InvoiceData, InvoiceDraft, InvoiceUpdate, LineItemUpdate, new_draft,
};

// Persisted keys. The names predate this tool and must not change.
pub const DRAFTS_KEY: &str = "invoice_drafts";
pub const ACTIVE_KEY: &str = "invoice_active_draft";
pub const LEGACY_DRAFT_KEY: &str = "invoice_draft";
pub const LEGACY_SIGNATURE_KEY: &str = "invoice_signature";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage write failed: {0}")]
    Write(#[from] io::Error),
    #[error("{0}")]
    Backend(String),
}

/// Key-value persistence capability consumed by the draft store. Reads
/// never fail: absent or unreadable values are `None`.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

/// One file per key under a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.key_path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) {
        fs::remove_file(self.key_path(key)).ok();
    }
}

/// In-memory storage for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    inner: std::sync::RwLock<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.inner.write().unwrap().remove(key);
    }
}

/// Single source of truth for all drafts and the active selection. Every
/// mutation persists the full collection and the active id through the
/// injected storage before returning.
pub struct DraftStore<S: Storage> {
    storage: S,
    drafts: Vec<InvoiceDraft>,
    active_id: String,
}

impl<S: Storage> DraftStore<S> {
    /// Loads existing drafts, migrates the legacy single-invoice format,
    /// or starts fresh, in that order. The previously saved active id is
    /// honored when it still names a loaded draft; otherwise the first
    /// draft in collection order becomes active.
    pub fn open(storage: S) -> Self {
        let drafts = load_drafts(&storage)
            .or_else(|| migrate_legacy(&storage))
            .unwrap_or_else(|| {
                tracing::debug!("no stored drafts, starting fresh");
                vec![new_draft(None)]
            });

        let active_id = storage
            .get(ACTIVE_KEY)
            .filter(|id| drafts.iter().any(|d| &d.id == id))
            .unwrap_or_else(|| drafts[0].id.clone());

        let store = Self {
            storage,
            drafts,
            active_id,
        };
        store.persist();
        store
    }

    pub fn drafts(&self) -> &[InvoiceDraft] {
        &self.drafts
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &InvoiceDraft {
        self.drafts
            .iter()
            .find(|d| d.id == self.active_id)
            .unwrap_or(&self.drafts[0])
    }

    /// Drafts sorted most recently updated first. Presentation order only;
    /// the stored collection keeps insertion order.
    pub fn drafts_by_recency(&self) -> Vec<&InvoiceDraft> {
        let mut view: Vec<&InvoiceDraft> = self.drafts.iter().collect();
        view.sort_by_key(|d| std::cmp::Reverse(d.updated_at));
        view
    }

    /// Merges a partial field set into the active invoice.
    pub fn update_invoice(&mut self, update: InvoiceUpdate) {
        let idx = self.active_index();
        let draft = &mut self.drafts[idx];
        update.apply_to(&mut draft.invoice);
        draft.touch();
        self.persist();
    }

    pub fn set_signature(&mut self, signature: Option<String>) {
        let idx = self.active_index();
        let draft = &mut self.drafts[idx];
        draft.signature = signature;
        draft.touch();
        self.persist();
    }

    /// Appends a new default draft, makes it active and returns its id.
    pub fn add_draft(&mut self, name: Option<&str>) -> String {
        let draft = new_draft(name);
        let id = draft.id.clone();
        self.drafts.push(draft);
        self.active_id = id.clone();
        self.persist();
        id
    }

    /// Removes a draft. The collection never empties: deleting the last
    /// draft synthesizes a fresh default one. When the active draft is
    /// deleted, the first remaining draft in collection order (not the
    /// most recently updated) becomes active.
    pub fn delete_draft(&mut self, id: &str) {
        self.drafts.retain(|d| d.id != id);
        if self.drafts.is_empty() {
            let fresh = new_draft(None);
            self.active_id = fresh.id.clone();
            self.drafts.push(fresh);
        } else if self.active_id == id {
            self.active_id = self.drafts[0].id.clone();
        }
        self.persist();
    }

    /// Renames a draft. Metadata only: updatedAt stays put.
    pub fn rename_draft(&mut self, id: &str, name: &str) {
        if let Some(draft) = self.drafts.iter_mut().find(|d| d.id == id) {
            draft.name = name.to_string();
            self.persist();
        }
    }

    /// Makes the named draft active. Unknown ids are ignored.
    pub fn switch_draft(&mut self, id: &str) {
        if self.drafts.iter().any(|d| d.id == id) {
            self.active_id = id.to_string();
            self.persist();
        }
    }

    /// Replaces the active invoice with the default one and clears the
    /// signature. The draft keeps its id and name.
    pub fn reset_invoice(&mut self) {
        let idx = self.active_index();
        let draft = &mut self.drafts[idx];
        draft.invoice = model::default_invoice();
        draft.signature = None;
        draft.touch();
        self.persist();
    }

    /// Appends a fresh line item to the active invoice, returns its id.
    pub fn add_line_item(&mut self) -> String {
        let idx = self.active_index();
        let draft = &mut self.drafts[idx];
        let id = draft.invoice.add_item();
        draft.touch();
        self.persist();
        id
    }

    pub fn update_line_item(&mut self, id: &str, update: LineItemUpdate) {
        let idx = self.active_index();
        let draft = &mut self.drafts[idx];
        match draft.invoice.item_mut(id) {
            Some(item) => update.apply_to(item),
            None => return,
        }
        draft.touch();
        self.persist();
    }

    /// Removes a line item from the active invoice. Returns false when
    /// the item is the last one left or the id is unknown.
    pub fn remove_line_item(&mut self, id: &str) -> bool {
        let idx = self.active_index();
        if !self.drafts[idx].invoice.remove_item(id) {
            return false;
        }
        self.drafts[idx].touch();
        self.persist();
        true
    }

    fn active_index(&self) -> usize {
        self.drafts
            .iter()
            .position(|d| d.id == self.active_id)
            .unwrap_or(0)
    }

    // Durability is best effort: a failed write keeps the in-memory state
    // intact and only logs.
    fn persist(&self) {
        match serde_json::to_string(&self.drafts) {
            Ok(json) => {
                if let Err(e) = self.storage.set(DRAFTS_KEY, &json) {
                    tracing::warn!("failed to persist drafts: {e}");
                }
            }
            Err(e) => tracing::warn!("failed to serialize drafts: {e}"),
        }
        if let Err(e) = self.storage.set(ACTIVE_KEY, &self.active_id) {
            tracing::warn!("failed to persist active draft id: {e}");
        }
    }
}

// Absent, unparseable and empty collections are all "no data": the caller
// falls through to the next initialization stage.
fn load_drafts(storage: &impl Storage) -> Option<Vec<InvoiceDraft>> {
    let raw = storage.get(DRAFTS_KEY)?;
    let drafts: Vec<InvoiceDraft> = match serde_json::from_str(&raw) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!("ignoring unreadable draft collection: {e}");
            return None;
        }
    };
    if drafts.is_empty() { None } else { Some(drafts) }
}

// One-shot migration from the single-invoice format. The legacy keys are
// consumed only when the stored invoice parses.
fn migrate_legacy(storage: &impl Storage) -> Option<Vec<InvoiceDraft>> {
    let raw = storage.get(LEGACY_DRAFT_KEY)?;
    let mut invoice: InvoiceData = match serde_json::from_str(&raw) {
        Ok(i) => i,
        Err(e) => {
            tracing::debug!("ignoring unreadable legacy invoice: {e}");
            return None;
        }
    };
    if invoice.currency == "$" {
        invoice.currency = "USD".to_string();
    }
    let signature = storage.get(LEGACY_SIGNATURE_KEY).filter(|s| !s.is_empty());
    let name = if invoice.invoice_number.is_empty() {
        model::DEFAULT_DRAFT_NAME.to_string()
    } else {
        invoice.invoice_number.clone()
    };
    storage.remove(LEGACY_DRAFT_KEY);
    storage.remove(LEGACY_SIGNATURE_KEY);
    tracing::debug!("migrated legacy single-invoice data into draft {name:?}");
    Some(vec![InvoiceDraft {
        id: model::new_id(),
        name,
        invoice,
        signature,
        updated_at: model::now_millis(),
    }])
}
