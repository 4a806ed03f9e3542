//! # Debug tabs
//!
//! An ordered set of open debug tabs plus an active-tab pointer, persisted
//! to a [`StateStorage`] after every change.
//!
//! - At capacity, creating a tab evicts the oldest one (index 0), whatever
//!   state it holds.
//! - Operations on an unknown tab id are ignored.
//! - Closing the active tab activates the tab that moved into its slot, or
//!   the new last tab, or nothing when the set is empty.
//! - Restoring never fails: unreadable state yields an empty store and a
//!   [`RestoreStatus`] saying why.

mod tab;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use tab::{ConfigPane, DEFAULT_TAB_NAME, DebugTab, DebugTicket, TabId, TabMeta, TabSeed, TabUiState};

use crate::collections::InterfaceId;
use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::http::request::RequestPatch;
use crate::http::response::DebugResult;
use crate::storage::StateStorage;

/// Outcome of the last write of the session to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    NotPersisted,
    Saved,
    Failed(String),
}

impl PersistStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PersistStatus::Failed(_))
    }
}

/// Outcome of loading the session from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStatus {
    /// Nothing was stored under the key.
    Missing,
    Restored { tabs: usize },
    /// Stored data was unusable and has been ignored.
    Corrupt(String),
    /// Storage itself could not be read.
    Unavailable(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRef<'a> {
    tabs: &'a [DebugTab],
    active_tab_id: Option<&'a TabId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    tabs: Vec<DebugTab>,
    #[serde(default)]
    active_tab_id: Option<TabId>,
}

/// Session state for the open debug tabs.
pub struct TabStore {
    tabs: Vec<DebugTab>,
    active: Option<TabId>,
    storage: Box<dyn StateStorage>,
    config: SessionConfig,
    last_persist: PersistStatus,
    last_restore: RestoreStatus,
}

impl TabStore {
    /// Create the store and restore whatever the storage holds.
    pub fn open(storage: impl StateStorage + 'static, config: SessionConfig) -> Self {
        let mut store = Self {
            tabs: Vec::new(),
            active: None,
            storage: Box::new(storage),
            config,
            last_persist: PersistStatus::NotPersisted,
            last_restore: RestoreStatus::Missing,
        };
        store.restore();
        store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tabs(&self) -> &[DebugTab] {
        &self.tabs
    }

    pub fn tab(&self, id: &TabId) -> Option<&DebugTab> {
        self.tabs.iter().find(|tab| &tab.id == id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tabs.len() >= self.config.max_tabs()
    }

    pub fn active_tab_id(&self) -> Option<&TabId> {
        self.active.as_ref()
    }

    pub fn active_tab(&self) -> Option<&DebugTab> {
        self.active.as_ref().and_then(|id| self.tab(id))
    }

    pub fn find_by_interface(&self, interface_id: InterfaceId) -> Option<&DebugTab> {
        self.tabs
            .iter()
            .find(|tab| tab.interface_id == Some(interface_id))
    }

    pub fn last_persist_status(&self) -> &PersistStatus {
        &self.last_persist
    }

    pub fn last_restore_status(&self) -> &RestoreStatus {
        &self.last_restore
    }

    /// Open a new tab and make it active, evicting the oldest tab if full.
    pub fn create_tab(&mut self, seed: TabSeed) -> TabId {
        while self.is_full() && !self.tabs.is_empty() {
            let evicted = self.tabs.remove(0);
            info!(tab_id = %evicted.id, name = %evicted.name, "tab limit reached, closed oldest tab");
            if self.active.as_ref() == Some(&evicted.id) {
                self.active = None;
            }
        }

        let id = self.fresh_id();
        self.tabs.push(DebugTab::from_seed(id.clone(), seed));
        self.active = Some(id.clone());
        debug!(tab_id = %id, "created tab");
        self.persist();
        id
    }

    /// Activate the tab bound to `interface_id`, or open one from `seed`.
    pub fn open_or_activate(&mut self, interface_id: InterfaceId, seed: TabSeed) -> TabId {
        if let Some(id) = self.find_by_interface(interface_id).map(|tab| tab.id.clone()) {
            self.activate(&id);
            return id;
        }
        self.create_tab(TabSeed {
            interface_id: Some(interface_id),
            ..seed
        })
    }

    /// Merge `patch` into the tab's request.
    pub fn update_request(&mut self, id: &TabId, patch: RequestPatch) -> bool {
        let Some(tab) = self.tab_mut(id) else {
            return false;
        };
        patch.apply_to(&mut tab.request);
        tab.touch();
        self.persist();
        true
    }

    /// Replace the tab's result, or clear it with `None`.
    pub fn set_result(&mut self, id: &TabId, result: Option<DebugResult>) -> bool {
        let Some(tab) = self.tab_mut(id) else {
            return false;
        };
        tab.result = result;
        tab.touch();
        self.persist();
        true
    }

    pub fn clear_result(&mut self, id: &TabId) -> bool {
        self.set_result(id, None)
    }

    pub fn update_ui_state(&mut self, id: &TabId, ui: TabUiState) -> bool {
        let Some(tab) = self.tab_mut(id) else {
            return false;
        };
        tab.ui = ui;
        tab.touch();
        self.persist();
        true
    }

    /// Rename a tab, move it to another module or bind it to a saved
    /// interface. Refused when another tab is already bound to that interface.
    pub fn update_meta(&mut self, id: &TabId, meta: TabMeta) -> bool {
        if let Some(interface_id) = meta.interface_id {
            if self
                .find_by_interface(interface_id)
                .is_some_and(|tab| &tab.id != id)
            {
                debug!(tab_id = %id, interface_id, "interface already open in another tab");
                return false;
            }
        }
        let Some(tab) = self.tab_mut(id) else {
            return false;
        };
        if let Some(name) = meta.name {
            tab.name = name;
        }
        if let Some(module) = meta.module {
            tab.module = Some(module);
        }
        if let Some(interface_id) = meta.interface_id {
            tab.interface_id = Some(interface_id);
        }
        tab.touch();
        self.persist();
        true
    }

    pub fn activate(&mut self, id: &TabId) -> bool {
        if self.tab(id).is_none() {
            return false;
        }
        if self.active.as_ref() != Some(id) {
            self.active = Some(id.clone());
            self.persist();
        }
        true
    }

    /// Remove a tab. Returns it, or `None` if the id is unknown.
    pub fn close(&mut self, id: &TabId) -> Option<DebugTab> {
        let index = self.tabs.iter().position(|tab| &tab.id == id)?;
        let closed = self.tabs.remove(index);

        if self.active.as_ref() == Some(id) {
            // The tab that shifted into the closed slot, else the new last one.
            self.active = self
                .tabs
                .get(index)
                .or_else(|| self.tabs.last())
                .map(|tab| tab.id.clone());
        }
        debug!(tab_id = %closed.id, "closed tab");
        self.persist();
        Some(closed)
    }

    pub fn clear_all(&mut self) {
        self.tabs.clear();
        self.active = None;
        self.persist();
    }

    /// Capture what is needed to debug a tab, for [`record`](Self::record)
    /// once the call completes.
    pub fn ticket(
        &self,
        id: &TabId,
        project_id: Option<i64>,
        environment_id: Option<i64>,
    ) -> Option<DebugTicket> {
        let tab = self.tab(id)?;
        Some(DebugTicket {
            tab_id: tab.id.clone(),
            interface_id: tab.interface_id,
            request: tab.request.clone(),
            project_id,
            environment_id,
        })
    }

    /// Store the outcome of a debug call on the tab it was issued for.
    ///
    /// Errors are handed back untouched and leave the tab's previous result
    /// in place. A result for a tab closed in the meantime is dropped.
    pub fn record(
        &mut self,
        ticket: &DebugTicket,
        outcome: Result<DebugResult, ApiError>,
    ) -> Result<(), ApiError> {
        let result = outcome?;
        if !self.set_result(&ticket.tab_id, Some(result)) {
            debug!(tab_id = %ticket.tab_id, "tab closed before its result arrived");
        }
        Ok(())
    }

    /// Write the session to storage. Failures are logged and reported in
    /// the returned status, never raised.
    pub fn persist(&mut self) -> PersistStatus {
        let snapshot = SessionRef {
            tabs: &self.tabs,
            active_tab_id: self.active.as_ref(),
        };
        let status = match serde_json::to_string(&snapshot) {
            Ok(json) => match self.storage.save(&self.config.storage_key, &json) {
                Ok(()) => PersistStatus::Saved,
                Err(err) => PersistStatus::Failed(err.to_string()),
            },
            Err(err) => PersistStatus::Failed(err.to_string()),
        };
        if let PersistStatus::Failed(reason) = &status {
            warn!(key = %self.config.storage_key, %reason, "failed to persist tabs");
        }
        self.last_persist = status.clone();
        status
    }

    /// Replace the in-memory session with what storage holds.
    pub fn restore(&mut self) -> RestoreStatus {
        self.tabs.clear();
        self.active = None;

        let status = match self.storage.load(&self.config.storage_key) {
            Ok(None) => RestoreStatus::Missing,
            Ok(Some(json)) => match self.load_session(&json) {
                Ok(tabs) => RestoreStatus::Restored { tabs },
                Err(reason) => {
                    warn!(key = %self.config.storage_key, %reason, "stored tabs are unusable, starting empty");
                    RestoreStatus::Corrupt(reason)
                }
            },
            Err(err) => {
                warn!(key = %self.config.storage_key, error = %err, "failed to read stored tabs, starting empty");
                RestoreStatus::Unavailable(err.to_string())
            }
        };
        self.last_restore = status.clone();
        status
    }

    /// Drop every tab and remove the stored session, e.g. on logout.
    pub fn shutdown(&mut self) -> PersistStatus {
        self.tabs.clear();
        self.active = None;
        let status = match self.storage.remove(&self.config.storage_key) {
            Ok(()) => PersistStatus::Saved,
            Err(err) => {
                warn!(key = %self.config.storage_key, error = %err, "failed to remove stored tabs");
                PersistStatus::Failed(err.to_string())
            }
        };
        self.last_persist = status.clone();
        status
    }

    fn load_session(&mut self, json: &str) -> Result<usize, String> {
        let stored: StoredSession = serde_json::from_str(json).map_err(|err| err.to_string())?;

        let mut seen = HashSet::new();
        if let Some(duplicate) = stored.tabs.iter().find(|tab| !seen.insert(&tab.id)) {
            return Err(format!("duplicate tab id `{}`", duplicate.id));
        }

        let mut tabs = stored.tabs;
        let excess = tabs.len().saturating_sub(self.config.max_tabs());
        if excess > 0 {
            info!(excess, "stored tabs exceed the limit, dropping the oldest");
            tabs.drain(..excess);
        }

        self.active = stored
            .active_tab_id
            .filter(|id| tabs.iter().any(|tab| &tab.id == id));
        self.tabs = tabs;
        Ok(self.tabs.len())
    }

    fn tab_mut(&mut self, id: &TabId) -> Option<&mut DebugTab> {
        self.tabs.iter_mut().find(|tab| &tab.id == id)
    }

    fn fresh_id(&self) -> TabId {
        loop {
            let id = TabId::generate();
            if self.tab(&id).is_none() {
                return id;
            }
        }
    }
}
