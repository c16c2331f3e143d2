use crate::model::{AlertEnablement, AlertLevel, OptionData, OwnerId, SentMarker, Ticker};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert marker already recorded: {ticker} level {level}")]
    AlreadyExists { ticker: Ticker, level: AlertLevel },
    #[error("no tracked position for {0}")]
    NotFound(Ticker),
    #[error("store io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Record store for positions, alert enablement and sent markers. `owner = None`
/// reads across every owner (the scheduled refresh does this).
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn positions(&self, owner: Option<&OwnerId>) -> Result<Vec<OptionData>, StoreError>;
    async fn upsert_position(&self, position: &OptionData) -> Result<(), StoreError>;
    async fn delete_position(&self, owner: &OwnerId, ticker: &Ticker) -> Result<(), StoreError>;
    async fn alert_enablement(
        &self,
        owner: Option<&OwnerId>,
    ) -> Result<Vec<AlertEnablement>, StoreError>;
    async fn set_alert_enabled(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
        enabled: bool,
    ) -> Result<(), StoreError>;
    async fn sent_markers(&self, owner: Option<&OwnerId>) -> Result<Vec<SentMarker>, StoreError>;
    /// Fails with [`StoreError::AlreadyExists`] instead of overwriting.
    async fn insert_sent_marker(&self, marker: &SentMarker) -> Result<(), StoreError>;
    async fn delete_sent_markers(&self, owner: &OwnerId, ticker: &Ticker)
        -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub positions: Vec<OptionData>,
    #[serde(default)]
    pub enablement: Vec<AlertEnablement>,
    #[serde(default)]
    pub markers: BTreeSet<SentMarker>,
}

impl StoreState {
    fn positions(&self, owner: Option<&OwnerId>) -> Vec<OptionData> {
        self.positions
            .iter()
            .filter(|p| owner.map_or(true, |o| &p.owner == o))
            .cloned()
            .collect()
    }

    fn upsert_position(&mut self, position: &OptionData) {
        match self
            .positions
            .iter_mut()
            .find(|p| p.owner == position.owner && p.ticker == position.ticker)
        {
            Some(existing) => *existing = position.clone(),
            None => self.positions.push(position.clone()),
        }
    }

    fn delete_position(&mut self, owner: &OwnerId, ticker: &Ticker) {
        self.positions
            .retain(|p| !(&p.owner == owner && &p.ticker == ticker));
        self.enablement
            .retain(|e| !(&e.owner == owner && &e.ticker == ticker));
        self.delete_markers(owner, ticker);
    }

    fn enablement(&self, owner: Option<&OwnerId>) -> Vec<AlertEnablement> {
        self.enablement
            .iter()
            .filter(|e| owner.map_or(true, |o| &e.owner == o))
            .cloned()
            .collect()
    }

    fn set_enabled(&mut self, owner: &OwnerId, ticker: &Ticker, enabled: bool) {
        match self
            .enablement
            .iter_mut()
            .find(|e| &e.owner == owner && &e.ticker == ticker)
        {
            Some(existing) => existing.enabled = enabled,
            None => self.enablement.push(AlertEnablement {
                owner: owner.clone(),
                ticker: ticker.clone(),
                enabled,
            }),
        }
    }

    fn markers(&self, owner: Option<&OwnerId>) -> Vec<SentMarker> {
        self.markers
            .iter()
            .filter(|m| owner.map_or(true, |o| &m.owner == o))
            .cloned()
            .collect()
    }

    fn insert_marker(&mut self, marker: &SentMarker) -> Result<(), StoreError> {
        if !self.markers.insert(marker.clone()) {
            return Err(StoreError::AlreadyExists {
                ticker: marker.ticker.clone(),
                level: marker.level,
            });
        }
        Ok(())
    }

    fn delete_markers(&mut self, owner: &OwnerId, ticker: &Ticker) {
        self.markers
            .retain(|m| !(&m.owner == owner && &m.ticker == ticker));
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn positions(&self, owner: Option<&OwnerId>) -> Result<Vec<OptionData>, StoreError> {
        Ok(self.state.lock().positions(owner))
    }

    async fn upsert_position(&self, position: &OptionData) -> Result<(), StoreError> {
        self.state.lock().upsert_position(position);
        Ok(())
    }

    async fn delete_position(&self, owner: &OwnerId, ticker: &Ticker) -> Result<(), StoreError> {
        self.state.lock().delete_position(owner, ticker);
        Ok(())
    }

    async fn alert_enablement(
        &self,
        owner: Option<&OwnerId>,
    ) -> Result<Vec<AlertEnablement>, StoreError> {
        Ok(self.state.lock().enablement(owner))
    }

    async fn set_alert_enabled(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
        enabled: bool,
    ) -> Result<(), StoreError> {
        self.state.lock().set_enabled(owner, ticker, enabled);
        Ok(())
    }

    async fn sent_markers(&self, owner: Option<&OwnerId>) -> Result<Vec<SentMarker>, StoreError> {
        Ok(self.state.lock().markers(owner))
    }

    async fn insert_sent_marker(&self, marker: &SentMarker) -> Result<(), StoreError> {
        self.state.lock().insert_marker(marker)
    }

    async fn delete_sent_markers(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
    ) -> Result<(), StoreError> {
        self.state.lock().delete_markers(owner, ticker);
        Ok(())
    }
}

/// Single-file JSON store for the command line. Every mutation rewrites the file
/// through a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&tmp, data).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(target: "store", path = ?self.path, positions = state.positions.len(), "store written");
        Ok(())
    }
}

#[async_trait]
impl PositionStore for JsonFileStore {
    async fn positions(&self, owner: Option<&OwnerId>) -> Result<Vec<OptionData>, StoreError> {
        Ok(self.state.lock().positions(owner))
    }

    async fn upsert_position(&self, position: &OptionData) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.upsert_position(position);
            Ok(())
        })
    }

    async fn delete_position(&self, owner: &OwnerId, ticker: &Ticker) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.delete_position(owner, ticker);
            Ok(())
        })
    }

    async fn alert_enablement(
        &self,
        owner: Option<&OwnerId>,
    ) -> Result<Vec<AlertEnablement>, StoreError> {
        Ok(self.state.lock().enablement(owner))
    }

    async fn set_alert_enabled(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
        enabled: bool,
    ) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.set_enabled(owner, ticker, enabled);
            Ok(())
        })
    }

    async fn sent_markers(&self, owner: Option<&OwnerId>) -> Result<Vec<SentMarker>, StoreError> {
        Ok(self.state.lock().markers(owner))
    }

    async fn insert_sent_marker(&self, marker: &SentMarker) -> Result<(), StoreError> {
        self.mutate(|state| state.insert_marker(marker))
    }

    async fn delete_sent_markers(
        &self,
        owner: &OwnerId,
        ticker: &Ticker,
    ) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.delete_markers(owner, ticker);
            Ok(())
        })
    }
}
