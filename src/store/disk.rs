// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Disk-based store built from append-only JSON journals
//!
//! Each namespace is one file of JSON lines. The first line is a header
//! carrying the journal format version; every following line is one put.
//! Loading replays the journal, later lines replacing earlier ones for the
//! same key. A torn final line (crash mid-write) is dropped with a warning,
//! and a journal whose header line never completed counts as empty. Either
//! way the next put cuts the torn bytes before writing.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{KeyValueStore, OrderedStore, Store};
use crate::errors::StoreError;

/// Current journal format version
const JOURNAL_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct JournalHeader {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry<K, V> {
    key: K,
    value: V,
}

/// Durable [`Store`] keeping one journal file per namespace under a root
/// directory
///
/// A put returns once its line has been written and synced to disk.
///
/// # Examples
///
/// ```rust,ignore
/// use eventfold::store::{DiskStore, Store};
///
/// let store = DiskStore::open("./data").await?;
/// let checkpoints = store.ordered("checkpoints/0xabc");
/// // ./data/ordered.checkpoints~2f0xabc.jsonl
/// ```
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
    handles: std::sync::Mutex<Handles>,
    closed: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Handles {
    ordered: HashMap<String, Arc<DiskOrdered>>,
    keyed: HashMap<String, Arc<DiskKeyed>>,
}

impl DiskStore {
    /// Opens a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        debug!(path = %root.display(), "Opened disk store");

        Ok(Self {
            root,
            handles: std::sync::Mutex::default(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Journal file of `namespace`
    ///
    /// Bytes other than ASCII alphanumerics, `-` and `_` are written as
    /// `~xx`, so distinct namespaces never share a file and none escapes the
    /// root.
    fn journal_path(&self, kind: &str, namespace: &str) -> PathBuf {
        let mut file_name = String::with_capacity(namespace.len());
        for byte in namespace.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file_name.push(char::from(byte));
            } else {
                file_name.push_str(&format!("~{byte:02x}"));
            }
        }
        self.root.join(format!("{kind}.{file_name}.jsonl"))
    }
}

#[async_trait]
impl Store for DiskStore {
    fn ordered(&self, namespace: &str) -> Arc<dyn OrderedStore> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles
            .ordered
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(DiskOrdered {
                    journal: Mutex::new(Journal::new(self.journal_path("ordered", namespace))),
                    closed: self.closed.clone(),
                })
            })
            .clone()
    }

    fn keyed(&self, namespace: &str) -> Arc<dyn KeyValueStore> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles
            .keyed
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(DiskKeyed {
                    journal: Mutex::new(Journal::new(self.journal_path("keyed", namespace))),
                    closed: self.closed.clone(),
                })
            })
            .clone()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);

        let (ordered, keyed): (Vec<_>, Vec<_>) = {
            let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            (
                handles.ordered.values().cloned().collect(),
                handles.keyed.values().cloned().collect(),
            )
        };
        for handle in ordered {
            handle.journal.lock().await.close().await?;
        }
        for handle in keyed {
            handle.journal.lock().await.close().await?;
        }

        info!(path = %self.root.display(), "Closed disk store");
        Ok(())
    }
}

/// One journal file plus its replayed contents
#[derive(Debug)]
struct Journal<M> {
    path: PathBuf,
    entries: Option<M>,
    writer: Option<File>,
}

impl<M> Journal<M> {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: None,
            writer: None,
        }
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .await
                .map_err(|e| StoreError::io(&self.path, e))?;
        }
        Ok(())
    }

    async fn append<K: Serialize, V: Serialize>(
        &mut self,
        key: &K,
        value: &V,
    ) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&JournalEntry { key, value })?;
        line.push(b'\n');

        if self.writer.is_none() {
            self.writer = Some(self.open_writer().await?);
        }
        let written = match self.writer.as_mut() {
            Some(writer) => write_synced(writer, &line).await,
            None => Ok(()),
        };

        if let Err(e) = written {
            // Part of the line may be on disk: reopen and replay before the
            // next put so the torn bytes are cut first
            self.writer = None;
            self.entries = None;
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }

    async fn open_writer(&self) -> Result<File, StoreError> {
        let existing = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        // Cut a torn final line so the next entry starts on a fresh line
        let complete = existing
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        if complete < existing.len() {
            warn!(
                path = %self.path.display(),
                dropped_bytes = existing.len() - complete,
                "Truncating torn journal tail"
            );
            file.set_len(complete as u64)
                .await
                .map_err(|e| StoreError::io(&self.path, e))?;
        }

        if complete == 0 {
            let mut header = serde_json::to_vec(&JournalHeader {
                version: JOURNAL_VERSION,
            })?;
            header.push(b'\n');
            file.write_all(&header)
                .await
                .map_err(|e| StoreError::io(&self.path, e))?;
        }

        Ok(file)
    }
}

async fn write_synced(writer: &mut File, line: &[u8]) -> std::io::Result<()> {
    writer.write_all(line).await?;
    writer.flush().await?;
    writer.sync_data().await
}

impl<M: Default> Journal<M> {
    /// Replays the journal into `M` on first use
    async fn load<K, V>(&mut self, mut apply: impl FnMut(&mut M, K, V)) -> Result<&mut M, StoreError>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        if self.entries.is_none() {
            let mut entries = M::default();
            for (key, value) in replay::<K, V>(&self.path).await? {
                apply(&mut entries, key, value);
            }
            self.entries = Some(entries);
        }
        Ok(self.entries.get_or_insert_with(M::default))
    }
}

async fn replay<K, V>(path: &Path) -> Result<Vec<(K, V)>, StoreError>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let header_complete = text.contains('\n');
    let mut lines = text.lines();
    if let Some(first) = lines.next() {
        match serde_json::from_str::<JournalHeader>(first) {
            Ok(header) if header.version != JOURNAL_VERSION => {
                return Err(StoreError::io(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "journal version {} is not supported (expected {JOURNAL_VERSION})",
                            header.version
                        ),
                    ),
                ));
            }
            Ok(_) => {}
            Err(e) if !header_complete => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Journal header is torn, treating journal as empty"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let lines: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
    let mut entries = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        match serde_json::from_str::<JournalEntry<K, V>>(line) {
            Ok(entry) => entries.push((entry.key, entry.value)),
            Err(e) if i + 1 == lines.len() => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Dropping torn final journal line"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    debug!(path = %path.display(), entries = entries.len(), "Replayed journal");
    Ok(entries)
}

#[derive(Debug)]
struct DiskOrdered {
    journal: Mutex<Journal<BTreeMap<u64, Value>>>,
    closed: Arc<AtomicBool>,
}

impl DiskOrdered {
    fn insert(map: &mut BTreeMap<u64, Value>, key: u64, value: Value) {
        map.insert(key, value);
    }
}

#[async_trait]
impl OrderedStore for DiskOrdered {
    async fn put(&self, key: u64, value: Value) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        let mut journal = self.journal.lock().await;
        journal.load(Self::insert).await?;
        journal.append(&key, &value).await?;
        journal.load(Self::insert).await?.insert(key, value);
        Ok(())
    }

    async fn get(&self, key: u64, exact: bool) -> Result<Option<(u64, Value)>, StoreError> {
        let mut journal = self.journal.lock().await;
        let entries = journal.load(Self::insert).await?;
        let entry = if exact {
            entries.get_key_value(&key)
        } else {
            entries.range(..=key).next_back()
        };
        Ok(entry.map(|(k, v)| (*k, v.clone())))
    }

    async fn newest(&self) -> Result<Option<(u64, Value)>, StoreError> {
        let mut journal = self.journal.lock().await;
        let entries = journal.load(Self::insert).await?;
        Ok(entries.last_key_value().map(|(k, v)| (*k, v.clone())))
    }
}

#[derive(Debug)]
struct DiskKeyed {
    journal: Mutex<Journal<HashMap<String, String>>>,
    closed: Arc<AtomicBool>,
}

impl DiskKeyed {
    fn insert(map: &mut HashMap<String, String>, key: String, value: String) {
        map.insert(key, value);
    }
}

#[async_trait]
impl KeyValueStore for DiskKeyed {
    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        let mut journal = self.journal.lock().await;
        Ok(journal.load(Self::insert).await?.contains_key(key))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        let mut journal = self.journal.lock().await;
        journal.load(Self::insert).await?;
        journal.append(&key, &value).await?;
        journal
            .load(Self::insert)
            .await?
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut journal = self.journal.lock().await;
        Ok(journal.load(Self::insert).await?.get(key).cloned())
    }
}
