//! Filesystem implementation of the AuditStore trait.
//!
//! Each segment is a JSON-lines file opened with `O_APPEND`. Writes never
//! rewrite earlier bytes. Blocking I/O runs on the tokio blocking pool.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::chain::{chain_hash, GENESIS_HASH};
use crate::error::{AuditError, Result};
use crate::partition::SegmentKey;
use crate::record::{AuditCategory, AuditRecord};
use crate::store::{AuditStore, Segment};

/// Segment files kept open at once. Older days are closed first.
const MAX_OPEN_SEGMENTS: usize = 8;

type SyncFn = fn(&File) -> io::Result<()>;

/// An open segment file and the chain hash of its last record.
struct SegmentWriter {
    file: File,
    last_hash: String,
}

impl SegmentWriter {
    /// Open (or create) a segment and recover its chain position.
    fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let last_hash = recover_last_hash(&file)?;

        // A crash mid-write can leave a partial last line. Terminate it so
        // the next record starts on its own line.
        if !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }

        Ok(Self { file, last_hash })
    }
}

fn recover_last_hash(file: &File) -> io::Result<String> {
    let mut last_hash = GENESIS_HASH.to_string();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if let Ok(record) = serde_json::from_str::<AuditRecord>(&line) {
            if let Some(hash) = record.chain_hash {
                last_hash = hash;
            }
        }
    }
    Ok(last_hash)
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Audit store writing day segments under a root directory.
///
/// Cheap to clone; clones share open writers.
#[derive(Clone)]
pub struct FileAuditStore {
    root: PathBuf,
    sync_writes: bool,
    sync: SyncFn,
    writers: Arc<Mutex<BTreeMap<SegmentKey, SegmentWriter>>>,
}

impl FileAuditStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            sync_writes: false,
            sync: File::sync_data,
            writers: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    /// Call `sync_data` after every append.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_sync_fn(mut self, sync: SyncFn) -> Self {
        self.sync_writes = true;
        self.sync = sync;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn segment_path(&self, key: &SegmentKey) -> PathBuf {
        key.path(&self.root)
    }

    fn append_blocking(&self, key: SegmentKey, mut record: AuditRecord) -> Result<AuditRecord> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| AuditError::WriteFailure("segment writer lock poisoned".into()))?;

        if !writers.contains_key(&key) {
            let writer = SegmentWriter::open(&key.path(&self.root))
                .map_err(|e| AuditError::WriteFailure(format!("{}: {}", key, e)))?;
            while writers.len() >= MAX_OPEN_SEGMENTS {
                writers.pop_first();
            }
            writers.insert(key, writer);
        }
        let writer = writers
            .get_mut(&key)
            .ok_or_else(|| AuditError::WriteFailure(format!("{}: writer missing", key)))?;

        let hash = chain_hash(&writer.last_hash, &record)?;
        record.chain_hash = Some(hash.clone());

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        // One write call per line keeps concurrent readers from seeing a
        // record split across two writes.
        if let Err(e) = writer.file.write_all(&line) {
            writers.remove(&key);
            return Err(AuditError::WriteFailure(format!("{}: {}", key, e)));
        }
        // The line is in the file from here on, so the chain moves forward
        // even if the flush below fails.
        writer.last_hash = hash;

        if self.sync_writes {
            (self.sync)(&writer.file)
                .map_err(|e| AuditError::SyncFailure(format!("{}: {}", key, e)))?;
        }

        Ok(record)
    }

    fn read_blocking(&self, key: SegmentKey) -> Result<Segment> {
        match fs::read_to_string(key.path(&self.root)) {
            Ok(text) => Ok(Segment::parse(key, text.lines())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Segment::empty(key)),
            Err(e) => Err(AuditError::StorageUnavailable(format!("{}: {}", key, e))),
        }
    }

    fn list_blocking(&self, category: AuditCategory) -> Result<Vec<NaiveDate>> {
        let dir = SegmentKey::category_dir(category, &self.root);
        let mut dates = Vec::new();

        for (year, year_dir) in numbered_entries(&dir, false)? {
            for (month, month_dir) in numbered_entries(&year_dir, false)? {
                for (day, _) in numbered_entries(&month_dir, true)? {
                    if let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) {
                        dates.push(date);
                    }
                }
            }
        }

        dates.sort();
        Ok(dates)
    }

    fn prune_blocking(&self, category: AuditCategory, cutoff: NaiveDate) -> Result<usize> {
        let expired: Vec<NaiveDate> = self
            .list_blocking(category)?
            .into_iter()
            .filter(|date| *date < cutoff)
            .collect();

        if let Ok(mut writers) = self.writers.lock() {
            writers.retain(|key, _| key.category != category || key.date >= cutoff);
        }

        let mut removed = 0;
        for date in expired {
            let path = SegmentKey::new(category, date).path(&self.root);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AuditError::StorageUnavailable(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
            // Drop month and year directories once empty; failure usually
            // means they still hold segments.
            if let Some(month_dir) = path.parent() {
                remove_dir_if_empty(month_dir);
                if let Some(year_dir) = month_dir.parent() {
                    remove_dir_if_empty(year_dir);
                }
            }
        }

        Ok(removed)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(FileAuditStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(|e| AuditError::StorageUnavailable(format!("blocking task failed: {}", e)))?
    }
}

fn remove_dir_if_empty(dir: &Path) {
    if let Err(e) = fs::remove_dir(dir) {
        tracing::debug!(dir = %dir.display(), error = %e, "audit directory kept");
    }
}

/// Entries of `dir` whose names are numbers (`2026`, `03`, or `07.jsonl`
/// when `segments` is set). A missing directory has no entries.
fn numbered_entries(dir: &Path, segments: bool) -> Result<Vec<(u32, PathBuf)>> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AuditError::StorageUnavailable(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        }
    };

    let mut found = Vec::new();
    for entry in read {
        let entry =
            entry.map_err(|e| AuditError::StorageUnavailable(format!("{}: {}", dir.display(), e)))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let stem = if segments {
            match name.strip_suffix(".jsonl") {
                Some(stem) => stem,
                None => continue,
            }
        } else {
            name
        };
        if let Ok(n) = stem.parse::<u32>() {
            found.push((n, entry.path()));
        }
    }
    Ok(found)
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn append(&self, category: AuditCategory, record: AuditRecord) -> Result<AuditRecord> {
        let key = SegmentKey::for_timestamp(category, record.timestamp);
        self.blocking(move |store| store.append_blocking(key, record))
            .await
            .map_err(|e| match e {
                AuditError::StorageUnavailable(msg) => AuditError::WriteFailure(msg),
                other => other,
            })
    }

    async fn read_segment(&self, key: &SegmentKey) -> Result<Segment> {
        let key = *key;
        self.blocking(move |store| store.read_blocking(key)).await
    }

    async fn list_segments(&self, category: AuditCategory) -> Result<Vec<NaiveDate>> {
        self.blocking(move |store| store.list_blocking(category))
            .await
    }

    async fn prune_before(&self, category: AuditCategory, cutoff: NaiveDate) -> Result<usize> {
        let removed = self
            .blocking(move |store| store.prune_blocking(category, cutoff))
            .await?;
        if removed > 0 {
            tracing::info!(%category, %cutoff, removed, "pruned audit segments");
        }
        Ok(removed)
    }
}
