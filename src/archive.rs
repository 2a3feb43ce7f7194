//! Append-only store of crawl records, one namespace per target.
//!
//! Records are ordered by [`CrawlKey`] alone; creation times inside the
//! stored text and filesystem metadata play no part in baseline selection.

use crate::error::{Error, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const KEY_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";
const KEY_TIME_LEN: usize = 15;
const RECORD_PREFIX: &str = "crawl_";
const RECORD_SUFFIX: &str = ".txt";

/// Highest sequence suffix tried for crawls started within the same second
pub const MAX_KEY_SEQUENCE: u32 = 99;

/// Sortable key of a crawl record: `YYYYMMDD_HHMMSS` with an optional `_NN` suffix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CrawlKey(String);

impl CrawlKey {
    pub fn from_time(time: &NaiveDateTime) -> Self {
        CrawlKey(time.format(KEY_TIME_FORMAT).to_string())
    }

    /// Validate a key read back from storage
    pub fn parse(s: &str) -> Result<Self> {
        let (time, sequence) = match s.split_at_checked(KEY_TIME_LEN) {
            Some(parts) => parts,
            None => return Err(Error::Config(format!("invalid crawl key `{}`", s))),
        };
        NaiveDateTime::parse_from_str(time, KEY_TIME_FORMAT)
            .map_err(|_| Error::Config(format!("invalid crawl key `{}`", s)))?;

        let valid_sequence = sequence.is_empty()
            || (sequence.len() == 3
                && sequence.starts_with('_')
                && sequence[1..].bytes().all(|b| b.is_ascii_digit()));
        if !valid_sequence {
            return Err(Error::Config(format!("invalid crawl key `{}`", s)));
        }
        Ok(CrawlKey(s.to_string()))
    }

    /// Same second, distinguished by a sequence number
    pub fn with_sequence(&self, sequence: u32) -> Self {
        CrawlKey(format!("{}_{:02}", &self.0[..KEY_TIME_LEN], sequence))
    }

    /// Crawl start time encoded in the key
    pub fn time(&self) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&self.0[..KEY_TIME_LEN], KEY_TIME_FORMAT)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CrawlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CrawlKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CrawlKey::parse(&value)
    }
}

impl From<CrawlKey> for String {
    fn from(key: CrawlKey) -> Self {
        key.0
    }
}

/// Formatted text of one complete crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRecord {
    /// Archive namespace derived from the start URL
    pub target: String,
    pub key: CrawlKey,
    /// Crawl start, second resolution
    pub created_at: NaiveDateTime,
    /// Concatenated page entries
    pub content: String,
}

impl CrawlRecord {
    pub fn new(target: &str, created_at: NaiveDateTime, content: String) -> Self {
        let created_at = created_at.with_nanosecond(0).unwrap_or(created_at);
        Self {
            target: target.to_string(),
            key: CrawlKey::from_time(&created_at),
            created_at,
            content,
        }
    }

    /// Record stamped with the current local time
    pub fn now(target: &str, content: String) -> Self {
        Self::new(target, Local::now().naive_local(), content)
    }

    /// Same record under a sequence-suffixed key
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.key = self.key.with_sequence(sequence);
        self
    }
}

/// Storage of crawl records
pub trait SnapshotArchive {
    /// Store a record under its key; an existing key is a [`Error::KeyCollision`]
    fn append(&mut self, record: &CrawlRecord) -> Result<CrawlKey>;

    /// Record stored under exactly this key
    fn get(&self, target: &str, key: &CrawlKey) -> Result<Option<CrawlRecord>>;

    /// Keys of a target in ascending order
    fn list(&self, target: &str) -> Result<Vec<CrawlKey>>;

    /// Greatest record of the target whose key is strictly below `key`
    fn most_recent_before(&self, target: &str, key: &CrawlKey) -> Result<Option<CrawlRecord>> {
        let previous = self
            .list(target)?
            .into_iter()
            .rev()
            .find(|candidate| candidate < key);
        match previous {
            Some(previous) => self.get(target, &previous),
            None => Ok(None),
        }
    }
}

/// Store a record, moving to the next free sequence suffix on collisions
pub fn append_unique<A: SnapshotArchive + ?Sized>(
    archive: &mut A,
    record: CrawlRecord,
) -> Result<CrawlRecord> {
    let mut candidate = record.clone();
    let mut sequence = 0;
    loop {
        match archive.append(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(Error::KeyCollision { key, .. }) if sequence < MAX_KEY_SEQUENCE => {
                sequence += 1;
                ::log::warn!("Crawl key {} already taken, retrying with suffix {:02}", key, sequence);
                candidate = record.clone().with_sequence(sequence);
            }
            Err(e) => return Err(e),
        }
    }
}

/// In-process archive
#[derive(Debug, Default)]
pub struct MemoryArchive {
    targets: BTreeMap<String, BTreeMap<CrawlKey, CrawlRecord>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotArchive for MemoryArchive {
    fn append(&mut self, record: &CrawlRecord) -> Result<CrawlKey> {
        let records = self.targets.entry(record.target.clone()).or_default();
        if records.contains_key(&record.key) {
            return Err(Error::KeyCollision {
                target: record.target.clone(),
                key: record.key.to_string(),
            });
        }
        records.insert(record.key.clone(), record.clone());
        Ok(record.key.clone())
    }

    fn get(&self, target: &str, key: &CrawlKey) -> Result<Option<CrawlRecord>> {
        Ok(self
            .targets
            .get(target)
            .and_then(|records| records.get(key))
            .cloned())
    }

    fn list(&self, target: &str) -> Result<Vec<CrawlKey>> {
        Ok(self
            .targets
            .get(target)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn most_recent_before(&self, target: &str, key: &CrawlKey) -> Result<Option<CrawlRecord>> {
        Ok(self
            .targets
            .get(target)
            .and_then(|records| records.range(..key.clone()).next_back())
            .map(|(_, record)| record.clone()))
    }
}

/// Archive laid out as `<root>/<target>/crawl_<key>.txt`
#[derive(Debug, Clone)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_dir(&self, target: &str) -> PathBuf {
        self.root.join(target)
    }

    fn record_path(&self, target: &str, key: &CrawlKey) -> PathBuf {
        self.target_dir(target)
            .join(format!("{}{}{}", RECORD_PREFIX, key, RECORD_SUFFIX))
    }
}

impl SnapshotArchive for DirArchive {
    fn append(&mut self, record: &CrawlRecord) -> Result<CrawlKey> {
        fs::create_dir_all(self.target_dir(&record.target))?;
        let path = self.record_path(&record.target, &record.key);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::KeyCollision {
                    target: record.target.clone(),
                    key: record.key.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        write_or_remove(&path, file, record.content.as_bytes())?;

        ::log::info!("Archived crawl {} at {}", record.key, path.display());
        Ok(record.key.clone())
    }

    fn get(&self, target: &str, key: &CrawlKey) -> Result<Option<CrawlRecord>> {
        let path = self.record_path(target, key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(CrawlRecord {
                target: target.to_string(),
                key: key.clone(),
                created_at: key.time(),
                content,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, target: &str) -> Result<Vec<CrawlKey>> {
        let entries = match fs::read_dir(self.target_dir(target)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(key) = name
                .strip_prefix(RECORD_PREFIX)
                .and_then(|rest| rest.strip_suffix(RECORD_SUFFIX))
            else {
                continue;
            };
            match CrawlKey::parse(key) {
                Ok(key) => keys.push(key),
                Err(_) => ::log::debug!("Ignoring foreign file {} in archive", name),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Write a freshly created record file, deleting it again if the write fails
fn write_or_remove<W: Write>(path: &Path, mut file: W, content: &[u8]) -> Result<()> {
    let written = file.write_all(content).and_then(|()| file.flush());
    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            ::log::error!("Failed to remove partial record {}: {}", path.display(), remove_err);
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    /// Accepts a few bytes, then fails like a full disk
    struct FullDisk {
        accepted: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.accepted >= 4 {
                return Err(std::io::Error::new(ErrorKind::StorageFull, "no space left"));
            }
            let n = buf.len().min(4 - self.accepted);
            self.accepted += n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn exercise_baseline_selection(archive: &mut dyn SnapshotArchive) {
        let first = CrawlRecord::new("shop", at(9, 0, 0), "first".into());
        let second = CrawlRecord::new("shop", at(10, 0, 0), "second".into());
        let third = CrawlRecord::new("shop", at(11, 0, 0), "third".into());
        let other = CrawlRecord::new("other", at(10, 30, 0), "other".into());

        archive.append(&first).unwrap();
        assert_eq!(archive.most_recent_before("shop", &first.key).unwrap(), None);

        archive.append(&second).unwrap();
        archive.append(&other).unwrap();
        archive.append(&third).unwrap();

        let baseline = archive.most_recent_before("shop", &third.key).unwrap().unwrap();
        assert_eq!(baseline.key, second.key);
        assert_eq!(baseline.content, "second");

        let baseline = archive.most_recent_before("shop", &second.key).unwrap().unwrap();
        assert_eq!(baseline.key, first.key);

        assert_eq!(
            archive.list("shop").unwrap(),
            vec![first.key.clone(), second.key.clone(), third.key.clone()]
        );
        assert_eq!(archive.most_recent_before("other", &other.key).unwrap(), None);
    }

    #[test]
    fn test_key_format_and_order() {
        let key = CrawlKey::from_time(&at(9, 5, 7));
        assert_eq!(key.as_str(), "20250517_090507");
        assert_eq!(key.time(), at(9, 5, 7));

        let sequenced = key.with_sequence(1);
        assert_eq!(sequenced.as_str(), "20250517_090507_01");
        assert!(key < sequenced);
        assert!(sequenced < CrawlKey::from_time(&at(9, 5, 8)));
        assert_eq!(sequenced.with_sequence(2).as_str(), "20250517_090507_02");
    }

    #[test]
    fn test_key_parse() {
        assert!(CrawlKey::parse("20250517_090507").is_ok());
        assert!(CrawlKey::parse("20250517_090507_12").is_ok());
        assert!(CrawlKey::parse("20250517_0905").is_err());
        assert!(CrawlKey::parse("20251317_090507").is_err());
        assert!(CrawlKey::parse("20250517_090507-1").is_err());
        assert!(CrawlKey::parse("20250517_090507_1x").is_err());
    }

    #[test]
    fn test_record_truncates_to_seconds() {
        let time = at(9, 0, 0).with_nanosecond(750_000_000).unwrap();
        let record = CrawlRecord::new("shop", time, String::new());
        assert_eq!(record.created_at, at(9, 0, 0));
    }

    #[test]
    fn test_memory_baseline_selection() {
        exercise_baseline_selection(&mut MemoryArchive::new());
    }

    #[test]
    fn test_dir_baseline_selection() {
        let tmp = TempDir::new().unwrap();
        exercise_baseline_selection(&mut DirArchive::new(tmp.path()));
    }

    #[test]
    fn test_memory_collision_detected() {
        let mut archive = MemoryArchive::new();
        let record = CrawlRecord::new("shop", at(9, 0, 0), "first".into());
        archive.append(&record).unwrap();

        let clash = CrawlRecord::new("shop", at(9, 0, 0), "second".into());
        assert!(matches!(archive.append(&clash), Err(Error::KeyCollision { .. })));
        assert_eq!(archive.get("shop", &record.key).unwrap().unwrap().content, "first");
    }

    #[test]
    fn test_dir_collision_detected() {
        let tmp = TempDir::new().unwrap();
        let mut archive = DirArchive::new(tmp.path());
        let record = CrawlRecord::new("shop", at(9, 0, 0), "first".into());
        archive.append(&record).unwrap();

        let clash = CrawlRecord::new("shop", at(9, 0, 0), "second".into());
        assert!(matches!(archive.append(&clash), Err(Error::KeyCollision { .. })));
        assert_eq!(archive.get("shop", &record.key).unwrap().unwrap().content, "first");
    }

    #[test]
    fn test_append_unique_uses_sequence() {
        let mut archive = MemoryArchive::new();
        let first = append_unique(&mut archive, CrawlRecord::new("shop", at(9, 0, 0), "a".into())).unwrap();
        let second = append_unique(&mut archive, CrawlRecord::new("shop", at(9, 0, 0), "b".into())).unwrap();
        let third = append_unique(&mut archive, CrawlRecord::new("shop", at(9, 0, 0), "c".into())).unwrap();

        assert_eq!(first.key.as_str(), "20250517_090000");
        assert_eq!(second.key.as_str(), "20250517_090000_01");
        assert_eq!(third.key.as_str(), "20250517_090000_02");

        let baseline = archive.most_recent_before("shop", &third.key).unwrap().unwrap();
        assert_eq!(baseline.content, "b");
    }

    #[test]
    fn test_dir_round_trip_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let mut archive = DirArchive::new(tmp.path());
        let content = "URL: https://shop.example.com\nTitle: Shop\n\n- Only 2 left — 50% off\r\n  trailing  \n".to_string();
        let record = CrawlRecord::new("shop_example_com", at(12, 0, 0), content.clone());

        let key = archive.append(&record).unwrap();
        let loaded = archive.get("shop_example_com", &key).unwrap().unwrap();
        assert_eq!(loaded.content.as_bytes(), content.as_bytes());
        assert_eq!(loaded.created_at, record.created_at);
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_dir_list_ignores_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let mut archive = DirArchive::new(root);
        let record = CrawlRecord::new("shop", at(9, 0, 0), "a".into());
        archive.append(&record).unwrap();
        fs::write(root.join("shop").join("notes.txt"), "x").unwrap();
        fs::write(root.join("shop").join("crawl_latest.txt"), "x").unwrap();

        assert_eq!(archive.list("shop").unwrap(), vec![record.key]);
        assert!(archive.list("missing").unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_leaves_no_record() {
        let tmp = TempDir::new().unwrap();
        let mut archive = DirArchive::new(tmp.path());
        let record = CrawlRecord::new("shop", at(9, 0, 0), "complete".into());
        archive.append(&record).unwrap();

        let partial = CrawlRecord::new("shop", at(10, 0, 0), "truncated content".into());
        let path = archive.record_path("shop", &partial.key);
        fs::write(&path, "").unwrap();

        let result = write_or_remove(&path, FullDisk { accepted: 0 }, partial.content.as_bytes());
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!path.exists());
        assert_eq!(archive.list("shop").unwrap(), vec![record.key.clone()]);
        assert_eq!(archive.most_recent_before("shop", &partial.key).unwrap().unwrap().key, record.key);
    }
}
