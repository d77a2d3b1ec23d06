//! Append-only history of records that have already been notified.
//!
//! The history is a JSON Lines file: one serialized [`Record`] per line.
//! Appending never touches complete lines, so a crash between two appends
//! leaves every completed append on disk.  Only a partial line left by an
//! interrupted append is removed.

use std::{
    collections::HashSet,
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use fs_err::{File, OpenOptions};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::record::Record;

/// What [`SeenStore::load`] does when it meets a line it cannot read.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptPolicy {
    /// Stop at the broken line and use everything read before it.
    /// Entries after the broken line are lost for this run.
    #[default]
    Truncate,
    /// Skip the broken line and keep reading.
    Skip,
    /// Refuse to continue.
    Fail,
}

#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    on_corrupt: CorruptPolicy,
}

impl SeenStore {
    pub fn open(path: impl Into<PathBuf>, on_corrupt: CorruptPolicy) -> Self {
        Self {
            path: path.into(),
            on_corrupt,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole history as a set.  A missing file is an empty history.
    pub fn load(&self) -> Result<HashSet<Record>, SeenStoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Seen store {:?} was not found.  Continuing with an empty history.",
                    self.path
                );
                return Ok(HashSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut seen = HashSet::new();
        for (line_number, line) in (1..).zip(BufReader::new(file).split(b'\n')) {
            let line = line?;
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice::<Record>(&line) {
                Ok(record) => {
                    debug!("Seen record: {record}");
                    seen.insert(record);
                }
                Err(source) => match self.on_corrupt {
                    CorruptPolicy::Truncate => {
                        warn!(
                            "Seen store {:?} is broken at line {line_number} ({source}).  Ignoring this line and everything after it.",
                            self.path
                        );
                        break;
                    }
                    CorruptPolicy::Skip => {
                        warn!(
                            "Seen store {:?} is broken at line {line_number} ({source}).  Skipping this line.",
                            self.path
                        );
                    }
                    CorruptPolicy::Fail => {
                        return Err(SeenStoreError::Corrupt {
                            path: self.path.clone(),
                            line: line_number,
                            source,
                        })
                    }
                },
            }
        }
        info!("Loaded {} seen records from {:?}.", seen.len(), self.path);
        Ok(seen)
    }

    /// Durably adds one record to the end of the history.
    pub fn append(&self, record: &Record) -> Result<(), SeenStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let mut line = vec![];
        // A previous crash may have left a partial line behind.  That write was
        // never acknowledged, so it is cut off instead of being kept as a broken
        // line in the middle of the file.  A complete record that merely lacks
        // its newline is kept.
        let len = file.metadata()?.len();
        let complete = complete_len(&mut file, len)?;
        if complete < len {
            let mut tail = vec![0; (len - complete) as usize];
            file.seek(SeekFrom::Start(complete))?;
            file.read_exact(&mut tail)?;
            if serde_json::from_slice::<Record>(&tail).is_ok() {
                warn!("Seen store {:?} does not end with a newline.", self.path);
                line.push(b'\n');
            } else {
                warn!(
                    "Seen store {:?} ends with a partial line of {} bytes.  Removing it.",
                    self.path,
                    tail.len()
                );
                file.set_len(complete)?;
            }
        }
        serde_json::to_writer(&mut line, record).map_err(SeenStoreError::Serialize)?;
        line.push(b'\n');

        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }
}

/// Offset just past the last newline of a file of length `len`.
fn complete_len(file: &mut File, len: u64) -> io::Result<u64> {
    let mut buffer = [0; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buffer.len() as u64);
        let chunk = &mut buffer[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + i as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

#[derive(Debug, thiserror::Error)]
pub enum SeenStoreError {
    #[error("An I/O error occurred on the seen store: {0}")]
    Io(#[from] io::Error),
    #[error("The seen store {path:?} is corrupted at line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("Failed to serialize a record: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;
    use url::Url;

    use super::{CorruptPolicy, SeenStore, SeenStoreError};
    use crate::record::Record;

    fn record(title: &str, rating: &str) -> Record {
        let link = Url::parse("https://example.com/").unwrap().join(title).unwrap();
        Record::parse(Some(title), Some(rating), Some(link))
            .unwrap()
            .unwrap()
    }

    fn titles(store: &SeenStore) -> Vec<String> {
        let mut ret: Vec<_> = store
            .load()
            .unwrap()
            .into_iter()
            .map(|r| r.title().to_owned())
            .collect();
        ret.sort();
        ret
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = SeenStore::open(dir.path().join("seen.jsonl"), CorruptPolicy::Fail);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load() {
        let dir = tempdir().unwrap();
        let store = SeenStore::open(dir.path().join("nested/seen.jsonl"), Default::default());
        let a = record("Movie A", "4.0/5");
        store.append(&a).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        let loaded = loaded.into_iter().next().unwrap();
        assert_eq!(loaded, a);
        assert_eq!(loaded.link(), a.link());
        assert_eq!(loaded.numeric_rating(), a.numeric_rating());
    }

    #[test]
    fn appends_accumulate_without_rewriting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        let store = SeenStore::open(&path, Default::default());
        store.append(&record("Movie A", "4.0/5")).unwrap();
        let first = fs_err::read_to_string(&path).unwrap();
        store.append(&record("Movie B", "3.5/5")).unwrap();
        let both = fs_err::read_to_string(&path).unwrap();

        assert!(both.starts_with(&first));
        assert_eq!(both.lines().count(), 2);
        assert_eq!(titles(&store), ["Movie A", "Movie B"]);
    }

    #[test]
    fn duplicates_collapse_on_load() {
        let dir = tempdir().unwrap();
        let store = SeenStore::open(dir.path().join("seen.jsonl"), Default::default());
        store.append(&record("Movie A", "4.0/5")).unwrap();
        store.append(&record("Movie A", "4.0/5")).unwrap();
        assert_eq!(titles(&store), ["Movie A"]);
    }

    fn write_corrupted(path: &std::path::Path) {
        let store = SeenStore::open(path, Default::default());
        store.append(&record("Movie A", "4.0/5")).unwrap();
        let mut file = fs_err::OpenOptions::new().append(true).open(path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        drop(file);
        store.append(&record("Movie C", "4.5/5")).unwrap();
    }

    #[test]
    fn corrupted_entry_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        write_corrupted(&path);
        let store = SeenStore::open(&path, CorruptPolicy::Truncate);
        assert_eq!(titles(&store), ["Movie A"]);
    }

    #[test]
    fn corrupted_entry_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        write_corrupted(&path);
        let store = SeenStore::open(&path, CorruptPolicy::Skip);
        assert_eq!(titles(&store), ["Movie A", "Movie C"]);
    }

    #[test]
    fn corrupted_entry_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        write_corrupted(&path);
        let store = SeenStore::open(&path, CorruptPolicy::Fail);
        assert!(matches!(
            store.load(),
            Err(SeenStoreError::Corrupt { line: 2, .. })
        ));
    }

    #[test]
    fn partial_last_line_is_removed_by_the_next_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        let store = SeenStore::open(&path, CorruptPolicy::default());
        store.append(&record("Movie A", "4.0/5")).unwrap();
        let mut file = fs_err::OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, r#"{{"title":"Movie B","disp"#).unwrap();
        drop(file);

        store.append(&record("Movie C", "4.5/5")).unwrap();
        store.append(&record("Movie D", "5/5")).unwrap();
        assert_eq!(titles(&store), ["Movie A", "Movie C", "Movie D"]);
        assert_eq!(fs_err::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[test]
    fn partial_only_line_is_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        fs_err::write(&path, r#"{"title":"Movie B""#).unwrap();
        let store = SeenStore::open(&path, CorruptPolicy::Fail);
        store.append(&record("Movie C", "4.5/5")).unwrap();
        assert_eq!(titles(&store), ["Movie C"]);
    }

    #[test]
    fn complete_last_line_without_newline_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.jsonl");
        let a = serde_json::to_string(&record("Movie A", "4.0/5")).unwrap();
        fs_err::write(&path, a).unwrap();
        let store = SeenStore::open(&path, CorruptPolicy::Fail);
        store.append(&record("Movie C", "4.5/5")).unwrap();
        assert_eq!(titles(&store), ["Movie A", "Movie C"]);
    }
}
