// store.rs — Append-only JSONL feedback journal.
//
// One journal per (environment, agent) pair, stored at
// `<data_dir>/<environment>/<agent>.jsonl`: one Outcome per line, so the
// file can be tailed and grepped while agents are running.
//
// All appends go through a single mutex-guarded file handle. Each record is
// serialized in memory and written with one unbuffered write, so a failed
// append never leaves bytes behind to be flushed with a later record. The
// sequence number is assigned inside the lock, so sequence order is file
// order. Snapshots take the same lock before re-reading the file and never
// observe a half-written record from this process.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::FeedbackError;
use crate::outcome::Outcome;

/// Options controlling how a store writes to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Call `sync_data` after every append. Slower, but a committed outcome
    /// survives power loss, not just a process crash.
    pub sync_writes: bool,
}

/// The committed content of a journal at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Outcomes in file order (oldest first).
    pub outcomes: Vec<Outcome>,
    /// Complete lines that could not be parsed as an Outcome.
    pub corrupt_records: usize,
}

struct WriterState {
    /// `None` once the store has been closed.
    file: Option<File>,
    next_sequence: u64,
    /// Set when a write stopped after some bytes reached the file; the next
    /// append starts on a fresh line so the partial record cannot swallow it.
    dirty: bool,
}

/// A durable, concurrency-safe outcome journal for one agent in one
/// environment.
///
/// `FeedbackStore` is `Send + Sync`: share it behind an `Arc` and append
/// from as many threads as needed.
pub struct FeedbackStore {
    path: PathBuf,
    agent: String,
    environment: String,
    options: StoreOptions,
    state: Mutex<WriterState>,
}

impl FeedbackStore {
    /// Open (or create) the journal for `agent` in `environment` under
    /// `data_dir`, with default options.
    pub fn open(
        agent: &str,
        environment: &str,
        data_dir: impl AsRef<Path>,
    ) -> Result<Self, FeedbackError> {
        Self::open_with(agent, environment, data_dir, StoreOptions::default())
    }

    /// Open (or create) a journal with explicit options.
    ///
    /// Existing content is scanned to recover the next sequence number. If
    /// the file ends in an unterminated line (a crash mid-write), a newline
    /// is written first so the fragment stays isolated on its own line.
    pub fn open_with(
        agent: &str,
        environment: &str,
        data_dir: impl AsRef<Path>,
        options: StoreOptions,
    ) -> Result<Self, FeedbackError> {
        validate_key("agent", agent)?;
        validate_key("environment", environment)?;

        let dir = data_dir.as_ref().join(environment);
        fs::create_dir_all(&dir).map_err(|source| FeedbackError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(format!("{}.jsonl", agent));

        let (last_sequence, torn) = if path.exists() {
            recover(&path)?
        } else {
            (0, false)
        };

        // Append mode: existing records are never overwritten.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| FeedbackError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        if torn {
            tracing::warn!(path = %path.display(), "journal ends in a torn record; isolating it");
            file.write_all(b"\n").map_err(|source| FeedbackError::Io {
                path: path.clone(),
                source,
            })?;
        }

        tracing::info!(
            path = %path.display(),
            next_sequence = last_sequence + 1,
            "opened feedback journal"
        );

        Ok(Self {
            path,
            agent: agent.to_string(),
            environment: environment.to_string(),
            options,
            state: Mutex::new(WriterState {
                file: Some(file),
                next_sequence: last_sequence + 1,
                dirty: false,
            }),
        })
    }

    /// Append an outcome to the journal.
    ///
    /// Assigns `outcome.sequence` and writes one line. On a write error the
    /// sequence number is not consumed and the record is not retried. If the
    /// line was written but `sync_data` failed, the record is in the journal
    /// and its sequence number stays taken.
    pub fn append(&self, outcome: &mut Outcome) -> Result<(), FeedbackError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let file = state.file.as_mut().ok_or_else(|| FeedbackError::Closed {
            path: self.path.clone(),
        })?;

        outcome.sequence = state.next_sequence;
        let mut line = Vec::new();
        if state.dirty {
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, outcome)?;
        line.push(b'\n');

        let (written, result) = write_record(file, &line);
        if let Err(source) = result {
            state.dirty |= written > 0;
            return Err(FeedbackError::Io {
                path: self.path.clone(),
                source,
            });
        }
        state.dirty = false;
        state.next_sequence += 1;

        if self.options.sync_writes {
            file.sync_data().map_err(|source| FeedbackError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Read every committed outcome, including those written by earlier
    /// processes.
    pub fn snapshot(&self) -> Result<Snapshot, FeedbackError> {
        let guard = self.lock();
        let bytes = fs::read(&self.path).map_err(|source| FeedbackError::Io {
            path: self.path.clone(),
            source,
        })?;
        drop(guard);

        let (snapshot, _) = parse_journal(&bytes);
        if snapshot.corrupt_records > 0 {
            tracing::warn!(
                path = %self.path.display(),
                corrupt = snapshot.corrupt_records,
                "skipped corrupt journal records"
            );
        }
        Ok(snapshot)
    }

    /// Release the file handle. Later appends fail with
    /// [`FeedbackError::Closed`]; closing twice is a no-op.
    pub fn close(&self) -> Result<(), FeedbackError> {
        let file = self.lock().file.take();
        match file {
            Some(file) => {
                if self.options.sync_writes {
                    file.sync_all().map_err(|source| FeedbackError::Io {
                        path: self.path.clone(),
                        source,
                    })?;
                }
                tracing::info!(path = %self.path.display(), "closed feedback journal");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().file.is_none()
    }

    /// Read any journal file without opening it for writing.
    ///
    /// Safe to call from a second process while an agent is appending: an
    /// unterminated trailing line is treated as not yet committed.
    pub fn read_journal(path: impl AsRef<Path>) -> Result<Snapshot, FeedbackError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| FeedbackError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(parse_journal(&bytes).0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    // A panic while holding the lock cannot leave a half-updated state:
    // the sequence only advances after a successful write.
    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FeedbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackStore")
            .field("path", &self.path)
            .field("agent", &self.agent)
            .field("environment", &self.environment)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Write `line` with unbuffered writes, reporting how many bytes reached
/// the file even when the write fails part-way.
fn write_record(file: &mut impl Write, line: &[u8]) -> (usize, io::Result<()>) {
    let mut written = 0;
    while written < line.len() {
        match file.write(&line[written..]) {
            Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (written, Err(e)),
        }
    }
    (written, Ok(()))
}

/// Agent and environment names become path components.
fn validate_key(field: &'static str, value: &str) -> Result<(), FeedbackError> {
    let bad = value.trim().is_empty()
        || value.contains(['/', '\\', '\0'])
        || value == "."
        || value.contains("..");
    if bad {
        return Err(FeedbackError::InvalidKey {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Scan an existing journal: the highest sequence number in use, and
/// whether the file ends in an unterminated line.
fn recover(path: &Path) -> Result<(u64, bool), FeedbackError> {
    let bytes = fs::read(path).map_err(|source| FeedbackError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let (snapshot, tail) = parse_journal(&bytes);

    let mut last = snapshot
        .outcomes
        .iter()
        .map(|o| o.sequence)
        .max()
        .unwrap_or(0);

    // A complete record that only lost its newline becomes committed once
    // the newline is written, so its sequence is taken too.
    if let Some(tail) = tail {
        if let Ok(outcome) = serde_json::from_slice::<Outcome>(tail) {
            last = last.max(outcome.sequence);
        }
    }

    if snapshot.corrupt_records > 0 {
        tracing::warn!(
            path = %path.display(),
            corrupt = snapshot.corrupt_records,
            "journal contains corrupt records"
        );
    }
    Ok((last, tail.is_some()))
}

/// Split journal bytes into committed records and an optional unterminated
/// tail. Blank lines are skipped; complete lines that fail to parse are
/// counted as corrupt.
fn parse_journal(bytes: &[u8]) -> (Snapshot, Option<&[u8]>) {
    let mut snapshot = Snapshot::default();

    let (complete, tail) = match bytes.iter().rposition(|&b| b == b'\n') {
        Some(end) => (&bytes[..end], &bytes[end + 1..]),
        None => (&bytes[..0], bytes),
    };

    for line in complete.split(|&b| b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Outcome>(line) {
            Ok(outcome) => snapshot.outcomes.push(outcome),
            Err(_) => snapshot.corrupt_records += 1,
        }
    }

    let tail = if tail.is_empty() { None } else { Some(tail) };
    (snapshot, tail)
}
