use crate::domain::{Mutation, MutationRecord, PersistenceError, SequenceNumber};
use crate::ports::outbound::MutationLog;
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::now_millis;

/// Log file inside the log directory.
pub const LOG_FILE_NAME: &str = "mutations.log";

/// Lock file guarding the log directory.
pub const LOCK_FILE_NAME: &str = "LOCK";

/// `[len: u32 LE][crc32: u32 LE]`
const FRAME_HEADER_LEN: usize = 8;

/// Upper bound on one encoded record.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Exclusive lock on a log directory, released on drop.
struct LogLock {
    file: File,
    path: PathBuf,
}

impl LogLock {
    fn acquire(dir: &Path) -> Result<Self, PersistenceError> {
        let path = dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| PersistenceError::Locked {
                path: path.display().to_string(),
            })?;

        // Holder's PID, for operators.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Self { file, path })
    }
}

impl Drop for LogLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("[fg-group-admin] failed to release {}: {}", self.path.display(), e);
        }
    }
}

struct LogState {
    file: File,
    last_sequence: SequenceNumber,
    /// Length of the valid prefix; every append starts here.
    len: u64,
    /// Set when a partial frame could not be cut off.
    poisoned: Option<String>,
}

impl LogState {
    fn append(&mut self, frame: &[u8]) -> Result<(), PersistenceError> {
        if let Some(reason) = &self.poisoned {
            return Err(PersistenceError::Poisoned(reason.clone()));
        }

        let valid_len = self.len;
        let written = self
            .file
            .seek(SeekFrom::Start(valid_len))
            .and_then(|_| self.file.write_all(frame))
            .and_then(|()| self.file.sync_data());
        let Err(e) = written else {
            self.len += frame.len() as u64;
            return Ok(());
        };

        // Cut any partial frame so the next append starts clean.
        if let Err(rollback) = self.file.set_len(valid_len) {
            let reason =
                format!("append failed ({e}); truncate to {valid_len} failed ({rollback})");
            error!("[fg-group-admin] mutation log poisoned: {}", reason);
            self.poisoned = Some(reason.clone());
            return Err(PersistenceError::Poisoned(reason));
        }
        Err(e.into())
    }
}

/// Append-only, checksummed mutation log on local disk.
///
/// Each record is one frame: `[len: u32 LE][crc32: u32 LE][bincode record]`.
/// Every append is followed by `fsync`. On open, a final frame that runs
/// past the end of the file (a torn write) is cut off; a complete frame
/// with a bad checksum fails with `Corrupted`.
///
/// One writer per directory, enforced with an exclusive `LOCK` file.
pub struct FileMutationLog {
    state: Arc<Mutex<LogState>>,
    path: PathBuf,
    _lock: LogLock,
}

impl FileMutationLog {
    /// Open or create the log in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::open_blocking(&dir))
            .await
            .map_err(|e| PersistenceError::Unavailable(format!("open task failed: {e}")))?
    }

    fn open_blocking(dir: &Path) -> Result<Self, PersistenceError> {
        fs::create_dir_all(dir)?;
        let lock = LogLock::acquire(dir)?;

        let path = dir.join(LOG_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (records, valid_len) = decode_frames(&bytes)?;

        if valid_len < bytes.len() as u64 {
            warn!(
                "[fg-group-admin] discarding {} byte torn tail of {}",
                bytes.len() as u64 - valid_len,
                path.display()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        let last_sequence = records
            .last()
            .map(|r| r.sequence)
            .unwrap_or(SequenceNumber::ZERO);

        info!(
            "[fg-group-admin] opened mutation log {} ({} records, last sequence {})",
            path.display(),
            records.len(),
            last_sequence
        );

        Ok(Self {
            state: Arc::new(Mutex::new(LogState {
                file,
                last_sequence,
                len: valid_len,
                poisoned: None,
            })),
            path,
            _lock: lock,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MutationLog for FileMutationLog {
    async fn commit(&self, mutation: Mutation) -> Result<MutationRecord, PersistenceError> {
        let state = Arc::clone(&self.state);

        tokio::task::spawn_blocking(move || {
            let mut state = state.lock();
            let record = MutationRecord {
                sequence: state.last_sequence.next(),
                mutation,
                committed_at_ms: now_millis(),
            };
            let frame = encode_frame(&record)?;
            state.append(&frame)?;
            state.last_sequence = record.sequence;
            Ok(record)
        })
        .await
        .map_err(|e| PersistenceError::Unavailable(format!("commit task failed: {e}")))?
    }

    async fn load_all(&self) -> Result<Vec<MutationRecord>, PersistenceError> {
        let state = Arc::clone(&self.state);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            // Hold the state lock so no append is half-visible.
            let state = state.lock();
            let mut bytes = Vec::new();
            File::open(&path)?.read_to_end(&mut bytes)?;
            bytes.truncate(usize::try_from(state.len).unwrap_or(usize::MAX));
            let (records, _) = decode_frames(&bytes)?;
            Ok(records)
        })
        .await
        .map_err(|e| PersistenceError::Unavailable(format!("load task failed: {e}")))?
    }

    async fn last_sequence(&self) -> Result<SequenceNumber, PersistenceError> {
        Ok(self.state.lock().last_sequence)
    }
}

fn encode_frame(record: &MutationRecord) -> Result<Vec<u8>, PersistenceError> {
    let payload = bincode::serialize(record)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(PersistenceError::Serialization(format!(
            "record of {} bytes exceeds frame limit",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| PersistenceError::Serialization("record too large".to_string()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

/// Decode frames from the start of `bytes`.
///
/// Returns the records and the length of the valid prefix. Bytes after the
/// prefix belong to a frame that runs past the end of the input.
fn decode_frames(bytes: &[u8]) -> Result<(Vec<MutationRecord>, u64), PersistenceError> {
    let mut records: Vec<MutationRecord> = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < FRAME_HEADER_LEN {
            break;
        }

        let len = read_u32_le(bytes, offset) as usize;
        let checksum = read_u32_le(bytes, offset + 4);
        if len > MAX_FRAME_LEN {
            return Err(PersistenceError::Corrupted {
                offset: offset as u64,
                reason: format!("frame length {len} exceeds limit"),
            });
        }
        if remaining - FRAME_HEADER_LEN < len {
            break;
        }

        let start = offset + FRAME_HEADER_LEN;
        let payload = &bytes[start..start + len];
        if crc32fast::hash(payload) != checksum {
            return Err(PersistenceError::Corrupted {
                offset: offset as u64,
                reason: "checksum mismatch".to_string(),
            });
        }

        let record: MutationRecord =
            bincode::deserialize(payload).map_err(|e| PersistenceError::Corrupted {
                offset: offset as u64,
                reason: format!("undecodable record: {e}"),
            })?;

        if let Some(prev) = records.last() {
            if record.sequence <= prev.sequence {
                return Err(PersistenceError::Corrupted {
                    offset: offset as u64,
                    reason: format!(
                        "sequence {} does not follow {}",
                        record.sequence, prev.sequence
                    ),
                });
            }
        }

        records.push(record);
        offset = start + len;
    }

    Ok((records, offset as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupName, NodeId};
    use tempfile::TempDir;

    fn add(name: &str) -> Mutation {
        Mutation::AddGroup {
            name: GroupName::new(name).unwrap(),
        }
    }

    fn move_server(addr: &str, target: &str) -> Mutation {
        Mutation::MoveServers {
            servers: [NodeId::parse(addr).unwrap()].into_iter().collect(),
            target: GroupName::new(target).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let log = FileMutationLog::open(dir.path()).await.unwrap();
            log.commit(add("analytics")).await.unwrap();
            log.commit(move_server("10.0.0.5:9000", "analytics"))
                .await
                .unwrap();
        }

        let log = FileMutationLog::open(dir.path()).await.unwrap();
        let records = log.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mutation, add("analytics"));
        assert_eq!(log.last_sequence().await.unwrap(), SequenceNumber(2));

        let next = log.commit(add("batch")).await.unwrap();
        assert_eq!(next.sequence, SequenceNumber(3));
    }

    #[tokio::test]
    async fn test_torn_tail_is_discarded() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join(LOG_FILE_NAME);
        {
            let log = FileMutationLog::open(dir.path()).await.unwrap();
            log.commit(add("a")).await.unwrap();
        }
        let good_len = fs::metadata(&log_path).unwrap().len();

        // Header promising 100 bytes, followed by only 3.
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&0u32.to_le_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        drop(file);

        let log = FileMutationLog::open(dir.path()).await.unwrap();
        assert_eq!(fs::metadata(&log_path).unwrap().len(), good_len);
        assert_eq!(log.load_all().await.unwrap().len(), 1);

        let record = log.commit(add("b")).await.unwrap();
        assert_eq!(record.sequence, SequenceNumber(2));
        assert_eq!(log.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_short_header_tail_is_discarded() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join(LOG_FILE_NAME);
        {
            let log = FileMutationLog::open(dir.path()).await.unwrap();
            log.commit(add("a")).await.unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&[7, 7]).unwrap();
        drop(file);

        let log = FileMutationLog::open(dir.path()).await.unwrap();
        assert_eq!(log.last_sequence().await.unwrap(), SequenceNumber(1));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_corruption() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join(LOG_FILE_NAME);
        {
            let log = FileMutationLog::open(dir.path()).await.unwrap();
            log.commit(add("a")).await.unwrap();
            log.commit(add("b")).await.unwrap();
        }

        let mut bytes = fs::read(&log_path).unwrap();
        let last = bytes.len() - 1;
        bytes[FRAME_HEADER_LEN] ^= 0xFF;
        bytes[last] ^= 0x01;
        fs::write(&log_path, &bytes).unwrap();

        let result = FileMutationLog::open(dir.path()).await;
        assert!(matches!(
            result,
            Err(PersistenceError::Corrupted { offset: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_second_writer_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let first = FileMutationLog::open(dir.path()).await.unwrap();

        let second = FileMutationLog::open(dir.path()).await;
        assert!(matches!(second, Err(PersistenceError::Locked { .. })));

        drop(first);
        assert!(FileMutationLog::open(dir.path()).await.is_ok());
    }

    #[test]
    fn test_decode_rejects_non_increasing_sequence() {
        let record = MutationRecord {
            sequence: SequenceNumber(5),
            mutation: add("a"),
            committed_at_ms: 1,
        };
        let frame = encode_frame(&record).unwrap();
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&frame);

        let result = decode_frames(&bytes);
        assert!(matches!(
            result,
            Err(PersistenceError::Corrupted { offset, .. }) if offset == frame.len() as u64
        ));
    }

    #[tokio::test]
    async fn test_append_starts_at_valid_prefix() {
        let dir = TempDir::new().unwrap();
        {
            let log = FileMutationLog::open(dir.path()).await.unwrap();
            log.commit(add("a")).await.unwrap();

            // Leave the file cursor past the end, as a failed write can.
            let good_len = log.state.lock().len;
            log.state
                .lock()
                .file
                .seek(SeekFrom::Start(good_len + 50))
                .unwrap();

            log.commit(add("b")).await.unwrap();
        }

        let log = FileMutationLog::open(dir.path()).await.unwrap();
        let records = log.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].mutation, add("b"));
    }

    #[tokio::test]
    async fn test_poisoned_log_refuses_commits() {
        let dir = TempDir::new().unwrap();
        {
            let log = FileMutationLog::open(dir.path()).await.unwrap();
            log.commit(add("a")).await.unwrap();
            log.state.lock().poisoned = Some("truncate failed".to_string());

            let err = log.commit(add("b")).await.unwrap_err();
            assert_eq!(err, PersistenceError::Poisoned("truncate failed".to_string()));
            assert!(!err.is_transient());
            assert_eq!(log.last_sequence().await.unwrap(), SequenceNumber(1));
        }

        // Reopening clears the poison and keeps every acknowledged record.
        let log = FileMutationLog::open(dir.path()).await.unwrap();
        assert_eq!(log.load_all().await.unwrap().len(), 1);
        assert_eq!(log.commit(add("b")).await.unwrap().sequence, SequenceNumber(2));
    }

    #[test]
    fn test_decode_empty_input() {
        let (records, len) = decode_frames(&[]).unwrap();
        assert!(records.is_empty());
        assert_eq!(len, 0);
    }
}
