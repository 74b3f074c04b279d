//! Append-only entry log.
//!
//! Every write is one self-checking frame; a frame is the unit of
//! transaction. A write counts as committed once its frame is on disk and
//! `sync_data` returned.

use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for entry frames.
const FRAME_MAGIC: &[u8; 4] = b"ENT\0";

/// Current frame format version.
const FRAME_VERSION: u8 = 1;

/// Fixed header size: magic + version + op + seq + key length.
const FRAME_HEADER_SIZE: u64 = 4 + 1 + 1 + 8 + 2;

/// What a frame does to its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrameOp {
    /// Store the payload under the key.
    Put,
    /// Remove the key.
    Delete,
}

impl FrameOp {
    fn to_byte(self) -> u8 {
        match self {
            FrameOp::Put => 0,
            FrameOp::Delete => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(FrameOp::Put),
            1 => Ok(FrameOp::Delete),
            other => Err(StoreError::InvalidFormat(format!("Unknown frame op: {}", other))),
        }
    }
}

/// One decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Frame {
    pub op: FrameOp,
    pub seq: u64,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Position and content of a frame found while scanning.
pub(crate) struct ScannedFrame {
    pub offset: u64,
    pub frame: Frame,
}

/// Append-only frame log backed by one file.
pub(crate) struct EntryLog {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: Mutex<File>,

    /// Current file size (next append offset).
    file_size: Mutex<u64>,

    /// Next transaction sequence to assign.
    next_seq: Mutex<u64>,
}

impl EntryLog {
    /// Open or create the log, returning every committed frame in order.
    ///
    /// A frame cut short at the end of the file is discarded and the file
    /// truncated to the last complete frame. A damaged frame followed by
    /// more data is reported as corruption.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<ScannedFrame>)> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let total = file.metadata()?.len();
        let (frames, valid_len) = Self::scan(&file, total)?;

        if valid_len < total {
            warn!(
                path = %path.display(),
                discarded = total - valid_len,
                "Discarding torn tail of entry log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        let next_seq = frames.last().map_or(1, |f| f.frame.seq + 1);
        debug!(path = %path.display(), frames = frames.len(), "Entry log opened");

        Ok((
            Self {
                path,
                file: Mutex::new(file),
                file_size: Mutex::new(valid_len),
                next_seq: Mutex::new(next_seq),
            },
            frames,
        ))
    }

    /// Append one frame and wait until it is durable.
    ///
    /// Returns the frame offset and its transaction sequence.
    pub fn append(&self, op: FrameOp, key: &str, payload: &[u8]) -> Result<(u64, u64)> {
        let mut file = self.file.lock();
        let mut size = self.file_size.lock();
        let mut next_seq = self.next_seq.lock();

        let seq = *next_seq;
        let bytes = encode_frame(op, seq, key, payload)?;

        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_data()) {
            // roll back whatever part of the frame reached the file
            let _ = file.set_len(offset);
            return Err(e.into());
        }

        *size = offset + bytes.len() as u64;
        *next_seq = seq + 1;

        Ok((offset, seq))
    }

    /// Read the frame at `offset`.
    pub fn read_at(&self, offset: u64) -> Result<Frame> {
        let mut file = self.file.lock();
        let available = self.file_size.lock().saturating_sub(offset);
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(&mut *file);
        let (frame, _) = read_frame(&mut reader, available).map_err(|e| match e {
            StoreError::Io(e) if e.kind() == ErrorKind::UnexpectedEof => StoreError::Corruption(
                format!("Entry frame at offset {} runs past the end of the log: {}", offset, e),
            ),
            other => other,
        })?;
        Ok(frame)
    }

    /// Current file size.
    pub fn size(&self) -> u64 {
        *self.file_size.lock()
    }

    /// Replace the log with `frames`, keeping their sequence numbers.
    ///
    /// The new log is written beside the old one, synced, then renamed over
    /// it. Returns the new offset of each frame, in input order.
    pub fn rewrite(&self, frames: &[Frame]) -> Result<Vec<u64>> {
        let mut file = self.file.lock();
        let mut size = self.file_size.lock();

        let tmp_path = self.path.with_extension("log.compact");
        let mut offsets = Vec::with_capacity(frames.len());
        {
            let mut tmp = File::create(&tmp_path)?;
            let mut written = 0u64;
            for frame in frames {
                let bytes = encode_frame(frame.op, frame.seq, &frame.key, &frame.payload)?;
                tmp.write_all(&bytes)?;
                offsets.push(written);
                written += bytes.len() as u64;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let reopened = OpenOptions::new().read(true).write(true).open(&self.path)?;
        *size = reopened.metadata()?.len();
        *file = reopened;

        Ok(offsets)
    }

    /// Read frames from the start, stopping at the first incomplete one.
    fn scan(file: &File, total: u64) -> Result<(Vec<ScannedFrame>, u64)> {
        let mut handle = file.try_clone()?;
        handle.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(handle);

        let mut frames = Vec::new();
        let mut offset = 0u64;

        while offset < total {
            match read_frame(&mut reader, total - offset) {
                Ok((frame, len)) => {
                    frames.push(ScannedFrame { offset, frame });
                    offset += len;
                }
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(StoreError::ChecksumMismatch { expected, got }) => {
                    let end = offset + frame_len_at(file, offset)?;
                    if end >= total {
                        // last frame never finished flushing
                        break;
                    }
                    return Err(StoreError::Corruption(format!(
                        "Entry frame at offset {} failed its checksum (expected {:08x}, got {:08x})",
                        offset, expected, got
                    )));
                }
                Err(e) => {
                    return Err(StoreError::Corruption(format!(
                        "Unreadable entry frame at offset {}: {}",
                        offset, e
                    )))
                }
            }
        }

        Ok((frames, offset))
    }
}

/// Serialize one frame.
fn encode_frame(op: FrameOp, seq: u64, key: &str, payload: &[u8]) -> Result<Vec<u8>> {
    let key_bytes = key.as_bytes();
    let key_len = u16::try_from(key_bytes.len())
        .map_err(|_| StoreError::InvalidFormat(format!("Entry id too long: {} bytes", key_bytes.len())))?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| StoreError::InvalidFormat(format!("Entry too large: {} bytes", payload.len())))?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE as usize + key_bytes.len() + 4 + payload.len() + 4);

    // Magic
    buf.extend_from_slice(FRAME_MAGIC);

    // Version
    buf.push(FRAME_VERSION);

    // Op
    buf.push(op.to_byte());

    // Transaction sequence
    buf.extend_from_slice(&seq.to_le_bytes());

    // Key
    buf.extend_from_slice(&key_len.to_le_bytes());
    buf.extend_from_slice(key_bytes);

    // Payload
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(payload);

    // Checksum over op, seq, key and payload
    buf.extend_from_slice(&frame_checksum(op, seq, key_bytes, payload).to_le_bytes());

    Ok(buf)
}

fn frame_checksum(op: FrameOp, seq: u64, key: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[op.to_byte()]);
    hasher.update(&seq.to_le_bytes());
    hasher.update(key);
    hasher.update(payload);
    hasher.finalize()
}

/// Read one frame of at most `available` bytes, returning it with its
/// encoded length.
///
/// Length fields that point past `available` fail with `UnexpectedEof`
/// before anything is allocated.
fn read_frame<R: Read>(reader: &mut R, available: u64) -> Result<(Frame, u64)> {
    // Magic
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != FRAME_MAGIC {
        return Err(StoreError::InvalidFormat("Invalid entry frame magic".into()));
    }

    // Version
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != FRAME_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "Unsupported entry frame version: {}",
            version[0]
        )));
    }

    // Op
    let mut op_byte = [0u8; 1];
    reader.read_exact(&mut op_byte)?;
    let op = FrameOp::from_byte(op_byte[0])?;

    // Sequence
    let mut seq_bytes = [0u8; 8];
    reader.read_exact(&mut seq_bytes)?;
    let seq = u64::from_le_bytes(seq_bytes);

    // Key
    let mut key_len_bytes = [0u8; 2];
    reader.read_exact(&mut key_len_bytes)?;
    let key_len = u16::from_le_bytes(key_len_bytes) as usize;
    check_fits(FRAME_HEADER_SIZE + key_len as u64 + 4, available)?;
    let mut key_bytes = vec![0u8; key_len];
    reader.read_exact(&mut key_bytes)?;

    // Payload
    let mut payload_len_bytes = [0u8; 4];
    reader.read_exact(&mut payload_len_bytes)?;
    let payload_len = u32::from_le_bytes(payload_len_bytes) as usize;
    check_fits(
        FRAME_HEADER_SIZE + key_len as u64 + 4 + payload_len as u64 + 4,
        available,
    )?;
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    // Checksum
    let mut checksum_bytes = [0u8; 4];
    reader.read_exact(&mut checksum_bytes)?;
    let stored_checksum = u32::from_le_bytes(checksum_bytes);
    let computed_checksum = frame_checksum(op, seq, &key_bytes, &payload);
    if stored_checksum != computed_checksum {
        return Err(StoreError::ChecksumMismatch {
            expected: stored_checksum,
            got: computed_checksum,
        });
    }

    let key = String::from_utf8(key_bytes)
        .map_err(|e| StoreError::InvalidFormat(format!("Entry id is not UTF-8: {}", e)))?;

    let len = FRAME_HEADER_SIZE + key_len as u64 + 4 + payload_len as u64 + 4;
    Ok((
        Frame {
            op,
            seq,
            key,
            payload,
        },
        len,
    ))
}

fn check_fits(needed: u64, available: u64) -> Result<()> {
    if needed > available {
        return Err(StoreError::Io(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("frame needs {} bytes but only {} remain", needed, available),
        )));
    }
    Ok(())
}

/// Encoded length of the frame at `offset`, from its length fields alone.
fn frame_len_at(file: &File, offset: u64) -> Result<u64> {
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset + FRAME_HEADER_SIZE - 2))?;

    let mut key_len_bytes = [0u8; 2];
    file.read_exact(&mut key_len_bytes)?;
    let key_len = u16::from_le_bytes(key_len_bytes) as u64;

    file.seek(SeekFrom::Current(key_len as i64))?;
    let mut payload_len_bytes = [0u8; 4];
    file.read_exact(&mut payload_len_bytes)?;
    let payload_len = u32::from_le_bytes(payload_len_bytes) as u64;

    Ok(FRAME_HEADER_SIZE + key_len + 4 + payload_len + 4)
}
