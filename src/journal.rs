use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Frames claiming a larger payload are treated as garbage.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append-only event journal.
///
/// Frame layout: `[u32 LE: payload len][bincode Event][u32 LE: crc32(payload)]`.
/// A torn or corrupt tail (crash mid-write) ends replay at the last good frame,
/// and `open` cuts the file back to that frame so later appends stay reachable.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Bytes known to be on disk as whole frames.
    durable_len: u64,
    /// `durable_len` plus everything appended since the last `sync`.
    pending_len: u64,
    appends_since_rewrite: u64,
}

fn write_frame(out: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(payload.len() as u64 + 8)
}

/// `Ok(None)` on clean EOF or a torn frame.
fn read_frame(input: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    fn fill(input: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
        match input.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }

    let mut word = [0u8; 4];
    if !fill(input, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word) as usize;
    if len > MAX_FRAME_LEN {
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    if !fill(input, &mut payload)? || !fill(input, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(Some(payload))
}

/// Every intact event plus the byte length they occupy.
fn scan(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut good_len = 0u64;
    while let Some(payload) = read_frame(&mut reader)? {
        match bincode::deserialize::<Event>(&payload) {
            Ok(event) => {
                good_len += payload.len() as u64 + 8;
                events.push(event);
            }
            Err(_) => break,
        }
    }
    Ok((events, good_len))
}

/// Cut `path` to `len` bytes and reopen it for appending.
fn reopen_at(path: &Path, len: u64) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).write(true).truncate(false).open(path)?;
    if file.metadata()?.len() != len {
        file.set_len(len)?;
        file.sync_all()?;
    }
    drop(file);
    let file = OpenOptions::new().append(true).open(path)?;
    Ok(BufWriter::new(file))
}

impl Journal {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::recover(path)?.0)
    }

    /// Replay `path`, drop any torn tail from the file, and open it for appends.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let (events, good_len) = scan(path)?;
        let journal = Self {
            writer: reopen_at(path, good_len)?,
            path: path.to_path_buf(),
            durable_len: good_len,
            pending_len: good_len,
            appends_since_rewrite: 0,
        };
        Ok((journal, events))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer one event. Nothing is durable until `sync`.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.pending_len += write_frame(&mut self.writer, event)?;
        self.appends_since_rewrite += 1;
        Ok(())
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.durable_len = self.pending_len;
        Ok(())
    }

    /// Throw away everything appended since the last successful `sync`,
    /// including bytes a failed flush may have left in the file.
    pub fn discard_unsynced(&mut self) -> io::Result<()> {
        let stale = std::mem::replace(&mut self.writer, reopen_at(&self.path, self.durable_len)?);
        // Drop the buffered bytes without flushing them.
        let _ = stale.into_parts();
        self.pending_len = self.durable_len;
        Ok(())
    }

    pub fn appends_since_rewrite(&self) -> u64 {
        self.appends_since_rewrite
    }

    /// Replace the journal with `events`: write a sibling temp file, fsync, rename over.
    pub fn rewrite(&mut self, events: &[Event]) -> io::Result<()> {
        self.writer.flush()?;
        let tmp = self.path.with_extension("journal.tmp");
        let mut written = 0;
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for event in events {
                written += write_frame(&mut out, event)?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        self.writer = reopen_at(&self.path, written)?;
        self.durable_len = written;
        self.pending_len = written;
        self.appends_since_rewrite = 0;
        Ok(())
    }

    /// Read every intact event. A missing file is an empty journal.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        Ok(scan(path)?.0)
    }
}
