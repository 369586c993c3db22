//! Command channel reader
//!
//! Non-blocking reader over the side channel (a named pipe). Each call to
//! [`CommandChannel::poll`] does one bounded read; whatever it returns is
//! one command record. Anything still in the pipe afterwards is drained
//! and dropped so a burst of writes is never replayed on later iterations.

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{HostError, HostResult};

/// Size of the command read buffer; one byte is reserved, as a record is
/// at most `READ_BUFFER_SIZE - 1` bytes
pub const READ_BUFFER_SIZE: usize = 256;

/// Scratch size for draining backlog
const DRAIN_BUFFER_SIZE: usize = 4096;

/// Upper bound on drain reads per poll (16 × 4 KiB = default pipe capacity)
///
/// Backlog beyond this bound stays in the pipe and is read as the next record.
const MAX_DRAIN_READS: usize = 16;

/// How to open the pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Block in `open` until a writer connects
    WaitForWriter,
    /// Return immediately even with no writer attached
    Immediate,
}

/// One burst read from the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    raw: Vec<u8>,
    text: String,
}

impl CommandRecord {
    pub fn new(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw)
            .trim_matches(|c: char| c.is_whitespace() || c == '\0')
            .to_string();
        Self {
            raw: raw.to_vec(),
            text,
        }
    }

    /// Bytes exactly as read
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Content with surrounding whitespace and line terminators removed
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Reader side of the command channel
///
/// `path` is set when the channel owns a FIFO on disk; the FIFO is removed
/// on [`close`](Self::close) or drop.
pub struct CommandChannel<R = File> {
    reader: R,
    path: Option<PathBuf>,
}

impl CommandChannel<File> {
    /// Create the FIFO if absent and open it read-only
    ///
    /// With [`OpenMode::WaitForWriter`] this blocks until a writer opens
    /// the other end. Either way the descriptor is non-blocking afterwards.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> HostResult<Self> {
        let path = path.as_ref();
        let open_error = |source: io::Error| HostError::ChannelOpen {
            path: path.to_path_buf(),
            source,
        };

        ensure_fifo(path).map_err(open_error)?;

        let mut options = OpenOptions::new();
        options.read(true);
        if mode == OpenMode::Immediate {
            options.custom_flags(libc::O_NONBLOCK);
        } else {
            log::info!("Waiting for a writer on {}", path.display());
        }

        let file = options.open(path).map_err(open_error)?;
        set_nonblocking(&file).map_err(open_error)?;

        log::info!("Command pipe open: {}", path.display());

        Ok(Self {
            reader: file,
            path: Some(path.to_path_buf()),
        })
    }
}

impl<R: Read> CommandChannel<R> {
    /// Wrap an arbitrary reader; nothing is removed on close
    ///
    /// The reader should report `WouldBlock` (or `Ok(0)`) when it has no
    /// data instead of blocking.
    pub fn from_reader(reader: R) -> Self {
        Self { reader, path: None }
    }

    /// Filesystem path of the FIFO, if the channel owns one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read at most one command record without blocking
    pub fn poll(&mut self) -> Option<CommandRecord> {
        let mut buffer = [0u8; READ_BUFFER_SIZE];

        let bytes = match self.reader.read(&mut buffer[..READ_BUFFER_SIZE - 1]) {
            Ok(0) => return None,
            Ok(n) => n,
            Err(e) if is_no_data(&e) => return None,
            Err(e) => {
                log::warn!("Command pipe read failed: {}", e);
                return None;
            }
        };

        let record = CommandRecord::new(&buffer[..bytes]);
        self.drain();
        Some(record)
    }

    /// Discard whatever is left in the channel; returns the dropped byte count
    fn drain(&mut self) -> usize {
        let mut scratch = [0u8; DRAIN_BUFFER_SIZE];
        let mut dropped = 0;

        for _ in 0..MAX_DRAIN_READS {
            match self.reader.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => dropped += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }

        dropped
    }
}

impl<R> CommandChannel<R> {
    /// Close the channel and remove its FIFO
    pub fn close(mut self) {
        self.remove_pipe();
    }

    fn remove_pipe(&mut self) {
        if let Some(path) = self.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed command pipe {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove command pipe {}: {}", path.display(), e),
            }
        }
    }
}

impl<R> Drop for CommandChannel<R> {
    fn drop(&mut self) {
        self.remove_pipe();
    }
}

fn is_no_data(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Make sure `path` is a FIFO, creating it when missing
fn ensure_fifo(path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a FIFO",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let c_path = CString::new(path.as_os_str().as_bytes())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            // SAFETY: c_path is a valid NUL-terminated string for the call's duration
            let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666 as libc::mode_t) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn set_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: fd is owned by `file` and open for the duration of both calls
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK == 0 {
        // SAFETY: as above
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
