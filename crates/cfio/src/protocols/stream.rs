//! Fully-buffered stream over a file descriptor.
//!
//! One owned transfer buffer serves both directions. At any time it holds
//! either read-ahead (bytes pulled from the file but not yet handed out) or
//! pending output (bytes accepted but not yet written), never both:
//!
//! - reading after writing flushes the pending output first;
//! - writing after reading discards the read-ahead and rewinds the OS
//!   position to the logical one;
//! - seeking flushes output and drops read-ahead.
//!
//! With a zero-sized buffer every call goes straight to the OS.

use std::cell::Cell;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};

use crate::types::OpenMode;

thread_local! {
    static LIVE_BUFFERS: Cell<usize> = const { Cell::new(0) };
}

/// Number of transfer buffers currently held by streams opened on this
/// thread.
///
/// A buffer is counted on the thread that allocated it and uncounted on the
/// thread that frees it, so the figure is only meaningful when handles stay
/// on the thread that opened them.
pub fn live_buffers() -> usize {
    LIVE_BUFFERS.with(Cell::get)
}

/// Heap buffer owned by exactly one stream.
struct TransferBuffer {
    bytes: Box<[u8]>,
}

impl TransferBuffer {
    fn new(size: usize) -> Self {
        LIVE_BUFFERS.with(|n| n.set(n.get() + 1));
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
        }
    }
}

impl Drop for TransferBuffer {
    fn drop(&mut self) {
        LIVE_BUFFERS.with(|n| n.set(n.get().saturating_sub(1)));
    }
}

impl fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// `bytes[pos..filled]` is read-ahead not yet handed out.
    Reading { pos: usize, filled: usize },
    /// `bytes[..len]` is output not yet written.
    Writing { len: usize },
}

/// Buffered stream layered over an open file.
#[derive(Debug)]
pub(crate) struct BufferedStream {
    file: File,
    buf: Option<TransferBuffer>,
    state: State,
    readable: bool,
    writable: bool,
}

impl BufferedStream {
    /// Wrap `file`. A `buf_size` of 0 leaves the stream unbuffered.
    pub fn new(file: File, buf_size: usize, mode: OpenMode) -> Self {
        let buf = (buf_size > 0).then(|| TransferBuffer::new(buf_size));
        Self {
            file,
            buf,
            state: State::Idle,
            readable: mode.is_read(),
            writable: mode.is_write(),
        }
    }

    /// Size of the transfer buffer, 0 when unbuffered.
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map_or(0, |b| b.bytes.len())
    }

    /// Bytes accepted by `write` that have not reached the OS yet.
    pub fn pending(&self) -> usize {
        match self.state {
            State::Writing { len } => len,
            _ => 0,
        }
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Read until `dst` is full or the file reports end of file.
    ///
    /// An error after some bytes were delivered is reported as the short
    /// count; the next call will run into it again.
    pub fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if !self.readable {
            return Err(bad_descriptor());
        }
        self.flush()?;

        let mut done = 0;
        while done < dst.len() {
            match self.read_some(&mut dst[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(_) if done > 0 => break,
                Err(e) => return Err(e),
            }
        }
        Ok(done)
    }

    fn read_some(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let Some(buf) = self.buf.as_mut() else {
            return self.file.read(dst);
        };

        if let State::Reading { pos, filled } = self.state {
            let n = dst.len().min(filled - pos);
            dst[..n].copy_from_slice(&buf.bytes[pos..pos + n]);
            self.state = if pos + n == filled {
                State::Idle
            } else {
                State::Reading { pos: pos + n, filled }
            };
            return Ok(n);
        }

        // Large reads skip the buffer
        if dst.len() >= buf.bytes.len() {
            return self.file.read(dst);
        }

        let filled = self.file.read(&mut buf.bytes)?;
        let n = dst.len().min(filled);
        dst[..n].copy_from_slice(&buf.bytes[..n]);
        if n < filled {
            self.state = State::Reading { pos: n, filled };
        }
        Ok(n)
    }

    /// Accept `src` for writing, returning how many bytes were taken.
    pub fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(bad_descriptor());
        }
        if src.is_empty() {
            return Ok(0);
        }
        self.drop_read_ahead()?;

        let cap = self.capacity();
        if cap == 0 {
            return write_direct(&mut self.file, src);
        }
        if self.pending() + src.len() > cap {
            self.flush()?;
        }
        // Large writes skip the buffer
        if src.len() >= cap {
            return write_direct(&mut self.file, src);
        }

        let len = self.pending();
        if let Some(buf) = self.buf.as_mut() {
            buf.bytes[len..len + src.len()].copy_from_slice(src);
            self.state = State::Writing {
                len: len + src.len(),
            };
        }
        Ok(src.len())
    }

    /// Push pending output to the OS.
    ///
    /// On failure the unwritten tail stays buffered.
    pub fn flush(&mut self) -> io::Result<()> {
        let State::Writing { len } = self.state else {
            return Ok(());
        };
        let Some(buf) = self.buf.as_mut() else {
            self.state = State::Idle;
            return Ok(());
        };

        let mut written = 0;
        while written < len {
            match self.file.write(&buf.bytes[written..len]) {
                Ok(n) if n > 0 => written += n,
                result => {
                    let err = result
                        .err()
                        .unwrap_or_else(|| io::ErrorKind::WriteZero.into());
                    buf.bytes.copy_within(written..len, 0);
                    self.state = State::Writing {
                        len: len - written,
                    };
                    return Err(err);
                }
            }
        }
        self.state = State::Idle;
        Ok(())
    }

    /// Discard read-ahead, moving the OS position back to the logical one.
    fn drop_read_ahead(&mut self) -> io::Result<()> {
        if let State::Reading { pos, filled } = self.state {
            let ahead = (filled - pos) as i64;
            self.file.seek(SeekFrom::Current(-ahead))?;
            self.state = State::Idle;
        }
        Ok(())
    }

    // ========================================================================
    // Positioning
    // ========================================================================

    /// Reposition and return the new absolute position.
    ///
    /// Relative seeks are taken from the logical position. If the OS rejects
    /// the seek, buffered read-ahead is kept and still valid.
    pub fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.flush()?;
        let target = match (self.state, target) {
            (State::Reading { pos, filled }, SeekFrom::Current(off)) => {
                let ahead = (filled - pos) as i64;
                let off = off
                    .checked_sub(ahead)
                    .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))?;
                SeekFrom::Current(off)
            }
            (_, target) => target,
        };
        let pos = self.file.seek(target)?;
        self.state = State::Idle;
        Ok(pos)
    }

    /// Logical position: the OS position adjusted for buffered bytes.
    pub fn position(&mut self) -> io::Result<u64> {
        let os = self.file.stream_position()?;
        Ok(match self.state {
            State::Idle => os,
            State::Writing { len } => os + len as u64,
            State::Reading { pos, filled } => os - (filled - pos) as u64,
        })
    }

    /// Flush pending output and return the file's size from `fstat`.
    ///
    /// Leaves the logical position unchanged.
    pub fn file_size(&mut self) -> io::Result<u64> {
        self.flush()?;
        let stat = rustix::fs::fstat(&self.file)?;
        Ok(stat.st_size as u64)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Flush pending output and commit the file to stable storage.
    pub fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        rustix::fs::fsync(&self.file)?;
        Ok(())
    }

    /// Free the buffer and close the descriptor, reporting `close(2)` errors.
    ///
    /// Pending output is not flushed; call [`sync`](Self::sync) or
    /// [`flush`](Self::flush) first.
    pub fn close(self) -> io::Result<()> {
        let BufferedStream { file, buf, .. } = self;
        drop(buf);
        close_file(file)
    }
}

impl AsRawFd for BufferedStream {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn write_direct(file: &mut File, src: &[u8]) -> io::Result<usize> {
    let mut done = 0;
    while done < src.len() {
        match file.write(&src[done..]) {
            Ok(0) if done == 0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if done == 0 => return Err(e),
            Err(_) => break,
        }
    }
    Ok(done)
}

fn close_file(file: File) -> io::Result<()> {
    let fd = file.into_raw_fd();
    // SAFETY: `fd` was just released by `File`; nothing else owns or closes it.
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn bad_descriptor() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn open(dir: &TempDir, name: &str, mode: OpenMode, buf_size: usize) -> BufferedStream {
        let file = OpenOptions::new()
            .read(mode.is_read())
            .write(mode.is_write())
            .create(mode.is_write())
            .truncate(mode.is_write())
            .open(dir.path().join(name))
            .unwrap();
        BufferedStream::new(file, buf_size, mode)
    }

    #[test]
    fn test_small_writes_stay_buffered_until_flush() {
        let dir = TempDir::new().unwrap();
        let mut stream = open(&dir, "out.bin", OpenMode::Write, 64);

        assert_eq!(stream.write(b"hello").unwrap(), 5);
        assert_eq!(stream.pending(), 5);
        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"");

        stream.flush().unwrap();
        assert_eq!(stream.pending(), 0);
        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"hello");
    }

    #[test]
    fn test_overflowing_write_flushes_first() {
        let dir = TempDir::new().unwrap();
        let mut stream = open(&dir, "out.bin", OpenMode::Write, 8);

        stream.write(b"abcde").unwrap();
        stream.write(b"fghij").unwrap();
        // First chunk went out to make room for the second
        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"abcde");
        assert_eq!(stream.pending(), 5);
    }

    #[test]
    fn test_large_write_bypasses_buffer() {
        let dir = TempDir::new().unwrap();
        let mut stream = open(&dir, "out.bin", OpenMode::Write, 4);

        assert_eq!(stream.write(b"0123456789").unwrap(), 10);
        assert_eq!(stream.pending(), 0);
        assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), b"0123456789");
    }

    #[test]
    fn test_position_counts_buffered_bytes() {
        let dir = TempDir::new().unwrap();
        let mut stream = open(&dir, "rw.bin", OpenMode::ReadWrite, 16);

        stream.write(b"0123456789").unwrap();
        assert_eq!(stream.position().unwrap(), 10);

        stream.seek(SeekFrom::Start(2)).unwrap();
        let mut two = [0u8; 2];
        assert_eq!(stream.read(&mut two).unwrap(), 2);
        assert_eq!(&two, b"23");
        // Read-ahead pulled more than 2 bytes, but the logical position is 4
        assert_eq!(stream.position().unwrap(), 4);
    }

    #[test]
    fn test_write_after_read_lands_at_logical_position() {
        let dir = TempDir::new().unwrap();
        let mut stream = open(&dir, "rw.bin", OpenMode::ReadWrite, 16);

        stream.write(b"abcdefgh").unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut three = [0u8; 3];
        stream.read(&mut three).unwrap();
        stream.write(b"XY").unwrap();
        stream.flush().unwrap();

        assert_eq!(std::fs::read(dir.path().join("rw.bin")).unwrap(), b"abcXYfgh");
    }

    #[test]
    fn test_relative_seek_uses_logical_position() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("in.bin"), b"0123456789").unwrap();
        let mut stream = open(&dir, "in.bin", OpenMode::Read, 16);

        let mut one = [0u8; 1];
        stream.read(&mut one).unwrap();
        assert_eq!(stream.seek(SeekFrom::Current(3)).unwrap(), 4);
        stream.read(&mut one).unwrap();
        assert_eq!(&one, b"4");
    }

    #[test]
    fn test_file_size_flushes_without_moving() {
        let dir = TempDir::new().unwrap();
        let mut stream = open(&dir, "out.bin", OpenMode::Write, 64);

        stream.write(b"abc").unwrap();
        assert_eq!(stream.file_size().unwrap(), 3);
        assert_eq!(stream.position().unwrap(), 3);
        stream.write(b"def").unwrap();
        assert_eq!(stream.file_size().unwrap(), 6);
    }

    #[test]
    fn test_direction_checks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("in.bin"), b"data").unwrap();

        let mut reader = open(&dir, "in.bin", OpenMode::Read, 16);
        let err = reader.write(b"x").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));

        let mut writer = open(&dir, "out.bin", OpenMode::Write, 16);
        let mut buf = [0u8; 4];
        let err = writer.read(&mut buf).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_relative_seek_underflow_is_einval() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("in.bin"), b"0123456789").unwrap();
        let mut stream = open(&dir, "in.bin", OpenMode::Read, 16);

        let mut one = [0u8; 1];
        stream.read(&mut one).unwrap();
        let err = stream.seek(SeekFrom::Current(i64::MIN)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

        // Read-ahead survives the rejected seek
        assert_eq!(stream.position().unwrap(), 1);
        stream.read(&mut one).unwrap();
        assert_eq!(&one, b"1");
    }

    #[test]
    fn test_buffer_accounting() {
        let dir = TempDir::new().unwrap();
        let before = live_buffers();

        let stream = open(&dir, "a.bin", OpenMode::Write, 32);
        assert_eq!(stream.capacity(), 32);
        assert_eq!(live_buffers(), before + 1);
        stream.close().unwrap();
        assert_eq!(live_buffers(), before);

        let stream = open(&dir, "b.bin", OpenMode::Write, 0);
        assert_eq!(stream.capacity(), 0);
        assert_eq!(live_buffers(), before);
        stream.close().unwrap();
        assert_eq!(live_buffers(), before);
    }
}
