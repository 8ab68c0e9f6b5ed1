//! The `cf` protocol: buffered access to local regular files.
//!
//! A handle owns one transfer buffer for its whole open lifetime, sized by
//! [`CachedFileConfig::buf_size`]. Closing a handle opened for writing
//! flushes the buffer and fsyncs the descriptor before releasing it, so a
//! successful close means the data reached stable storage.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use rustix::fs::Mode;
use tracing::{debug, error, warn};

use crate::config::CachedFileConfig;
use crate::error::{CfError, CfResult};
use crate::protocol::{Protocol, UrlContext};
use crate::protocols::stream::BufferedStream;
use crate::types::{Access, OpenMode, Whence};
use crate::url::native_path;

/// Protocol handling `cf:` URLs.
#[derive(Debug, Clone, Default)]
pub struct CachedFileProtocol {
    config: CachedFileConfig,
}

impl CachedFileProtocol {
    /// Scheme the protocol registers under.
    pub const NAME: &'static str = "cf";

    /// Create the protocol with the given handle configuration.
    pub fn new(config: CachedFileConfig) -> Self {
        Self { config }
    }

    /// Configuration applied to every handle this protocol opens.
    pub fn config(&self) -> &CachedFileConfig {
        &self.config
    }
}

impl Protocol for CachedFileProtocol {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn open(&self, url: &str, mode: OpenMode) -> CfResult<Box<dyn UrlContext>> {
        Ok(Box::new(CachedFile::open(url, mode, &self.config)?))
    }

    fn check(&self, url: &str, mask: Access) -> CfResult<Access> {
        check_access(url, mask)
    }
}

/// Report which of `mask` the owner permission bits of `url` allow.
///
/// Looks only at `S_IRUSR` and `S_IWUSR` from `stat(2)`; it does not ask
/// whether the calling process could actually open the file.
pub fn check_access(url: &str, mask: Access) -> CfResult<Access> {
    let stat = rustix::fs::stat(native_path(url))?;
    let mode = Mode::from_raw_mode(stat.st_mode);
    let granted = Access {
        read: mode.contains(Mode::RUSR),
        write: mode.contains(Mode::WUSR),
    };
    Ok(granted.intersect(mask))
}

/// An open `cf:` handle.
///
/// Obtain one through [`CachedFile::open`] or [`CachedFileProtocol`]; release
/// it with [`UrlContext::close`]. Dropping a write handle without closing
/// flushes what it can but skips the fsync.
#[derive(Debug)]
pub struct CachedFile {
    path: PathBuf,
    /// `None` only once the handle has been torn down.
    stream: Option<BufferedStream>,
    write_mode: bool,
}

impl CachedFile {
    /// Open `url` (scheme prefix optional) with the given configuration.
    ///
    /// `Read` opens an existing file. `Write` and `ReadWrite` create the file
    /// or truncate it.
    pub fn open(url: &str, mode: OpenMode, config: &CachedFileConfig) -> CfResult<Self> {
        let path = PathBuf::from(native_path(url));
        let write_mode = mode.is_write();

        let file = OpenOptions::new()
            .read(mode.is_read())
            .write(write_mode)
            .create(write_mode)
            .truncate(write_mode)
            .open(&path)
            .map_err(|e| {
                error!(path = %path.display(), mode = mode.as_str(), "open failed: {e}");
                e
            })?;

        let stream = BufferedStream::new(file, config.buf_size(), mode);
        debug!(
            path = %path.display(),
            mode = mode.as_str(),
            buf_size = config.buf_size(),
            fd = stream.as_raw_fd(),
            "opened"
        );

        Ok(Self {
            path,
            stream: Some(stream),
            write_mode,
        })
    }

    /// Native path the handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the handle was opened for writing.
    pub fn is_write_mode(&self) -> bool {
        self.write_mode
    }

    /// Transfer buffer size, 0 when unbuffered.
    pub fn buf_size(&self) -> usize {
        self.stream.as_ref().map_or(0, BufferedStream::capacity)
    }

    /// Current logical position.
    pub fn tell(&mut self) -> CfResult<u64> {
        Ok(live(&mut self.stream)?.position()?)
    }
}

fn live(stream: &mut Option<BufferedStream>) -> CfResult<&mut BufferedStream> {
    stream
        .as_mut()
        .ok_or_else(|| CfError::Io(io::Error::from_raw_os_error(libc::EBADF)))
}

impl UrlContext for CachedFile {
    fn read(&mut self, buf: &mut [u8]) -> CfResult<usize> {
        Ok(live(&mut self.stream)?.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> CfResult<usize> {
        Ok(live(&mut self.stream)?.write(buf)?)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> CfResult<u64> {
        let stream = live(&mut self.stream)?;

        if whence == Whence::Size {
            return Ok(stream.file_size()?);
        }

        let result = match whence.to_seek_from(offset) {
            Some(target) => stream.seek(target),
            None => Err(io::Error::from_raw_os_error(libc::EINVAL)),
        };
        result.map_err(|e| {
            error!(path = %self.path.display(), ?whence, offset, "seek failed: {e}");
            CfError::Io(e)
        })
    }

    fn close(mut self: Box<Self>) -> CfResult<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        let synced = if self.write_mode {
            stream.sync()
        } else {
            Ok(())
        };
        let closed = stream.close();

        if let Err(e) = &synced {
            error!(path = %self.path.display(), "sync on close failed: {e}");
        }
        if let Err(e) = &closed {
            error!(path = %self.path.display(), "close failed: {e}");
        }
        debug!(path = %self.path.display(), write_mode = self.write_mode, "closed");

        synced?;
        closed?;
        Ok(())
    }

    fn raw_handle(&self) -> RawFd {
        self.stream.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}

impl Drop for CachedFile {
    fn drop(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if self.write_mode {
            warn!(path = %self.path.display(), "write handle dropped without close, data not synced");
            if let Err(e) = stream.flush() {
                warn!(path = %self.path.display(), "flush on drop failed: {e}");
            }
        }
    }
}
