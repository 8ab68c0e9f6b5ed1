//! Protocol traits.
//!
//! A [`Protocol`] handles every URL whose scheme matches its name. Opening a
//! URL yields a [`UrlContext`], the per-handle half of the contract.
//!
//! All operations are synchronous and blocking. A handle is `Send` so it can
//! move between threads, but every operation takes `&mut self`: the caller
//! serializes access.

use std::io;
use std::os::fd::RawFd;

use crate::error::{CfError, CfResult};
use crate::types::{Access, OpenMode, Whence};

/// Chunk size used by [`UrlContext::read_to_end`].
const READ_CHUNK: usize = 64 * 1024;

/// Path-level operations of a protocol.
pub trait Protocol: Send + Sync {
    /// Scheme this protocol is registered under (e.g. `"cf"`).
    fn name(&self) -> &'static str;

    /// Open `url` in the given mode.
    fn open(&self, url: &str, mode: OpenMode) -> CfResult<Box<dyn UrlContext>>;

    /// Report which of the requested rights the target grants.
    ///
    /// Does not open the target.
    fn check(&self, url: &str, mask: Access) -> CfResult<Access>;
}

/// Operations on an open handle.
pub trait UrlContext: Send {
    // ========================================================================
    // Transfer
    // ========================================================================

    /// Read up to `buf.len()` bytes. Returns 0 at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> CfResult<usize>;

    /// Write `buf`, returning how many bytes were accepted.
    ///
    /// A short count is not an error; retry policy belongs to the caller.
    fn write(&mut self, buf: &[u8]) -> CfResult<usize>;

    // ========================================================================
    // Positioning
    // ========================================================================

    /// Reposition, returning the new absolute position.
    ///
    /// [`Whence::Size`] returns the file size instead and leaves the
    /// position where it was.
    fn seek(&mut self, offset: i64, whence: Whence) -> CfResult<u64>;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Release the handle, persisting written data first.
    ///
    /// Resources are released whether or not this returns an error.
    fn close(self: Box<Self>) -> CfResult<()>;

    /// Underlying OS descriptor, for polling and other out-of-band use.
    fn raw_handle(&self) -> RawFd;

    // ========================================================================
    // Namespace
    // ========================================================================

    /// Delete the resource behind this handle.
    fn delete(&mut self) -> CfResult<()> {
        Err(CfError::not_supported("delete"))
    }

    /// Move the resource behind this handle to where `dst` points.
    fn rename(&mut self, _dst: &dyn UrlContext) -> CfResult<()> {
        Err(CfError::not_supported("rename"))
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Current size of the underlying resource.
    fn size(&mut self) -> CfResult<u64> {
        self.seek(0, Whence::Size)
    }

    /// Read until end of stream, appending to `out`. Returns bytes read.
    fn read_to_end(&mut self, out: &mut Vec<u8>) -> CfResult<usize> {
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }

    /// Write all of `data`, looping over short writes.
    fn write_all(&mut self, mut data: &[u8]) -> CfResult<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            data = &data[n..];
        }
        Ok(())
    }
}
