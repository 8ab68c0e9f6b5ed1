//! Protocol implementations.
//!
//! Protocols implement [`Protocol`](crate::Protocol) for different storage
//! types.

mod cached_file;
pub(crate) mod stream;

pub use cached_file::{CachedFile, CachedFileProtocol, check_access};
pub use stream::live_buffers;
