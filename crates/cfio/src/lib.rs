//! # cfio
//!
//! Buffered, URL-addressable file access.
//!
//! A URL has the form `<scheme>:<path>`. The [`ProtocolRegistry`] resolves
//! the scheme to a [`Protocol`], which opens a [`UrlContext`] handle with a
//! uniform contract: read, write, seek, close, plus access checks and the
//! raw descriptor.
//!
//! The built-in `cf` protocol ([`CachedFileProtocol`]) puts an owned,
//! configurable transfer buffer between the caller and a local regular file
//! and fsyncs written data before a handle closes.
//!
//! ```no_run
//! use cfio::{CachedFileConfig, OpenMode, ProtocolRegistry, UrlContext};
//!
//! # fn main() -> cfio::CfResult<()> {
//! let registry = ProtocolRegistry::with_defaults(CachedFileConfig::default());
//!
//! let mut out = registry.open("cf:/tmp/test.bin", OpenMode::Write)?;
//! out.write_all(b"hello")?;
//! out.close()?;
//!
//! let mut input = registry.open("cf:/tmp/test.bin", OpenMode::Read)?;
//! let mut data = Vec::new();
//! input.read_to_end(&mut data)?;
//! input.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod protocols;
pub mod registry;
pub mod types;
pub mod url;

pub use config::{CachedFileConfig, DEFAULT_BUF_SIZE, MAX_BUF_SIZE};
pub use error::{CfError, CfResult};
pub use protocol::{Protocol, UrlContext};
pub use protocols::{CachedFile, CachedFileProtocol, check_access, live_buffers};
pub use registry::ProtocolRegistry;
pub use types::{Access, OpenMode, Whence};
pub use url::Url;
