//! Core types shared by protocols and handles.

use serde::{Deserialize, Serialize};
use std::io::SeekFrom;

/// How a URL is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Read only. The file must exist.
    Read,
    /// Write only. Creates the file, truncating any existing content.
    Write,
    /// Read and write. Creates the file, truncating any existing content.
    ReadWrite,
}

impl OpenMode {
    /// Returns true if the handle may read.
    pub fn is_read(&self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    /// Returns true if the handle may write.
    pub fn is_write(&self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }

    /// The equivalent stdio mode string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Read => "rb",
            OpenMode::Write => "wb",
            OpenMode::ReadWrite => "w+b",
        }
    }
}

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Whence {
    /// Offset from the start of the file.
    Start,
    /// Offset from the current logical position.
    Current,
    /// Offset from the end of the file.
    End,
    /// Report the file size without moving the position. The offset is ignored.
    Size,
}

impl Whence {
    /// Convert a positional whence and offset into a [`SeekFrom`].
    ///
    /// Returns `None` for [`Whence::Size`] and for a negative offset from
    /// the start.
    pub fn to_seek_from(self, offset: i64) -> Option<SeekFrom> {
        match self {
            Whence::Start => u64::try_from(offset).ok().map(SeekFrom::Start),
            Whence::Current => Some(SeekFrom::Current(offset)),
            Whence::End => Some(SeekFrom::End(offset)),
            Whence::Size => None,
        }
    }
}

/// Access rights, as requested or as granted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    /// Readable.
    pub read: bool,
    /// Writable.
    pub write: bool,
}

impl Access {
    pub const NONE: Access = Access { read: false, write: false };
    pub const READ: Access = Access { read: true, write: false };
    pub const WRITE: Access = Access { read: false, write: true };
    pub const READ_WRITE: Access = Access { read: true, write: true };

    /// Rights present in both `self` and `other`.
    pub fn intersect(self, other: Access) -> Access {
        Access {
            read: self.read && other.read,
            write: self.write && other.write,
        }
    }

    /// Returns true if no right is set.
    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_flags() {
        assert!(OpenMode::Read.is_read());
        assert!(!OpenMode::Read.is_write());
        assert!(!OpenMode::Write.is_read());
        assert!(OpenMode::Write.is_write());
        assert!(OpenMode::ReadWrite.is_read());
        assert!(OpenMode::ReadWrite.is_write());
        assert_eq!(OpenMode::ReadWrite.as_str(), "w+b");
    }

    #[test]
    fn test_whence_to_seek_from() {
        assert_eq!(Whence::Start.to_seek_from(10), Some(SeekFrom::Start(10)));
        assert_eq!(Whence::Start.to_seek_from(-1), None);
        assert_eq!(Whence::Current.to_seek_from(-4), Some(SeekFrom::Current(-4)));
        assert_eq!(Whence::End.to_seek_from(0), Some(SeekFrom::End(0)));
        assert_eq!(Whence::Size.to_seek_from(0), None);
    }

    #[test]
    fn test_access_intersect() {
        assert_eq!(Access::READ_WRITE.intersect(Access::READ), Access::READ);
        assert_eq!(Access::WRITE.intersect(Access::READ), Access::NONE);
        assert!(Access::NONE.is_empty());
    }
}
