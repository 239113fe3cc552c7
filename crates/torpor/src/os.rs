//! OS call identifiers and host-side stat helpers.
//!
//! The interpreter never touches the filesystem or environment itself; it
//! yields an [`OsFunction`] plus arguments to the host and waits. The names
//! here are the stable identifiers of the suspension protocol.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::object::Object;

/// An OS-level operation requested by sandboxed code.
///
/// The `Display` form is the stable wire name (`Path.exists`, `os.getenv`, …)
/// that hosts dispatch on and that appears in "not implemented" errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum OsFunction {
    /// `Path.exists()` — args: `(path,)`, expects a bool.
    #[strum(serialize = "Path.exists")]
    Exists,
    /// `Path.is_file()` — args: `(path,)`, expects a bool.
    #[strum(serialize = "Path.is_file")]
    IsFile,
    /// `Path.is_dir()` — args: `(path,)`, expects a bool.
    #[strum(serialize = "Path.is_dir")]
    IsDir,
    /// `Path.stat()` — args: `(path,)`, expects a stat result.
    #[strum(serialize = "Path.stat")]
    Stat,
    /// `Path.read_text()` — args: `(path,)`, expects a str.
    #[strum(serialize = "Path.read_text")]
    ReadText,
    /// `Path.read_bytes()` — args: `(path,)`, expects bytes.
    #[strum(serialize = "Path.read_bytes")]
    ReadBytes,
    /// `Path.write_text(text)` — args: `(path, text)`, expects int or None.
    #[strum(serialize = "Path.write_text")]
    WriteText,
    /// `Path.write_bytes(data)` — args: `(path, data)`, expects int or None.
    #[strum(serialize = "Path.write_bytes")]
    WriteBytes,
    /// `Path.iterdir()` — args: `(path,)`, expects a list of paths or strings.
    #[strum(serialize = "Path.iterdir")]
    Iterdir,
    /// `os.getenv(key, default)` — args: `(key, default_or_None)`.
    #[strum(serialize = "os.getenv")]
    Getenv,
}

impl OsFunction {
    /// Maps a `Path` method name to its OS function, if it is one.
    #[must_use]
    pub(crate) fn from_path_method(name: &str) -> Option<Self> {
        match name {
            "exists" => Some(Self::Exists),
            "is_file" => Some(Self::IsFile),
            "is_dir" => Some(Self::IsDir),
            "stat" => Some(Self::Stat),
            "read_text" => Some(Self::ReadText),
            "read_bytes" => Some(Self::ReadBytes),
            "write_text" => Some(Self::WriteText),
            "write_bytes" => Some(Self::WriteBytes),
            "iterdir" => Some(Self::Iterdir),
            _ => None,
        }
    }
}

/// A `stat()` result: the ten `st_*` fields of `os.stat_result`.
///
/// Supports both attribute access and positional indexing inside the sandbox
/// (`info.st_size` and `info[6]` agree). Hosts usually build these with
/// [`file_stat`] or [`dir_stat`] rather than literally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatResult {
    pub st_mode: i64,
    pub st_ino: i64,
    pub st_dev: i64,
    pub st_nlink: i64,
    pub st_uid: i64,
    pub st_gid: i64,
    pub st_size: i64,
    pub st_atime: f64,
    pub st_mtime: f64,
    pub st_ctime: f64,
}

/// Regular-file type bit in `st_mode` (`S_IFREG`).
pub(crate) const S_IFREG: i64 = 0o100_000;
/// Directory type bit in `st_mode` (`S_IFDIR`).
pub(crate) const S_IFDIR: i64 = 0o40_000;

/// Builds a stat result for a regular file.
///
/// `mode` gains the regular-file type bit; inode, device, uid, gid and the
/// access/change times are zeroed, and the link count is 1.
#[must_use]
pub fn file_stat(size: i64, mode: i64, mtime: f64) -> Object {
    Object::StatResult(StatResult {
        st_mode: mode | S_IFREG,
        st_ino: 0,
        st_dev: 0,
        st_nlink: 1,
        st_uid: 0,
        st_gid: 0,
        st_size: size,
        st_atime: 0.0,
        st_mtime: mtime,
        st_ctime: 0.0,
    })
}

/// Builds a stat result for a directory, analogously to [`file_stat`].
#[must_use]
pub fn dir_stat(mode: i64, mtime: f64) -> Object {
    Object::StatResult(StatResult {
        st_mode: mode | S_IFDIR,
        st_ino: 0,
        st_dev: 0,
        st_nlink: 1,
        st_uid: 0,
        st_gid: 0,
        st_size: 0,
        st_atime: 0.0,
        st_mtime: mtime,
        st_ctime: 0.0,
    })
}

/// Builds a stat result with every field spelled out.
#[must_use]
#[expect(clippy::too_many_arguments, reason = "mirrors the ten stat fields")]
pub fn stat_result(
    st_mode: i64,
    st_ino: i64,
    st_dev: i64,
    st_nlink: i64,
    st_uid: i64,
    st_gid: i64,
    st_size: i64,
    st_atime: f64,
    st_mtime: f64,
    st_ctime: f64,
) -> Object {
    Object::StatResult(StatResult {
        st_mode,
        st_ino,
        st_dev,
        st_nlink,
        st_uid,
        st_gid,
        st_size,
        st_atime,
        st_mtime,
        st_ctime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_wire_identifiers() {
        assert_eq!(OsFunction::Exists.to_string(), "Path.exists");
        assert_eq!(OsFunction::Getenv.to_string(), "os.getenv");
        assert_eq!(OsFunction::WriteBytes.to_string(), "Path.write_bytes");
    }

    #[test]
    fn file_stat_sets_type_bit() {
        let Object::StatResult(stat) = file_stat(1024, 0o644, 2.5) else {
            panic!("expected StatResult");
        };
        assert_eq!(stat.st_mode, 0o100_644);
        assert_eq!(stat.st_size, 1024);
        assert_eq!(stat.st_mtime, 2.5);
        assert_eq!(stat.st_nlink, 1);
        // An already-tagged mode is left unchanged.
        let Object::StatResult(stat) = file_stat(1, 0o100_644, 0.0) else {
            panic!("expected StatResult");
        };
        assert_eq!(stat.st_mode, 0o100_644);
    }
}
