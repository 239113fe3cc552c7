//! Pure POSIX path object.
//!
//! Paths are immutable and lexical: no filesystem access ever happens here.
//! The filesystem methods (`exists`, `read_text`, …) are recognized by name in
//! attribute dispatch and yield OS-call suspensions; this module only provides
//! the pure surface (normalization, joining, parts, parent, name, …).

use serde::{Deserialize, Serialize};

/// A normalized pure POSIX path.
///
/// Normalization collapses repeated separators and `.` segments and strips
/// trailing slashes; `..` segments are kept (pure paths do not resolve). The
/// empty path normalizes to `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct PyPath {
    path: String,
}

impl PyPath {
    /// Creates a path from arbitrary input, normalizing it.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            path: normalize(raw),
        }
    }

    /// The normalized path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Whether the path is absolute.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// Path components: the root first for absolute paths, then each segment.
    #[must_use]
    pub fn parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if self.is_absolute() {
            parts.push("/".to_owned());
        }
        if self.path != "/" && self.path != "." {
            parts.extend(
                self.path
                    .trim_start_matches('/')
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_owned),
            );
        }
        parts
    }

    /// The final component, or the empty string for the root and `.`.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.path == "/" || self.path == "." {
            return "";
        }
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// The logical parent path.
    ///
    /// The root is its own parent, as is `.` for a single relative segment.
    #[must_use]
    pub fn parent(&self) -> Self {
        if self.path == "/" || self.path == "." {
            return self.clone();
        }
        match self.path.rfind('/') {
            Some(0) => Self { path: "/".to_owned() },
            Some(idx) => Self {
                path: self.path[..idx].to_owned(),
            },
            None => Self { path: ".".to_owned() },
        }
    }

    /// The file extension including the leading dot, or `""`.
    #[must_use]
    pub fn suffix(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx..],
            _ => "",
        }
    }

    /// The final component without its suffix.
    #[must_use]
    pub fn stem(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    /// Joins with another path (`self / other`).
    ///
    /// An absolute right-hand side replaces the left entirely, as in
    /// `PurePosixPath.__truediv__`.
    #[must_use]
    pub fn join(&self, other: &str) -> Self {
        if other.starts_with('/') {
            return Self::new(other);
        }
        if other.is_empty() || other == "." {
            return self.clone();
        }
        if self.path == "." {
            return Self::new(other);
        }
        let mut joined = self.path.clone();
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(other);
        Self::new(&joined)
    }

    /// Returns a sibling path with the final component replaced.
    ///
    /// Errors (as a message) when the path has no name or the new name
    /// contains a separator.
    pub fn with_name(&self, name: &str) -> Result<Self, String> {
        if self.name().is_empty() {
            return Err(format!("{self:?} has an empty name").replace("PyPath", "PurePosixPath"));
        }
        if name.is_empty() || name.contains('/') || name == "." {
            return Err(format!("invalid name {name:?}"));
        }
        Ok(self.parent().join(name))
    }

    /// Returns the path with its suffix replaced.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, String> {
        if !suffix.is_empty() && (!suffix.starts_with('.') || suffix == "." || suffix.contains('/')) {
            return Err(format!("invalid suffix {suffix:?}"));
        }
        let stem = self.stem().to_owned();
        if stem.is_empty() {
            return Err(format!("{:?} has an empty name", self.path));
        }
        self.with_name(&format!("{stem}{suffix}"))
    }

    /// The `repr()` form, e.g. `PurePosixPath('/a/b')`.
    #[must_use]
    pub fn repr(&self) -> String {
        format!("PurePosixPath('{}')", self.path)
    }
}

/// Normalizes a raw path string.
fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return ".".to_owned();
    }
    let absolute = raw.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        segments.push(segment);
    }
    if segments.is_empty() {
        return if absolute { "/".to_owned() } else { ".".to_owned() };
    }
    let mut out = String::with_capacity(raw.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization() {
        assert_eq!(PyPath::new("/a//b/./c/").as_str(), "/a/b/c");
        assert_eq!(PyPath::new("").as_str(), ".");
        assert_eq!(PyPath::new("/").as_str(), "/");
        assert_eq!(PyPath::new("a/../b").as_str(), "a/../b");
        assert_eq!(PyPath::new("//x").as_str(), "/x");
    }

    #[test]
    fn join_and_parts() {
        let p = PyPath::new("/a").join("b").join("c");
        assert_eq!(p.as_str(), "/a/b/c");
        assert_eq!(p.parts(), vec!["/", "a", "b", "c"]);
        assert_eq!(PyPath::new("/a").join("/etc").as_str(), "/etc");
        assert_eq!(PyPath::new("a/b").parts(), vec!["a", "b"]);
    }

    #[test]
    fn name_parent_suffix() {
        let p = PyPath::new("/tmp/archive.tar.gz");
        assert_eq!(p.name(), "archive.tar.gz");
        assert_eq!(p.suffix(), ".gz");
        assert_eq!(p.stem(), "archive.tar");
        assert_eq!(p.parent().as_str(), "/tmp");
        assert_eq!(PyPath::new("/").parent().as_str(), "/");
        assert_eq!(PyPath::new("x").parent().as_str(), ".");
        assert_eq!(PyPath::new(".hidden").suffix(), "");
    }

    #[test]
    fn with_name_and_suffix() {
        let p = PyPath::new("/tmp/data.json");
        assert_eq!(p.with_name("other.txt").unwrap().as_str(), "/tmp/other.txt");
        assert_eq!(p.with_suffix(".txt").unwrap().as_str(), "/tmp/data.txt");
        assert_eq!(p.with_suffix("").unwrap().as_str(), "/tmp/data");
        assert!(PyPath::new("/").with_name("x").is_err());
    }
}
