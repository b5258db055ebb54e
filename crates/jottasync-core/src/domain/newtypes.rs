//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for remote paths and
//! content hashes. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Remote paths
// ============================================================================

/// A path in the remote store (always `/`-separated, must start with `/`)
///
/// Represents paths such as "/Jotta/Sync/photos/cat.jpg" where the first two
/// segments name the device and the mount point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// # Errors
    /// Returns error if the path is relative, has empty segments or
    /// contains `.`/`..` segments
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        if path.len() > 1 && (path.contains("//") || path.ends_with('/')) {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains empty segments: {path}"
            )));
        }

        if path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid traversal: {path}"
            )));
        }

        Ok(Self(path))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if component is empty, contains `/` or is a traversal
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component == "." || component == ".."
        {
            return Err(DomainError::InvalidRemotePath(format!(
                "Invalid path component: {component}"
            )));
        }

        let new_path = if self.0 == "/" {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };

        Self::new(new_path)
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Get the last component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Iterate over the non-empty segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// Content hashes
// ============================================================================

/// MD5 content hash as 32 lowercase hex digits
///
/// This is the fingerprint the remote store records per revision, so local
/// and remote content can be compared without transferring bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileHash(String);

impl FileHash {
    /// Hex length of an MD5 digest
    const HEX_LEN: usize = 32;

    /// Create a new FileHash; uppercase input is normalized to lowercase
    ///
    /// # Errors
    /// Returns error if the value is not 32 hexadecimal digits
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "Hash has wrong length: expected {} hex digits, got {}",
                Self::HEX_LEN,
                hash.len()
            )));
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not hexadecimal: {hash}"
            )));
        }

        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Build a hash from a raw 16-byte digest
    #[must_use]
    pub fn from_digest(digest: [u8; 16]) -> Self {
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FileHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for FileHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<FileHash> for String {
    fn from(hash: FileHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod remote_path_tests {
        use super::*;

        #[test]
        fn test_new_valid() {
            let path = RemotePath::new("/Jotta/Sync/file.txt".to_string()).unwrap();
            assert_eq!(path.as_str(), "/Jotta/Sync/file.txt");
        }

        #[test]
        fn test_root() {
            let root = RemotePath::root();
            assert_eq!(root.as_str(), "/");
            assert!(root.parent().is_none());
            assert!(root.file_name().is_none());
        }

        #[test]
        fn test_no_leading_slash_fails() {
            assert!(RemotePath::new("Jotta/Sync".to_string()).is_err());
        }

        #[test]
        fn test_double_slash_fails() {
            assert!(RemotePath::new("/Jotta//Sync".to_string()).is_err());
        }

        #[test]
        fn test_trailing_slash_fails() {
            assert!(RemotePath::new("/Jotta/Sync/".to_string()).is_err());
        }

        #[test]
        fn test_traversal_fails() {
            assert!(RemotePath::new("/Jotta/../etc".to_string()).is_err());
            assert!(RemotePath::new("/Jotta/./Sync".to_string()).is_err());
        }

        #[test]
        fn test_dots_inside_names_allowed() {
            let path = RemotePath::new("/Jotta/Sync/archive..tar".to_string()).unwrap();
            assert_eq!(path.file_name(), Some("archive..tar"));
        }

        #[test]
        fn test_join() {
            let base = RemotePath::new("/Jotta/Sync".to_string()).unwrap();
            let joined = base.join("photos").unwrap();
            assert_eq!(joined.as_str(), "/Jotta/Sync/photos");

            let from_root = RemotePath::root().join("Jotta").unwrap();
            assert_eq!(from_root.as_str(), "/Jotta");
        }

        #[test]
        fn test_join_invalid_component() {
            let base = RemotePath::new("/Jotta".to_string()).unwrap();
            assert!(base.join("").is_err());
            assert!(base.join("a/b").is_err());
            assert!(base.join("..").is_err());
        }

        #[test]
        fn test_parent_and_file_name() {
            let path = RemotePath::new("/Jotta/Sync/a.txt".to_string()).unwrap();
            assert_eq!(path.parent().unwrap().as_str(), "/Jotta/Sync");
            assert_eq!(path.file_name(), Some("a.txt"));

            let top = RemotePath::new("/Jotta".to_string()).unwrap();
            assert_eq!(top.parent().unwrap(), RemotePath::root());
        }

        #[test]
        fn test_segments() {
            let path = RemotePath::new("/Jotta/Sync/a.txt".to_string()).unwrap();
            let segments: Vec<_> = path.segments().collect();
            assert_eq!(segments, vec!["Jotta", "Sync", "a.txt"]);
        }

        #[test]
        fn test_serde_rejects_invalid() {
            let result: Result<RemotePath, _> = serde_json::from_str("\"relative\"");
            assert!(result.is_err());
        }
    }

    mod file_hash_tests {
        use super::*;

        #[test]
        fn test_valid_md5() {
            let hash = FileHash::new("d41d8cd98f00b204e9800998ecf8427e".to_string()).unwrap();
            assert_eq!(hash.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        }

        #[test]
        fn test_uppercase_normalized() {
            let hash = FileHash::new("D41D8CD98F00B204E9800998ECF8427E".to_string()).unwrap();
            assert_eq!(hash.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        }

        #[test]
        fn test_wrong_length_fails() {
            assert!(FileHash::new("abc".to_string()).is_err());
        }

        #[test]
        fn test_non_hex_fails() {
            assert!(FileHash::new("z41d8cd98f00b204e9800998ecf8427e".to_string()).is_err());
        }

        #[test]
        fn test_from_digest() {
            let digest = [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
                0x42, 0x7e,
            ];
            let hash = FileHash::from_digest(digest);
            assert_eq!(hash.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        }

        #[test]
        fn test_serde_roundtrip() {
            let hash = FileHash::new("e8f05ca4ebd70bc93ce2f18e26cee2a3".to_string()).unwrap();
            let json = serde_json::to_string(&hash).unwrap();
            let parsed: FileHash = serde_json::from_str(&json).unwrap();
            assert_eq!(hash, parsed);
        }
    }
}
