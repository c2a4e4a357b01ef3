//! Descriptor validation.
//!
//! # Responsibilities
//! - Semantic checks over defaulted descriptors (serde handles syntax)
//! - Transport conflicts, network overrides, client auth policy
//! - Existence of TLS material and UNIX socket parent directories
//!
//! # Design Decisions
//! - Runs after `defaultize`; the first failing check is reported
//! - Filesystem access goes through [`FsProbe`] so checks stay testable

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::kind::Kind;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("provided server is both unix and inet")]
    ConflictingTransport,

    #[error("unexpected clientAuthType")]
    ClientAuthType,

    #[error("network {network:?} is not supported by {kind} server")]
    UnsupportedNetwork { network: String, kind: Kind },

    #[error("pprof prefix {0:?} must be a plain route path starting with '/'")]
    PprofPrefix(String),

    #[error("unix socket path is not provided")]
    PathNotProvided,

    #[error("unix socket parent dir of {path:?} doesn't exist")]
    ParentDirMissing { path: PathBuf },

    #[error("tls cert-file path is not provided")]
    CertPathNotProvided,

    #[error("tls cert-file {path:?} doesn't exist")]
    CertMissing { path: PathBuf },

    #[error("tls key-file path is not provided")]
    KeyPathNotProvided,

    #[error("tls key-file {path:?} doesn't exist")]
    KeyMissing { path: PathBuf },

    #[error("existence check of {path:?} failed: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Filesystem existence check.
pub trait FsProbe {
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

/// [`FsProbe`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }
}

pub(crate) fn exists(probe: &dyn FsProbe, path: &Path) -> Result<bool, ValidationError> {
    probe.exists(path).map_err(|source| ValidationError::Probe {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;

    /// In-memory [`FsProbe`].
    pub(crate) struct FakeFs {
        paths: HashSet<PathBuf>,
        fail: bool,
    }

    impl FakeFs {
        pub(crate) fn with(paths: &[&str]) -> Self {
            Self {
                paths: paths.iter().map(PathBuf::from).collect(),
                fail: false,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                paths: HashSet::new(),
                fail: true,
            }
        }
    }

    impl FsProbe for FakeFs {
        fn exists(&self, path: &Path) -> io::Result<bool> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            Ok(self.paths.contains(path))
        }
    }

    #[test]
    fn real_fs_sees_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RealFs.exists(dir.path()).unwrap());
        assert!(!RealFs.exists(&dir.path().join("nope")).unwrap());
    }

    #[test]
    fn probe_errors_carry_the_path() {
        let err = exists(&FakeFs::failing(), Path::new("/etc/tls")).unwrap_err();
        assert!(err.to_string().contains("/etc/tls"));
    }
}
