//! UNIX domain socket descriptor.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::config::base::ServerBase;
use crate::config::defaults::Defaults;
use crate::config::dump::DumpCtx;
use crate::config::error::ConfigError;
use crate::config::validation::{exists, FsProbe, ValidationError};

/// File type bits of a socket inode.
const S_IFSOCK: u32 = 0o140000;

/// Socket file mode. The permission bits are what `chmod` receives; the
/// socket marker is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SocketMode(u32);

impl SocketMode {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn perm(self) -> u32 {
        self.0 & 0o777
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_socket(self) -> bool {
        self.0 & S_IFSOCK == S_IFSOCK
    }

    pub const fn with_socket_marker(self) -> Self {
        Self(self.0 | S_IFSOCK)
    }

    /// `ls -l` style rendering, e.g. `srw-rw-rw-`.
    pub fn symbolic(self) -> String {
        let mut out = String::with_capacity(10);
        out.push(if self.is_socket() { 's' } else { '-' });
        for shift in [6u32, 3, 0] {
            let bits = (self.0 >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        out
    }
}

impl std::str::FromStr for SocketMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0o")
            .or_else(|| trimmed.strip_prefix("0O"))
            .unwrap_or(trimmed);
        u32::from_str_radix(digits, 8)
            .ok()
            .filter(|bits| *bits <= 0o7777)
            .map(SocketMode)
            .ok_or_else(|| ConfigError::Parse {
                what: "socket file mode",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for SocketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o} | {}", self.perm(), self.symbolic())
    }
}

impl Serialize for SocketMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:04o}", self.perm()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Bits(u32),
    Octal(String),
}

impl<'de> Deserialize<'de> for SocketMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ModeRepr::deserialize(deserializer)? {
            ModeRepr::Bits(bits) => Ok(SocketMode(bits)),
            ModeRepr::Octal(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerUnix {
    #[serde(flatten)]
    pub base: ServerBase,
    /// Socket path.
    #[serde(rename = "addr")]
    pub path: String,
    #[serde(skip_serializing_if = "SocketMode::is_zero")]
    pub socket_file_mode: SocketMode,
}

impl ServerUnix {
    pub fn addr(&self) -> String {
        self.path.clone()
    }

    pub(crate) fn defaultize(&mut self, defaults: &Defaults) {
        self.base.defaultize(defaults);
        if self.socket_file_mode.is_zero() {
            self.socket_file_mode = defaults.socket_file_mode.with_socket_marker();
        }
    }

    pub(crate) fn validate(&self, probe: &dyn FsProbe) -> Result<(), ValidationError> {
        self.base.validate()?;

        if self.path.is_empty() {
            return Err(ValidationError::PathNotProvided);
        }

        let parent = match Path::new(&self.path).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !exists(probe, parent)? {
            return Err(ValidationError::ParentDirMissing {
                path: self.path.clone().into(),
            });
        }

        Ok(())
    }

    pub(crate) fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(w, "{}addr: {}", ctx.indent(), self.path)?;
        writeln!(w, "{}socketFileMode: {}", ctx.indent(), self.socket_file_mode)?;
        self.base.dump(ctx, w)
    }
}
