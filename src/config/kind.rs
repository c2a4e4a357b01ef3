//! Server kind bitmask.
//!
//! A kind combines one transport flag (`inet` or `unix`) with one or more
//! protocol flags (`http`, `grpc`). Configuration accepts either a single
//! token or a list of tokens:
//!
//! ```text
//! kind: inet
//! kind: [unix, http]
//! ```

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::config::inet::ServerInet;
use crate::config::server::Server;
use crate::config::unix::ServerUnix;
use crate::config::validation::ValidationError;

/// Bitmask of transport and protocol capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Kind(u8);

impl Kind {
    pub const EMPTY: Kind = Kind(0);

    /// AF_INET
    pub const INET: Kind = Kind(1 << 0);
    /// AF_UNIX
    pub const UNIX: Kind = Kind(1 << 1);

    pub const HTTP: Kind = Kind(1 << 2);
    pub const GRPC: Kind = Kind(1 << 3);

    const NAMED: [(Kind, &'static str); 4] = [
        (Kind::INET, "inet"),
        (Kind::UNIX, "unix"),
        (Kind::HTTP, "http"),
        (Kind::GRPC, "grpc"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when exactly one flag is set.
    pub const fn is_single(self) -> bool {
        !self.is_empty() && (self.0 & (self.0 - 1)) == 0
    }

    pub const fn has(self, flag: Kind) -> bool {
        (self.0 & flag.0) != 0
    }

    pub fn set(&mut self, flag: Kind) {
        self.0 |= flag.0;
    }

    pub fn unset(&mut self, flag: Kind) {
        self.0 &= !flag.0;
    }

    /// Returns a copy with `flag` added.
    pub const fn with(self, flag: Kind) -> Kind {
        Kind(self.0 | flag.0)
    }

    /// Lenient single-token parse. Unknown tokens yield [`Kind::EMPTY`].
    pub fn parse(token: &str) -> Kind {
        let token = normalize(token);
        Kind::NAMED
            .iter()
            .find(|(_, name)| *name == token)
            .map(|(kind, _)| *kind)
            .unwrap_or(Kind::EMPTY)
    }

    /// Lenient parse of a token list; unknown tokens contribute nothing.
    pub fn parse_list<S: AsRef<str>>(tokens: &[S]) -> Kind {
        tokens.iter().fold(Kind::EMPTY, |kind, token| {
            kind.with(Kind::parse(token.as_ref()))
        })
    }

    /// Strict parse of a token list, rejecting unknown tokens.
    pub fn try_parse_list<S: AsRef<str>>(tokens: &[S]) -> Result<Kind, ConfigError> {
        tokens.iter().try_fold(Kind::EMPTY, |kind, token| {
            Ok(kind.with(token.as_ref().parse::<Kind>()?))
        })
    }

    pub fn to_string_list(self) -> Vec<&'static str> {
        Kind::NAMED
            .iter()
            .filter(|(flag, _)| self.has(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Bare token for single kinds, list form otherwise.
    pub fn to_string_single(self) -> String {
        if self.is_single() {
            self.to_string_list()[0].to_string()
        } else {
            self.to_string()
        }
    }

    pub fn validate(self) -> Result<(), ValidationError> {
        if self.has(Kind::INET) && self.has(Kind::UNIX) {
            return Err(ValidationError::ConflictingTransport);
        }
        Ok(())
    }

    /// Default-valued descriptor for this kind: UNIX when the UNIX bit is
    /// set, INET otherwise.
    pub fn new_server(self) -> Server {
        if self.has(Kind::UNIX) {
            Server::Unix(ServerUnix::default())
        } else {
            Server::Inet(ServerInet::default())
        }
    }
}

fn normalize(token: &str) -> String {
    token
        .trim()
        .replace(['/', '"', '\''], "")
        .replace(['_', ' '], "-")
        .to_lowercase()
}

impl FromStr for Kind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Kind::parse(s) {
            Kind::EMPTY => Err(ConfigError::Parse {
                what: "kind",
                value: s.to_string(),
            }),
            kind => Ok(kind),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("~");
        }
        write!(f, "[{}]", self.to_string_list().join(", "))
    }
}

impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.to_string_list();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KindRepr {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match KindRepr::deserialize(deserializer)? {
            KindRepr::One(token) => token.parse::<Kind>(),
            KindRepr::Many(tokens) => Kind::try_parse_list(&tokens),
        };
        parsed.map_err(de::Error::custom)
    }
}

/// Protocol served on a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Grpc,
}

impl Protocol {
    pub fn kind(self) -> Kind {
        match self {
            Protocol::Http => Kind::HTTP,
            Protocol::Grpc => Kind::GRPC,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Grpc => "gRPC",
        }
    }

    /// ALPN identifiers offered during the TLS handshake.
    pub fn alpn(self) -> Vec<Vec<u8>> {
        match self {
            Protocol::Http => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
            Protocol::Grpc => vec![b"h2".to_vec()],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
