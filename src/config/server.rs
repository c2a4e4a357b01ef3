//! Kind-tagged descriptor envelope and the [`Descriptor`] view shared by
//! configured and bound entries.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::config::base::ServerBase;
use crate::config::defaults::Defaults;
use crate::config::dump::DumpCtx;
use crate::config::inet::ServerInet;
use crate::config::kind::Kind;
use crate::config::unix::ServerUnix;
use crate::config::validation::{FsProbe, ValidationError};
use crate::net::listener::ServerListener;

/// A configured listen target.
///
/// Decoding probes `kind` first and then decodes the whole record into the
/// matching variant; UNIX when the kind carries `unix`, INET otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Server {
    Inet(ServerInet),
    Unix(ServerUnix),
}

impl Server {
    pub fn base(&self) -> &ServerBase {
        match self {
            Server::Inet(inet) => &inet.base,
            Server::Unix(unix) => &unix.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ServerBase {
        match self {
            Server::Inet(inet) => &mut inet.base,
            Server::Unix(unix) => &mut unix.base,
        }
    }

    pub fn kind(&self) -> Kind {
        self.base().kind
    }

    pub fn addr(&self) -> String {
        match self {
            Server::Inet(inet) => inet.addr(),
            Server::Unix(unix) => unix.addr(),
        }
    }

    pub fn network(&self) -> &str {
        self.base().network()
    }

    pub fn as_inet(&self) -> Option<&ServerInet> {
        match self {
            Server::Inet(inet) => Some(inet),
            Server::Unix(_) => None,
        }
    }

    pub fn as_unix(&self) -> Option<&ServerUnix> {
        match self {
            Server::Unix(unix) => Some(unix),
            Server::Inet(_) => None,
        }
    }

    /// Label used in lifecycle log lines: `UNIX`, `TLS` or `TCP`.
    pub fn log_prefix(&self) -> &'static str {
        match self {
            Server::Unix(_) => "UNIX",
            Server::Inet(inet) if inet.tls.enable => "TLS",
            Server::Inet(_) => "TCP",
        }
    }

    pub fn defaultize(&mut self, defaults: &Defaults) {
        match self {
            Server::Inet(inet) => inet.defaultize(defaults),
            Server::Unix(unix) => unix.defaultize(defaults),
        }
    }

    pub fn validate(&self, probe: &dyn FsProbe) -> Result<(), ValidationError> {
        match self {
            Server::Inet(inet) => inet.validate(probe),
            Server::Unix(unix) => unix.validate(probe),
        }
    }

    /// Rewrites file paths (certificates, keys, trusted CAs).
    pub fn interpolate(&mut self, f: &dyn Fn(&str) -> String) {
        if let Server::Inet(inet) = self {
            inet.interpolate(f);
        }
    }

    pub fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        ctx.emit_prefix(w)?;
        writeln!(w, "kind: {}", self.kind())?;
        ctx.wrap(|ctx| {
            writeln!(w, "{}network: {}", ctx.indent(), self.network())?;
            match self {
                Server::Inet(inet) => inet.dump(ctx, w),
                Server::Unix(unix) => unix.dump(ctx, w),
            }
        })
    }

    /// Dump rendered at the top level; unset values shown as `defaults`.
    pub fn dump_to_string(&self, defaults: &Defaults) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.dump(&mut DumpCtx::with_defaults(defaults), &mut out);
        out
    }
}

impl From<ServerInet> for Server {
    fn from(inet: ServerInet) -> Self {
        Server::Inet(inet)
    }
}

impl From<ServerUnix> for Server {
    fn from(unix: ServerUnix) -> Self {
        Server::Unix(unix)
    }
}

#[derive(Deserialize)]
struct Head {
    #[serde(default)]
    kind: Kind,
}

impl<'de> Deserialize<'de> for Server {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = serde_json::Value::deserialize(deserializer)?;
        let head = Head::deserialize(&record)
            .map_err(|err| de::Error::custom(format!("error unmarshal server-head-kind: {err}")))?;

        let mut server = head.kind.new_server();
        match &mut server {
            Server::Inet(inet) => *inet = ServerInet::deserialize(record).map_err(de::Error::custom)?,
            Server::Unix(unix) => *unix = ServerUnix::deserialize(record).map_err(de::Error::custom)?,
        }
        Ok(server)
    }
}

/// Read access shared by configured descriptors and bound listeners.
pub trait Descriptor {
    fn server(&self) -> &Server;

    /// The bound listener, for entries produced by the listen phase.
    fn bound(&self) -> Option<&ServerListener> {
        None
    }

    fn kind(&self) -> Kind {
        self.server().kind()
    }

    fn addr(&self) -> String {
        self.server().addr()
    }
}

impl Descriptor for Server {
    fn server(&self) -> &Server {
        self
    }
}

impl<D: Descriptor + ?Sized> Descriptor for &D {
    fn server(&self) -> &Server {
        (**self).server()
    }

    fn bound(&self) -> Option<&ServerListener> {
        (**self).bound()
    }
}

impl<D: Descriptor + ?Sized> Descriptor for &mut D {
    fn server(&self) -> &Server {
        (**self).server()
    }

    fn bound(&self) -> Option<&ServerListener> {
        (**self).bound()
    }
}
