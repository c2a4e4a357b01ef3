//! Ordered descriptor collection.
//!
//! Order is configuration order and defines "first" for fallback filling and
//! the `*_if_not_exists` helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::defaults::{Defaults, Fallbacks};
use crate::config::dump::DumpCtx;
use crate::config::inet::ServerInet;
use crate::config::iter::Iter;
use crate::config::kind::Kind;
use crate::config::server::{Descriptor, Server};
use crate::config::unix::ServerUnix;
use crate::config::validation::{FsProbe, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Servers<T = Server> {
    items: Vec<T>,
}

impl<T> Default for Servers<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Servers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn iter<'a>(&'a self) -> Iter<&'a T, impl FnOnce(&mut dyn FnMut(&'a T) -> bool) -> bool + 'a> {
        let items = &self.items;
        Iter::new(move |visit: &mut dyn FnMut(&'a T) -> bool| items.iter().all(|item| visit(item)))
    }

    pub fn iter_mut<'a>(
        &'a mut self,
    ) -> Iter<&'a mut T, impl FnOnce(&mut dyn FnMut(&'a mut T) -> bool) -> bool + 'a> {
        let items = &mut self.items;
        Iter::new(move |visit: &mut dyn FnMut(&'a mut T) -> bool| {
            IntoIterator::into_iter(items).all(|item| visit(item))
        })
    }
}

impl<T> From<Vec<T>> for Servers<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for Servers<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for Servers<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Servers<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Descriptor> Servers<T> {
    /// Writes ` (xN):` followed by one list item per descriptor, or `: ~`
    /// when the collection is empty. The caller writes the heading.
    pub fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        let count = self.iter().len();
        if count == 0 {
            return w.write_str(": ~\n");
        }

        writeln!(w, " (x{count}):")?;
        let mut result = Ok(());
        self.iter().for_each_while(|entry| {
            result = ctx.wrap_list(|ctx| entry.server().dump(ctx, w));
            result.is_ok()
        });
        result
    }

    pub fn dump_to_string(&self, heading: &str, defaults: &Defaults) -> String {
        let mut out = heading.to_string();
        // Writing into a String cannot fail.
        let _ = self.dump(&mut DumpCtx::with_defaults(defaults), &mut out);
        out
    }
}

impl Servers<Server> {
    /// Defaultizes every descriptor, then fills the first UNIX descriptor's
    /// empty path and the first INET descriptor's empty host / zero port
    /// from `fallbacks`. Later descriptors are left as configured.
    pub fn defaultize(&mut self, fallbacks: &Fallbacks, defaults: &Defaults) {
        self.iter_mut().for_each(|server| server.defaultize(defaults));

        if let Some(Server::Unix(unix)) = self.iter_mut().filter_unix().first() {
            if unix.path.is_empty() {
                unix.path = fallbacks.unix_addr.clone();
            }
        }

        if let Some(Server::Inet(inet)) = self.iter_mut().filter_inet().first() {
            if inet.host.is_empty() {
                inet.host = fallbacks.inet_host.clone();
            }
            if inet.port == 0 {
                inet.port = fallbacks.inet_port;
            }
        }
    }

    /// First failing descriptor wins.
    pub fn validate(&self, probe: &dyn FsProbe) -> Result<(), ValidationError> {
        let mut outcome = Ok(());
        self.iter().for_each_while(|server| {
            outcome = server.validate(probe);
            outcome.is_ok()
        });
        outcome
    }

    pub fn interpolate(&mut self, f: impl Fn(&str) -> String) {
        self.iter_mut().for_each(|server| server.interpolate(&f));
    }

    /// Appends an INET descriptor unless one already exists.
    pub fn push_inet_if_not_exists(&mut self, host: &str, port: u16, kind: Kind) {
        if !self.iter().filter_inet().is_empty() {
            return;
        }

        let mut inet = ServerInet {
            host: host.to_string(),
            port,
            ..ServerInet::default()
        };
        inet.base.kind = Kind::INET.with(kind);
        self.push(Server::Inet(inet));
    }

    /// Appends a UNIX descriptor unless one already exists.
    pub fn push_unix_if_not_exists(&mut self, addr: &str, kind: Kind) {
        if !self.iter().filter_unix().is_empty() {
            return;
        }

        let mut unix = ServerUnix {
            path: addr.to_string(),
            ..ServerUnix::default()
        };
        unix.base.kind = Kind::UNIX.with(kind);
        self.push(Server::Unix(unix));
    }

    /// Overrides the port of the first INET descriptor. Returns `false` when
    /// there is none.
    pub fn set_port_to_first_inet(&mut self, port: u16) -> bool {
        match self.iter_mut().filter_inet().first() {
            Some(Server::Inet(inet)) => {
                inet.set_port(port);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::tests::FakeFs;

    fn decode(json: &str) -> Servers {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn unix_fallback_fills_empty_path() {
        let mut servers = decode(r#"[{"kind": "unix"}]"#);
        let fallbacks = Fallbacks {
            unix_addr: "/tmp/x.sock".to_string(),
            ..Fallbacks::default()
        };
        servers.defaultize(&fallbacks, &Defaults::default());

        let unix = servers.as_slice()[0].as_unix().unwrap();
        assert_eq!(unix.path, "/tmp/x.sock");
        assert_eq!(unix.base.kind, Kind::UNIX.with(Kind::HTTP));
        assert_eq!(unix.socket_file_mode.perm(), 0o666);
    }

    #[test]
    fn inet_fallback_fills_host_and_port() {
        let mut servers = decode(r#"[{"kind": "inet"}]"#);
        servers.defaultize(&Fallbacks::default(), &Defaults::default());
        assert_eq!(servers.as_slice()[0].addr(), "0.0.0.0:80");
    }

    #[test]
    fn only_first_of_each_transport_is_filled() {
        let mut servers = decode(
            r#"[{"kind": "unix"}, {"kind": "unix"}, {"kind": "inet"}, {"kind": "inet", "port": 9000}]"#,
        );
        let fallbacks = Fallbacks {
            unix_addr: "/tmp/x.sock".to_string(),
            inet_host: "127.0.0.1".to_string(),
            inet_port: 8080,
        };
        servers.defaultize(&fallbacks, &Defaults::default());

        let slice = servers.as_slice();
        assert_eq!(slice[0].addr(), "/tmp/x.sock");
        assert_eq!(slice[1].addr(), "");
        assert_eq!(slice[2].addr(), "127.0.0.1:8080");
        assert_eq!(slice[3].addr(), ":9000");

        // The unfilled second UNIX descriptor surfaces at validation.
        let fs = FakeFs::with(&["/tmp"]);
        assert!(matches!(
            servers.validate(&fs),
            Err(ValidationError::PathNotProvided)
        ));
    }

    #[test]
    fn defaultized_descriptors_validate() {
        let mut servers = decode(
            r#"[
                {"kind": ["unix", "grpc"], "addr": "/run/a.sock", "grpc": {"clientAuth": {"enable": true}}},
                {"kind": ["inet", "http"], "host": "localhost", "port": 1, "clientAuth": {"tls": {"enable": true}}},
                {}
            ]"#,
        );
        servers.defaultize(&Fallbacks::default(), &Defaults::default());
        assert!(servers.validate(&FakeFs::with(&["/run"])).is_ok());
    }

    #[test]
    fn validation_reports_first_failure() {
        let mut servers = decode(
            r#"[
                {"kind": "inet", "host": "a", "port": 1, "tls": {"enable": true, "certFile": "/missing.pem", "keyFile": "/k.pem"}},
                {"kind": ["unix", "inet"], "addr": "/run/a.sock"}
            ]"#,
        );
        servers.defaultize(&Fallbacks::default(), &Defaults::default());
        assert!(matches!(
            servers.validate(&FakeFs::with(&["/run", "/k.pem"])),
            Err(ValidationError::CertMissing { .. })
        ));
    }

    #[test]
    fn push_if_not_exists_respects_existing_transports() {
        let mut servers: Servers = Servers::new();
        servers.push_inet_if_not_exists("0.0.0.0", 8080, Kind::HTTP);
        servers.push_inet_if_not_exists("0.0.0.0", 9090, Kind::GRPC);
        servers.push_unix_if_not_exists("/run/a.sock", Kind::GRPC);
        servers.push_unix_if_not_exists("/run/b.sock", Kind::HTTP);

        assert_eq!(servers.len(), 2);
        assert_eq!(servers.as_slice()[0].kind(), Kind::INET.with(Kind::HTTP));
        assert_eq!(servers.as_slice()[0].addr(), "0.0.0.0:8080");
        assert_eq!(servers.as_slice()[1].kind(), Kind::UNIX.with(Kind::GRPC));
    }

    #[test]
    fn set_port_targets_first_inet() {
        let mut servers = decode(
            r#"[{"kind": "unix", "addr": "/a"}, {"kind": "inet", "port": 1}, {"kind": "inet", "port": 2}]"#,
        );
        assert!(servers.set_port_to_first_inet(7000));
        let ports: Vec<u16> = servers
            .iter()
            .collect_vec()
            .into_iter()
            .filter_map(|server| server.as_inet().map(|inet| inet.port))
            .collect();
        assert_eq!(ports, vec![7000, 2]);

        let mut unix_only = decode(r#"[{"kind": "unix", "addr": "/a"}]"#);
        assert!(!unix_only.set_port_to_first_inet(7000));
    }

    #[test]
    fn dump_counts_entries() {
        let mut servers = decode(r#"[{"kind": "inet", "port": 1}, {"kind": "unix", "addr": "/a"}]"#);
        servers.defaultize(&Fallbacks::default(), &Defaults::default());

        let out = servers.dump_to_string("servers", &Defaults::default());
        assert!(out.starts_with("servers (x2):\n  - kind: [inet, http]\n"));
        assert!(out.contains("  - kind: [unix, http]\n    network: unix\n"));

        assert_eq!(
            Servers::<Server>::new().dump_to_string("servers", &Defaults::default()),
            "servers: ~\n"
        );
    }

    #[test]
    fn toml_array_decodes() {
        #[derive(Deserialize)]
        struct File {
            servers: Servers,
        }

        let file: File = toml::from_str(
            r#"
            [[servers]]
            kind = ["unix", "http"]
            addr = "/run/a.sock"
            socketFileMode = "0600"

            [[servers]]
            kind = "inet"
            host = "localhost"
            port = 8080
            http = { readHeaderTimeout = "2s" }
            "#,
        )
        .unwrap();

        let slice = file.servers.as_slice();
        assert_eq!(slice[0].as_unix().unwrap().socket_file_mode.perm(), 0o600);
        assert_eq!(
            slice[1].base().http.read_header_timeout,
            std::time::Duration::from_secs(2)
        );
    }
}
