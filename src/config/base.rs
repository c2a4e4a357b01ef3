//! Fields shared by every descriptor variant.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::defaults::Defaults;
use crate::config::dump::DumpCtx;
use crate::config::duration;
use crate::config::kind::Kind;
use crate::config::tls::ClientAuthTlsConfig;
use crate::config::validation::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(with = "duration")]
    pub read_header_timeout: Duration,
    pub client_auth: ClientAuthTlsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrpcConfig {
    pub reflection: bool,
    pub client_auth: ClientAuthTlsConfig,
}

/// Diagnostics route toggle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PprofConfig {
    pub enable: bool,
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerBase {
    pub kind: Kind,
    /// Transport override: `tcp`, `tcp4`, `tcp6` or `unix`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network: String,
    pub http: HttpConfig,
    pub grpc: GrpcConfig,
    pub pprof: PprofConfig,
}

/// Absolute path without captures or wildcards.
fn is_plain_route(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with([':', '*']))
}

impl ServerBase {
    pub fn network(&self) -> &str {
        if !self.network.is_empty() {
            &self.network
        } else if self.kind.has(Kind::UNIX) {
            "unix"
        } else {
            "tcp"
        }
    }

    /// Protocol-level client auth block: gRPC's when the kind carries gRPC,
    /// HTTP's otherwise.
    pub fn protocol_client_auth(&self) -> &ClientAuthTlsConfig {
        if self.kind.has(Kind::GRPC) {
            &self.grpc.client_auth
        } else {
            &self.http.client_auth
        }
    }

    pub(crate) fn defaultize(&mut self, defaults: &Defaults) {
        if !self.kind.has(Kind::INET) && !self.kind.has(Kind::UNIX) {
            self.kind.set(Kind::INET);
        }
        if !self.kind.has(Kind::HTTP) && !self.kind.has(Kind::GRPC) {
            self.kind.set(Kind::HTTP);
        }

        if self.pprof.prefix.is_empty() {
            self.pprof.prefix = defaults.pprof_prefix.clone();
        }
        if self.http.read_header_timeout.is_zero() {
            self.http.read_header_timeout = defaults.read_header_timeout;
        }

        self.http.client_auth.defaultize(defaults);
        self.grpc.client_auth.defaultize(defaults);
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        self.kind.validate()?;

        let auth = self.protocol_client_auth();
        if auth.enable && auth.auth_type.is_unknown() {
            return Err(ValidationError::ClientAuthType);
        }

        if !self.network.is_empty() {
            let supported: &[&str] = if self.kind.has(Kind::UNIX) {
                &["unix"]
            } else {
                &["tcp", "tcp4", "tcp6"]
            };
            if !supported.contains(&self.network.as_str()) {
                return Err(ValidationError::UnsupportedNetwork {
                    network: self.network.clone(),
                    kind: self.kind,
                });
            }
        }

        if !self.pprof.prefix.is_empty() && !is_plain_route(&self.pprof.prefix) {
            return Err(ValidationError::PprofPrefix(self.pprof.prefix.clone()));
        }

        Ok(())
    }

    pub(crate) fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        if self.kind.has(Kind::GRPC) {
            writeln!(w, "{}grpc:", ctx.indent())?;
            ctx.wrap(|ctx| {
                writeln!(w, "{}reflection: {}", ctx.indent(), self.grpc.reflection)?;
                writeln!(w, "{}clientAuth:", ctx.indent())?;
                ctx.wrap(|ctx| self.grpc.client_auth.dump(ctx, w))
            })?;
        }

        if self.kind.has(Kind::HTTP) {
            writeln!(w, "{}http:", ctx.indent())?;
            ctx.wrap(|ctx| {
                writeln!(
                    w,
                    "{}readHeaderTimeout: {}",
                    ctx.indent(),
                    duration::format(self.http.read_header_timeout)
                )?;
                writeln!(w, "{}clientAuth:", ctx.indent())?;
                ctx.wrap(|ctx| self.http.client_auth.dump(ctx, w))
            })?;
        }

        writeln!(w, "{}pprof:", ctx.indent())?;
        ctx.wrap(|ctx| {
            writeln!(w, "{}enable: {}", ctx.indent(), self.pprof.enable)?;
            writeln!(w, "{}prefix: {:?}", ctx.indent(), self.pprof.prefix)
        })
    }
}
