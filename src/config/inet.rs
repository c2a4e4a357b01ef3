//! TCP/IP descriptor.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::base::ServerBase;
use crate::config::defaults::Defaults;
use crate::config::dump::DumpCtx;
use crate::config::tls::{ClientAuth, ClientAuthTlsConfig, TlsConfig};
use crate::config::validation::{exists, FsProbe, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerInet {
    #[serde(flatten)]
    pub base: ServerBase,
    pub host: String,
    pub port: u16,
    pub tls: TlsConfig,
    pub client_auth: ClientAuth,
}

impl ServerInet {
    /// `host:port`, with IPv6 hosts bracketed.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// Client auth policy in force: the descriptor-level `clientAuth.tls`
    /// block when enabled, the protocol block otherwise.
    pub fn effective_client_auth(&self) -> &ClientAuthTlsConfig {
        if self.client_auth.tls.enable {
            &self.client_auth.tls
        } else {
            self.base.protocol_client_auth()
        }
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.enable || self.effective_client_auth().enable
    }

    pub(crate) fn defaultize(&mut self, defaults: &Defaults) {
        self.base.defaultize(defaults);
        self.tls.defaultize(defaults);
        self.client_auth.tls.defaultize(defaults);
    }

    pub(crate) fn validate(&self, probe: &dyn FsProbe) -> Result<(), ValidationError> {
        self.base.validate()?;

        if self.client_auth.tls.enable && self.client_auth.tls.auth_type.is_unknown() {
            return Err(ValidationError::ClientAuthType);
        }

        if self.tls.enable {
            if self.tls.cert_file.is_empty() {
                return Err(ValidationError::CertPathNotProvided);
            }
            if !exists(probe, Path::new(&self.tls.cert_file))? {
                return Err(ValidationError::CertMissing {
                    path: self.tls.cert_file.clone().into(),
                });
            }

            if self.tls.key_file.is_empty() {
                return Err(ValidationError::KeyPathNotProvided);
            }
            if !exists(probe, Path::new(&self.tls.key_file))? {
                return Err(ValidationError::KeyMissing {
                    path: self.tls.key_file.clone().into(),
                });
            }
        }

        Ok(())
    }

    pub(crate) fn interpolate(&mut self, f: &dyn Fn(&str) -> String) {
        self.tls.cert_file = f(&self.tls.cert_file);
        self.tls.key_file = f(&self.tls.key_file);
        self.client_auth.tls.trusted_ca = f(&self.client_auth.tls.trusted_ca);
        self.base.http.client_auth.trusted_ca = f(&self.base.http.client_auth.trusted_ca);
        self.base.grpc.client_auth.trusted_ca = f(&self.base.grpc.client_auth.trusted_ca);
    }

    pub(crate) fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(w, "{}host: {}", ctx.indent(), self.host)?;
        writeln!(w, "{}port: {}", ctx.indent(), self.port)?;
        self.tls.dump(ctx, w)?;
        self.client_auth.dump(ctx, w)?;
        self.base.dump(ctx, w)
    }
}
