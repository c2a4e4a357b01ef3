//! TLS policy types: protocol versions, client authentication policies and
//! the `tls` / `clientAuth` blocks of a descriptor.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::config::defaults::Defaults;
use crate::config::dump::DumpCtx;
use crate::config::error::ConfigError;

/// TLS protocol version. `Unknown` means "not configured".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TlsVersion {
    #[default]
    Unknown,
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    pub fn is_unknown(&self) -> bool {
        *self == TlsVersion::Unknown
    }

    pub fn or_default(self, defaults: &Defaults) -> TlsVersion {
        match self {
            TlsVersion::Unknown => defaults.tls_version,
            version => version,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TlsVersion::Unknown => "unknown",
            TlsVersion::Tls10 => "tls-1.0",
            TlsVersion::Tls11 => "tls-1.1",
            TlsVersion::Tls12 => "tls-1.2",
            TlsVersion::Tls13 => "tls-1.3",
        }
    }

    /// rustls implements TLS 1.2 and 1.3 only.
    pub fn protocol_version(self) -> Option<&'static rustls::SupportedProtocolVersion> {
        match self {
            TlsVersion::Tls12 => Some(&rustls::version::TLS12),
            TlsVersion::Tls13 => Some(&rustls::version::TLS13),
            _ => None,
        }
    }
}

impl FromStr for TlsVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tls-1.0" | "tls 1.0" | "versiontls10" => Ok(TlsVersion::Tls10),
            "tls-1.1" | "tls 1.1" | "versiontls11" => Ok(TlsVersion::Tls11),
            "tls-1.2" | "tls 1.2" | "versiontls12" => Ok(TlsVersion::Tls12),
            "tls-1.3" | "tls 1.3" | "versiontls13" => Ok(TlsVersion::Tls13),
            _ => Err(ConfigError::Parse {
                what: "tls version",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TlsVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TlsVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Client certificate policy applied during the TLS handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientAuthType {
    #[default]
    Unknown,
    NoClientCert,
    RequestClientCert,
    RequireAnyClientCert,
    VerifyClientCertIfGiven,
    RequireAndVerifyClientCert,
}

impl ClientAuthType {
    pub fn is_unknown(&self) -> bool {
        *self == ClientAuthType::Unknown
    }

    pub fn or_default(self, defaults: &Defaults) -> ClientAuthType {
        match self {
            ClientAuthType::Unknown => defaults.client_auth_type,
            auth => auth,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientAuthType::Unknown => "unknown",
            ClientAuthType::NoClientCert => "NoClientCert",
            ClientAuthType::RequestClientCert => "RequestClientCert",
            ClientAuthType::RequireAnyClientCert => "RequireAnyClientCert",
            ClientAuthType::VerifyClientCertIfGiven => "VerifyClientCertIfGiven",
            ClientAuthType::RequireAndVerifyClientCert => "RequireAndVerifyClientCert",
        }
    }

    /// Whether a presented client certificate is checked against a CA.
    pub fn verifies_chain(self) -> bool {
        matches!(
            self,
            ClientAuthType::VerifyClientCertIfGiven | ClientAuthType::RequireAndVerifyClientCert
        )
    }
}

impl FromStr for ClientAuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NoClientCert" | "no-client-cert" => Ok(ClientAuthType::NoClientCert),
            "RequestClientCert" | "request-client-cert" => Ok(ClientAuthType::RequestClientCert),
            "RequireAnyClientCert" | "require-any-client-cert" => {
                Ok(ClientAuthType::RequireAnyClientCert)
            }
            "VerifyClientCertIfGiven" | "verify-client-cert-if-given" => {
                Ok(ClientAuthType::VerifyClientCertIfGiven)
            }
            "RequireAndVerifyClientCert" | "require-and-verify-client-cert" => {
                Ok(ClientAuthType::RequireAndVerifyClientCert)
            }
            _ => Err(ConfigError::Parse {
                what: "client auth type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ClientAuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClientAuthType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClientAuthType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Server-side TLS block of an INET descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsConfig {
    pub enable: bool,
    pub cert_file: String,
    pub key_file: String,
    #[serde(skip_serializing_if = "TlsVersion::is_unknown")]
    pub min_version: TlsVersion,
    #[serde(skip_serializing_if = "TlsVersion::is_unknown")]
    pub max_version: TlsVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_server_cipher_suites: Option<bool>,
}

impl TlsConfig {
    pub fn prefer_server_cipher_suites(&self, defaults: &Defaults) -> bool {
        self.prefer_server_cipher_suites
            .unwrap_or(defaults.prefer_server_cipher_suites)
    }

    pub(crate) fn defaultize(&mut self, defaults: &Defaults) {
        self.min_version = self.min_version.or_default(defaults);
        self.max_version = self.max_version.or_default(defaults);
        if self.prefer_server_cipher_suites.is_none() {
            self.prefer_server_cipher_suites = Some(defaults.prefer_server_cipher_suites);
        }
    }

    pub(crate) fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        let defaults = ctx.defaults().clone();
        let prefer = self.prefer_server_cipher_suites(&defaults);

        writeln!(w, "{}tls:", ctx.indent())?;
        ctx.wrap(|ctx| {
            writeln!(w, "{}enable: {}", ctx.indent(), self.enable)?;
            writeln!(w, "{}certFile: {}", ctx.indent(), self.cert_file)?;
            writeln!(w, "{}keyFile: {}", ctx.indent(), self.key_file)?;
            writeln!(w, "{}minVersion: {}", ctx.indent(), self.min_version.or_default(&defaults))?;
            writeln!(w, "{}maxVersion: {}", ctx.indent(), self.max_version.or_default(&defaults))?;
            writeln!(w, "{}preferServerCipherSuites: {}", ctx.indent(), prefer)?;
            if self.enable && !prefer {
                writeln!(
                    w,
                    "{}WARNING: preferServerCipherSuites is false. Set to true for avoid potentinal security risk!",
                    ctx.indent()
                )?;
            }
            Ok(())
        })
    }
}

/// Mutual-TLS policy block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientAuthTlsConfig {
    pub enable: bool,
    #[serde(skip_serializing_if = "ClientAuthType::is_unknown")]
    pub auth_type: ClientAuthType,
    /// PEM bundle of CAs trusted to sign client certificates.
    pub trusted_ca: String,
    /// Dumped for operators; not enforced during the handshake.
    pub client_common_names: Vec<String>,
}

impl ClientAuthTlsConfig {
    pub(crate) fn defaultize(&mut self, defaults: &Defaults) {
        self.auth_type = self.auth_type.or_default(defaults);
    }

    pub(crate) fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        let auth_type = self.auth_type.or_default(ctx.defaults());

        writeln!(w, "{}tls:", ctx.indent())?;
        ctx.wrap(|ctx| {
            writeln!(w, "{}enable: {}", ctx.indent(), self.enable)?;
            writeln!(w, "{}authType: {}", ctx.indent(), auth_type)?;
            writeln!(w, "{}trustedCa: {:?}", ctx.indent(), self.trusted_ca)?;
            writeln!(
                w,
                "{}clientCommonNames: [{}]",
                ctx.indent(),
                self.client_common_names.join(", ")
            )
        })
    }
}

/// `clientAuth` wrapper, keyed by mechanism.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientAuth {
    pub tls: ClientAuthTlsConfig,
}

impl ClientAuth {
    pub(crate) fn dump(&self, ctx: &mut DumpCtx, w: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(w, "{}clientAuth:", ctx.indent())?;
        ctx.wrap(|ctx| self.tls.dump(ctx, w))
    }
}
