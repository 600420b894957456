//! Settings file: loading, first-run setup, validation and redaction.
//!
//! Settings are a PascalCase JSON document (`System.json` by default). They
//! are loaded once at startup and handed to the server as an immutable value;
//! nothing mutates them afterwards.
//!
//! Integer flags (`0`/`1`) are accepted wherever a boolean is expected so that
//! existing deployments' files keep loading.

use std::{fmt, fs, path::Path};

use cryptoserver_crypto::{MASTER_MATERIAL_LEN, MasterSecret};
use serde::{Deserialize, Serialize};

use crate::{error::ServerError, system_env::SystemEnv};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 9000;

/// Default listen hostname.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Placeholder written over secret fields by [`Settings::redacted`].
pub const REDACTED: &str = "********";

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// Start the interactive console
    #[serde(default, with = "flag")]
    pub enable_console: bool,
    /// Listener configuration
    pub server: ServerSettings,
    /// Master key material
    pub crypto: CryptoSettings,
    /// API key authentication
    pub auth: AuthSettings,
    /// Logging behaviour
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerSettings {
    /// Hostname to listen on; also recorded on each connection
    pub dns_hostname: String,
    /// TCP port
    pub port: u16,
    /// TLS requested. Not terminated by this process
    #[serde(default, with = "flag")]
    pub ssl: bool,
    /// Name of this node, recorded on each connection
    #[serde(default = "default_node_name")]
    pub node_name: String,
}

/// Master key material. Each value is 16 characters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CryptoSettings {
    /// Passphrase sealing session keys into KSNs
    pub passphrase: String,
    /// Key derivation salt
    pub salt: String,
    /// AES-CBC initialization vector
    pub init_vector: String,
}

impl fmt::Debug for CryptoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoSettings").finish_non_exhaustive()
    }
}

/// API key authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthSettings {
    /// Request header carrying the API key
    pub api_key_header: String,
    /// Key granting the administrative endpoints
    pub admin_api_key: String,
    /// Key granting encrypt and decrypt
    pub crypto_api_key: String,
}

/// Logging behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingSettings {
    /// 0 debug, 1 info, 2 warn, 3 and above error
    #[serde(default = "default_severity")]
    pub minimum_severity_level: u8,
    /// Log every inbound request
    #[serde(default, with = "flag")]
    pub log_requests: bool,
    /// Log every outbound response
    #[serde(default, with = "flag")]
    pub log_responses: bool,
    /// Write log output to the terminal
    #[serde(default = "default_true", with = "flag")]
    pub console_logging: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            minimum_severity_level: default_severity(),
            log_requests: false,
            log_responses: false,
            console_logging: true,
        }
    }
}

impl LoggingSettings {
    /// `tracing` filter directive for the configured minimum severity.
    pub fn filter_directive(&self) -> &'static str {
        match self.minimum_severity_level {
            0 => "debug",
            1 => "info",
            2 => "warn",
            _ => "error",
        }
    }
}

fn default_node_name() -> String {
    "cryptoserver".to_string()
}

fn default_severity() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Default configuration with fresh random key material.
    ///
    /// Passphrase, salt and IV are each 16 hex characters from the OS RNG.
    ///
    /// # Errors
    ///
    /// - `Internal`: the OS RNG is unavailable
    pub fn generate(env: &SystemEnv, hostname: &str, port: u16) -> Result<Self, ServerError> {
        Ok(Self {
            enable_console: true,
            server: ServerSettings {
                dns_hostname: hostname.to_string(),
                port,
                ssl: false,
                node_name: default_node_name(),
            },
            crypto: CryptoSettings {
                passphrase: env.random_hex(MASTER_MATERIAL_LEN)?,
                salt: env.random_hex(MASTER_MATERIAL_LEN)?,
                init_vector: env.random_hex(MASTER_MATERIAL_LEN)?,
            },
            auth: AuthSettings {
                api_key_header: "x-api-key".to_string(),
                admin_api_key: "admin".to_string(),
                crypto_api_key: "user".to_string(),
            },
            logging: LoggingSettings::default(),
        })
    }

    /// Read and parse a settings file.
    ///
    /// # Errors
    ///
    /// - `Config`: the file is unreadable or not valid settings JSON
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("unable to read {}: {e}", path.display())))?;

        serde_json::from_str(&text)
            .map_err(|e| ServerError::Config(format!("unable to parse {}: {e}", path.display())))
    }

    /// Load `path`, writing a freshly generated default first if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// - `Config`: the existing file is unreadable or invalid
    /// - `Transport`: the default could not be written
    /// - `Internal`: the OS RNG is unavailable
    pub fn load_or_setup(path: &Path, env: &SystemEnv) -> Result<Self, ServerError> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::info!("No settings found at {}, running setup", path.display());
        Self::setup(path, env, DEFAULT_HOSTNAME, DEFAULT_PORT, false)
    }

    /// Generate a default configuration and write it to `path`.
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    ///
    /// # Errors
    ///
    /// - `Config`: `path` exists and `force` is not set
    /// - `Transport`: the file could not be written
    /// - `Internal`: the OS RNG is unavailable
    pub fn setup(
        path: &Path,
        env: &SystemEnv,
        hostname: &str,
        port: u16,
        force: bool,
    ) -> Result<Self, ServerError> {
        if path.exists() && !force {
            return Err(ServerError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        let settings = Self::generate(env, hostname, port)?;
        settings.validate()?;
        settings.write(path)?;

        tracing::info!(
            "Wrote settings to {}; node reachable at http://{}:{}",
            path.display(),
            settings.server.dns_hostname,
            settings.server.port
        );

        Ok(settings)
    }

    /// Write as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - `Internal`: serialization failed
    /// - `Transport`: the file could not be written
    pub fn write(&self, path: &Path) -> Result<(), ServerError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ServerError::Internal(format!("unable to serialize settings: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check the configuration for values the server cannot run with.
    ///
    /// Non-hex key material is accepted with a warning.
    ///
    /// # Errors
    ///
    /// - `Config`: the first violation found
    pub fn validate(&self) -> Result<(), ServerError> {
        for (name, value) in [
            ("Passphrase", &self.crypto.passphrase),
            ("Salt", &self.crypto.salt),
            ("InitVector", &self.crypto.init_vector),
        ] {
            let len = value.chars().count();
            if len != MASTER_MATERIAL_LEN {
                return Err(ServerError::Config(format!(
                    "Crypto.{name} must be {MASTER_MATERIAL_LEN} characters, found {len}"
                )));
            }
            if !value.chars().all(|c| c.is_ascii_hexdigit()) {
                tracing::warn!("Crypto.{} is not hexadecimal; hex is recommended", name);
            }
        }

        if self.server.port == 0 {
            return Err(ServerError::Config("Server.Port must be non-zero".to_string()));
        }

        if self.server.dns_hostname.is_empty() {
            return Err(ServerError::Config("Server.DnsHostname must not be empty".to_string()));
        }

        if self.auth.api_key_header.is_empty() {
            return Err(ServerError::Config("Auth.ApiKeyHeader must not be empty".to_string()));
        }

        if self.auth.admin_api_key.is_empty() || self.auth.crypto_api_key.is_empty() {
            return Err(ServerError::Config("API keys must not be empty".to_string()));
        }

        if self.auth.admin_api_key == self.auth.crypto_api_key {
            return Err(ServerError::Config(
                "Auth.AdminApiKey and Auth.CryptoApiKey must differ".to_string(),
            ));
        }

        if self.server.ssl {
            tracing::warn!("Server.Ssl is set; terminate TLS in front of this process");
        }

        Ok(())
    }

    /// Master secret built from the configured key material.
    ///
    /// # Errors
    ///
    /// - `Config`: the key material is unusable
    pub fn master_secret(&self) -> Result<MasterSecret, ServerError> {
        Ok(MasterSecret::new(
            &self.crypto.passphrase,
            &self.crypto.salt,
            &self.crypto.init_vector,
        )?)
    }

    /// Address to listen on.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.dns_hostname, self.server.port)
    }

    /// Copy with key material and API keys replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.crypto = CryptoSettings {
            passphrase: REDACTED.to_string(),
            salt: REDACTED.to_string(),
            init_vector: REDACTED.to_string(),
        };
        copy.auth.admin_api_key = REDACTED.to_string();
        copy.auth.crypto_api_key = REDACTED.to_string();
        copy
    }
}

/// Serde adapter: `bool` that also accepts `0`/`1` integers.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            enable_console: false,
            server: ServerSettings {
                dns_hostname: "localhost".to_string(),
                port: 9000,
                ssl: false,
                node_name: "node-a".to_string(),
            },
            crypto: CryptoSettings {
                passphrase: "0123456789ABCDEF".to_string(),
                salt: "FEDCBA9876543210".to_string(),
                init_vector: "A1B2C3D4E5F60718".to_string(),
            },
            auth: AuthSettings {
                api_key_header: "x-api-key".to_string(),
                admin_api_key: "admin".to_string(),
                crypto_api_key: "user".to_string(),
            },
            logging: LoggingSettings::default(),
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn short_key_material_is_rejected() {
        let mut s = settings();
        s.crypto.salt = "ABC".to_string();

        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("Crypto.Salt must be 16 characters, found 3"));
    }

    #[test]
    fn non_hex_key_material_is_accepted() {
        let mut s = settings();
        s.crypto.passphrase = "not-hex-but-16ch".to_string();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut s = settings();
        s.server.port = 0;
        assert!(matches!(s.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn identical_api_keys_are_rejected() {
        let mut s = settings();
        s.auth.crypto_api_key = s.auth.admin_api_key.clone();
        assert!(matches!(s.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn generated_settings_are_valid_and_random() {
        let env = SystemEnv::new();
        let a = Settings::generate(&env, DEFAULT_HOSTNAME, DEFAULT_PORT).unwrap();
        let b = Settings::generate(&env, DEFAULT_HOSTNAME, DEFAULT_PORT).unwrap();

        assert!(a.validate().is_ok());
        assert_eq!(a.server.port, 9000);
        assert_eq!(a.auth.api_key_header, "x-api-key");
        assert_ne!(a.crypto.passphrase, b.crypto.passphrase);
    }

    #[test]
    fn redacted_hides_secrets() {
        let redacted = settings().redacted();
        let json = serde_json::to_string(&redacted).unwrap();

        for secret in ["0123456789ABCDEF", "FEDCBA9876543210", "A1B2C3D4E5F60718"] {
            assert!(!json.contains(secret));
        }
        assert!(!json.contains("\"admin\""));
        assert_eq!(redacted.server, settings().server);
        assert_eq!(redacted.auth.api_key_header, "x-api-key");
    }

    #[test]
    fn debug_hides_key_material() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("0123456789ABCDEF"));
    }

    #[test]
    fn integer_flags_are_accepted() {
        let json = r#"{
            "EnableConsole": 1,
            "Server": { "DnsHostname": "localhost", "Port": 9000, "Ssl": 0 },
            "Crypto": {
                "Passphrase": "0123456789ABCDEF",
                "Salt": "FEDCBA9876543210",
                "InitVector": "A1B2C3D4E5F60718"
            },
            "Auth": { "ApiKeyHeader": "x-api-key", "AdminApiKey": "admin", "CryptoApiKey": "user" },
            "Logging": { "MinimumSeverityLevel": 0, "LogRequests": 1, "ConsoleLogging": 0 }
        }"#;

        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.enable_console);
        assert!(!s.server.ssl);
        assert_eq!(s.server.node_name, "cryptoserver");
        assert!(s.logging.log_requests);
        assert!(!s.logging.log_responses);
        assert!(!s.logging.console_logging);
        assert_eq!(s.logging.filter_directive(), "debug");
    }

    #[test]
    fn severity_maps_to_filter() {
        let mut logging = LoggingSettings::default();
        assert_eq!(logging.filter_directive(), "info");

        logging.minimum_severity_level = 2;
        assert_eq!(logging.filter_directive(), "warn");

        logging.minimum_severity_level = 6;
        assert_eq!(logging.filter_directive(), "error");
    }

    #[test]
    fn master_secret_builds_from_settings() {
        assert!(settings().master_secret().is_ok());
    }
}
