//! Configuration management for the DLC server.
//!
//! Two layers live here:
//!
//! - [`ServerOptions`] / [`ServerConfig`]: the explicit, immutable
//!   configuration handed to [`DlcServer::new`](crate::server::DlcServer::new).
//!   Partial overrides are layered onto environment-derived defaults exactly
//!   once, at construction.
//! - [`Config`]: command-line arguments for the binary, with environment
//!   variable fallbacks, which resolves into a [`ServerConfig`].
//!
//! # Environment Variables
//!
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 8080)
//! - `ENV_MODE` - `production` or `development`
//! - `DLC_SERVER_ENDPOINT_STATUS` - Status endpoint path (default: /status)
//! - `DLC_SERVER_ENDPOINT_CHANGE` - Change endpoint path (default: /change)
//! - `DLC_SERVER_NAME` - Name used in lifecycle logs (default: DLC Server)
//! - `DLC_SERVER_QUIET` - Suppress all server logs
//! - `DLC_SERVER_DEBUG` - Debug level: none, error, warn, info
//! - `DLC_SERVER_TOKENS` - Comma-separated tokens accepted by the binary
//! - `DLC_SERVER_BODY_LIMIT` - Maximum request body size in bytes

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;

use crate::codec::{BodyCodec, DeonCodec};
use crate::logging::{DebugLevel, LogGate};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default server name used in lifecycle logs.
pub const DEFAULT_SERVER_NAME: &str = "DLC Server";

/// Default quiet flag.
pub const DEFAULT_QUIET: bool = false;

/// Default status endpoint path.
pub const DEFAULT_STATUS_PATH: &str = "/status";

/// Default change endpoint path.
pub const DEFAULT_CHANGE_PATH: &str = "/change";

/// Default maximum request body size (100 KiB).
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

// =============================================================================
// Environment Mode
// =============================================================================

/// Deployment mode, used only to pick the default debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    Development,
    #[default]
    Unspecified,
}

impl Environment {
    /// Read the mode from an `ENV_MODE`-style value.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode.map(str::trim) {
            Some("production") => Environment::Production,
            Some("development") => Environment::Development,
            _ => Environment::Unspecified,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Debug level used when no explicit level is configured.
    pub fn default_debug_level(&self) -> DebugLevel {
        if self.is_production() {
            DebugLevel::Error
        } else {
            DebugLevel::Info
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Environment::from_mode(Some(s)))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Development => f.write_str("development"),
            Environment::Unspecified => f.write_str("unspecified"),
        }
    }
}

// =============================================================================
// Server Options
// =============================================================================

/// Caller-supplied overrides; anything left `None` takes the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOptions {
    pub server_name: Option<String>,
    pub quiet: Option<bool>,
    pub debug: Option<DebugLevel>,
}

impl PartialOptions {
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = Some(quiet);
        self
    }

    pub fn with_debug(mut self, debug: DebugLevel) -> Self {
        self.debug = Some(debug);
        self
    }
}

/// Fully resolved server options. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Name used in lifecycle logs
    pub server_name: String,

    /// Suppress all log output
    pub quiet: bool,

    /// Verbosity gate
    pub debug: DebugLevel,
}

impl ServerOptions {
    /// Layer `partial` onto the defaults for `environment`.
    ///
    /// An empty server name counts as unset.
    pub fn resolve(partial: PartialOptions, environment: Environment) -> Self {
        let server_name = partial
            .server_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        Self {
            server_name,
            quiet: partial.quiet.unwrap_or(DEFAULT_QUIET),
            debug: partial
                .debug
                .unwrap_or_else(|| environment.default_debug_level()),
        }
    }

    /// Gate derived from the debug level and quiet flag.
    pub fn log_gate(&self) -> LogGate {
        LogGate::new(self.debug, self.quiet)
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::resolve(PartialOptions::default(), Environment::Unspecified)
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// Paths of the two built-in endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub status: String,
    pub change: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS_PATH.to_string(),
            change: DEFAULT_CHANGE_PATH.to_string(),
        }
    }
}

/// Characters the router reads as capture or wildcard syntax.
const ROUTE_PATTERN_CHARS: [char; 4] = [':', '*', '{', '}'];

impl Endpoints {
    /// Check that both paths are distinct literal route paths.
    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in [("status", &self.status), ("change", &self.change)] {
            if path.is_empty() {
                return Err(format!("{} endpoint path must not be empty", name));
            }
            if !path.starts_with('/') {
                return Err(format!(
                    "{} endpoint path must start with '/': {}",
                    name, path
                ));
            }
            if let Some(c) = path.chars().find(|c| ROUTE_PATTERN_CHARS.contains(c)) {
                return Err(format!(
                    "{} endpoint path must be a literal path, found '{}': {}",
                    name, c, path
                ));
            }
        }

        if self.status == self.change {
            return Err(format!(
                "status and change endpoints must differ (both are {})",
                self.status
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Everything [`DlcServer`](crate::server::DlcServer) needs besides the
/// token verifier.
#[derive(Clone)]
pub struct ServerConfig {
    /// Resolved options
    pub options: ServerOptions,

    /// Built-in endpoint paths
    pub endpoints: Endpoints,

    /// Host address `start` binds to
    pub host: String,

    /// Maximum buffered request body size in bytes
    pub body_limit: usize,

    /// Codec used for the alternate media type
    pub codec: Arc<dyn BodyCodec>,

    /// Whether to install the HTTP trace layer
    pub enable_tracing: bool,
}

impl ServerConfig {
    /// Create a configuration with the given options and defaults elsewhere.
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            endpoints: Endpoints::default(),
            host: DEFAULT_HOST.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            codec: Arc::new(DeonCodec),
            enable_tracing: true,
        }
    }

    /// Resolve partial options against `environment` and wrap them.
    pub fn from_partial(partial: PartialOptions, environment: Environment) -> Self {
        Self::new(ServerOptions::resolve(partial, environment))
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn BodyCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("options", &self.options)
            .field("endpoints", &self.endpoints)
            .field("host", &self.host)
            .field("body_limit", &self.body_limit)
            .field("codec", &self.codec.media_type())
            .field("enable_tracing", &self.enable_tracing)
            .finish()
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// DLC Server - an authenticated HTTP service skeleton.
///
/// Serves the status and change endpoints behind bearer-token
/// authentication, speaking JSON or deon depending on the request.
#[derive(Parser, Debug, Clone)]
#[command(name = "dlc-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Deployment mode (production or development).
    #[arg(long, env = "ENV_MODE")]
    pub env_mode: Option<String>,

    /// Path of the status endpoint.
    #[arg(long, default_value = DEFAULT_STATUS_PATH, env = "DLC_SERVER_ENDPOINT_STATUS")]
    pub status_path: String,

    /// Path of the change endpoint.
    #[arg(long, default_value = DEFAULT_CHANGE_PATH, env = "DLC_SERVER_ENDPOINT_CHANGE")]
    pub change_path: String,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT, env = "DLC_SERVER_BODY_LIMIT")]
    pub body_limit: usize,

    // =========================================================================
    // Server Options
    // =========================================================================
    /// Name used in lifecycle logs.
    #[arg(long, env = "DLC_SERVER_NAME")]
    pub server_name: Option<String>,

    /// Suppress all server log output.
    #[arg(short, long, default_value_t = false, env = "DLC_SERVER_QUIET")]
    pub quiet: bool,

    /// Debug level. Defaults to `error` in production, `info` otherwise.
    #[arg(long, value_enum, env = "DLC_SERVER_DEBUG")]
    pub debug: Option<DebugLevel>,

    // =========================================================================
    // Authentication
    // =========================================================================
    /// Tokens accepted by the built-in verifier (comma-separated).
    #[arg(long, env = "DLC_SERVER_TOKENS", value_delimiter = ',')]
    pub tokens: Vec<String>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose subscriber output (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.endpoints().validate()?;

        if self.body_limit == 0 {
            return Err("body_limit must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Endpoint paths from the command line or environment.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            status: self.status_path.clone(),
            change: self.change_path.clone(),
        }
    }

    /// Deployment mode derived from `env_mode`.
    pub fn environment(&self) -> Environment {
        Environment::from_mode(self.env_mode.as_deref())
    }

    /// Overrides given on the command line or in the environment.
    pub fn partial_options(&self) -> PartialOptions {
        PartialOptions {
            server_name: self.server_name.clone(),
            quiet: self.quiet.then_some(true),
            debug: self.debug,
        }
    }

    /// Build the server configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::from_partial(self.partial_options(), self.environment())
            .with_endpoints(self.endpoints())
            .with_host(self.host.clone())
            .with_body_limit(self.body_limit)
            .with_tracing(!self.no_tracing)
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
