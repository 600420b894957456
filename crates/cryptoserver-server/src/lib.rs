//! CryptoServer production server.
//!
//! Serves the encrypt/decrypt API over HTTP using axum on the Tokio runtime,
//! with system clocks and the OS RNG.
//!
//! # Architecture
//!
//! This crate is the I/O shell around [`cryptoserver_core`]. Cipher work is
//! synchronous and CPU-bound, so each encrypt or decrypt runs on Tokio's
//! blocking pool. All shared state lives in one [`AppState`] handed to every
//! request; the [`ConnectionRegistry`] is its only mutable part.
//!
//! # Components
//!
//! - [`Server`]: binds the listener and serves until shutdown
//! - [`http`]: routing and API key authentication
//! - [`ConnectionRegistry`]: in-flight request table
//! - [`Console`]: operator console
//! - [`Settings`]: settings file, setup and validation
//! - [`SystemEnv`]: production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod console;
mod error;
pub mod http;
mod registry;
mod settings;
mod system_env;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use console::{Console, ConsoleCommand, ConsoleExit};
use cryptoserver_core::CryptoManager;
pub use error::ServerError;
pub use registry::{ConnectionGuard, ConnectionRecord, ConnectionRegistry};
pub use settings::{
    AuthSettings, CryptoSettings, DEFAULT_HOSTNAME, DEFAULT_PORT, LoggingSettings, REDACTED,
    ServerSettings, Settings,
};
pub use system_env::SystemEnv;
use tokio::net::TcpListener;

/// Shared state for all requests.
#[derive(Debug)]
pub struct AppState {
    /// Loaded settings (immutable)
    pub settings: Settings,
    /// Environment
    pub env: SystemEnv,
    /// Encrypt/decrypt orchestrator
    pub crypto: Arc<CryptoManager<SystemEnv>>,
    /// In-flight request table
    pub registry: Arc<ConnectionRegistry<SystemEnv>>,
}

impl AppState {
    /// Validate `settings` and build the request state from them.
    pub fn new(settings: Settings) -> Result<Self, ServerError> {
        settings.validate()?;

        let env = SystemEnv::new();
        let crypto = CryptoManager::new(env, &settings.master_secret()?)?;

        Ok(Self {
            settings,
            env,
            crypto: Arc::new(crypto),
            registry: Arc::new(ConnectionRegistry::new(env)),
        })
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "localhost:9000")
    pub bind_address: String,
    /// Loaded settings
    pub settings: Settings,
}

impl ServerRuntimeConfig {
    /// Bind to the address named in `settings`.
    pub fn from_settings(settings: Settings) -> Self {
        Self { bind_address: settings.bind_address(), settings }
    }
}

/// Production CryptoServer.
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let state = Arc::new(AppState::new(config.settings)?);

        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Transport(format!("unable to bind {}: {e}", config.bind_address))
        })?;

        Ok(Self { listener, state })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared request state.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Serve requests until `shutdown` completes.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Server starting on {}", self.local_addr()?);

        let app = http::router(self.state).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(self.listener, app).with_graceful_shutdown(shutdown).await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}
