//! CryptoServer binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with System.json (written with fresh key material if missing)
//! cryptoserver
//!
//! # Alternate settings file and listen address, no operator console
//! cryptoserver --config /etc/cryptoserver.json --bind 0.0.0.0:9000 --no-console
//!
//! # Regenerate the settings file
//! cryptoserver setup --port 9000 --hostname localhost --force
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cryptoserver_server::{
    Console, ConsoleExit, DEFAULT_HOSTNAME, DEFAULT_PORT, Server, ServerRuntimeConfig, Settings,
    SystemEnv,
};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// CryptoServer encryption service
#[derive(Parser, Debug)]
#[command(name = "cryptoserver")]
#[command(about = "Session-keyed AES encryption service")]
#[command(version)]
struct Args {
    /// Path to the settings file
    #[arg(short, long, default_value = "System.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the settings file
    #[arg(long)]
    log_level: Option<String>,

    /// Address to bind to; overrides the settings file
    #[arg(short, long)]
    bind: Option<String>,

    /// Do not start the operator console
    #[arg(long)]
    no_console: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a settings file with freshly generated key material
    Setup {
        /// TCP port to listen on
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Hostname to listen on
        #[arg(long, default_value = DEFAULT_HOSTNAME)]
        hostname: String,

        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

fn subscriber(
    directive: &str,
    to_console: bool,
) -> impl tracing::Subscriber + Send + Sync + use<> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let layer = to_console.then(fmt::layer);

    tracing_subscriber::registry().with(layer).with(filter)
}

fn init_logging(directive: &str, to_console: bool) {
    subscriber(directive, to_console).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let env = SystemEnv::new();

    if let Some(Command::Setup { port, hostname, force }) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"), true);
        Settings::setup(&args.config, &env, &hostname, port, force)?;
        return Ok(());
    }

    // Logging settings live in the file being loaded; first-run setup logs
    // through a provisional console subscriber.
    let provisional = subscriber(args.log_level.as_deref().unwrap_or("info"), true);
    let settings = tracing::subscriber::with_default(provisional, || {
        Settings::load_or_setup(&args.config, &env)
    })?;

    let directive =
        args.log_level.clone().unwrap_or_else(|| settings.logging.filter_directive().to_string());
    init_logging(&directive, settings.logging.console_logging);

    tracing::info!("CryptoServer starting");

    let enable_console = settings.enable_console && !args.no_console;
    let mut config = ServerRuntimeConfig::from_settings(settings);
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    tracing::info!("Binding to {}", config.bind_address);
    let server = Server::bind(config).await?;
    tracing::info!("Server listening on {}", server.local_addr()?);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    if enable_console {
        let registry = server.state().registry.clone();
        let shutdown_tx = shutdown_tx.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let mut console = Console::new(stdin.lock(), stdout.lock(), registry);

            match console.run() {
                Ok(ConsoleExit::Quit) => {
                    let _ = shutdown_tx.send(true);
                },
                Ok(ConsoleExit::EndOfInput) => tracing::debug!("Console input closed"),
                Err(e) => tracing::warn!("Console error: {}", e),
            }
        });
    }

    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupt received"),
            _ = shutdown_rx.wait_for(|stop| *stop) => {},
        }
    };

    server.run(shutdown).await?;
    drop(shutdown_tx);

    Ok(())
}
