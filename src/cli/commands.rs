use crate::config::{ConcurrencyMode, ServerConfig};
use crate::otel::{init_logging_with_config, LogConfig, LogFormat};
use crate::server::{AppService, HttpServer, ServerHandle};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for contactd
#[derive(Parser, Debug)]
#[command(name = "contactd", version)]
#[command(about = "Static site server with a contact form and a protected admin view", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the server until SIGINT or SIGTERM
    Serve(ServeArgs),
    /// Validate a configuration and print it with secrets masked
    CheckConfig {
        /// YAML configuration file
        #[arg(short, long, env = "CONTACTD_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Flags for `serve`. Anything left unset keeps the file or default value.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long, env = "CONTACTD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "CONTACTD_HOST")]
    pub host: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(short, long, env = "CONTACTD_PORT")]
    pub port: Option<u16>,

    /// Directory static files are served from
    #[arg(long, env = "CONTACTD_WEB_ROOT")]
    pub web_root: Option<PathBuf>,

    /// File contact submissions are appended to
    #[arg(long, env = "CONTACTD_SUBMISSIONS_FILE")]
    pub submissions_file: Option<PathBuf>,

    /// Username for /admin
    #[arg(long, env = "CONTACTD_ADMIN_USER")]
    pub admin_user: Option<String>,

    /// Password for /admin
    #[arg(long, env = "CONTACTD_ADMIN_PASS", hide_env_values = true)]
    pub admin_pass: Option<String>,

    /// Connection scheduling
    #[arg(long, value_enum, ignore_case = true, env = "CONTACTD_MODE")]
    pub mode: Option<ConcurrencyMode>,

    /// Worker threads in pool mode
    #[arg(long, env = "CONTACTD_WORKERS")]
    pub workers: Option<usize>,

    /// Log level: trace/debug/info/warn/error
    #[arg(long, env = "CONTACTD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, ignore_case = true, env = "CONTACTD_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl ServeArgs {
    /// Defaults, then the config file, then these flags.
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = load_config(self.config.as_ref())?;
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(web_root) = &self.web_root {
            config.web_root = web_root.clone();
        }
        if let Some(file) = &self.submissions_file {
            config.submissions_file = file.clone();
        }
        if let Some(user) = &self.admin_user {
            config.admin.username = user.clone();
        }
        if let Some(pass) = &self.admin_pass {
            config.admin.password = pass.clone();
        }
        if let Some(mode) = self.mode {
            config.concurrency.mode = mode;
        }
        if let Some(workers) = self.workers {
            config.concurrency.workers = workers;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn log_config(&self) -> LogConfig {
        let mut log = LogConfig::from_env();
        if let Some(level) = &self.log_level {
            log.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            log.format = format;
        }
        log
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path),
        None => Ok(ServerConfig::default()),
    }
}

/// Parse the process arguments and execute the command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, logging cannot be
/// initialized or the server fails to bind.
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

/// Execute an already parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(&args),
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_ref())?;
            config.validate().context("invalid configuration")?;
            print!("{}", config.to_redacted_yaml()?);
            Ok(())
        }
    }
}

fn serve(args: &ServeArgs) -> Result<()> {
    let config = args.resolve()?;
    let _guard = init_logging_with_config(&args.log_config())?;

    info!(
        web_root = %config.web_root.display(),
        submissions_file = %config.submissions_file.display(),
        mode = ?config.concurrency.mode,
        workers = config.concurrency.workers,
        "Starting contactd"
    );

    let addr = config.bind_addr();
    let service = AppService::new(Arc::new(config)).context("failed to build service")?;
    let handle = HttpServer(Arc::new(service))
        .start(addr.as_str())
        .with_context(|| format!("failed to bind {addr}"))?;
    wait_for_shutdown(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal = signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("accept thread panicked: {e:?}"))
}
