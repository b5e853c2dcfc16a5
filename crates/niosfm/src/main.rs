use anyhow::Result;
use clap::Parser;
use niosfm_cli::{Cli, Command};
use niosfm_config::{AppConfig, AppPaths, ConfigManager};
use niosfm_core::{
    ClientFactory, ConnectionManager, EventBus, GridShell, ListingCache, LogOnlyDownload,
};
use niosfm_wapi::{GridClient, WapiClient, WapiError, WapiOptions};
use std::sync::Arc;
use tracing::{info, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::new()?;
    let config_manager = ConfigManager::new(paths.clone());
    let config = config_manager.load(
        std::env::current_dir().ok().as_deref(),
        cli.config.as_deref(),
        Some(cli.overrides()),
    )?;
    let interactive = cli.is_interactive();
    let _log_guard = init_logging(&config, &paths, config.logging.stdout && !interactive)?;

    match cli.command {
        Some(Command::Config { init, show }) => {
            if init {
                config_manager.save_default()?;
                println!("config initialized at {}", paths.config_file.display());
            }
            if show {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
        None => {
            let bus = EventBus::new(256);
            let connection = ConnectionManager::new(
                client_factory(&config),
                config.grid.wapi_version.clone(),
                bus.clone(),
            );
            let listing = ListingCache::new(config.grid.directory.clone());
            let shell = GridShell::new(connection, listing, Arc::new(LogOnlyDownload), bus);
            info!(version = %config.grid.wapi_version, "starting niosfm");
            niosfm_tui::run(shell, config).await?;
        }
    }

    Ok(())
}

fn client_factory(config: &AppConfig) -> ClientFactory {
    let options = WapiOptions {
        verify_tls: config.grid.verify_tls,
        timeout_ms: config.grid.timeout_ms,
    };
    Arc::new(move || -> Result<Box<dyn GridClient>, WapiError> {
        Ok(Box::new(WapiClient::new(&options)?))
    })
}

fn init_logging(
    config: &AppConfig,
    paths: &AppPaths,
    enable_stdout: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&paths.log_dir)?;
    let (log_file, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&paths.log_dir, "niosfm.log"));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let json = config.logging.json;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer(json, log_file, false))
        .with(enable_stdout.then(|| log_layer(json, std::io::stdout, true)))
        .try_init()?;

    Ok(guard)
}

fn log_layer<S, W>(json: bool, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}
