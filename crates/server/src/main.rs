#![allow(unused_crate_dependencies)]
//! Impetus intervention server binary.
//!
//! Serves the intervention endpoint over HTTP and runs the idempotency cache
//! sweeper until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use impetus_server::config::ProviderKind;
use impetus_server::{AppState, ServerConfig, router};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Server command line arguments.
#[derive(Parser, Debug)]
#[command(name = "impetus-server")]
#[command(about = "Impetus lock intervention decision service")]
struct Args {
	/// TOML config file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Listen address, overrides the config file
	#[arg(short, long, value_name = "ADDR")]
	bind: Option<SocketAddr>,

	/// Default draft provider (debug, openai, anthropic or gemini)
	#[arg(short, long, value_name = "KIND")]
	provider: Option<ProviderKind>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let mut config = ServerConfig::load(args.config.as_deref())?;
	config.apply_env(|name| std::env::var(name).ok());
	if let Some(bind) = args.bind {
		config.bind = bind;
	}
	if let Some(kind) = args.provider {
		config.provider.kind = kind;
	}

	let state = AppState::from_config(&config)?;
	info!(
		provider = %config.provider.kind,
		model = %config.provider.model(config.provider.kind),
		metrics = config.metrics.enabled,
		min_contract_version = %config.min_contract_version,
		"starting impetus-server"
	);

	let shutdown = CancellationToken::new();
	let sweeper = state.spawn_sweeper(config.cache.sweep_interval(), shutdown.clone());

	let listener = tokio::net::TcpListener::bind(config.bind)
		.await
		.with_context(|| format!("binding {}", config.bind))?;
	info!(addr = %listener.local_addr()?, "listening");

	let signal = shutdown.clone();
	axum::serve(listener, router(state))
		.with_graceful_shutdown(async move {
			tokio::select! {
				_ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
				_ = signal.cancelled() => {}
			}
			signal.cancel();
		})
		.await?;

	shutdown.cancel();
	sweeper.await?;
	info!("stopped");
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("impetus_server=debug,impetus_editor=debug,info")
			} else {
				EnvFilter::new("impetus_server=info,impetus_editor=info,warn")
			}
		})
	};

	// IMPETUS_LOG_DIR redirects logs to a per-process file
	if let Some(log_dir) = std::env::var("IMPETUS_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("impetus-server.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_target(true);

			tracing_subscriber::registry()
				.with(filter())
				.with(file_layer)
				.init();

			info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).init();
}
