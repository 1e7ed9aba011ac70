// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

mod pages;

use clap::{Parser, Subcommand};
use ssrkit_server::{commands, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "basic")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "ssrkit demo app", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Path to the config file
    #[arg(long, global = true, default_value = "ssrkit.toml")]
    config: PathBuf,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start development server that reloads page content
    Dev {
        /// Port to run the dev server on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
    /// Serve in production mode
    Serve {
        /// Port to run the server on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
    /// Pre-render every page to static HTML
    Prerender {
        /// Output directory
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load_from(&cli.config)?;
    let pages = Arc::new(pages::register(Path::new(&config.dev.watch_dir))?);

    match cli.command {
        Commands::Dev { port, host } => {
            override_addr(&mut config, port, host);
            commands::dev::run(&config, pages, cli.quiet).await
        }
        Commands::Serve { port, host } => {
            override_addr(&mut config, port, host);
            commands::serve::run(&config, pages).await
        }
        Commands::Prerender { output } => {
            if let Some(output) = output {
                config.prerender.out_dir = output;
            }
            commands::prerender::run(&config, pages).await
        }
    }
}

fn override_addr(config: &mut Config, port: Option<u16>, host: Option<String>) {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
}
