//! plugrt CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use plugrt_foundation::RuntimeConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// plugrt - plugin runtime for code generation hosts
#[derive(Parser, Debug)]
#[command(name = "plugrt")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Plugin directory (overrides config and PLUGRT_PLUGIN_DIR)
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,

    /// Marketplace base URL (overrides config and PLUGRT_MARKETPLACE_URL)
    #[arg(long, global = true)]
    marketplace_url: Option<String>,

    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List plugins discovered in the plugin directory
    List,
    /// Load a plugin (module path or builtin:<id>) and show its state
    Load {
        path: String,
    },
    /// Run the conformance suite against a plugin
    Test {
        path: String,
    },
    /// Run a loaded validator against an API document (JSON file)
    Validate {
        /// Plugin id
        id: String,
        /// API document
        file: PathBuf,
    },
    /// Render a template with a loaded template processor
    Render {
        /// Plugin id
        id: String,
        /// Template text
        template: String,
        /// Template data as key=value pairs
        #[arg(short = 'v', long = "var")]
        vars: Vec<String>,
    },
    /// Search the marketplace
    Search {
        query: String,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show a marketplace plugin record
    Info {
        id: String,
    },
    /// List featured marketplace plugins
    Featured {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// List marketplace categories
    Categories,
    /// Download, verify and load a marketplace plugin
    Install {
        id: String,
    },
    /// Check installed plugins for updates
    Updates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = RuntimeConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        RuntimeConfig::default()
    });
    if let Some(dir) = args.plugin_dir {
        config = config.plugin_dir(dir);
    }
    if let Some(url) = args.marketplace_url {
        config = config.marketplace_url(url);
    }
    // 단발성 실행에서는 백그라운드 업데이트 확인 불필요
    config.marketplace.auto_update_check = false;

    let output = commands::Output { json: args.json };
    commands::run(args.command, &config, output).await
}
