mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Bookstall storefront client.
#[derive(Parser)]
#[command(name = "bookstall", version, about = "Bookstall storefront client")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to bookstall.toml (default: ./bookstall.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the unit price of a catalog item
    Price {
        /// Path to the product JSON file
        item: PathBuf,
        #[command(flatten)]
        pricing: PricingArgs,
    },

    /// Validate a quantity and compute the order total
    Total {
        /// Path to the product JSON file
        item: PathBuf,
        /// Quantity to order
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
        #[command(flatten)]
        pricing: PricingArgs,
    },

    /// Step a quantity control, never below 1
    Quantity {
        /// Path to the product JSON file
        item: PathBuf,
        /// Current quantity
        #[arg(long, default_value = "1")]
        current: u32,
        /// Amount to add (negative to remove)
        #[arg(long, allow_negative_numbers = true)]
        delta: i64,
    },

    /// Classify a stored document location
    Location {
        /// The stored location (URL or bucket/path)
        raw: String,
        /// Storage service base URL (default: service.url from config)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Derive the download filename for a title
    Filename {
        /// Content title
        title: String,
        /// Document URL (supplies the extension)
        #[arg(long)]
        url: Option<String>,
    },

    /// Resolve the retrieval URL for content the user owns
    Resolve {
        /// Content item ID
        #[arg(long)]
        content: String,
        /// User ID
        #[arg(long)]
        user: String,
    },

    /// Purchase a catalog item
    Purchase {
        /// Product ID
        #[arg(long)]
        item: String,
        /// Quantity to order
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        quantity: i64,
        /// Variation choice as Name=Option (repeatable)
        #[arg(long = "select", value_parser = parse_selection)]
        select: Vec<(String, String)>,
    },

    /// Download content the user owns
    Download {
        /// Content item ID
        #[arg(long)]
        content: String,
        /// User ID
        #[arg(long)]
        user: String,
        /// Target directory (default: [download] dir from config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Selection and pricing instant shared by `price` and `total`.
#[derive(clap::Args)]
pub(crate) struct PricingArgs {
    /// Variation choice as Name=Option (repeatable)
    #[arg(long = "select", value_parser = parse_selection)]
    pub select: Vec<(String, String)>,

    /// Price as of this RFC 3339 instant (default: now)
    #[arg(long, value_parser = parse_instant)]
    pub as_of: Option<OffsetDateTime>,
}

fn parse_selection(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, option)) if !name.trim().is_empty() && !option.trim().is_empty() => {
            Ok((name.trim().to_string(), option.trim().to_string()))
        }
        _ => Err(format!("expected Name=Option, got '{raw}'")),
    }
}

fn parse_instant(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| format!("expected an RFC 3339 instant: {e}"))
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Price { item, pricing } => {
            commands::pricing::cmd_price(&item, &pricing, cli.output, cli.quiet);
        }
        Commands::Total {
            item,
            quantity,
            pricing,
        } => {
            commands::pricing::cmd_total(&item, quantity, &pricing, cli.output, cli.quiet);
        }
        Commands::Quantity {
            item,
            current,
            delta,
        } => {
            commands::pricing::cmd_quantity(&item, current, delta, cli.output, cli.quiet);
        }
        Commands::Location { raw, platform } => {
            let platform = platform.unwrap_or_else(|| configured_url(cli.config.as_deref()));
            commands::content::cmd_location(&raw, &platform, cli.output, cli.quiet);
        }
        Commands::Filename { title, url } => {
            commands::content::cmd_filename(&title, url.as_deref(), cli.output, cli.quiet);
        }
        Commands::Resolve { content, user } => {
            let config = load_config_or_exit(cli.config.as_deref(), cli.output, cli.quiet);
            commands::content::cmd_resolve(&config, &content, &user, cli.output, cli.quiet);
        }
        Commands::Purchase {
            item,
            quantity,
            select,
        } => {
            let config = load_config_or_exit(cli.config.as_deref(), cli.output, cli.quiet);
            commands::purchase::cmd_purchase(
                &config,
                &item,
                quantity,
                &select,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Download { content, user, dir } => {
            let config = load_config_or_exit(cli.config.as_deref(), cli.output, cli.quiet);
            commands::content::cmd_download(
                &config,
                &content,
                &user,
                dir.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
    }
}

/// Structured logs go to stderr so stdout stays machine-readable.
/// Filtered by `BOOKSTALL_LOG` (default `warn`).
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("BOOKSTALL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config_or_exit(
    path: Option<&std::path::Path>,
    output: OutputFormat,
    quiet: bool,
) -> config::BookstallConfig {
    let config = match config::load_config(path) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&format!("error: {msg}"), output, quiet);
            process::exit(1);
        }
    };
    if let Some(field) = config.service.missing_field() {
        let msg = format!(
            "error: {field} is not configured; set it in {} or the environment",
            config::DEFAULT_CONFIG_FILE
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    config
}

/// `service.url` if configuration loads, else empty. Commands that only
/// use it for classification do not require it.
fn configured_url(path: Option<&std::path::Path>) -> String {
    match config::load_config(path) {
        Ok(config) => config.service.url,
        Err(msg) => {
            tracing::debug!(error = %msg, "no configuration for location parsing");
            String::new()
        }
    }
}

/// Build the runtime for hosted-service commands.
pub(crate) fn runtime_or_exit(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: could not start async runtime: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

/// Print a JSON value to stdout.
pub(crate) fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}

/// Report an error to stderr in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
