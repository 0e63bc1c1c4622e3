use clap::{Parser, Subcommand};
use confluence::commands::{self, Command};
use confluence::obs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "confluence")]
#[command(about = "Multi-timeframe confluence alerts.", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  confluence evaluate --config apps/confluence/configs/sample.toml\n  confluence evaluate --symbol SPY\n  confluence watch --every-secs 300 --with-structure\n  confluence validate --probe-feed --strict\n"
)]
struct Cli {
    /// Config file path (TOML).
    #[arg(long, global = true, env = "CONFLUENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Prometheus listener (host:port).
    #[arg(long, global = true, env = "CONFLUENCE_METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// One pass over the configured symbols (or a single --symbol).
    Evaluate {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Higher-timeframe 4h/1h structure check.
    Structure,
    /// Delete ledger rows and retired orders past retention.keep_days.
    Purge,
    /// Repeat evaluate on a fixed cadence.
    Watch {
        #[arg(long, default_value_t = 300)]
        every_secs: u64,
        /// Stop after this many ticks.
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Also run the structure check on every tick.
        #[arg(long, default_value_t = false)]
        with_structure: bool,
    },
    /// Parse the config and build every adapter.
    Validate {
        /// Fetch every interval and report series quality.
        #[arg(long, default_value_t = false)]
        probe_feed: bool,
        /// Fail when any probed series is unusable.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| {
            eprintln!("error: missing --config and env CONFLUENCE_CONFIG is not set");
            std::process::exit(1);
        });
    let config = match confluence_application::config::load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = obs::init_tracing(config.log.as_ref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::metrics_addr(cli.metrics_addr).and_then(obs::init_metrics) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Evaluate { symbol } => Command::Evaluate { symbol },
        CliCommand::Structure => Command::Structure,
        CliCommand::Purge => Command::Purge,
        CliCommand::Watch {
            every_secs,
            max_ticks,
            with_structure,
        } => Command::Watch {
            every_secs,
            max_ticks,
            with_structure,
        },
        CliCommand::Validate { probe_feed, strict } => Command::Validate { probe_feed, strict },
    };

    if let Err(err) = commands::run(&config, command) {
        let code = if err.contains("strict validation failed") {
            2
        } else {
            1
        };
        eprintln!("error: {err}");
        std::process::exit(code);
    }
}
