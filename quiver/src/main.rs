use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use std::io::Write;

use quiver::color_utils::{init_color_config, level_tag, Marker};
use quiver::config::{GlobalArgs, ScoreCommand, ScoreRunConfig};
use quiver::score_processing::run_scoring;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Score arrows from detector captures of a target photo
    Score(ScoreCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "quiver")]
#[command(about = "Archery target scoring from object-detector output")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(verbosity: &clap_verbosity_flag::Verbosity) -> log::LevelFilter {
    if verbosity.is_silent() {
        return log::LevelFilter::Error; // -q -> ERROR
    }
    match verbosity.log_level_filter() {
        log::LevelFilter::Off => log::LevelFilter::Off,
        log::LevelFilter::Error => log::LevelFilter::Warn, // default -> WARN
        log::LevelFilter::Warn => log::LevelFilter::Info,  // -v -> INFO
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv -> DEBUG
        log::LevelFilter::Debug | log::LevelFilter::Trace => log::LevelFilter::Trace,
    }
}

fn main() {
    let cli = Cli::parse();
    init_color_config(cli.global.no_color);

    // If user didn't pass -v/-q and RUST_LOG is set, honor the env var.
    let use_env = !cli.global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let mut b = Builder::new();
        b.filter_level(get_log_level_from_verbosity(&cli.global.verbosity));
        b
    };

    logger
        .format(|buf, record| {
            writeln!(buf, "[{}] {}", level_tag(record.level()), record.args())
        })
        .init();

    match cli.command {
        Some(Commands::Score(score_cmd)) => {
            let sources_desc = if score_cmd.sources.len() == 1 {
                score_cmd.sources[0].clone()
            } else {
                format!("{} inputs", score_cmd.sources.len())
            };

            let config = match ScoreRunConfig::from_args(cli.global.clone(), score_cmd) {
                Ok(config) => config,
                Err(e) => {
                    error!("{}Invalid configuration: {e}", Marker::Failed.prefix());
                    std::process::exit(2);
                }
            };

            info!(
                "{}Scoring: {} | conf: {} | IoU: {} | suppression: {:?} | target: {:?}",
                Marker::RunStart.prefix(),
                sources_desc,
                config.scoring.confidence,
                config.scoring.nms_threshold,
                config.scoring.suppression,
                config.scoring.target_selection
            );

            match run_scoring(&config) {
                Ok(summary) => {
                    println!(
                        "Scored {} capture(s), {} without a score",
                        summary.processed, summary.analysis_failures
                    );
                }
                Err(e) => {
                    error!("{}Scoring failed: {e}", Marker::Failed.prefix());
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Version) => {
            println!("quiver v{}", env!("CARGO_PKG_VERSION"));
            println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
        }
        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            if let Err(e) = cmd.print_help() {
                error!("Failed to print help: {e}");
            }
        }
    }
}
