//! Logging setup for the command-line tool.
//!
//! Library code logs through the `log` facade; the binary installs
//! `env_logger`. The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only)
//! 3. `-v` count: info, `-vv` debug, `-vvv` trace
//! 4. default: warnings, so results are not buried in pipeline chatter
//!
//! Debug builds prefix each line with a timestamp (and the module path
//! from `-vv` on); release builds print the level and message only.

use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Install the global logger. Call once, before any logging.
///
/// Subsequent calls are ignored (useful when tests drive `run_app`
/// several times in one process).
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = std::env::var_os("RUST_LOG").is_some();
    let mut builder = Builder::new();

    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder, verbose);

    if builder.try_init().is_ok() {
        log::debug!(
            "Logging initialized at {}",
            if from_env {
                "RUST_LOG".to_string()
            } else {
                format!("{:?}", determine_level(verbose, quiet))
            }
        );
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let level_style = buf.default_level_style(level);
            if verbose >= 2 {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} {}",
                    timestamp,
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level);
            writeln!(buf, "{level_style}{:<5}{level_style:#} {}", level, record.args())
        });
    }
}
