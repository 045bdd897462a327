use log::LevelFilter;

// Do *not* make the fields public here to force going through `From`/`Into`, OK?
#[derive(Debug, Default, clap::Args)]
pub struct LogLevelOpt {
    /// Show what is being done
    #[clap(short, long)]
    verbose: bool,

    /// Show information that helps debug this program (implies
    /// `--verbose`)
    #[clap(short, long)]
    debug: bool,

    /// Only show errors
    #[clap(short, long, conflicts_with_all = ["verbose", "debug"])]
    quiet: bool,
}

impl From<LogLevelOpt> for LogLevel {
    fn from(value: LogLevelOpt) -> Self {
        match value {
            LogLevelOpt { quiet: true, .. } => LogLevel::Quiet,
            LogLevelOpt {
                verbose: false,
                debug: false,
                ..
            } => LogLevel::Warn,
            LogLevelOpt {
                verbose: true,
                debug: false,
                ..
            } => LogLevel::Info,
            LogLevelOpt { debug: true, .. } => LogLevel::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Errors only
    Quiet,
    /// Problems with the input that do not stop the evaluation
    Warn,
    /// Verbose execution, not for debugging this program but for
    /// giving the user information about what is going on
    Info,
    /// Highest amount of log statement, for debugging this program
    Debug,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Quiet => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

/// Install the logger. `RUST_LOG`, if set, takes precedence over
/// `level`.
pub fn init_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.into())
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_levels() {
        let level = |verbose, debug, quiet| {
            LogLevel::from(LogLevelOpt {
                verbose,
                debug,
                quiet,
            })
        };
        assert_eq!(level(false, false, false), LogLevel::Warn);
        assert_eq!(level(true, false, false), LogLevel::Info);
        assert_eq!(level(true, true, false), LogLevel::Debug);
        assert_eq!(level(false, false, true), LogLevel::Quiet);
        assert!(LogLevel::Debug > LogLevel::Info);
        assert_eq!(LevelFilter::from(LogLevel::Quiet), LevelFilter::Error);
    }
}
