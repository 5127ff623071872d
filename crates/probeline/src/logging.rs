use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Which end of the line protocol this process is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Spawns a peer and reads its responses.
    Driver,
    /// Answers on stdout; a driver may merge our stderr into its responses.
    Peer,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Level actually installed for `role`.
    ///
    /// A peer's log lines would land inside the driver's responses, so a
    /// peer logs errors at most.
    pub fn effective(self, role: Role) -> LogLevel {
        match role {
            Role::Driver => self,
            Role::Peer => self.min(LogLevel::Error),
        }
    }
}

/// Install the stderr subscriber. Peer traffic is logged at trace level.
///
/// At debug and above, thread names are included so lines from the output
/// and stderr pump threads can be told apart.
pub fn init_logging(format: LogFormat, level: LogLevel, role: Role) {
    let level = level.effective(role);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_thread_names(level >= LogLevel::Debug)
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_keeps_requested_level() {
        assert_eq!(LogLevel::Trace.effective(Role::Driver), LogLevel::Trace);
        assert_eq!(LogLevel::Off.effective(Role::Driver), LogLevel::Off);
    }

    #[test]
    fn peer_is_capped_at_error() {
        assert_eq!(LogLevel::Debug.effective(Role::Peer), LogLevel::Error);
        assert_eq!(LogLevel::Warn.effective(Role::Peer), LogLevel::Error);
        assert_eq!(LogLevel::Off.effective(Role::Peer), LogLevel::Off);
    }
}
