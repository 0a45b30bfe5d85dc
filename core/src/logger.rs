use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{
    filter::Directive,
    fmt::format::{Format, Writer},
    EnvFilter,
};

// http and aws internals are only interesting when asked for through RUST_LOG
const QUIET_TARGETS: [&str; 4] =
    ["hyper=warn", "reqwest=warn", "aws_config=warn", "aws_smithy_runtime=warn"];

struct CustomTimer;

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, writer: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} - {}", now.format("%d %B"), now.format("%H:%M:%S%.6f"))
    }
}

fn build_filter(log_level: LevelFilter) -> EnvFilter {
    let mut filter =
        EnvFilter::builder().with_default_directive(log_level.into()).from_env_lossy();

    for target in QUIET_TARGETS {
        if let Ok(directive) = target.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    filter
}

pub fn setup_logger(log_level: LevelFilter) {
    let format = Format::default().with_timer(CustomTimer).with_level(true).with_target(false);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(log_level))
        .event_format(format)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Logger has already been set up, continuing...");
    }
}

pub fn setup_info_logger() {
    setup_logger(LevelFilter::INFO);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logger_twice_is_harmless() {
        setup_logger(LevelFilter::DEBUG);
        setup_info_logger();
    }

    #[test]
    fn test_filter_quiets_http_targets() {
        let filter = build_filter(LevelFilter::INFO).to_string();
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("aws_smithy_runtime=warn"));
    }
}
