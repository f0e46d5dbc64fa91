// logs.rs

use pmoconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    Layer, Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

fn string_to_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}

/// Niveau minimal configuré dans `host.logger.min_level`, `INFO` par défaut.
pub fn configured_level(config: &Config) -> LevelFilter {
    let level = config
        .get_log_min_level()
        .ok()
        .and_then(|s| string_to_level(&s))
        .unwrap_or(Level::INFO);
    level_to_levelfilter(level)
}

/// Initialise tracing à partir de la configuration.
///
/// Sans console activée, aucun message n'est émis.
pub fn init_logging(config: &Config) {
    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let level = configured_level(config);

    let console_layer = enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(level)
    });

    Registry::default().with(console_layer).init();
}
