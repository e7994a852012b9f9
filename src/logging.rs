use log::LevelFilter;

/// Level for a `--verbose` count: warn, info, debug, then trace
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install `env_logger` on stderr. Environment variables are not consulted
///
/// Calling this more than once keeps the first logger
pub fn init(verbose: u8) {
    let _ = env_logger::Builder::new()
        .filter_level(level_for(verbose))
        .format_timestamp_millis()
        .format_target(false)
        .try_init();
}
