//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// sdfatlas::core::logging::init();
/// log::info!("Atlas build started");
/// ```
pub fn init() {
    // Repeated init is ignored.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
