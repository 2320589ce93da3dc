pub mod api;
pub mod core;
pub mod marker_detector;

/// 初始化日志，可重复调用
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("fredalizer"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // RUST_LOG overrides the default level
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}
