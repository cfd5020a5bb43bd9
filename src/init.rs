use env_logger::{Builder, Env};

/// 初始化 logger：預設 info，可用 `RUST_LOG` 覆寫
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        // reqwest 的連線細節只在除錯時需要
        .filter_module("reqwest", log::LevelFilter::Warn)
        .init();
}
