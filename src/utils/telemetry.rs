//! # 诊断日志
//!
//! 基于 `tracing-subscriber` 的日志初始化：`RUST_LOG` 优先，否则按 `-v`
//! 次数选择级别（默认 `warn`，`-v` 为 `debug`，`-vv` 为 `trace`）。
//! 日志写到 stderr，不干扰 stdout 上的表格与状态输出。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 使用 `tracing`, `tracing-subscriber`

use tracing::{subscriber::set_global_default, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// `-v` 次数对应的默认过滤级别
pub fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

pub fn get_subscriber(verbosity: u8) -> impl Subscriber + Send + Sync {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    let fmt_layer = tracing_subscriber::fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    Registry::default().with(env_filter).with(fmt_layer)
}

/// 安装全局 subscriber；重复安装时保留已有的
pub fn init(verbosity: u8) {
    if set_global_default(get_subscriber(verbosity)).is_err() {
        super::output::print_warning("tracing subscriber already installed");
    }
}
