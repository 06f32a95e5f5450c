// ==========================================
// 采购授标引擎 - 日志初始化
// ==========================================
// RUST_LOG: 过滤器（默认 info，例如 procurement_engine=debug,slow_sql=warn）
// PROCUREMENT_LOG_FORMAT: text（默认）| json
// 重复初始化为空操作
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 解析格式名；未知值回落 Text
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    fn from_env() -> Self {
        std::env::var("PROCUREMENT_LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Text)
    }
}

/// 初始化进程日志
///
/// ```no_run
/// procurement_engine::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(LogFormat::from_env(), filter);
}

/// 测试用: debug 级别，输出交给测试框架捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("procurement_engine=debug,perf=debug"))
        .with_test_writer()
        .try_init();
}

fn install(format: LogFormat, filter: EnvFilter) {
    let result = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("日志系统已初始化，跳过");
    }
}
