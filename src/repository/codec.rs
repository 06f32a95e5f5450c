// ==========================================
// 采购授标引擎 - 仓储层字段编解码
// ==========================================
// 时间戳统一存为 "YYYY-MM-DD HH:MM:SS.fff"（毫秒精度，字典序即时间序）
// ==========================================

use chrono::{NaiveDateTime, Timelike};
use rusqlite::types::Type;

const TS_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const TS_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_WRITE_FORMAT).to_string()
}

/// 截断到毫秒（与存储精度一致，写入前后可直接比较）
pub(crate) fn truncate_millis(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = ts.nanosecond() / 1_000_000 * 1_000_000;
    ts.with_nanosecond(nanos).unwrap_or(ts)
}

/// 当前 UTC 时间（毫秒精度）
pub(crate) fn now_millis() -> NaiveDateTime {
    truncate_millis(chrono::Utc::now().naive_utc())
}

pub(crate) fn format_opt_ts(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(format_ts)
}

/// 解析时间戳列；失败时按 FromSqlConversionFailure 上抛
pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TS_READ_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    value.map(|s| parse_ts(idx, &s)).transpose()
}

/// 解析枚举列（未知取值视为数据损坏）
pub(crate) fn parse_enum<T>(
    idx: usize,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown enum value: {}", value).into(),
        )
    })
}
