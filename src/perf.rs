// ==========================================
// 采购授标引擎 - 事务性能探针
// ==========================================
// 职责: 统计每个事务的耗时、SQL 语句数、慢 SQL 数与提交结果
// 开关: PROCUREMENT_PERF_SQL（Debug 默认开启）
//       PROCUREMENT_SLOW_SQL_MS（慢 SQL 阈值，毫秒）
// ==========================================

use rusqlite::Connection;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const SQL_LOG_MAX_CHARS: usize = 400;

static SQL_PROFILING: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

/// 当前线程上正在执行的事务计数器
#[derive(Debug, Default, Clone, Copy)]
struct ThreadCounters {
    open_timers: u32,
    statements: u64,
    slow_statements: u64,
}

thread_local! {
    static COUNTERS: RefCell<ThreadCounters> = RefCell::new(ThreadCounters::default());
}

/// SQL 剖析设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilingSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl ProfilingSettings {
    /// 从环境变量读取
    pub fn from_env() -> Self {
        let enabled = std::env::var("PROCUREMENT_PERF_SQL")
            .map(|v| parse_flag(&v))
            .unwrap_or(cfg!(debug_assertions));
        let slow_sql_ms = std::env::var("PROCUREMENT_SLOW_SQL_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self { enabled, slow_sql_ms }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// 单行化并截断 SQL（按字符，不截断多字节字符）
fn compact_sql(sql: &str, max_chars: usize) -> String {
    let one_line = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match one_line.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &one_line[..cut]),
        None => one_line,
    }
}

/// 为连接安装 SQL 计数与慢查询回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    apply_profiling(conn, ProfilingSettings::from_env());
}

/// 按给定设置安装（或清除）回调
pub fn apply_profiling(conn: &mut Connection, settings: ProfilingSettings) {
    SQL_PROFILING.store(settings.enabled, Ordering::Relaxed);
    SLOW_SQL_MS.store(settings.slow_sql_ms, Ordering::Relaxed);

    if settings.enabled {
        conn.trace(Some(on_statement));
        conn.profile(Some(on_statement_finished));
    } else {
        conn.trace(None);
        conn.profile(None);
    }
}

fn on_statement(_sql: &str) {
    COUNTERS.with(|c| {
        let mut c = c.borrow_mut();
        if c.open_timers > 0 {
            c.statements = c.statements.saturating_add(1);
        }
    });
}

fn on_statement_finished(sql: &str, duration: Duration) {
    if !SQL_PROFILING.load(Ordering::Relaxed) {
        return;
    }
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %compact_sql(sql, SQL_LOG_MAX_CHARS),
        "慢SQL"
    );
    COUNTERS.with(|c| {
        let mut c = c.borrow_mut();
        if c.open_timers > 0 {
            c.slow_statements = c.slow_statements.saturating_add(1);
        }
    });
}

/// 事务结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    RolledBack,
}

impl TxOutcome {
    fn as_str(self) -> &'static str {
        match self {
            TxOutcome::Committed => "commit",
            TxOutcome::RolledBack => "rollback",
        }
    }
}

// ==========================================
// TxTimer - 单个事务的性能探针
// ==========================================
// 未调用 committed() 即 drop 视为回滚（包括闭包报错与提前返回）
pub struct TxTimer {
    op: &'static str,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
    outcome: TxOutcome,
}

impl TxTimer {
    pub fn start(op: &'static str) -> Self {
        let snapshot = COUNTERS.with(|c| {
            let mut c = c.borrow_mut();
            c.open_timers = c.open_timers.saturating_add(1);
            *c
        });
        Self {
            op,
            started: Instant::now(),
            statements_at_start: snapshot.statements,
            slow_at_start: snapshot.slow_statements,
            outcome: TxOutcome::RolledBack,
        }
    }

    pub fn committed(&mut self) {
        self.outcome = TxOutcome::Committed;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 本事务内已执行的 SQL 数（未开启剖析时为 0）
    pub fn statements(&self) -> u64 {
        COUNTERS.with(|c| c.borrow().statements.saturating_sub(self.statements_at_start))
    }
}

impl Drop for TxTimer {
    fn drop(&mut self) {
        let (statements, slow) = COUNTERS.with(|c| {
            let mut c = c.borrow_mut();
            c.open_timers = c.open_timers.saturating_sub(1);
            (
                c.statements.saturating_sub(self.statements_at_start),
                c.slow_statements.saturating_sub(self.slow_at_start),
            )
        });

        tracing::debug!(
            target: "perf",
            op = self.op,
            outcome = self.outcome.as_str(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            statements,
            slow_statements = slow,
            "事务结束"
        );
    }
}
