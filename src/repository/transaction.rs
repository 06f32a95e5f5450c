// ==========================================
// 采购授标引擎 - 事务执行器
// ==========================================
// 职责: 统一 BEGIN IMMEDIATE 事务边界 + 获取等待上限 + 执行预算
// 红线: 所有多表写入必须经由 TransactionRunner，失败整体回滚
// ==========================================
// 获取阶段: 轮询 Mutex（不无限阻塞），剩余时间同时作为 SQLite busy_timeout
// 执行阶段: 闭包返回后若超出预算 → 回滚并报 TransactionTimeout
// ==========================================

use crate::perf::TxTimer;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

/// 默认获取等待上限（毫秒）
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 10_000;
/// 默认执行预算（毫秒）
pub const DEFAULT_EXECUTE_BUDGET_MS: u64 = 20_000;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// 事务时间预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxBudget {
    pub acquire_timeout: Duration,
    pub execute_budget: Duration,
}

impl TxBudget {
    pub fn from_millis(acquire_timeout_ms: u64, execute_budget_ms: u64) -> Self {
        Self {
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            execute_budget: Duration::from_millis(execute_budget_ms),
        }
    }
}

impl Default for TxBudget {
    fn default() -> Self {
        Self::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_EXECUTE_BUDGET_MS)
    }
}

// ==========================================
// TransactionRunner - 事务执行器
// ==========================================
#[derive(Clone)]
pub struct TransactionRunner {
    conn: Arc<Mutex<Connection>>,
    budget: Arc<Mutex<TxBudget>>,
}

impl TransactionRunner {
    pub fn new(conn: Arc<Mutex<Connection>>, budget: TxBudget) -> Self {
        Self {
            conn,
            budget: Arc::new(Mutex::new(budget)),
        }
    }

    pub fn budget(&self) -> TxBudget {
        self.budget.lock().map(|b| *b).unwrap_or_default()
    }

    /// 更新预算（配置变更后生效于后续事务）
    pub fn set_budget(&self, budget: TxBudget) {
        if let Ok(mut b) = self.budget.lock() {
            *b = budget;
        }
    }

    /// 在 IMMEDIATE 事务中执行闭包
    ///
    /// 闭包返回 Err → 回滚；超出执行预算 → 回滚并返回 TransactionTimeout。
    pub fn run<T, E, F>(&self, op: &'static str, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let budget = self.budget();
        let mut timer = TxTimer::start(op);
        let started = Instant::now();

        let mut guard = self.acquire(budget.acquire_timeout)?;

        let remaining = budget.acquire_timeout.saturating_sub(started.elapsed());
        guard
            .busy_timeout(remaining.max(Duration::from_millis(1)))
            .map_err(RepositoryError::from)?;

        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::DatabaseBusy(_) => RepositoryError::TransactionTimeout {
                    phase: "acquire".to_string(),
                    budget_ms: budget.acquire_timeout.as_millis() as u64,
                },
                other => other,
            })?;

        let exec_started = Instant::now();
        let value = f(&tx)?;

        if exec_started.elapsed() > budget.execute_budget {
            tracing::warn!(
                op,
                elapsed_ms = exec_started.elapsed().as_millis() as u64,
                budget_ms = budget.execute_budget.as_millis() as u64,
                "事务超出执行预算，已回滚"
            );
            tx.rollback().map_err(RepositoryError::from)?;
            return Err(RepositoryError::TransactionTimeout {
                phase: "execute".to_string(),
                budget_ms: budget.execute_budget.as_millis() as u64,
            }
            .into());
        }

        tx.commit().map_err(|e| {
            RepositoryError::DatabaseTransactionError(format!("{}: {}", op, e))
        })?;
        timer.committed();
        Ok(value)
    }

    /// 在获取上限内取得连接
    fn acquire(&self, timeout: Duration) -> RepositoryResult<MutexGuard<'_, Connection>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.conn.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(e)) => {
                    return Err(RepositoryError::LockError(e.to_string()))
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(RepositoryError::TransactionTimeout {
                            phase: "acquire".to_string(),
                            budget_ms: timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
            }
        }
    }
}
