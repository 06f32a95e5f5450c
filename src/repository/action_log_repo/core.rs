use crate::domain::action_log::ActionLog;
use crate::repository::codec::format_ts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 审计日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入审计日志（独立写入，用于无业务事务的场景）
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_in_tx(&conn, log)
    }

    /// 在调用方事务内插入审计日志
    pub fn insert_in_tx(conn: &Connection, log: &ActionLog) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_ts, actor, action_type,
                entity_type, entity_id, payload_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.action_id,
                format_ts(&log.action_ts),
                log.actor,
                log.action_type,
                log.entity_type,
                log.entity_id,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }
}
