use super::core::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::codec::parse_ts;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT action_id, action_ts, actor, action_type,
           entity_type, entity_id, payload_json, detail
    FROM action_log
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按实体查询审计记录（按时间升序）
    pub fn find_by_entity(&self, entity_type: &str, entity_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE entity_type = ? AND entity_id = ? ORDER BY action_ts ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![entity_type, entity_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询最近的审计记录
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY action_ts DESC, rowid DESC LIMIT ?", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![limit], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 统计某类操作的记录数
    pub fn count_by_action_type(&self, action_type: ActionType) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?",
            params![action_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn map_row(row: &Row) -> SqliteResult<ActionLog> {
        let action_ts_str: String = row.get(1)?;
        let payload_json_str: Option<String> = row.get(6)?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_ts: parse_ts(1, &action_ts_str)?,
            actor: row.get(2)?,
            action_type: row.get(3)?,
            entity_type: row.get(4)?,
            entity_id: row.get(5)?,
            payload_json: payload_json_str.and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(7)?,
        })
    }
}
