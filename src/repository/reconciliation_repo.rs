// ==========================================
// 采购授标引擎 - 对账状态仓储
// ==========================================
// 每个订单一行，保存最近一次三方匹配结果与人工处理信息
// ==========================================

use crate::domain::reconciliation::{ManualResolution, ReconciliationRecord};
use crate::domain::types::MatchStatus;
use crate::repository::codec::{format_ts, parse_enum, parse_opt_ts, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ReconciliationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReconciliationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入对账状态（整行覆盖，含人工处理字段）
    pub fn upsert_in_tx(conn: &Connection, record: &ReconciliationRecord) -> RepositoryResult<()> {
        let resolution = record.resolution.as_ref();
        conn.execute(
            r#"
            INSERT INTO reconciliation (
                po_id, status, quantity_match, price_match, checked_at,
                resolved_by, resolution_note, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(po_id) DO UPDATE SET
                status = excluded.status,
                quantity_match = excluded.quantity_match,
                price_match = excluded.price_match,
                checked_at = excluded.checked_at,
                resolved_by = excluded.resolved_by,
                resolution_note = excluded.resolution_note,
                resolved_at = excluded.resolved_at
            "#,
            params![
                record.po_id,
                record.status.to_db_str(),
                record.quantity_match,
                record.price_match,
                format_ts(&record.checked_at),
                resolution.map(|r| r.resolved_by.clone()),
                resolution.map(|r| r.note.clone()),
                resolution.map(|r| format_ts(&r.resolved_at)),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_po(&self, po_id: &str) -> RepositoryResult<Option<ReconciliationRecord>> {
        let conn = self.get_conn()?;
        Self::find_by_po_in_tx(&conn, po_id)
    }

    pub fn find_by_po_in_tx(conn: &Connection, po_id: &str) -> RepositoryResult<Option<ReconciliationRecord>> {
        let record = conn
            .query_row(
                r#"
                SELECT po_id, status, quantity_match, price_match, checked_at,
                       resolved_by, resolution_note, resolved_at
                FROM reconciliation
                WHERE po_id = ?1
                "#,
                params![po_id],
                |row| {
                    let status: String = row.get(1)?;
                    let checked_at: String = row.get(4)?;
                    let resolved_by: Option<String> = row.get(5)?;
                    let note: Option<String> = row.get(6)?;
                    let resolved_at = parse_opt_ts(7, row.get(7)?)?;

                    let resolution = match (resolved_by, resolved_at) {
                        (Some(resolved_by), Some(resolved_at)) => Some(ManualResolution {
                            resolved_by,
                            note: note.unwrap_or_default(),
                            resolved_at,
                        }),
                        _ => None,
                    };

                    Ok(ReconciliationRecord {
                        po_id: row.get(0)?,
                        status: parse_enum(1, &status, MatchStatus::from_db_str)?,
                        quantity_match: row.get(2)?,
                        price_match: row.get(3)?,
                        checked_at: parse_ts(4, &checked_at)?,
                        resolution,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
