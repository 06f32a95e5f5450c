// ==========================================
// 采购授标引擎 - 报价仓储
// ==========================================
// 红线: 报价明细随报价级联删除
// 红线: 状态/名次写入前由 API 层做状态机校验
// ==========================================

use crate::domain::quotation::{QuoteItem, Quotation};
use crate::domain::types::QuotationStatus;
use crate::repository::codec::{format_ts, parse_enum, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT quotation_id, requisition_id, vendor_id, status, rank,
           final_average_score, submitted_at
    FROM quotation
"#;

pub struct QuotationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuotationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作（调用方事务内）
    // ==========================================

    /// 插入报价及其明细
    pub fn insert_in_tx(conn: &Connection, q: &Quotation) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO quotation (
                quotation_id, requisition_id, vendor_id, status, rank,
                final_average_score, submitted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                q.quotation_id,
                q.requisition_id,
                q.vendor_id,
                q.status.to_db_str(),
                q.rank,
                q.final_average_score,
                format_ts(&q.submitted_at),
            ],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO quote_item (
                item_id, quotation_id, item_name, quantity, unit_price,
                lead_time_days, position, awarded
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for item in &q.items {
            stmt.execute(params![
                item.item_id,
                q.quotation_id,
                item.item_name,
                item.quantity,
                item.unit_price,
                item.lead_time_days,
                item.position,
                item.awarded,
            ])?;
        }

        Ok(())
    }

    /// 更新状态与名次
    pub fn update_status_in_tx(
        conn: &Connection,
        quotation_id: &str,
        status: QuotationStatus,
        rank: Option<i32>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE quotation SET status = ?2, rank = ?3 WHERE quotation_id = ?1",
            params![quotation_id, status.to_db_str(), rank],
        )?;
        Self::ensure_updated(rows, quotation_id)
    }

    /// 更新综合得分
    pub fn update_score_in_tx(conn: &Connection, quotation_id: &str, score: f64) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE quotation SET final_average_score = ?2 WHERE quotation_id = ?1",
            params![quotation_id, score],
        )?;
        Self::ensure_updated(rows, quotation_id)
    }

    /// 标记授标明细（先清空再标记）
    pub fn set_awarded_items_in_tx(
        conn: &Connection,
        quotation_id: &str,
        item_ids: &[String],
    ) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE quote_item SET awarded = 0 WHERE quotation_id = ?1",
            params![quotation_id],
        )?;
        let mut stmt = conn.prepare(
            "UPDATE quote_item SET awarded = 1 WHERE quotation_id = ?1 AND item_id = ?2",
        )?;
        for item_id in item_ids {
            stmt.execute(params![quotation_id, item_id])?;
        }
        Ok(())
    }

    /// 重置申购单下全部报价：回到 Submitted，清空名次与授标明细
    pub fn reset_all_in_tx(conn: &Connection, requisition_id: &str) -> RepositoryResult<usize> {
        conn.execute(
            r#"
            UPDATE quote_item SET awarded = 0
            WHERE quotation_id IN (SELECT quotation_id FROM quotation WHERE requisition_id = ?1)
            "#,
            params![requisition_id],
        )?;
        let rows = conn.execute(
            "UPDATE quotation SET status = ?2, rank = NULL WHERE requisition_id = ?1",
            params![requisition_id, QuotationStatus::Submitted.to_db_str()],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, quotation_id: &str) -> RepositoryResult<Option<Quotation>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in_tx(&conn, quotation_id)
    }

    pub fn find_by_id_in_tx(conn: &Connection, quotation_id: &str) -> RepositoryResult<Option<Quotation>> {
        let sql = format!("{} WHERE quotation_id = ?1", SELECT_COLUMNS);
        let header = conn
            .query_row(&sql, params![quotation_id], Self::map_row)
            .optional()?;

        match header {
            Some(mut q) => {
                q.items = Self::load_items(conn, &q.quotation_id)?;
                Ok(Some(q))
            }
            None => Ok(None),
        }
    }

    pub fn get_in_tx(conn: &Connection, quotation_id: &str) -> RepositoryResult<Quotation> {
        Self::find_by_id_in_tx(conn, quotation_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Quotation".to_string(),
            id: quotation_id.to_string(),
        })
    }

    pub fn list_by_requisition(&self, requisition_id: &str) -> RepositoryResult<Vec<Quotation>> {
        let conn = self.get_conn()?;
        Self::list_by_requisition_in_tx(&conn, requisition_id)
    }

    /// 申购单下全部报价（按提交时间升序）
    pub fn list_by_requisition_in_tx(
        conn: &Connection,
        requisition_id: &str,
    ) -> RepositoryResult<Vec<Quotation>> {
        let sql = format!(
            "{} WHERE requisition_id = ?1 ORDER BY submitted_at ASC, quotation_id ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut quotations = stmt
            .query_map(params![requisition_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for q in quotations.iter_mut() {
            q.items = Self::load_items(conn, &q.quotation_id)?;
        }
        Ok(quotations)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn load_items(conn: &Connection, quotation_id: &str) -> RepositoryResult<Vec<QuoteItem>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT item_id, quotation_id, item_name, quantity, unit_price,
                   lead_time_days, position, awarded
            FROM quote_item
            WHERE quotation_id = ?1
            ORDER BY position ASC
            "#,
        )?;
        let items = stmt
            .query_map(params![quotation_id], |row| {
                Ok(QuoteItem {
                    item_id: row.get(0)?,
                    quotation_id: row.get(1)?,
                    item_name: row.get(2)?,
                    quantity: row.get(3)?,
                    unit_price: row.get(4)?,
                    lead_time_days: row.get(5)?,
                    position: row.get(6)?,
                    awarded: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn ensure_updated(rows: usize, quotation_id: &str) -> RepositoryResult<()> {
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Quotation".to_string(),
                id: quotation_id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(row: &Row) -> rusqlite::Result<Quotation> {
        let status: String = row.get(3)?;
        let submitted_at: String = row.get(6)?;

        Ok(Quotation {
            quotation_id: row.get(0)?,
            requisition_id: row.get(1)?,
            vendor_id: row.get(2)?,
            status: parse_enum(3, &status, QuotationStatus::from_db_str)?,
            rank: row.get(4)?,
            final_average_score: row.get(5)?,
            submitted_at: parse_ts(6, &submitted_at)?,
            items: Vec::new(),
        })
    }
}
