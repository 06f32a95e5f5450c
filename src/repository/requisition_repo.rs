// ==========================================
// 采购授标引擎 - 申购单仓储
// ==========================================
// 红线: Repository 不含业务逻辑；状态字段由 API 层决定后写入
// ==========================================

use crate::domain::requisition::PurchaseRequisition;
use crate::domain::types::RequisitionStatus;
use crate::repository::codec::{format_opt_ts, format_ts, parse_enum, parse_opt_ts, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT requisition_id, title, requested_by, total_price, status,
           current_approver_id, current_committee, award_response_deadline,
           purchase_order_id, created_at, updated_at
    FROM purchase_requisition
"#;

pub struct RequisitionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RequisitionRepository {
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

    pub fn insert_in_tx(conn: &Connection, pr: &PurchaseRequisition) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO purchase_requisition (
                requisition_id, title, requested_by, total_price, status,
                current_approver_id, current_committee, award_response_deadline,
                purchase_order_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                pr.requisition_id,
                pr.title,
                pr.requested_by,
                pr.total_price,
                pr.status.to_db_str(),
                pr.current_approver_id,
                pr.current_committee,
                format_opt_ts(&pr.award_response_deadline),
                pr.purchase_order_id,
                format_ts(&pr.created_at),
                format_ts(&pr.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 写入审批路由结果
    pub fn update_routing_in_tx(
        conn: &Connection,
        requisition_id: &str,
        status: RequisitionStatus,
        approver_id: Option<&str>,
        committee: Option<&str>,
        total_price: f64,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE purchase_requisition
            SET status = ?2, current_approver_id = ?3, current_committee = ?4,
                total_price = ?5, updated_at = ?6
            WHERE requisition_id = ?1
            "#,
            params![
                requisition_id,
                status.to_db_str(),
                approver_id,
                committee,
                total_price,
                format_ts(&now)
            ],
        )?;
        Self::ensure_updated(rows, requisition_id)
    }

    /// 写入授标响应截止时间
    pub fn set_award_deadline_in_tx(
        conn: &Connection,
        requisition_id: &str,
        deadline: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE purchase_requisition
            SET award_response_deadline = ?2, updated_at = ?3
            WHERE requisition_id = ?1
            "#,
            params![requisition_id, format_opt_ts(&deadline), format_ts(&now)],
        )?;
        Self::ensure_updated(rows, requisition_id)
    }

    /// 重新询价：回到 Approved，清空审批人/委员会/截止时间
    pub fn reset_for_rfq_in_tx(
        conn: &Connection,
        requisition_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE purchase_requisition
            SET status = ?2, current_approver_id = NULL, current_committee = NULL,
                award_response_deadline = NULL, updated_at = ?3
            WHERE requisition_id = ?1
            "#,
            params![
                requisition_id,
                RequisitionStatus::Approved.to_db_str(),
                format_ts(&now)
            ],
        )?;
        Self::ensure_updated(rows, requisition_id)
    }

    /// 订单已生成
    pub fn mark_po_created_in_tx(
        conn: &Connection,
        requisition_id: &str,
        po_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE purchase_requisition
            SET status = ?2, purchase_order_id = ?3, award_response_deadline = NULL,
                updated_at = ?4
            WHERE requisition_id = ?1
            "#,
            params![
                requisition_id,
                RequisitionStatus::PoCreated.to_db_str(),
                po_id,
                format_ts(&now)
            ],
        )?;
        Self::ensure_updated(rows, requisition_id)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, requisition_id: &str) -> RepositoryResult<Option<PurchaseRequisition>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in_tx(&conn, requisition_id)
    }

    pub fn find_by_id_in_tx(
        conn: &Connection,
        requisition_id: &str,
    ) -> RepositoryResult<Option<PurchaseRequisition>> {
        let sql = format!("{} WHERE requisition_id = ?1", SELECT_COLUMNS);
        let pr = conn
            .query_row(&sql, params![requisition_id], Self::map_row)
            .optional()?;
        Ok(pr)
    }

    /// 查询，不存在则报 NotFound
    pub fn get_in_tx(conn: &Connection, requisition_id: &str) -> RepositoryResult<PurchaseRequisition> {
        Self::find_by_id_in_tx(conn, requisition_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "PurchaseRequisition".to_string(),
            id: requisition_id.to_string(),
        })
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn ensure_updated(rows: usize, requisition_id: &str) -> RepositoryResult<()> {
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PurchaseRequisition".to_string(),
                id: requisition_id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(row: &Row) -> rusqlite::Result<PurchaseRequisition> {
        let status: String = row.get(4)?;
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;

        Ok(PurchaseRequisition {
            requisition_id: row.get(0)?,
            title: row.get(1)?,
            requested_by: row.get(2)?,
            total_price: row.get(3)?,
            status: parse_enum(4, &status, RequisitionStatus::from_db_str)?,
            current_approver_id: row.get(5)?,
            current_committee: row.get(6)?,
            award_response_deadline: parse_opt_ts(7, row.get(7)?)?,
            purchase_order_id: row.get(8)?,
            created_at: parse_ts(9, &created_at)?,
            updated_at: parse_ts(10, &updated_at)?,
        })
    }
}
