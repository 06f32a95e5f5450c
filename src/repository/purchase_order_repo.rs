// ==========================================
// 采购授标引擎 - 采购订单/收货单/发票仓储
// ==========================================
// 红线: 订单明细写入后不可更新
// 红线: purchase_order.quotation_id 唯一（重复生成订单的兜底约束）
// ==========================================

use crate::domain::purchase_order::{
    GoodsReceiptNote, GrnItem, Invoice, InvoiceItem, PoItem, PurchaseOrder,
};
use crate::repository::codec::{format_ts, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_PO_COLUMNS: &str = r#"
    SELECT po_id, po_number, requisition_id, quotation_id, vendor_id,
           total_amount, created_by, created_at
    FROM purchase_order
"#;

pub struct PurchaseOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PurchaseOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 采购订单
    // ==========================================

    pub fn insert_in_tx(conn: &Connection, po: &PurchaseOrder) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO purchase_order (
                po_id, po_number, requisition_id, quotation_id, vendor_id,
                total_amount, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                po.po_id,
                po.po_number,
                po.requisition_id,
                po.quotation_id,
                po.vendor_id,
                po.total_amount,
                po.created_by,
                format_ts(&po.created_at),
            ],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO po_item (po_item_id, po_id, item_name, quantity, unit_price, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for item in &po.items {
            stmt.execute(params![
                item.po_item_id,
                po.po_id,
                item.item_name,
                item.quantity,
                item.unit_price,
                item.position,
            ])?;
        }
        Ok(())
    }

    pub fn find_by_id(&self, po_id: &str) -> RepositoryResult<Option<PurchaseOrder>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in_tx(&conn, po_id)
    }

    pub fn find_by_id_in_tx(conn: &Connection, po_id: &str) -> RepositoryResult<Option<PurchaseOrder>> {
        let sql = format!("{} WHERE po_id = ?1", SELECT_PO_COLUMNS);
        Self::load_one(conn, &sql, po_id)
    }

    pub fn get_in_tx(conn: &Connection, po_id: &str) -> RepositoryResult<PurchaseOrder> {
        Self::find_by_id_in_tx(conn, po_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "PurchaseOrder".to_string(),
            id: po_id.to_string(),
        })
    }

    /// 按报价查询订单（幂等校验）
    pub fn find_by_quotation_in_tx(
        conn: &Connection,
        quotation_id: &str,
    ) -> RepositoryResult<Option<PurchaseOrder>> {
        let sql = format!("{} WHERE quotation_id = ?1", SELECT_PO_COLUMNS);
        Self::load_one(conn, &sql, quotation_id)
    }

    pub fn count_by_quotation(&self, quotation_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM purchase_order WHERE quotation_id = ?1",
            params![quotation_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==========================================
    // 收货单
    // ==========================================

    pub fn insert_grn_in_tx(conn: &Connection, grn: &GoodsReceiptNote) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO goods_receipt_note (grn_id, po_id, received_by, received_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![grn.grn_id, grn.po_id, grn.received_by, format_ts(&grn.received_at)],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO grn_item (grn_item_id, grn_id, po_item_id, quantity_received)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )?;
        for item in &grn.items {
            stmt.execute(params![
                item.grn_item_id,
                grn.grn_id,
                item.po_item_id,
                item.quantity_received
            ])?;
        }
        Ok(())
    }

    pub fn list_grns_in_tx(conn: &Connection, po_id: &str) -> RepositoryResult<Vec<GoodsReceiptNote>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT grn_id, po_id, received_by, received_at
            FROM goods_receipt_note
            WHERE po_id = ?1
            ORDER BY received_at ASC, grn_id ASC
            "#,
        )?;
        let mut grns = stmt
            .query_map(params![po_id], |row| {
                let received_at: String = row.get(3)?;
                Ok(GoodsReceiptNote {
                    grn_id: row.get(0)?,
                    po_id: row.get(1)?,
                    received_by: row.get(2)?,
                    received_at: parse_ts(3, &received_at)?,
                    items: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut item_stmt = conn.prepare(
            r#"
            SELECT grn_item_id, grn_id, po_item_id, quantity_received
            FROM grn_item
            WHERE grn_id = ?1
            ORDER BY rowid ASC
            "#,
        )?;
        for grn in grns.iter_mut() {
            grn.items = item_stmt
                .query_map(params![grn.grn_id], |row| {
                    Ok(GrnItem {
                        grn_item_id: row.get(0)?,
                        grn_id: row.get(1)?,
                        po_item_id: row.get(2)?,
                        quantity_received: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
        Ok(grns)
    }

    // ==========================================
    // 发票
    // ==========================================

    pub fn insert_invoice_in_tx(conn: &Connection, invoice: &Invoice) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO invoice (invoice_id, po_id, invoice_number, submitted_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                invoice.invoice_id,
                invoice.po_id,
                invoice.invoice_number,
                format_ts(&invoice.submitted_at)
            ],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO invoice_item (invoice_item_id, invoice_id, item_name, quantity, unit_price)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for item in &invoice.items {
            stmt.execute(params![
                item.invoice_item_id,
                invoice.invoice_id,
                item.item_name,
                item.quantity,
                item.unit_price
            ])?;
        }
        Ok(())
    }

    /// 订单全部发票（按提交时间升序）
    pub fn list_invoices_in_tx(conn: &Connection, po_id: &str) -> RepositoryResult<Vec<Invoice>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT invoice_id, po_id, invoice_number, submitted_at
            FROM invoice
            WHERE po_id = ?1
            ORDER BY submitted_at ASC, rowid ASC
            "#,
        )?;
        let mut invoices = stmt
            .query_map(params![po_id], |row| {
                let submitted_at: String = row.get(3)?;
                Ok(Invoice {
                    invoice_id: row.get(0)?,
                    po_id: row.get(1)?,
                    invoice_number: row.get(2)?,
                    submitted_at: parse_ts(3, &submitted_at)?,
                    items: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut item_stmt = conn.prepare(
            r#"
            SELECT invoice_item_id, invoice_id, item_name, quantity, unit_price
            FROM invoice_item
            WHERE invoice_id = ?1
            ORDER BY rowid ASC
            "#,
        )?;
        for invoice in invoices.iter_mut() {
            invoice.items = item_stmt
                .query_map(params![invoice.invoice_id], |row| {
                    Ok(InvoiceItem {
                        invoice_item_id: row.get(0)?,
                        invoice_id: row.get(1)?,
                        item_name: row.get(2)?,
                        quantity: row.get(3)?,
                        unit_price: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
        Ok(invoices)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn load_one(conn: &Connection, sql: &str, key: &str) -> RepositoryResult<Option<PurchaseOrder>> {
        let header = conn.query_row(sql, params![key], Self::map_row).optional()?;
        match header {
            Some(mut po) => {
                po.items = Self::load_items(conn, &po.po_id)?;
                Ok(Some(po))
            }
            None => Ok(None),
        }
    }

    fn load_items(conn: &Connection, po_id: &str) -> RepositoryResult<Vec<PoItem>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT po_item_id, po_id, item_name, quantity, unit_price, position
            FROM po_item
            WHERE po_id = ?1
            ORDER BY position ASC
            "#,
        )?;
        let items = stmt
            .query_map(params![po_id], |row| {
                Ok(PoItem {
                    po_item_id: row.get(0)?,
                    po_id: row.get(1)?,
                    item_name: row.get(2)?,
                    quantity: row.get(3)?,
                    unit_price: row.get(4)?,
                    position: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn map_row(row: &Row) -> rusqlite::Result<PurchaseOrder> {
        let created_at: String = row.get(7)?;
        Ok(PurchaseOrder {
            po_id: row.get(0)?,
            po_number: row.get(1)?,
            requisition_id: row.get(2)?,
            quotation_id: row.get(3)?,
            vendor_id: row.get(4)?,
            total_amount: row.get(5)?,
            created_by: row.get(6)?,
            created_at: parse_ts(7, &created_at)?,
            items: Vec::new(),
        })
    }
}
