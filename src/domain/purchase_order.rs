// ==========================================
// 采购授标引擎 - 采购订单/收货单/发票领域模型
// ==========================================
// 红线: 采购订单明细下达后不可变（对账基准）
// 收货明细按 po_item_id 关联；发票明细按物料名称关联
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// PurchaseOrder - 采购订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub po_id: String,
    pub po_number: String,
    pub requisition_id: String,
    pub quotation_id: Option<String>,
    pub vendor_id: String,
    pub total_amount: f64,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub items: Vec<PoItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoItem {
    pub po_item_id: String,
    pub po_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub position: i32,
}

impl PurchaseOrder {
    /// 生成订单号: PO-YYYYMMDD-XXXXXXXX
    pub fn generate_po_number(now: NaiveDateTime, po_id: &str) -> String {
        let suffix: String = po_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect::<String>()
            .to_uppercase();
        format!("PO-{}-{}", now.format("%Y%m%d"), suffix)
    }
}

// ==========================================
// GoodsReceiptNote - 收货单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceiptNote {
    pub grn_id: String,
    pub po_id: String,
    pub received_by: String,
    pub received_at: NaiveDateTime,
    pub items: Vec<GrnItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrnItem {
    pub grn_item_id: String,
    pub grn_id: String,
    pub po_item_id: String,
    pub quantity_received: i64,
}

// ==========================================
// Invoice - 发票
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub po_id: String,
    pub invoice_number: String,
    pub submitted_at: NaiveDateTime,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub invoice_item_id: String,
    pub invoice_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: f64,
}
