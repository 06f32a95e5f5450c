// ==========================================
// 采购授标引擎 - 三方匹配结果模型
// ==========================================

use crate::domain::types::MatchStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 单个订单明细的匹配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMatch {
    pub po_item_id: String,
    pub item_name: String,
    pub po_quantity: i64,
    pub grn_quantity: i64,
    pub invoice_quantity: i64,
    pub po_unit_price: f64,
    pub invoice_unit_price: Option<f64>, // 最近一张含该物料的发票单价
    pub quantity_match: bool,
    pub price_match: bool,
}

/// 匹配汇总
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchTotals {
    pub po_amount: f64,
    pub invoiced_amount: f64,
    pub po_quantity: i64,
    pub received_quantity: i64,
    pub invoiced_quantity: i64,
}

/// 人工处理记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualResolution {
    pub resolved_by: String,
    pub note: String,
    pub resolved_at: NaiveDateTime,
}

// ==========================================
// MatchingResult - 三方匹配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub po_id: String,
    pub status: MatchStatus,
    pub quantity_match: bool,
    pub price_match: bool,
    pub items: Vec<ItemMatch>,
    pub totals: MatchTotals,
    pub resolution: Option<ManualResolution>,
}

impl MatchingResult {
    /// 查找指定订单明细的匹配结果
    pub fn item(&self, po_item_id: &str) -> Option<&ItemMatch> {
        self.items.iter().find(|i| i.po_item_id == po_item_id)
    }
}

/// 已持久化的对账状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub po_id: String,
    pub status: MatchStatus,
    pub quantity_match: bool,
    pub price_match: bool,
    pub checked_at: NaiveDateTime,
    pub resolution: Option<ManualResolution>,
}
