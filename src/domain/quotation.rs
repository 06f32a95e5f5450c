// ==========================================
// 采购授标引擎 - 供应商报价领域模型
// ==========================================
// 派生字段: total_price = Σ(数量 × 单价)
// 派生字段: delivery_date = 提交时间 + 最大交货周期
// ==========================================

use crate::domain::types::QuotationStatus;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// QuoteItem - 报价明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub item_id: String,
    pub quotation_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub lead_time_days: i64,
    pub position: i32,
    pub awarded: bool, // 授标时被选中的明细
}

impl QuoteItem {
    /// 明细金额
    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

// ==========================================
// Quotation - 供应商报价
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub quotation_id: String,
    pub requisition_id: String,
    pub vendor_id: String,
    pub status: QuotationStatus,
    pub rank: Option<i32>, // 1/2/3，落选为 None
    pub final_average_score: f64,
    pub submitted_at: NaiveDateTime,
    pub items: Vec<QuoteItem>,
}

impl Quotation {
    /// 报价总额
    pub fn total_price(&self) -> f64 {
        self.items.iter().map(QuoteItem::line_total).sum()
    }

    /// 交货日期（提交时间 + 最大交货周期）
    pub fn delivery_date(&self) -> NaiveDateTime {
        let max_lead = self
            .items
            .iter()
            .map(|i| i.lead_time_days)
            .max()
            .unwrap_or(0);
        self.submitted_at + Duration::days(max_lead)
    }

    /// 授标明细
    ///
    /// 未指定明细时视为整单授标。
    pub fn awarded_items(&self) -> Vec<&QuoteItem> {
        let selected: Vec<&QuoteItem> = self.items.iter().filter(|i| i.awarded).collect();
        if selected.is_empty() {
            self.items.iter().collect()
        } else {
            selected
        }
    }

    /// 授标金额
    pub fn awarded_total(&self) -> f64 {
        self.awarded_items().iter().map(|i| i.line_total()).sum()
    }

    /// 明细是否属于本报价
    pub fn has_item(&self, item_id: &str) -> bool {
        self.items.iter().any(|i| i.item_id == item_id)
    }
}
