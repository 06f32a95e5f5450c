// ==========================================
// 采购授标引擎 - 三方匹配引擎
// ==========================================
// 职责: 采购订单 × 收货单 × 发票 逐明细比对
// 输入: 订单（含明细）、全部收货单、全部发票
// 输出: MatchingResult（不落库，不含人工处理）
// ==========================================
// 规则:
// - 无收货单或无发票 → Pending（不是失败）
// - 收货数量 = 按 po_item_id 汇总
// - 发票数量 = 按物料名称跨发票汇总
// - 发票单价 = 最近提交的含该物料发票上的单价；没有 → 价格不符
// - 数量/单价均按精确相等比较
// ==========================================

use crate::domain::purchase_order::{GoodsReceiptNote, Invoice, PurchaseOrder};
use crate::domain::reconciliation::{ItemMatch, MatchTotals, MatchingResult};
use crate::domain::types::MatchStatus;
use chrono::NaiveDateTime;
use std::collections::HashMap;

// ==========================================
// ThreeWayMatcher - 三方匹配引擎
// ==========================================
pub struct ThreeWayMatcher {
    // 无状态引擎
}

impl ThreeWayMatcher {
    pub fn new() -> Self {
        Self {}
    }

    /// 执行三方匹配
    pub fn match_documents(
        &self,
        po: &PurchaseOrder,
        receipts: &[GoodsReceiptNote],
        invoices: &[Invoice],
    ) -> MatchingResult {
        let received = Self::received_by_item(receipts);
        let invoiced = Self::invoiced_by_name(invoices);

        let mut totals = MatchTotals::default();
        let mut items = Vec::with_capacity(po.items.len());

        for po_item in &po.items {
            let grn_quantity = received.get(po_item.po_item_id.as_str()).copied().unwrap_or(0);
            let (invoice_quantity, invoice_unit_price) = invoiced
                .get(po_item.item_name.as_str())
                .map(|agg| (agg.quantity, Some(agg.latest_price)))
                .unwrap_or((0, None));

            let quantity_match =
                po_item.quantity == grn_quantity && grn_quantity == invoice_quantity;
            let price_match = invoice_unit_price == Some(po_item.unit_price);

            totals.po_amount += po_item.quantity as f64 * po_item.unit_price;
            totals.po_quantity = totals.po_quantity.saturating_add(po_item.quantity);
            totals.received_quantity = totals.received_quantity.saturating_add(grn_quantity);
            totals.invoiced_quantity = totals.invoiced_quantity.saturating_add(invoice_quantity);

            items.push(ItemMatch {
                po_item_id: po_item.po_item_id.clone(),
                item_name: po_item.item_name.clone(),
                po_quantity: po_item.quantity,
                grn_quantity,
                invoice_quantity,
                po_unit_price: po_item.unit_price,
                invoice_unit_price,
                quantity_match,
                price_match,
            });
        }

        totals.invoiced_amount = invoices
            .iter()
            .flat_map(|inv| inv.items.iter())
            .map(|i| i.quantity as f64 * i.unit_price)
            .sum();

        if receipts.is_empty() || invoices.is_empty() {
            return MatchingResult {
                po_id: po.po_id.clone(),
                status: MatchStatus::Pending,
                quantity_match: false,
                price_match: false,
                items,
                totals,
                resolution: None,
            };
        }

        let quantity_match = items.iter().all(|i| i.quantity_match);
        let price_match = items.iter().all(|i| i.price_match);
        let status = if quantity_match && price_match {
            MatchStatus::Matched
        } else {
            MatchStatus::Mismatched
        };

        MatchingResult {
            po_id: po.po_id.clone(),
            status,
            quantity_match,
            price_match,
            items,
            totals,
            resolution: None,
        }
    }

    fn received_by_item(receipts: &[GoodsReceiptNote]) -> HashMap<&str, i64> {
        let mut received: HashMap<&str, i64> = HashMap::new();
        for item in receipts.iter().flat_map(|g| g.items.iter()) {
            let qty = received.entry(item.po_item_id.as_str()).or_insert(0);
            *qty = qty.saturating_add(item.quantity_received);
        }
        received
    }

    fn invoiced_by_name(invoices: &[Invoice]) -> HashMap<&str, InvoicedItem> {
        let mut invoiced: HashMap<&str, InvoicedItem> = HashMap::new();
        for invoice in invoices {
            for item in &invoice.items {
                let entry = invoiced
                    .entry(item.item_name.as_str())
                    .or_insert(InvoicedItem {
                        quantity: 0,
                        latest_price: item.unit_price,
                        latest_at: invoice.submitted_at,
                    });
                entry.quantity = entry.quantity.saturating_add(item.quantity);
                if invoice.submitted_at >= entry.latest_at {
                    entry.latest_price = item.unit_price;
                    entry.latest_at = invoice.submitted_at;
                }
            }
        }
        invoiced
    }
}

impl Default for ThreeWayMatcher {
    fn default() -> Self {
        Self::new()
    }
}

struct InvoicedItem {
    quantity: i64,
    latest_price: f64,
    latest_at: NaiveDateTime,
}
