// ==========================================
// 采购授标引擎 - 结算对账 API
// ==========================================
// 职责: 收货单/发票登记、三方匹配、差异人工处理
// 红线: 单据变化后在同一事务内重新匹配，并清除人工处理记录
// 红线: 人工处理只允许从 Mismatched 发起
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::api::access::{ensure_allowed, AccessPolicy, Permission};
use crate::api::error::{ApiError, ApiResult, ConflictKind};
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::purchase_order::{GoodsReceiptNote, GrnItem, Invoice, InvoiceItem, PurchaseOrder};
use crate::domain::reconciliation::{ManualResolution, MatchingResult, ReconciliationRecord};
use crate::domain::types::MatchStatus;
use crate::engine::events::{OptionalNotifier, ProcurementEvent};
use crate::engine::reconciliation::ThreeWayMatcher;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::purchase_order_repo::PurchaseOrderRepository;
use crate::repository::reconciliation_repo::ReconciliationRepository;
use crate::repository::codec::{now_millis, truncate_millis};
use crate::repository::transaction::TransactionRunner;

/// 收货明细输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrnLineInput {
    pub po_item_id: String,
    pub quantity_received: i64,
}

/// 发票明细输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineInput {
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: f64,
}

/// 对账报告（匹配结果 + 提示文案）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub document_id: Option<String>,
    pub result: MatchingResult,
    pub message: String,
}

// ==========================================
// ReconciliationApi - 结算对账 API
// ==========================================
pub struct ReconciliationApi {
    tx: TransactionRunner,
    matcher: ThreeWayMatcher,
    purchase_order_repo: Arc<PurchaseOrderRepository>,
    reconciliation_repo: Arc<ReconciliationRepository>,
    notifier: Arc<OptionalNotifier>,
    access: Arc<dyn AccessPolicy>,
}

impl ReconciliationApi {
    pub fn new(
        tx: TransactionRunner,
        purchase_order_repo: Arc<PurchaseOrderRepository>,
        reconciliation_repo: Arc<ReconciliationRepository>,
        notifier: Arc<OptionalNotifier>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            tx,
            matcher: ThreeWayMatcher::new(),
            purchase_order_repo,
            reconciliation_repo,
            notifier,
            access,
        }
    }

    /// 执行三方匹配
    ///
    /// 缺收货单或发票时返回 Pending（不是错误）。
    pub fn match_order(&self, po_id: &str, actor: &str) -> ApiResult<ReconciliationReport> {
        ensure_allowed(self.access.as_ref(), actor, Permission::RunMatch, po_id)?;

        let now = now_millis();
        let result = self.tx.run("match_order", |conn| -> ApiResult<MatchingResult> {
            self.rematch_in_tx(conn, po_id, actor, now, false)
        })?;

        self.finish(po_id, None, result)
    }

    /// 登记收货单并重新匹配
    pub fn record_goods_receipt(
        &self,
        po_id: &str,
        received_by: &str,
        lines: Vec<GrnLineInput>,
    ) -> ApiResult<ReconciliationReport> {
        if lines.is_empty() {
            return Err(ApiError::validation("lines", "收货单至少包含一行"));
        }
        for (i, line) in lines.iter().enumerate() {
            if line.quantity_received < 0 {
                return Err(ApiError::validation(
                    format!("lines[{}].quantity_received", i),
                    "收货数量不能为负数",
                ));
            }
        }
        ensure_allowed(self.access.as_ref(), received_by, Permission::RecordDocuments, po_id)?;

        let now = now_millis();
        let grn_id = uuid::Uuid::new_v4().to_string();
        let result = self.tx.run("record_goods_receipt", |conn| -> ApiResult<MatchingResult> {
            let po = PurchaseOrderRepository::get_in_tx(conn, po_id)?;
            let po_item_ids: HashSet<&str> = po.items.iter().map(|i| i.po_item_id.as_str()).collect();
            for (i, line) in lines.iter().enumerate() {
                if !po_item_ids.contains(line.po_item_id.as_str()) {
                    return Err(ApiError::validation(
                        format!("lines[{}].po_item_id", i),
                        format!("订单明细{}不属于采购订单{}", line.po_item_id, po_id),
                    ));
                }
            }

            let grn = GoodsReceiptNote {
                grn_id: grn_id.clone(),
                po_id: po_id.to_string(),
                received_by: received_by.to_string(),
                received_at: now,
                items: lines
                    .iter()
                    .map(|line| GrnItem {
                        grn_item_id: uuid::Uuid::new_v4().to_string(),
                        grn_id: grn_id.clone(),
                        po_item_id: line.po_item_id.clone(),
                        quantity_received: line.quantity_received,
                    })
                    .collect(),
            };
            PurchaseOrderRepository::insert_grn_in_tx(conn, &grn)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::RecordGoodsReceipt, EntityType::GoodsReceipt, &grn_id, received_by)
                    .with_payload(&grn),
            )?;

            self.rematch_in_tx(conn, po_id, received_by, now, true)
        })?;

        self.finish(po_id, Some(grn_id), result)
    }

    /// 登记发票并重新匹配
    ///
    /// submitted_at 为空时取当前时间；同名物料以最近提交的发票单价为准。
    pub fn record_invoice(
        &self,
        po_id: &str,
        invoice_number: &str,
        lines: Vec<InvoiceLineInput>,
        submitted_at: Option<NaiveDateTime>,
        actor: &str,
    ) -> ApiResult<ReconciliationReport> {
        if invoice_number.trim().is_empty() {
            return Err(ApiError::validation("invoice_number", "发票号不能为空"));
        }
        if lines.is_empty() {
            return Err(ApiError::validation("lines", "发票至少包含一行"));
        }
        for (i, line) in lines.iter().enumerate() {
            if line.item_name.trim().is_empty() {
                return Err(ApiError::validation(format!("lines[{}].item_name", i), "物料名称不能为空"));
            }
            if line.quantity < 0 {
                return Err(ApiError::validation(format!("lines[{}].quantity", i), "数量不能为负数"));
            }
            if !line.unit_price.is_finite() || line.unit_price < 0.0 {
                return Err(ApiError::validation(format!("lines[{}].unit_price", i), "单价无效"));
            }
        }
        ensure_allowed(self.access.as_ref(), actor, Permission::RecordDocuments, po_id)?;

        let now = now_millis();
        let invoice_id = uuid::Uuid::new_v4().to_string();
        let result = self.tx.run("record_invoice", |conn| -> ApiResult<MatchingResult> {
            PurchaseOrderRepository::get_in_tx(conn, po_id)?;

            let invoice = Invoice {
                invoice_id: invoice_id.clone(),
                po_id: po_id.to_string(),
                invoice_number: invoice_number.trim().to_string(),
                submitted_at: submitted_at.map(truncate_millis).unwrap_or(now),
                items: lines
                    .iter()
                    .map(|line| InvoiceItem {
                        invoice_item_id: uuid::Uuid::new_v4().to_string(),
                        invoice_id: invoice_id.clone(),
                        item_name: line.item_name.trim().to_string(),
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                    })
                    .collect(),
            };
            PurchaseOrderRepository::insert_invoice_in_tx(conn, &invoice)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::RecordInvoice, EntityType::Invoice, &invoice_id, actor)
                    .with_payload(&invoice),
            )?;

            self.rematch_in_tx(conn, po_id, actor, now, true)
        })?;

        self.finish(po_id, Some(invoice_id), result)
    }

    /// 差异人工处理
    ///
    /// # 返回
    /// - Ok: 状态变为 Resolved，记录处理人/说明/时间
    /// - Err(StateConflict/InvalidStateTransition): 当前不是 Mismatched
    pub fn resolve_manually(&self, po_id: &str, actor: &str, note: &str) -> ApiResult<ReconciliationReport> {
        if note.trim().is_empty() {
            return Err(ApiError::validation("note", "处理说明不能为空"));
        }
        ensure_allowed(self.access.as_ref(), actor, Permission::ResolveReconciliation, po_id)?;

        let now = now_millis();
        let result = self.tx.run("resolve_manually", |conn| -> ApiResult<MatchingResult> {
            let current = ReconciliationRepository::find_by_po_in_tx(conn, po_id)?;
            match current {
                Some(record) if record.status == MatchStatus::Mismatched => {}
                Some(record) => {
                    return Err(ApiError::conflict(
                        ConflictKind::InvalidStateTransition,
                        format!("采购订单{}对账状态为{}，只有差异状态可人工处理", po_id, record.status),
                    ))
                }
                None => {
                    return Err(ApiError::conflict(
                        ConflictKind::InvalidStateTransition,
                        format!("采购订单{}尚未执行三方匹配", po_id),
                    ))
                }
            }

            let mut result = self.compute_in_tx(conn, po_id)?;
            let resolution = ManualResolution {
                resolved_by: actor.to_string(),
                note: note.trim().to_string(),
                resolved_at: now,
            };
            result.status = MatchStatus::Resolved;
            result.resolution = Some(resolution.clone());

            ReconciliationRepository::upsert_in_tx(conn, &record_of(&result, now))?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::ManualResolution, EntityType::Reconciliation, po_id, actor)
                    .with_payload(&resolution),
            )?;
            Ok(result)
        })?;

        tracing::info!(po_id, actor, "对账差异已人工处理");
        Ok(ReconciliationReport {
            document_id: None,
            message: status_message(result.status),
            result,
        })
    }

    pub fn get_purchase_order(&self, po_id: &str) -> ApiResult<PurchaseOrder> {
        self.purchase_order_repo
            .find_by_id(po_id)?
            .ok_or_else(|| ApiError::not_found("PurchaseOrder", po_id))
    }

    /// 查询已持久化的对账状态
    pub fn get_reconciliation(&self, po_id: &str) -> ApiResult<ReconciliationRecord> {
        self.reconciliation_repo
            .find_by_po(po_id)?
            .ok_or_else(|| ApiError::not_found("Reconciliation", po_id))
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn compute_in_tx(&self, conn: &Connection, po_id: &str) -> ApiResult<MatchingResult> {
        let po = PurchaseOrderRepository::get_in_tx(conn, po_id)?;
        let receipts = PurchaseOrderRepository::list_grns_in_tx(conn, po_id)?;
        let invoices = PurchaseOrderRepository::list_invoices_in_tx(conn, po_id)?;
        Ok(self.matcher.match_documents(&po, &receipts, &invoices))
    }

    /// 重新匹配并落库
    ///
    /// documents_changed = false 时，已人工处理且仍为差异的结果保持 Resolved。
    fn rematch_in_tx(
        &self,
        conn: &Connection,
        po_id: &str,
        actor: &str,
        now: NaiveDateTime,
        documents_changed: bool,
    ) -> ApiResult<MatchingResult> {
        let mut result = self.compute_in_tx(conn, po_id)?;

        if !documents_changed && result.status == MatchStatus::Mismatched {
            if let Some(previous) = ReconciliationRepository::find_by_po_in_tx(conn, po_id)? {
                if previous.status == MatchStatus::Resolved {
                    result.status = MatchStatus::Resolved;
                    result.resolution = previous.resolution;
                }
            }
        }

        ReconciliationRepository::upsert_in_tx(conn, &record_of(&result, now))?;
        ActionLogRepository::insert_in_tx(
            conn,
            &ActionLog::new(ActionType::RunMatch, EntityType::Reconciliation, po_id, actor).with_payload(
                &serde_json::json!({
                    "status": result.status,
                    "quantity_match": result.quantity_match,
                    "price_match": result.price_match,
                    "totals": result.totals,
                }),
            ),
        )?;
        Ok(result)
    }

    fn finish(
        &self,
        po_id: &str,
        document_id: Option<String>,
        result: MatchingResult,
    ) -> ApiResult<ReconciliationReport> {
        if result.status == MatchStatus::Mismatched {
            self.notifier.dispatch(&[ProcurementEvent::ReconciliationMismatch {
                po_id: po_id.to_string(),
            }]);
        }
        tracing::info!(po_id, status = %result.status, "三方匹配完成");
        Ok(ReconciliationReport {
            document_id,
            message: status_message(result.status),
            result,
        })
    }
}

fn record_of(result: &MatchingResult, now: NaiveDateTime) -> ReconciliationRecord {
    ReconciliationRecord {
        po_id: result.po_id.clone(),
        status: result.status,
        quantity_match: result.quantity_match,
        price_match: result.price_match,
        checked_at: now,
        resolution: result.resolution.clone(),
    }
}

/// 对账状态提示文案
pub fn status_message(status: MatchStatus) -> String {
    let key = match status {
        MatchStatus::Pending => "reconciliation.pending",
        MatchStatus::Matched => "reconciliation.matched",
        MatchStatus::Mismatched => "reconciliation.mismatched",
        MatchStatus::Resolved => "reconciliation.resolved",
    };
    crate::i18n::t(key)
}
