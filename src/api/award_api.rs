// ==========================================
// 采购授标引擎 - 授标决策 API
// ==========================================
// 职责: 授标定标、供应商响应、撤销授标、响应超期处理
// 红线: 授标前置检查先于任何写入；整个授标流程单事务提交
// 红线: 同一报价最多生成一张采购订单
// 红线: 拒标/超期只递补下一名（rank+1），不做多级级联
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::api::access::{ensure_allowed, AccessPolicy, Permission};
use crate::api::approval_api::{approval_event, route_in_tx};
use crate::api::error::{ApiError, ApiResult, ConflictKind};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::approval::RoutingDecision;
use crate::domain::purchase_order::{PoItem, PurchaseOrder};
use crate::domain::quotation::Quotation;
use crate::domain::types::{AwardAction, QuotationStatus};
use crate::engine::award::{AwardConflict, AwardRanker, DeclineOutcome, RankAssignment};
use crate::engine::events::{OptionalNotifier, ProcurementEvent};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::purchase_order_repo::PurchaseOrderRepository;
use crate::repository::quotation_repo::QuotationRepository;
use crate::repository::requisition_repo::RequisitionRepository;
use crate::repository::codec::{now_millis, truncate_millis};
use crate::repository::transaction::TransactionRunner;

/// 授标结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardOutcome {
    pub requisition_id: String,
    pub rankings: Vec<RankedQuotation>,
    pub awarded_quotation_id: String,
    pub awarded_vendor_id: String,
    pub awarded_value: f64,
    pub routing: RoutingDecision,
    pub award_response_deadline: NaiveDateTime,
    pub message: String,
}

/// 排名结果（对外）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedQuotation {
    pub quotation_id: String,
    pub vendor_id: String,
    pub score: f64,
    pub status: QuotationStatus,
    pub rank: Option<i32>,
}

impl From<&RankAssignment> for RankedQuotation {
    fn from(a: &RankAssignment) -> Self {
        Self {
            quotation_id: a.quotation_id.clone(),
            vendor_id: a.vendor_id.clone(),
            score: a.score,
            status: a.status,
            rank: a.rank,
        }
    }
}

/// 拒标/超期后的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclineResolution {
    Promoted { quotation_id: String, vendor_id: String },
    RfqRestarted,
}

/// 供应商响应结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardResponse {
    pub quotation_id: String,
    pub status: QuotationStatus,
    pub purchase_order: Option<PurchaseOrder>,
    pub resolution: Option<DeclineResolution>,
    pub message: String,
}

/// 撤销授标结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardReset {
    pub requisition_id: String,
    pub reset_count: usize,
    pub message: String,
}

/// 超期处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiryOutcome {
    pub requisition_id: String,
    pub expired_quotation_id: Option<String>,
    pub resolution: Option<DeclineResolution>,
    pub message: String,
}

// ==========================================
// AwardApi - 授标决策 API
// ==========================================
pub struct AwardApi {
    tx: TransactionRunner,
    ranker: AwardRanker,
    notifier: Arc<OptionalNotifier>,
    access: Arc<dyn AccessPolicy>,
}

impl AwardApi {
    pub fn new(
        tx: TransactionRunner,
        notifier: Arc<OptionalNotifier>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            tx,
            ranker: AwardRanker::new(),
            notifier,
            access,
        }
    }

    // ==========================================
    // 授标定标
    // ==========================================

    /// 授标定标
    ///
    /// # 参数
    /// - requisition_id: 申购单ID
    /// - award_map: 供应商 → 授标明细ID（为空或缺省表示整单授标）
    /// - award_response_deadline: 响应截止时间（None 时按 award.response_days 计算）
    /// - actor: 操作人
    ///
    /// # 返回
    /// - Ok(AwardOutcome): 排名、中标报价、授标金额、审批路由
    /// - Err(NoQuotesFound): 没有报价
    /// - Err(StateConflict/AwardInProgress): 已有中标或备选
    pub fn finalize_award(
        &self,
        requisition_id: &str,
        award_map: BTreeMap<String, Vec<String>>,
        award_response_deadline: Option<NaiveDateTime>,
        actor: &str,
    ) -> ApiResult<AwardOutcome> {
        ensure_allowed(self.access.as_ref(), actor, Permission::FinalizeAward, requisition_id)?;

        let now = now_millis();
        let outcome = self.tx.run("finalize_award", |conn| -> ApiResult<AwardOutcome> {
            RequisitionRepository::get_in_tx(conn, requisition_id)?;

            let quotations = QuotationRepository::list_by_requisition_in_tx(conn, requisition_id)?;
            if quotations.is_empty() {
                return Err(ApiError::NoQuotesFound {
                    requisition_id: requisition_id.to_string(),
                });
            }

            // 1. 前置检查（任何写入之前）
            self.ranker.check_can_award(&quotations).map_err(|conflict| match conflict {
                AwardConflict::InProgress { quotation_id, status } => ApiError::conflict(
                    ConflictKind::AwardInProgress,
                    format!("报价{}处于{}状态，授标进行中", quotation_id, status),
                ),
                AwardConflict::AlreadyAccepted { quotation_id } => ApiError::conflict(
                    ConflictKind::InvalidStateTransition,
                    format!("报价{}已被接受，不能重新授标", quotation_id),
                ),
            })?;
            Self::validate_award_map(&quotations, &award_map)?;

            // 2. 排名并写入状态
            let assignments = self.ranker.rank(&quotations);
            for a in &assignments {
                let current = quotations
                    .iter()
                    .find(|q| q.quotation_id == a.quotation_id)
                    .map(|q| q.status)
                    .unwrap_or(QuotationStatus::Submitted);
                ensure_transition(&a.quotation_id, current, a.status)?;
                QuotationRepository::update_status_in_tx(conn, &a.quotation_id, a.status, a.rank)?;
            }

            // 3. 标记授标明细
            for q in &quotations {
                if let Some(item_ids) = award_map.get(&q.vendor_id) {
                    QuotationRepository::set_awarded_items_in_tx(conn, &q.quotation_id, item_ids)?;
                }
            }

            // 4. 授标金额 = 第一名的授标明细金额
            let winner = assignments
                .first()
                .ok_or_else(|| ApiError::NoQuotesFound {
                    requisition_id: requisition_id.to_string(),
                })?;
            let awarded = QuotationRepository::get_in_tx(conn, &winner.quotation_id)?;
            let awarded_value = awarded.awarded_total();

            // 5. 审批路由 + 响应截止时间
            let routing = route_in_tx(conn, requisition_id, awarded_value, actor, now)?;
            let deadline = match award_response_deadline {
                Some(d) => truncate_millis(d),
                None => {
                    let settings = ConfigManager::load_settings_in_tx(conn)?;
                    response_deadline(now, settings.award_response_days)?
                }
            };
            RequisitionRepository::set_award_deadline_in_tx(conn, requisition_id, Some(deadline), now)?;

            let rankings: Vec<RankedQuotation> = assignments.iter().map(RankedQuotation::from).collect();
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::FinalizeAward, EntityType::Requisition, requisition_id, actor)
                    .with_payload(&serde_json::json!({
                        "rankings": rankings,
                        "award_map": award_map,
                        "awarded_value": awarded_value,
                        "award_response_deadline": deadline,
                    })),
            )?;

            Ok(AwardOutcome {
                requisition_id: requisition_id.to_string(),
                awarded_quotation_id: winner.quotation_id.clone(),
                awarded_vendor_id: winner.vendor_id.clone(),
                awarded_value,
                rankings,
                message: crate::i18n::t_with_args(
                    "award.finalized",
                    &[("vendor", winner.vendor_id.as_str())],
                ),
                routing,
                award_response_deadline: deadline,
            })
        })?;

        self.notifier.dispatch(&[
            ProcurementEvent::AwardFinalized {
                requisition_id: requisition_id.to_string(),
                quotation_id: outcome.awarded_quotation_id.clone(),
                vendor_id: outcome.awarded_vendor_id.clone(),
            },
            approval_event(requisition_id, &outcome.routing),
        ]);

        tracing::info!(
            requisition_id,
            awarded_quotation_id = %outcome.awarded_quotation_id,
            awarded_value = outcome.awarded_value,
            "授标完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // 供应商响应
    // ==========================================

    /// 供应商接受或拒绝授标
    ///
    /// 接受 → 生成采购订单；拒绝 → 递补下一名备选或重新询价。
    pub fn respond_to_award(
        &self,
        quotation_id: &str,
        vendor_id: &str,
        action: AwardAction,
    ) -> ApiResult<AwardResponse> {
        ensure_allowed(self.access.as_ref(), vendor_id, Permission::RespondToAward, quotation_id)?;

        let now = now_millis();
        let mut events = Vec::new();
        let response = self.tx.run("respond_to_award", |conn| -> ApiResult<AwardResponse> {
            let quotation = QuotationRepository::get_in_tx(conn, quotation_id)?;
            if quotation.vendor_id != vendor_id {
                return Err(ApiError::validation(
                    "vendor_id",
                    format!("供应商{}不是报价{}的所有者", vendor_id, quotation_id),
                ));
            }

            match action {
                AwardAction::Accept => {
                    let po = self.accept_in_tx(conn, &quotation, now)?;
                    events.push(ProcurementEvent::PurchaseOrderCreated {
                        requisition_id: quotation.requisition_id.clone(),
                        po_id: po.po_id.clone(),
                        po_number: po.po_number.clone(),
                        vendor_id: vendor_id.to_string(),
                    });
                    Ok(AwardResponse {
                        quotation_id: quotation_id.to_string(),
                        status: QuotationStatus::Accepted,
                        message: crate::i18n::t_with_args(
                            "award.accepted",
                            &[("po_number", po.po_number.as_str())],
                        ),
                        purchase_order: Some(po),
                        resolution: None,
                    })
                }
                AwardAction::Reject => {
                    ensure_transition(quotation_id, quotation.status, QuotationStatus::Declined)?;
                    QuotationRepository::update_status_in_tx(
                        conn,
                        quotation_id,
                        QuotationStatus::Declined,
                        quotation.rank,
                    )?;
                    ActionLogRepository::insert_in_tx(
                        conn,
                        &ActionLog::new(ActionType::DeclineAward, EntityType::Quotation, quotation_id, vendor_id)
                            .with_payload(&serde_json::json!({ "rank": quotation.rank })),
                    )?;

                    let resolution =
                        self.apply_decline_in_tx(conn, &quotation.requisition_id, quotation.rank, vendor_id, now)?;
                    events.push(resolution_event(&quotation.requisition_id, &resolution));
                    let message = match &resolution {
                        DeclineResolution::Promoted { vendor_id, .. } => {
                            crate::i18n::t_with_args("award.promoted", &[("vendor", vendor_id.as_str())])
                        }
                        DeclineResolution::RfqRestarted => crate::i18n::t("award.restarted"),
                    };
                    Ok(AwardResponse {
                        quotation_id: quotation_id.to_string(),
                        status: QuotationStatus::Declined,
                        purchase_order: None,
                        resolution: Some(resolution),
                        message,
                    })
                }
            }
        })?;

        self.notifier.dispatch(&events);
        tracing::info!(quotation_id, vendor_id, status = %response.status, "授标响应已处理");
        Ok(response)
    }

    // ==========================================
    // 撤销授标
    // ==========================================

    /// 撤销授标（人工干预）：全部报价回到 Submitted，申购单回到 Approved
    pub fn change_award(&self, requisition_id: &str, actor: &str) -> ApiResult<AwardReset> {
        ensure_allowed(self.access.as_ref(), actor, Permission::ChangeAward, requisition_id)?;

        let now = now_millis();
        let reset_count = self.tx.run("change_award", |conn| -> ApiResult<usize> {
            RequisitionRepository::get_in_tx(conn, requisition_id)?;
            let quotations = QuotationRepository::list_by_requisition_in_tx(conn, requisition_id)?;
            for q in &quotations {
                ensure_transition(&q.quotation_id, q.status, QuotationStatus::Submitted)?;
            }

            let count = QuotationRepository::reset_all_in_tx(conn, requisition_id)?;
            RequisitionRepository::reset_for_rfq_in_tx(conn, requisition_id, now)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::ChangeAward, EntityType::Requisition, requisition_id, actor)
                    .with_payload(&serde_json::json!({ "reset_count": count })),
            )?;
            Ok(count)
        })?;

        tracing::info!(requisition_id, reset_count, "授标已撤销");
        Ok(AwardReset {
            requisition_id: requisition_id.to_string(),
            reset_count,
            message: crate::i18n::t("award.changed"),
        })
    }

    // ==========================================
    // 响应超期
    // ==========================================

    /// 响应超期处理
    ///
    /// 截止时间已过且中标报价仍未响应时标记 Failed，再按拒标规则递补或重新询价。
    pub fn expire_award_responses(
        &self,
        requisition_id: &str,
        now: NaiveDateTime,
        actor: &str,
    ) -> ApiResult<ExpiryOutcome> {
        ensure_allowed(self.access.as_ref(), actor, Permission::ChangeAward, requisition_id)?;

        let mut events = Vec::new();
        let outcome = self.tx.run("expire_award_responses", |conn| -> ApiResult<ExpiryOutcome> {
            let pr = RequisitionRepository::get_in_tx(conn, requisition_id)?;
            let quotations = QuotationRepository::list_by_requisition_in_tx(conn, requisition_id)?;
            let awarded = quotations.iter().find(|q| q.status == QuotationStatus::Awarded);

            let (awarded, deadline) = match (awarded, pr.award_response_deadline) {
                (Some(q), Some(deadline)) if now > deadline => (q, deadline),
                _ => {
                    return Ok(ExpiryOutcome {
                        requisition_id: requisition_id.to_string(),
                        expired_quotation_id: None,
                        resolution: None,
                        message: crate::i18n::t("award.not_expired"),
                    })
                }
            };

            ensure_transition(&awarded.quotation_id, awarded.status, QuotationStatus::Failed)?;
            QuotationRepository::update_status_in_tx(
                conn,
                &awarded.quotation_id,
                QuotationStatus::Failed,
                awarded.rank,
            )?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::ExpireAward, EntityType::Quotation, &awarded.quotation_id, actor)
                    .with_payload(&serde_json::json!({
                        "deadline": deadline,
                        "checked_at": now,
                    })),
            )?;

            let resolution = self.apply_decline_in_tx(conn, requisition_id, awarded.rank, actor, now)?;
            events.push(resolution_event(requisition_id, &resolution));
            let message = match &resolution {
                DeclineResolution::Promoted { vendor_id, .. } => {
                    crate::i18n::t_with_args("award.expired_promoted", &[("vendor", vendor_id.as_str())])
                }
                DeclineResolution::RfqRestarted => crate::i18n::t("award.expired_restarted"),
            };

            Ok(ExpiryOutcome {
                requisition_id: requisition_id.to_string(),
                expired_quotation_id: Some(awarded.quotation_id.clone()),
                resolution: Some(resolution),
                message,
            })
        })?;

        self.notifier.dispatch(&events);
        if let Some(expired) = &outcome.expired_quotation_id {
            tracing::info!(requisition_id, expired_quotation_id = %expired, "授标响应超期已处理");
        }
        Ok(outcome)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 接受授标：Accepted + 生成采购订单 + 申购单 PoCreated
    fn accept_in_tx(
        &self,
        conn: &Connection,
        quotation: &Quotation,
        now: NaiveDateTime,
    ) -> ApiResult<PurchaseOrder> {
        // 幂等守卫（唯一索引兜底）
        if let Some(existing) = PurchaseOrderRepository::find_by_quotation_in_tx(conn, &quotation.quotation_id)? {
            return Err(ApiError::conflict(
                ConflictKind::DuplicatePurchaseOrder,
                format!("报价{}已生成采购订单{}", quotation.quotation_id, existing.po_number),
            ));
        }
        ensure_transition(&quotation.quotation_id, quotation.status, QuotationStatus::Accepted)?;

        QuotationRepository::update_status_in_tx(
            conn,
            &quotation.quotation_id,
            QuotationStatus::Accepted,
            quotation.rank,
        )?;

        let po_id = uuid::Uuid::new_v4().to_string();
        let items: Vec<PoItem> = quotation
            .awarded_items()
            .into_iter()
            .enumerate()
            .map(|(i, item)| PoItem {
                po_item_id: uuid::Uuid::new_v4().to_string(),
                po_id: po_id.clone(),
                item_name: item.item_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                position: i as i32,
            })
            .collect();
        let po = PurchaseOrder {
            po_number: PurchaseOrder::generate_po_number(now, &po_id),
            po_id,
            requisition_id: quotation.requisition_id.clone(),
            quotation_id: Some(quotation.quotation_id.clone()),
            vendor_id: quotation.vendor_id.clone(),
            total_amount: quotation.awarded_total(),
            created_by: quotation.vendor_id.clone(),
            created_at: now,
            items,
        };

        PurchaseOrderRepository::insert_in_tx(conn, &po)?;
        RequisitionRepository::mark_po_created_in_tx(conn, &quotation.requisition_id, &po.po_id, now)?;

        ActionLogRepository::insert_in_tx(
            conn,
            &ActionLog::new(
                ActionType::AcceptAward,
                EntityType::Quotation,
                &quotation.quotation_id,
                &quotation.vendor_id,
            ),
        )?;
        ActionLogRepository::insert_in_tx(
            conn,
            &ActionLog::new(
                ActionType::CreatePurchaseOrder,
                EntityType::PurchaseOrder,
                &po.po_id,
                &quotation.vendor_id,
            )
            .with_payload(&serde_json::json!({
                "po_number": po.po_number,
                "quotation_id": quotation.quotation_id,
                "total_amount": po.total_amount,
            })),
        )?;

        Ok(po)
    }

    /// 拒标/超期后的递补或重新询价
    fn apply_decline_in_tx(
        &self,
        conn: &Connection,
        requisition_id: &str,
        declined_rank: Option<i32>,
        actor: &str,
        now: NaiveDateTime,
    ) -> ApiResult<DeclineResolution> {
        let quotations = QuotationRepository::list_by_requisition_in_tx(conn, requisition_id)?;

        match self.ranker.decline_outcome(&quotations, declined_rank) {
            DeclineOutcome::Promote {
                quotation_id,
                vendor_id,
                rank,
            } => {
                ensure_transition(&quotation_id, QuotationStatus::Standby, QuotationStatus::Awarded)?;
                QuotationRepository::update_status_in_tx(conn, &quotation_id, QuotationStatus::Awarded, Some(rank))?;

                // 新中标方重新计算响应期
                let settings = ConfigManager::load_settings_in_tx(conn)?;
                let deadline = response_deadline(now, settings.award_response_days)?;
                RequisitionRepository::set_award_deadline_in_tx(conn, requisition_id, Some(deadline), now)?;

                ActionLogRepository::insert_in_tx(
                    conn,
                    &ActionLog::new(ActionType::PromoteStandby, EntityType::Quotation, &quotation_id, actor)
                        .with_payload(&serde_json::json!({
                            "rank": rank,
                            "award_response_deadline": deadline,
                        })),
                )?;
                tracing::info!(requisition_id, quotation_id = %quotation_id, rank, "备选已递补为中标");
                Ok(DeclineResolution::Promoted {
                    quotation_id,
                    vendor_id,
                })
            }
            DeclineOutcome::RestartRfq => {
                let count = QuotationRepository::reset_all_in_tx(conn, requisition_id)?;
                RequisitionRepository::reset_for_rfq_in_tx(conn, requisition_id, now)?;
                ActionLogRepository::insert_in_tx(
                    conn,
                    &ActionLog::new(ActionType::RestartRfq, EntityType::Requisition, requisition_id, actor)
                        .with_payload(&serde_json::json!({ "reset_count": count })),
                )?;
                tracing::info!(requisition_id, reset_count = count, "无备选，重新询价");
                Ok(DeclineResolution::RfqRestarted)
            }
        }
    }

    /// 校验授标明细：供应商必须有报价，明细必须属于该报价
    fn validate_award_map(
        quotations: &[Quotation],
        award_map: &BTreeMap<String, Vec<String>>,
    ) -> ApiResult<()> {
        for (vendor_id, item_ids) in award_map {
            let quotation = quotations
                .iter()
                .find(|q| &q.vendor_id == vendor_id)
                .ok_or_else(|| {
                    ApiError::validation(
                        format!("award_map.{}", vendor_id),
                        format!("供应商{}没有报价", vendor_id),
                    )
                })?;
            for item_id in item_ids {
                if !quotation.has_item(item_id) {
                    return Err(ApiError::validation(
                        format!("award_map.{}", vendor_id),
                        format!("明细{}不属于报价{}", item_id, quotation.quotation_id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 响应截止时间 = now + days（溢出报校验错误，不 panic）
fn response_deadline(now: NaiveDateTime, days: i64) -> ApiResult<NaiveDateTime> {
    Duration::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| {
            ApiError::validation(
                crate::config::config_keys::AWARD_RESPONSE_DAYS,
                format!("响应天数{}超出可表示的时间范围", days),
            )
        })
}

/// 状态转换守卫
fn ensure_transition(quotation_id: &str, from: QuotationStatus, to: QuotationStatus) -> ApiResult<()> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    Err(ApiError::conflict(
        ConflictKind::InvalidStateTransition,
        format!("报价{}不能从{}转为{}", quotation_id, from, to),
    ))
}

fn resolution_event(requisition_id: &str, resolution: &DeclineResolution) -> ProcurementEvent {
    match resolution {
        DeclineResolution::Promoted {
            quotation_id,
            vendor_id,
        } => ProcurementEvent::StandbyPromoted {
            requisition_id: requisition_id.to_string(),
            quotation_id: quotation_id.clone(),
            vendor_id: vendor_id.clone(),
        },
        DeclineResolution::RfqRestarted => ProcurementEvent::RfqRestarted {
            requisition_id: requisition_id.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorKind;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_response_deadline_adds_days() {
        let deadline = response_deadline(noon(), 7).unwrap();
        assert_eq!(deadline, noon() + Duration::days(7));
    }

    #[test]
    fn test_response_deadline_overflow_is_validation_error() {
        let err = response_deadline(noon(), 1_000_000_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(response_deadline(noon(), i64::MAX).is_err());
    }

    #[test]
    fn test_ensure_transition_refuses_accepted_reset() {
        let err = ensure_transition("Q1", QuotationStatus::Accepted, QuotationStatus::Submitted).unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InvalidStateTransition));
        assert!(ensure_transition("Q1", QuotationStatus::Standby, QuotationStatus::Awarded).is_ok());
    }
}
