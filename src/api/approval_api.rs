// ==========================================
// 采购授标引擎 - 审批路由 API
// ==========================================
// 职责: 按授标金额把申购单送到委员会或审批人
// 档位: [min, max] 双端闭区间；低于最低档位走经理直批
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::api::access::{ensure_allowed, AccessPolicy, Permission};
use crate::api::error::{ApiError, ApiResult, ConflictKind};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::approval::{RoutingDecision, TierTarget};
use crate::domain::types::RequisitionStatus;
use crate::engine::events::{OptionalNotifier, ProcurementEvent};
use crate::engine::routing::RouteTarget;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::requisition_repo::RequisitionRepository;
use crate::repository::codec::now_millis;
use crate::repository::transaction::TransactionRunner;
use crate::repository::user_repo::UserRepository;

/// 审批路由结果（带提示文案）
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ApprovalRouting {
    pub requisition_id: String,
    pub decision: RoutingDecision,
    pub message: String,
}

// ==========================================
// ApprovalApi - 审批路由 API
// ==========================================
pub struct ApprovalApi {
    tx: TransactionRunner,
    notifier: Arc<OptionalNotifier>,
    access: Arc<dyn AccessPolicy>,
}

impl ApprovalApi {
    pub fn new(
        tx: TransactionRunner,
        notifier: Arc<OptionalNotifier>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self { tx, notifier, access }
    }

    /// 按授标金额路由审批
    ///
    /// # 参数
    /// - requisition_id: 申购单ID
    /// - total_award_value: 授标金额（非负）
    /// - actor: 操作人
    ///
    /// # 返回
    /// - Ok(ApprovalRouting): 下一状态与审批人/委员会
    /// - Err(NoApproverForRole): 目标角色没有启用用户
    /// - Err(AmbiguousTier / UnroutableValue): 档位配置无法给出唯一去向
    pub fn route_for_approval(
        &self,
        requisition_id: &str,
        total_award_value: f64,
        actor: &str,
    ) -> ApiResult<ApprovalRouting> {
        ensure_allowed(self.access.as_ref(), actor, Permission::RouteApproval, requisition_id)?;

        let now = now_millis();
        let decision = self.tx.run("route_for_approval", |conn| -> ApiResult<RoutingDecision> {
            let pr = RequisitionRepository::get_in_tx(conn, requisition_id)?;
            if pr.status == RequisitionStatus::PoCreated {
                return Err(ApiError::conflict(
                    ConflictKind::InvalidStateTransition,
                    format!("申购单{}已生成采购订单，不能重新路由", requisition_id),
                ));
            }
            route_in_tx(conn, requisition_id, total_award_value, actor, now)
        })?;

        self.notifier.dispatch(&[approval_event(requisition_id, &decision)]);

        Ok(ApprovalRouting {
            requisition_id: requisition_id.to_string(),
            message: routing_message(&decision),
            decision,
        })
    }
}

/// 在调用方事务内完成路由并落库
///
/// 授标流程与独立路由共用；审计行与申购单更新同事务提交。
pub(crate) fn route_in_tx(
    conn: &Connection,
    requisition_id: &str,
    total_award_value: f64,
    actor: &str,
    now: NaiveDateTime,
) -> ApiResult<RoutingDecision> {
    let settings = ConfigManager::load_settings_in_tx(conn)?;
    let table = settings.routing_table();

    let decision = match table.route(total_award_value)? {
        RouteTarget::Tier {
            target: TierTarget::Committee { name },
            ..
        } => RoutingDecision {
            next_status: RequisitionStatus::PendingCommitteeReview,
            next_approver_id: None,
            committee: Some(name),
            total_award_value,
        },
        RouteTarget::Tier {
            target: TierTarget::Role { role },
            ..
        } => manager_decision(conn, &role, total_award_value)?,
        RouteTarget::ManagerFallback => {
            manager_decision(conn, &settings.manager_role, total_award_value)?
        }
    };

    RequisitionRepository::update_routing_in_tx(
        conn,
        requisition_id,
        decision.next_status,
        decision.next_approver_id.as_deref(),
        decision.committee.as_deref(),
        total_award_value,
        now,
    )?;

    ActionLogRepository::insert_in_tx(
        conn,
        &ActionLog::new(ActionType::RouteApproval, EntityType::Requisition, requisition_id, actor)
            .with_payload(&decision),
    )?;

    tracing::info!(
        requisition_id,
        total_award_value,
        next_status = %decision.next_status,
        "审批路由完成"
    );
    Ok(decision)
}

fn manager_decision(conn: &Connection, role: &str, value: f64) -> ApiResult<RoutingDecision> {
    let approver = UserRepository::find_first_active_by_role_in_tx(conn, role)?.ok_or_else(|| {
        ApiError::NoApproverForRole {
            role: role.to_string(),
        }
    })?;
    Ok(RoutingDecision {
        next_status: RequisitionStatus::PendingManagerApproval,
        next_approver_id: Some(approver.user_id),
        committee: None,
        total_award_value: value,
    })
}

/// 审批请求事件
pub(crate) fn approval_event(requisition_id: &str, decision: &RoutingDecision) -> ProcurementEvent {
    ProcurementEvent::ApprovalRequested {
        requisition_id: requisition_id.to_string(),
        approver_id: decision.next_approver_id.clone(),
        committee: decision.committee.clone(),
    }
}

pub(crate) fn routing_message(decision: &RoutingDecision) -> String {
    match (&decision.committee, &decision.next_approver_id) {
        (Some(committee), _) => {
            crate::i18n::t_with_args("approval.committee", &[("committee", committee.as_str())])
        }
        (None, Some(approver)) => {
            crate::i18n::t_with_args("approval.manager", &[("approver", approver.as_str())])
        }
        (None, None) => String::new(),
    }
}
