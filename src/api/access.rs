// ==========================================
// 采购授标引擎 - 访问控制接口
// ==========================================
// 职责: 定义权限点与访问策略 trait（策略由宿主应用实现）
// 红线: 每个变更操作在开启事务前检查权限
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

/// 权限点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ManageRequisition,
    SubmitQuotation,
    SubmitScores,
    FinalizeAward,
    RespondToAward,
    ChangeAward,
    RouteApproval,
    RecordDocuments,
    RunMatch,
    ResolveReconciliation,
    ManageUsers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageRequisition => "MANAGE_REQUISITION",
            Permission::SubmitQuotation => "SUBMIT_QUOTATION",
            Permission::SubmitScores => "SUBMIT_SCORES",
            Permission::FinalizeAward => "FINALIZE_AWARD",
            Permission::RespondToAward => "RESPOND_TO_AWARD",
            Permission::ChangeAward => "CHANGE_AWARD",
            Permission::RouteApproval => "ROUTE_APPROVAL",
            Permission::RecordDocuments => "RECORD_DOCUMENTS",
            Permission::RunMatch => "RUN_MATCH",
            Permission::ResolveReconciliation => "RESOLVE_RECONCILIATION",
            Permission::ManageUsers => "MANAGE_USERS",
        }
    }
}

/// 访问策略 Trait
pub trait AccessPolicy: Send + Sync {
    /// actor 能否对 entity_id 执行 permission
    fn is_allowed(&self, actor: &str, permission: Permission, entity_id: &str) -> bool;
}

/// 放行所有操作（嵌入式/测试场景）
#[derive(Debug, Clone, Default)]
pub struct AllowAllPolicy;

impl AccessPolicy for AllowAllPolicy {
    fn is_allowed(&self, _actor: &str, _permission: Permission, _entity_id: &str) -> bool {
        true
    }
}

/// 检查权限，拒绝时返回 AccessDenied
pub fn ensure_allowed(
    policy: &dyn AccessPolicy,
    actor: &str,
    permission: Permission,
    entity_id: &str,
) -> ApiResult<()> {
    if policy.is_allowed(actor, permission, entity_id) {
        return Ok(());
    }
    tracing::warn!(actor, permission = permission.as_str(), entity_id, "访问被拒绝");
    Err(ApiError::AccessDenied {
        actor: actor.to_string(),
        action: permission.as_str().to_string(),
    })
}
