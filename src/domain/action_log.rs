// ==========================================
// 采购授标引擎 - 审计日志领域模型
// ==========================================
// 红线: 所有写入必须记录（与业务写入同一事务）
// 用途: 审计追踪 {时间, 操作人, 动作, 实体类型, 实体ID, 详情}
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 审计日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub action_type: String, // 存储为字符串
    pub entity_type: String,
    pub entity_id: String,
    pub payload_json: Option<JsonValue>, // 操作详情 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateRequisition,
    DefineCriteria,
    SubmitQuotation,
    SubmitScores,
    FinalizeAward,
    AcceptAward,
    DeclineAward,
    ExpireAward,
    PromoteStandby,
    RestartRfq,
    ChangeAward,
    CreatePurchaseOrder,
    RouteApproval,
    RecordGoodsReceipt,
    RecordInvoice,
    RunMatch,
    ManualResolution,
    RegisterUser,
    UpdateConfig,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateRequisition => "CREATE_REQUISITION",
            ActionType::DefineCriteria => "DEFINE_CRITERIA",
            ActionType::SubmitQuotation => "SUBMIT_QUOTATION",
            ActionType::SubmitScores => "SUBMIT_SCORES",
            ActionType::FinalizeAward => "FINALIZE_AWARD",
            ActionType::AcceptAward => "ACCEPT_AWARD",
            ActionType::DeclineAward => "DECLINE_AWARD",
            ActionType::ExpireAward => "EXPIRE_AWARD",
            ActionType::PromoteStandby => "PROMOTE_STANDBY",
            ActionType::RestartRfq => "RESTART_RFQ",
            ActionType::ChangeAward => "CHANGE_AWARD",
            ActionType::CreatePurchaseOrder => "CREATE_PURCHASE_ORDER",
            ActionType::RouteApproval => "ROUTE_APPROVAL",
            ActionType::RecordGoodsReceipt => "RECORD_GOODS_RECEIPT",
            ActionType::RecordInvoice => "RECORD_INVOICE",
            ActionType::RunMatch => "RUN_MATCH",
            ActionType::ManualResolution => "MANUAL_RESOLUTION",
            ActionType::RegisterUser => "REGISTER_USER",
            ActionType::UpdateConfig => "UPDATE_CONFIG",
        }
    }
}

// ==========================================
// EntityType - 审计实体类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Requisition,
    Criteria,
    Quotation,
    CommitteeScore,
    PurchaseOrder,
    GoodsReceipt,
    Invoice,
    Reconciliation,
    User,
    Config,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Requisition => "REQUISITION",
            EntityType::Criteria => "EVALUATION_CRITERIA",
            EntityType::Quotation => "QUOTATION",
            EntityType::CommitteeScore => "COMMITTEE_SCORE",
            EntityType::PurchaseOrder => "PURCHASE_ORDER",
            EntityType::GoodsReceipt => "GOODS_RECEIPT",
            EntityType::Invoice => "INVOICE",
            EntityType::Reconciliation => "RECONCILIATION",
            EntityType::User => "USER",
            EntityType::Config => "CONFIG",
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的审计日志
    pub fn new(
        action_type: ActionType,
        entity_type: EntityType,
        entity_id: &str,
        actor: &str,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            action_type: action_type.as_str().to_string(),
            entity_type: entity_type.as_str().to_string(),
            entity_id: entity_id.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作详情 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置描述
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
