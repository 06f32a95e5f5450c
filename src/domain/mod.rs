// ==========================================
// 采购授标引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则不变量
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod approval;
pub mod criteria;
pub mod purchase_order;
pub mod quotation;
pub mod reconciliation;
pub mod requisition;
pub mod score;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType, EntityType};
pub use approval::{ApprovalTier, RoutingDecision, TierTarget};
pub use criteria::{CriteriaError, Criterion, EvaluationCriteria};
pub use purchase_order::{GoodsReceiptNote, GrnItem, Invoice, InvoiceItem, PoItem, PurchaseOrder};
pub use quotation::{QuoteItem, Quotation};
pub use reconciliation::{
    ItemMatch, ManualResolution, MatchTotals, MatchingResult, ReconciliationRecord,
};
pub use requisition::{AppUser, PurchaseRequisition};
pub use score::{CommitteeScoreSet, CriterionScore, ItemScore, ItemScoreInput, ScoreSubmission};
pub use types::{AwardAction, CriterionCategory, MatchStatus, QuotationStatus, RequisitionStatus};
