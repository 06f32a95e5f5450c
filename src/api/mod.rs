// ==========================================
// 采购授标引擎 - API 层
// ==========================================
// 职责: 提供同步业务接口（事务、权限、审计、通知在此汇合）
// ==========================================

pub mod access;
pub mod approval_api;
pub mod award_api;
pub mod error;
pub mod reconciliation_api;
pub mod requisition_api;
pub mod scoring_api;

// 重导出核心类型
pub use access::{AccessPolicy, AllowAllPolicy, Permission};
pub use approval_api::{ApprovalApi, ApprovalRouting};
pub use award_api::{AwardApi, AwardOutcome, AwardReset, AwardResponse, DeclineResolution, ExpiryOutcome, RankedQuotation};
pub use error::{ApiError, ApiResult, ConflictKind, ErrorKind};
pub use reconciliation_api::{GrnLineInput, InvoiceLineInput, ReconciliationApi, ReconciliationReport};
pub use requisition_api::{CriterionInput, QuoteItemInput, RequisitionApi};
pub use scoring_api::ScoringApi;
