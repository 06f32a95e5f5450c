// ==========================================
// 采购授标引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_in_tx(conn, ..)` 在调用方事务内执行；实例方法自行取连接
// ==========================================

pub mod action_log_repo;
pub(crate) mod codec;
pub mod criteria_repo;
pub mod error;
pub mod purchase_order_repo;
pub mod quotation_repo;
pub mod reconciliation_repo;
pub mod requisition_repo;
pub mod score_repo;
pub mod transaction;
pub mod user_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use criteria_repo::CriteriaRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use purchase_order_repo::PurchaseOrderRepository;
pub use quotation_repo::QuotationRepository;
pub use reconciliation_repo::ReconciliationRepository;
pub use requisition_repo::RequisitionRepository;
pub use score_repo::ScoreRepository;
pub use transaction::{TransactionRunner, TxBudget};
pub use user_repo::UserRepository;
