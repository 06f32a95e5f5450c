// ==========================================
// 采购授标引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 评标评分、授标决策、审批路由、三方对账
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计（SQL 计数/慢查询）
pub mod perf;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AwardAction, CriterionCategory, MatchStatus, QuotationStatus, RequisitionStatus};

// 领域实体
pub use domain::{
    ActionLog, ActionType, CommitteeScoreSet, EvaluationCriteria, MatchingResult, PurchaseOrder,
    PurchaseRequisition, Quotation, RoutingDecision,
};

// 引擎
pub use engine::{AwardRanker, RoutingTable, ScoringEngine, ThreeWayMatcher};

// API
pub use api::{ApiError, ApiResult, ApprovalApi, AwardApi, ReconciliationApi, RequisitionApi, ScoringApi};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "采购授标引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
