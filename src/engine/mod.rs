// ==========================================
// 采购授标引擎 - 引擎层
// ==========================================
// 职责: 实现评分/授标/审批路由/三方匹配规则,不拼 SQL
// 红线: Engine 不拼 SQL, 不持有连接
// ==========================================

pub mod award;
pub mod events;
pub mod reconciliation;
pub mod routing;
pub mod scoring;

// 重导出核心引擎
pub use award::{AwardConflict, AwardRanker, DeclineOutcome, RankAssignment};
pub use events::{NoOpNotifier, Notifier, OptionalNotifier, ProcurementEvent};
pub use reconciliation::ThreeWayMatcher;
pub use routing::{RouteTarget, RoutingError, RoutingTable};
pub use scoring::{ScoringEngine, ScoringViolation, DEFAULT_SCORE_SCALE_MAX};
