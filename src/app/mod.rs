// ==========================================
// 采购授标引擎 - 应用层
// ==========================================
// 职责: 装配数据库、仓储与 API，供宿主应用持有
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
