// ==========================================
// 采购授标引擎 - 审计日志数据仓储
// ==========================================
// 红线: 所有业务写入必须在同一事务内追加审计行
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
