// ==========================================
// 采购授标引擎 - 配置层
// ==========================================
// 职责: 系统配置管理（审批档位、评分上限、授标响应期、事务预算）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ProcurementSettings};
