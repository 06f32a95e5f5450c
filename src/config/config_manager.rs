// ==========================================
// 采购授标引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id='global', key, value)
// 红线: 写入前校验；审批档位重叠在此拒绝；每次写入追加审计行
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::approval::ApprovalTier;
use crate::engine::routing::RoutingTable;
use crate::engine::scoring::DEFAULT_SCORE_SCALE_MAX;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::transaction::{
    TransactionRunner, TxBudget, DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_EXECUTE_BUDGET_MS,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 默认经理角色
pub const DEFAULT_MANAGER_ROLE: &str = "PROCUREMENT_MANAGER";
/// 默认授标响应天数
pub const DEFAULT_AWARD_RESPONSE_DAYS: i64 = 7;
/// 授标响应天数上限
pub const MAX_AWARD_RESPONSE_DAYS: i64 = 3650;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ProcurementSettings - 类型化配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementSettings {
    pub routing_tiers: Vec<ApprovalTier>,
    pub manager_role: String,
    pub score_scale_max: f64,
    pub award_response_days: i64,
    pub tx_acquire_timeout_ms: u64,
    pub tx_execute_budget_ms: u64,
}

impl Default for ProcurementSettings {
    fn default() -> Self {
        Self {
            routing_tiers: Vec::new(),
            manager_role: DEFAULT_MANAGER_ROLE.to_string(),
            score_scale_max: DEFAULT_SCORE_SCALE_MAX,
            award_response_days: DEFAULT_AWARD_RESPONSE_DAYS,
            tx_acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            tx_execute_budget_ms: DEFAULT_EXECUTE_BUDGET_MS,
        }
    }
}

impl ProcurementSettings {
    /// 运行时档位表（已存储配置不再重复校验重叠）
    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::from_stored(self.routing_tiers.clone())
    }

    pub fn tx_budget(&self) -> TxBudget {
        TxBudget::from_millis(self.tx_acquire_timeout_ms, self.tx_execute_budget_ms)
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    tx: TransactionRunner,
}

impl ConfigManager {
    pub fn new(conn: Arc<Mutex<Connection>>, tx: TransactionRunner) -> Self {
        Self { conn, tx }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 读取
    // ==========================================

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        Self::get_config_value_in_tx(&conn, key)
    }

    pub fn get_config_value_in_tx(conn: &Connection, key: &str) -> RepositoryResult<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取全部类型化配置
    pub fn settings(&self) -> RepositoryResult<ProcurementSettings> {
        let conn = self.get_conn()?;
        Self::load_settings_in_tx(&conn)
    }

    /// 在调用方事务内读取全部类型化配置
    ///
    /// 数值项格式错误时记 warn 并回落默认值；审批档位格式错误直接报错。
    pub fn load_settings_in_tx(conn: &Connection) -> RepositoryResult<ProcurementSettings> {
        let defaults = ProcurementSettings::default();

        let routing_tiers = match Self::get_config_value_in_tx(conn, config_keys::ROUTING_TIERS)? {
            Some(raw) => serde_json::from_str::<Vec<ApprovalTier>>(&raw).map_err(|e| {
                RepositoryError::FieldValueError {
                    field: config_keys::ROUTING_TIERS.to_string(),
                    message: e.to_string(),
                }
            })?,
            None => defaults.routing_tiers,
        };

        let manager_role = Self::get_config_value_in_tx(conn, config_keys::MANAGER_ROLE)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.manager_role);

        Ok(ProcurementSettings {
            routing_tiers,
            manager_role,
            score_scale_max: Self::parsed_or_default(
                conn,
                config_keys::SCORE_SCALE_MAX,
                defaults.score_scale_max,
            )?,
            award_response_days: Self::response_days_in_tx(conn, defaults.award_response_days)?,
            tx_acquire_timeout_ms: Self::parsed_or_default(
                conn,
                config_keys::TX_ACQUIRE_TIMEOUT_MS,
                defaults.tx_acquire_timeout_ms,
            )?,
            tx_execute_budget_ms: Self::parsed_or_default(
                conn,
                config_keys::TX_EXECUTE_BUDGET_MS,
                defaults.tx_execute_budget_ms,
            )?,
        })
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let config_map = stmt
            .query_map(params![GLOBAL_SCOPE], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

        Ok(serde_json::to_string(&config_map)?)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 写入单个配置项（校验 + 审计）
    pub fn set_config_value(&self, key: &str, value: &str, actor: &str) -> RepositoryResult<()> {
        Self::validate_value(key, value)?;

        self.tx.run("config_update", |conn| {
            Self::upsert_in_tx(conn, key, value)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::UpdateConfig, EntityType::Config, key, actor)
                    .with_payload(&serde_json::json!({ "key": key, "value": value })),
            )?;
            Ok::<(), RepositoryError>(())
        })?;

        tracing::info!(key, actor, "配置已更新");
        self.refresh_tx_budget(key)?;
        Ok(())
    }

    /// 写入审批档位（拒绝重叠/无效区间）
    pub fn set_routing_tiers(&self, tiers: Vec<ApprovalTier>, actor: &str) -> RepositoryResult<()> {
        let table = RoutingTable::validated(tiers).map_err(|e| RepositoryError::FieldValueError {
            field: config_keys::ROUTING_TIERS.to_string(),
            message: e.to_string(),
        })?;
        let raw = serde_json::to_string(table.tiers())?;
        self.set_config_value(config_keys::ROUTING_TIERS, &raw, actor)
    }

    /// 从配置快照恢复（逐项校验，整体一个事务）
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str, actor: &str) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;
        for (key, value) in &config_map {
            Self::validate_value(key, value)?;
        }

        let count = self.tx.run("config_restore", |conn| {
            for (key, value) in &config_map {
                Self::upsert_in_tx(conn, key, value)?;
            }
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::UpdateConfig, EntityType::Config, "snapshot", actor)
                    .with_detail(format!("恢复{}项配置", config_map.len())),
            )?;
            Ok::<usize, RepositoryError>(config_map.len())
        })?;

        self.refresh_tx_budget(config_keys::TX_ACQUIRE_TIMEOUT_MS)?;
        Ok(count)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn upsert_in_tx(conn: &Connection, key: &str, value: &str) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    fn refresh_tx_budget(&self, key: &str) -> RepositoryResult<()> {
        if key == config_keys::TX_ACQUIRE_TIMEOUT_MS || key == config_keys::TX_EXECUTE_BUDGET_MS {
            let settings = self.settings()?;
            self.tx.set_budget(settings.tx_budget());
        }
        Ok(())
    }

    /// 响应天数；越界的存量值（绕过校验写入）回落默认值
    fn response_days_in_tx(conn: &Connection, default: i64) -> RepositoryResult<i64> {
        let days = Self::parsed_or_default(conn, config_keys::AWARD_RESPONSE_DAYS, default)?;
        if (0..=MAX_AWARD_RESPONSE_DAYS).contains(&days) {
            return Ok(days);
        }
        tracing::warn!(
            config_key = config_keys::AWARD_RESPONSE_DAYS,
            value = days,
            default,
            "授标响应天数越界，使用默认值"
        );
        Ok(default)
    }

    fn parsed_or_default<T>(conn: &Connection, key: &str, default: T) -> RepositoryResult<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Display,
    {
        let raw = match Self::get_config_value_in_tx(conn, key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, default = %default, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    fn invalid(key: &str, message: impl Into<String>) -> RepositoryError {
        RepositoryError::FieldValueError {
            field: key.to_string(),
            message: message.into(),
        }
    }

    /// 已知配置项的取值校验（未知键原样保存）
    fn validate_value(key: &str, value: &str) -> RepositoryResult<()> {
        let v = value.trim();
        match key {
            config_keys::ROUTING_TIERS => {
                let tiers: Vec<ApprovalTier> =
                    serde_json::from_str(v).map_err(|e| Self::invalid(key, e.to_string()))?;
                RoutingTable::validated(tiers).map_err(|e| Self::invalid(key, e.to_string()))?;
            }
            config_keys::MANAGER_ROLE => {
                if v.is_empty() {
                    return Err(Self::invalid(key, "角色不能为空"));
                }
            }
            config_keys::SCORE_SCALE_MAX => match v.parse::<f64>() {
                Ok(n) if n.is_finite() && n > 0.0 => {}
                _ => return Err(Self::invalid(key, "必须为正数")),
            },
            config_keys::AWARD_RESPONSE_DAYS => match v.parse::<i64>() {
                Ok(n) if (0..=MAX_AWARD_RESPONSE_DAYS).contains(&n) => {}
                _ => {
                    return Err(Self::invalid(
                        key,
                        format!("必须为0到{}之间的整数", MAX_AWARD_RESPONSE_DAYS),
                    ))
                }
            },
            config_keys::TX_ACQUIRE_TIMEOUT_MS | config_keys::TX_EXECUTE_BUDGET_MS => {
                match v.parse::<u64>() {
                    Ok(n) if n > 0 => {}
                    _ => return Err(Self::invalid(key, "必须为正整数（毫秒）")),
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 审批路由
    pub const ROUTING_TIERS: &str = "approval.routing_tiers"; // JSON 数组
    pub const MANAGER_ROLE: &str = "approval.manager_role";

    // 评分
    pub const SCORE_SCALE_MAX: &str = "score.scale_max";

    // 授标
    pub const AWARD_RESPONSE_DAYS: &str = "award.response_days";

    // 事务
    pub const TX_ACQUIRE_TIMEOUT_MS: &str = "tx.acquire_timeout_ms";
    pub const TX_EXECUTE_BUDGET_MS: &str = "tx.execute_budget_ms";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::approval::TierTarget;

    fn manager() -> ConfigManager {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        let tx = TransactionRunner::new(conn.clone(), TxBudget::default());
        ConfigManager::new(conn, tx)
    }

    fn tier(min: f64, max: Option<f64>, name: &str) -> ApprovalTier {
        ApprovalTier {
            min,
            max,
            target: TierTarget::Committee {
                name: name.to_string(),
            },
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = manager().settings().unwrap();
        assert_eq!(settings, ProcurementSettings::default());
        assert_eq!(settings.manager_role, "PROCUREMENT_MANAGER");
        assert_eq!(settings.award_response_days, 7);
    }

    #[test]
    fn test_set_routing_tiers_rejects_overlap() {
        let cm = manager();
        let err = cm
            .set_routing_tiers(
                vec![tier(0.0, Some(100.0), "A"), tier(100.0, None, "B")],
                "admin",
            )
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { ref field, .. } if field == config_keys::ROUTING_TIERS));
        assert!(cm.get_global_config_value(config_keys::ROUTING_TIERS).unwrap().is_none());
    }

    #[test]
    fn test_set_routing_tiers_persists_sorted_and_audits() {
        let cm = manager();
        cm.set_routing_tiers(
            vec![tier(200001.0, None, "A"), tier(10001.0, Some(200000.0), "B")],
            "admin",
        )
        .unwrap();

        let settings = cm.settings().unwrap();
        assert_eq!(settings.routing_tiers[0].min, 10001.0);

        let audit_rows: i64 = cm
            .get_conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM action_log WHERE action_type = 'UPDATE_CONFIG'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(audit_rows, 1);
    }

    #[test]
    fn test_invalid_numeric_values_rejected() {
        let cm = manager();
        assert!(cm.set_config_value(config_keys::SCORE_SCALE_MAX, "-5", "admin").is_err());
        assert!(cm.set_config_value(config_keys::AWARD_RESPONSE_DAYS, "abc", "admin").is_err());
        assert!(cm
            .set_config_value(config_keys::AWARD_RESPONSE_DAYS, "1000000000", "admin")
            .is_err());
        assert!(cm.set_config_value(config_keys::AWARD_RESPONSE_DAYS, "-1", "admin").is_err());
        cm.set_config_value(config_keys::AWARD_RESPONSE_DAYS, "3650", "admin").unwrap();
        assert_eq!(cm.settings().unwrap().award_response_days, 3650);
        cm.set_config_value(config_keys::SCORE_SCALE_MAX, "10", "admin").unwrap();
        assert_eq!(cm.settings().unwrap().score_scale_max, 10.0);
    }

    #[test]
    fn test_out_of_range_stored_response_days_falls_back() {
        let cm = manager();
        ConfigManager::upsert_in_tx(&cm.get_conn().unwrap(), config_keys::AWARD_RESPONSE_DAYS, "1000000000")
            .unwrap();
        assert_eq!(cm.settings().unwrap().award_response_days, DEFAULT_AWARD_RESPONSE_DAYS);
    }

    #[test]
    fn test_tx_budget_refreshed_on_update() {
        let cm = manager();
        cm.set_config_value(config_keys::TX_ACQUIRE_TIMEOUT_MS, "2500", "admin").unwrap();
        assert_eq!(cm.tx.budget().acquire_timeout.as_millis(), 2500);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let cm = manager();
        cm.set_config_value(config_keys::MANAGER_ROLE, "CFO", "admin").unwrap();
        let snapshot = cm.get_config_snapshot().unwrap();

        let other = manager();
        assert_eq!(other.restore_config_from_snapshot(&snapshot, "admin").unwrap(), 1);
        assert_eq!(other.settings().unwrap().manager_role, "CFO");
    }
}
