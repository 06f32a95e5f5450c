// ==========================================
// 采购授标引擎 - 应用状态
// ==========================================
// 职责: 打开数据库、装配仓储与 API 实例（共享同一连接）
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{
    AccessPolicy, AllowAllPolicy, ApprovalApi, AwardApi, ReconciliationApi, RequisitionApi,
    ScoringApi,
};
use crate::config::config_manager::ConfigManager;
use crate::engine::events::OptionalNotifier;
use crate::repository::{
    ActionLogRepository, CriteriaRepository, PurchaseOrderRepository, QuotationRepository,
    ReconciliationRepository, RequisitionRepository, ScoreRepository, TransactionRunner, TxBudget,
    UserRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub requisition_api: Arc<RequisitionApi>,
    pub scoring_api: Arc<ScoringApi>,
    pub award_api: Arc<AwardApi>,
    pub approval_api: Arc<ApprovalApi>,
    pub reconciliation_api: Arc<ReconciliationApi>,

    /// 配置管理器（审批档位、评分上限、事务预算）
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 事务执行器（与各 API 共享预算）
    pub tx: TransactionRunner,
}

impl AppState {
    /// 创建新的AppState实例（放行所有操作，不发送通知）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_dependencies(db_path, OptionalNotifier::none(), Arc::new(AllowAllPolicy))
    }

    /// 使用宿主提供的通知器与访问策略创建 AppState
    pub fn with_dependencies(
        db_path: String,
        notifier: OptionalNotifier,
        access: Arc<dyn AccessPolicy>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::initialize_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;
        crate::perf::install_sqlite_tracing(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 事务执行器 + 配置
        // ==========================================
        let tx = TransactionRunner::new(conn.clone(), TxBudget::default());
        let config_manager = Arc::new(ConfigManager::new(conn.clone(), tx.clone()));
        let settings = config_manager
            .settings()
            .map_err(|e| format!("无法加载配置: {}", e))?;
        tx.set_budget(settings.tx_budget());

        // ==========================================
        // Repository层
        // ==========================================
        let requisition_repo = Arc::new(RequisitionRepository::new(conn.clone()));
        let criteria_repo = Arc::new(CriteriaRepository::new(conn.clone()));
        let quotation_repo = Arc::new(QuotationRepository::new(conn.clone()));
        let score_repo = Arc::new(ScoreRepository::new(conn.clone()));
        let purchase_order_repo = Arc::new(PurchaseOrderRepository::new(conn.clone()));
        let reconciliation_repo = Arc::new(ReconciliationRepository::new(conn.clone()));
        let user_repo = Arc::new(UserRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let notifier = Arc::new(notifier);
        if notifier.is_configured() {
            tracing::info!("已配置外部通知器");
        }

        // ==========================================
        // API层
        // ==========================================
        let requisition_api = Arc::new(RequisitionApi::new(
            tx.clone(),
            requisition_repo,
            criteria_repo,
            quotation_repo,
            user_repo,
            action_log_repo.clone(),
            access.clone(),
        ));
        let scoring_api = Arc::new(ScoringApi::new(tx.clone(), score_repo, access.clone()));
        let award_api = Arc::new(AwardApi::new(tx.clone(), notifier.clone(), access.clone()));
        let approval_api = Arc::new(ApprovalApi::new(tx.clone(), notifier.clone(), access.clone()));
        let reconciliation_api = Arc::new(ReconciliationApi::new(
            tx.clone(),
            purchase_order_repo,
            reconciliation_repo,
            notifier,
            access,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            requisition_api,
            scoring_api,
            award_api,
            approval_api,
            reconciliation_api,
            config_manager,
            action_log_repo,
            tx,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 PROCUREMENT_DB_PATH，其次为系统数据目录。
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("PROCUREMENT_DB_PATH") {
        if !path.trim().is_empty() {
            return path;
        }
    }

    let mut path = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    path.push("procurement-engine");
    if let Err(e) = std::fs::create_dir_all(&path) {
        tracing::warn!("无法创建数据目录 {}: {}", path.display(), e);
    }
    path.push("procurement.db");
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_initializes_schema() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert_eq!(state.tx.budget(), TxBudget::default());
        assert!(state.action_log_repo.find_recent(10).unwrap().is_empty());
    }
}
