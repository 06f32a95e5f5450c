// ==========================================
// 采购授标引擎 - 命令行入口
// ==========================================
// 打开（或创建）数据库并完成装配，输出当前配置快照
// ==========================================

use procurement_engine::app::{get_default_db_path, AppState};

fn main() -> anyhow::Result<()> {
    procurement_engine::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", procurement_engine::APP_NAME, procurement_engine::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;
    let snapshot = state.config_manager.get_config_snapshot()?;
    tracing::info!(config = %snapshot, "AppState初始化成功");

    Ok(())
}
