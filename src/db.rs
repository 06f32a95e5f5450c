// ==========================================
// 采购授标引擎 - SQLite 连接与 Schema 初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建库脚本，保证测试与运行时 schema 一致
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒），与事务获取等待上限对齐
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 10_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并初始化 schema（单元测试使用）
pub fn open_in_memory_with_schema() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化 schema（幂等）
///
/// 已存在的表不会被改动；首次建库时写入 schema_version。
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS app_user (
    user_id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_app_user_role ON app_user(role, is_active);

CREATE TABLE IF NOT EXISTS purchase_requisition (
    requisition_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    requested_by TEXT NOT NULL,
    total_price REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    current_approver_id TEXT,
    current_committee TEXT,
    award_response_deadline TEXT,
    purchase_order_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluation_criteria (
    criteria_id TEXT PRIMARY KEY,
    requisition_id TEXT NOT NULL UNIQUE
        REFERENCES purchase_requisition(requisition_id) ON DELETE CASCADE,
    financial_weight REAL NOT NULL,
    technical_weight REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluation_criterion (
    criterion_id TEXT PRIMARY KEY,
    criteria_id TEXT NOT NULL REFERENCES evaluation_criteria(criteria_id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    name TEXT NOT NULL,
    weight REAL NOT NULL,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS quotation (
    quotation_id TEXT PRIMARY KEY,
    requisition_id TEXT NOT NULL
        REFERENCES purchase_requisition(requisition_id) ON DELETE CASCADE,
    vendor_id TEXT NOT NULL,
    status TEXT NOT NULL,
    rank INTEGER,
    final_average_score REAL NOT NULL DEFAULT 0,
    submitted_at TEXT NOT NULL,
    UNIQUE (requisition_id, vendor_id)
);
CREATE INDEX IF NOT EXISTS idx_quotation_requisition ON quotation(requisition_id, rank);

CREATE TABLE IF NOT EXISTS quote_item (
    item_id TEXT PRIMARY KEY,
    quotation_id TEXT NOT NULL REFERENCES quotation(quotation_id) ON DELETE CASCADE,
    item_name TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    lead_time_days INTEGER NOT NULL,
    position INTEGER NOT NULL,
    awarded INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS committee_score (
    score_id TEXT PRIMARY KEY,
    quotation_id TEXT NOT NULL REFERENCES quotation(quotation_id) ON DELETE CASCADE,
    scorer_id TEXT NOT NULL,
    final_score REAL NOT NULL,
    comment TEXT,
    submitted_at TEXT NOT NULL,
    UNIQUE (quotation_id, scorer_id)
);

CREATE TABLE IF NOT EXISTS item_score (
    item_score_id TEXT PRIMARY KEY,
    score_id TEXT NOT NULL REFERENCES committee_score(score_id) ON DELETE CASCADE,
    item_id TEXT NOT NULL REFERENCES quote_item(item_id) ON DELETE CASCADE,
    raw_scores_json TEXT NOT NULL,
    final_score REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS purchase_order (
    po_id TEXT PRIMARY KEY,
    po_number TEXT NOT NULL UNIQUE,
    requisition_id TEXT NOT NULL,
    quotation_id TEXT UNIQUE,
    vendor_id TEXT NOT NULL,
    total_amount REAL NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS po_item (
    po_item_id TEXT PRIMARY KEY,
    po_id TEXT NOT NULL REFERENCES purchase_order(po_id) ON DELETE CASCADE,
    item_name TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS goods_receipt_note (
    grn_id TEXT PRIMARY KEY,
    po_id TEXT NOT NULL REFERENCES purchase_order(po_id) ON DELETE CASCADE,
    received_by TEXT NOT NULL,
    received_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS grn_item (
    grn_item_id TEXT PRIMARY KEY,
    grn_id TEXT NOT NULL REFERENCES goods_receipt_note(grn_id) ON DELETE CASCADE,
    po_item_id TEXT NOT NULL REFERENCES po_item(po_item_id),
    quantity_received INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS invoice (
    invoice_id TEXT PRIMARY KEY,
    po_id TEXT NOT NULL REFERENCES purchase_order(po_id) ON DELETE CASCADE,
    invoice_number TEXT NOT NULL,
    submitted_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoice_item (
    invoice_item_id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL REFERENCES invoice(invoice_id) ON DELETE CASCADE,
    item_name TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS reconciliation (
    po_id TEXT PRIMARY KEY REFERENCES purchase_order(po_id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    quantity_match INTEGER NOT NULL,
    price_match INTEGER NOT NULL,
    checked_at TEXT NOT NULL,
    resolved_by TEXT,
    resolution_note TEXT,
    resolved_at TEXT
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    action_type TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_action_log_entity ON action_log(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_schema_is_idempotent() {
        let conn = open_in_memory_with_schema().unwrap();
        initialize_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent_before_init() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
