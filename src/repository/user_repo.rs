// ==========================================
// 采购授标引擎 - 用户仓储
// ==========================================
// 用途: 审批人按角色解析
// ==========================================

use crate::domain::requisition::AppUser;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或更新用户
    pub fn upsert_in_tx(conn: &Connection, user: &AppUser) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO app_user (user_id, display_name, role, is_active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role,
                is_active = excluded.is_active
            "#,
            params![user.user_id, user.display_name, user.role, user.is_active],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, user_id: &str) -> RepositoryResult<Option<AppUser>> {
        let conn = self.get_conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, display_name, role, is_active FROM app_user WHERE user_id = ?1",
                params![user_id],
                Self::map_row,
            )
            .optional()?;
        Ok(user)
    }

    /// 按角色取第一个启用用户（user_id 升序，结果确定）
    pub fn find_first_active_by_role_in_tx(
        conn: &Connection,
        role: &str,
    ) -> RepositoryResult<Option<AppUser>> {
        let user = conn
            .query_row(
                r#"
                SELECT user_id, display_name, role, is_active
                FROM app_user
                WHERE role = ?1 AND is_active = 1
                ORDER BY user_id ASC
                LIMIT 1
                "#,
                params![role],
                Self::map_row,
            )
            .optional()?;
        Ok(user)
    }

    fn map_row(row: &Row) -> rusqlite::Result<AppUser> {
        Ok(AppUser {
            user_id: row.get(0)?,
            display_name: row.get(1)?,
            role: row.get(2)?,
            is_active: row.get(3)?,
        })
    }
}
