// ==========================================
// 采购授标引擎 - 评委评分仓储
// ==========================================
// 红线: (quotation_id, scorer_id) 唯一
// 重复提交: 沿用原 score_id，删除旧明细评分后重新插入
// ==========================================

use crate::domain::score::{CommitteeScoreSet, ItemScore};
use crate::repository::codec::{format_ts, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub struct ScoreRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScoreRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询已存在的评分集ID
    pub fn find_score_id_in_tx(
        conn: &Connection,
        quotation_id: &str,
        scorer_id: &str,
    ) -> RepositoryResult<Option<String>> {
        let id = conn
            .query_row(
                "SELECT score_id FROM committee_score WHERE quotation_id = ?1 AND scorer_id = ?2",
                params![quotation_id, scorer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// 写入评分集（按 (quotation, scorer) 覆盖）
    ///
    /// 调用方保证 `set.score_id` 与已存在记录一致（见 find_score_id_in_tx）。
    pub fn upsert_in_tx(conn: &Connection, set: &CommitteeScoreSet) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO committee_score (
                score_id, quotation_id, scorer_id, final_score, comment, submitted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(quotation_id, scorer_id) DO UPDATE SET
                final_score = excluded.final_score,
                comment = excluded.comment,
                submitted_at = excluded.submitted_at
            "#,
            params![
                set.score_id,
                set.quotation_id,
                set.scorer_id,
                set.final_score,
                set.comment,
                format_ts(&set.submitted_at),
            ],
        )?;

        conn.execute(
            "DELETE FROM item_score WHERE score_id = ?1",
            params![set.score_id],
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO item_score (item_score_id, score_id, item_id, raw_scores_json, final_score)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for item in &set.item_scores {
            stmt.execute(params![
                item.item_score_id,
                set.score_id,
                item.item_id,
                serde_json::to_string(&item.raw_scores)?,
                item.final_score,
            ])?;
        }

        Ok(())
    }

    /// 报价全部评委得分（综合得分重算输入）
    pub fn list_final_scores_in_tx(conn: &Connection, quotation_id: &str) -> RepositoryResult<Vec<f64>> {
        let mut stmt = conn.prepare(
            "SELECT final_score FROM committee_score WHERE quotation_id = ?1 ORDER BY scorer_id",
        )?;
        let scores = stmt
            .query_map(params![quotation_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<f64>>>()?;
        Ok(scores)
    }

    pub fn find_by_quotation_and_scorer(
        &self,
        quotation_id: &str,
        scorer_id: &str,
    ) -> RepositoryResult<Option<CommitteeScoreSet>> {
        let conn = self.get_conn()?;
        Self::find_by_quotation_and_scorer_in_tx(&conn, quotation_id, scorer_id)
    }

    pub fn find_by_quotation_and_scorer_in_tx(
        conn: &Connection,
        quotation_id: &str,
        scorer_id: &str,
    ) -> RepositoryResult<Option<CommitteeScoreSet>> {
        let header = conn
            .query_row(
                r#"
                SELECT score_id, quotation_id, scorer_id, final_score, comment, submitted_at
                FROM committee_score
                WHERE quotation_id = ?1 AND scorer_id = ?2
                "#,
                params![quotation_id, scorer_id],
                |row| {
                    let submitted_at: String = row.get(5)?;
                    Ok(CommitteeScoreSet {
                        score_id: row.get(0)?,
                        quotation_id: row.get(1)?,
                        scorer_id: row.get(2)?,
                        final_score: row.get(3)?,
                        comment: row.get(4)?,
                        submitted_at: parse_ts(5, &submitted_at)?,
                        item_scores: Vec::new(),
                    })
                },
            )
            .optional()?;

        let mut set = match header {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT s.item_score_id, s.score_id, s.item_id, s.raw_scores_json, s.final_score
            FROM item_score s
            JOIN quote_item i ON i.item_id = s.item_id
            WHERE s.score_id = ?1
            ORDER BY i.position ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![set.score_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (item_score_id, score_id, item_id, raw_json, final_score) in rows {
            let raw_scores: BTreeMap<String, f64> = serde_json::from_str(&raw_json)?;
            set.item_scores.push(ItemScore {
                item_score_id,
                score_id,
                item_id,
                raw_scores,
                final_score,
            });
        }

        Ok(Some(set))
    }

    /// 统计评分集数量（用于校验幂等覆盖）
    pub fn count_for_quotation(&self, quotation_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM committee_score WHERE quotation_id = ?1",
            params![quotation_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quotation::{QuoteItem, Quotation};
    use crate::domain::requisition::PurchaseRequisition;
    use crate::domain::types::QuotationStatus;
    use crate::repository::quotation_repo::QuotationRepository;
    use crate::repository::requisition_repo::RequisitionRepository;

    fn setup() -> Connection {
        let conn = crate::db::open_in_memory_with_schema().unwrap();
        let now = chrono::Utc::now().naive_utc();
        RequisitionRepository::insert_in_tx(
            &conn,
            &PurchaseRequisition::new("PR1".to_string(), "t".to_string(), "U1".to_string(), now),
        )
        .unwrap();
        QuotationRepository::insert_in_tx(
            &conn,
            &Quotation {
                quotation_id: "Q1".to_string(),
                requisition_id: "PR1".to_string(),
                vendor_id: "V1".to_string(),
                status: QuotationStatus::Submitted,
                rank: None,
                final_average_score: 0.0,
                submitted_at: now,
                items: vec![QuoteItem {
                    item_id: "I1".to_string(),
                    quotation_id: "Q1".to_string(),
                    item_name: "钢板".to_string(),
                    quantity: 1,
                    unit_price: 1.0,
                    lead_time_days: 1,
                    position: 0,
                    awarded: false,
                }],
            },
        )
        .unwrap();
        conn
    }

    fn score_set(score_id: &str, score: f64) -> CommitteeScoreSet {
        let mut raw = BTreeMap::new();
        raw.insert("PRICE".to_string(), score);
        CommitteeScoreSet {
            score_id: score_id.to_string(),
            quotation_id: "Q1".to_string(),
            scorer_id: "S1".to_string(),
            final_score: score,
            comment: Some("ok".to_string()),
            submitted_at: chrono::Utc::now().naive_utc(),
            item_scores: vec![ItemScore {
                item_score_id: format!("{}-I1", score_id),
                score_id: score_id.to_string(),
                item_id: "I1".to_string(),
                raw_scores: raw,
                final_score: score,
            }],
        }
    }

    #[test]
    fn test_resubmission_replaces_item_scores() {
        let conn = setup();
        ScoreRepository::upsert_in_tx(&conn, &score_set("SC1", 60.0)).unwrap();

        let existing = ScoreRepository::find_score_id_in_tx(&conn, "Q1", "S1").unwrap();
        assert_eq!(existing.as_deref(), Some("SC1"));

        let mut second = score_set("SC1", 90.0);
        second.item_scores[0].item_score_id = "SC1-I1-v2".to_string();
        ScoreRepository::upsert_in_tx(&conn, &second).unwrap();

        let loaded = ScoreRepository::find_by_quotation_and_scorer_in_tx(&conn, "Q1", "S1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.final_score, 90.0);
        assert_eq!(loaded.item_scores.len(), 1);
        assert_eq!(loaded.item_scores[0].item_score_id, "SC1-I1-v2");
        assert_eq!(loaded.item_scores[0].raw_scores["PRICE"], 90.0);

        let item_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM item_score", [], |r| r.get(0))
            .unwrap();
        assert_eq!(item_rows, 1);
        assert_eq!(ScoreRepository::list_final_scores_in_tx(&conn, "Q1").unwrap(), vec![90.0]);
    }
}
