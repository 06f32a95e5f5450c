// ==========================================
// 采购授标引擎 - 评标评分 API
// ==========================================
// 职责: 接收评委评分，计算加权分并重算报价综合得分
// 红线: 同一评委重复提交覆盖旧评分；综合得分在同一事务内由全部评分重算
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::access::{ensure_allowed, AccessPolicy, Permission};
use crate::api::error::{ApiError, ApiResult, ConflictKind};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::score::{CommitteeScoreSet, ItemScore, ItemScoreInput, ScoreSubmission};
use crate::domain::types::QuotationStatus;
use crate::engine::scoring::ScoringEngine;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::criteria_repo::CriteriaRepository;
use crate::repository::quotation_repo::QuotationRepository;
use crate::repository::score_repo::ScoreRepository;
use crate::repository::codec::now_millis;
use crate::repository::transaction::TransactionRunner;

// ==========================================
// ScoringApi - 评分 API
// ==========================================
pub struct ScoringApi {
    tx: TransactionRunner,
    score_repo: Arc<ScoreRepository>,
    access: Arc<dyn AccessPolicy>,
}

impl ScoringApi {
    pub fn new(tx: TransactionRunner, score_repo: Arc<ScoreRepository>, access: Arc<dyn AccessPolicy>) -> Self {
        Self {
            tx,
            score_repo,
            access,
        }
    }

    /// 提交评委评分
    ///
    /// # 参数
    /// - quotation_id: 报价ID
    /// - scorer_id: 评委ID
    /// - item_scores: 各明细的细则原始分
    /// - comment: 评语（可选）
    ///
    /// # 返回
    /// - Ok(ScoreSubmission): 评分集 + 重算后的综合得分
    /// - Err(MissingCriteria): 申购单尚未定义评标标准
    /// - Err(StateConflict/ScoringClosed): 报价已进入授标流程
    pub fn submit_scores(
        &self,
        quotation_id: &str,
        scorer_id: &str,
        item_scores: Vec<ItemScoreInput>,
        comment: Option<String>,
    ) -> ApiResult<ScoreSubmission> {
        if scorer_id.trim().is_empty() {
            return Err(ApiError::validation("scorer_id", "评委不能为空"));
        }
        if item_scores.is_empty() {
            return Err(ApiError::validation("item_scores", "至少需要一个明细评分"));
        }
        ensure_allowed(self.access.as_ref(), scorer_id, Permission::SubmitScores, quotation_id)?;

        let now = now_millis();
        let submission = self.tx.run("submit_scores", |conn| -> ApiResult<ScoreSubmission> {
            let quotation = QuotationRepository::get_in_tx(conn, quotation_id)?;
            if quotation.status != QuotationStatus::Submitted {
                return Err(ApiError::conflict(
                    ConflictKind::ScoringClosed,
                    format!("报价{}处于{}状态，评分已关闭", quotation_id, quotation.status),
                ));
            }

            let criteria = CriteriaRepository::find_by_requisition_in_tx(conn, &quotation.requisition_id)?
                .ok_or_else(|| ApiError::MissingCriteria {
                    requisition_id: quotation.requisition_id.clone(),
                })?;

            let settings = ConfigManager::load_settings_in_tx(conn)?;
            let engine = ScoringEngine::new(settings.score_scale_max);
            engine.validate_submission(&criteria, &quotation, &item_scores)?;

            // 覆盖提交沿用原 score_id
            let score_id = ScoreRepository::find_score_id_in_tx(conn, quotation_id, scorer_id)?
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let items: Vec<ItemScore> = item_scores
                .iter()
                .map(|input| ItemScore {
                    item_score_id: uuid::Uuid::new_v4().to_string(),
                    score_id: score_id.clone(),
                    item_id: input.item_id.clone(),
                    raw_scores: input
                        .criterion_scores
                        .iter()
                        .map(|cs| (cs.criterion_id.clone(), cs.score))
                        .collect::<BTreeMap<_, _>>(),
                    final_score: engine.weighted_item_score(&criteria, &input.criterion_scores),
                })
                .collect();

            let item_finals: Vec<f64> = items.iter().map(|i| i.final_score).collect();
            let score_set = CommitteeScoreSet {
                score_id,
                quotation_id: quotation_id.to_string(),
                scorer_id: scorer_id.to_string(),
                final_score: engine.scorer_final_score(&item_finals, quotation.items.len()),
                comment: comment.clone(),
                submitted_at: now,
                item_scores: items,
            };
            ScoreRepository::upsert_in_tx(conn, &score_set)?;

            let all_scores = ScoreRepository::list_final_scores_in_tx(conn, quotation_id)?;
            let average = engine.aggregate(&all_scores);
            QuotationRepository::update_score_in_tx(conn, quotation_id, average)?;

            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::SubmitScores, EntityType::Quotation, quotation_id, scorer_id)
                    .with_payload(&serde_json::json!({
                        "score_id": score_set.score_id,
                        "scorer_final_score": score_set.final_score,
                        "quotation_final_average_score": average,
                        "scorer_count": all_scores.len(),
                    })),
            )?;

            Ok(ScoreSubmission {
                score_set,
                quotation_final_average_score: average,
                scorer_count: all_scores.len(),
            })
        })?;

        tracing::info!(
            quotation_id,
            scorer_id,
            scorer_final_score = submission.score_set.final_score,
            average = submission.quotation_final_average_score,
            "评分已提交"
        );
        Ok(submission)
    }

    /// 查询某评委对某报价的评分集
    pub fn get_score_set(&self, quotation_id: &str, scorer_id: &str) -> ApiResult<CommitteeScoreSet> {
        self.score_repo
            .find_by_quotation_and_scorer(quotation_id, scorer_id)?
            .ok_or_else(|| ApiError::not_found("CommitteeScoreSet", &format!("{}/{}", quotation_id, scorer_id)))
    }
}
