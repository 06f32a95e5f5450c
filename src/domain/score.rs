// ==========================================
// 采购授标引擎 - 评标委员会评分领域模型
// ==========================================
// 红线: (quotation_id, scorer_id) 唯一
// 重复提交覆盖旧评分，不产生重复记录
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单条细则原始评分（评分提交输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion_id: String,
    pub score: f64,
}

/// 单个报价明细的评分输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemScoreInput {
    pub item_id: String,
    pub criterion_scores: Vec<CriterionScore>,
}

// ==========================================
// ItemScore - 明细评分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemScore {
    pub item_score_id: String,
    pub score_id: String,
    pub item_id: String,
    pub raw_scores: BTreeMap<String, f64>, // criterion_id → 原始分
    pub final_score: f64,                  // 加权分
}

// ==========================================
// CommitteeScoreSet - 评委评分集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitteeScoreSet {
    pub score_id: String,
    pub quotation_id: String,
    pub scorer_id: String,
    pub final_score: f64, // 明细评分均值
    pub comment: Option<String>,
    pub submitted_at: NaiveDateTime,
    pub item_scores: Vec<ItemScore>,
}

/// 评分提交结果：评分集 + 重算后的报价综合得分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub score_set: CommitteeScoreSet,
    pub quotation_final_average_score: f64,
    pub scorer_count: usize,
}
