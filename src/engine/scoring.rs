// ==========================================
// 采购授标引擎 - 评分引擎
// ==========================================
// 职责: 原始评分 → 明细加权分 → 评委得分 → 报价综合得分
// 红线: 引擎不拼 SQL；综合得分每次从全量评分集重算，不做增量维护
// ==========================================
// 明细加权分 = Σ 原始分 × (细则权重/100) × (分类权重/100)
// 评委得分   = Σ 明细加权分 / 报价明细数（不按数量加权）
// 综合得分   = 各评委得分均值
// ==========================================

use crate::domain::criteria::EvaluationCriteria;
use crate::domain::quotation::Quotation;
use crate::domain::score::{CriterionScore, ItemScoreInput};
use std::collections::HashSet;
use thiserror::Error;

/// 默认评分上限
pub const DEFAULT_SCORE_SCALE_MAX: f64 = 100.0;

/// 评分提交校验失败（字段级）
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {message}")]
pub struct ScoringViolation {
    pub field: String,
    pub message: String,
}

impl ScoringViolation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ==========================================
// ScoringEngine - 评分引擎
// ==========================================
pub struct ScoringEngine {
    scale_max: f64,
}

impl ScoringEngine {
    pub fn new(scale_max: f64) -> Self {
        Self { scale_max }
    }

    pub fn scale_max(&self) -> f64 {
        self.scale_max
    }

    /// 校验评分提交
    ///
    /// - 明细必须属于该报价，且不可重复
    /// - 细则必须属于该申购单的评标标准，同一明细内不可重复
    /// - 原始分必须在 [0, scale_max] 内
    pub fn validate_submission(
        &self,
        criteria: &EvaluationCriteria,
        quotation: &Quotation,
        inputs: &[ItemScoreInput],
    ) -> Result<(), ScoringViolation> {
        let mut seen_items = HashSet::new();

        for (i, input) in inputs.iter().enumerate() {
            if !quotation.has_item(&input.item_id) {
                return Err(ScoringViolation::new(
                    format!("item_scores[{}].item_id", i),
                    format!("明细{}不属于报价{}", input.item_id, quotation.quotation_id),
                ));
            }
            if !seen_items.insert(input.item_id.as_str()) {
                return Err(ScoringViolation::new(
                    format!("item_scores[{}].item_id", i),
                    format!("明细{}重复评分", input.item_id),
                ));
            }

            let mut seen_criteria = HashSet::new();
            for (j, cs) in input.criterion_scores.iter().enumerate() {
                let field = format!("item_scores[{}].criterion_scores[{}]", i, j);
                if criteria.find(&cs.criterion_id).is_none() {
                    return Err(ScoringViolation::new(
                        field,
                        format!("细则{}不属于该申购单的评标标准", cs.criterion_id),
                    ));
                }
                if !seen_criteria.insert(cs.criterion_id.as_str()) {
                    return Err(ScoringViolation::new(
                        field,
                        format!("细则{}重复评分", cs.criterion_id),
                    ));
                }
                if !cs.score.is_finite() || cs.score < 0.0 || cs.score > self.scale_max {
                    return Err(ScoringViolation::new(
                        field,
                        format!("评分{}超出范围[0, {}]", cs.score, self.scale_max),
                    ));
                }
            }
        }

        Ok(())
    }

    /// 明细加权分
    ///
    /// 未知细则计 0 分（提交前已校验，这里只做防御性跳过）。
    pub fn weighted_item_score(
        &self,
        criteria: &EvaluationCriteria,
        scores: &[CriterionScore],
    ) -> f64 {
        scores
            .iter()
            .filter_map(|cs| {
                criteria.find(&cs.criterion_id).map(|c| {
                    let category_weight = criteria.category_weight(c.category);
                    cs.score * (c.weight / 100.0) * (category_weight / 100.0)
                })
            })
            .sum()
    }

    /// 评委得分 = 明细加权分之和 / 报价明细总数
    ///
    /// 报价无明细时为 0。
    pub fn scorer_final_score(&self, item_scores: &[f64], item_count: usize) -> f64 {
        if item_count == 0 {
            return 0.0;
        }
        item_scores.iter().sum::<f64>() / item_count as f64
    }

    /// 报价综合得分 = 各评委得分均值
    ///
    /// 无评委时为 0。
    pub fn aggregate(&self, scorer_scores: &[f64]) -> f64 {
        if scorer_scores.is_empty() {
            return 0.0;
        }
        scorer_scores.iter().sum::<f64>() / scorer_scores.len() as f64
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE_SCALE_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::Criterion;
    use crate::domain::quotation::QuoteItem;
    use crate::domain::types::{CriterionCategory, QuotationStatus};

    fn criteria() -> EvaluationCriteria {
        EvaluationCriteria::new(
            "EC1".to_string(),
            "PR1".to_string(),
            40.0,
            60.0,
            vec![
                Criterion {
                    criterion_id: "PRICE".to_string(),
                    category: CriterionCategory::Financial,
                    name: "价格".to_string(),
                    weight: 100.0,
                    position: 0,
                },
                Criterion {
                    criterion_id: "QUALITY".to_string(),
                    category: CriterionCategory::Technical,
                    name: "质量".to_string(),
                    weight: 50.0,
                    position: 1,
                },
                Criterion {
                    criterion_id: "DELIVERY".to_string(),
                    category: CriterionCategory::Technical,
                    name: "交付".to_string(),
                    weight: 50.0,
                    position: 2,
                },
            ],
            chrono::Utc::now().naive_utc(),
        )
        .unwrap()
    }

    fn quotation(item_ids: &[&str]) -> Quotation {
        Quotation {
            quotation_id: "Q1".to_string(),
            requisition_id: "PR1".to_string(),
            vendor_id: "V1".to_string(),
            status: QuotationStatus::Submitted,
            rank: None,
            final_average_score: 0.0,
            submitted_at: chrono::Utc::now().naive_utc(),
            items: item_ids
                .iter()
                .enumerate()
                .map(|(i, id)| QuoteItem {
                    item_id: id.to_string(),
                    quotation_id: "Q1".to_string(),
                    item_name: id.to_string(),
                    quantity: 100,
                    unit_price: 1.0,
                    lead_time_days: 5,
                    position: i as i32,
                    awarded: false,
                })
                .collect(),
        }
    }

    fn cs(id: &str, score: f64) -> CriterionScore {
        CriterionScore {
            criterion_id: id.to_string(),
            score,
        }
    }

    #[test]
    fn test_weighted_item_score() {
        let engine = ScoringEngine::default();
        // 80*1.0*0.4 + 90*0.5*0.6 + 70*0.5*0.6 = 32 + 27 + 21 = 80
        let score = engine.weighted_item_score(
            &criteria(),
            &[cs("PRICE", 80.0), cs("QUALITY", 90.0), cs("DELIVERY", 70.0)],
        );
        assert!((score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_marks_yield_scale_max() {
        let engine = ScoringEngine::default();
        let score = engine.weighted_item_score(
            &criteria(),
            &[cs("PRICE", 100.0), cs("QUALITY", 100.0), cs("DELIVERY", 100.0)],
        );
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_scorer_final_score_counts_every_item_once() {
        let engine = ScoringEngine::default();
        // 两个明细，只评了一个：(80 + 0) / 2
        assert_eq!(engine.scorer_final_score(&[80.0], 2), 40.0);
        assert_eq!(engine.scorer_final_score(&[80.0, 60.0], 2), 70.0);
    }

    #[test]
    fn test_zero_items_and_zero_scorers_guarded() {
        let engine = ScoringEngine::default();
        assert_eq!(engine.scorer_final_score(&[], 0), 0.0);
        assert_eq!(engine.aggregate(&[]), 0.0);
        assert_eq!(engine.aggregate(&[70.0, 90.0]), 80.0);
    }

    #[test]
    fn test_validate_rejects_foreign_item() {
        let engine = ScoringEngine::default();
        let err = engine
            .validate_submission(
                &criteria(),
                &quotation(&["I1"]),
                &[ItemScoreInput {
                    item_id: "I9".to_string(),
                    criterion_scores: vec![cs("PRICE", 50.0)],
                }],
            )
            .unwrap_err();
        assert_eq!(err.field, "item_scores[0].item_id");
    }

    #[test]
    fn test_validate_rejects_unknown_criterion_and_out_of_range() {
        let engine = ScoringEngine::default();
        let q = quotation(&["I1"]);

        let err = engine
            .validate_submission(
                &criteria(),
                &q,
                &[ItemScoreInput {
                    item_id: "I1".to_string(),
                    criterion_scores: vec![cs("COLOR", 50.0)],
                }],
            )
            .unwrap_err();
        assert_eq!(err.field, "item_scores[0].criterion_scores[0]");

        let err = engine
            .validate_submission(
                &criteria(),
                &q,
                &[ItemScoreInput {
                    item_id: "I1".to_string(),
                    criterion_scores: vec![cs("PRICE", 50.0), cs("QUALITY", 101.0)],
                }],
            )
            .unwrap_err();
        assert_eq!(err.field, "item_scores[0].criterion_scores[1]");
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let engine = ScoringEngine::default();
        let q = quotation(&["I1"]);
        let input = ItemScoreInput {
            item_id: "I1".to_string(),
            criterion_scores: vec![cs("PRICE", 50.0)],
        };

        assert!(engine
            .validate_submission(&criteria(), &q, &[input.clone(), input])
            .is_err());

        let dup_criterion = ItemScoreInput {
            item_id: "I1".to_string(),
            criterion_scores: vec![cs("PRICE", 50.0), cs("PRICE", 60.0)],
        };
        assert!(engine
            .validate_submission(&criteria(), &q, &[dup_criterion])
            .is_err());
    }
}
