// ==========================================
// 采购授标引擎 - 评标标准领域模型
// ==========================================
// 红线: financial_weight + technical_weight == 100
// 红线: 同一分类内各细则权重之和 == 100
// 构造时校验，违反即拒绝
// ==========================================

use crate::domain::types::CriterionCategory;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 权重求和比较容差（百分比浮点累加误差）
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// 评标标准校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("商务权重与技术权重之和必须为100: financial={financial}, technical={technical}")]
    CategoryWeightSum { financial: f64, technical: f64 },

    #[error("{category:?} 类细则权重之和必须为100: 实际={sum}")]
    CriterionWeightSum { category: CriterionCategory, sum: f64 },

    #[error("权重必须为非负有限数: {name}={weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("细则名称不能为空")]
    EmptyName,
}

impl CriteriaError {
    /// 出错字段（用于字段级校验提示）
    pub fn field(&self) -> &'static str {
        match self {
            CriteriaError::CategoryWeightSum { .. } => "financial_weight",
            CriteriaError::CriterionWeightSum { .. } => "criteria.weight",
            CriteriaError::InvalidWeight { .. } => "weight",
            CriteriaError::EmptyName => "criteria.name",
        }
    }
}

// ==========================================
// Criterion - 评标细则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub criterion_id: String,
    pub category: CriterionCategory,
    pub name: String,
    pub weight: f64, // 分类内权重（百分比）
    pub position: i32,
}

// ==========================================
// EvaluationCriteria - 评标标准
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    pub criteria_id: String,
    pub requisition_id: String,
    pub financial_weight: f64,
    pub technical_weight: f64,
    pub criteria: Vec<Criterion>,
    pub created_at: NaiveDateTime,
}

impl EvaluationCriteria {
    /// 构造并校验评标标准
    ///
    /// 某一分类权重为 0 时允许该分类没有细则；否则该分类细则权重之和必须为 100。
    pub fn new(
        criteria_id: String,
        requisition_id: String,
        financial_weight: f64,
        technical_weight: f64,
        criteria: Vec<Criterion>,
        created_at: NaiveDateTime,
    ) -> Result<Self, CriteriaError> {
        let built = Self {
            criteria_id,
            requisition_id,
            financial_weight,
            technical_weight,
            criteria,
            created_at,
        };
        built.validate()?;
        Ok(built)
    }

    /// 校验权重不变量
    pub fn validate(&self) -> Result<(), CriteriaError> {
        for (name, w) in [
            ("financial_weight", self.financial_weight),
            ("technical_weight", self.technical_weight),
        ] {
            if !valid_weight(w) {
                return Err(CriteriaError::InvalidWeight {
                    name: name.to_string(),
                    weight: w,
                });
            }
        }

        if !sums_to_hundred(self.financial_weight + self.technical_weight) {
            return Err(CriteriaError::CategoryWeightSum {
                financial: self.financial_weight,
                technical: self.technical_weight,
            });
        }

        for c in &self.criteria {
            if c.name.trim().is_empty() {
                return Err(CriteriaError::EmptyName);
            }
            if !valid_weight(c.weight) {
                return Err(CriteriaError::InvalidWeight {
                    name: c.name.clone(),
                    weight: c.weight,
                });
            }
        }

        for category in [CriterionCategory::Financial, CriterionCategory::Technical] {
            let members: Vec<&Criterion> = self
                .criteria
                .iter()
                .filter(|c| c.category == category)
                .collect();

            if members.is_empty() && self.category_weight(category) == 0.0 {
                continue;
            }

            let sum: f64 = members.iter().map(|c| c.weight).sum();
            if !sums_to_hundred(sum) {
                return Err(CriteriaError::CriterionWeightSum { category, sum });
            }
        }

        Ok(())
    }

    /// 分类权重（百分比）
    pub fn category_weight(&self, category: CriterionCategory) -> f64 {
        match category {
            CriterionCategory::Financial => self.financial_weight,
            CriterionCategory::Technical => self.technical_weight,
        }
    }

    /// 按ID查找细则
    pub fn find(&self, criterion_id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.criterion_id == criterion_id)
    }
}

fn valid_weight(w: f64) -> bool {
    w.is_finite() && w >= 0.0
}

// NaN 比较恒为 false，写成“在容差内”的肯定式
fn sums_to_hundred(sum: f64) -> bool {
    (sum - 100.0).abs() <= WEIGHT_EPSILON
}
