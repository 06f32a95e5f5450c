// ==========================================
// 采购授标引擎 - 授标排名引擎
// ==========================================
// 职责: 报价排名、中标/备选/落选判定、拒标递补判定
// 输入: 某申购单下全部报价
// 输出: 排名分配 / 递补决策（不落库）
// ==========================================
// 排序键:
// 1) final_average_score 降序
// 2) submitted_at 升序（同分先提交者优先，属约定规则）
// 3) quotation_id 升序（保证完全确定）
// ==========================================

use crate::domain::quotation::Quotation;
use crate::domain::types::QuotationStatus;
use std::cmp::Ordering;

/// 中标名次
pub const AWARDED_RANK: i32 = 1;
/// 最末备选名次
pub const LAST_STANDBY_RANK: i32 = 3;

/// 单个报价的排名分配
#[derive(Debug, Clone, PartialEq)]
pub struct RankAssignment {
    pub quotation_id: String,
    pub vendor_id: String,
    pub score: f64,
    pub status: QuotationStatus,
    pub rank: Option<i32>,
}

/// 授标前置冲突
#[derive(Debug, Clone, PartialEq)]
pub enum AwardConflict {
    /// 已有报价处于中标/备选
    InProgress { quotation_id: String, status: QuotationStatus },
    /// 已有报价被供应商接受
    AlreadyAccepted { quotation_id: String },
}

/// 拒标/超期后的处理决策
#[derive(Debug, Clone, PartialEq)]
pub enum DeclineOutcome {
    /// 递补下一名备选
    Promote { quotation_id: String, vendor_id: String, rank: i32 },
    /// 无备选，重新询价
    RestartRfq,
}

// ==========================================
// AwardRanker - 授标排名引擎
// ==========================================
pub struct AwardRanker {
    // 无状态引擎
}

impl AwardRanker {
    pub fn new() -> Self {
        Self {}
    }

    /// 授标前置检查（在任何写入之前执行）
    pub fn check_can_award(&self, quotations: &[Quotation]) -> Result<(), AwardConflict> {
        if let Some(q) = quotations
            .iter()
            .find(|q| q.status == QuotationStatus::Accepted)
        {
            return Err(AwardConflict::AlreadyAccepted {
                quotation_id: q.quotation_id.clone(),
            });
        }

        if let Some(q) = quotations.iter().find(|q| q.status.is_award_active()) {
            return Err(AwardConflict::InProgress {
                quotation_id: q.quotation_id.clone(),
                status: q.status,
            });
        }

        Ok(())
    }

    /// 排名并分配状态
    ///
    /// 第1名 → Awarded(1)，第2/3名 → Standby(2/3)，其余 → Rejected(无名次)
    pub fn rank(&self, quotations: &[Quotation]) -> Vec<RankAssignment> {
        let mut ordered: Vec<&Quotation> = quotations.iter().collect();
        ordered.sort_by(|a, b| self.compare(a, b));

        ordered
            .into_iter()
            .enumerate()
            .map(|(index, q)| {
                let position = index as i32 + 1;
                let (status, rank) = if position == AWARDED_RANK {
                    (QuotationStatus::Awarded, Some(position))
                } else if position <= LAST_STANDBY_RANK {
                    (QuotationStatus::Standby, Some(position))
                } else {
                    (QuotationStatus::Rejected, None)
                };

                RankAssignment {
                    quotation_id: q.quotation_id.clone(),
                    vendor_id: q.vendor_id.clone(),
                    score: q.final_average_score,
                    status,
                    rank,
                }
            })
            .collect()
    }

    /// 拒标/超期后的处理：仅递补下一名（rank+1），不做多级级联
    pub fn decline_outcome(&self, quotations: &[Quotation], declined_rank: Option<i32>) -> DeclineOutcome {
        let next_rank = match declined_rank {
            Some(r) => r + 1,
            None => return DeclineOutcome::RestartRfq,
        };

        quotations
            .iter()
            .find(|q| q.rank == Some(next_rank) && q.status == QuotationStatus::Standby)
            .map(|q| DeclineOutcome::Promote {
                quotation_id: q.quotation_id.clone(),
                vendor_id: q.vendor_id.clone(),
                rank: next_rank,
            })
            .unwrap_or(DeclineOutcome::RestartRfq)
    }

    /// 比较两个报价（排名在前者为 Less）
    fn compare(&self, a: &Quotation, b: &Quotation) -> Ordering {
        b.final_average_score
            .partial_cmp(&a.final_average_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.quotation_id.cmp(&b.quotation_id))
    }
}

impl Default for AwardRanker {
    fn default() -> Self {
        Self::new()
    }
}
