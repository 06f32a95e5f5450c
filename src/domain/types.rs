// ==========================================
// 采购授标引擎 - 领域类型定义
// ==========================================
// 红线: 状态为封闭枚举，状态转换必须经过守卫函数
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 报价状态 (Quotation Status)
// ==========================================
// Submitted → {Awarded | Standby | Rejected} → {Accepted | Declined | Failed}
// Standby → Awarded (递补)
// * → Submitted (重新询价，Accepted 除外)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Submitted, // 已提交
    Awarded,   // 中标
    Standby,   // 备选
    Rejected,  // 落选
    Accepted,  // 供应商已接受
    Declined,  // 供应商已拒绝
    Failed,    // 响应超期
}

impl QuotationStatus {
    /// 数据库存储字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            QuotationStatus::Submitted => "SUBMITTED",
            QuotationStatus::Awarded => "AWARDED",
            QuotationStatus::Standby => "STANDBY",
            QuotationStatus::Rejected => "REJECTED",
            QuotationStatus::Accepted => "ACCEPTED",
            QuotationStatus::Declined => "DECLINED",
            QuotationStatus::Failed => "FAILED",
        }
    }

    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "SUBMITTED" => Some(QuotationStatus::Submitted),
            "AWARDED" => Some(QuotationStatus::Awarded),
            "STANDBY" => Some(QuotationStatus::Standby),
            "REJECTED" => Some(QuotationStatus::Rejected),
            "ACCEPTED" => Some(QuotationStatus::Accepted),
            "DECLINED" => Some(QuotationStatus::Declined),
            "FAILED" => Some(QuotationStatus::Failed),
            _ => None,
        }
    }

    /// 授标进行中（已有中标或备选）
    pub fn is_award_active(&self) -> bool {
        matches!(self, QuotationStatus::Awarded | QuotationStatus::Standby)
    }

    /// 状态转换守卫
    ///
    /// 重新询价（→ Submitted）对除 Accepted 外的所有状态开放；
    /// Accepted 已生成采购订单，不可回退。
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        match (self, next) {
            (Accepted, _) => false,
            (_, Submitted) => true,
            (Submitted, Awarded) | (Submitted, Standby) | (Submitted, Rejected) => true,
            (Standby, Awarded) => true,
            (Awarded, Accepted) | (Awarded, Declined) | (Awarded, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 申购单状态 (Requisition Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequisitionStatus {
    Approved,               // 已审批，可询价
    PendingCommitteeReview, // 待委员会评审
    PendingManagerApproval, // 待经理审批
    PoCreated,              // 已生成采购订单
}

impl RequisitionStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequisitionStatus::Approved => "APPROVED",
            RequisitionStatus::PendingCommitteeReview => "PENDING_COMMITTEE_REVIEW",
            RequisitionStatus::PendingManagerApproval => "PENDING_MANAGER_APPROVAL",
            RequisitionStatus::PoCreated => "PO_CREATED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "APPROVED" => Some(RequisitionStatus::Approved),
            "PENDING_COMMITTEE_REVIEW" => Some(RequisitionStatus::PendingCommitteeReview),
            "PENDING_MANAGER_APPROVAL" => Some(RequisitionStatus::PendingManagerApproval),
            "PO_CREATED" => Some(RequisitionStatus::PoCreated),
            _ => None,
        }
    }
}

impl fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 供应商授标响应 (Award Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwardAction {
    Accept,
    Reject,
}

impl FromStr for AwardAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(AwardAction::Accept),
            "reject" => Ok(AwardAction::Reject),
            other => Err(format!("未知的授标响应: {}", other)),
        }
    }
}

// ==========================================
// 评标细则分类 (Criterion Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionCategory {
    Financial, // 商务
    Technical, // 技术
}

impl CriterionCategory {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CriterionCategory::Financial => "FINANCIAL",
            CriterionCategory::Technical => "TECHNICAL",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "FINANCIAL" => Some(CriterionCategory::Financial),
            "TECHNICAL" => Some(CriterionCategory::Technical),
            _ => None,
        }
    }
}

// ==========================================
// 对账状态 (Match Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,    // 待定（缺收货单或发票）
    Matched,    // 一致
    Mismatched, // 存在差异
    Resolved,   // 差异已人工处理
}

impl MatchStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "PENDING",
            MatchStatus::Matched => "MATCHED",
            MatchStatus::Mismatched => "MISMATCHED",
            MatchStatus::Resolved => "RESOLVED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(MatchStatus::Pending),
            "MATCHED" => Some(MatchStatus::Matched),
            "MISMATCHED" => Some(MatchStatus::Mismatched),
            "RESOLVED" => Some(MatchStatus::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
