// ==========================================
// 采购授标引擎 - 审批路由领域模型
// ==========================================
// 金额档位: [min, max] 双端闭区间，max 为空表示无上限
// ==========================================

use crate::domain::types::RequisitionStatus;
use serde::{Deserialize, Serialize};

/// 档位去向
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierTarget {
    /// 委员会评审
    Committee { name: String },
    /// 指定角色审批（审批人按角色解析）
    Role { role: String },
}

/// 审批金额档位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTier {
    pub min: f64,
    pub max: Option<f64>,
    pub target: TierTarget,
}

impl ApprovalTier {
    /// 金额是否落在本档位（双端闭区间）
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }

    /// 与另一档位是否重叠
    pub fn overlaps(&self, other: &ApprovalTier) -> bool {
        let self_max = self.max.unwrap_or(f64::INFINITY);
        let other_max = other.max.unwrap_or(f64::INFINITY);
        self.min <= other_max && other.min <= self_max
    }
}

/// 路由结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub next_status: RequisitionStatus,
    pub next_approver_id: Option<String>,
    pub committee: Option<String>,
    pub total_award_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(min: f64, max: Option<f64>) -> ApprovalTier {
        ApprovalTier {
            min,
            max,
            target: TierTarget::Committee {
                name: "B".to_string(),
            },
        }
    }

    #[test]
    fn test_contains_is_inclusive() {
        let t = tier(10001.0, Some(200000.0));
        assert!(t.contains(10001.0));
        assert!(t.contains(200000.0));
        assert!(!t.contains(200001.0));
        assert!(!t.contains(10000.0));

        let open = tier(200001.0, None);
        assert!(open.contains(1e12));
    }

    #[test]
    fn test_overlaps() {
        assert!(!tier(10001.0, Some(200000.0)).overlaps(&tier(200001.0, None)));
        assert!(tier(10001.0, Some(200000.0)).overlaps(&tier(200000.0, None)));
        assert!(tier(0.0, None).overlaps(&tier(5.0, Some(6.0))));
    }

    #[test]
    fn test_tier_target_json_shape() {
        let json = serde_json::to_value(TierTarget::Role {
            role: "PROCUREMENT_MANAGER".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "ROLE");
        assert_eq!(json["role"], "PROCUREMENT_MANAGER");
    }
}
