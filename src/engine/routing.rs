// ==========================================
// 采购授标引擎 - 审批路由引擎
// ==========================================
// 职责: 按授标金额选择审批档位
// 红线: 档位重叠在配置时校验；运行时若仍命中多个档位，报错而不猜测
// ==========================================
// 规则:
// 1) 金额低于最低档位下限（或未配置档位）→ 经理角色直批
// 2) 恰好命中一个档位 → 该档位去向
// 3) 命中多个档位 → AmbiguousTier
// 4) 高于最低下限但未命中任何档位（档位间空档）→ UnroutableValue
// ==========================================

use crate::domain::approval::{ApprovalTier, TierTarget};
use thiserror::Error;

/// 路由错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("审批档位重叠: 档位{first}与档位{second}")]
    OverlappingTiers { first: usize, second: usize },

    #[error("审批档位{index}区间无效: min={min}, max={max:?}")]
    InvalidRange { index: usize, min: f64, max: Option<f64> },

    #[error("授标金额{value}命中{count}个审批档位")]
    AmbiguousTier { value: f64, count: usize },

    #[error("授标金额{0}未命中任何审批档位")]
    UnroutableValue(f64),

    #[error("授标金额无效: {0}")]
    InvalidValue(f64),
}

/// 路由去向
#[derive(Debug, Clone, PartialEq)]
pub enum RouteTarget {
    /// 命中档位
    Tier { index: usize, target: TierTarget },
    /// 低于最低档位，经理直批
    ManagerFallback,
}

// ==========================================
// RoutingTable - 审批档位表
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoutingTable {
    tiers: Vec<ApprovalTier>,
}

impl RoutingTable {
    /// 构造并校验档位表（配置写入时使用）
    pub fn validated(tiers: Vec<ApprovalTier>) -> Result<Self, RoutingError> {
        let table = Self::from_stored(tiers);

        for (index, tier) in table.tiers.iter().enumerate() {
            let bad_max = tier.max.map_or(false, |max| !max.is_finite() || max < tier.min);
            if !tier.min.is_finite() || tier.min < 0.0 || bad_max {
                return Err(RoutingError::InvalidRange {
                    index,
                    min: tier.min,
                    max: tier.max,
                });
            }
        }

        for (i, a) in table.tiers.iter().enumerate() {
            for (j, b) in table.tiers.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(RoutingError::OverlappingTiers { first: i, second: j });
                }
            }
        }

        Ok(table)
    }

    /// 从已存储配置构造（仅排序，不重复校验）
    pub fn from_stored(mut tiers: Vec<ApprovalTier>) -> Self {
        tiers.sort_by(|a, b| a.min.partial_cmp(&b.min).unwrap_or(std::cmp::Ordering::Equal));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[ApprovalTier] {
        &self.tiers
    }

    /// 按金额路由
    pub fn route(&self, value: f64) -> Result<RouteTarget, RoutingError> {
        if !value.is_finite() || value < 0.0 {
            return Err(RoutingError::InvalidValue(value));
        }

        let matches: Vec<(usize, &ApprovalTier)> = self
            .tiers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.contains(value))
            .collect();

        match matches.as_slice() {
            [(index, tier)] => Ok(RouteTarget::Tier {
                index: *index,
                target: tier.target.clone(),
            }),
            [] => {
                let lowest_min = self.tiers.first().map(|t| t.min);
                match lowest_min {
                    Some(min) if value >= min => Err(RoutingError::UnroutableValue(value)),
                    _ => Ok(RouteTarget::ManagerFallback),
                }
            }
            many => Err(RoutingError::AmbiguousTier {
                value,
                count: many.len(),
            }),
        }
    }
}
