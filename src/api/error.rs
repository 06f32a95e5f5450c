// ==========================================
// 采购授标引擎 - API层错误类型
// ==========================================
// 职责: 定义调用方可见的错误分类，转换 Repository 错误
// 红线: 内部错误对外只暴露 correlation_id，完整原因写日志
// ==========================================

use crate::domain::criteria::CriteriaError;
use crate::engine::routing::RoutingError;
use crate::engine::scoring::ScoringViolation;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 状态冲突细分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// 已有中标/备选报价，授标进行中
    AwardInProgress,
    /// 该报价已生成采购订单
    DuplicatePurchaseOrder,
    /// 状态机不允许的转换
    InvalidStateTransition,
    /// 报价已不在可评分状态
    ScoringClosed,
    /// 唯一性冲突（重复记录）
    DuplicateRecord,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::AwardInProgress => "AWARD_IN_PROGRESS",
            ConflictKind::DuplicatePurchaseOrder => "DUPLICATE_PURCHASE_ORDER",
            ConflictKind::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ConflictKind::ScoringClosed => "SCORING_CLOSED",
            ConflictKind::DuplicateRecord => "DUPLICATE_RECORD",
        };
        write!(f, "{}", s)
    }
}

/// 错误分类（供调用方分支处理）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    StateConflict,
    NotFound,
    MissingCriteria,
    NoQuotesFound,
    NoApproverForRole,
    AmbiguousTier,
    UnroutableValue,
    AccessDenied,
    TransactionTimeout,
    Internal,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("参数校验失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("状态冲突[{kind}]: {message}")]
    StateConflict { kind: ConflictKind, message: String },

    #[error("资源未找到: {entity}(id={id})")]
    NotFound { entity: String, id: String },

    #[error("申购单{requisition_id}尚未定义评标标准")]
    MissingCriteria { requisition_id: String },

    #[error("申购单{requisition_id}没有任何报价")]
    NoQuotesFound { requisition_id: String },

    #[error("角色{role}没有可用的审批人")]
    NoApproverForRole { role: String },

    #[error("授标金额{value}命中多个审批档位")]
    AmbiguousTier { value: f64 },

    #[error("授标金额{value}未命中任何审批档位")]
    UnroutableValue { value: f64 },

    #[error("无权执行操作: actor={actor}, action={action}")]
    AccessDenied { actor: String, action: String },

    #[error("事务超时（可重试）: {0}")]
    TransactionTimeout(String),

    #[error("内部错误 (correlation_id={correlation_id})")]
    Internal { correlation_id: String },
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        ApiError::StateConflict {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 构造内部错误：生成 correlation_id 并记录完整原因
    pub fn internal(detail: impl fmt::Display) -> Self {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::error!(correlation_id = %correlation_id, detail = %detail, "内部错误");
        ApiError::Internal { correlation_id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::StateConflict { .. } => ErrorKind::StateConflict,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::MissingCriteria { .. } => ErrorKind::MissingCriteria,
            ApiError::NoQuotesFound { .. } => ErrorKind::NoQuotesFound,
            ApiError::NoApproverForRole { .. } => ErrorKind::NoApproverForRole,
            ApiError::AmbiguousTier { .. } => ErrorKind::AmbiguousTier,
            ApiError::UnroutableValue { .. } => ErrorKind::UnroutableValue,
            ApiError::AccessDenied { .. } => ErrorKind::AccessDenied,
            ApiError::TransactionTimeout(_) => ErrorKind::TransactionTimeout,
            ApiError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// 调用方是否可以原样重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::TransactionTimeout(_))
    }

    /// 面向终端用户的提示（内部错误使用本地化模板）
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Internal { correlation_id } => crate::i18n::t_with_args(
                "error.internal",
                &[("correlation_id", correlation_id.as_str())],
            ),
            other => other.to_string(),
        }
    }

    /// 状态冲突细分（非状态冲突返回 None）
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            ApiError::StateConflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::TransactionTimeout { phase, budget_ms } => {
                ApiError::TransactionTimeout(format!("phase={}, budget_ms={}", phase, budget_ms))
            }
            RepositoryError::DatabaseBusy(msg) => ApiError::TransactionTimeout(msg),

            RepositoryError::NotFound { entity, id } => ApiError::NotFound { entity, id },

            RepositoryError::UniqueConstraintViolation(msg) => {
                if msg.contains("purchase_order.quotation_id") {
                    ApiError::conflict(ConflictKind::DuplicatePurchaseOrder, msg)
                } else {
                    ApiError::conflict(ConflictKind::DuplicateRecord, msg)
                }
            }
            RepositoryError::ForeignKeyViolation(msg) => ApiError::validation("reference", msg),

            RepositoryError::ValidationError(msg) => ApiError::validation("request", msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Validation { field, message }
            }

            other => ApiError::internal(other),
        }
    }
}

impl From<CriteriaError> for ApiError {
    fn from(err: CriteriaError) -> Self {
        ApiError::validation(err.field(), err.to_string())
    }
}

impl From<ScoringViolation> for ApiError {
    fn from(err: ScoringViolation) -> Self {
        ApiError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::AmbiguousTier { value, .. } => ApiError::AmbiguousTier { value },
            RoutingError::UnroutableValue(value) => ApiError::UnroutableValue { value },
            RoutingError::InvalidValue(value) => {
                ApiError::validation("total_award_value", format!("金额无效: {}", value))
            }
            other => ApiError::validation("approval.routing_tiers", other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
