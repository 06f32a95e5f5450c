// ==========================================
// 采购授标引擎 - 引擎层事件通知
// ==========================================
// 职责: 定义采购事件通知 trait（邮件/消息投递由外部实现）
// 红线: 通知只在事务提交后发出；通知失败只记 warn，不回滚
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 采购事件类型
// ==========================================

/// 采购事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcurementEvent {
    /// 授标完成，通知中标供应商
    AwardFinalized {
        requisition_id: String,
        quotation_id: String,
        vendor_id: String,
    },
    /// 备选递补为中标
    StandbyPromoted {
        requisition_id: String,
        quotation_id: String,
        vendor_id: String,
    },
    /// 重新询价
    RfqRestarted { requisition_id: String },
    /// 供应商接受，订单已生成
    PurchaseOrderCreated {
        requisition_id: String,
        po_id: String,
        po_number: String,
        vendor_id: String,
    },
    /// 进入审批
    ApprovalRequested {
        requisition_id: String,
        approver_id: Option<String>,
        committee: Option<String>,
    },
    /// 三方匹配不符
    ReconciliationMismatch { po_id: String },
}

impl ProcurementEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementEvent::AwardFinalized { .. } => "AwardFinalized",
            ProcurementEvent::StandbyPromoted { .. } => "StandbyPromoted",
            ProcurementEvent::RfqRestarted { .. } => "RfqRestarted",
            ProcurementEvent::PurchaseOrderCreated { .. } => "PurchaseOrderCreated",
            ProcurementEvent::ApprovalRequested { .. } => "ApprovalRequested",
            ProcurementEvent::ReconciliationMismatch { .. } => "ReconciliationMismatch",
        }
    }
}

// ==========================================
// 通知 Trait
// ==========================================

/// 事件通知者 Trait
///
/// 由宿主应用实现（邮件、站内信等），引擎只负责在提交后调用。
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &ProcurementEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作通知者
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, event: &ProcurementEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!("NoOpNotifier: 跳过事件通知 - event={}", event.as_str());
        Ok(())
    }
}

/// 可选的通知者包装
pub struct OptionalNotifier {
    inner: Option<Arc<dyn Notifier>>,
}

impl OptionalNotifier {
    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Some(notifier),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 派发事件（提交后调用）；失败只记录日志
    pub fn dispatch(&self, events: &[ProcurementEvent]) {
        let notifier = match &self.inner {
            Some(n) => n,
            None => {
                tracing::debug!("OptionalNotifier: 未配置通知者，跳过{}个事件", events.len());
                return;
            }
        };

        for event in events {
            if let Err(e) = notifier.notify(event) {
                tracing::warn!(
                    event = event.as_str(),
                    error = %e,
                    "事件通知失败（已提交的事务不回滚）"
                );
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalNotifier {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingNotifier {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: &ProcurementEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().push(event.as_str().to_string());
            if self.fail {
                return Err("mailbox unavailable".into());
            }
            Ok(())
        }
    }

    fn restart() -> ProcurementEvent {
        ProcurementEvent::RfqRestarted {
            requisition_id: "PR1".to_string(),
        }
    }

    #[test]
    fn test_optional_notifier_none() {
        let notifier = OptionalNotifier::none();
        assert!(!notifier.is_configured());
        notifier.dispatch(&[restart()]);
    }

    #[test]
    fn test_failures_do_not_stop_dispatch() {
        let inner = Arc::new(RecordingNotifier {
            seen: Mutex::new(vec![]),
            fail: true,
        });
        let notifier = OptionalNotifier::with_notifier(inner.clone());
        notifier.dispatch(&[
            restart(),
            ProcurementEvent::ReconciliationMismatch {
                po_id: "PO1".to_string(),
            },
        ]);

        assert_eq!(
            *inner.seen.lock().unwrap(),
            vec!["RfqRestarted".to_string(), "ReconciliationMismatch".to_string()]
        );
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(restart()).unwrap();
        assert_eq!(json["event"], "RFQ_RESTARTED");
        assert_eq!(json["requisition_id"], "PR1");
    }
}
