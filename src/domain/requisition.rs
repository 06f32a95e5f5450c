// ==========================================
// 采购授标引擎 - 申购单领域模型
// ==========================================

use crate::domain::types::RequisitionStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// PurchaseRequisition - 申购单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequisition {
    pub requisition_id: String,
    pub title: String,
    pub requested_by: String,
    pub total_price: f64,
    pub status: RequisitionStatus,
    pub current_approver_id: Option<String>,
    pub current_committee: Option<String>,
    pub award_response_deadline: Option<NaiveDateTime>,
    pub purchase_order_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PurchaseRequisition {
    /// 新建申购单（已审批，可询价）
    pub fn new(requisition_id: String, title: String, requested_by: String, now: NaiveDateTime) -> Self {
        Self {
            requisition_id,
            title,
            requested_by,
            total_price: 0.0,
            status: RequisitionStatus::Approved,
            current_approver_id: None,
            current_committee: None,
            award_response_deadline: None,
            purchase_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 系统用户（审批人按角色解析）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub user_id: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
}
