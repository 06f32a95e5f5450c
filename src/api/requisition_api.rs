// ==========================================
// 采购授标引擎 - 申购单 API
// ==========================================
// 职责: 申购单创建、评标标准定义、供应商报价提交、用户登记、审计查询
// 红线: 每个写操作与审计行同事务提交
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::access::{ensure_allowed, AccessPolicy, Permission};
use crate::api::error::{ApiError, ApiResult, ConflictKind};
use crate::domain::action_log::{ActionLog, ActionType, EntityType};
use crate::domain::criteria::{Criterion, EvaluationCriteria};
use crate::domain::quotation::{QuoteItem, Quotation};
use crate::domain::requisition::{AppUser, PurchaseRequisition};
use crate::domain::types::{CriterionCategory, QuotationStatus, RequisitionStatus};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::criteria_repo::CriteriaRepository;
use crate::repository::quotation_repo::QuotationRepository;
use crate::repository::requisition_repo::RequisitionRepository;
use crate::repository::codec::now_millis;
use crate::repository::transaction::TransactionRunner;
use crate::repository::user_repo::UserRepository;

/// 评标细则输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionInput {
    pub category: CriterionCategory,
    pub name: String,
    pub weight: f64,
}

/// 报价明细输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteItemInput {
    pub item_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub lead_time_days: i64,
}

// ==========================================
// RequisitionApi - 申购单 API
// ==========================================
pub struct RequisitionApi {
    tx: TransactionRunner,
    requisition_repo: Arc<RequisitionRepository>,
    criteria_repo: Arc<CriteriaRepository>,
    quotation_repo: Arc<QuotationRepository>,
    user_repo: Arc<UserRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    access: Arc<dyn AccessPolicy>,
}

impl RequisitionApi {
    pub fn new(
        tx: TransactionRunner,
        requisition_repo: Arc<RequisitionRepository>,
        criteria_repo: Arc<CriteriaRepository>,
        quotation_repo: Arc<QuotationRepository>,
        user_repo: Arc<UserRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            tx,
            requisition_repo,
            criteria_repo,
            quotation_repo,
            user_repo,
            action_log_repo,
            access,
        }
    }

    // ==========================================
    // 申购单
    // ==========================================

    /// 创建申购单（已审批，可开始询价）
    pub fn create_requisition(&self, title: &str, requested_by: &str) -> ApiResult<PurchaseRequisition> {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title", "标题不能为空"));
        }
        if requested_by.trim().is_empty() {
            return Err(ApiError::validation("requested_by", "申请人不能为空"));
        }
        ensure_allowed(self.access.as_ref(), requested_by, Permission::ManageRequisition, "")?;

        let now = now_millis();
        let pr = PurchaseRequisition::new(
            uuid::Uuid::new_v4().to_string(),
            title.trim().to_string(),
            requested_by.to_string(),
            now,
        );

        self.tx.run("create_requisition", |conn| {
            RequisitionRepository::insert_in_tx(conn, &pr)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(
                    ActionType::CreateRequisition,
                    EntityType::Requisition,
                    &pr.requisition_id,
                    requested_by,
                )
                .with_detail(format!("创建申购单: {}", pr.title)),
            )?;
            Ok::<(), ApiError>(())
        })?;

        tracing::info!(requisition_id = %pr.requisition_id, "申购单已创建");
        Ok(pr)
    }

    pub fn get_requisition(&self, requisition_id: &str) -> ApiResult<PurchaseRequisition> {
        self.requisition_repo
            .find_by_id(requisition_id)?
            .ok_or_else(|| ApiError::not_found("PurchaseRequisition", requisition_id))
    }

    // ==========================================
    // 评标标准
    // ==========================================

    /// 定义（或整体替换）评标标准
    ///
    /// 授标进行中或已接受时不允许修改。
    pub fn define_criteria(
        &self,
        requisition_id: &str,
        financial_weight: f64,
        technical_weight: f64,
        inputs: Vec<CriterionInput>,
        actor: &str,
    ) -> ApiResult<EvaluationCriteria> {
        ensure_allowed(self.access.as_ref(), actor, Permission::ManageRequisition, requisition_id)?;

        let now = now_millis();
        let criteria_id = uuid::Uuid::new_v4().to_string();
        let criteria = EvaluationCriteria::new(
            criteria_id,
            requisition_id.to_string(),
            financial_weight,
            technical_weight,
            inputs
                .into_iter()
                .enumerate()
                .map(|(i, input)| Criterion {
                    criterion_id: uuid::Uuid::new_v4().to_string(),
                    category: input.category,
                    name: input.name.trim().to_string(),
                    weight: input.weight,
                    position: i as i32,
                })
                .collect(),
            now,
        )?;

        self.tx.run("define_criteria", |conn| -> ApiResult<()> {
            RequisitionRepository::get_in_tx(conn, requisition_id)?;

            let quotations = QuotationRepository::list_by_requisition_in_tx(conn, requisition_id)?;
            if let Some(q) = quotations
                .iter()
                .find(|q| q.status.is_award_active() || q.status == QuotationStatus::Accepted)
            {
                return Err(ApiError::conflict(
                    ConflictKind::AwardInProgress,
                    format!("报价{}处于{}状态，不能修改评标标准", q.quotation_id, q.status),
                ));
            }

            CriteriaRepository::replace_in_tx(conn, &criteria)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::DefineCriteria, EntityType::Criteria, requisition_id, actor)
                    .with_payload(&criteria),
            )?;
            Ok(())
        })?;

        tracing::info!(requisition_id, criteria_count = criteria.criteria.len(), "评标标准已定义");
        Ok(criteria)
    }

    pub fn get_criteria(&self, requisition_id: &str) -> ApiResult<EvaluationCriteria> {
        self.criteria_repo
            .find_by_requisition(requisition_id)?
            .ok_or_else(|| ApiError::MissingCriteria {
                requisition_id: requisition_id.to_string(),
            })
    }

    // ==========================================
    // 报价
    // ==========================================

    /// 供应商提交报价（每个供应商每个申购单一份）
    pub fn submit_quotation(
        &self,
        requisition_id: &str,
        vendor_id: &str,
        items: Vec<QuoteItemInput>,
    ) -> ApiResult<Quotation> {
        if vendor_id.trim().is_empty() {
            return Err(ApiError::validation("vendor_id", "供应商不能为空"));
        }
        Self::validate_quote_items(&items)?;
        ensure_allowed(self.access.as_ref(), vendor_id, Permission::SubmitQuotation, requisition_id)?;

        let quotation_id = uuid::Uuid::new_v4().to_string();
        let quotation = Quotation {
            quotation_id: quotation_id.clone(),
            requisition_id: requisition_id.to_string(),
            vendor_id: vendor_id.to_string(),
            status: QuotationStatus::Submitted,
            rank: None,
            final_average_score: 0.0,
            submitted_at: now_millis(),
            items: items
                .into_iter()
                .enumerate()
                .map(|(i, input)| QuoteItem {
                    item_id: uuid::Uuid::new_v4().to_string(),
                    quotation_id: quotation_id.clone(),
                    item_name: input.item_name.trim().to_string(),
                    quantity: input.quantity,
                    unit_price: input.unit_price,
                    lead_time_days: input.lead_time_days,
                    position: i as i32,
                    awarded: false,
                })
                .collect(),
        };

        self.tx.run("submit_quotation", |conn| -> ApiResult<()> {
            let pr = RequisitionRepository::get_in_tx(conn, requisition_id)?;
            if pr.status != RequisitionStatus::Approved {
                return Err(ApiError::conflict(
                    ConflictKind::InvalidStateTransition,
                    format!("申购单处于{}状态，不接受报价", pr.status),
                ));
            }

            QuotationRepository::insert_in_tx(conn, &quotation)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(
                    ActionType::SubmitQuotation,
                    EntityType::Quotation,
                    &quotation.quotation_id,
                    vendor_id,
                )
                .with_payload(&serde_json::json!({
                    "requisition_id": requisition_id,
                    "total_price": quotation.total_price(),
                    "item_count": quotation.items.len(),
                })),
            )?;
            Ok(())
        })?;

        tracing::info!(requisition_id, vendor_id, quotation_id = %quotation.quotation_id, "报价已提交");
        Ok(quotation)
    }

    pub fn get_quotation(&self, quotation_id: &str) -> ApiResult<Quotation> {
        self.quotation_repo
            .find_by_id(quotation_id)?
            .ok_or_else(|| ApiError::not_found("Quotation", quotation_id))
    }

    pub fn list_quotations(&self, requisition_id: &str) -> ApiResult<Vec<Quotation>> {
        Ok(self.quotation_repo.list_by_requisition(requisition_id)?)
    }

    // ==========================================
    // 用户与审计
    // ==========================================

    /// 登记用户（审批人按角色解析）
    pub fn register_user(&self, user: AppUser, actor: &str) -> ApiResult<AppUser> {
        if user.user_id.trim().is_empty() {
            return Err(ApiError::validation("user_id", "用户ID不能为空"));
        }
        if user.role.trim().is_empty() {
            return Err(ApiError::validation("role", "角色不能为空"));
        }
        ensure_allowed(self.access.as_ref(), actor, Permission::ManageUsers, &user.user_id)?;

        self.tx.run("register_user", |conn| {
            UserRepository::upsert_in_tx(conn, &user)?;
            ActionLogRepository::insert_in_tx(
                conn,
                &ActionLog::new(ActionType::RegisterUser, EntityType::User, &user.user_id, actor)
                    .with_payload(&user),
            )?;
            Ok::<(), ApiError>(())
        })?;

        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> ApiResult<AppUser> {
        self.user_repo
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::not_found("AppUser", user_id))
    }

    /// 按实体查询审计记录
    pub fn list_audit_trail(&self, entity_type: EntityType, entity_id: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self
            .action_log_repo
            .find_by_entity(entity_type.as_str(), entity_id)?)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn validate_quote_items(items: &[QuoteItemInput]) -> ApiResult<()> {
        if items.is_empty() {
            return Err(ApiError::validation("items", "报价至少包含一个明细"));
        }
        for (i, item) in items.iter().enumerate() {
            if item.item_name.trim().is_empty() {
                return Err(ApiError::validation(format!("items[{}].item_name", i), "物料名称不能为空"));
            }
            if item.quantity <= 0 {
                return Err(ApiError::validation(format!("items[{}].quantity", i), "数量必须大于0"));
            }
            if !item.unit_price.is_finite() || item.unit_price < 0.0 {
                return Err(ApiError::validation(format!("items[{}].unit_price", i), "单价无效"));
            }
            if item.lead_time_days < 0 {
                return Err(ApiError::validation(format!("items[{}].lead_time_days", i), "交货周期不能为负数"));
            }
        }
        Ok(())
    }
}
