// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库 + AppState 装配、测试数据生成
// ==========================================

#![allow(dead_code)]

use procurement_engine::api::{CriterionInput, QuoteItemInput};
use procurement_engine::app::AppState;
use procurement_engine::domain::{
    AppUser, ApprovalTier, CriterionScore, EvaluationCriteria, ItemScoreInput, PurchaseRequisition,
    Quotation, TierTarget,
};
use procurement_engine::domain::types::CriterionCategory;
use std::error::Error;
use tempfile::NamedTempFile;

pub const OFFICER: &str = "officer-01";
pub const MANAGER_ROLE: &str = "PROCUREMENT_MANAGER";
pub const MANAGER_ID: &str = "MGR-001";

/// 创建临时测试数据库并装配 AppState
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - AppState: 应用状态
pub fn create_test_state() -> Result<(NamedTempFile, AppState), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let state = AppState::new(db_path)?;
    Ok((temp_file, state))
}

/// 登记默认经理
pub fn register_manager(state: &AppState) {
    state
        .requisition_api
        .register_user(
            AppUser {
                user_id: MANAGER_ID.to_string(),
                display_name: "采购经理".to_string(),
                role: MANAGER_ROLE.to_string(),
                is_active: true,
            },
            OFFICER,
        )
        .unwrap();
}

/// 配置两档委员会: [10001, 200000] → CommitteeB，[200001, ∞) → CommitteeA
pub fn configure_committee_tiers(state: &AppState) {
    state
        .config_manager
        .set_routing_tiers(
            vec![
                ApprovalTier {
                    min: 10001.0,
                    max: Some(200000.0),
                    target: TierTarget::Committee {
                        name: "CommitteeB".to_string(),
                    },
                },
                ApprovalTier {
                    min: 200001.0,
                    max: None,
                    target: TierTarget::Committee {
                        name: "CommitteeA".to_string(),
                    },
                },
            ],
            OFFICER,
        )
        .unwrap();
}

/// 创建申购单 + 评标标准（商务40/技术60，各一条细则）
pub fn create_requisition_with_criteria(state: &AppState) -> (PurchaseRequisition, EvaluationCriteria) {
    let pr = state
        .requisition_api
        .create_requisition("办公设备采购", OFFICER)
        .unwrap();
    let criteria = state
        .requisition_api
        .define_criteria(
            &pr.requisition_id,
            40.0,
            60.0,
            vec![
                CriterionInput {
                    category: CriterionCategory::Financial,
                    name: "价格".to_string(),
                    weight: 100.0,
                },
                CriterionInput {
                    category: CriterionCategory::Technical,
                    name: "质量".to_string(),
                    weight: 100.0,
                },
            ],
            OFFICER,
        )
        .unwrap();
    (pr, criteria)
}

pub fn item_input(name: &str, quantity: i64, unit_price: f64) -> QuoteItemInput {
    QuoteItemInput {
        item_name: name.to_string(),
        quantity,
        unit_price,
        lead_time_days: 7,
    }
}

/// 提交单明细报价
pub fn submit_simple_quote(
    state: &AppState,
    requisition_id: &str,
    vendor_id: &str,
    quantity: i64,
    unit_price: f64,
) -> Quotation {
    state
        .requisition_api
        .submit_quotation(requisition_id, vendor_id, vec![item_input("笔记本电脑", quantity, unit_price)])
        .unwrap()
}

/// 所有细则给同一原始分的评分输入（加权后明细得分即为该分数）
pub fn uniform_scores(quotation: &Quotation, criteria: &EvaluationCriteria, score: f64) -> Vec<ItemScoreInput> {
    quotation
        .items
        .iter()
        .map(|item| ItemScoreInput {
            item_id: item.item_id.clone(),
            criterion_scores: criteria
                .criteria
                .iter()
                .map(|c| CriterionScore {
                    criterion_id: c.criterion_id.clone(),
                    score,
                })
                .collect(),
        })
        .collect()
}

/// 单个评委给报价打统一分
pub fn score_quote(state: &AppState, quotation: &Quotation, criteria: &EvaluationCriteria, score: f64) {
    state
        .scoring_api
        .submit_scores(
            &quotation.quotation_id,
            "SC-01",
            uniform_scores(quotation, criteria, score),
            None,
        )
        .unwrap();
}
