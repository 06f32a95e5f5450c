// ==========================================
// 评分流程集成测试
// ==========================================
// 职责: 验证评分计算确定性、重复提交覆盖、评分关闭与校验错误
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod scoring_flow_test {
    use procurement_engine::api::{ApiError, ConflictKind, CriterionInput, ErrorKind};
    use procurement_engine::domain::types::CriterionCategory;
    use procurement_engine::domain::{CriterionScore, EntityType, ItemScoreInput};
    use std::collections::BTreeMap;

    use crate::test_helpers::*;

    #[test]
    fn test_weighted_scores_are_deterministic() {
        let (_tmp, state) = create_test_state().unwrap();
        let (pr, criteria) = create_requisition_with_criteria(&state);
        let quote = state
            .requisition_api
            .submit_quotation(
                &pr.requisition_id,
                "V-001",
                vec![item_input("显示器", 10, 1200.0), item_input("键盘", 10, 150.0)],
            )
            .unwrap();

        let financial = &criteria.criteria[0];
        let technical = &criteria.criteria[1];
        let inputs = vec![ItemScoreInput {
            item_id: quote.items[0].item_id.clone(),
            criterion_scores: vec![
                CriterionScore {
                    criterion_id: financial.criterion_id.clone(),
                    score: 80.0,
                },
                CriterionScore {
                    criterion_id: technical.criterion_id.clone(),
                    score: 90.0,
                },
            ],
        }];

        let first = state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-01", inputs.clone(), Some("首轮".to_string()))
            .unwrap();

        // 80×0.4 + 90×0.6 = 86；两个明细只评了一个 → 86 / 2 = 43
        assert!((first.score_set.item_scores[0].final_score - 86.0).abs() < 1e-9);
        assert!((first.score_set.final_score - 43.0).abs() < 1e-9);
        assert!((first.quotation_final_average_score - 43.0).abs() < 1e-9);

        let again = state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-01", inputs, Some("首轮".to_string()))
            .unwrap();
        assert_eq!(again.score_set.final_score, first.score_set.final_score);
        assert_eq!(again.score_set.score_id, first.score_set.score_id);
        assert_eq!(again.scorer_count, 1);
    }

    #[test]
    fn test_resubmission_replaces_and_aggregate_recomputes() {
        let (_tmp, state) = create_test_state().unwrap();
        let (pr, criteria) = create_requisition_with_criteria(&state);
        let quote = submit_simple_quote(&state, &pr.requisition_id, "V-001", 5, 100.0);

        state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-01", uniform_scores(&quote, &criteria, 60.0), None)
            .unwrap();
        let second = state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-02", uniform_scores(&quote, &criteria, 80.0), None)
            .unwrap();
        assert_eq!(second.scorer_count, 2);
        assert!((second.quotation_final_average_score - 70.0).abs() < 1e-9);

        // SC-01 改分：覆盖而不是新增
        let revised = state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-01", uniform_scores(&quote, &criteria, 100.0), None)
            .unwrap();
        assert_eq!(revised.scorer_count, 2);
        assert!((revised.quotation_final_average_score - 90.0).abs() < 1e-9);

        let stored = state.scoring_api.get_score_set(&quote.quotation_id, "SC-01").unwrap();
        assert_eq!(stored.item_scores.len(), 1);
        assert!((stored.final_score - 100.0).abs() < 1e-9);

        let reloaded = state.requisition_api.get_quotation(&quote.quotation_id).unwrap();
        assert!((reloaded.final_average_score - 90.0).abs() < 1e-9);

        let audit = state
            .requisition_api
            .list_audit_trail(EntityType::Quotation, &quote.quotation_id)
            .unwrap();
        let score_rows = audit.iter().filter(|l| l.action_type == "SUBMIT_SCORES").count();
        assert_eq!(score_rows, 3);
    }

    #[test]
    fn test_missing_criteria() {
        let (_tmp, state) = create_test_state().unwrap();
        let pr = state.requisition_api.create_requisition("无标准", OFFICER).unwrap();
        let quote = submit_simple_quote(&state, &pr.requisition_id, "V-001", 1, 10.0);

        let err = state
            .scoring_api
            .submit_scores(
                &quote.quotation_id,
                "SC-01",
                vec![ItemScoreInput {
                    item_id: quote.items[0].item_id.clone(),
                    criterion_scores: vec![],
                }],
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCriteria);
    }

    #[test]
    fn test_validation_errors_carry_field() {
        let (_tmp, state) = create_test_state().unwrap();
        let (pr, criteria) = create_requisition_with_criteria(&state);
        let quote = submit_simple_quote(&state, &pr.requisition_id, "V-001", 1, 10.0);

        // 超出评分上限
        let err = state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-01", uniform_scores(&quote, &criteria, 101.0), None)
            .unwrap_err();
        match err {
            ApiError::Validation { field, .. } => assert!(field.starts_with("item_scores[0]")),
            other => panic!("Expected Validation, got {:?}", other),
        }

        // 明细不属于该报价
        let err = state
            .scoring_api
            .submit_scores(
                &quote.quotation_id,
                "SC-01",
                vec![ItemScoreInput {
                    item_id: "not-an-item".to_string(),
                    criterion_scores: vec![],
                }],
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // 校验失败不落库
        assert!(state.scoring_api.get_score_set(&quote.quotation_id, "SC-01").is_err());
    }

    #[test]
    fn test_scoring_closed_after_award() {
        let (_tmp, state) = create_test_state().unwrap();
        register_manager(&state);
        let (pr, criteria) = create_requisition_with_criteria(&state);
        let quote = submit_simple_quote(&state, &pr.requisition_id, "V-001", 1, 10.0);
        score_quote(&state, &quote, &criteria, 70.0);

        state
            .award_api
            .finalize_award(&pr.requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        let err = state
            .scoring_api
            .submit_scores(&quote.quotation_id, "SC-02", uniform_scores(&quote, &criteria, 90.0), None)
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::ScoringClosed));
    }

    #[test]
    fn test_criteria_weight_invariant_rejected() {
        let (_tmp, state) = create_test_state().unwrap();
        let pr = state.requisition_api.create_requisition("权重错误", OFFICER).unwrap();

        let err = state
            .requisition_api
            .define_criteria(
                &pr.requisition_id,
                50.0,
                40.0,
                vec![CriterionInput {
                    category: CriterionCategory::Financial,
                    name: "价格".to_string(),
                    weight: 100.0,
                }],
                OFFICER,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(state.requisition_api.get_criteria(&pr.requisition_id).is_err());
    }
}
