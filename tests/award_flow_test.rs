// ==========================================
// 授标流程集成测试
// ==========================================
// 职责: 验证排名、授标冲突、拒标递补/重新询价、接受生成订单、撤销与超期
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod award_flow_test {
    use chrono::Duration;
    use procurement_engine::api::{ConflictKind, DeclineResolution, ErrorKind};
    use procurement_engine::domain::types::{AwardAction, QuotationStatus, RequisitionStatus};
    use procurement_engine::domain::{EntityType, Quotation};
    use procurement_engine::AppState;
    use std::collections::BTreeMap;

    use crate::test_helpers::*;

    /// 四家报价，分数 [90, 80, 70, 60]
    fn setup_four_vendors(state: &AppState) -> (String, Vec<Quotation>) {
        register_manager(state);
        let (pr, criteria) = create_requisition_with_criteria(state);
        let mut quotes = Vec::new();
        for (i, score) in [90.0, 80.0, 70.0, 60.0].iter().enumerate() {
            let q = submit_simple_quote(state, &pr.requisition_id, &format!("V-00{}", i + 1), 10, 100.0);
            score_quote(state, &q, &criteria, *score);
            quotes.push(q);
        }
        (pr.requisition_id, quotes)
    }

    fn status_of(state: &AppState, quotation_id: &str) -> (QuotationStatus, Option<i32>) {
        let q = state.requisition_api.get_quotation(quotation_id).unwrap();
        (q.status, q.rank)
    }

    fn audit_actions(state: &AppState, entity_type: EntityType, id: &str) -> Vec<String> {
        state
            .requisition_api
            .list_audit_trail(entity_type, id)
            .unwrap()
            .into_iter()
            .map(|log| log.action_type)
            .collect()
    }

    fn has_action(actions: &[String], action: &str) -> bool {
        actions.iter().any(|a| a == action)
    }

    #[test]
    fn test_finalize_award_ranks_and_routes() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);

        let outcome = state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        assert_eq!(outcome.awarded_quotation_id, quotes[0].quotation_id);
        assert_eq!(outcome.awarded_value, 1000.0);
        assert_eq!(outcome.routing.next_status, RequisitionStatus::PendingManagerApproval);
        assert_eq!(outcome.routing.next_approver_id.as_deref(), Some(MANAGER_ID));

        assert_eq!(status_of(&state, &quotes[0].quotation_id), (QuotationStatus::Awarded, Some(1)));
        assert_eq!(status_of(&state, &quotes[1].quotation_id), (QuotationStatus::Standby, Some(2)));
        assert_eq!(status_of(&state, &quotes[2].quotation_id), (QuotationStatus::Standby, Some(3)));
        assert_eq!(status_of(&state, &quotes[3].quotation_id), (QuotationStatus::Rejected, None));

        let pr = state.requisition_api.get_requisition(&requisition_id).unwrap();
        assert_eq!(pr.status, RequisitionStatus::PendingManagerApproval);
        assert_eq!(pr.total_price, 1000.0);
        assert_eq!(pr.award_response_deadline, Some(outcome.award_response_deadline));

        let audit = state
            .requisition_api
            .list_audit_trail(EntityType::Requisition, &requisition_id)
            .unwrap();
        let types: Vec<&str> = audit.iter().map(|l| l.action_type.as_str()).collect();
        assert!(types.contains(&"ROUTE_APPROVAL"));
        assert!(types.contains(&"FINALIZE_AWARD"));
    }

    #[test]
    fn test_second_finalize_is_award_in_progress() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);
        state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        let err = state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AwardInProgress));

        // 冲突不改动任何状态
        assert_eq!(status_of(&state, &quotes[3].quotation_id), (QuotationStatus::Rejected, None));
    }

    #[test]
    fn test_finalize_without_approver_leaves_no_trace() {
        let (_tmp, state) = create_test_state().unwrap();
        // 未登记经理，且未配置档位 → 路由到经理时无人可审
        let (pr, criteria) = create_requisition_with_criteria(&state);
        let mut quotes = Vec::new();
        for (i, score) in [90.0, 80.0, 70.0].iter().enumerate() {
            let q = submit_simple_quote(&state, &pr.requisition_id, &format!("V-00{}", i + 1), 10, 100.0);
            score_quote(&state, &q, &criteria, *score);
            quotes.push(q);
        }

        let err = state
            .award_api
            .finalize_award(&pr.requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoApproverForRole);

        // 排名写入随事务一并回滚
        for q in &quotes {
            assert_eq!(status_of(&state, &q.quotation_id), (QuotationStatus::Submitted, None));
        }
        let stored = state.requisition_api.get_requisition(&pr.requisition_id).unwrap();
        assert_eq!(stored.status, RequisitionStatus::Approved);
        assert!(stored.award_response_deadline.is_none());
        let actions = audit_actions(&state, EntityType::Requisition, &pr.requisition_id);
        assert!(!has_action(&actions, "FINALIZE_AWARD"));
        assert!(!has_action(&actions, "ROUTE_APPROVAL"));

        // 补登经理后可正常授标
        register_manager(&state);
        let outcome = state
            .award_api
            .finalize_award(&pr.requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();
        assert_eq!(outcome.awarded_quotation_id, quotes[0].quotation_id);
    }

    #[test]
    fn test_no_quotes_found() {
        let (_tmp, state) = create_test_state().unwrap();
        let (pr, _criteria) = create_requisition_with_criteria(&state);
        let err = state
            .award_api
            .finalize_award(&pr.requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoQuotesFound);
    }

    #[test]
    fn test_decline_cascade_to_restart() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);
        state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        // 第1名拒绝 → 第2名递补
        let r1 = state
            .award_api
            .respond_to_award(&quotes[0].quotation_id, "V-001", AwardAction::Reject)
            .unwrap();
        assert_eq!(
            r1.resolution,
            Some(DeclineResolution::Promoted {
                quotation_id: quotes[1].quotation_id.clone(),
                vendor_id: "V-002".to_string(),
            })
        );
        assert_eq!(status_of(&state, &quotes[0].quotation_id).0, QuotationStatus::Declined);
        assert_eq!(status_of(&state, &quotes[1].quotation_id), (QuotationStatus::Awarded, Some(2)));
        assert!(has_action(
            &audit_actions(&state, EntityType::Quotation, &quotes[0].quotation_id),
            "DECLINE_AWARD"
        ));
        assert!(has_action(
            &audit_actions(&state, EntityType::Quotation, &quotes[1].quotation_id),
            "PROMOTE_STANDBY"
        ));

        // 第2名拒绝 → 第3名递补
        state
            .award_api
            .respond_to_award(&quotes[1].quotation_id, "V-002", AwardAction::Reject)
            .unwrap();
        assert_eq!(status_of(&state, &quotes[2].quotation_id), (QuotationStatus::Awarded, Some(3)));

        // 第3名拒绝 → 无备选，重新询价
        let r3 = state
            .award_api
            .respond_to_award(&quotes[2].quotation_id, "V-003", AwardAction::Reject)
            .unwrap();
        assert_eq!(r3.resolution, Some(DeclineResolution::RfqRestarted));

        for q in &quotes {
            assert_eq!(status_of(&state, &q.quotation_id), (QuotationStatus::Submitted, None));
        }
        let pr = state.requisition_api.get_requisition(&requisition_id).unwrap();
        assert_eq!(pr.status, RequisitionStatus::Approved);
        assert!(pr.current_approver_id.is_none());
        assert!(pr.award_response_deadline.is_none());
        assert!(has_action(
            &audit_actions(&state, EntityType::Requisition, &requisition_id),
            "RESTART_RFQ"
        ));

        // 重新询价后可再次授标
        let again = state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();
        assert_eq!(again.awarded_quotation_id, quotes[0].quotation_id);
    }

    #[test]
    fn test_accept_creates_single_purchase_order() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);
        state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        let accepted = state
            .award_api
            .respond_to_award(&quotes[0].quotation_id, "V-001", AwardAction::Accept)
            .unwrap();
        let po = accepted.purchase_order.unwrap();
        assert!(po.po_number.starts_with("PO-"));
        assert_eq!(po.total_amount, 1000.0);
        assert_eq!(po.items.len(), 1);

        let pr = state.requisition_api.get_requisition(&requisition_id).unwrap();
        assert_eq!(pr.status, RequisitionStatus::PoCreated);
        assert_eq!(pr.purchase_order_id.as_deref(), Some(po.po_id.as_str()));
        assert!(has_action(
            &audit_actions(&state, EntityType::Quotation, &quotes[0].quotation_id),
            "ACCEPT_AWARD"
        ));
        assert_eq!(
            audit_actions(&state, EntityType::PurchaseOrder, &po.po_id),
            vec!["CREATE_PURCHASE_ORDER"]
        );

        // 重复接受 → DuplicatePurchaseOrder
        let err = state
            .award_api
            .respond_to_award(&quotes[0].quotation_id, "V-001", AwardAction::Accept)
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::DuplicatePurchaseOrder));

        // 已接受后不可撤销
        let err = state.award_api.change_award(&requisition_id, OFFICER).unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InvalidStateTransition));
    }

    #[test]
    fn test_respond_requires_owner_and_awarded_status() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);
        state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        let err = state
            .award_api
            .respond_to_award(&quotes[0].quotation_id, "V-002", AwardAction::Accept)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // 备选不能直接响应
        let err = state
            .award_api
            .respond_to_award(&quotes[1].quotation_id, "V-002", AwardAction::Accept)
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InvalidStateTransition));
    }

    #[test]
    fn test_partial_award_map() {
        let (_tmp, state) = create_test_state().unwrap();
        register_manager(&state);
        let (pr, criteria) = create_requisition_with_criteria(&state);
        let quote = state
            .requisition_api
            .submit_quotation(
                &pr.requisition_id,
                "V-001",
                vec![item_input("显示器", 2, 1000.0), item_input("键盘", 4, 50.0)],
            )
            .unwrap();
        score_quote(&state, &quote, &criteria, 75.0);

        let mut award_map = BTreeMap::new();
        award_map.insert("V-001".to_string(), vec![quote.items[1].item_id.clone()]);
        let outcome = state
            .award_api
            .finalize_award(&pr.requisition_id, award_map, None, OFFICER)
            .unwrap();
        assert_eq!(outcome.awarded_value, 200.0);

        let accepted = state
            .award_api
            .respond_to_award(&quote.quotation_id, "V-001", AwardAction::Accept)
            .unwrap();
        let po = accepted.purchase_order.unwrap();
        assert_eq!(po.items.len(), 1);
        assert_eq!(po.items[0].item_name, "键盘");

        // 未知供应商
        let (pr2, _) = create_requisition_with_criteria(&state);
        submit_simple_quote(&state, &pr2.requisition_id, "V-001", 1, 1.0);
        let mut bad_map = BTreeMap::new();
        bad_map.insert("V-404".to_string(), vec![]);
        let err = state
            .award_api
            .finalize_award(&pr2.requisition_id, bad_map, None, OFFICER)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_change_award_resets_everything() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);
        state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        let reset = state.award_api.change_award(&requisition_id, OFFICER).unwrap();
        assert_eq!(reset.reset_count, 4);
        for q in &quotes {
            assert_eq!(status_of(&state, &q.quotation_id), (QuotationStatus::Submitted, None));
        }
        let pr = state.requisition_api.get_requisition(&requisition_id).unwrap();
        assert_eq!(pr.status, RequisitionStatus::Approved);
        assert!(has_action(
            &audit_actions(&state, EntityType::Requisition, &requisition_id),
            "CHANGE_AWARD"
        ));
    }

    #[test]
    fn test_expire_award_responses() {
        let (_tmp, state) = create_test_state().unwrap();
        let (requisition_id, quotes) = setup_four_vendors(&state);
        let outcome = state
            .award_api
            .finalize_award(&requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();

        // 截止前不处理
        let early = state
            .award_api
            .expire_award_responses(&requisition_id, outcome.award_response_deadline, OFFICER)
            .unwrap();
        assert!(early.expired_quotation_id.is_none());
        assert_eq!(status_of(&state, &quotes[0].quotation_id).0, QuotationStatus::Awarded);

        // 截止后 → Failed + 递补第2名
        let late = state
            .award_api
            .expire_award_responses(
                &requisition_id,
                outcome.award_response_deadline + Duration::minutes(1),
                OFFICER,
            )
            .unwrap();
        assert_eq!(late.expired_quotation_id.as_deref(), Some(quotes[0].quotation_id.as_str()));
        assert_eq!(status_of(&state, &quotes[0].quotation_id).0, QuotationStatus::Failed);
        assert_eq!(status_of(&state, &quotes[1].quotation_id), (QuotationStatus::Awarded, Some(2)));
        assert!(has_action(
            &audit_actions(&state, EntityType::Quotation, &quotes[0].quotation_id),
            "EXPIRE_AWARD"
        ));
        assert!(has_action(
            &audit_actions(&state, EntityType::Quotation, &quotes[1].quotation_id),
            "PROMOTE_STANDBY"
        ));
    }
}
