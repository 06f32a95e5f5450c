// ==========================================
// 三方匹配集成测试
// ==========================================
// 职责: 接受授标生成订单后，验证收货/发票登记、匹配状态、人工处理
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod reconciliation_flow_test {
    use chrono::{NaiveDate, NaiveDateTime, Timelike};
    use procurement_engine::api::{ConflictKind, ErrorKind, GrnLineInput, InvoiceLineInput};
    use procurement_engine::domain::types::{AwardAction, MatchStatus};
    use procurement_engine::domain::{EntityType, PurchaseOrder};
    use procurement_engine::AppState;
    use std::collections::BTreeMap;

    use crate::test_helpers::*;

    const ITEM: &str = "笔记本电脑";

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    /// 单家报价 10 × 5.00，授标并接受 → 采购订单
    fn setup_purchase_order(state: &AppState) -> PurchaseOrder {
        register_manager(state);
        let (pr, criteria) = create_requisition_with_criteria(state);
        let q = submit_simple_quote(state, &pr.requisition_id, "V-001", 10, 5.0);
        score_quote(state, &q, &criteria, 80.0);
        state
            .award_api
            .finalize_award(&pr.requisition_id, BTreeMap::new(), None, OFFICER)
            .unwrap();
        let response = state
            .award_api
            .respond_to_award(&q.quotation_id, "V-001", AwardAction::Accept)
            .unwrap();
        response.purchase_order.unwrap()
    }

    fn receive_all(state: &AppState, po: &PurchaseOrder) -> String {
        let report = state
            .reconciliation_api
            .record_goods_receipt(
                &po.po_id,
                "WH-01",
                vec![GrnLineInput {
                    po_item_id: po.items[0].po_item_id.clone(),
                    quantity_received: 10,
                }],
            )
            .unwrap();
        report.document_id.unwrap()
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

    fn invoice_line(quantity: i64, unit_price: f64) -> Vec<InvoiceLineInput> {
        vec![InvoiceLineInput {
            item_name: ITEM.to_string(),
            quantity,
            unit_price,
        }]
    }

    #[test]
    fn test_missing_documents_is_pending() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);
        assert_eq!(po.total_amount, 50.0);

        let report = state.reconciliation_api.match_order(&po.po_id, OFFICER).unwrap();
        assert_eq!(report.result.status, MatchStatus::Pending);

        receive_all(&state, &po);
        let stored = state.reconciliation_api.get_reconciliation(&po.po_id).unwrap();
        assert_eq!(stored.status, MatchStatus::Pending);
    }

    #[test]
    fn test_full_match_after_receipt_and_invoice() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);
        let grn_id = receive_all(&state, &po);

        let report = state
            .reconciliation_api
            .record_invoice(&po.po_id, "INV-001", invoice_line(10, 5.0), Some(at(3)), OFFICER)
            .unwrap();

        assert_eq!(report.result.status, MatchStatus::Matched);
        assert!(report.result.quantity_match);
        assert!(report.result.price_match);
        assert_eq!(report.result.totals.invoiced_amount, 50.0);
        let invoice_id = report.document_id.clone().unwrap();

        // 每个单据动作各留一条审计
        assert_eq!(
            audit_actions(&state, EntityType::GoodsReceipt, &grn_id),
            vec!["RECORD_GOODS_RECEIPT"]
        );
        assert_eq!(
            audit_actions(&state, EntityType::Invoice, &invoice_id),
            vec!["RECORD_INVOICE"]
        );
        let matches = audit_actions(&state, EntityType::Reconciliation, &po.po_id);
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|a| a == "RUN_MATCH"));
    }

    #[test]
    fn test_invoice_time_is_stored_at_millisecond_precision() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);
        receive_all(&state, &po);

        let submitted = at(3).with_nanosecond(123_456_789).unwrap();
        let report = state
            .reconciliation_api
            .record_invoice(&po.po_id, "INV-NS", invoice_line(10, 5.0), Some(submitted), OFFICER)
            .unwrap();
        let invoice_id = report.document_id.unwrap();

        let logs = state
            .requisition_api
            .list_audit_trail(EntityType::Invoice, &invoice_id)
            .unwrap();
        let payload = logs[0].payload_json.as_ref().unwrap();
        let expected = at(3).with_nanosecond(123_000_000).unwrap();
        assert_eq!(payload["submitted_at"], serde_json::json!(expected));
    }

    #[test]
    fn test_price_difference_then_manual_resolution() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);
        receive_all(&state, &po);

        let report = state
            .reconciliation_api
            .record_invoice(&po.po_id, "INV-002", invoice_line(10, 5.5), Some(at(3)), OFFICER)
            .unwrap();
        assert_eq!(report.result.status, MatchStatus::Mismatched);
        assert!(report.result.quantity_match);
        assert!(!report.result.price_match);
        let item = report.result.item(&po.items[0].po_item_id).unwrap();
        assert_eq!(item.invoice_unit_price, Some(5.5));

        let resolved = state
            .reconciliation_api
            .resolve_manually(&po.po_id, "finance-01", "供应商补差价")
            .unwrap();
        assert_eq!(resolved.result.status, MatchStatus::Resolved);
        let resolution = resolved.result.resolution.clone().unwrap();
        assert_eq!(resolution.resolved_by, "finance-01");

        // 单据未变化，重新匹配保持已处理
        let rerun = state.reconciliation_api.match_order(&po.po_id, OFFICER).unwrap();
        assert_eq!(rerun.result.status, MatchStatus::Resolved);
        assert_eq!(rerun.result.resolution, Some(resolution));

        let audit = state
            .requisition_api
            .list_audit_trail(EntityType::Reconciliation, &po.po_id)
            .unwrap();
        assert!(audit.iter().any(|l| l.action_type == "MANUAL_RESOLUTION"));
    }

    #[test]
    fn test_new_document_clears_resolution() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);
        receive_all(&state, &po);
        state
            .reconciliation_api
            .record_invoice(&po.po_id, "INV-003", invoice_line(10, 5.5), Some(at(3)), OFFICER)
            .unwrap();
        state
            .reconciliation_api
            .resolve_manually(&po.po_id, "finance-01", "暂按发票价")
            .unwrap();

        // 更晚提交的更正发票（数量0）: 单价以最新发票为准，数量合计不变
        let report = state
            .reconciliation_api
            .record_invoice(&po.po_id, "INV-004", invoice_line(0, 5.0), Some(at(5)), OFFICER)
            .unwrap();
        assert_eq!(report.result.status, MatchStatus::Matched);
        assert!(report.result.resolution.is_none());

        let stored = state.reconciliation_api.get_reconciliation(&po.po_id).unwrap();
        assert_eq!(stored.status, MatchStatus::Matched);
        assert!(stored.resolution.is_none());
    }

    #[test]
    fn test_resolve_requires_mismatch() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);

        // 尚未匹配
        let err = state
            .reconciliation_api
            .resolve_manually(&po.po_id, "finance-01", "无")
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InvalidStateTransition));

        receive_all(&state, &po);
        state
            .reconciliation_api
            .record_invoice(&po.po_id, "INV-005", invoice_line(10, 5.0), None, OFFICER)
            .unwrap();
        let err = state
            .reconciliation_api
            .resolve_manually(&po.po_id, "finance-01", "无")
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InvalidStateTransition));
    }

    #[test]
    fn test_receipt_rejects_foreign_item() {
        let (_tmp, state) = create_test_state().unwrap();
        let po = setup_purchase_order(&state);

        let err = state
            .reconciliation_api
            .record_goods_receipt(
                &po.po_id,
                "WH-01",
                vec![GrnLineInput {
                    po_item_id: "NOT-ON-THIS-PO".to_string(),
                    quantity_received: 1,
                }],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // 校验失败不落库
        let report = state.reconciliation_api.match_order(&po.po_id, OFFICER).unwrap();
        assert_eq!(report.result.totals.received_quantity, 0);
    }

    #[test]
    fn test_unknown_purchase_order() {
        let (_tmp, state) = create_test_state().unwrap();
        let err = state.reconciliation_api.match_order("PO-MISSING", OFFICER).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
