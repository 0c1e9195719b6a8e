//! Unit tests for bet placement

use super::*;
use crate::aptos::{MockTransactionSubmitter, TransactionOutcome};
use crate::error::{ErrorKind, Provider};
use rust_decimal_macros::dec;
use serde_json::json;

const FUNCTION: &str = "0xcafe::prediction_market::buy_tokens";

fn request(body: serde_json::Value) -> BetRequest {
    serde_json::from_value(body).unwrap()
}

fn valid_body() -> serde_json::Value {
    json!({
        "userId": "42",
        "marketId": 3,
        "side": "yes",
        "amount": 1.5,
        "userAddress": "0xa11ce",
    })
}

fn validation_message(req: &BetRequest) -> String {
    match req.validate().unwrap_err() {
        BotError::Validation(msg) => msg,
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn test_valid_request() {
    let bet = request(valid_body()).validate().unwrap();
    assert_eq!(bet.user_id, "42");
    assert_eq!(bet.market_id, "3");
    assert_eq!(bet.side, BetSide::Yes);
    assert_eq!(bet.amount, dec!(1.5));
    assert_eq!(bet.scaled_amount, 1_500_000);
    assert_eq!(bet.user_address, "0xa11ce");
    assert!(bet.private_key.is_none());
}

#[test]
fn test_each_missing_field_is_named() {
    for field in ["userId", "marketId", "side", "amount", "userAddress"] {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove(field);
        let msg = validation_message(&request(body));
        assert!(msg.contains(field), "message '{msg}' should name {field}");
    }
}

#[test]
fn test_all_missing_fields_listed() {
    let msg = validation_message(&BetRequest::default());
    assert_eq!(
        msg,
        "Missing required fields: userId, marketId, side, amount, userAddress"
    );
}

#[test]
fn test_blank_strings_count_as_missing() {
    let mut body = valid_body();
    body["userAddress"] = json!("  ");
    let msg = validation_message(&request(body));
    assert!(msg.contains("userAddress"));
}

#[test]
fn test_side_case_insensitive() {
    for (raw, expected) in [("YES", BetSide::Yes), ("No", BetSide::No), (" yes ", BetSide::Yes)] {
        let mut body = valid_body();
        body["side"] = json!(raw);
        assert_eq!(request(body).validate().unwrap().side, expected);
    }
}

#[test]
fn test_invalid_side_rejected() {
    for raw in ["maybe", "y", "true", "yess"] {
        let mut body = valid_body();
        body["side"] = json!(raw);
        let msg = validation_message(&request(body));
        assert!(msg.contains("side"));
    }
}

#[test]
fn test_invalid_amounts_rejected() {
    for raw in [json!("abc"), json!(0), json!("-2"), json!(-0.5), json!("0.0")] {
        let mut body = valid_body();
        body["amount"] = raw.clone();
        let err = request(body).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "amount {raw} should be rejected");
    }
}

#[test]
fn test_amount_as_string() {
    let mut body = valid_body();
    body["amount"] = json!("2.25");
    assert_eq!(request(body).validate().unwrap().scaled_amount, 2_250_000);
}

#[test]
fn test_scale_truncates_toward_zero() {
    assert_eq!(scale_amount(dec!(1.5)), Some(1_500_000));
    assert_eq!(scale_amount(dec!(0.0000019)), Some(1));
    assert_eq!(scale_amount(dec!(3.14159265)), Some(3_141_592));
}

#[test]
fn test_dust_amount_rejected() {
    let mut body = valid_body();
    body["amount"] = json!("0.0000001");
    let msg = validation_message(&request(body));
    assert!(msg.contains("smallest token unit"));
}

#[test]
fn test_build_payload() {
    let service = BetService::new(Arc::new(MockTransactionSubmitter::new()), FUNCTION.into());
    let bet = request(valid_body()).validate().unwrap();
    let payload = service.build_payload(&bet);

    assert_eq!(payload.payload_type, "entry_function_payload");
    assert_eq!(payload.function, FUNCTION);
    assert!(payload.type_arguments.is_empty());
    assert_eq!(payload.arguments, vec![json!("3"), json!(true), json!("1500000")]);
}

#[tokio::test]
async fn test_place_bet_submits_scaled_amount() {
    let mut submitter = MockTransactionSubmitter::new();
    submitter
        .expect_submit_and_wait()
        .withf(|signer, payload| {
            signer.address == "0xa11ce"
                && signer.private_key.as_deref() == Some("0xkey")
                && payload.arguments[1] == json!(false)
                && payload.arguments[2] == json!("1500000")
        })
        .times(1)
        .returning(|_, _| {
            Ok(TransactionOutcome {
                hash: "0xfeed".to_string(),
                version: Some("99".to_string()),
                vm_status: "Executed successfully".to_string(),
            })
        });

    let service = BetService::new(Arc::new(submitter), FUNCTION.into());
    let mut body = valid_body();
    body["side"] = json!("no");
    body["privateKey"] = json!("0xkey");

    let receipt = service.place_bet(&request(body)).await.unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.transaction_hash, "0xfeed");
    assert_eq!(receipt.message, "Successfully placed NO bet of 1.5 on market 3");
}

#[tokio::test]
async fn test_invalid_request_never_submits() {
    let mut submitter = MockTransactionSubmitter::new();
    submitter.expect_submit_and_wait().times(0);

    let service = BetService::new(Arc::new(submitter), FUNCTION.into());
    let mut body = valid_body();
    body["side"] = json!("maybe");

    let err = service.place_bet(&request(body)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_submission_failure_propagates() {
    let mut submitter = MockTransactionSubmitter::new();
    submitter
        .expect_submit_and_wait()
        .returning(|_, _| Err(BotError::upstream(Provider::Aptos, "INSUFFICIENT_BALANCE")));

    let service = BetService::new(Arc::new(submitter), FUNCTION.into());
    let err = service.place_bet(&request(valid_body())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(err.to_string().contains("INSUFFICIENT_BALANCE"));
}

#[test]
fn test_receipt_serializes_camel_case() {
    let receipt = BetReceipt {
        success: true,
        transaction_hash: "0x1".into(),
        message: "ok".into(),
    };
    let value = serde_json::to_value(&receipt).unwrap();
    assert_eq!(value["transactionHash"], "0x1");
}
