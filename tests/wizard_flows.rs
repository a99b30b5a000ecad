//! End-to-end wizard scenarios over the event orchestrator with an
//! in-memory store and a scripted carrier.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use telecare_bot::carrier::SessionToken;
use telecare_bot::dialog::Step;
use telecare_bot::engine::{App, Event, EventKind};
use telecare_bot::storage::{encode_msisdn, AccountStore, UserId};
use telecare_bot::testing::{carrier_response, MemoryAccountStore, MockCarrier};

const CHAT: i64 = 4242;

fn text_event(text: &str) -> Event {
    Event {
        chat_id: CHAT,
        first_name: "Asha".to_string(),
        kind: EventKind::Text(text.to_string()),
    }
}

fn button_event(token: &str) -> Event {
    Event {
        chat_id: CHAT,
        first_name: "Asha".to_string(),
        kind: EventKind::Button {
            token: token.to_string(),
            message_id: Some(77),
        },
    }
}

struct Harness {
    app: App,
    store: Arc<MemoryAccountStore>,
    carrier: Arc<MockCarrier>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryAccountStore::new());
    let carrier = Arc::new(MockCarrier::default());
    let app = App::new(
        store.clone(),
        carrier.clone(),
        Duration::from_secs(900),
    );
    Harness {
        app,
        store,
        carrier,
    }
}

async fn link_account(store: &MemoryAccountStore, msisdn: &str) -> UserId {
    let user = store.get_or_create_user(CHAT).await.expect("user");
    store
        .add_account(user, encode_msisdn(msisdn), SessionToken::new("tok"))
        .await
        .expect("account");
    store
        .set_default(user, Some(1))
        .await
        .expect("default pointer");
    user
}

#[tokio::test]
async fn registration_happy_path_links_an_account_and_returns_to_idle() {
    let h = harness();
    h.carrier.push(carrier_response("OTP1000", json!({})));
    h.carrier
        .push(carrier_response("OTP1000", json!({"token": "granted-token"})));

    // Menu entry starts the wizard
    let replies = h.app.handle_event(text_event("➕ Register")).await;
    assert!(replies[0].text.contains("phone number"));
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::RegisterMsisdn
    );

    // Number in, OTP requested, wizard advances
    let replies = h.app.handle_event(text_event("9812345678")).await;
    assert!(replies[0].text.contains("OTP"));
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::RegisterOtp
    );

    // Correct code: account stored, default set, wizard gone
    let replies = h.app.handle_event(text_event("1234")).await;
    assert!(replies[0].text.contains("9812345678"));
    assert!(h.app.dialog().peek(UserId(CHAT)).await.is_none());

    let user = h.store.get_or_create_user(CHAT).await.expect("user");
    let accounts = h.store.list_accounts(user).await.expect("accounts");
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].msisdn(), "9812345678");
    assert_eq!(accounts[0].token, SessionToken::new("granted-token"));
    assert_eq!(h.store.get_default(user).await.expect("pointer"), Some(1));
}

#[tokio::test]
async fn expired_otp_keeps_the_wizard_at_awaiting_code() {
    let h = harness();
    h.carrier.push(carrier_response("OTP1000", json!({})));
    h.carrier.push(carrier_response("OTP2006", json!({})));

    h.app.handle_event(text_event("/register")).await;
    h.app.handle_event(text_event("9812345678")).await;

    let replies = h.app.handle_event(text_event("0000")).await;
    assert!(replies[0].text.contains("expired"));
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::RegisterOtp
    );
}

#[tokio::test]
async fn session_expiry_removes_the_account_through_the_choke_point() {
    let h = harness();
    let user = link_account(&h.store, "9801111111").await;
    h.carrier
        .push(carrier_response("LGN2003", serde_json::Value::Null));

    let replies = h.app.handle_event(text_event("💰 Balance")).await;
    assert!(replies[0].text.contains("register"));

    // Account deleted, pointer unset
    assert!(h.store.list_accounts(user).await.expect("accounts").is_empty());
    assert_eq!(h.store.get_default(user).await.expect("pointer"), None);

    // Idempotent second invalidation
    h.app
        .sessions()
        .invalidate_session(user, telecare_bot::carrier::classify::ExpiryReason::NewLogin)
        .await
        .expect("no-op");
}

#[tokio::test]
async fn cancel_reaches_idle_from_every_wizard_state() {
    let steps = [
        Step::RegisterMsisdn,
        Step::RegisterOtp,
        Step::RechargeDestination {
            method: telecare_bot::actions::RechargeMethod::Pin,
        },
        Step::RechargePin {
            target: telecare_bot::actions::RechargeTarget::Own,
        },
        Step::RechargeAmount {
            target: telecare_bot::actions::RechargeTarget::Other,
        },
        Step::SmsDestination { free: true },
        Step::SmsText { free: false },
    ];

    for step in steps {
        let h = harness();
        h.app
            .dialog()
            .begin(UserId(CHAT), step.clone(), Some("ctx".to_string()))
            .await;

        let replies = h.app.handle_event(text_event("❌ Cancel")).await;
        assert!(replies[0].text.contains("Cancelled"), "step {step:?}");
        assert!(
            h.app.dialog().peek(UserId(CHAT)).await.is_none(),
            "step {step:?} did not reach Idle"
        );
    }
}

#[tokio::test]
async fn free_sms_wizard_end_to_end() {
    let h = harness();
    link_account(&h.store, "9801111111").await;
    h.carrier.push(carrier_response(
        "SMS1000",
        json!({"sendFreeSMSResponse": {"statusCode": "0"}}),
    ));

    h.app.handle_event(text_event("/freesms")).await;
    h.app.handle_event(text_event("9822222222")).await;
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::SmsText { free: true }
    );

    let replies = h.app.handle_event(text_event("hello from the bot")).await;
    assert!(replies[0].text.contains("hello from the bot"));
    assert!(replies[0].text.contains("9822222222"));
    assert!(h.app.dialog().peek(UserId(CHAT)).await.is_none());
}

#[tokio::test]
async fn free_sms_quota_ends_the_wizard_with_a_specific_message() {
    let h = harness();
    link_account(&h.store, "9801111111").await;
    h.carrier.push(carrier_response(
        "SMS1000",
        json!({"sendFreeSMSResponse": {"statusCode": "1"}}),
    ));

    h.app.handle_event(text_event("/freesms")).await;
    h.app.handle_event(text_event("9822222222")).await;
    let replies = h.app.handle_event(text_event("hi")).await;
    assert!(replies[0].text.contains("free SMS"));
    assert!(h.app.dialog().peek(UserId(CHAT)).await.is_none());
}

#[tokio::test]
async fn a_new_wizard_replaces_the_pending_step() {
    let h = harness();
    link_account(&h.store, "9801111111").await;

    h.app.handle_event(text_event("/register")).await;
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::RegisterMsisdn
    );

    // A button press starts a different wizard: single slot, silent replace
    h.app.handle_event(button_event("sms.go:free")).await;
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::SmsDestination { free: true }
    );
}

#[tokio::test]
async fn stale_buttons_are_silent_noops() {
    let h = harness();
    let replies = h.app.handle_event(button_event("cb_fromThePast:9")).await;
    assert!(replies.is_empty());
}

#[tokio::test]
async fn select_account_button_decodes_despite_colons_in_msisdn() {
    let h = harness();
    let user = link_account(&h.store, "98:01:23").await;
    h.store
        .add_account(user, encode_msisdn("9802222222"), SessionToken::new("t2"))
        .await
        .expect("second account");

    // Token embeds the colon-ridden msisdn after the account id
    let replies = h.app.handle_event(button_event("acct.sel:2:9802222222")).await;
    assert!(replies.iter().any(|r| r.notice));
    assert_eq!(h.store.get_default(user).await.expect("pointer"), Some(2));
}

#[tokio::test]
async fn recharge_others_chains_destination_to_the_pin_step() {
    let h = harness();
    link_account(&h.store, "9801111111").await;
    h.carrier.push(carrier_response(
        "MRG1000",
        json!({"isRechargeSuccess": true}),
    ));

    h.app.handle_event(button_event("rch.go:other:pin")).await;
    assert_eq!(
        h.app.dialog().peek(UserId(CHAT)).await.expect("pending").step,
        Step::RechargeDestination {
            method: telecare_bot::actions::RechargeMethod::Pin
        }
    );

    h.app.handle_event(text_event("9833333333")).await;
    let pending = h.app.dialog().peek(UserId(CHAT)).await.expect("pending");
    assert_eq!(
        pending.step,
        Step::RechargePin {
            target: telecare_bot::actions::RechargeTarget::Other
        }
    );
    assert_eq!(pending.context.as_deref(), Some("9833333333"));

    let replies = h
        .app
        .handle_event(text_event("1111222233334444"))
        .await;
    assert!(replies[0].text.contains("successful"));
    assert!(h.app.dialog().peek(UserId(CHAT)).await.is_none());
}
