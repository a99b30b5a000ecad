//! Account registration wizard: number → OTP → linked account.
//!
//! The entered number lives in the scratch store under
//! `temp_keys::REGISTER_MSISDN` between steps, because the OTP step can be
//! resumed from a button press (re-send, re-enter) long after the original
//! message exchange.

use super::{is_msisdn, menu, render_unknown};
use crate::actions::Action;
use crate::carrier::classify::{classify, DomainFailure, Operation, Outcome};
use crate::dialog::{Step, StepOutcome};
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::storage::{encode_msisdn, temp_keys};
use crate::texts;
use anyhow::Result;
use serde_json::Value;
use tracing::info;

/// Start (or restart) the wizard by asking for a number.
///
/// # Errors
///
/// Propagates store failures.
pub async fn begin(ctx: &Ctx<'_>) -> Result<StepOutcome> {
    // A fresh entry invalidates whatever number an older attempt left behind
    ctx.store
        .put_temp(ctx.user, temp_keys::REGISTER_MSISDN, None)
        .await?;
    Ok(StepOutcome::next(
        vec![Render::message(texts::ENTER_NUMBER).with_reply_keyboard(menu::cancel_keyboard())],
        Step::RegisterMsisdn,
        None,
    ))
}

/// Handle the number the user typed.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn submit_msisdn(ctx: &Ctx<'_>, text: &str) -> Result<StepOutcome> {
    let msisdn = text.trim();
    if !is_msisdn(msisdn) {
        return Ok(StepOutcome::next(
            vec![Render::message(texts::INVALID_NUMBER)],
            Step::RegisterMsisdn,
            None,
        ));
    }
    send_otp_to(ctx, msisdn).await
}

/// Send (or re-send) the OTP and decide the next step from the response.
async fn send_otp_to(ctx: &Ctx<'_>, msisdn: &str) -> Result<StepOutcome> {
    let response = ctx.carrier.send_otp(msisdn).await?;

    match classify(Operation::Registration, &response) {
        Outcome::Success(_) => {
            ctx.store
                .put_temp(
                    ctx.user,
                    temp_keys::REGISTER_MSISDN,
                    Some(Value::String(msisdn.to_string())),
                )
                .await?;
            Ok(StepOutcome::next(
                vec![Render::message(texts::ENTER_OTP).with_buttons(otp_markup(false))],
                Step::RegisterOtp,
                None,
            ))
        }
        Outcome::Domain(DomainFailure::OtpResendExceeded) => {
            // The number is burnt for now; forget it and ask for another
            ctx.store
                .put_temp(ctx.user, temp_keys::REGISTER_MSISDN, None)
                .await?;
            Ok(StepOutcome::next(
                vec![Render::message(texts::OTP_SEND_EXCEEDED)
                    .with_reply_keyboard(menu::cancel_keyboard())],
                Step::RegisterMsisdn,
                None,
            ))
        }
        Outcome::Domain(failure) => Ok(StepOutcome::next(
            vec![Render::message(texts::domain_failure(failure))],
            Step::RegisterMsisdn,
            None,
        )),
        Outcome::SessionExpired(reason) => Ok(StepOutcome::complete(vec![Render::message(
            texts::session_expired(reason),
        )])),
        Outcome::Unknown {
            description,
            status_code,
        } => Ok(StepOutcome::complete(vec![render_unknown(
            &description,
            status_code,
            false,
        )])),
    }
}

/// Handle the OTP code the user typed.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn submit_otp(ctx: &Ctx<'_>, text: &str) -> Result<StepOutcome> {
    let Some(msisdn) = stored_msisdn(ctx).await? else {
        // The wizard outlived its scratch data; start over
        return begin(ctx).await;
    };

    let exchange = ctx.carrier.exchange_otp(&msisdn, text.trim()).await?;

    match classify(Operation::Registration, &exchange.response) {
        Outcome::Success(_) => {
            let Some(token) = exchange.token else {
                return Ok(StepOutcome::complete(vec![render_unknown(
                    "registration succeeded without a session token",
                    exchange.response.status_code,
                    false,
                )]));
            };
            ctx.sessions
                .link_account(ctx.user, encode_msisdn(&msisdn), token)
                .await?;
            ctx.store
                .put_temp(ctx.user, temp_keys::REGISTER_MSISDN, None)
                .await?;
            info!("User {} completed registration", ctx.user);
            Ok(StepOutcome::complete(vec![Render::message(
                texts::registered(&msisdn),
            )
            .with_reply_keyboard(menu::main_keyboard(ctx).await?)]))
        }
        Outcome::Domain(DomainFailure::OtpAttemptsExceeded) => Ok(StepOutcome::next(
            vec![Render::message(texts::OTP_ATTEMPTS_EXCEEDED).with_buttons(otp_markup(false))],
            Step::RegisterOtp,
            None,
        )),
        // Wrong or expired code: stay at this step and re-prompt
        Outcome::Domain(failure) => Ok(StepOutcome::next(
            vec![Render::message(texts::domain_failure(failure)).with_buttons(otp_markup(true))],
            Step::RegisterOtp,
            None,
        )),
        Outcome::SessionExpired(reason) => Ok(StepOutcome::complete(vec![Render::message(
            texts::session_expired(reason),
        )])),
        Outcome::Unknown {
            description,
            status_code,
        } => Ok(StepOutcome::complete(vec![render_unknown(
            &description,
            status_code,
            false,
        )])),
    }
}

/// Button resume: re-send the OTP to the stored number.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn resend_otp(ctx: &Ctx<'_>) -> Result<StepOutcome> {
    match stored_msisdn(ctx).await? {
        Some(msisdn) => send_otp_to(ctx, &msisdn).await,
        None => begin(ctx).await,
    }
}

/// Button resume: prompt for the OTP again.
///
/// # Errors
///
/// Propagates store failures.
pub async fn reenter_otp(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    let mut render = Render::message(texts::ENTER_OTP);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::next(vec![render], Step::RegisterOtp, None))
}

/// Button resume: restart with a different number.
///
/// # Errors
///
/// Propagates store failures.
pub async fn change_number(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    ctx.store
        .put_temp(ctx.user, temp_keys::REGISTER_MSISDN, None)
        .await?;
    let mut render = Render::message(texts::ENTER_NUMBER);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::next(vec![render], Step::RegisterMsisdn, None))
}

async fn stored_msisdn(ctx: &Ctx<'_>) -> Result<Option<String>> {
    Ok(ctx
        .store
        .get_temp(ctx.user, temp_keys::REGISTER_MSISDN)
        .await?
        .as_ref()
        .and_then(Value::as_str)
        .map(String::from))
}

fn otp_markup(re_enter: bool) -> Vec<Vec<Button>> {
    let mut rows = Vec::new();
    if re_enter {
        rows.push(vec![Button::new("Re-Enter OTP", Action::ReenterOtp)]);
    }
    rows.push(vec![
        Button::new("Re-send OTP", Action::ResendOtp),
        Button::new("Change Number", Action::ChangeNumber),
    ]);
    rows
}
