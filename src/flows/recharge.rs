//! Recharge wizards: target → method → pin or amount.
//!
//! Recharging one's own number is a single input (pin or amount);
//! recharging someone else collects the destination first and chains it
//! through the step context.

use super::{
    is_msisdn, menu, render_unknown, require_account, resolve, AccountGate, Resolved, Settled,
};
use crate::actions::{Action, RechargeMethod, RechargeTarget};
use crate::carrier::classify::Operation;
use crate::dialog::{Step, StepOutcome};
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::texts;
use anyhow::Result;
use serde_json::Value;

/// "Recharge which number?" menu.
///
/// # Errors
///
/// Propagates store failures.
pub async fn target_menu(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    let rows = vec![
        vec![
            Button::new(
                "Self Recharge",
                Action::RechargeMethodMenu(RechargeTarget::Own),
            ),
            Button::new(
                "Recharge Others",
                Action::RechargeMethodMenu(RechargeTarget::Other),
            ),
        ],
        vec![Button::new("❌ Cancel", Action::Cancel)],
    ];
    let mut render = Render::message(texts::RECHARGE_TO).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render]))
}

/// Pin-or-online menu for a chosen target.
///
/// # Errors
///
/// Propagates store failures.
pub async fn method_menu(
    ctx: &Ctx<'_>,
    target: RechargeTarget,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    let rows = vec![
        vec![
            Button::new(
                "Recharge With Pin",
                Action::RechargeStart {
                    target,
                    method: RechargeMethod::Pin,
                },
            ),
            Button::new(
                "Online Recharge",
                Action::RechargeStart {
                    target,
                    method: RechargeMethod::Online,
                },
            ),
        ],
        vec![
            Button::new("⬅️ Back", Action::RechargeMenu),
            Button::new("❌ Cancel", Action::Cancel),
        ],
    ];
    let mut render = Render::message(texts::RECHARGE_METHOD).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render]))
}

/// Begin the wizard for a (target, method) pair.
///
/// # Errors
///
/// Propagates store failures.
pub async fn start(
    ctx: &Ctx<'_>,
    target: RechargeTarget,
    method: RechargeMethod,
) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    let (prompt, step) = match (target, method) {
        (RechargeTarget::Own, RechargeMethod::Pin) => (
            texts::ENTER_RECHARGE_PIN,
            Step::RechargePin {
                target: RechargeTarget::Own,
            },
        ),
        (RechargeTarget::Own, RechargeMethod::Online) => (
            texts::ENTER_RECHARGE_AMOUNT,
            Step::RechargeAmount {
                target: RechargeTarget::Own,
            },
        ),
        (RechargeTarget::Other, _) => (
            texts::ENTER_DESTINATION,
            Step::RechargeDestination { method },
        ),
    };

    Ok(StepOutcome::next(
        vec![Render::message(prompt).with_reply_keyboard(menu::cancel_keyboard())],
        step,
        None,
    ))
}

/// Destination step of the recharge-others wizard. The number rides in the
/// step context to the pin/amount step.
#[must_use]
pub fn submit_destination(method: RechargeMethod, text: &str) -> StepOutcome {
    let destination = text.trim();
    if !is_msisdn(destination) {
        return StepOutcome::next(
            vec![Render::message(texts::INVALID_NUMBER)],
            Step::RechargeDestination { method },
            None,
        );
    }

    let (prompt, step) = match method {
        RechargeMethod::Pin => (
            texts::ENTER_RECHARGE_PIN,
            Step::RechargePin {
                target: RechargeTarget::Other,
            },
        ),
        RechargeMethod::Online => (
            texts::ENTER_RECHARGE_AMOUNT,
            Step::RechargeAmount {
                target: RechargeTarget::Other,
            },
        ),
    };
    StepOutcome::next(
        vec![Render::message(prompt)],
        step,
        Some(destination.to_string()),
    )
}

/// Pin step for either target.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn submit_pin(
    ctx: &Ctx<'_>,
    target: RechargeTarget,
    context: Option<String>,
    text: &str,
) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let destination = match destination_for(target, context) {
        Ok(destination) => destination,
        Err(outcome) => return Ok(*outcome),
    };

    let reply = ctx
        .carrier
        .recharge_pin(&account.token, text.trim(), destination.as_deref())
        .await?;
    let settled = match resolve(ctx, &account, Operation::Recharge, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    finish(ctx, settled, |_| texts::RECHARGE_SUCCESS.to_string()).await
}

/// Amount step for either target of an online recharge.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn submit_amount(
    ctx: &Ctx<'_>,
    target: RechargeTarget,
    context: Option<String>,
    text: &str,
) -> Result<StepOutcome> {
    let amount = text.trim();
    if amount.parse::<u32>().is_err() {
        return Ok(StepOutcome::next(
            vec![Render::message(texts::ENTER_RECHARGE_AMOUNT)],
            Step::RechargeAmount { target },
            context,
        ));
    }

    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let destination = match destination_for(target, context) {
        Ok(destination) => destination,
        Err(outcome) => return Ok(*outcome),
    };

    let reply = ctx
        .carrier
        .recharge_online(&account.token, amount, destination.as_deref())
        .await?;
    let settled = match resolve(ctx, &account, Operation::Recharge, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    finish(ctx, settled, |payload| {
        payload
            .get("url")
            .and_then(Value::as_str)
            .map_or_else(|| texts::RECHARGE_SUCCESS.to_string(), texts::payment_link)
    })
    .await
}

/// Recharging others requires the destination chained from the previous
/// step; losing it (e.g. to wizard expiry) restarts the wizard.
fn destination_for(
    target: RechargeTarget,
    context: Option<String>,
) -> Result<Option<String>, Box<StepOutcome>> {
    match target {
        RechargeTarget::Own => Ok(None),
        RechargeTarget::Other => match context {
            Some(destination) => Ok(Some(destination)),
            None => Err(Box::new(StepOutcome::next(
                vec![Render::message(texts::ENTER_DESTINATION)],
                Step::RechargeDestination {
                    method: RechargeMethod::Online,
                },
                None,
            ))),
        },
    }
}

/// Common tail: success text from the payload, domain text, or the verbatim
/// unknown rendering, always back on the main keyboard.
async fn finish(
    ctx: &Ctx<'_>,
    settled: Settled,
    success_text: impl FnOnce(&Value) -> String,
) -> Result<StepOutcome> {
    let keyboard = menu::main_keyboard(ctx).await?;
    let render = match settled {
        Settled::Success(payload) => {
            Render::message(success_text(&payload)).with_reply_keyboard(keyboard)
        }
        Settled::Domain(failure) => {
            Render::message(texts::domain_failure(failure)).with_reply_keyboard(keyboard)
        }
        Settled::Unknown {
            description,
            status_code,
        } => render_unknown(&description, status_code, false),
    };
    Ok(StepOutcome::complete(vec![render]))
}
