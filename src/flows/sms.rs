//! SMS wizards: destination → text, free or paid.

use super::{
    is_msisdn, menu, render_unknown, require_account, resolve, AccountGate, Resolved, Settled,
};
use crate::actions::Action;
use crate::carrier::classify::Operation;
use crate::dialog::{Step, StepOutcome};
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::texts;
use anyhow::Result;

/// "Which kind of SMS?" menu.
///
/// # Errors
///
/// Propagates store failures.
pub async fn type_menu(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    let rows = vec![
        vec![
            Button::new("Free SMS", Action::SmsStart { free: true }),
            Button::new("Paid SMS", Action::SmsStart { free: false }),
        ],
        vec![Button::new("❌ Cancel", Action::Cancel)],
    ];
    let mut render = Render::message(texts::SMS_MENU).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render]))
}

/// Begin the wizard by asking for the destination.
///
/// # Errors
///
/// Propagates store failures.
pub async fn begin(ctx: &Ctx<'_>, free: bool, _message_id: Option<i32>) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    Ok(StepOutcome::next(
        vec![Render::message(texts::ENTER_DESTINATION).with_reply_keyboard(menu::cancel_keyboard())],
        Step::SmsDestination { free },
        None,
    ))
}

/// Destination step; the number rides in the step context.
#[must_use]
pub fn submit_destination(free: bool, text: &str) -> StepOutcome {
    let destination = text.trim();
    if !is_msisdn(destination) {
        return StepOutcome::next(
            vec![Render::message(texts::INVALID_NUMBER)],
            Step::SmsDestination { free },
            None,
        );
    }
    StepOutcome::next(
        vec![Render::message(texts::ENTER_SMS_TEXT)],
        Step::SmsText { free },
        Some(destination.to_string()),
    )
}

/// Text step: send the SMS and finish.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn submit_text(
    ctx: &Ctx<'_>,
    free: bool,
    context: Option<String>,
    text: &str,
) -> Result<StepOutcome> {
    let Some(destination) = context else {
        // The wizard lost its destination; collect it again
        return Ok(StepOutcome::next(
            vec![Render::message(texts::ENTER_DESTINATION)],
            Step::SmsDestination { free },
            None,
        ));
    };

    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = ctx
        .carrier
        .send_sms(&account.token, &destination, text, free)
        .await?;
    let settled = match resolve(ctx, &account, Operation::Sms, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    let keyboard = menu::main_keyboard(ctx).await?;
    let render = match settled {
        Settled::Success(_) => {
            Render::message(texts::sms_sent(text, &destination)).with_reply_keyboard(keyboard)
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
