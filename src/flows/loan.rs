//! Credit loans: confirm, then take.

use super::{render_unknown, require_account, resolve, AccountGate, Resolved, Settled};
use crate::actions::Action;
use crate::carrier::classify::Operation;
use crate::dialog::StepOutcome;
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::texts;
use anyhow::Result;

/// Ask before borrowing.
///
/// # Errors
///
/// Propagates store failures.
pub async fn confirm(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    let mut rows = vec![vec![
        Button::new("❌ Cancel", Action::Cancel),
        Button::new("🤝 Confirm loan", Action::TakeLoan),
    ]];
    let mut render = Render::message(texts::CONFIRM_LOAN);
    if let Some(id) = message_id {
        // Reached from the balance view; keep a way back
        rows.push(vec![Button::new("⬅️ Back", Action::ViewBalance)]);
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render.with_buttons(rows)]))
}

/// Take the loan and answer with a popup verdict.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn take(ctx: &Ctx<'_>) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = ctx.carrier.take_loan(&account.token).await?;
    let settled = match resolve(ctx, &account, Operation::Loan, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    let render = match settled {
        Settled::Success(_) => Render::notice(texts::LOAN_GRANTED),
        Settled::Domain(failure) => Render::notice(texts::domain_failure(failure)),
        Settled::Unknown {
            description,
            status_code,
        } => render_unknown(&description, status_code, true),
    };
    Ok(StepOutcome::complete(vec![render]))
}
