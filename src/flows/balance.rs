//! Balance view with the low-balance loan shortcut.

use super::{render_unknown, require_account, resolve, AccountGate, Resolved, Settled};
use crate::actions::Action;
use crate::carrier::classify::Operation;
use crate::config::LOAN_OFFER_THRESHOLD;
use crate::dialog::StepOutcome;
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::texts;
use anyhow::Result;

/// Show the default account's balance.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn view(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = ctx.carrier.view_balance(&account.token).await?;
    let settled = match resolve(ctx, &account, Operation::Balance, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    match settled {
        Settled::Success(payload) => {
            let mut render = Render::message(texts::balance_summary(&payload));
            // Offer a loan only when broke and not already carrying one
            let low = texts::credit_balance(&payload)
                .is_some_and(|balance| balance <= LOAN_OFFER_THRESHOLD);
            if low && texts::loan_amount(&payload) <= 0.0 {
                render = render
                    .with_buttons(vec![vec![Button::new("🙏 Take Loan", Action::ConfirmLoan)]]);
            }
            if let Some(id) = message_id {
                render = render.editing(id);
            }
            Ok(StepOutcome::complete(vec![render]))
        }
        Settled::Domain(failure) => Ok(StepOutcome::complete(vec![Render::message(
            texts::domain_failure(failure),
        )])),
        Settled::Unknown {
            description,
            status_code,
        } => Ok(StepOutcome::complete(vec![render_unknown(
            &description,
            status_code,
            false,
        )])),
    }
}
