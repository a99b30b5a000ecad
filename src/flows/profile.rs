//! Subscriber profile view.

use super::{render_unknown, require_account, resolve, AccountGate, Resolved, Settled};
use crate::carrier::classify::Operation;
use crate::dialog::StepOutcome;
use crate::engine::Ctx;
use crate::render::Render;
use crate::texts;
use anyhow::Result;

/// Show the default account's subscriber profile.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn view(ctx: &Ctx<'_>) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = ctx.carrier.view_profile(&account.token).await?;
    let settled = match resolve(ctx, &account, Operation::Profile, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    let render = match settled {
        Settled::Success(payload) => Render::message(texts::profile_summary(&payload)),
        Settled::Domain(failure) => Render::message(texts::domain_failure(failure)),
        Settled::Unknown {
            description,
            status_code,
        } => render_unknown(&description, status_code, false),
    };
    Ok(StepOutcome::complete(vec![render]))
}
