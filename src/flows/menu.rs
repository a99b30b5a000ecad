//! Main menu, greetings and static texts.

use crate::dialog::{StepOutcome, CANCEL_LABEL};
use crate::engine::Ctx;
use crate::render::Render;
use crate::texts::{self, labels};
use anyhow::Result;

/// The persistent reply keyboard, laid out by how many accounts the user
/// has linked.
///
/// # Errors
///
/// Propagates store failures.
pub async fn main_keyboard(ctx: &Ctx<'_>) -> Result<Vec<Vec<String>>> {
    let count = ctx.store.list_accounts(ctx.user).await?.len();

    let rows: Vec<Vec<&str>> = match count {
        0 => vec![
            vec![labels::REGISTER],
            vec![labels::SETTINGS, labels::HELP, labels::SUPPORT],
        ],
        1 => vec![
            vec![labels::BALANCE, labels::RECHARGE, labels::ACCOUNTS],
            vec![labels::SMS, labels::PLANS, labels::PROFILE],
            vec![labels::SETTINGS, labels::HELP, labels::SUPPORT],
        ],
        _ => vec![
            vec![labels::SWITCH, labels::ACCOUNTS],
            vec![labels::BALANCE, labels::RECHARGE, labels::SMS],
            vec![labels::PLANS, labels::PROFILE, labels::SETTINGS],
            vec![labels::HELP, labels::SUPPORT],
        ],
    };

    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(String::from).collect())
        .collect())
}

/// The single-button keyboard shown while a wizard is collecting input.
#[must_use]
pub fn cancel_keyboard() -> Vec<Vec<String>> {
    vec![vec![CANCEL_LABEL.to_string()]]
}

/// `/start` greeting. New users (no linked account) get the long intro.
///
/// # Errors
///
/// Propagates store failures.
pub async fn start(ctx: &Ctx<'_>, first_name: &str) -> Result<StepOutcome> {
    let keyboard = main_keyboard(ctx).await?;
    let text = if ctx.store.list_accounts(ctx.user).await?.is_empty() {
        texts::greet_first_time(first_name)
    } else {
        texts::greet(first_name)
    };
    Ok(StepOutcome::complete(vec![
        Render::message(text).with_reply_keyboard(keyboard),
    ]))
}

/// Cancel acknowledgement with the main keyboard restored.
///
/// # Errors
///
/// Propagates store failures.
pub async fn cancelled(ctx: &Ctx<'_>) -> Result<StepOutcome> {
    Ok(StepOutcome::cancelled(vec![
        Render::message(texts::CANCELLED).with_reply_keyboard(main_keyboard(ctx).await?),
    ]))
}
