//! Linked-account management: list, select default, unlink, cycle.

use super::{menu, register};
use crate::actions::{Action, AccountsMode};
use crate::dialog::StepOutcome;
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::session::SelectOutcome;
use crate::texts;
use anyhow::Result;

/// Render the accounts list in select or remove mode.
///
/// # Errors
///
/// Propagates store failures.
pub async fn menu(
    ctx: &Ctx<'_>,
    mode: AccountsMode,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    let Some(render) = menu_render(ctx, mode, message_id).await? else {
        let render = match message_id {
            Some(id) => Render::message(texts::NO_ACCOUNTS).editing(id),
            None => Render::message(texts::NO_ACCOUNTS)
                .with_reply_keyboard(menu::main_keyboard(ctx).await?),
        };
        return Ok(StepOutcome::complete(vec![render]));
    };
    Ok(StepOutcome::complete(vec![render]))
}

/// The accounts markup, or `None` when nothing is linked.
async fn menu_render(
    ctx: &Ctx<'_>,
    mode: AccountsMode,
    message_id: Option<i32>,
) -> Result<Option<Render>> {
    let accounts = ctx.store.list_accounts(ctx.user).await?;
    if accounts.is_empty() {
        return Ok(None);
    }
    let default = ctx.store.get_default(ctx.user).await?;

    let mut rows: Vec<Vec<Button>> = Vec::new();
    for pair in accounts.chunks(2) {
        let mut row = Vec::new();
        for account in pair {
            let msisdn = account.msisdn();
            let label = if Some(account.id) == default {
                format!("✅ {msisdn}")
            } else {
                msisdn.clone()
            };
            let action = match mode {
                AccountsMode::Select => Action::SelectAccount {
                    account_id: account.id,
                    msisdn,
                },
                AccountsMode::Remove => Action::RemoveAccount {
                    account_id: account.id,
                    msisdn,
                },
            };
            row.push(Button::new(label, action));
        }
        rows.push(row);
    }

    rows.push(vec![Button::new("➕ Add", Action::AddAccount)]);
    let (select_label, remove_label) = match mode {
        AccountsMode::Select => ("Login As ✨", "Remove"),
        AccountsMode::Remove => ("Login As", "Remove ✨"),
    };
    rows.push(vec![
        Button::new(select_label, Action::AccountsMenu(AccountsMode::Select)),
        Button::new(remove_label, Action::AccountsMenu(AccountsMode::Remove)),
    ]);
    rows.push(vec![Button::new("❌ Cancel", Action::Cancel)]);

    let mut render = Render::message(texts::ACCOUNTS_HEADER).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(Some(render))
}

/// Make an account the default.
///
/// # Errors
///
/// Propagates store failures.
pub async fn select(
    ctx: &Ctx<'_>,
    account_id: u32,
    msisdn: &str,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    match ctx.sessions.select_default(ctx.user, account_id).await? {
        SelectOutcome::AlreadyDefault => Ok(StepOutcome::complete(vec![Render::notice(
            texts::already_logged_in(msisdn),
        )])),
        SelectOutcome::Selected => {
            let mut replies = vec![Render::notice(texts::logged_in_as(msisdn))];
            if let Some(render) = menu_render(ctx, AccountsMode::Select, message_id).await? {
                replies.push(render);
            }
            Ok(StepOutcome::complete(replies))
        }
        SelectOutcome::NotFound => Ok(StepOutcome::complete(vec![Render::notice(
            texts::SOMETHING_WRONG,
        )])),
    }
}

/// Unlink an account and refresh the list.
///
/// # Errors
///
/// Propagates store failures.
pub async fn remove(
    ctx: &Ctx<'_>,
    account_id: u32,
    msisdn: &str,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    ctx.sessions.remove_account(ctx.user, account_id).await?;
    let mut replies = vec![Render::notice(texts::logged_out(msisdn))];
    match menu_render(ctx, AccountsMode::Remove, message_id).await? {
        Some(render) => replies.push(render),
        None => {
            let render = match message_id {
                Some(id) => Render::message(texts::NO_ACCOUNTS).editing(id),
                None => Render::message(texts::NO_ACCOUNTS),
            };
            replies.push(render);
        }
    }
    Ok(StepOutcome::complete(replies))
}

/// Hop to the next linked account, wrapping; with nothing linked, fall into
/// registration.
///
/// # Errors
///
/// Propagates store failures.
pub async fn switch(ctx: &Ctx<'_>) -> Result<StepOutcome> {
    match ctx.sessions.cycle_default(ctx.user).await? {
        Some(account) => Ok(StepOutcome::complete(vec![Render::message(
            texts::logged_in_as(&account.msisdn()),
        )])),
        None => register::begin(ctx).await,
    }
}
