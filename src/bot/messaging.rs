//! Render delivery.
//!
//! Turns the core's [`Render`] values into Telegram sends and edits, with
//! automatic retry on transient network failures and graceful degradation
//! on the expected edit errors ("message is not modified", "message to
//! edit not found").

use crate::render::{Button, Keyboard, Render};
use crate::utils::retry_telegram_operation;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
    ParseMode, ReplyMarkup,
};
use tracing::{debug, warn};

fn inline_markup(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.token()))
            .collect::<Vec<_>>()
    }))
}

fn reply_keyboard(rows: &[Vec<String>]) -> KeyboardMarkup {
    KeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|label| KeyboardButton::new(label.as_str()))
            .collect::<Vec<_>>()
    }))
    .resize_keyboard()
}

/// Deliver non-notice renders to a chat. Notices are popup answers to a
/// callback query and are handled by the endpoint that owns the query id.
///
/// # Errors
///
/// Returns an error when a send fails after all retries.
pub async fn deliver(bot: &Bot, chat_id: ChatId, renders: Vec<Render>) -> Result<()> {
    for render in renders {
        match render.edits {
            Some(message_id) => {
                edit_safe(bot, chat_id, MessageId(message_id), &render).await;
            }
            None => send(bot, chat_id, &render).await?,
        }
    }
    Ok(())
}

async fn send(bot: &Bot, chat_id: ChatId, render: &Render) -> Result<()> {
    retry_telegram_operation(|| async {
        let mut request = bot
            .send_message(chat_id, render.text.clone())
            .parse_mode(ParseMode::Html);
        request = match &render.keyboard {
            Some(Keyboard::Inline(rows)) => {
                request.reply_markup(ReplyMarkup::InlineKeyboard(inline_markup(rows)))
            }
            Some(Keyboard::Reply(rows)) => {
                request.reply_markup(ReplyMarkup::Keyboard(reply_keyboard(rows)))
            }
            None => request,
        };
        request
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await?;
    Ok(())
}

/// Edit in place; downgrade the expected edit failures to a debug log
/// instead of erroring, since stale edits are routine with button
/// navigation.
async fn edit_safe(bot: &Bot, chat_id: ChatId, message_id: MessageId, render: &Render) {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    let result = retry_telegram_operation(|| async {
        let mut request = bot
            .edit_message_text(chat_id, message_id, render.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(Keyboard::Inline(rows)) = &render.keyboard {
            request = request.reply_markup(inline_markup(rows));
        }
        request
            .await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await;

    if let Err(e) = result {
        let message = e.to_string();
        if message.contains(ERROR_NOT_MODIFIED) || message.contains(ERROR_NOT_FOUND) {
            debug!("Message edit skipped: {message}");
        } else {
            warn!("Failed to edit message after retries: {e}");
        }
    }
}
