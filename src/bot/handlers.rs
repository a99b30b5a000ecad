//! Update endpoints: reduce Telegram updates to core events and deliver
//! the resulting renders.

use crate::engine::{App, Event, EventKind};
use crate::render::Render;
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::info;

use super::messaging;

/// Safe extraction of the sender id from a message.
/// Returns 0 if the user information is missing.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_user_name(msg: &Message) -> String {
    msg.from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "there".to_string())
}

/// Text message endpoint.
///
/// # Errors
///
/// Returns an error when delivery fails after retries.
pub async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let Some(text) = msg.text() else {
        // Voice notes, stickers and the like have no self-care meaning
        return Ok(());
    };
    let chat_id = get_user_id_safe(&msg);
    if chat_id == 0 {
        return Ok(());
    }

    info!("Message from user {chat_id}");
    let renders = app
        .handle_event(Event {
            chat_id,
            first_name: get_user_name(&msg),
            kind: EventKind::Text(text.to_string()),
        })
        .await;

    messaging::deliver(&bot, msg.chat.id, renders).await
}

/// Button press endpoint.
///
/// # Errors
///
/// Returns an error when delivery fails after retries.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, app: Arc<App>) -> Result<()> {
    let Some(data) = q.data.clone() else {
        let _ = bot.answer_callback_query(q.id).await;
        return Ok(());
    };

    let chat_id = q.from.id.0.cast_signed();
    let message_chat = q.message.as_ref().map(|m| m.chat().id);
    let message_id = q.message.as_ref().map(|m| m.id().0);

    let renders = app
        .handle_event(Event {
            chat_id,
            first_name: q.from.first_name.clone(),
            kind: EventKind::Button {
                token: data,
                message_id,
            },
        })
        .await;

    // The popup answer, if the flow produced one; a bare ack otherwise so
    // the button stops spinning
    let (notices, messages): (Vec<Render>, Vec<Render>) =
        renders.into_iter().partition(|render| render.notice);
    match notices.into_iter().next() {
        Some(notice) => {
            let _ = bot
                .answer_callback_query(q.id)
                .text(notice.text)
                .show_alert(true)
                .await;
        }
        None => {
            let _ = bot.answer_callback_query(q.id).await;
        }
    }

    if let Some(chat) = message_chat {
        messaging::deliver(&bot, chat, messages).await?;
    }
    Ok(())
}
