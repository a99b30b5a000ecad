//! Render requests emitted by the core.
//!
//! Flow handlers never talk to Telegram. They return `Render` values and the
//! transport layer in `bot` turns them into sends, edits or callback
//! answers.

use crate::actions::Action;

/// A single inline button bound to an action token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label
    pub label: String,
    /// Action encoded into the callback payload
    pub action: Action,
}

impl Button {
    /// Build a button from a label and action.
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Inline buttons under the message
    Inline(Vec<Vec<Button>>),
    /// Persistent reply keyboard (rows of plain labels)
    Reply(Vec<Vec<String>>),
}

/// One outbound response unit.
///
/// `edits` carries the id of the message a button press came from when the
/// response should replace that message in place. `notice` marks short
/// popup answers to a button press instead of a full message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Render {
    /// Message text (Telegram HTML)
    pub text: String,
    /// Optional keyboard
    pub keyboard: Option<Keyboard>,
    /// Edit this message instead of sending a new one
    pub edits: Option<i32>,
    /// Render as a callback alert rather than a message
    pub notice: bool,
}

impl Render {
    /// A plain outbound message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            edits: None,
            notice: false,
        }
    }

    /// A short popup notice (callback answer).
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            edits: None,
            notice: true,
        }
    }

    /// Attach an inline keyboard.
    #[must_use]
    pub fn with_buttons(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.keyboard = Some(Keyboard::Inline(rows));
        self
    }

    /// Attach a persistent reply keyboard.
    #[must_use]
    pub fn with_reply_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
        self.keyboard = Some(Keyboard::Reply(rows));
        self
    }

    /// Turn the render into an in-place edit of `message_id`.
    #[must_use]
    pub const fn editing(mut self, message_id: i32) -> Self {
        self.edits = Some(message_id);
        self
    }
}
