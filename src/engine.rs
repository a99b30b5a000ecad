//! Event orchestration.
//!
//! [`App`] owns the long-lived components and drives one inbound event at a
//! time per user: acquire the user's gate, resolve identity, let the dialog
//! engine or action router pick a handler, apply the wizard transition and
//! hand the renders back to the transport. No Telegram I/O happens under
//! the gate: renders are values, delivered after release.

use crate::carrier::CarrierApi;
use crate::dialog::{DialogEngine, Flow, StepOutcome};
use crate::flows;
use crate::gate::UserGate;
use crate::render::Render;
use crate::session::SessionManager;
use crate::storage::{AccountStore, UserId};
use crate::texts;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// An inbound chat event, reduced to what the core consumes.
#[derive(Debug, Clone)]
pub struct Event {
    /// Platform-assigned numeric chat id
    pub chat_id: i64,
    /// Sender's display name, for greetings
    pub first_name: String,
    /// What happened
    pub kind: EventKind,
}

/// The two event shapes the core understands.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// A text message
    Text(String),
    /// An inline-button press
    Button {
        /// Encoded action token from the payload
        token: String,
        /// Message the button was attached to
        message_id: Option<i32>,
    },
}

/// Per-request context handed into every handler.
///
/// Replaces ambient singletons: each handler sees exactly the user it is
/// serving and the collaborators it may touch.
pub struct Ctx<'a> {
    /// The user this request belongs to
    pub user: UserId,
    /// Persistent account store
    pub store: &'a dyn AccountStore,
    /// Carrier API
    pub carrier: &'a dyn CarrierApi,
    /// Default-account bookkeeping
    pub sessions: &'a SessionManager,
    /// Wizard state machine
    pub dialog: &'a DialogEngine,
}

/// The long-lived application core.
pub struct App {
    store: Arc<dyn AccountStore>,
    carrier: Arc<dyn CarrierApi>,
    sessions: SessionManager,
    dialog: DialogEngine,
    gate: UserGate,
}

impl App {
    /// Assemble the core from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        carrier: Arc<dyn CarrierApi>,
        wizard_ttl: Duration,
    ) -> Self {
        Self {
            sessions: SessionManager::new(store.clone()),
            store,
            carrier,
            dialog: DialogEngine::new(wizard_ttl),
            gate: UserGate::new(),
        }
    }

    /// The wizard state machine, for inspection.
    #[must_use]
    pub const fn dialog(&self) -> &DialogEngine {
        &self.dialog
    }

    /// The session manager, for inspection.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one inbound event and return what to show the user.
    ///
    /// Never fails: carrier/store failures become a generic unavailable
    /// message, everything else is logged. Events for the same user
    /// serialize on the per-user gate.
    pub async fn handle_event(&self, event: Event) -> Vec<Render> {
        let _guard = self.gate.acquire(UserId(event.chat_id)).await;

        match self.dispatch(event).await {
            Ok(replies) => replies,
            Err(e) => {
                error!("Event handling failed: {e:#}");
                vec![Render::message(texts::SERVICE_UNAVAILABLE)]
            }
        }
    }

    async fn dispatch(&self, event: Event) -> Result<Vec<Render>> {
        let user = self.store.get_or_create_user(event.chat_id).await?;
        let ctx = Ctx {
            user,
            store: self.store.as_ref(),
            carrier: self.carrier.as_ref(),
            sessions: &self.sessions,
            dialog: &self.dialog,
        };

        let outcome = match event.kind {
            EventKind::Text(text) => self.on_text(&ctx, &event.first_name, &text).await?,
            EventKind::Button { token, message_id } => {
                self.on_button(&ctx, &token, message_id).await?
            }
        };

        // Apply the wizard transition the handler decided on. The slot was
        // already taken on the text path, so Complete/Cancelled need no
        // extra work, and a button-driven Next replaces whatever was
        // pending, per the single-slot rule.
        if let Flow::Next { step, context } = outcome.flow {
            ctx.dialog.begin(user, step, context).await;
        }

        Ok(outcome.replies)
    }

    async fn on_text(
        &self,
        ctx: &Ctx<'_>,
        first_name: &str,
        text: &str,
    ) -> Result<StepOutcome> {
        if let Some(pending) = ctx.dialog.take(ctx.user).await {
            // Cancel is recognized before any step handler runs
            if DialogEngine::is_cancel(text) {
                info!("User {} cancelled a wizard at {:?}", ctx.user, pending.step);
                return flows::menu::cancelled(ctx).await;
            }
            return flows::run_step(ctx, pending, text).await;
        }

        if DialogEngine::is_cancel(text) {
            // Nothing pending; still acknowledge
            return flows::menu::cancelled(ctx).await;
        }

        flows::dispatch_text(ctx, first_name, text).await
    }

    async fn on_button(
        &self,
        ctx: &Ctx<'_>,
        token: &str,
        message_id: Option<i32>,
    ) -> Result<StepOutcome> {
        let Some(action) = crate::actions::Action::decode(token)? else {
            // A button from a message rendered by an older version; ignore
            info!(
                "Ignoring unknown action token '{}' from user {}",
                crate::utils::truncate_str(token, 32),
                ctx.user
            );
            return Ok(StepOutcome::complete(Vec::new()));
        };
        flows::dispatch_action(ctx, action, message_id).await
    }
}
