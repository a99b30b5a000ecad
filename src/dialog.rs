//! Per-user wizard step state machine.
//!
//! Every multi-turn flow (register, recharge, SMS) is a chain of named
//! steps. A user has at most one pending step at any instant; registering a
//! new one silently replaces the old. The slot is externally inspectable
//! and settable because steps can be resumed from a button press as well as
//! from the next text message. Steps left untouched for the configured TTL
//! are evicted, which cancels abandoned wizards without a sweeper.

use crate::actions::{RechargeMethod, RechargeTarget};
use crate::render::Render;
use crate::storage::UserId;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reserved cancel input, recognized at every step of every wizard.
pub const CANCEL_LABEL: &str = "❌ Cancel";

/// A named wizard step awaiting the user's next input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Awaiting the number to register
    RegisterMsisdn,
    /// Awaiting the OTP code
    RegisterOtp,
    /// Awaiting the number to recharge for someone else
    RechargeDestination {
        /// Payment method chosen before the destination
        method: RechargeMethod,
    },
    /// Awaiting a scratch-card pin
    RechargePin {
        /// Whose number is recharged
        target: RechargeTarget,
    },
    /// Awaiting an online recharge amount
    RechargeAmount {
        /// Whose number is recharged
        target: RechargeTarget,
    },
    /// Awaiting the SMS destination number
    SmsDestination {
        /// Free daily quota vs paid
        free: bool,
    },
    /// Awaiting the SMS text
    SmsText {
        /// Free daily quota vs paid
        free: bool,
    },
}

/// The single-slot pending state of one user's wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStep {
    /// Handler to run on the next input
    pub step: Step,
    /// Context chained from the previous step (e.g. a destination number)
    pub context: Option<String>,
}

/// What a step handler decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Register a new pending step and wait for the next input
    Next {
        /// The step to run next
        step: Step,
        /// Context to hand to it
        context: Option<String>,
    },
    /// The wizard finished (or this was a one-shot action)
    Complete,
    /// The wizard was cancelled by the reserved input
    Cancelled,
}

/// A step handler's renders plus its transition.
#[derive(Debug)]
pub struct StepOutcome {
    /// What to show the user
    pub replies: Vec<Render>,
    /// How the wizard proceeds
    pub flow: Flow,
}

impl StepOutcome {
    /// Finish (or stay out of) the wizard with the given replies.
    #[must_use]
    pub fn complete(replies: Vec<Render>) -> Self {
        Self {
            replies,
            flow: Flow::Complete,
        }
    }

    /// Move the wizard to `step`, carrying `context`.
    #[must_use]
    pub fn next(replies: Vec<Render>, step: Step, context: Option<String>) -> Self {
        Self {
            replies,
            flow: Flow::Next { step, context },
        }
    }

    /// Leave the wizard via the cancel path.
    #[must_use]
    pub fn cancelled(replies: Vec<Render>) -> Self {
        Self {
            replies,
            flow: Flow::Cancelled,
        }
    }
}

/// The per-user pending-step registry.
pub struct DialogEngine {
    pending: Cache<i64, PendingStep>,
}

impl DialogEngine {
    /// Create an engine whose pending steps expire after `ttl` of
    /// inactivity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let pending = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(ttl)
            .build();
        Self { pending }
    }

    /// Register `step` as the user's pending step, replacing any previous
    /// one.
    pub async fn begin(&self, user: UserId, step: Step, context: Option<String>) {
        self.pending
            .insert(user.0, PendingStep { step, context })
            .await;
    }

    /// Remove and return the pending step, if any.
    pub async fn take(&self, user: UserId) -> Option<PendingStep> {
        let pending = self.pending.get(&user.0).await;
        if pending.is_some() {
            self.pending.invalidate(&user.0).await;
        }
        pending
    }

    /// Inspect the pending step without consuming it.
    pub async fn peek(&self, user: UserId) -> Option<PendingStep> {
        self.pending.get(&user.0).await
    }

    /// Drop the pending step, if any.
    pub async fn clear(&self, user: UserId) {
        self.pending.invalidate(&user.0).await;
    }

    /// Is this input the reserved cancel value?
    #[must_use]
    pub fn is_cancel(text: &str) -> bool {
        let text = text.trim();
        text == CANCEL_LABEL || text.eq_ignore_ascii_case("/cancel")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DialogEngine {
        DialogEngine::new(Duration::from_secs(900))
    }

    #[tokio::test]
    async fn at_most_one_pending_step_per_user() {
        let dialog = engine();
        let user = UserId(1);

        dialog.begin(user, Step::RegisterMsisdn, None).await;
        dialog
            .begin(user, Step::SmsDestination { free: true }, None)
            .await;

        let pending = dialog.peek(user).await.expect("slot occupied");
        assert_eq!(pending.step, Step::SmsDestination { free: true });

        // take drains the single slot
        assert!(dialog.take(user).await.is_some());
        assert!(dialog.take(user).await.is_none());
    }

    #[tokio::test]
    async fn slots_are_scoped_per_user() {
        let dialog = engine();
        dialog.begin(UserId(1), Step::RegisterOtp, None).await;

        assert!(dialog.peek(UserId(2)).await.is_none());
        assert!(dialog.peek(UserId(1)).await.is_some());
    }

    #[tokio::test]
    async fn abandoned_steps_expire() {
        let dialog = DialogEngine::new(Duration::from_millis(20));
        let user = UserId(3);
        dialog.begin(user, Step::RegisterMsisdn, None).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(dialog.peek(user).await.is_none());
    }

    #[test]
    fn cancel_is_recognized_in_both_spellings() {
        assert!(DialogEngine::is_cancel("❌ Cancel"));
        assert!(DialogEngine::is_cancel("/cancel"));
        assert!(DialogEngine::is_cancel(" /CANCEL "));
        assert!(!DialogEngine::is_cancel("cancel my plan"));
        assert!(!DialogEngine::is_cancel("9801234567"));
    }
}
