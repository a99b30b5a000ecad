//! Feature flow handlers.
//!
//! One module per user-visible feature. Flows receive a per-request
//! [`Ctx`], call the carrier through it, classify the reply and return
//! renders plus a wizard transition. They never touch the transport.

/// Linked-account management
pub mod accounts;
/// Balance view
pub mod balance;
/// Credit loans
pub mod loan;
/// Main menu, greetings and static texts
pub mod menu;
/// Plan browsing and (de)subscription
pub mod plans;
/// Subscriber profile
pub mod profile;
/// Recharge wizards
pub mod recharge;
/// Account registration wizard
pub mod register;
/// SMS wizards
pub mod sms;

use crate::actions::Action;
use crate::carrier::classify::{classify, Operation, Outcome};
use crate::carrier::CarrierReply;
use crate::dialog::{PendingStep, Step, StepOutcome};
use crate::engine::Ctx;
use crate::render::Render;
use crate::storage::LinkedAccount;
use crate::texts;
use anyhow::Result;
use lazy_regex::regex_is_match;
use tracing::error;

/// Route a pending wizard step's input to its handler.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn run_step(ctx: &Ctx<'_>, pending: PendingStep, text: &str) -> Result<StepOutcome> {
    match pending.step {
        Step::RegisterMsisdn => register::submit_msisdn(ctx, text).await,
        Step::RegisterOtp => register::submit_otp(ctx, text).await,
        Step::RechargeDestination { method } => Ok(recharge::submit_destination(method, text)),
        Step::RechargePin { target } => {
            recharge::submit_pin(ctx, target, pending.context, text).await
        }
        Step::RechargeAmount { target } => {
            recharge::submit_amount(ctx, target, pending.context, text).await
        }
        Step::SmsDestination { free } => Ok(sms::submit_destination(free, text)),
        Step::SmsText { free } => sms::submit_text(ctx, free, pending.context, text).await,
    }
}

/// Route free text (menu labels and slash commands) outside any wizard.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn dispatch_text(ctx: &Ctx<'_>, first_name: &str, text: &str) -> Result<StepOutcome> {
    use crate::texts::labels;

    let trimmed = text.trim();
    // "/balance@MyBot" arrives in groups; the suffix is noise here
    let command = trimmed.split('@').next().unwrap_or(trimmed);

    match command {
        "/start" => menu::start(ctx, first_name).await,
        "/ping" => Ok(StepOutcome::complete(vec![Render::message(texts::PONG)])),
        x if x == labels::REGISTER || x == "/register" => register::begin(ctx).await,
        x if x == labels::BALANCE || x == "/balance" => balance::view(ctx, None).await,
        x if x == labels::RECHARGE || x == "/recharge" => recharge::target_menu(ctx, None).await,
        "/selfrecharge" => {
            recharge::method_menu(ctx, crate::actions::RechargeTarget::Own, None).await
        }
        "/rechargeothers" => {
            recharge::method_menu(ctx, crate::actions::RechargeTarget::Other, None).await
        }
        x if x == labels::SMS || x == "/sms" => sms::type_menu(ctx, None).await,
        "/freesms" => sms::begin(ctx, true, None).await,
        "/paidsms" => sms::begin(ctx, false, None).await,
        x if x == labels::PLANS || x == "/plans" => plans::menu(ctx, None).await,
        x if x == labels::ACCOUNTS || x == "/accounts" => {
            accounts::menu(ctx, crate::actions::AccountsMode::Select, None).await
        }
        x if x == labels::SWITCH || x == "/switch" => accounts::switch(ctx).await,
        x if x == labels::PROFILE || x == "/profile" => profile::view(ctx).await,
        "/loan" => loan::confirm(ctx, None).await,
        x if x == labels::SETTINGS || x == "/settings" => {
            Ok(StepOutcome::complete(vec![Render::message(
                texts::SETTINGS_MENU,
            )]))
        }
        x if x == labels::HELP || x == "/help" => {
            Ok(StepOutcome::complete(vec![Render::message(texts::HELP_MENU)]))
        }
        x if x == labels::SUPPORT || x == "/support" => Ok(StepOutcome::complete(vec![
            Render::message(texts::SUPPORT_MENU),
        ])),
        _ => Ok(StepOutcome::complete(vec![Render::message(
            texts::HELP_MENU,
        )])),
    }
}

/// Route a decoded button action to its handler.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn dispatch_action(
    ctx: &Ctx<'_>,
    action: Action,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    match action {
        Action::Cancel => {
            // Global Idle transition: a cancel button ends any wizard too
            ctx.dialog.clear(ctx.user).await;
            let render = match message_id {
                Some(id) => Render::message(texts::CANCELLED).editing(id),
                None => Render::message(texts::CANCELLED),
            };
            Ok(StepOutcome::complete(vec![render]))
        }
        Action::AccountsMenu(mode) => accounts::menu(ctx, mode, message_id).await,
        Action::SelectAccount { account_id, msisdn } => {
            accounts::select(ctx, account_id, &msisdn, message_id).await
        }
        Action::RemoveAccount { account_id, msisdn } => {
            accounts::remove(ctx, account_id, &msisdn, message_id).await
        }
        Action::AddAccount => register::begin(ctx).await,
        Action::ResendOtp => register::resend_otp(ctx).await,
        Action::ReenterOtp => register::reenter_otp(ctx, message_id).await,
        Action::ChangeNumber => register::change_number(ctx, message_id).await,
        Action::RechargeMenu => recharge::target_menu(ctx, message_id).await,
        Action::RechargeMethodMenu(target) => recharge::method_menu(ctx, target, message_id).await,
        Action::RechargeStart { target, method } => {
            recharge::start(ctx, target, method).await
        }
        Action::ConfirmLoan => loan::confirm(ctx, message_id).await,
        Action::TakeLoan => loan::take(ctx).await,
        Action::ViewBalance => balance::view(ctx, message_id).await,
        Action::SmsStart { free } => sms::begin(ctx, free, message_id).await,
        Action::PlansMenu => plans::menu(ctx, message_id).await,
        Action::SubscribedPlans => plans::subscribed(ctx, message_id).await,
        Action::DataPlansMenu => Ok(plans::data_menu(message_id)),
        Action::PlanList { kind, category } => {
            plans::list(ctx, kind, &category, message_id).await
        }
        Action::ProductInfo {
            kind,
            category,
            product_id,
        } => plans::product_info(ctx, kind, &category, &product_id, message_id).await,
        Action::SubscribedProductInfo { product_id } => {
            plans::subscribed_product_info(ctx, &product_id, message_id).await
        }
        Action::Activate { code } => plans::activate(ctx, &code).await,
        Action::Deactivate { code } => plans::deactivate(ctx, &code).await,
        Action::Locked(reason) => Ok(plans::locked(reason)),
    }
}

/// Does this look like a subscriber number on this network?
#[must_use]
pub fn is_msisdn(text: &str) -> bool {
    regex_is_match!(r"^9[678]\d{8}$", text)
}

/// Either the default account, or the renders that send the user to
/// registration instead.
pub(crate) enum AccountGate {
    /// Proceed with this account
    Linked(LinkedAccount),
    /// No account; the registration wizard was started
    Missing(StepOutcome),
}

/// Operations that need an account fall back to registration when none is
/// linked, mirroring how every menu entry behaves.
pub(crate) async fn require_account(ctx: &Ctx<'_>) -> Result<AccountGate> {
    match ctx.sessions.default_account(ctx.user).await? {
        Some(account) => Ok(AccountGate::Linked(account)),
        None => Ok(AccountGate::Missing(register::begin(ctx).await?)),
    }
}

/// A settled carrier reply: either an outcome for the flow to interpret, or
/// the finished session-expired response.
pub(crate) enum Resolved {
    /// Classifier outcome for flow-specific handling
    Settled(Settled),
    /// Session expiry already routed through the invalidation choke point
    Expired(StepOutcome),
}

/// [`Outcome`] minus session expiry, which `resolve` always handles itself.
pub(crate) enum Settled {
    /// Operation succeeded
    Success(serde_json::Value),
    /// Expected business rejection
    Domain(crate::carrier::classify::DomainFailure),
    /// Unrecognized response
    Unknown {
        /// Original carrier description
        description: String,
        /// HTTP status of the call
        status_code: u16,
    },
}

/// Settle a token-bearing carrier reply.
///
/// Persists a rotated token, then classifies. Every `SessionExpired`
/// outcome in the system funnels through here into
/// `SessionManager::invalidate_session`, so expiry handling is uniform:
/// account removed, pointer unset, wizard dropped, re-registration prompt
/// rendered.
pub(crate) async fn resolve(
    ctx: &Ctx<'_>,
    account: &LinkedAccount,
    op: Operation,
    reply: CarrierReply,
) -> Result<Resolved> {
    if let Some(token) = reply.refreshed {
        ctx.sessions
            .store_refreshed(ctx.user, account.id, token)
            .await?;
    }

    match classify(op, &reply.response) {
        Outcome::SessionExpired(reason) => {
            ctx.sessions.invalidate_session(ctx.user, reason).await?;
            ctx.dialog.clear(ctx.user).await;
            let render = Render::message(texts::session_expired(reason))
                .with_reply_keyboard(menu::main_keyboard(ctx).await?);
            Ok(Resolved::Expired(StepOutcome::complete(vec![render])))
        }
        Outcome::Success(payload) => Ok(Resolved::Settled(Settled::Success(payload))),
        Outcome::Domain(failure) => Ok(Resolved::Settled(Settled::Domain(failure))),
        Outcome::Unknown {
            description,
            status_code,
        } => Ok(Resolved::Settled(Settled::Unknown {
            description,
            status_code,
        })),
    }
}

/// Render an unrecognized carrier response, logging it verbatim for
/// diagnosis.
pub(crate) fn render_unknown(description: &str, status_code: u16, notice: bool) -> Render {
    error!("Unclassified carrier response (status {status_code}): {description}");
    if notice {
        Render::notice(texts::unknown_error(description, status_code))
    } else {
        Render::message(texts::unknown_error(description, status_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_shapes() {
        assert!(is_msisdn("9801234567"));
        assert!(is_msisdn("9612345678"));
        assert!(!is_msisdn("980123456"));
        assert!(!is_msisdn("98012345678"));
        assert!(!is_msisdn("9901234567"));
        assert!(!is_msisdn("98O1234567"));
    }
}
