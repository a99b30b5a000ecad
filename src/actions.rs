//! Compact action tokens carried in inline-button payloads.
//!
//! Telegram callback payloads are limited to 64 bytes, so interactive
//! choices are encoded as short colon-delimited tokens. Command identity is
//! resolved from the segment before the first colon; parameter tails are
//! split with `splitn` bounded by the command's arity so the final,
//! free-form parameter (an msisdn, a subscription code) may itself contain
//! colons. Decoding an unknown command yields `None`: buttons on old
//! messages outlive the code that produced them and pressing one must not
//! be an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decoding failed for a token whose command is known.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The command was recognized but its parameters do not parse
    #[error("malformed action token: {token}")]
    Malformed {
        /// The offending token, verbatim
        token: String,
    },
}

/// Which view of the accounts menu is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountsMode {
    /// Tapping an account makes it the default
    Select,
    /// Tapping an account unlinks it
    Remove,
}

/// Whose number a recharge is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RechargeTarget {
    /// The default account's own number
    Own,
    /// A number the user enters
    Other,
}

/// How a recharge is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RechargeMethod {
    /// Scratch-card pin
    Pin,
    /// Online payment link
    Online,
}

/// Product catalogue family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Data packs
    Data,
    /// Voice and SMS packs
    Voice,
    /// Value-added services
    Vas,
}

/// Why a plan button is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    /// The product does not allow self-deactivation
    DeactivationNotAllowed,
    /// Balance is too low to subscribe
    InsufficientBalance,
}

/// Every command a button can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Dismiss the current interactive message
    Cancel,
    /// Show the accounts list in the given mode
    AccountsMenu(AccountsMode),
    /// Make an account the default
    SelectAccount {
        /// Store-assigned account id
        account_id: u32,
        /// Display msisdn (free-form, encoded last)
        msisdn: String,
    },
    /// Unlink an account
    RemoveAccount {
        /// Store-assigned account id
        account_id: u32,
        /// Display msisdn (free-form, encoded last)
        msisdn: String,
    },
    /// Start registration from the accounts menu
    AddAccount,
    /// Re-send the OTP to the stored number
    ResendOtp,
    /// Prompt for the OTP again
    ReenterOtp,
    /// Restart registration with a different number
    ChangeNumber,
    /// Back to the recharge target menu
    RechargeMenu,
    /// Show pin/online choices for a target
    RechargeMethodMenu(RechargeTarget),
    /// Begin a recharge wizard
    RechargeStart {
        /// Whose number
        target: RechargeTarget,
        /// Payment method
        method: RechargeMethod,
    },
    /// Show the loan confirmation prompt
    ConfirmLoan,
    /// Take the loan
    TakeLoan,
    /// Back to the balance view
    ViewBalance,
    /// Begin an SMS wizard
    SmsStart {
        /// Free daily quota vs paid
        free: bool,
    },
    /// Plan category menu
    PlansMenu,
    /// Currently subscribed products
    SubscribedPlans,
    /// Data subcategory menu
    DataPlansMenu,
    /// Product list for a category
    PlanList {
        /// Catalogue family
        kind: PlanKind,
        /// Carrier category id
        category: String,
    },
    /// Details for one listed product
    ProductInfo {
        /// Catalogue family (for the back button)
        kind: PlanKind,
        /// Carrier category id (for the back button)
        category: String,
        /// Product id (free-form, encoded last)
        product_id: String,
    },
    /// Details for one subscribed product
    SubscribedProductInfo {
        /// Product id
        product_id: String,
    },
    /// Subscribe to a product
    Activate {
        /// Subscription code (free-form, whole tail)
        code: String,
    },
    /// Unsubscribe from a product
    Deactivate {
        /// Subscription code (free-form, whole tail)
        code: String,
    },
    /// Explain why a plan button does nothing
    Locked(LockReason),
}

impl Action {
    /// Encode into the compact token carried by the button payload.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Cancel => "cancel".to_string(),
            Self::AccountsMenu(AccountsMode::Select) => "accounts:select".to_string(),
            Self::AccountsMenu(AccountsMode::Remove) => "accounts:remove".to_string(),
            Self::SelectAccount { account_id, msisdn } => {
                format!("acct.sel:{account_id}:{msisdn}")
            }
            Self::RemoveAccount { account_id, msisdn } => {
                format!("acct.rm:{account_id}:{msisdn}")
            }
            Self::AddAccount => "acct.add".to_string(),
            Self::ResendOtp => "otp.resend".to_string(),
            Self::ReenterOtp => "otp.reenter".to_string(),
            Self::ChangeNumber => "reg.change".to_string(),
            Self::RechargeMenu => "rch.menu".to_string(),
            Self::RechargeMethodMenu(target) => format!("rch.target:{}", target_tag(*target)),
            Self::RechargeStart { target, method } => {
                format!("rch.go:{}:{}", target_tag(*target), method_tag(*method))
            }
            Self::ConfirmLoan => "loan.confirm".to_string(),
            Self::TakeLoan => "loan.take".to_string(),
            Self::ViewBalance => "bal.view".to_string(),
            Self::SmsStart { free } => {
                format!("sms.go:{}", if *free { "free" } else { "paid" })
            }
            Self::PlansMenu => "plans.menu".to_string(),
            Self::SubscribedPlans => "plans.subscribed".to_string(),
            Self::DataPlansMenu => "plans.data".to_string(),
            Self::PlanList { kind, category } => {
                format!("plans.list:{}:{category}", kind_tag(*kind))
            }
            Self::ProductInfo {
                kind,
                category,
                product_id,
            } => format!("plan.info:{}:{category}:{product_id}", kind_tag(*kind)),
            Self::SubscribedProductInfo { product_id } => format!("plan.mine:{product_id}"),
            Self::Activate { code } => format!("plan.on:{code}"),
            Self::Deactivate { code } => format!("plan.off:{code}"),
            Self::Locked(LockReason::DeactivationNotAllowed) => "plan.locked:deact".to_string(),
            Self::Locked(LockReason::InsufficientBalance) => "plan.locked:balance".to_string(),
        }
    }

    /// Decode a callback payload.
    ///
    /// Returns `Ok(None)` when the command prefix is unknown: stale buttons
    /// from previously rendered messages are tolerated as silent no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Malformed`] when the command is known but its
    /// parameters do not parse. That indicates a token this code never
    /// produced, which is a programmer error, not user input.
    pub fn decode(token: &str) -> Result<Option<Self>, ActionError> {
        let malformed = || ActionError::Malformed {
            token: token.to_string(),
        };
        let (head, tail) = match token.split_once(':') {
            Some((head, tail)) => (head, Some(tail)),
            None => (token, None),
        };

        let action = match head {
            "cancel" => Self::Cancel,
            "accounts" => match tail {
                Some("select") => Self::AccountsMenu(AccountsMode::Select),
                Some("remove") => Self::AccountsMenu(AccountsMode::Remove),
                _ => return Err(malformed()),
            },
            "acct.sel" | "acct.rm" => {
                let tail = tail.ok_or_else(malformed)?;
                let (id, msisdn) = tail.split_once(':').ok_or_else(malformed)?;
                let account_id = id.parse::<u32>().map_err(|_| malformed())?;
                let msisdn = msisdn.to_string();
                if head == "acct.sel" {
                    Self::SelectAccount { account_id, msisdn }
                } else {
                    Self::RemoveAccount { account_id, msisdn }
                }
            }
            "acct.add" => Self::AddAccount,
            "otp.resend" => Self::ResendOtp,
            "otp.reenter" => Self::ReenterOtp,
            "reg.change" => Self::ChangeNumber,
            "rch.menu" => Self::RechargeMenu,
            "rch.target" => {
                Self::RechargeMethodMenu(parse_target(tail.ok_or_else(malformed)?).ok_or_else(malformed)?)
            }
            "rch.go" => {
                let tail = tail.ok_or_else(malformed)?;
                let (target, method) = tail.split_once(':').ok_or_else(malformed)?;
                Self::RechargeStart {
                    target: parse_target(target).ok_or_else(malformed)?,
                    method: parse_method(method).ok_or_else(malformed)?,
                }
            }
            "loan.confirm" => Self::ConfirmLoan,
            "loan.take" => Self::TakeLoan,
            "bal.view" => Self::ViewBalance,
            "sms.go" => match tail {
                Some("free") => Self::SmsStart { free: true },
                Some("paid") => Self::SmsStart { free: false },
                _ => return Err(malformed()),
            },
            "plans.menu" => Self::PlansMenu,
            "plans.subscribed" => Self::SubscribedPlans,
            "plans.data" => Self::DataPlansMenu,
            "plans.list" => {
                let tail = tail.ok_or_else(malformed)?;
                let (kind, category) = tail.split_once(':').ok_or_else(malformed)?;
                Self::PlanList {
                    kind: parse_kind(kind).ok_or_else(malformed)?,
                    category: category.to_string(),
                }
            }
            "plan.info" => {
                let tail = tail.ok_or_else(malformed)?;
                let mut parts = tail.splitn(3, ':');
                let kind = parts.next().and_then(parse_kind).ok_or_else(malformed)?;
                let category = parts.next().ok_or_else(malformed)?.to_string();
                let product_id = parts.next().ok_or_else(malformed)?.to_string();
                Self::ProductInfo {
                    kind,
                    category,
                    product_id,
                }
            }
            "plan.mine" => Self::SubscribedProductInfo {
                product_id: tail.ok_or_else(malformed)?.to_string(),
            },
            "plan.on" => Self::Activate {
                code: tail.ok_or_else(malformed)?.to_string(),
            },
            "plan.off" => Self::Deactivate {
                code: tail.ok_or_else(malformed)?.to_string(),
            },
            "plan.locked" => match tail {
                Some("deact") => Self::Locked(LockReason::DeactivationNotAllowed),
                Some("balance") => Self::Locked(LockReason::InsufficientBalance),
                _ => return Err(malformed()),
            },
            _ => return Ok(None),
        };

        Ok(Some(action))
    }
}

const fn target_tag(target: RechargeTarget) -> &'static str {
    match target {
        RechargeTarget::Own => "own",
        RechargeTarget::Other => "other",
    }
}

const fn method_tag(method: RechargeMethod) -> &'static str {
    match method {
        RechargeMethod::Pin => "pin",
        RechargeMethod::Online => "online",
    }
}

const fn kind_tag(kind: PlanKind) -> &'static str {
    match kind {
        PlanKind::Data => "data",
        PlanKind::Voice => "voice",
        PlanKind::Vas => "vas",
    }
}

fn parse_target(s: &str) -> Option<RechargeTarget> {
    match s {
        "own" => Some(RechargeTarget::Own),
        "other" => Some(RechargeTarget::Other),
        _ => None,
    }
}

fn parse_method(s: &str) -> Option<RechargeMethod> {
    match s {
        "pin" => Some(RechargeMethod::Pin),
        "online" => Some(RechargeMethod::Online),
        _ => None,
    }
}

fn parse_kind(s: &str) -> Option<PlanKind> {
    match s {
        "data" => Some(PlanKind::Data),
        "voice" => Some(PlanKind::Voice),
        "vas" => Some(PlanKind::Vas),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips() {
        let actions = [
            Action::Cancel,
            Action::AccountsMenu(AccountsMode::Remove),
            Action::SelectAccount {
                account_id: 7,
                msisdn: "9801234567".to_string(),
            },
            Action::RechargeStart {
                target: RechargeTarget::Other,
                method: RechargeMethod::Online,
            },
            Action::SmsStart { free: true },
            Action::PlanList {
                kind: PlanKind::Data,
                category: "34".to_string(),
            },
            Action::ProductInfo {
                kind: PlanKind::Voice,
                category: "12".to_string(),
                product_id: "P:77".to_string(),
            },
            Action::Activate {
                code: "SUB:01:XL".to_string(),
            },
        ];
        for action in actions {
            let decoded = Action::decode(&action.token())
                .expect("well-formed")
                .expect("known command");
            assert_eq!(decoded, action);
        }
    }

    #[test]
    fn select_account_tolerates_delimiters_in_msisdn() {
        // The account id decodes intact even when the trailing display
        // parameter contains colon sequences of its own.
        let decoded = Action::decode("acct.sel:123:98:01:23")
            .expect("well-formed")
            .expect("known command");
        assert_eq!(
            decoded,
            Action::SelectAccount {
                account_id: 123,
                msisdn: "98:01:23".to_string(),
            }
        );
    }

    #[test]
    fn subscription_code_keeps_whole_tail() {
        let decoded = Action::decode("plan.off:CODE:WITH:COLONS")
            .expect("well-formed")
            .expect("known command");
        assert_eq!(
            decoded,
            Action::Deactivate {
                code: "CODE:WITH:COLONS".to_string(),
            }
        );
    }

    #[test]
    fn unknown_command_is_silent() {
        assert_eq!(Action::decode("cb_legacyButton:1"), Ok(None));
        assert_eq!(Action::decode(""), Ok(None));
    }

    #[test]
    fn malformed_known_command_is_an_error() {
        assert!(Action::decode("acct.sel:notanumber:98").is_err());
        assert!(Action::decode("rch.go:own").is_err());
        assert!(Action::decode("accounts:whatever").is_err());
    }
}
