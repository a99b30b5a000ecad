//! User-facing message templates and payload formatters.
//!
//! All outbound prose lives here so flows stay free of copy. Messages use
//! Telegram HTML; anything echoed back from user input or carrier payloads
//! is escaped first.

use crate::carrier::classify::{DomainFailure, ExpiryReason};
use html_escape::encode_text;
use serde_json::Value;

/// Main-menu button labels (also accepted as typed text).
pub mod labels {
    /// Accounts menu
    pub const ACCOUNTS: &str = "👥 Accounts";
    /// Start registration
    pub const REGISTER: &str = "➕ Register";
    /// Balance view
    pub const BALANCE: &str = "💰 Balance";
    /// Recharge menu
    pub const RECHARGE: &str = "💳 Recharge";
    /// SMS menu
    pub const SMS: &str = "💬 SMS";
    /// Plans menu
    pub const PLANS: &str = "📦 Plans";
    /// Cycle the default account
    pub const SWITCH: &str = "🔃 Switch";
    /// Subscriber profile
    pub const PROFILE: &str = "🪪 Profile";
    /// Settings text
    pub const SETTINGS: &str = "⚙️ Settings";
    /// Help text
    pub const HELP: &str = "⁉️ Help";
    /// Support text
    pub const SUPPORT: &str = "🎁 Support Us";
}

/// Greeting for a returning user.
#[must_use]
pub fn greet(first_name: &str) -> String {
    format!(
        "👋 Welcome back, <b>{}</b>!\n\nPick an option from the menu below.",
        encode_text(first_name)
    )
}

/// Greeting on first contact.
#[must_use]
pub fn greet_first_time(first_name: &str) -> String {
    format!(
        "👋 Hello <b>{}</b>!\n\n\
         I connect your carrier account to this chat. Link a number with\n\
         <b>{}</b> and you can check balance, recharge, send SMS and manage\n\
         plans right here.",
        encode_text(first_name),
        labels::REGISTER
    )
}

/// Registration prompts.
pub const ENTER_NUMBER: &str = "📱 Enter the phone number to register:";
/// OTP prompt after a successful send.
pub const ENTER_OTP: &str = "🔑 An OTP has been sent to the number. Enter it here:";
/// OTP generation limit reached.
pub const OTP_SEND_EXCEEDED: &str =
    "⚠️ OTP request limit reached for this number. Try again later or enter a different number:";
/// The number is not valid on this network.
pub const INVALID_NUMBER: &str = "⚠️ That number doesn't look valid. Enter it again:";
/// Too many wrong OTP attempts.
pub const OTP_ATTEMPTS_EXCEEDED: &str =
    "⚠️ Too many wrong attempts. Request a new OTP to continue.";
/// Wrong OTP.
pub const INVALID_OTP: &str = "⚠️ That code is not correct.";
/// Expired OTP.
pub const OTP_EXPIRED: &str = "⚠️ That code has expired.";

/// Successful registration.
#[must_use]
pub fn registered(msisdn: &str) -> String {
    format!(
        "✅ <b>{}</b> is now linked to this chat.",
        encode_text(msisdn)
    )
}

/// Accounts menu header.
pub const ACCOUNTS_HEADER: &str = "👥 Your linked accounts:";
/// Shown when no account is linked yet.
pub const NO_ACCOUNTS: &str = "You have no linked account yet. Register one first.";

/// Notice when selecting the account that is already default.
#[must_use]
pub fn already_logged_in(msisdn: &str) -> String {
    format!("You are already using {msisdn}.")
}

/// Notice after the default pointer moved.
#[must_use]
pub fn logged_in_as(msisdn: &str) -> String {
    format!("✅ Now using {msisdn}.")
}

/// Notice after unlinking an account.
#[must_use]
pub fn logged_out(msisdn: &str) -> String {
    format!("👋 {msisdn} was unlinked.")
}

/// Session-expiry explanation, by reason.
#[must_use]
pub const fn session_expired(reason: ExpiryReason) -> &'static str {
    match reason {
        ExpiryReason::NewLogin => {
            "🔐 Your number was logged in from somewhere else, so this \
             session was closed. The account has been unlinked, so please \
             register it again."
        }
        ExpiryReason::Expired => {
            "🔐 Your session has expired and the account was unlinked. \
             Please register it again."
        }
    }
}

/// Generic failure that still carries the raw carrier response for support.
#[must_use]
pub fn unknown_error(description: &str, status_code: u16) -> String {
    format!(
        "🤖 The carrier returned something unexpected:\n\n<i>{}</i>\n\n\
         (status {status_code}) Please try again later or contact support \
         with this message.",
        encode_text(description)
    )
}

/// Cancel confirmation.
pub const CANCELLED: &str = "❌ Cancelled";
/// Carrier or store unreachable.
pub const SERVICE_UNAVAILABLE: &str =
    "📡 The service is unreachable right now. Please try again in a moment.";

/// SMS prompts.
pub const ENTER_DESTINATION: &str = "📱 Enter the destination number:";
/// SMS body prompt.
pub const ENTER_SMS_TEXT: &str = "💬 Enter the message text:";

/// Successful SMS confirmation.
#[must_use]
pub fn sms_sent(text: &str, msisdn: &str) -> String {
    format!(
        "✅ Sent to <b>{}</b>:\n\n<i>{}</i>",
        encode_text(msisdn),
        encode_text(text)
    )
}

/// SMS type menu.
pub const SMS_MENU: &str = "💬 Which kind of SMS?";
/// Recharge target menu.
pub const RECHARGE_TO: &str = "💳 Recharge which number?";
/// Recharge method menu.
pub const RECHARGE_METHOD: &str = "💳 How would you like to recharge?";
/// Pin prompt.
pub const ENTER_RECHARGE_PIN: &str = "🔢 Enter the 16-digit recharge pin:";
/// Amount prompt.
pub const ENTER_RECHARGE_AMOUNT: &str = "💵 Enter the recharge amount (Rs.):";
/// Recharge success.
pub const RECHARGE_SUCCESS: &str = "✅ Recharge successful!";

/// Online recharge payment link.
#[must_use]
pub fn payment_link(url: &str) -> String {
    format!("💳 <a href='{url}'>Click here</a> and complete the payment.")
}

/// Loan confirmation prompt.
pub const CONFIRM_LOAN: &str =
    "💸 Take a credit loan from the carrier? The amount is deducted from \
     your next recharge.";
/// Loan granted.
pub const LOAN_GRANTED: &str = "✅ Loan granted! Check your balance.";
/// Plans category menu.
pub const SELECT_PLAN_TYPE: &str = "📦 Pick a plan category:";
/// Product list header.
pub const SELECT_PRODUCT: &str = "📦 Pick a product:";
/// Subscribed plans header.
pub const SUBSCRIBED_PLANS: &str = "📦 Your subscribed plans:";
/// Activation success notice.
pub const ACTIVATION_OK: &str = "✅ Plan activated!";
/// Deactivation success notice.
pub const DEACTIVATION_OK: &str = "✅ Plan deactivated!";
/// Catalogue entry vanished between render and press.
pub const SOMETHING_WRONG: &str = "🤔 Couldn't find that product any more. Open the list again.";

/// Static help text.
pub const HELP_MENU: &str = "⁉️ <b>Help</b>\n\n\
     • <b>➕ Register</b> links a number via OTP\n\
     • <b>💰 Balance</b>, <b>💳 Recharge</b>, <b>💬 SMS</b>, <b>📦 Plans</b> \
     act on the current account\n\
     • <b>🔃 Switch</b> hops between linked numbers\n\
     • <b>❌ Cancel</b> or /cancel aborts any step\n\n\
     Commands: /register /balance /recharge /sms /plans /profile /loan /switch";

/// Static support text.
pub const SUPPORT_MENU: &str = "🎁 Enjoying the bot? Tell your friends about it. That's all the \
     support it needs.";

/// Static settings text.
pub const SETTINGS_MENU: &str = "⚙️ Nothing to configure yet. Account selection lives under \
     👥 Accounts.";

/// Ping reply.
pub const PONG: &str = "🏓 Pong!";

/// Specific message for every expected business rejection.
#[must_use]
pub const fn domain_failure(failure: DomainFailure) -> &'static str {
    match failure {
        DomainFailure::InvalidNumber => INVALID_NUMBER,
        DomainFailure::OtpResendExceeded => OTP_SEND_EXCEEDED,
        DomainFailure::OtpAttemptsExceeded => OTP_ATTEMPTS_EXCEEDED,
        DomainFailure::InvalidOtp => INVALID_OTP,
        DomainFailure::OtpExpired => OTP_EXPIRED,
        DomainFailure::IncorrectRechargePin => "⚠️ That recharge pin is not correct.",
        DomainFailure::RechargeBlacklisted => {
            "⛔️ This account is blacklisted from recharging. Contact the carrier."
        }
        DomainFailure::AmountNotPositive => "⚠️ The amount has to be more than zero.",
        DomainFailure::AmountOverLimit => "⚠️ Online recharge is limited to Rs. 5000 at once.",
        DomainFailure::FreeSmsQuotaExceeded => {
            "⚠️ You've used all 10 free SMS for today. Try a paid SMS instead."
        }
        DomainFailure::OffNetSmsRejected => {
            "⚠️ SMS to numbers outside this network isn't supported."
        }
        DomainFailure::SmsInsufficientBalance => "⚠️ Not enough balance to send this SMS.",
        DomainFailure::SmsRejected => {
            "⚠️ Couldn't send the SMS. The text may be too long, or the \
             destination is your own number."
        }
        DomainFailure::LoanDenied => "😔 The carrier declined the loan for this account.",
        DomainFailure::AlreadySubscribed => "You already have this plan active.",
        DomainFailure::AlreadyUnsubscribed => "This plan is already inactive.",
    }
}

fn str_at<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str)
}

/// Stringify a scalar without the quotes `Value::to_string` puts around
/// strings.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Credit balance reading, for the low-balance loan shortcut.
#[must_use]
pub fn credit_balance(payload: &Value) -> Option<f64> {
    payload
        .pointer("/queryBalanceResponse/creditBalanceDetail/balance")
        .and_then(Value::as_f64)
}

/// Unpaid loan amount, if any.
#[must_use]
pub fn loan_amount(payload: &Value) -> f64 {
    payload
        .pointer("/queryBalanceResponse/creditBalanceDetail/loanAmount")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

/// Render the balance payload into the multi-section summary.
#[must_use]
pub fn balance_summary(payload: &Value) -> String {
    let detail = "/queryBalanceResponse/creditBalanceDetail";
    let balance = payload
        .pointer(&format!("{detail}/balance"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let mut text = format!("💰 <b>Credit Balance</b>\n\nBalance Rs. {balance}");
    if let Some(date) = str_at(payload, &format!("{detail}/lastRechargeDate")) {
        text.push_str(&format!("\nRecharged on: {}", encode_text(date)));
    }

    for (pointer, header) in [
        ("/queryBalanceResponse/smsBalanceList", "💬 SMS Balance"),
        ("/queryBalanceResponse/dataBalanceList", "🌐 Data Balance"),
    ] {
        if let Some(list) = payload.pointer(pointer).and_then(Value::as_array) {
            if !list.is_empty() {
                text.push_str(&format!("\n\n<b>{header}</b>"));
                for item in list {
                    let name = str_at(item, "/name").unwrap_or("pack");
                    let amount = item.get("amount").map(scalar_string).unwrap_or_default();
                    text.push_str(&format!(
                        "\n✨ {} {}",
                        encode_text(name),
                        encode_text(&amount)
                    ));
                }
            }
        }
    }

    if let Some(list) = payload
        .pointer("/queryBalanceResponse/voiceBalanceList")
        .and_then(Value::as_array)
    {
        if !list.is_empty() {
            text.push_str("\n\n<b>🎤 Voice Balance</b>");
            for item in list {
                let name = str_at(item, "/name").unwrap_or("pack");
                let minutes = item
                    .get("freeTalkTime")
                    .map(scalar_string)
                    .unwrap_or_default();
                let unit = str_at(item, "/talkTimeUom").unwrap_or("");
                text.push_str(&format!(
                    "\n✨ {} {} {}",
                    encode_text(name),
                    encode_text(&minutes),
                    encode_text(&unit.to_lowercase())
                ));
                if let Some(expiry) = str_at(item, "/expDate") {
                    text.push_str(&format!("\nExpires on: {}", encode_text(expiry)));
                }
            }
        }
    }

    let loan = loan_amount(payload);
    if loan > 0.0 {
        text.push_str(&format!("\n\n💸 <b>Loan</b>\n\nUnpaid loan: Rs. {loan}"));
        if let Some(date) = str_at(payload, &format!("{detail}/lastLoanTakenDate")) {
            text.push_str(&format!("\nTaken on: {}", encode_text(date)));
        }
    }

    text
}

/// Render the subscriber profile payload.
#[must_use]
pub fn profile_summary(payload: &Value) -> String {
    let detail = "/querySubscriberProfileResponse/subscriberDetail";
    let gender = str_at(payload, &format!("{detail}/gender")).unwrap_or("");
    let icon = if gender == "M" { "👦🏻" } else { "👧🏻" };

    let mut text = format!("{icon} <b>Customer Profile</b>\n\n");
    let first = str_at(payload, &format!("{detail}/firstName")).unwrap_or("");
    let last = str_at(payload, &format!("{detail}/lastName")).unwrap_or("");
    text.push_str(&format!(
        "Name: {} {}\n",
        encode_text(first),
        encode_text(last)
    ));
    if let Some(msisdn) = str_at(payload, &format!("{detail}/msisdn")) {
        text.push_str(&format!("Phone number: {}\n", encode_text(msisdn)));
    }
    // The carrier fills a placeholder address when no email was ever set
    if let Some(email) = str_at(payload, &format!("{detail}/email")) {
        if !email.starts_with("updateemail@") {
            text.push_str(&format!("Email: {}\n", encode_text(email)));
        }
    }
    if let Some(period) = str_at(payload, &format!("{detail}/registrationPeriod")) {
        text.push_str(&format!("Registered on: {}\n", encode_text(period)));
    }
    if let Some(image) = str_at(payload, &format!("{detail}/profileImage")) {
        if !image.is_empty() {
            text.push_str(&format!("<a href='{image}'>Profile picture 🔻</a>"));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn greetings_escape_user_names() {
        let text = greet("<script>alert(1)</script>");
        assert!(!text.contains("<script>"));
        assert!(text.contains("&lt;script&gt;"));
    }

    #[test]
    fn balance_summary_covers_all_sections() {
        let payload = json!({
            "queryBalanceResponse": {
                "creditBalanceDetail": {
                    "balance": 42.5,
                    "lastRechargeDate": "2021-04-01",
                    "loanAmount": 10.0,
                    "lastLoanTakenDate": "2021-03-20"
                },
                "smsBalanceList": [{"name": "Free SMS", "amount": 8}],
                "dataBalanceList": [],
                "voiceBalanceList": [
                    {"name": "night minutes", "freeTalkTime": 30,
                     "talkTimeUom": "MIN", "expDate": "2021-04-10"}
                ]
            }
        });
        let text = balance_summary(&payload);
        assert!(text.contains("Balance Rs. 42.5"));
        assert!(text.contains("Free SMS"));
        assert!(!text.contains("Data Balance"));
        assert!(text.contains("night minutes"));
        assert!(text.contains("Unpaid loan: Rs. 10"));
        assert_eq!(credit_balance(&payload), Some(42.5));
    }

    #[test]
    fn profile_hides_placeholder_email() {
        let payload = json!({
            "querySubscriberProfileResponse": {
                "subscriberDetail": {
                    "gender": "F",
                    "firstName": "Asha",
                    "lastName": "K",
                    "msisdn": "9801234567",
                    "email": "updateemail@carrier.example",
                    "registrationPeriod": "2019-01-01"
                }
            }
        });
        let text = profile_summary(&payload);
        assert!(text.contains("Asha"));
        assert!(!text.contains("updateemail@"));
    }
}
