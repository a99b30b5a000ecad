//! Deterministic classification of carrier responses.
//!
//! The carrier reuses response codes with different meanings across
//! operations, so classification is table-driven per [`Operation`] rather
//! than one global map. Two codes are cross-operation constants for session
//! expiry and always classify as [`Outcome::SessionExpired`]. Anything not
//! in a table becomes [`Outcome::Unknown`] carrying the original
//! description and HTTP status verbatim for diagnosis, never dropped,
//! never re-interpreted.
//!
//! `classify` is a pure function: same `(operation, response)` in, same
//! `Outcome` out, no I/O, no side effects.

use super::CarrierResponse;
use serde_json::Value;

/// Which API operation produced the response being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// OTP send and token exchange
    Registration,
    /// Balance query
    Balance,
    /// Subscriber profile query
    Profile,
    /// Free or paid SMS send
    Sms,
    /// Pin or online recharge, own or third-party
    Recharge,
    /// Catalogue listing and (de)subscription
    Plans,
    /// Credit loan
    Loan,
}

/// Why the stored credential is no longer valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The account was logged in elsewhere, displacing this session
    NewLogin,
    /// The session simply expired
    Expired,
}

/// Expected business rejections, each with a specific user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainFailure {
    /// The number does not exist on this network
    InvalidNumber,
    /// OTP generation limit reached for the number
    OtpResendExceeded,
    /// Too many wrong OTP attempts
    OtpAttemptsExceeded,
    /// The submitted OTP is wrong
    InvalidOtp,
    /// The submitted OTP has expired
    OtpExpired,
    /// Scratch-card pin not recognized
    IncorrectRechargePin,
    /// The account is blacklisted from recharging
    RechargeBlacklisted,
    /// Recharge amount must be positive
    AmountNotPositive,
    /// Recharge amount exceeds the online limit
    AmountOverLimit,
    /// Daily free-SMS quota used up
    FreeSmsQuotaExceeded,
    /// SMS to off-network numbers refused
    OffNetSmsRejected,
    /// Not enough balance to send the SMS
    SmsInsufficientBalance,
    /// SMS refused (own number, over-long text)
    SmsRejected,
    /// Loan request denied
    LoanDenied,
    /// Product already active
    AlreadySubscribed,
    /// Product already inactive
    AlreadyUnsubscribed,
}

/// The classified result of one carrier call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Operation succeeded; payload for rendering
    Success(Value),
    /// Stored credential is dead; the account must re-register
    SessionExpired(ExpiryReason),
    /// Expected business rejection
    Domain(DomainFailure),
    /// Unrecognized response, surfaced verbatim
    Unknown {
        /// Original carrier description
        description: String,
        /// HTTP status of the call
        status_code: u16,
    },
}

/// Cross-operation session-expiry detection.
///
/// `LGN2003` means the account was logged in from elsewhere; `LGN2004` is a
/// plain expiry. Both force account removal and re-registration.
#[must_use]
pub fn expiry_reason(code: &str) -> Option<ExpiryReason> {
    match code {
        "LGN2003" => Some(ExpiryReason::NewLogin),
        "LGN2004" => Some(ExpiryReason::Expired),
        _ => None,
    }
}

enum Rule {
    Ok,
    Fail(DomainFailure),
}

const REGISTRATION: &[(&str, Rule)] = &[
    ("OTP1000", Rule::Ok),
    ("LGN2007", Rule::Fail(DomainFailure::InvalidNumber)),
    ("OTP2005", Rule::Fail(DomainFailure::OtpResendExceeded)),
    ("OTP2002", Rule::Fail(DomainFailure::OtpAttemptsExceeded)),
    ("OTP2003", Rule::Fail(DomainFailure::InvalidOtp)),
    ("OTP2006", Rule::Fail(DomainFailure::OtpExpired)),
];

const BALANCE: &[(&str, Rule)] = &[("BAL1000", Rule::Ok)];

const PROFILE: &[(&str, Rule)] = &[("SUB1000", Rule::Ok)];

const RECHARGE: &[(&str, Rule)] = &[
    ("OPS1000", Rule::Ok),
    ("MRG2001", Rule::Fail(DomainFailure::IncorrectRechargePin)),
    ("MRG2000", Rule::Fail(DomainFailure::RechargeBlacklisted)),
    ("OPS2000", Rule::Fail(DomainFailure::AmountNotPositive)),
    ("OPS2011", Rule::Fail(DomainFailure::AmountNotPositive)),
    ("OPS2012", Rule::Fail(DomainFailure::AmountOverLimit)),
    ("OPS2003", Rule::Fail(DomainFailure::InvalidNumber)),
    ("OPS2104", Rule::Fail(DomainFailure::InvalidNumber)),
];

const PLANS: &[(&str, Rule)] = &[
    ("BIL2000", Rule::Ok),
    ("QAP1000", Rule::Ok),
    ("BIL1000", Rule::Ok),
    ("BIL1001", Rule::Ok),
    ("PSU2003", Rule::Fail(DomainFailure::AlreadySubscribed)),
    ("PSU2004", Rule::Fail(DomainFailure::AlreadyUnsubscribed)),
];

const LOAN: &[(&str, Rule)] = &[
    ("CL1003", Rule::Ok),
    ("CL3001", Rule::Fail(DomainFailure::LoanDenied)),
];

// Third-party recharge failures share one response code upstream and are
// distinguishable only by their description prose.
// TODO: switch to code-based rules once the carrier assigns distinct codes
// to these rejections; the prose below breaks on any upstream rewording.
const RECHARGE_PROSE: &[(&str, DomainFailure)] = &[
    ("MSISDN does not exist.", DomainFailure::InvalidNumber),
    ("The user is in black list.", DomainFailure::RechargeBlacklisted),
    (
        "the password cannot be found in online vc",
        DomainFailure::IncorrectRechargePin,
    ),
];

fn lookup(table: &[(&str, Rule)], raw: &CarrierResponse) -> Option<Outcome> {
    table
        .iter()
        .find(|(code, _)| *code == raw.response_code)
        .map(|(_, rule)| match rule {
            Rule::Ok => Outcome::Success(raw.payload.clone()),
            Rule::Fail(failure) => Outcome::Domain(*failure),
        })
}

fn unknown(raw: &CarrierResponse) -> Outcome {
    Outcome::Unknown {
        description: raw.description.clone(),
        status_code: raw.status_code,
    }
}

/// Map a raw carrier response to its deterministic outcome.
#[must_use]
pub fn classify(op: Operation, raw: &CarrierResponse) -> Outcome {
    if let Some(reason) = expiry_reason(&raw.response_code) {
        return Outcome::SessionExpired(reason);
    }

    match op {
        Operation::Registration => lookup(REGISTRATION, raw).unwrap_or_else(|| unknown(raw)),
        Operation::Balance => lookup(BALANCE, raw).unwrap_or_else(|| unknown(raw)),
        Operation::Profile => lookup(PROFILE, raw).unwrap_or_else(|| unknown(raw)),
        Operation::Plans => lookup(PLANS, raw).unwrap_or_else(|| unknown(raw)),
        Operation::Loan => lookup(LOAN, raw).unwrap_or_else(|| unknown(raw)),
        Operation::Recharge => classify_recharge(raw),
        Operation::Sms => classify_sms(raw),
    }
}

/// Pin recharges signal success inside the payload instead of a response
/// code; third-party failures fall back to the prose table.
fn classify_recharge(raw: &CarrierResponse) -> Outcome {
    match raw.payload.get("isRechargeSuccess").and_then(Value::as_bool) {
        Some(true) => Outcome::Success(raw.payload.clone()),
        Some(false) => RECHARGE_PROSE
            .iter()
            .find(|(prose, _)| *prose == raw.description)
            .map_or_else(|| unknown(raw), |(_, failure)| Outcome::Domain(*failure)),
        None => lookup(RECHARGE, raw).unwrap_or_else(|| unknown(raw)),
    }
}

/// `SMS1000` only says the request was accepted; the verdict is a nested
/// status code in the payload.
fn classify_sms(raw: &CarrierResponse) -> Outcome {
    if raw.response_code != "SMS1000" {
        return unknown(raw);
    }

    let inner = &raw.payload["sendFreeSMSResponse"];
    match inner.get("statusCode").and_then(Value::as_str) {
        Some("0") => Outcome::Success(raw.payload.clone()),
        Some("1") => Outcome::Domain(DomainFailure::FreeSmsQuotaExceeded),
        Some("3") => Outcome::Domain(DomainFailure::OffNetSmsRejected),
        Some("4") => Outcome::Domain(DomainFailure::SmsInsufficientBalance),
        Some("99") => Outcome::Domain(DomainFailure::SmsRejected),
        _ => Outcome::Unknown {
            description: inner
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or(&raw.description)
                .to_string(),
            status_code: raw.status_code,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(code: &str, payload: Value) -> CarrierResponse {
        CarrierResponse {
            response_code: code.to_string(),
            description: String::new(),
            status_code: 200,
            payload,
        }
    }

    #[test]
    fn expiry_codes_win_for_every_operation() {
        for op in [
            Operation::Registration,
            Operation::Balance,
            Operation::Profile,
            Operation::Sms,
            Operation::Recharge,
            Operation::Plans,
            Operation::Loan,
        ] {
            assert_eq!(
                classify(op, &raw("LGN2003", Value::Null)),
                Outcome::SessionExpired(ExpiryReason::NewLogin)
            );
            assert_eq!(
                classify(op, &raw("LGN2004", Value::Null)),
                Outcome::SessionExpired(ExpiryReason::Expired)
            );
        }
    }

    #[test]
    fn registration_codes() {
        assert_eq!(
            classify(Operation::Registration, &raw("OTP1000", json!({}))),
            Outcome::Success(json!({}))
        );
        assert_eq!(
            classify(Operation::Registration, &raw("OTP2006", Value::Null)),
            Outcome::Domain(DomainFailure::OtpExpired)
        );
        assert_eq!(
            classify(Operation::Registration, &raw("LGN2007", Value::Null)),
            Outcome::Domain(DomainFailure::InvalidNumber)
        );
    }

    #[test]
    fn same_code_means_different_things_per_operation() {
        // OTP1000 is meaningless for the loan table
        assert!(matches!(
            classify(Operation::Loan, &raw("OTP1000", Value::Null)),
            Outcome::Unknown { .. }
        ));
        assert_eq!(
            classify(Operation::Loan, &raw("CL1003", Value::Null)),
            Outcome::Success(Value::Null)
        );
    }

    #[test]
    fn unknown_codes_keep_description_and_status_verbatim() {
        let response = CarrierResponse {
            response_code: "XYZ9999".to_string(),
            description: "Planets misaligned".to_string(),
            status_code: 502,
            payload: Value::Null,
        };
        assert_eq!(
            classify(Operation::Balance, &response),
            Outcome::Unknown {
                description: "Planets misaligned".to_string(),
                status_code: 502,
            }
        );
    }

    #[test]
    fn classification_is_referentially_transparent() {
        let response = raw("BAL1000", json!({"queryBalanceResponse": {}}));
        let first = classify(Operation::Balance, &response);
        let second = classify(Operation::Balance, &response);
        assert_eq!(first, second);
    }

    #[test]
    fn recharge_success_lives_in_the_payload() {
        assert_eq!(
            classify(
                Operation::Recharge,
                &raw("MRG1000", json!({"isRechargeSuccess": true}))
            ),
            Outcome::Success(json!({"isRechargeSuccess": true}))
        );
        assert_eq!(
            classify(Operation::Recharge, &raw("MRG2001", Value::Null)),
            Outcome::Domain(DomainFailure::IncorrectRechargePin)
        );
    }

    #[test]
    fn third_party_recharge_falls_back_to_prose() {
        let response = CarrierResponse {
            response_code: "MRG1000".to_string(),
            description: "The user is in black list.".to_string(),
            status_code: 200,
            payload: json!({"isRechargeSuccess": false}),
        };
        assert_eq!(
            classify(Operation::Recharge, &response),
            Outcome::Domain(DomainFailure::RechargeBlacklisted)
        );

        let reworded = CarrierResponse {
            description: "User is blacklisted".to_string(),
            ..response
        };
        assert!(matches!(
            classify(Operation::Recharge, &reworded),
            Outcome::Unknown { .. }
        ));
    }

    #[test]
    fn sms_verdict_is_nested() {
        let ok = raw(
            "SMS1000",
            json!({"sendFreeSMSResponse": {"statusCode": "0"}}),
        );
        assert!(matches!(classify(Operation::Sms, &ok), Outcome::Success(_)));

        let quota = raw(
            "SMS1000",
            json!({"sendFreeSMSResponse": {"statusCode": "1"}}),
        );
        assert_eq!(
            classify(Operation::Sms, &quota),
            Outcome::Domain(DomainFailure::FreeSmsQuotaExceeded)
        );

        let odd = raw(
            "SMS1000",
            json!({"sendFreeSMSResponse": {"statusCode": "7", "description": "odd"}}),
        );
        assert_eq!(
            classify(Operation::Sms, &odd),
            Outcome::Unknown {
                description: "odd".to_string(),
                status_code: 200,
            }
        );
    }
}
