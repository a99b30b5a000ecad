//! Plan browsing and (de)subscription.
//!
//! The last browsed catalogue is cached in the scratch store as typed
//! entries so a product-info button press can re-hydrate the product
//! without another carrier round trip.

use super::{render_unknown, require_account, resolve, AccountGate, Resolved, Settled};
use crate::actions::{Action, LockReason, PlanKind};
use crate::carrier::classify::Operation;
use crate::dialog::StepOutcome;
use crate::engine::Ctx;
use crate::render::{Button, Render};
use crate::storage::temp_keys;
use crate::texts;
use anyhow::Result;
use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One product, reduced to what rendering and (de)subscription need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Carrier product id
    pub id: String,
    /// Display name (already shortened for buttons)
    pub name: String,
    /// Marketing description
    pub description: String,
    /// Price with currency unit, when listed
    pub price: Option<String>,
    /// Code used to subscribe/unsubscribe
    pub subscription_code: Option<String>,
    /// Whether the balance covers a subscription
    pub balance_sufficient: bool,
    /// Whether self-deactivation is allowed
    pub deactivation_allowed: bool,
    /// Per-account benefit lines ("500 MB valid for 7 days")
    pub summary: Vec<String>,
    /// Subscription date, for subscribed products
    pub subscribed_on: Option<String>,
    /// Expiry date, for subscribed products
    pub expiry_date: Option<String>,
}

/// Category menu.
///
/// # Errors
///
/// Propagates store failures.
pub async fn menu(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    if let AccountGate::Missing(outcome) = require_account(ctx).await? {
        return Ok(outcome);
    }

    let rows = vec![
        vec![
            Button::new("Subscribed Plans", Action::SubscribedPlans),
            Button::new("Data Plans", Action::DataPlansMenu),
        ],
        vec![
            Button::new(
                "Voice and SMS",
                Action::PlanList {
                    kind: PlanKind::Voice,
                    category: String::new(),
                },
            ),
            Button::new(
                "VA Services",
                Action::PlanList {
                    kind: PlanKind::Vas,
                    category: String::new(),
                },
            ),
        ],
        vec![Button::new("❌ Cancel", Action::Cancel)],
    ];
    let mut render = Render::message(texts::SELECT_PLAN_TYPE).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render]))
}

/// Data subcategory menu. Category ids are fixed carrier-side.
#[must_use]
pub fn data_menu(message_id: Option<i32>) -> StepOutcome {
    let entry = |label: &str, category: &str| {
        Button::new(
            label,
            Action::PlanList {
                kind: PlanKind::Data,
                category: category.to_string(),
            },
        )
    };
    let rows = vec![
        vec![entry("Social Packs", "34"), entry("Night Data Pack", "20")],
        vec![entry("Popular Data Services", "23")],
        vec![entry("Non Stop Offers", "21"), entry("Get More On 4G", "19")],
        vec![entry("Always On Data Packs", "11")],
        vec![
            Button::new("⬅️ Back", Action::PlansMenu),
            Button::new("❌ Cancel", Action::Cancel),
        ],
    ];
    let mut render = Render::message(texts::SELECT_PLAN_TYPE).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    StepOutcome::complete(vec![render])
}

/// List the products the account is subscribed to.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn subscribed(ctx: &Ctx<'_>, message_id: Option<i32>) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = ctx.carrier.subscribed_products(&account.token).await?;
    let settled = match resolve(ctx, &account, Operation::Plans, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    match settled {
        Settled::Success(payload) => {
            let entries = parse_subscribed(&payload);
            save_catalog(ctx, &entries).await?;

            let mut rows: Vec<Vec<Button>> = entries
                .chunks(2)
                .map(|pair| {
                    pair.iter()
                        .map(|entry| {
                            Button::new(
                                entry.name.clone(),
                                Action::SubscribedProductInfo {
                                    product_id: entry.id.clone(),
                                },
                            )
                        })
                        .collect()
                })
                .collect();
            rows.push(vec![
                Button::new("⬅️ Back", Action::PlansMenu),
                Button::new("❌ Cancel", Action::Cancel),
            ]);

            let mut render = Render::message(texts::SUBSCRIBED_PLANS).with_buttons(rows);
            if let Some(id) = message_id {
                render = render.editing(id);
            }
            Ok(StepOutcome::complete(vec![render]))
        }
        Settled::Domain(failure) => Ok(StepOutcome::complete(vec![Render::notice(
            texts::domain_failure(failure),
        )])),
        Settled::Unknown {
            description,
            status_code,
        } => Ok(StepOutcome::complete(vec![render_unknown(
            &description,
            status_code,
            true,
        )])),
    }
}

/// List available products for a catalogue category.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn list(
    ctx: &Ctx<'_>,
    kind: PlanKind,
    category: &str,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = ctx
        .carrier
        .list_products(&account.token, kind, category)
        .await?;
    let settled = match resolve(ctx, &account, Operation::Plans, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    match settled {
        Settled::Success(payload) => {
            let entries = parse_catalogue(&payload);
            save_catalog(ctx, &entries).await?;

            let mut rows: Vec<Vec<Button>> = entries
                .iter()
                .map(|entry| {
                    vec![Button::new(
                        entry.name.clone(),
                        Action::ProductInfo {
                            kind,
                            category: category.to_string(),
                            product_id: entry.id.clone(),
                        },
                    )]
                })
                .collect();
            let back = if kind == PlanKind::Data {
                Action::DataPlansMenu
            } else {
                Action::PlansMenu
            };
            rows.push(vec![
                Button::new("⬅️ Back", back),
                Button::new("❌ Cancel", Action::Cancel),
            ]);

            let mut render = Render::message(texts::SELECT_PRODUCT).with_buttons(rows);
            if let Some(id) = message_id {
                render = render.editing(id);
            }
            Ok(StepOutcome::complete(vec![render]))
        }
        Settled::Domain(failure) => Ok(StepOutcome::complete(vec![Render::notice(
            texts::domain_failure(failure),
        )])),
        Settled::Unknown {
            description,
            status_code,
        } => Ok(StepOutcome::complete(vec![render_unknown(
            &description,
            status_code,
            true,
        )])),
    }
}

/// Details for a listed product, from the cached catalogue.
///
/// # Errors
///
/// Propagates store failures.
pub async fn product_info(
    ctx: &Ctx<'_>,
    kind: PlanKind,
    category: &str,
    product_id: &str,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    let Some(entry) = find_entry(ctx, product_id).await? else {
        return Ok(StepOutcome::complete(vec![Render::notice(
            texts::SOMETHING_WRONG,
        )]));
    };

    let mut text = format!(
        "<b>{}</b>\n\n<em>{}</em>\n",
        encode_text(&entry.name),
        encode_text(&entry.description)
    );
    if !entry.summary.is_empty() {
        text.push_str("\nSummary:\n");
        for line in &entry.summary {
            text.push_str(&format!("👉 {}\n", encode_text(line)));
        }
    }
    if let Some(price) = &entry.price {
        text.push_str(&format!("\n💰 {}", encode_text(price)));
    }

    let activate = match (&entry.subscription_code, entry.balance_sufficient) {
        (Some(code), true) => Button::new("Activate", Action::Activate { code: code.clone() }),
        _ => Button::new(
            "⛔ Activate",
            Action::Locked(LockReason::InsufficientBalance),
        ),
    };
    let rows = vec![
        vec![activate],
        vec![
            Button::new(
                "⬅️ Back",
                Action::PlanList {
                    kind,
                    category: category.to_string(),
                },
            ),
            Button::new("❌ Cancel", Action::Cancel),
        ],
    ];

    let mut render = Render::message(text).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render]))
}

/// Details for a subscribed product, from the cached catalogue.
///
/// # Errors
///
/// Propagates store failures.
pub async fn subscribed_product_info(
    ctx: &Ctx<'_>,
    product_id: &str,
    message_id: Option<i32>,
) -> Result<StepOutcome> {
    let Some(entry) = find_entry(ctx, product_id).await? else {
        return Ok(StepOutcome::complete(vec![Render::notice(
            texts::SOMETHING_WRONG,
        )]));
    };

    let mut text = format!(
        "<b>{}</b>\n\n<em>{}</em>\n",
        encode_text(&entry.name),
        encode_text(&entry.description)
    );
    if let Some(date) = &entry.subscribed_on {
        text.push_str(&format!("\nSubscribed on: {}", encode_text(date)));
    }
    if let Some(date) = &entry.expiry_date {
        text.push_str(&format!("\nExpiry date: {}", encode_text(date)));
    }

    let deactivate = match (&entry.subscription_code, entry.deactivation_allowed) {
        (Some(code), true) => Button::new("Deactivate", Action::Deactivate { code: code.clone() }),
        _ => Button::new(
            "⛔ Deactivate",
            Action::Locked(LockReason::DeactivationNotAllowed),
        ),
    };
    let rows = vec![
        vec![deactivate],
        vec![
            Button::new("⬅️ Back", Action::SubscribedPlans),
            Button::new("❌ Cancel", Action::Cancel),
        ],
    ];

    let mut render = Render::message(text).with_buttons(rows);
    if let Some(id) = message_id {
        render = render.editing(id);
    }
    Ok(StepOutcome::complete(vec![render]))
}

/// Subscribe to a product and answer with a popup verdict.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn activate(ctx: &Ctx<'_>, code: &str) -> Result<StepOutcome> {
    toggle(ctx, code, true).await
}

/// Unsubscribe from a product and answer with a popup verdict.
///
/// # Errors
///
/// Propagates carrier and store failures.
pub async fn deactivate(ctx: &Ctx<'_>, code: &str) -> Result<StepOutcome> {
    toggle(ctx, code, false).await
}

async fn toggle(ctx: &Ctx<'_>, code: &str, on: bool) -> Result<StepOutcome> {
    let account = match require_account(ctx).await? {
        AccountGate::Linked(account) => account,
        AccountGate::Missing(outcome) => return Ok(outcome),
    };

    let reply = if on {
        ctx.carrier.subscribe(&account.token, code).await?
    } else {
        ctx.carrier.unsubscribe(&account.token, code).await?
    };
    let settled = match resolve(ctx, &account, Operation::Plans, reply).await? {
        Resolved::Expired(outcome) => return Ok(outcome),
        Resolved::Settled(settled) => settled,
    };

    let render = match settled {
        Settled::Success(_) => Render::notice(if on {
            texts::ACTIVATION_OK
        } else {
            texts::DEACTIVATION_OK
        }),
        Settled::Domain(failure) => Render::notice(texts::domain_failure(failure)),
        Settled::Unknown {
            description,
            status_code,
        } => render_unknown(&description, status_code, true),
    };
    Ok(StepOutcome::complete(vec![render]))
}

/// Popup for the inert plan buttons.
#[must_use]
pub fn locked(reason: LockReason) -> StepOutcome {
    let text = match reason {
        LockReason::DeactivationNotAllowed => {
            "⛔ This product can only be deactivated by the carrier."
        }
        LockReason::InsufficientBalance => "⛔ Not enough balance to activate this plan.",
    };
    StepOutcome::complete(vec![Render::notice(text)])
}

async fn save_catalog(ctx: &Ctx<'_>, entries: &[CatalogEntry]) -> Result<()> {
    ctx.store
        .put_temp(
            ctx.user,
            temp_keys::PLANS_CATALOG,
            Some(serde_json::to_value(entries)?),
        )
        .await?;
    Ok(())
}

async fn find_entry(ctx: &Ctx<'_>, product_id: &str) -> Result<Option<CatalogEntry>> {
    let Some(value) = ctx.store.get_temp(ctx.user, temp_keys::PLANS_CATALOG).await? else {
        return Ok(None);
    };
    let entries: Vec<CatalogEntry> = serde_json::from_value(value)?;
    Ok(entries.into_iter().find(|entry| entry.id == product_id))
}

fn parse_subscribed(payload: &Value) -> Vec<CatalogEntry> {
    payload
        .pointer("/queryAllProductsResponse/productList")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(subscribed_entry).collect())
        .unwrap_or_default()
}

fn subscribed_entry(item: &Value) -> Option<CatalogEntry> {
    Some(CatalogEntry {
        id: id_of(item)?,
        name: item.get("name")?.as_str()?.to_string(),
        description: item
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        price: None,
        subscription_code: item
            .get("subscriptionCode")
            .and_then(Value::as_str)
            .map(String::from),
        balance_sufficient: false,
        deactivation_allowed: item
            .get("isDeactivationAllowed")
            .and_then(Value::as_i64)
            .is_some_and(|flag| flag == 1),
        summary: Vec::new(),
        subscribed_on: item
            .get("subscriptionDate")
            .and_then(Value::as_str)
            .map(String::from),
        expiry_date: item
            .get("expiryDate")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

fn parse_catalogue(payload: &Value) -> Vec<CatalogEntry> {
    payload
        .get("availablePackages")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(catalogue_entry).collect())
        .unwrap_or_default()
}

fn catalogue_entry(item: &Value) -> Option<CatalogEntry> {
    let display_name = item
        .pointer("/displayInfo/displayName")
        .and_then(Value::as_str)?;
    let price = item
        .pointer("/productOfferingPrice/price")
        .and_then(Value::as_str);
    let price_uom = item
        .pointer("/productOfferingPrice/priceUom")
        .and_then(Value::as_str)
        .unwrap_or("Rs.");

    let summary = item
        .get("accounts")
        .and_then(Value::as_array)
        .map(|accounts| {
            accounts
                .iter()
                .filter_map(|benefit| {
                    let name = benefit.get("name")?.as_str()?;
                    let amount = benefit.get("amount").map(scalar_string)?;
                    let amount_uom = benefit
                        .get("amountUom")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    let validity = benefit.get("validity").map(scalar_string)?;
                    let validity_uom = benefit
                        .get("validityUom")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    Some(format!(
                        "{name} {amount} {amount_uom} valid for {validity}{validity_uom}"
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    Some(CatalogEntry {
        id: id_of(item)?,
        name: button_name(display_name, price),
        description: item
            .pointer("/displayInfo/description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        price: price.map(|p| format!("{price_uom} {p}")),
        subscription_code: item
            .pointer("/techInfo/subscriptionCode")
            .and_then(Value::as_str)
            .map(String::from),
        balance_sufficient: item
            .get("isBalanceSufficient")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        deactivation_allowed: false,
        summary,
        subscribed_on: None,
        expiry_date: None,
    })
}

/// Ids arrive as strings or numbers depending on the endpoint.
fn id_of(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Stringify a scalar without the quotes `Value::to_string` puts around
/// strings.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Button labels have tight width; squeeze the big brand names and append
/// the integer price.
fn button_name(display_name: &str, price: Option<&str>) -> String {
    let mut name = display_name
        .replace("Facebook", "FB")
        .replace("YouTube", "YT")
        .replace("TikTok", "TT");
    if let Some(price) = price {
        let rupees = price.split('.').next().unwrap_or(price);
        name.push_str(&format!(" (Rs. {rupees})"));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalogue_parsing_shortens_names_and_keeps_codes() {
        let payload = json!({
            "availablePackages": [{
                "id": 55,
                "displayInfo": {
                    "displayName": "Facebook Nonstop",
                    "description": "All day Facebook"
                },
                "productOfferingPrice": {"price": "25.00", "priceUom": "Rs."},
                "techInfo": {"subscriptionCode": "FB_NONSTOP"},
                "isBalanceSufficient": true,
                "accounts": [
                    {"name": "Data", "amount": 500, "amountUom": "MB",
                     "validity": 1, "validityUom": "day"}
                ]
            }]
        });
        let entries = parse_catalogue(&payload);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "55");
        assert_eq!(entries[0].name, "FB Nonstop (Rs. 25)");
        assert_eq!(entries[0].subscription_code.as_deref(), Some("FB_NONSTOP"));
        assert!(entries[0].balance_sufficient);
        assert_eq!(entries[0].summary, vec!["Data 500 MB valid for 1day"]);
    }

    #[test]
    fn subscribed_parsing_reads_deactivation_flag() {
        let payload = json!({
            "queryAllProductsResponse": {
                "productList": [
                    {"id": "9", "name": "Caller Tunes", "description": "",
                     "subscriptionCode": "CT", "isDeactivationAllowed": 1,
                     "subscriptionDate": "2021-01-01", "expiryDate": "2021-02-01"},
                    {"id": "10", "name": "Base Plan",
                     "subscriptionCode": "BP", "isDeactivationAllowed": 0}
                ]
            }
        });
        let entries = parse_subscribed(&payload);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].deactivation_allowed);
        assert!(!entries[1].deactivation_allowed);
    }
}
