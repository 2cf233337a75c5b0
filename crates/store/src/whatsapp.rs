//! WhatsApp deep-link construction for administrator order alerts.
//!
//! Pure and deterministic: given a committed order snapshot and the
//! configured administrator numbers, this produces one message string and
//! one `wa.me` URL per administrator. The server never dispatches anything
//! on this channel; whichever client opens the link performs the actual
//! delivery, so there is no delivery-outcome tracking here. That is a
//! deliberate scope boundary, not an omission.

use std::fmt::Write as _;

use serde::Serialize;

use crate::config::WhatsAppConfig;
use crate::models::Order;

/// Length of a local phone number without a country code.
const LOCAL_NUMBER_LENGTH: usize = 8;

/// One administrator deep link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminLink {
    /// Normalized phone number the link targets.
    pub phone: String,
    /// `https://wa.me/...` URL with the pre-filled message.
    pub url: String,
}

/// Normalize a phone number for a `wa.me` link.
///
/// Strips all non-digit characters. A number of exactly 8 digits is assumed
/// local and receives the configured country-code prefix; anything else is
/// assumed to already carry its country code and passes through unchanged.
#[must_use]
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() == LOCAL_NUMBER_LENGTH {
        format!("{country_code}{digits}")
    } else {
        digits
    }
}

/// Format the administrator notification message for a committed order.
#[must_use]
pub fn order_message(order: &Order) -> String {
    let mut msg = String::new();

    let _ = writeln!(msg, "New order {}", order.order_number);
    let _ = writeln!(
        msg,
        "Customer: {} ({})",
        order.contact.name, order.contact.phone
    );
    let _ = writeln!(msg, "Email: {}", order.contact.email);
    let _ = writeln!(msg, "Items:");
    for item in &order.items {
        let _ = writeln!(
            msg,
            "- {} x {} (${})",
            item.quantity, item.product_name, item.unit_price
        );
    }
    let _ = writeln!(msg, "Total: ${}", order.total);
    let addr = &order.shipping_address;
    let _ = write!(
        msg,
        "Ship to: {}, {}, {} {}, {}",
        addr.street, addr.city, addr.state, addr.zip, addr.country
    );

    msg
}

/// Build one deep link per configured administrator.
#[must_use]
pub fn admin_links(order: &Order, config: &WhatsAppConfig) -> Vec<AdminLink> {
    let message = order_message(order);
    let encoded = urlencoding::encode(&message);

    config
        .admin_phones
        .iter()
        .map(|raw| {
            let phone = normalize_phone(raw, &config.country_code);
            AdminLink {
                url: format!("https://wa.me/{phone}?text={encoded}"),
                phone,
            }
        })
        .collect()
}
