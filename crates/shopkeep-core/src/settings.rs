//! # Store Settings
//!
//! Typed view over the key/value `store_settings` table.
//!
//! ## Key Space
//! ```text
//! store.*      profile (name, address, phone, email, logo_path)
//! currency.*   symbol and separators
//! pricing.*    card surcharge
//! stock.*      default low-stock threshold
//! digest.*     recipients
//! label.*      label sheet layout
//! ui.*         free-form client preferences (widget position, ...)
//! ```
//!
//! Unknown keys outside `ui.` are ignored when reading; malformed values fall
//! back to defaults so a bad row never breaks the whole profile.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::labels::LabelLayout;
use crate::money::CurrencyFormat;
use crate::types::StoreSetting;
use crate::validation::{validate_bps, validate_email, validate_optional_text, validate_required_text};

/// Well-known setting keys.
pub mod keys {
    pub const STORE_NAME: &str = "store.name";
    pub const STORE_ADDRESS: &str = "store.address";
    pub const STORE_PHONE: &str = "store.phone";
    pub const STORE_EMAIL: &str = "store.email";
    pub const STORE_LOGO_PATH: &str = "store.logo_path";
    pub const CURRENCY_SYMBOL: &str = "currency.symbol";
    pub const CURRENCY_DECIMAL: &str = "currency.decimal_separator";
    pub const CURRENCY_THOUSANDS: &str = "currency.thousands_separator";
    pub const CARD_SURCHARGE_BPS: &str = "pricing.card_surcharge_bps";
    pub const LOW_STOCK_THRESHOLD: &str = "stock.low_stock_threshold";
    pub const DIGEST_RECIPIENTS: &str = "digest.recipients";
    pub const LABEL_COLUMNS: &str = "label.columns";
    pub const LABEL_ROWS: &str = "label.rows";
    pub const LABEL_MARGIN_MM: &str = "label.margin_mm";
    pub const LABEL_GAP_MM: &str = "label.gap_mm";
    pub const LABEL_SHOW_STORE_NAME: &str = "label.show_store_name";
    pub const LABEL_SHOW_BORDER: &str = "label.show_border";

    /// Prefix of client preference keys.
    pub const UI_PREFIX: &str = "ui.";
}

/// Store configuration assembled from settings rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoreProfile {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Path inside the media directory; managed by the logo endpoint.
    pub logo_path: Option<String>,
    pub currency: CurrencyFormat,
    pub card_surcharge_bps: u32,
    /// Default `min_stock` for new products.
    pub low_stock_threshold: i64,
    pub digest_recipients: Vec<String>,
    pub label_layout: LabelLayout,
}

impl Default for StoreProfile {
    fn default() -> Self {
        StoreProfile {
            name: "Minha Loja".to_string(),
            address: None,
            phone: None,
            email: None,
            logo_path: None,
            currency: CurrencyFormat::default(),
            card_surcharge_bps: 0,
            low_stock_threshold: 5,
            digest_recipients: Vec::new(),
            label_layout: LabelLayout::default(),
        }
    }
}

impl StoreProfile {
    /// Builds the profile from persisted rows.
    pub fn from_settings(rows: &[StoreSetting]) -> Self {
        let map: HashMap<&str, &str> = rows
            .iter()
            .map(|r| (r.key.as_str(), r.value.as_str()))
            .collect();
        let text = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let defaults = StoreProfile::default();
        let layout = defaults.label_layout;

        StoreProfile {
            name: text(keys::STORE_NAME).unwrap_or(defaults.name),
            address: text(keys::STORE_ADDRESS),
            phone: text(keys::STORE_PHONE),
            email: text(keys::STORE_EMAIL),
            logo_path: text(keys::STORE_LOGO_PATH),
            currency: CurrencyFormat {
                symbol: text(keys::CURRENCY_SYMBOL).unwrap_or(defaults.currency.symbol),
                decimal_separator: parse_or(&map, keys::CURRENCY_DECIMAL, defaults.currency.decimal_separator),
                thousands_separator: parse_or(
                    &map,
                    keys::CURRENCY_THOUSANDS,
                    defaults.currency.thousands_separator,
                ),
            },
            card_surcharge_bps: parse_or(&map, keys::CARD_SURCHARGE_BPS, defaults.card_surcharge_bps),
            low_stock_threshold: parse_or(&map, keys::LOW_STOCK_THRESHOLD, defaults.low_stock_threshold),
            digest_recipients: text(keys::DIGEST_RECIPIENTS)
                .map(|v| split_recipients(&v))
                .unwrap_or_default(),
            label_layout: LabelLayout {
                columns: parse_or(&map, keys::LABEL_COLUMNS, layout.columns),
                rows: parse_or(&map, keys::LABEL_ROWS, layout.rows),
                margin_mm: parse_or(&map, keys::LABEL_MARGIN_MM, layout.margin_mm),
                gap_mm: parse_or(&map, keys::LABEL_GAP_MM, layout.gap_mm),
                show_store_name: parse_or(&map, keys::LABEL_SHOW_STORE_NAME, layout.show_store_name),
                show_border: parse_or(&map, keys::LABEL_SHOW_BORDER, layout.show_border),
            },
        }
    }

    /// Flattens the profile into key/value pairs for persistence.
    ///
    /// `logo_path` is excluded; it only changes through logo upload.
    /// Empty optional fields are written as empty strings so that clearing a
    /// field overwrites the previous value.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            (keys::STORE_NAME, self.name.trim().to_string()),
            (keys::STORE_ADDRESS, opt(&self.address)),
            (keys::STORE_PHONE, opt(&self.phone)),
            (keys::STORE_EMAIL, opt(&self.email)),
            (keys::CURRENCY_SYMBOL, self.currency.symbol.clone()),
            (keys::CURRENCY_DECIMAL, self.currency.decimal_separator.to_string()),
            (keys::CURRENCY_THOUSANDS, self.currency.thousands_separator.to_string()),
            (keys::CARD_SURCHARGE_BPS, self.card_surcharge_bps.to_string()),
            (keys::LOW_STOCK_THRESHOLD, self.low_stock_threshold.to_string()),
            (keys::DIGEST_RECIPIENTS, self.digest_recipients.join(",")),
            (keys::LABEL_COLUMNS, self.label_layout.columns.to_string()),
            (keys::LABEL_ROWS, self.label_layout.rows.to_string()),
            (keys::LABEL_MARGIN_MM, self.label_layout.margin_mm.to_string()),
            (keys::LABEL_GAP_MM, self.label_layout.gap_mm.to_string()),
            (keys::LABEL_SHOW_STORE_NAME, self.label_layout.show_store_name.to_string()),
            (keys::LABEL_SHOW_BORDER, self.label_layout.show_border.to_string()),
        ]
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_required_text("name", &self.name, 120)?;
        validate_optional_text("address", self.address.as_deref(), 300)?;
        validate_optional_text("phone", self.phone.as_deref(), 40)?;
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email(email)?;
        }
        validate_required_text("currency.symbol", &self.currency.symbol, 5)?;
        if self.currency.decimal_separator == self.currency.thousands_separator {
            return Err(ValidationError::invalid_format(
                "currency",
                "decimal and thousands separators must differ",
            ));
        }
        validate_bps("card_surcharge_bps", self.card_surcharge_bps)?;
        if self.low_stock_threshold < 0 {
            return Err(ValidationError::OutOfRange {
                field: "low_stock_threshold".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        for recipient in &self.digest_recipients {
            validate_email(recipient)?;
        }
        self.label_layout.validate()
    }
}

fn parse_or<T: FromStr>(map: &HashMap<&str, &str>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Splits a comma/semicolon separated recipient list.
pub fn split_recipients(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates a client preference key: `ui.` followed by `[a-z0-9_.-]`.
///
/// ```rust
/// use shopkeep_core::settings::validate_preference_key;
///
/// assert!(validate_preference_key("ui.cart_widget.position").is_ok());
/// assert!(validate_preference_key("store.name").is_err());
/// ```
pub fn validate_preference_key(key: &str) -> Result<(), ValidationError> {
    let rest = key.strip_prefix(keys::UI_PREFIX).ok_or_else(|| {
        ValidationError::invalid_format("key", format!("must start with '{}'", keys::UI_PREFIX))
    })?;
    if rest.is_empty() || key.len() > 100 {
        return Err(ValidationError::invalid_format("key", "must be 4-100 characters"));
    }
    if !rest
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ValidationError::invalid_format(
            "key",
            "may only contain lowercase letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
