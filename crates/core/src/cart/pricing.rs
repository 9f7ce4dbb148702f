use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::CatalogIndex;
use crate::domain::cart::Cart;
use crate::domain::product::ItemKey;
use crate::errors::OrderError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub item_key: ItemKey,
    pub display_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub total: Decimal,
    pub currency: String,
    pub lines: Vec<PricedLine>,
    /// Cart lines whose item is no longer in the catalog; priced at zero.
    pub stale_items: Vec<ItemKey>,
}

impl PricingResult {
    pub fn is_zero(&self) -> bool {
        self.total.is_zero()
    }
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, cart: &Cart, index: &CatalogIndex, currency: &str) -> PricingResult;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, cart: &Cart, index: &CatalogIndex, currency: &str) -> PricingResult {
        let mut lines = Vec::with_capacity(cart.lines().len());
        let mut stale_items = Vec::new();

        for line in cart.lines() {
            let Some(item) = index.get(&line.item_key) else {
                warn!(
                    event_name = "pricing.stale_cart_line",
                    item_key = %line.item_key,
                    quantity = line.quantity,
                    "cart line no longer resolves in the catalog; priced at zero"
                );
                stale_items.push(line.item_key.clone());
                continue;
            };

            let line_total = item.price * Decimal::from(line.quantity);
            lines.push(PricedLine {
                item_key: line.item_key.clone(),
                display_name: item.name.clone(),
                quantity: line.quantity,
                unit_price: item.price,
                line_total,
            });
        }

        let total: Decimal = lines.iter().map(|line| line.line_total).sum();
        PricingResult { total, currency: currency.to_string(), lines, stale_items }
    }
}

/// Converts a decimal amount into integer minor units (paise, cents),
/// rounding half away from zero at the currency's precision.
pub fn to_minor_units(amount: Decimal, exponent: u32) -> Result<i64, OrderError> {
    let out_of_range = || OrderError::AmountOutOfRange { amount: amount.to_string() };
    let scale = 10_i64.checked_pow(exponent).ok_or_else(out_of_range)?;

    amount
        .round_dp_with_strategy(exponent, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::from(scale))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(out_of_range)
}

pub fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_ascii_uppercase().as_str() {
        "INR" => Some("₹"),
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        _ => None,
    }
}

/// Renders an amount with its currency symbol, e.g. `₹450.00`.
pub fn format_amount(amount: Decimal, currency: &str, exponent: u32) -> String {
    let mut rounded =
        amount.round_dp_with_strategy(exponent, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(exponent);
    match currency_symbol(currency) {
        Some(symbol) => format!("{symbol}{rounded}"),
        None => format!("{} {rounded}", currency.to_ascii_uppercase()),
    }
}
