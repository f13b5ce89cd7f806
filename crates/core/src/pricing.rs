//! Effective price, order total and quantity stepping.
//!
//! Unit price = (sale price if the sale window contains `as_of`, else base
//! price) + the delta of every selected variation option. There is no floor
//! at zero: a negative result is flagged on the [`PriceBreakdown`] and
//! logged, never clamped.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::catalog::{CatalogItem, Selection};
use crate::error::PricingError;
use crate::money::Money;

/// One variation's contribution to the unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub variation: String,
    pub option: String,
    pub delta: Decimal,
}

/// How a unit price was arrived at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    /// Base term: the sale price when the sale applied, else the base price.
    pub base: Money,
    pub sale_applied: bool,
    pub adjustments: Vec<Adjustment>,
    pub unit_price: Money,
}

impl PriceBreakdown {
    /// A negative unit price almost always means the product's deltas are
    /// misconfigured. Callers decide what to do about it.
    pub fn is_negative(&self) -> bool {
        self.unit_price.is_negative()
    }
}

/// Compute the unit price with its full breakdown.
///
/// Every variation of `item` must have an entry in `selection`; callers
/// populate defaults with [`Selection::fill_defaults`] first.
pub fn price_breakdown(
    item: &CatalogItem,
    selection: &Selection,
    as_of: OffsetDateTime,
) -> Result<PriceBreakdown, PricingError> {
    let (base_amount, sale_applied) = match &item.sale {
        Some(sale) if sale.is_active(as_of) => (sale.price, true),
        _ => (item.base_price.amount, false),
    };
    let base = Money::new(base_amount, item.currency());

    let mut unit_price = base.clone();
    let mut adjustments = Vec::with_capacity(item.variations.len());
    for variation in &item.variations {
        let option =
            selection
                .get(&variation.name)
                .ok_or_else(|| PricingError::MissingSelection {
                    variation: variation.name.clone(),
                })?;
        if !variation.has_option(option) {
            return Err(PricingError::UnknownOption {
                variation: variation.name.clone(),
                option: option.to_string(),
            });
        }
        let delta = variation.delta_for(option);
        unit_price = unit_price.checked_add_amount(delta)?;
        adjustments.push(Adjustment {
            variation: variation.name.clone(),
            option: option.to_string(),
            delta,
        });
    }

    let breakdown = PriceBreakdown {
        base,
        sale_applied,
        adjustments,
        unit_price,
    };
    if breakdown.is_negative() {
        tracing::warn!(
            item_id = %item.id,
            unit_price = %breakdown.unit_price,
            "variation deltas drive the unit price below zero; check the product configuration"
        );
    }
    Ok(breakdown)
}

/// The effective unit price of `item` with `selection` at `as_of`.
pub fn compute_effective_price(
    item: &CatalogItem,
    selection: &Selection,
    as_of: OffsetDateTime,
) -> Result<Money, PricingError> {
    price_breakdown(item, selection, as_of).map(|b| b.unit_price)
}

/// Validate `quantity` against the item's stock and return the order total.
///
/// The stock check is an optimistic pre-check; the purchase backend makes
/// the authoritative one.
pub fn validate_and_compute_total(
    item: &CatalogItem,
    quantity: i64,
    unit_price: &Money,
) -> Result<Money, PricingError> {
    if quantity <= 0 {
        return Err(PricingError::InvalidQuantity { quantity });
    }
    check_stock(item, quantity)?;
    let units = u32::try_from(quantity).map_err(|_| PricingError::Overflow {
        message: format!("quantity {quantity} exceeds the supported range"),
    })?;
    unit_price.checked_mul(units)
}

/// Step a quantity control by `delta`, never below 1.
///
/// Returns the new quantity, or `InsufficientStock` when it would exceed
/// managed stock; the caller keeps its current value in that case.
pub fn change_quantity(current: u32, delta: i64, item: &CatalogItem) -> Result<u32, PricingError> {
    let stepped = i64::from(current).saturating_add(delta).max(1);
    check_stock(item, stepped)?;
    u32::try_from(stepped).map_err(|_| PricingError::Overflow {
        message: format!("quantity {stepped} exceeds the supported range"),
    })
}

fn check_stock(item: &CatalogItem, requested: i64) -> Result<(), PricingError> {
    match item.available_stock() {
        Some(available) if requested > available => {
            Err(PricingError::InsufficientStock {
                requested,
                available,
            })
        }
        _ => Ok(()),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
