//! Catalog items, variations and option selections.
//!
//! [`CatalogItem::from_record`] turns a stored product row into a validated
//! domain item. Invariants enforced there:
//! - variation names are unique within an item
//! - every variation has at least one option
//! - price deltas for labels outside the option list are dropped
//! - sale bounds parse as `YYYY-MM-DD` or RFC 3339

use std::collections::{BTreeMap, HashSet};

use bookstall_storage::{CatalogItemRecord, VariationRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::{format_description, time};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::error::{CatalogError, PricingError};
use crate::money::Money;

// ──────────────────────────────────────────────
// Sale window
// ──────────────────────────────────────────────

/// A sale price with optional validity bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    pub price: Decimal,
    pub starts_at: Option<OffsetDateTime>,
    pub ends_at: Option<OffsetDateTime>,
}

impl Sale {
    /// Whether `as_of` falls in the closed interval `[starts_at, ends_at]`.
    /// A missing bound is unconstrained on that side.
    pub fn is_active(&self, as_of: OffsetDateTime) -> bool {
        let after_start = self.starts_at.map_or(true, |start| as_of >= start);
        let before_end = self.ends_at.map_or(true, |end| as_of <= end);
        after_start && before_end
    }
}

// ──────────────────────────────────────────────
// Stock
// ──────────────────────────────────────────────

/// Whether and how stock limits apply to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPolicy {
    /// Quantities are never limited; any recorded stock figures are ignored.
    Unmanaged,
    Managed { quantity: i64, low_threshold: i64 },
}

// ──────────────────────────────────────────────
// Variation
// ──────────────────────────────────────────────

/// A named option axis, e.g. "Size" with options S/M/L.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variation {
    pub name: String,
    pub options: Vec<String>,
    deltas: BTreeMap<String, Decimal>,
}

impl Variation {
    /// Build a variation. Delta entries whose label is not in `options`
    /// are discarded.
    pub fn new(
        name: impl Into<String>,
        options: Vec<String>,
        deltas: BTreeMap<String, Decimal>,
    ) -> Self {
        let name = name.into();
        let deltas = deltas
            .into_iter()
            .filter(|(label, _)| {
                let known = options.contains(label);
                if !known {
                    tracing::warn!(
                        variation = %name,
                        option = %label,
                        "dropping price delta for unknown option"
                    );
                }
                known
            })
            .collect();
        Variation {
            name,
            options,
            deltas,
        }
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    pub fn default_option(&self) -> Option<&str> {
        self.options.first().map(String::as_str)
    }

    /// The signed price delta of `option`; zero when none is defined.
    pub fn delta_for(&self, option: &str) -> Decimal {
        self.deltas.get(option).copied().unwrap_or(Decimal::ZERO)
    }

    fn from_record(item_id: &str, record: &VariationRecord) -> Result<Self, CatalogError> {
        if record.options.is_empty() {
            return Err(CatalogError::EmptyVariation {
                item_id: item_id.to_string(),
                name: record.name.clone(),
            });
        }
        Ok(Variation::new(
            record.name.clone(),
            record.options.clone(),
            record.price_modifiers.clone(),
        ))
    }
}

// ──────────────────────────────────────────────
// CatalogItem
// ──────────────────────────────────────────────

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub base_price: Money,
    pub sale: Option<Sale>,
    pub variations: Vec<Variation>,
    pub stock: StockPolicy,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_price: Money) -> Self {
        CatalogItem {
            id: id.into(),
            name: name.into(),
            base_price,
            sale: None,
            variations: Vec::new(),
            stock: StockPolicy::Unmanaged,
        }
    }

    pub fn with_sale(mut self, sale: Sale) -> Self {
        self.sale = Some(sale);
        self
    }

    pub fn with_variation(mut self, variation: Variation) -> Self {
        self.variations.push(variation);
        self
    }

    pub fn with_managed_stock(mut self, quantity: i64, low_threshold: i64) -> Self {
        self.stock = StockPolicy::Managed {
            quantity,
            low_threshold,
        };
        self
    }

    pub fn currency(&self) -> &str {
        &self.base_price.currency
    }

    pub fn variation(&self, name: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.name == name)
    }

    /// Units on hand when stock is managed; `None` when unlimited.
    pub fn available_stock(&self) -> Option<i64> {
        match self.stock {
            StockPolicy::Managed { quantity, .. } => Some(quantity),
            StockPolicy::Unmanaged => None,
        }
    }

    pub fn is_in_stock(&self) -> bool {
        self.available_stock().map_or(true, |q| q > 0)
    }

    pub fn is_low_stock(&self) -> bool {
        match self.stock {
            StockPolicy::Managed {
                quantity,
                low_threshold,
            } => quantity <= low_threshold,
            StockPolicy::Unmanaged => false,
        }
    }

    /// Convert a stored product row, validating the item's invariants.
    pub fn from_record(record: &CatalogItemRecord) -> Result<Self, CatalogError> {
        let item_id = record.id.as_str();
        let currency = record.currency.trim();
        if currency.is_empty() {
            return Err(CatalogError::MissingCurrency {
                item_id: item_id.to_string(),
            });
        }

        let sale = match record.sale_price {
            Some(price) => Some(Sale {
                price,
                starts_at: parse_bound(
                    item_id,
                    "sale_start_date",
                    record.sale_start_date.as_deref(),
                    Bound::Start,
                )?,
                ends_at: parse_bound(
                    item_id,
                    "sale_end_date",
                    record.sale_end_date.as_deref(),
                    Bound::End,
                )?,
            }),
            None => None,
        };

        let mut seen = HashSet::new();
        let mut variations = Vec::with_capacity(record.variations.len());
        for v in &record.variations {
            if !seen.insert(v.name.as_str()) {
                return Err(CatalogError::DuplicateVariation {
                    item_id: item_id.to_string(),
                    name: v.name.clone(),
                });
            }
            variations.push(Variation::from_record(item_id, v)?);
        }

        let stock = if record.manage_stock {
            StockPolicy::Managed {
                quantity: record.stock_quantity,
                low_threshold: record.low_stock_threshold,
            }
        } else {
            StockPolicy::Unmanaged
        };

        Ok(CatalogItem {
            id: record.id.clone(),
            name: record.name.clone(),
            base_price: Money::new(record.price, currency.to_uppercase()),
            sale,
            variations,
            stock,
        })
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Parse a sale bound. A date-only start means midnight UTC of that day; a
/// date-only end means the last instant of that day, so the whole end day
/// is inside the window. Blank strings are treated as absent.
fn parse_bound(
    item_id: &str,
    field: &'static str,
    raw: Option<&str>,
    bound: Bound,
) -> Result<Option<OffsetDateTime>, CatalogError> {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };

    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(Some(ts));
    }

    let date = Date::parse(raw, format_description!("[year]-[month]-[day]")).map_err(|_| {
        CatalogError::InvalidSaleDate {
            item_id: item_id.to_string(),
            field,
            value: raw.to_string(),
        }
    })?;
    let clock = match bound {
        Bound::Start => time!(00:00:00),
        Bound::End => time!(23:59:59.999_999_999),
    };
    Ok(Some(PrimitiveDateTime::new(date, clock).assume_utc()))
}

// ──────────────────────────────────────────────
// Selection
// ──────────────────────────────────────────────

/// Variation name → chosen option label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeMap<String, String>);

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    /// The first option of every variation.
    pub fn defaults_for(item: &CatalogItem) -> Self {
        let mut selection = Selection::new();
        selection.fill_defaults(item);
        selection
    }

    /// Choose the first option for every variation not yet chosen.
    pub fn fill_defaults(&mut self, item: &CatalogItem) {
        for v in &item.variations {
            if let Some(first) = v.default_option() {
                self.0
                    .entry(v.name.clone())
                    .or_insert_with(|| first.to_string());
            }
        }
    }

    /// Choose `option` for `variation`, validated against the item.
    /// Leaves the selection unchanged on error.
    pub fn select(
        &mut self,
        item: &CatalogItem,
        variation: &str,
        option: &str,
    ) -> Result<(), PricingError> {
        let v = item
            .variation(variation)
            .ok_or_else(|| PricingError::UnknownVariation {
                variation: variation.to_string(),
            })?;
        if !v.has_option(option) {
            return Err(PricingError::UnknownOption {
                variation: variation.to_string(),
                option: option.to_string(),
            });
        }
        self.0.insert(variation.to_string(), option.to_string());
        Ok(())
    }

    /// Unvalidated insert, for building selections from external input.
    pub fn with(mut self, variation: impl Into<String>, option: impl Into<String>) -> Self {
        self.0.insert(variation.into(), option.into());
        self
    }

    pub fn get(&self, variation: &str) -> Option<&str> {
        self.0.get(variation).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl FromIterator<(String, String)> for Selection {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Selection(iter.into_iter().collect())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record() -> CatalogItemRecord {
        serde_json::from_value(serde_json::json!({
            "id": "tee",
            "name": "Shop Tee",
            "price": "20",
            "currency": "usd",
            "sale_price": "15",
            "sale_start_date": "2025-03-01",
            "sale_end_date": "2025-03-31",
            "variations": [
                {
                    "name": "Size",
                    "options": ["S", "M", "L"],
                    "price_modifiers": { "L": "2", "XXL": "9" }
                }
            ],
            "manage_stock": true,
            "stock_quantity": 4,
            "low_stock_threshold": 5
        }))
        .unwrap()
    }

    #[test]
    fn converts_record() {
        let item = CatalogItem::from_record(&record()).unwrap();
        assert_eq!(item.currency(), "USD");
        assert_eq!(item.variations.len(), 1);
        assert_eq!(item.available_stock(), Some(4));
        assert!(item.is_low_stock());
        assert!(item.is_in_stock());
    }

    #[test]
    fn stray_delta_is_dropped() {
        let item = CatalogItem::from_record(&record()).unwrap();
        let size = item.variation("Size").unwrap();
        assert_eq!(size.delta_for("L"), Decimal::from(2));
        assert_eq!(size.delta_for("XXL"), Decimal::ZERO);
        assert_eq!(size.delta_for("S"), Decimal::ZERO);
    }

    #[test]
    fn date_only_end_covers_whole_day() {
        let item = CatalogItem::from_record(&record()).unwrap();
        let sale = item.sale.unwrap();
        assert!(sale.is_active(datetime!(2025-03-01 00:00 UTC)));
        assert!(sale.is_active(datetime!(2025-03-31 23:59:59 UTC)));
        assert!(!sale.is_active(datetime!(2025-04-01 00:00 UTC)));
        assert!(!sale.is_active(datetime!(2025-02-28 23:59:59 UTC)));
    }

    #[test]
    fn rfc3339_bounds_are_exact() {
        let mut r = record();
        r.sale_end_date = Some("2025-03-10T12:00:00+02:00".to_string());
        let sale = CatalogItem::from_record(&r).unwrap().sale.unwrap();
        assert!(sale.is_active(datetime!(2025-03-10 10:00 UTC)));
        assert!(!sale.is_active(datetime!(2025-03-10 10:00:01 UTC)));
    }

    #[test]
    fn blank_bounds_are_unconstrained() {
        let mut r = record();
        r.sale_start_date = Some("  ".to_string());
        r.sale_end_date = None;
        let sale = CatalogItem::from_record(&r).unwrap().sale.unwrap();
        assert!(sale.is_active(datetime!(1999-01-01 00:00 UTC)));
    }

    #[test]
    fn bad_date_is_rejected() {
        let mut r = record();
        r.sale_start_date = Some("next tuesday".to_string());
        assert!(matches!(
            CatalogItem::from_record(&r),
            Err(CatalogError::InvalidSaleDate {
                field: "sale_start_date",
                ..
            })
        ));
    }

    #[test]
    fn bad_date_without_sale_price_is_ignored() {
        let mut r = record();
        r.sale_price = None;
        r.sale_start_date = Some("garbage".to_string());
        assert!(CatalogItem::from_record(&r).unwrap().sale.is_none());
    }

    #[test]
    fn duplicate_variation_is_rejected() {
        let mut r = record();
        r.variations.push(r.variations[0].clone());
        assert!(matches!(
            CatalogItem::from_record(&r),
            Err(CatalogError::DuplicateVariation { .. })
        ));
    }

    #[test]
    fn empty_variation_is_rejected() {
        let mut r = record();
        r.variations[0].options.clear();
        assert!(matches!(
            CatalogItem::from_record(&r),
            Err(CatalogError::EmptyVariation { .. })
        ));
    }

    #[test]
    fn unmanaged_stock_ignores_recorded_quantity() {
        let mut r = record();
        r.manage_stock = false;
        r.stock_quantity = 0;
        let item = CatalogItem::from_record(&r).unwrap();
        assert_eq!(item.available_stock(), None);
        assert!(item.is_in_stock());
        assert!(!item.is_low_stock());
    }

    #[test]
    fn defaults_pick_first_option() {
        let item = CatalogItem::from_record(&record()).unwrap();
        let selection = Selection::defaults_for(&item);
        assert_eq!(selection.get("Size"), Some("S"));
    }

    #[test]
    fn fill_defaults_keeps_existing_choice() {
        let item = CatalogItem::from_record(&record()).unwrap();
        let mut selection = Selection::new().with("Size", "L");
        selection.fill_defaults(&item);
        assert_eq!(selection.get("Size"), Some("L"));
    }

    #[test]
    fn select_rejects_unknown_option_without_change() {
        let item = CatalogItem::from_record(&record()).unwrap();
        let mut selection = Selection::defaults_for(&item);
        let err = selection.select(&item, "Size", "XXL").unwrap_err();
        assert!(matches!(err, PricingError::UnknownOption { .. }));
        assert_eq!(selection.get("Size"), Some("S"));

        let err = selection.select(&item, "Colour", "Red").unwrap_err();
        assert!(matches!(err, PricingError::UnknownVariation { .. }));
    }
}
