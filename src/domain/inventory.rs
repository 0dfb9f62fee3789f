//! Inventory items and barcode lookup

use serde::{Deserialize, Serialize};

use super::round_cents;
use super::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub sku: String,
    /// Decoded barcode (EAN/UPC/QR payload)
    pub barcode: Option<String>,
    pub category: String,
    pub quantity: i64,
    pub unit_cost: f64,
    pub unit_price: f64,
    /// Restock when quantity falls to this level
    pub reorder_level: i64,
    pub location: String,
    pub supplier: String,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, sku: impl Into<String>, quantity: i64, unit_cost: f64) -> Self {
        Self {
            name: name.into(),
            sku: sku.into(),
            quantity,
            unit_cost,
            ..Default::default()
        }
    }

    /// Builder method: set the barcode
    pub fn barcode(mut self, code: impl Into<String>) -> Self {
        self.barcode = Some(code.into());
        self
    }

    /// Value of stock on hand at cost
    pub fn stock_value(&self) -> f64 {
        round_cents(self.quantity as f64 * self.unit_cost)
    }

    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    /// True if `code` matches the barcode or, failing that, the SKU
    pub fn matches_code(&self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }
        self.barcode.as_deref().map(str::trim) == Some(code) || self.sku.trim().eq_ignore_ascii_case(code)
    }
}

impl Validate for InventoryItem {
    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .require("name", &self.name)
            .require("sku", &self.sku)
            .check(self.quantity >= 0, "quantity", "must not be negative")
            .check(self.unit_cost >= 0.0, "unit_cost", "must not be negative")
            .check(self.unit_price >= 0.0, "unit_price", "must not be negative")
            .check(self.reorder_level >= 0, "reorder_level", "must not be negative")
            .finish()
    }
}

/// Look an item up by a scanned code. Barcode matches win over SKU matches.
pub fn find_by_code<'a>(items: &'a [InventoryItem], code: &str) -> Option<&'a InventoryItem> {
    let code = code.trim();
    items
        .iter()
        .find(|i| i.barcode.as_deref().map(str::trim) == Some(code))
        .or_else(|| items.iter().find(|i| i.matches_code(code)))
}

/// Aggregate figures for a stock listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StockSummary {
    pub items: usize,
    pub units: i64,
    pub value: f64,
    pub below_reorder: usize,
}

pub fn summarize(items: &[InventoryItem]) -> StockSummary {
    StockSummary {
        items: items.len(),
        units: items.iter().map(|i| i.quantity).sum(),
        value: round_cents(items.iter().map(|i| i.stock_value()).sum()),
        below_reorder: items.iter().filter(|i| i.needs_reorder()).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock() -> Vec<InventoryItem> {
        vec![
            InventoryItem::new("Stapler", "ST-01", 12, 4.5).barcode("4006381333931"),
            InventoryItem::new("Paper A4", "PA-04", 3, 6.25),
            InventoryItem {
                reorder_level: 5,
                ..InventoryItem::new("Toner", "4006381333931", 2, 55.0)
            },
        ]
    }

    #[test]
    fn test_barcode_beats_sku() {
        let items = stock();
        let found = find_by_code(&items, " 4006381333931 ").unwrap();
        assert_eq!(found.name, "Stapler");
    }

    #[test]
    fn test_sku_lookup_case_insensitive() {
        let items = stock();
        assert_eq!(find_by_code(&items, "pa-04").unwrap().name, "Paper A4");
        assert!(find_by_code(&items, "missing").is_none());
        assert!(find_by_code(&items, "").is_none());
    }

    #[test]
    fn test_stock_value_and_reorder() {
        let items = stock();
        assert_eq!(items[0].stock_value(), 54.0);
        assert!(!items[0].needs_reorder());
        assert!(items[2].needs_reorder());

        let summary = summarize(&items);
        assert_eq!(summary.items, 3);
        assert_eq!(summary.units, 17);
        assert_eq!(summary.value, 182.75);
        // Paper at 3 units is above its default reorder level of 0
        assert_eq!(summary.below_reorder, 1);
    }

    #[test]
    fn test_validation() {
        assert!(stock()[0].validate().is_ok());
        let err = InventoryItem::new("", "", -1, 1.0).validate().unwrap_err();
        assert_eq!(err.missing, vec!["name", "sku"]);
        assert_eq!(err.invalid[0].field, "quantity");
    }
}
