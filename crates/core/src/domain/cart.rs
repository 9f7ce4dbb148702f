use serde::{Deserialize, Serialize};

use crate::domain::product::ItemKey;

/// Maximum quantity a single cart line may reach.
pub const MAX_LINE_QUANTITY: u32 = 9999;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_key: ItemKey,
    pub display_name: String,
    pub quantity: u32,
}

/// A session's cart. Lines keep insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, key: &ItemKey) -> u32 {
        self.lines.iter().find(|line| &line.item_key == key).map_or(0, |line| line.quantity)
    }

    /// Quantity the line would hold after adding, or `None` past the limit.
    pub fn quantity_after_add(&self, key: &ItemKey, quantity: u32) -> Option<u32> {
        self.quantity_of(key)
            .checked_add(quantity)
            .filter(|total| *total <= MAX_LINE_QUANTITY)
    }

    pub fn add(&mut self, key: &ItemKey, display_name: &str, quantity: u32) {
        if let Some(line) = self.lines.iter_mut().find(|line| &line.item_key == key) {
            line.quantity = line.quantity.saturating_add(quantity);
            return;
        }
        self.lines.push(CartLine {
            item_key: key.clone(),
            display_name: display_name.to_string(),
            quantity,
        });
    }

    /// Deletes the whole line; returns whether it was present.
    pub fn remove(&mut self, key: &ItemKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.item_key != key);
        self.lines.len() < before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}
