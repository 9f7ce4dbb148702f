use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized catalog key: trimmed, lowercased item name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey(pub String);

impl ItemKey {
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pizza,
    Topping,
    Customization,
    Other,
}

impl Category {
    /// Maps a catalog category label onto the closed category set.
    ///
    /// Plural forms and the legacy "cheese options" label are accepted;
    /// anything unrecognized (drinks, sides, desserts) is `Other`.
    pub fn from_label(label: &str) -> Self {
        Self::parse_label(label).unwrap_or(Self::Other)
    }

    /// Strict form of [`Category::from_label`] for caller-supplied labels:
    /// only the known names and their aliases are accepted.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pizza" | "pizzas" => Some(Self::Pizza),
            "topping" | "toppings" => Some(Self::Topping),
            "customization" | "customizations" | "cheese options" | "cheese option" => {
                Some(Self::Customization)
            }
            "other" | "others" | "beverage" | "beverages" | "drink" | "drinks" => {
                Some(Self::Other)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pizza => "pizza",
            Self::Topping => "topping",
            Self::Customization => "customization",
            Self::Other => "other",
        }
    }

    /// Toppings and customizations may be attached to a pizza with "with".
    pub fn is_modifier(&self) -> bool {
        matches!(self, Self::Topping | Self::Customization)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pizza" => Ok(Self::Pizza),
            "topping" => Ok(Self::Topping),
            "customization" => Ok(Self::Customization),
            "other" => Ok(Self::Other),
            other => Err(format!(
                "unsupported category `{other}` (expected pizza|topping|customization|other)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub key: ItemKey,
    pub name: String,
    pub price: Decimal,
    pub category: Category,
    pub description: Option<String>,
}

impl CatalogItem {
    pub fn new(
        name: impl Into<String>,
        price: Decimal,
        category: Category,
        description: Option<String>,
    ) -> Self {
        let name = name.into();
        Self { key: ItemKey::normalize(&name), name, price, category, description }
    }
}
