use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CatalogLoadError;

/// One raw menu entry as supplied by a catalog source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub name: String,
    pub price: Decimal,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CatalogRecord {
    pub fn new(
        name: impl Into<String>,
        price: Decimal,
        category: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            category: category.into(),
            description: description.map(str::to_string),
        }
    }
}

pub trait CatalogSource: Send + Sync {
    /// Human-readable origin, used in logs and load errors.
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<Vec<CatalogRecord>, CatalogLoadError>;
}

#[derive(Clone, Debug)]
pub struct JsonFileCatalogSource {
    path: PathBuf,
}

impl JsonFileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonFileCatalogSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Vec<CatalogRecord>, CatalogLoadError> {
        let raw = fs::read_to_string(&self.path).map_err(|error| {
            let detail = match error.kind() {
                ErrorKind::NotFound => "file does not exist".to_string(),
                _ => error.to_string(),
            };
            CatalogLoadError::Missing { source_name: self.describe(), detail }
        })?;
        parse_records(&raw)
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticCatalogSource {
    records: Vec<CatalogRecord>,
}

impl StaticCatalogSource {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }
}

impl CatalogSource for StaticCatalogSource {
    fn describe(&self) -> String {
        format!("in-memory catalog ({} records)", self.records.len())
    }

    fn fetch(&self) -> Result<Vec<CatalogRecord>, CatalogLoadError> {
        Ok(self.records.clone())
    }
}

/// Parses a JSON menu document into records.
///
/// The document must be an array of objects with `name`, `price` and
/// `category`; `description` is optional. Prices may be JSON numbers or
/// numeric strings and are read without going through `f64`.
pub fn parse_records(raw: &str) -> Result<Vec<CatalogRecord>, CatalogLoadError> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|error| CatalogLoadError::Malformed(format!("invalid JSON: {error}")))?;

    let Value::Array(entries) = document else {
        return Err(CatalogLoadError::Malformed("expected a JSON array of menu items".to_string()));
    };

    entries.iter().enumerate().map(|(index, entry)| parse_record(index, entry)).collect()
}

fn parse_record(index: usize, entry: &Value) -> Result<CatalogRecord, CatalogLoadError> {
    let invalid = |reason: String| CatalogLoadError::InvalidRecord { index, reason };

    let Value::Object(fields) = entry else {
        return Err(invalid("expected an object".to_string()));
    };

    let name = match fields.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => return Err(invalid("`name` must be a string".to_string())),
        None => return Err(invalid("missing `name`".to_string())),
    };

    let price = match fields.get("price") {
        Some(Value::Number(number)) => parse_price(&number.to_string()),
        Some(Value::String(text)) => parse_price(text.trim()),
        Some(_) => None,
        None => return Err(invalid("missing `price`".to_string())),
    }
    .ok_or_else(|| invalid(format!("`price` for `{name}` is not numeric")))?;

    let category = match fields.get("category") {
        Some(Value::String(category)) => category.clone(),
        Some(_) => return Err(invalid("`category` must be a string".to_string())),
        None => return Err(invalid("missing `category`".to_string())),
    };

    let description = match fields.get("description") {
        Some(Value::String(description)) => Some(description.clone()),
        Some(Value::Null) | None => None,
        Some(_) => return Err(invalid("`description` must be a string".to_string())),
    };

    Ok(CatalogRecord { name, price, category, description })
}

fn parse_price(text: &str) -> Option<Decimal> {
    Decimal::from_str(text).ok().or_else(|| Decimal::from_scientific(text).ok())
}
