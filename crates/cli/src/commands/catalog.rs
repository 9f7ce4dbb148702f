use std::path::PathBuf;
use std::sync::Arc;

use pizzabot_core::catalog::search::SearchEngine;
use pizzabot_core::catalog::source::JsonFileCatalogSource;
use pizzabot_core::catalog::{CatalogIndex, CatalogStore};
use pizzabot_core::domain::product::Category;
use serde_json::json;

use crate::commands::{load_config, CommandResult};

pub fn check(path: Option<PathBuf>) -> CommandResult {
    let index = match load_index("catalog check", path) {
        Ok(index) => index,
        Err(failure) => return failure,
    };

    let counts = [Category::Pizza, Category::Topping, Category::Customization, Category::Other]
        .into_iter()
        .map(|category| {
            (category.as_str().to_string(), json!(index.items_by_category(category).len()))
        })
        .collect::<serde_json::Map<String, serde_json::Value>>();

    CommandResult::success_with_data(
        "catalog check",
        format!("catalog valid: {} items", index.len()),
        serde_json::Value::Object(counts),
    )
}

pub fn search(query: &str, path: Option<PathBuf>) -> CommandResult {
    let index = match load_index("catalog search", path) {
        Ok(index) => index,
        Err(failure) => return failure,
    };

    let hits = SearchEngine::default().search(&index, query);
    let data = hits
        .iter()
        .map(|hit| {
            json!({
                "name": hit.item.name,
                "category": hit.item.category,
                "price": hit.item.price.to_string(),
                "score": hit.score,
            })
        })
        .collect::<Vec<_>>();

    CommandResult::success_with_data(
        "catalog search",
        format!("{} matching items for `{}`", hits.len(), query.trim()),
        json!(data),
    )
}

/// An explicit `--path` skips configuration entirely so menu files can be
/// checked before they are deployed.
fn load_index(command: &str, path: Option<PathBuf>) -> Result<Arc<CatalogIndex>, CommandResult> {
    let path = match path {
        Some(path) => path,
        None => load_config(command)?.catalog.path,
    };

    let store = CatalogStore::new(Arc::new(JsonFileCatalogSource::new(path)));
    store
        .load()
        .map_err(|error| CommandResult::failure(command, "catalog_load", error.to_string(), 6))
}
