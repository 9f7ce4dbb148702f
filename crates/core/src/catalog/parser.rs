use serde::Serialize;

use crate::catalog::CatalogIndex;
use crate::domain::product::{CatalogItem, Category};
use crate::errors::ParseError;

const MODIFIER_SEPARATOR: &str = " with ";
const MODIFIER_JOINER: &str = " and ";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParsedOrderItem {
    pub base: CatalogItem,
    pub modifiers: Vec<CatalogItem>,
}

impl ParsedOrderItem {
    /// Base first, then modifiers in the order they were named.
    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        std::iter::once(&self.base).chain(self.modifiers.iter())
    }
}

/// Splits a phrase such as "margherita with extra cheese and jalapeno" into
/// a pizza and the toppings or customizations attached to it.
///
/// The base must name a pizza exactly. Each modifier resolves to the first
/// menu item, in catalog order, whose name contains it.
pub fn parse_and_validate(
    index: &CatalogIndex,
    raw_phrase: &str,
) -> Result<ParsedOrderItem, ParseError> {
    let phrase = raw_phrase.trim().to_lowercase();
    let (base_phrase, modifier_phrase) = match phrase.split_once(MODIFIER_SEPARATOR) {
        Some((base, modifiers)) => (base.trim(), Some(modifiers)),
        None => (phrase.as_str(), None),
    };

    let base = match index.lookup(base_phrase) {
        Some(item) if item.category == Category::Pizza => item.clone(),
        Some(item) => {
            return Err(ParseError::InvalidBase {
                phrase: base_phrase.to_string(),
                reason: format!("{} is a {}, not a pizza", item.name, item.category),
            })
        }
        None => {
            return Err(ParseError::InvalidBase {
                phrase: base_phrase.to_string(),
                reason: "no pizza with that name".to_string(),
            })
        }
    };

    let modifiers = match modifier_phrase {
        Some(segment) => segment
            .split(MODIFIER_JOINER)
            .map(|modifier| resolve_modifier(index, modifier.trim()))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ParsedOrderItem { base, modifiers })
}

fn resolve_modifier(index: &CatalogIndex, phrase: &str) -> Result<CatalogItem, ParseError> {
    if phrase.is_empty() {
        return Err(ParseError::InvalidModifier {
            phrase: phrase.to_string(),
            reason: "empty modifier".to_string(),
        });
    }

    let item = index.find_by_name_fragment(phrase).ok_or_else(|| ParseError::InvalidModifier {
        phrase: phrase.to_string(),
        reason: "not found on the menu".to_string(),
    })?;

    if !item.category.is_modifier() {
        return Err(ParseError::InvalidModifier {
            phrase: phrase.to_string(),
            reason: format!("{} is not a topping or customization", item.name),
        });
    }

    Ok(item.clone())
}

#[cfg(test)]
mod tests {
    use super::parse_and_validate;
    use crate::catalog::fixtures;
    use crate::errors::ParseError;

    #[test]
    fn plain_pizza_has_no_modifiers() {
        let index = fixtures::index();
        let parsed = parse_and_validate(&index, "  Farmhouse ").expect("valid pizza");

        assert_eq!(parsed.base.name, "Farmhouse");
        assert!(parsed.modifiers.is_empty());
    }

    #[test]
    fn modifiers_resolve_by_fragment() {
        let index = fixtures::index();
        let parsed = parse_and_validate(&index, "Margherita with Extra Cheese and jalapeno")
            .expect("valid phrase");

        let names: Vec<_> = parsed.items().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Margherita", "Extra Cheese", "Jalapeno"]);
    }

    #[test]
    fn partial_modifier_names_resolve() {
        let index = fixtures::index();
        let parsed = parse_and_validate(&index, "farmhouse with olives").expect("valid phrase");
        assert_eq!(parsed.modifiers[0].name, "Black Olives");
    }

    #[test]
    fn non_pizza_base_is_rejected() {
        let index = fixtures::index();
        let error = parse_and_validate(&index, "coke with extra cheese").expect_err("coke base");
        assert!(matches!(error, ParseError::InvalidBase { ref phrase, .. } if phrase == "coke"));

        let unknown = parse_and_validate(&index, "calzone").expect_err("not on menu");
        assert!(matches!(unknown, ParseError::InvalidBase { .. }));
    }

    #[test]
    fn drinks_are_not_modifiers() {
        let index = fixtures::index();
        let error = parse_and_validate(&index, "Margherita with Coke").expect_err("coke modifier");
        assert!(matches!(
            error,
            ParseError::InvalidModifier { ref phrase, .. } if phrase == "coke"
        ));
    }

    #[test]
    fn empty_and_unknown_modifiers_are_rejected() {
        let index = fixtures::index();
        assert!(matches!(
            parse_and_validate(&index, "margherita with extra cheese and  and jalapeno"),
            Err(ParseError::InvalidModifier { ref phrase, .. }) if phrase.is_empty()
        ));
        assert!(matches!(
            parse_and_validate(&index, "margherita with pineapple"),
            Err(ParseError::InvalidModifier { .. })
        ));
    }
}
