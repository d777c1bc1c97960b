//! Menu filtering and menu card projections.
//!
//! The menu is fetched wholesale from `?path=menu` and held in memory by the
//! storefront and the admin panel; this module only derives views from it.

use serde::Serialize;

use crate::models::{format_money, MenuItem};

pub const ALL_CATEGORIES: &str = "all";

/// Storefront category filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// `all` (any case) or blank selects everything.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_CATEGORIES) {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CategoryFilter::All => ALL_CATEGORIES,
            CategoryFilter::Only(c) => c,
        }
    }

    pub fn matches(&self, item: &MenuItem) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => item.category == *c,
        }
    }
}

pub fn filter_by_category<'a>(
    items: &'a [MenuItem],
    filter: &'a CategoryFilter,
) -> impl Iterator<Item = &'a MenuItem> + 'a {
    items.iter().filter(move |item| filter.matches(item))
}

/// Distinct categories in first-seen order.
pub fn categories(items: &[MenuItem]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        if !item.category.is_empty() && !seen.iter().any(|c| *c == item.category) {
            seen.push(item.category.clone());
        }
    }
    seen
}

pub fn find_item(items: &[MenuItem], item_id: i64) -> Option<&MenuItem> {
    items.iter().find(|i| i.id == item_id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuCard {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub price: String,
    pub available: bool,
    /// Storefront: "Add to Cart" shown. Admin: availability badge text.
    pub availability_label: &'static str,
}

impl MenuCard {
    pub fn from_item(item: &MenuItem, currency_symbol: &str) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            category: item.category.clone(),
            image_url: item.image_or_placeholder().to_string(),
            price: format_money(currency_symbol, item.price),
            available: item.available,
            availability_label: if item.available {
                "Available"
            } else {
                "Currently Unavailable"
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, category: &str, available: bool) -> MenuItem {
        MenuItem {
            id,
            name: format!("item-{id}"),
            description: String::new(),
            price: 1000.0,
            category: category.to_string(),
            image_url: None,
            available,
        }
    }

    #[test]
    fn filter_parses_all_case_insensitively() {
        assert_eq!(CategoryFilter::parse("ALL"), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(""), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse(" drinks "),
            CategoryFilter::Only("drinks".into())
        );
    }

    #[test]
    fn filtering_and_categories() {
        let items = vec![
            item(1, "mains", true),
            item(2, "drinks", true),
            item(3, "mains", false),
        ];
        let mains = CategoryFilter::Only("mains".into());
        let ids: Vec<i64> = filter_by_category(&items, &mains).map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(categories(&items), vec!["mains", "drinks"]);
        assert_eq!(find_item(&items, 2).map(|i| i.id), Some(2));
        assert!(find_item(&items, 9).is_none());
    }

    #[test]
    fn card_formats_price_and_availability() {
        let card = MenuCard::from_item(&item(3, "mains", false), "Tzs");
        assert_eq!(card.price, "Tzs1000.00");
        assert_eq!(card.availability_label, "Currently Unavailable");
        assert!(card.image_url.contains("placeholder"));
    }
}
