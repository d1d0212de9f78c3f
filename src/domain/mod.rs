//! Domain types shared by routes and services.

pub mod accounts;
pub mod ai;
pub mod blog;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod site;
pub mod slug;
pub mod verification;
pub mod warehouse;

use serde::{de::DeserializeOwned, Serialize};

/// Text form of a snake_case serde enum, as stored in VARCHAR status columns.
pub fn text_of<T: Serialize>(value: &T) -> String {
    let s = serde_json::to_string(value).unwrap_or_default();
    s.trim_matches('"').to_string()
}

/// Inverse of [`text_of`]; `None` for unknown values.
pub fn parse_text<T: DeserializeOwned>(s: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

/// Trim and drop empty strings from optional form input.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orders::OrderStatus;

    #[test]
    fn status_text_round_trips_through_serde_names() {
        assert_eq!(text_of(&OrderStatus::Paid), "paid");
        assert_eq!(parse_text::<OrderStatus>("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(parse_text::<OrderStatus>("lost"), None);
    }

    #[test]
    fn clean_drops_blank_input() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" Kyiv ".into())), Some("Kyiv".into()));
        assert_eq!(clean(None), None);
    }
}
