use serde::{Deserialize, Serialize};

/// A named group of channels inside a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(rename = "channels", default)]
    pub channel_ids: Vec<String>,
}

impl Category {
    pub fn contains(&self, channel_id: &str) -> bool {
        self.channel_ids.iter().any(|id| id == channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_from_wire() {
        let category: Category =
            serde_json::from_value(json!({ "id": "k1", "title": "Text", "channels": ["c1", "c2"] })).unwrap();
        assert_eq!(category.name, "Text");
        assert!(category.contains("c2"));
        assert!(!category.contains("c3"));
    }
}
