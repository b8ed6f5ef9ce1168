//! Attribute label records

use serde::{Deserialize, Serialize};

use crate::metadata::SourceTag;

/// Which label file a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Attribute value present, grounded by evidences
    Positive,
    /// Attribute known absent; no evidence
    Negative,
}

/// Evidence span recorded against raw metadata text.
///
/// `begin`/`end` are character offsets into the raw field, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvidence {
    pub value: String,
    pub source: SourceTag,
    /// Which value of a multi-valued field (e.g. the third bullet point)
    #[serde(default, alias = "index")]
    pub source_index: usize,
    #[serde(alias = "raw_begin")]
    pub begin: usize,
    #[serde(alias = "raw_end")]
    pub end: usize,
}

/// One (product, attribute) label line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    #[serde(alias = "product_id")]
    pub id: String,
    #[serde(alias = "attribute_key")]
    pub key: String,
    /// Category assigned by the labeling pass, preferred over metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub evidences: Vec<RawEvidence>,
}

/// All labels of one product, split by polarity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductLabels {
    pub positive: Vec<LabelRecord>,
    pub negative: Vec<LabelRecord>,
}

impl ProductLabels {
    pub fn push(&mut self, polarity: Polarity, label: LabelRecord) {
        match polarity {
            Polarity::Positive => self.positive.push(label),
            Polarity::Negative => self.negative.push(label),
        }
    }

    pub fn get(&self, polarity: Polarity) -> &[LabelRecord] {
        match polarity {
            Polarity::Positive => &self.positive,
            Polarity::Negative => &self.negative,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    /// First category carried by any label of the product
    pub fn category(&self) -> Option<&str> {
        self.positive
            .iter()
            .chain(&self.negative)
            .find_map(|l| l.category.as_deref().filter(|c| !c.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alias_field_names() {
        let label: LabelRecord = serde_json::from_str(
            r#"{
                "product_id": "B0002H0A3S",
                "attribute_key": "Core Material",
                "evidences": [
                    {"value": "Bronze Acoustic", "source": "title", "raw_begin": 24, "raw_end": 39}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(label.id, "B0002H0A3S");
        assert_eq!(label.key, "Core Material");
        assert_eq!(label.category, None);
        assert_eq!(
            label.evidences[0],
            RawEvidence {
                value: "Bronze Acoustic".into(),
                source: SourceTag::Title,
                source_index: 0,
                begin: 24,
                end: 39,
            }
        );
    }

    #[test]
    fn test_parse_short_field_names() {
        let label: LabelRecord = serde_json::from_str(
            r#"{"id": "X", "key": "Color", "category": "Shoes",
                "evidences": [{"value": "red", "source": "feature", "index": 2, "begin": 0, "end": 3}]}"#,
        )
        .unwrap();
        assert_eq!(label.evidences[0].source_index, 2);
        assert_eq!(label.category.as_deref(), Some("Shoes"));

        let negative: LabelRecord = serde_json::from_str(r#"{"id": "X", "key": "Size"}"#).unwrap();
        assert!(negative.evidences.is_empty());
    }

    #[test]
    fn test_grouping() {
        let mut labels = ProductLabels::default();
        assert!(labels.is_empty());
        let label = |key: &str, category: Option<&str>| LabelRecord {
            id: "X".into(),
            key: key.into(),
            category: category.map(String::from),
            evidences: vec![],
        };
        labels.push(Polarity::Negative, label("Size", Some("Shoes")));
        labels.push(Polarity::Positive, label("Color", None));
        assert_eq!(labels.get(Polarity::Positive).len(), 1);
        assert_eq!(labels.get(Polarity::Negative)[0].key, "Size");
        assert_eq!(labels.category(), Some("Shoes"));
    }

    #[test]
    fn test_empty_category_does_not_hide_later_one() {
        let label = |category: &str| LabelRecord {
            id: "X".into(),
            key: "Color".into(),
            category: Some(category.into()),
            evidences: vec![],
        };
        let labels = ProductLabels {
            positive: vec![label(""), label("Guitar Strings")],
            negative: vec![],
        };
        assert_eq!(labels.category(), Some("Guitar Strings"));

        let blank = ProductLabels {
            positive: vec![label("")],
            negative: vec![],
        };
        assert_eq!(blank.category(), None);
    }
}
