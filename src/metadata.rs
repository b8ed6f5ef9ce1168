//! Raw product metadata and field extraction
//!
//! A raw record is one JSON object from the product metadata dump. Only the
//! text fields named by [`SourceTag`] are read; everything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Metadata field a paragraph or evidence comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceTag {
    Title,
    Description,
    /// Bullet-point features under the title
    Feature,
    Price,
    Brand,
    /// Any other metadata key, read only when configured
    Unknown(String),
}

impl SourceTag {
    /// Extraction order of the known tags; fixes paragraph ids
    pub const KNOWN: [SourceTag; 5] = [
        SourceTag::Title,
        SourceTag::Description,
        SourceTag::Feature,
        SourceTag::Price,
        SourceTag::Brand,
    ];

    pub fn parse(tag: &str) -> Self {
        match tag {
            "title" => SourceTag::Title,
            "description" => SourceTag::Description,
            "feature" | "bullet_point" => SourceTag::Feature,
            "price" => SourceTag::Price,
            "brand" => SourceTag::Brand,
            other => SourceTag::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceTag::Title => "title",
            SourceTag::Description => "description",
            SourceTag::Feature => "feature",
            SourceTag::Price => "price",
            SourceTag::Brand => "brand",
            SourceTag::Unknown(tag) => tag,
        }
    }

    /// Metadata keys holding this field, in lookup order
    fn keys(&self) -> Vec<&str> {
        match self {
            SourceTag::Feature => vec!["feature", "bullet_point"],
            other => vec![other.as_str()],
        }
    }
}

impl From<String> for SourceTag {
    fn from(tag: String) -> Self {
        SourceTag::parse(&tag)
    }
}

impl From<SourceTag> for String {
    fn from(tag: SourceTag) -> Self {
        match tag {
            SourceTag::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product category as found in metadata: a leaf name or a breadcrumb path
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Category {
    Leaf(String),
    Path(Vec<String>),
}

impl Category {
    /// Most specific non-empty category name
    pub fn leaf(&self) -> Option<&str> {
        match self {
            Category::Leaf(name) => Some(name.trim()).filter(|n| !n.is_empty()),
            Category::Path(path) => path.iter().rev().map(|n| n.trim()).find(|n| !n.is_empty()),
        }
    }
}

/// One product from the metadata dump
#[derive(Debug, Clone, Deserialize)]
pub struct RawProductRecord {
    /// Product id (ASIN)
    #[serde(alias = "asin")]
    pub id: String,
    #[serde(default)]
    pub category: Option<Category>,
    /// Every other key, untyped until [`normalize`] reads it
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl RawProductRecord {
    pub fn category_leaf(&self) -> Option<&str> {
        self.category.as_ref().and_then(Category::leaf)
    }
}

/// One raw text value of a product, in extraction order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub source: SourceTag,
    /// Position of the value within its metadata key (0 for plain strings)
    pub index: usize,
    pub text: String,
}

/// Extracts the ordered text fields of `record`.
///
/// Known tags come first in [`SourceTag::KNOWN`] order, then the
/// `extra_sources` keys in the order given. Missing keys are skipped;
/// list values expand to one field per string element.
pub fn normalize(record: &RawProductRecord, extra_sources: &[String]) -> Vec<RawField> {
    let mut tags: Vec<SourceTag> = SourceTag::KNOWN.to_vec();
    for extra in extra_sources {
        let tag = SourceTag::parse(extra);
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let mut fields = Vec::new();
    for tag in tags {
        let Some(value) = tag.keys().into_iter().find_map(|key| record.fields.get(key)) else {
            continue;
        };
        match value {
            Value::String(text) => fields.push(RawField {
                source: tag.clone(),
                index: 0,
                text: text.clone(),
            }),
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::String(text) => fields.push(RawField {
                            source: tag.clone(),
                            index,
                            text: text.clone(),
                        }),
                        other => warn!(
                            product = %record.id,
                            source = %tag,
                            "skipping non-string list element: {other}"
                        ),
                    }
                }
            }
            Value::Null => {}
            other => warn!(
                product = %record.id,
                source = %tag,
                "invalid field shape, expected string or list: {other}"
            ),
        }
    }
    fields
}
