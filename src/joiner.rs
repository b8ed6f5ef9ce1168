//! Product/label join
//!
//! [`join_product`] is the per-key callback of the pipeline: one metadata
//! record plus all labels sharing its id in, at most one output record per
//! polarity out. It touches no state other than the caller's statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::JoinConfig;
use crate::labels::{LabelRecord, Polarity, ProductLabels};
use crate::metadata::{normalize, RawProductRecord};
use crate::paragraphs::{CleanedParagraph, ParagraphSet};
use crate::remap::{remap, Evidence};
use crate::stats::Statistics;

/// One attribute of an output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub evidences: Vec<Evidence>,
}

/// One line of an output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: String,
    pub category: String,
    pub paragraphs: Vec<CleanedParagraph>,
    pub attributes: Vec<Attribute>,
}

/// Output of one product, per polarity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedProduct {
    pub positive: Option<OutputRecord>,
    pub negative: Option<OutputRecord>,
}

impl JoinedProduct {
    pub fn get(&self, polarity: Polarity) -> Option<&OutputRecord> {
        match polarity {
            Polarity::Positive => self.positive.as_ref(),
            Polarity::Negative => self.negative.as_ref(),
        }
    }
}

/// Joins one metadata record with its labels.
pub fn join_product(
    record: &RawProductRecord,
    labels: &ProductLabels,
    config: &JoinConfig,
    stats: &mut Statistics,
) -> JoinedProduct {
    if labels.is_empty() {
        stats.run.products_without_labels += 1;
        return JoinedProduct::default();
    }

    let fields = normalize(record, &config.extra_sources);
    let set = ParagraphSet::build(&fields, &config.rules, config.filter_paragraphs);
    stats.record_paragraphs(&set);

    if config.require_title && !set.has_title() {
        debug!(product = %record.id, "dropping product without a title paragraph");
        stats.run.products_without_title += 1;
        return JoinedProduct::default();
    }

    let category = labels
        .category()
        .or_else(|| record.category_leaf())
        .unwrap_or_default()
        .to_string();
    let group = |polarity: Polarity, stats: &mut Statistics| {
        join_group(record, &category, &set, polarity, labels.get(polarity), config, stats)
    };

    JoinedProduct {
        positive: group(Polarity::Positive, stats),
        negative: group(Polarity::Negative, stats),
    }
}

fn join_group(
    record: &RawProductRecord,
    category: &str,
    set: &ParagraphSet,
    polarity: Polarity,
    labels: &[LabelRecord],
    config: &JoinConfig,
    stats: &mut Statistics,
) -> Option<OutputRecord> {
    if labels.is_empty() {
        return None;
    }
    let counts = stats.corpus_mut(polarity);

    // attributes in first-seen key order; repeated keys share one entry
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut slot_by_key: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        let slot = *slot_by_key.entry(label.key.as_str()).or_insert_with(|| {
            attributes.push(Attribute {
                key: label.key.clone(),
                evidences: Vec::new(),
            });
            attributes.len() - 1
        });

        if polarity == Polarity::Negative {
            if !label.evidences.is_empty() {
                debug!(
                    product = %record.id,
                    key = %label.key,
                    "ignoring {} evidences on negative label",
                    label.evidences.len()
                );
            }
            continue;
        }

        for raw in &label.evidences {
            match remap(raw, set, &config.rules) {
                Ok(evidence) => {
                    let evidences = &mut attributes[slot].evidences;
                    if !evidences.contains(&evidence) {
                        counts.evidences_accepted += 1;
                        evidences.push(evidence);
                    }
                }
                Err(rejection) => {
                    debug!(
                        product = %record.id,
                        key = %label.key,
                        source = %raw.source,
                        begin = raw.begin,
                        end = raw.end,
                        %rejection,
                        "rejected evidence"
                    );
                    counts.record_rejection(rejection);
                }
            }
        }
    }

    if polarity == Polarity::Positive {
        let before = attributes.len();
        attributes.retain(|a| !a.evidences.is_empty());
        counts.rejected_pairs += (before - attributes.len()) as u64;
    }

    if attributes.is_empty() {
        debug!(product = %record.id, ?polarity, "no attribute survived, dropping record");
        counts.records_without_attributes += 1;
        return None;
    }

    counts.record_output(category, &attributes);
    Some(OutputRecord {
        id: record.id.clone(),
        category: category.to_string(),
        paragraphs: set.paragraphs.clone(),
        attributes,
    })
}
