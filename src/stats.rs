//! Corpus statistics
//!
//! Counters are plain sums, so [`Statistics::merge`] is commutative and
//! associative: each worker fills its own accumulator and the results can
//! be combined in any order or grouping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filters::ParagraphDrop;
use crate::joiner::Attribute;
use crate::labels::Polarity;
use crate::paragraphs::ParagraphSet;
use crate::remap::Rejection;

/// Products bucketed by number of attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeBuckets {
    #[serde(rename = "1-2")]
    pub one_to_two: u64,
    #[serde(rename = "3-5")]
    pub three_to_five: u64,
    #[serde(rename = ">=6")]
    pub six_or_more: u64,
}

impl AttributeBuckets {
    fn add(&mut self, attributes: usize) {
        match attributes {
            0 => {}
            1..=2 => self.one_to_two += 1,
            3..=5 => self.three_to_five += 1,
            _ => self.six_or_more += 1,
        }
    }

    fn merge(&mut self, other: AttributeBuckets) {
        self.one_to_two += other.one_to_two;
        self.three_to_five += other.three_to_five;
        self.six_or_more += other.six_or_more;
    }
}

/// Counts for one output file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusCounts {
    /// Products written
    pub products: u64,
    /// Product-attribute pairs written
    pub pairs: u64,
    pub buckets: AttributeBuckets,
    /// Products per category
    pub categories: BTreeMap<String, u64>,
    /// Pairs per attribute key
    pub attributes: BTreeMap<String, u64>,
    /// Pairs per category, then attribute key
    pub category_attributes: BTreeMap<String, BTreeMap<String, u64>>,
    pub evidences_accepted: u64,
    pub evidences_rejected: BTreeMap<Rejection, u64>,
    /// Attributes whose evidences were all rejected
    pub rejected_pairs: u64,
    /// Labeled products dropped because no attribute survived
    pub records_without_attributes: u64,
}

impl CorpusCounts {
    pub fn record_output(&mut self, category: &str, attributes: &[Attribute]) {
        self.products += 1;
        self.pairs += attributes.len() as u64;
        self.buckets.add(attributes.len());
        *self.categories.entry(category.to_string()).or_default() += 1;
        let per_category = self.category_attributes.entry(category.to_string()).or_default();
        for attribute in attributes {
            *self.attributes.entry(attribute.key.clone()).or_default() += 1;
            *per_category.entry(attribute.key.clone()).or_default() += 1;
        }
    }

    pub fn record_rejection(&mut self, rejection: Rejection) {
        *self.evidences_rejected.entry(rejection).or_default() += 1;
    }

    pub fn unique_category_attribute_pairs(&self) -> usize {
        self.category_attributes.values().map(BTreeMap::len).sum()
    }

    pub fn merge(&mut self, other: CorpusCounts) {
        self.products += other.products;
        self.pairs += other.pairs;
        self.buckets.merge(other.buckets);
        merge_counts(&mut self.categories, other.categories);
        merge_counts(&mut self.attributes, other.attributes);
        for (category, attributes) in other.category_attributes {
            merge_counts(self.category_attributes.entry(category).or_default(), attributes);
        }
        self.evidences_accepted += other.evidences_accepted;
        merge_counts(&mut self.evidences_rejected, other.evidences_rejected);
        self.rejected_pairs += other.rejected_pairs;
        self.records_without_attributes += other.records_without_attributes;
    }
}

/// Counters for the whole run, independent of polarity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCounts {
    pub raw_records: u64,
    pub malformed_raw_lines: u64,
    pub malformed_label_lines: u64,
    /// Lines whose unpaired surrogate escapes were dropped before parsing
    pub unicode_repairs: u64,
    pub duplicate_raw_ids: u64,
    /// Metadata products with no label in either file
    pub products_without_labels: u64,
    /// Labeled product ids absent from metadata
    pub labels_without_metadata: u64,
    pub products_without_title: u64,
    pub paragraphs: u64,
    pub duplicate_paragraphs: u64,
    pub dropped_paragraphs: BTreeMap<ParagraphDrop, u64>,
}

impl RunCounts {
    pub fn merge(&mut self, other: RunCounts) {
        self.raw_records += other.raw_records;
        self.malformed_raw_lines += other.malformed_raw_lines;
        self.malformed_label_lines += other.malformed_label_lines;
        self.unicode_repairs += other.unicode_repairs;
        self.duplicate_raw_ids += other.duplicate_raw_ids;
        self.products_without_labels += other.products_without_labels;
        self.labels_without_metadata += other.labels_without_metadata;
        self.products_without_title += other.products_without_title;
        self.paragraphs += other.paragraphs;
        self.duplicate_paragraphs += other.duplicate_paragraphs;
        merge_counts(&mut self.dropped_paragraphs, other.dropped_paragraphs);
    }
}

/// Accumulator for one worker, partition or whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub positive: CorpusCounts,
    pub negative: CorpusCounts,
    pub run: RunCounts,
}

impl Statistics {
    pub fn corpus(&self, polarity: Polarity) -> &CorpusCounts {
        match polarity {
            Polarity::Positive => &self.positive,
            Polarity::Negative => &self.negative,
        }
    }

    pub fn corpus_mut(&mut self, polarity: Polarity) -> &mut CorpusCounts {
        match polarity {
            Polarity::Positive => &mut self.positive,
            Polarity::Negative => &mut self.negative,
        }
    }

    pub fn record_paragraphs(&mut self, set: &ParagraphSet) {
        self.run.paragraphs += set.paragraphs.len() as u64;
        self.run.duplicate_paragraphs += set.duplicates as u64;
        for reason in set.drops() {
            *self.run.dropped_paragraphs.entry(reason).or_default() += 1;
        }
    }

    pub fn merge(&mut self, other: Statistics) {
        self.positive.merge(other.positive);
        self.negative.merge(other.negative);
        self.run.merge(other.run);
    }

    /// Merges two accumulators; the reducer handed to parallel folds
    pub fn combine(mut self, other: Statistics) -> Statistics {
        self.merge(other);
        self
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            positive: CorpusReport::from(&self.positive),
            negative: CorpusReport::from(&self.negative),
            run: self.run.clone(),
        }
    }
}

/// Summary of one output file, as written to the statistics file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusReport {
    pub products: u64,
    pub product_attribute_pairs: u64,
    pub attributes_per_product: AttributeBuckets,
    pub unique_categories: usize,
    pub unique_attributes: usize,
    pub unique_category_attribute_pairs: usize,
    pub evidences_accepted: u64,
    pub evidences_rejected: BTreeMap<Rejection, u64>,
    pub rejected_pairs: u64,
    pub records_without_attributes: u64,
}

impl From<&CorpusCounts> for CorpusReport {
    fn from(counts: &CorpusCounts) -> Self {
        Self {
            products: counts.products,
            product_attribute_pairs: counts.pairs,
            attributes_per_product: counts.buckets.clone(),
            unique_categories: counts.categories.len(),
            unique_attributes: counts.attributes.len(),
            unique_category_attribute_pairs: counts.unique_category_attribute_pairs(),
            evidences_accepted: counts.evidences_accepted,
            evidences_rejected: counts.evidences_rejected.clone(),
            rejected_pairs: counts.rejected_pairs,
            records_without_attributes: counts.records_without_attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub positive: CorpusReport,
    pub negative: CorpusReport,
    pub run: RunCounts,
}

fn merge_counts<K: Ord>(into: &mut BTreeMap<K, u64>, from: BTreeMap<K, u64>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}
