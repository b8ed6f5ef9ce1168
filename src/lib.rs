//! Attribute-value dataset cleaner
//!
//! Joins product metadata with attribute labels and produces training
//! records whose evidence spans point into cleaned paragraphs:
//! - Text cleaning with a raw-to-cleaned offset map
//! - Metadata normalization into tagged source fields
//! - Paragraph building, deduplication and filtering
//! - Evidence span remapping with explicit rejections
//! - Per-product join with mergeable corpus statistics
//! - Local batch engine and a C interface for foreign engines

pub mod cleaner;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod filters;
pub mod joiner;
pub mod labels;
pub mod metadata;
pub mod paragraphs;
pub mod remap;
pub mod stats;

pub use cleaner::{clean, clean_text, CleanedText, CleaningRules, OffsetMap, Slot};
pub use config::{JoinConfig, PipelineConfig, DEFAULT_BATCH_SIZE};
pub use error::{DatasetError, Result};
pub use ffi::*;
pub use joiner::{join_product, Attribute, JoinedProduct, OutputRecord};
pub use labels::{LabelRecord, Polarity, ProductLabels, RawEvidence};
pub use metadata::{normalize, RawField, RawProductRecord, SourceTag};
pub use paragraphs::{CleanedParagraph, ParagraphSet};
pub use remap::{remap, Evidence, Rejection};
pub use stats::{Statistics, StatsReport};
