//! Local execution engine
//!
//! Reads both label files into a per-product map, streams the metadata
//! dump in batches, joins each batch on a rayon pool and writes the output
//! lines in metadata order. Output does not depend on batch size or thread
//! count: records keep their input order and statistics are merged with a
//! commutative reducer.

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{JoinConfig, PipelineConfig};
use crate::error::{DatasetError, Result};
use crate::joiner::{join_product, JoinedProduct};
use crate::labels::{LabelRecord, Polarity, ProductLabels};
use crate::metadata::RawProductRecord;
use crate::stats::Statistics;

/// Line-oriented JSON reader that reports bad lines instead of failing
pub struct JsonLinesReader {
    path: PathBuf,
    reader: BufReader<File>,
    line: usize,
    buf: Vec<u8>,
    repaired: u64,
}

impl JsonLinesReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line: 0,
            buf: Vec::new(),
            repaired: 0,
        })
    }

    /// Next non-blank line parsed as `T`. The inner result is a parse
    /// failure of that line alone; the outer one an I/O failure.
    pub fn next_record<T: DeserializeOwned>(
        &mut self,
    ) -> Result<Option<std::result::Result<T, serde_json::Error>>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .map_err(|source| DatasetError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let (line, dropped) = drop_lone_surrogates(&self.buf);
            if dropped > 0 {
                debug!(path = %self.path.display(), line = self.line, dropped, "dropped unpaired surrogate escapes");
                self.repaired += 1;
            }
            return Ok(Some(serde_json::from_slice(&line)));
        }
    }

    /// 1-based number of the line last read
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines so far that needed [`drop_lone_surrogates`]
    pub fn repaired(&self) -> u64 {
        self.repaired
    }
}

/// Drops `\uD800`-`\uDFFF` escapes that are not part of a high/low pair.
///
/// serde_json rejects such escapes; catalog dumps carry them from emoji cut
/// in half. Returns the repaired line and the number of escapes dropped.
pub fn drop_lone_surrogates(line: &[u8]) -> (Cow<'_, [u8]>, usize) {
    let suspect = line
        .windows(3)
        .any(|w| w[0] == b'\\' && w[1] == b'u' && matches!(w[2], b'd' | b'D'));
    if !suspect {
        return (Cow::Borrowed(line), 0);
    }

    let mut out = Vec::with_capacity(line.len());
    let mut dropped = 0;
    let mut i = 0;
    while i < line.len() {
        if line[i] != b'\\' {
            out.push(line[i]);
            i += 1;
            continue;
        }
        match surrogate_at(line, i) {
            Some(0xD800..=0xDBFF) if matches!(surrogate_at(line, i + 6), Some(0xDC00..=0xDFFF)) => {
                out.extend_from_slice(&line[i..i + 12]);
                i += 12;
            }
            Some(_) => {
                dropped += 1;
                i += 6;
            }
            None => {
                // other escapes, `\\` included, are copied whole
                let end = (i + 2).min(line.len());
                out.extend_from_slice(&line[i..end]);
                i = end;
            }
        }
    }
    (Cow::Owned(out), dropped)
}

/// Code unit of a `\uXXXX` escape at `at` when it is a surrogate
fn surrogate_at(line: &[u8], at: usize) -> Option<u16> {
    let escape = line.get(at..at + 6)?;
    if escape[0] != b'\\' || escape[1] != b'u' || !escape[2..].iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let hex = std::str::from_utf8(&escape[2..]).ok()?;
    let unit = u16::from_str_radix(hex, 16).ok()?;
    (0xD800..=0xDFFF).contains(&unit).then_some(unit)
}

/// Buffered JSON Lines writer
pub struct JsonLinesWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| DatasetError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|source| DatasetError::Write {
                path: self.path.clone(),
                source,
            })
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|source| DatasetError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Reads one label file into `labels`, counting malformed lines.
pub fn load_labels(
    path: &Path,
    polarity: Polarity,
    labels: &mut HashMap<String, ProductLabels>,
    stats: &mut Statistics,
) -> Result<usize> {
    let mut reader = JsonLinesReader::open(path)?;
    let mut loaded = 0;
    while let Some(parsed) = reader.next_record::<LabelRecord>()? {
        match parsed {
            Ok(label) => {
                labels.entry(label.id.clone()).or_default().push(polarity, label);
                loaded += 1;
            }
            Err(e) => {
                warn!(path = %reader.path().display(), line = reader.line(), "skipping malformed label: {e}");
                stats.run.malformed_label_lines += 1;
            }
        }
    }
    stats.run.unicode_repairs += reader.repaired();
    Ok(loaded)
}

/// Reads up to `size` metadata records, skipping malformed lines and
/// repeated ids (first occurrence in file order wins).
fn read_batch(
    reader: &mut JsonLinesReader,
    size: usize,
    seen: &mut HashSet<String>,
    stats: &mut Statistics,
) -> Result<Vec<RawProductRecord>> {
    let mut batch = Vec::with_capacity(size);
    while batch.len() < size {
        let Some(parsed) = reader.next_record::<RawProductRecord>()? else {
            break;
        };
        match parsed {
            Ok(record) => {
                stats.run.raw_records += 1;
                if seen.insert(record.id.clone()) {
                    batch.push(record);
                } else {
                    stats.run.duplicate_raw_ids += 1;
                }
            }
            Err(e) => {
                warn!(path = %reader.path().display(), line = reader.line(), "skipping malformed record: {e}");
                stats.run.malformed_raw_lines += 1;
            }
        }
    }
    Ok(batch)
}

/// Joins a batch in parallel; results come back in batch order.
fn process_batch(
    batch: &[RawProductRecord],
    labels: &HashMap<String, ProductLabels>,
    join: &JoinConfig,
) -> (Vec<JoinedProduct>, Statistics) {
    let empty = ProductLabels::default();
    let results: Vec<(JoinedProduct, Statistics)> = batch
        .par_iter()
        .map(|record| {
            let mut local = Statistics::default();
            let product_labels = labels.get(&record.id).unwrap_or(&empty);
            let joined = join_product(record, product_labels, join, &mut local);
            (joined, local)
        })
        .collect();

    let mut joined = Vec::with_capacity(results.len());
    let mut stats = Statistics::default();
    for (product, local) in results {
        joined.push(product);
        stats.merge(local);
    }
    (joined, stats)
}

/// Runs the whole pipeline and returns the merged statistics.
pub fn run(config: &PipelineConfig) -> Result<Statistics> {
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| DatasetError::Config(format!("cannot start worker pool: {e}")))?;

    let mut stats = Statistics::default();
    let mut labels: HashMap<String, ProductLabels> = HashMap::new();
    let positives = load_labels(&config.positive_labels_path, Polarity::Positive, &mut labels, &mut stats)?;
    let negatives = load_labels(&config.negative_labels_path, Polarity::Negative, &mut labels, &mut stats)?;
    info!(
        positives,
        negatives,
        products = labels.len(),
        "loaded labels"
    );

    let mut reader = JsonLinesReader::open(&config.metadata_path)?;
    let mut positive_out = JsonLinesWriter::create(&config.positive_output_path)?;
    let mut negative_out = JsonLinesWriter::create(&config.negative_output_path)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut matched = 0u64;
    loop {
        let batch = read_batch(&mut reader, config.batch_size, &mut seen, &mut stats)?;
        if batch.is_empty() {
            break;
        }
        matched += batch.iter().filter(|r| labels.contains_key(&r.id)).count() as u64;

        let (joined, batch_stats) = pool.install(|| process_batch(&batch, &labels, &config.join));
        stats.merge(batch_stats);
        for product in &joined {
            if let Some(record) = &product.positive {
                positive_out.write(record)?;
            }
            if let Some(record) = &product.negative {
                negative_out.write(record)?;
            }
        }
        info!(records = stats.run.raw_records, "processed batch of {}", batch.len());
    }
    positive_out.finish()?;
    negative_out.finish()?;
    stats.run.unicode_repairs += reader.repaired();

    stats.run.labels_without_metadata = labels.len() as u64 - matched;

    if let Some(path) = &config.stats_output_path {
        write_report(path, &stats)?;
    }

    info!(
        positive_products = stats.positive.products,
        positive_pairs = stats.positive.pairs,
        negative_products = stats.negative.products,
        negative_pairs = stats.negative.pairs,
        "run complete"
    );
    Ok(stats)
}

/// Writes the human-readable statistics summary.
pub fn write_report(path: &Path, stats: &Statistics) -> Result<()> {
    let file = File::create(path).map_err(|source| DatasetError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &stats.report())
        .map_err(std::io::Error::from)
        .and_then(|_| writer.write_all(b"\n"))
        .and_then(|_| writer.flush())
        .map_err(|source| DatasetError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_reader_skips_blank_and_reports_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.jsonl");
        fs::write(
            &path,
            "{\"id\": \"A\", \"key\": \"Color\"}\n\n   \nnot json\n{\"id\": \"B\", \"key\": \"Size\"}",
        )
        .unwrap();

        let mut labels = HashMap::new();
        let mut stats = Statistics::default();
        let loaded = load_labels(&path, Polarity::Negative, &mut labels, &mut stats).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(stats.run.malformed_label_lines, 1);
        assert_eq!(labels["B"].negative[0].key, "Size");
        assert!(labels["A"].positive.is_empty());
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jsonl");
        let err = JsonLinesReader::open(&missing).err().unwrap();
        assert!(matches!(err, DatasetError::Open { .. }));
        assert!(err.to_string().contains("missing.jsonl"));
    }

    #[test]
    fn test_drop_lone_surrogates() {
        let (line, dropped) = drop_lone_surrogates(br#"{"t": "plain"}"#);
        assert!(matches!(line, Cow::Borrowed(_)));
        assert_eq!(dropped, 0);

        let (line, dropped) = drop_lone_surrogates(br#"{"t": "bad \ud83d bullet"}"#);
        assert_eq!(&*line, br#"{"t": "bad  bullet"}"#);
        assert_eq!(dropped, 1);

        // a real pair and an escaped backslash stay untouched
        let raw = br#"{"t": "\ud83d\ude00 \\ud83d \uD83D"}"#;
        let (line, dropped) = drop_lone_surrogates(raw);
        assert_eq!(&*line, br#"{"t": "\ud83d\ude00 \\ud83d "}"#);
        assert_eq!(dropped, 1);
        let value: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["t"], "\u{1f600} \\ud83d ");

        let (line, dropped) = drop_lone_surrogates(br#""\ude00\ud83d x""#);
        assert_eq!(&*line, br#"" x""#);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_lone_surrogate_keeps_product() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta.jsonl");
        let pos = dir.path().join("pos_labels.jsonl");
        let neg = dir.path().join("neg_labels.jsonl");
        fs::write(
            &meta,
            r#"{"asin": "X1", "title": "Nickel Strings", "feature": ["bad \ud83d bullet", "Nickel wound"]}"#,
        )
        .unwrap();
        fs::write(
            &pos,
            r#"{"id": "X1", "key": "Material", "evidences": [{"value": "Nickel", "source": "title", "begin": 0, "end": 6}]}"#,
        )
        .unwrap();
        fs::write(&neg, "").unwrap();

        let config = PipelineConfig {
            metadata_path: meta,
            positive_labels_path: pos,
            negative_labels_path: neg,
            positive_output_path: dir.path().join("pos.jsonl"),
            negative_output_path: dir.path().join("neg.jsonl"),
            stats_output_path: None,
            join: JoinConfig::default(),
            batch_size: 10,
            threads: 1,
        };
        let stats = run(&config).unwrap();
        assert_eq!(stats.run.malformed_raw_lines, 0);
        assert_eq!(stats.run.unicode_repairs, 1);
        assert_eq!(stats.positive.products, 1);

        let output = fs::read_to_string(&config.positive_output_path).unwrap();
        let record: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(record["id"], "X1");
        assert_eq!(record["paragraphs"][1]["text"], "bad bullet");
        assert_eq!(record["paragraphs"][2]["text"], "Nickel wound");
    }

    #[test]
    fn test_batches_drop_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.jsonl");
        fs::write(
            &path,
            "{\"asin\": \"A\", \"title\": \"first\"}\n{\"asin\": \"B\"}\n{\"asin\": \"A\", \"title\": \"second\"}\n{\"title\": \"no id\"}\n",
        )
        .unwrap();

        let mut reader = JsonLinesReader::open(&path).unwrap();
        let mut seen = HashSet::new();
        let mut stats = Statistics::default();
        let first = read_batch(&mut reader, 2, &mut seen, &mut stats).unwrap();
        let second = read_batch(&mut reader, 2, &mut seen, &mut stats).unwrap();
        let third = read_batch(&mut reader, 2, &mut seen, &mut stats).unwrap();

        assert_eq!(first.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(second.is_empty());
        assert!(third.is_empty());
        assert_eq!(stats.run.raw_records, 3);
        assert_eq!(stats.run.duplicate_raw_ids, 1);
        assert_eq!(stats.run.malformed_raw_lines, 1);
    }
}
