//! Seeded synthetic customer generator and the CSV table it produces.
//!
//! All randomness comes from one [`StdRng`] seeded once per run. For each
//! customer the draws happen in this order:
//!
//! 1. `age` - uniform integer in `[18, 70)`
//! 2. `marital_status` - one `f64` in `[0, 1)` mapped through cumulative weights
//! 3. `has_kids` - Bernoulli(0.5)
//! 4. `income_bracket` - one `f64` mapped through cumulative weights
//! 5. `life_event` - uniform index over the 7 events
//! 6. only when no rule matches: uniform index over the fallback products

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::{CustomerProfile, IncomeBracket, Insurance, LifeEvent, MaritalStatus};
use crate::rules::{self, Decision, FALLBACK_PRODUCTS};

pub const DEFAULT_ROWS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;

/// Synthetic ages are drawn from `[GEN_MIN_AGE, GEN_MAX_AGE)`.
pub const GEN_MIN_AGE: u32 = 18;
pub const GEN_MAX_AGE: u32 = 70;

const MARITAL_WEIGHTS: [(MaritalStatus, f64); 4] = [
    (MaritalStatus::Single, 0.4),
    (MaritalStatus::Married, 0.4),
    (MaritalStatus::Divorced, 0.1),
    (MaritalStatus::Widowed, 0.1),
];

const INCOME_WEIGHTS: [(IncomeBracket, f64); 3] = [
    (IncomeBracket::Low, 0.3),
    (IncomeBracket::Medium, 0.5),
    (IncomeBracket::High, 0.2),
];

/// A generated customer together with its ground-truth product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledExample {
    pub profile: CustomerProfile,
    pub recommended_insurance: Insurance,
}

/// One row of the flat table exchanged between generator and trainer.
///
/// Categories stay as strings so that the trainer fits its encoders on
/// exactly what is stored, whatever produced the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub age: u32,
    pub marital_status: String,
    pub has_kids: u8,
    pub income_bracket: String,
    pub life_event: String,
    pub recommended_insurance: String,
}

impl From<&LabeledExample> for TableRow {
    fn from(ex: &LabeledExample) -> Self {
        let p = &ex.profile;
        TableRow {
            age: p.age,
            marital_status: p.marital_status.as_str().to_string(),
            has_kids: u8::from(p.has_kids),
            income_bracket: p.income_bracket.as_str().to_string(),
            life_event: p.life_event.as_str().to_string(),
            recommended_insurance: ex.recommended_insurance.as_str().to_string(),
        }
    }
}

/// Row count and label distribution of a generated dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub rows: usize,
    pub label_counts: BTreeMap<Insurance, usize>,
}

impl GenerationSummary {
    pub fn of(examples: &[LabeledExample]) -> Self {
        let mut label_counts = BTreeMap::new();
        for ex in examples {
            *label_counts.entry(ex.recommended_insurance).or_insert(0) += 1;
        }
        GenerationSummary {
            rows: examples.len(),
            label_counts,
        }
    }
}

impl fmt::Display for GenerationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows: {}", self.rows)?;
        let mut counts: Vec<_> = self.label_counts.iter().collect();
        // Most frequent first, ties in product order.
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (label, count) in counts {
            writeln!(f, "{:<15} {:>5}", label.as_str(), count)?;
        }
        Ok(())
    }
}

fn pick_weighted<T: Copy>(u: f64, weights: &[(T, f64)]) -> T {
    let mut cumulative = 0.0;
    for &(value, weight) in weights {
        cumulative += weight;
        if u < cumulative {
            return value;
        }
    }
    // Only reachable through rounding in the cumulative sum.
    weights[weights.len() - 1].0
}

fn sample_profile(rng: &mut StdRng) -> CustomerProfile {
    let age = rng.random_range(GEN_MIN_AGE..GEN_MAX_AGE);
    let marital_status = pick_weighted(rng.random::<f64>(), &MARITAL_WEIGHTS);
    let has_kids = rng.random_bool(0.5);
    let income_bracket = pick_weighted(rng.random::<f64>(), &INCOME_WEIGHTS);
    let life_event = LifeEvent::ALL[rng.random_range(0..LifeEvent::ALL.len())];
    CustomerProfile {
        age,
        marital_status,
        has_kids,
        income_bracket,
        life_event,
    }
}

/// Generates `count` labeled customers from a single seeded stream.
pub fn generate(count: usize, seed: u64) -> Vec<LabeledExample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fallbacks = 0usize;

    let examples: Vec<_> = (0..count)
        .map(|_| {
            let profile = sample_profile(&mut rng);
            let decision = rules::decide(&profile);
            trace!("{profile:?}: {}", decision.describe());
            let recommended_insurance = match decision {
                Decision::Matched { product, .. } => product,
                Decision::Fallback => {
                    fallbacks += 1;
                    FALLBACK_PRODUCTS[rng.random_range(0..FALLBACK_PRODUCTS.len())]
                }
            };
            LabeledExample {
                profile,
                recommended_insurance,
            }
        })
        .collect();

    debug!("generated {count} customers (seed {seed}), {fallbacks} labeled by random fallback");
    examples
}

/// Writes the table, header included, to any writer.
pub fn write_table<W: Write>(writer: W, examples: &[LabeledExample]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for ex in examples {
        wtr.serialize(TableRow::from(ex))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the table to `path`, creating parent directories and replacing any existing file.
pub fn write_table_to_path(path: &Path, examples: &[LabeledExample]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_table(File::create(path)?, examples)?;
    info!("wrote {} rows to {}", examples.len(), path.display());
    Ok(())
}

/// Reads table rows from any reader.
pub fn read_table<R: Read>(reader: R) -> Result<Vec<TableRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: TableRow = result?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads the table at `path`. A missing file is a data-integrity failure.
pub fn read_table_from_path(path: &Path) -> Result<Vec<TableRow>> {
    let file = File::open(path).map_err(|e| {
        Error::DataIntegrity(format!("cannot open training table {}: {e}", path.display()))
    })?;
    let rows = read_table(file)?;
    debug!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_bytes() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_table(&mut a, &generate(500, 7)).unwrap();
        write_table(&mut b, &generate(500, 7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_differs() {
        assert_ne!(generate(200, 1), generate(200, 2));
    }

    #[test]
    fn test_attribute_domains() {
        for ex in generate(2000, DEFAULT_SEED) {
            let p = ex.profile;
            assert!((GEN_MIN_AGE..GEN_MAX_AGE).contains(&p.age));
        }
    }

    #[test]
    fn test_labels_follow_rules() {
        for ex in generate(2000, DEFAULT_SEED) {
            match rules::decide(&ex.profile) {
                Decision::Matched { product, .. } => assert_eq!(ex.recommended_insurance, product),
                Decision::Fallback => assert!(FALLBACK_PRODUCTS.contains(&ex.recommended_insurance)),
            }
            if ex.profile.life_event == LifeEvent::NewBaby {
                assert_eq!(ex.recommended_insurance, Insurance::TermLife);
            }
        }
    }

    #[test]
    fn test_marital_weights_roughly_hold() {
        let examples = generate(10_000, 3);
        let single = examples
            .iter()
            .filter(|e| e.profile.marital_status == MaritalStatus::Single)
            .count() as f64
            / examples.len() as f64;
        let widowed = examples
            .iter()
            .filter(|e| e.profile.marital_status == MaritalStatus::Widowed)
            .count() as f64
            / examples.len() as f64;
        assert!((single - 0.4).abs() < 0.03, "single share {single}");
        assert!((widowed - 0.1).abs() < 0.02, "widowed share {widowed}");
    }

    #[test]
    fn test_pick_weighted_edges() {
        assert_eq!(pick_weighted(0.0, &INCOME_WEIGHTS), IncomeBracket::Low);
        assert_eq!(pick_weighted(0.3, &INCOME_WEIGHTS), IncomeBracket::Medium);
        assert_eq!(pick_weighted(0.79, &INCOME_WEIGHTS), IncomeBracket::Medium);
        assert_eq!(pick_weighted(0.999_999, &INCOME_WEIGHTS), IncomeBracket::High);
    }

    #[test]
    fn test_table_round_trip_keeps_strings() {
        let examples = generate(50, 11);
        let mut buf = Vec::new();
        write_table(&mut buf, &examples).unwrap();

        let header = String::from_utf8(buf.clone()).unwrap();
        assert!(header.starts_with(
            "age,marital_status,has_kids,income_bracket,life_event,recommended_insurance\n"
        ));

        let rows = read_table(buf.as_slice()).unwrap();
        let expected: Vec<TableRow> = examples.iter().map(TableRow::from).collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_summary_counts() {
        let examples = generate(300, 5);
        let summary = GenerationSummary::of(&examples);
        assert_eq!(summary.rows, 300);
        assert_eq!(summary.label_counts.values().sum::<usize>(), 300);
    }

    #[test]
    fn test_missing_table_is_data_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table_from_path(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }
}
