//! Encoding, train/test split, model fitting and held-out evaluation.

use std::fmt;
use std::path::Path;

use linfa::prelude::{DatasetBase, Fit, Predict};
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;

use crate::artifacts;
use crate::boost::{BoostError, GradientBoostingClassifier, GradientBoostingParams};
use crate::encoder::{EncoderSet, LabelEncoder};
use crate::error::{Error, Result};
use crate::generate::{self, TableRow};
use crate::profile::{IncomeBracket, Insurance, LifeEvent, MAX_AGE, MIN_AGE, MaritalStatus};

/// Categorical columns that get a label encoder, the target last.
pub const CATEGORICAL_COLUMNS: [&str; 4] = [
    MaritalStatus::FIELD,
    IncomeBracket::FIELD,
    LifeEvent::FIELD,
    Insurance::FIELD,
];

/// Feature column order shared by training and inference.
pub const FEATURE_COLUMNS: [&str; 5] = [
    "age",
    MaritalStatus::FIELD,
    "has_kids",
    IncomeBracket::FIELD,
    LifeEvent::FIELD,
];

pub const TARGET_COLUMN: &str = Insurance::FIELD;

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub test_ratio: f64,
    pub seed: u64,
    pub params: GradientBoostingParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            test_ratio: 0.2,
            seed: 42,
            params: GradientBoostingParams::new().n_estimators(100).max_depth(4),
        }
    }
}

/// Row indices of the two partitions. They are disjoint and together cover every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles `0..n` with a seeded generator and holds out `ceil(n * test_ratio)` rows.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> SplitIndices {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64) * test_ratio).ceil() as usize;
    let test_size = test_size.min(n);
    let train = indices.split_off(test_size);
    SplitIndices { train, test: indices }
}

/// Fits one encoder per categorical column on every row of the table.
pub fn fit_encoders(rows: &[TableRow]) -> EncoderSet {
    let mut set = EncoderSet::new();
    set.insert(LabelEncoder::fit(
        MaritalStatus::FIELD,
        rows.iter().map(|r| r.marital_status.as_str()),
    ));
    set.insert(LabelEncoder::fit(
        IncomeBracket::FIELD,
        rows.iter().map(|r| r.income_bracket.as_str()),
    ));
    set.insert(LabelEncoder::fit(LifeEvent::FIELD, rows.iter().map(|r| r.life_event.as_str())));
    set.insert(LabelEncoder::fit(
        Insurance::FIELD,
        rows.iter().map(|r| r.recommended_insurance.as_str()),
    ));
    set
}

/// Turns the table into a numeric feature matrix (columns as [`FEATURE_COLUMNS`]) and target codes.
pub fn encode_table(rows: &[TableRow], encoders: &EncoderSet) -> Result<(Array2<f64>, Array1<usize>)> {
    let mut features = Vec::with_capacity(rows.len() * FEATURE_COLUMNS.len());
    let mut targets = Vec::with_capacity(rows.len());

    for (line, row) in rows.iter().enumerate() {
        if row.has_kids > 1 {
            return Err(Error::DataIntegrity(format!(
                "row {}: has_kids must be 0 or 1, got {}",
                line + 1,
                row.has_kids
            )));
        }
        if !(MIN_AGE..MAX_AGE).contains(&row.age) {
            return Err(Error::DataIntegrity(format!(
                "row {}: age must be in [{MIN_AGE}, {MAX_AGE}), got {}",
                line + 1,
                row.age
            )));
        }
        features.extend_from_slice(&[
            f64::from(row.age),
            encoders.encode(MaritalStatus::FIELD, &row.marital_status)? as f64,
            f64::from(row.has_kids),
            encoders.encode(IncomeBracket::FIELD, &row.income_bracket)? as f64,
            encoders.encode(LifeEvent::FIELD, &row.life_event)? as f64,
        ]);
        targets.push(encoders.encode(TARGET_COLUMN, &row.recommended_insurance)?);
    }

    let x = Array2::from_shape_vec((rows.len(), FEATURE_COLUMNS.len()), features)?;
    Ok((x, Array1::from_vec(targets)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Held-out metrics, reported with class names rather than codes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Builds the report from true and predicted codes. `class_names[code]` names each code.
    pub fn new(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Self {
        let k = class_names.len();
        let mut tp = vec![0usize; k];
        let mut predicted = vec![0usize; k];
        let mut actual = vec![0usize; k];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            actual[t] += 1;
            predicted[p] += 1;
            if t == p {
                tp[t] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = (0..k)
            .map(|c| {
                let precision = ratio(tp[c], predicted[c]);
                let recall = ratio(tp[c], actual[c]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class: class_names[c].clone(),
                    precision,
                    recall,
                    f1,
                    support: actual[c],
                }
            })
            .collect();

        let total = y_true.len();
        let correct = tp.iter().sum();
        let kf = k.max(1) as f64;
        let macro_avg = ClassMetrics {
            class: "macro avg".to_string(),
            precision: classes.iter().map(|m| m.precision).sum::<f64>() / kf,
            recall: classes.iter().map(|m| m.recall).sum::<f64>() / kf,
            f1: classes.iter().map(|m| m.f1).sum::<f64>() / kf,
            support: total,
        };
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            class: "weighted avg".to_string(),
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        };

        ClassificationReport {
            accuracy: ratio(correct, total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.class.len())
            .chain([self.weighted_avg.class.len()])
            .max()
            .unwrap_or(0);
        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for m in [&self.macro_avg, &self.weighted_avg] {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

/// Everything produced by one training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: GradientBoostingClassifier,
    pub encoders: EncoderSet,
    pub report: ClassificationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Fits encoders and the classifier on `rows`, evaluating on a held-out partition.
pub fn train(rows: &[TableRow], config: &TrainingConfig) -> Result<TrainingOutcome> {
    if rows.is_empty() {
        return Err(Error::DataIntegrity("training table has no rows".into()));
    }
    if !(0.0..1.0).contains(&config.test_ratio) {
        return Err(Error::Config(format!(
            "test ratio must be in [0, 1), got {}",
            config.test_ratio
        )));
    }

    let encoders = fit_encoders(rows);
    for encoder in encoders.iter() {
        debug!("'{}' categories: {:?}", encoder.field(), encoder.classes());
    }
    let (x, y) = encode_table(rows, &encoders)?;

    let split = train_test_split(rows.len(), config.test_ratio, config.seed);
    if split.train.is_empty() {
        return Err(Error::DataIntegrity(format!(
            "{} rows leave nothing to train on after holding out {:.0}%",
            rows.len(),
            config.test_ratio * 100.0
        )));
    }
    info!("training on {} rows, testing on {} rows", split.train.len(), split.test.len());

    let n_classes = encoders.get(TARGET_COLUMN)?.len();
    if n_classes < 2 {
        return Err(Error::DataIntegrity(format!(
            "'{TARGET_COLUMN}' needs at least two distinct classes, found {n_classes}"
        )));
    }
    let train_set = DatasetBase::new(x.select(Axis(0), &split.train), y.select(Axis(0), &split.train));
    let params = config.params.clone().n_classes(n_classes);
    let fitted: std::result::Result<GradientBoostingClassifier, BoostError> = params.fit(&train_set);
    let model = fitted?;
    info!("fitted {} boosting rounds over {} classes", model.n_rounds(), model.n_classes());

    let x_test = x.select(Axis(0), &split.test);
    let y_test = y.select(Axis(0), &split.test);
    let y_pred: Array1<usize> = model.predict(&x_test);
    let class_names = encoders.get(TARGET_COLUMN)?.classes().to_vec();
    let report = ClassificationReport::new(&y_test.to_vec(), &y_pred.to_vec(), &class_names);
    info!("held-out accuracy {:.3}", report.accuracy);

    Ok(TrainingOutcome {
        model,
        encoders,
        report,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
    })
}

/// Reads the table at `input`, trains, and only then writes both artifacts.
pub fn train_and_persist(
    input: &Path,
    model_path: &Path,
    encoders_path: &Path,
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    let rows = generate::read_table_from_path(input)?;
    let outcome = train(&rows, config)?;
    artifacts::save_trained(model_path, &outcome.model, encoders_path, &outcome.encoders)?;
    Ok(outcome)
}
