//! Inference: encode a profile, score it, rank the products.

use std::path::Path;

use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::artifacts;
use crate::boost::GradientBoostingClassifier;
use crate::encoder::EncoderSet;
use crate::error::{Error, Result};
use crate::profile::{CustomerProfile, IncomeBracket, LifeEvent, MaritalStatus};
use crate::train::{FEATURE_COLUMNS, TARGET_COLUMN};

/// One product with the model's score for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub insurance: String,
    /// Class probability rounded to 3 decimals. A ranking signal, not a calibrated probability.
    pub confidence: f64,
}

fn round3(p: f64) -> f64 {
    (p * 1000.0).round() / 1000.0
}

/// Pairs names with probabilities, rounds, and sorts by descending confidence.
///
/// The sort is stable, so equal confidences keep the input (encoder) order.
pub fn rank<'a, I>(scores: I) -> Vec<Recommendation>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut ranked: Vec<Recommendation> = scores
        .into_iter()
        .map(|(name, p)| Recommendation {
            insurance: name.to_string(),
            confidence: round3(p),
        })
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}

/// Fitted model and encoders, loaded once and shared read-only across calls.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    model: GradientBoostingClassifier,
    encoders: EncoderSet,
}

impl RecommendationEngine {
    /// Pairs a model with the encoders it was trained with.
    pub fn new(model: GradientBoostingClassifier, encoders: EncoderSet) -> Result<Self> {
        let classes = encoders
            .get(TARGET_COLUMN)
            .map_err(|e| Error::artifact_load("<encoders>", e))?
            .len();
        for field in [MaritalStatus::FIELD, IncomeBracket::FIELD, LifeEvent::FIELD] {
            encoders
                .get(field)
                .map_err(|e| Error::artifact_load("<encoders>", e))?;
        }
        if model.n_classes() != classes {
            return Err(Error::artifact_load(
                "<model>",
                format!(
                    "model predicts {} classes but the label encoder has {classes}",
                    model.n_classes()
                ),
            ));
        }
        if model.n_features() != FEATURE_COLUMNS.len() {
            return Err(Error::artifact_load(
                "<model>",
                format!(
                    "model expects {} features, profiles encode to {}",
                    model.n_features(),
                    FEATURE_COLUMNS.len()
                ),
            ));
        }
        Ok(Self { model, encoders })
    }

    /// Loads both artifacts from disk. Any failure is an [`Error::ArtifactLoad`].
    pub fn load(model_path: &Path, encoders_path: &Path) -> Result<Self> {
        let model = artifacts::load_model(model_path)?;
        let encoders = artifacts::load_encoders(encoders_path)?;
        let engine = Self::new(model, encoders).map_err(|e| match e {
            Error::ArtifactLoad { reason, .. } => Error::artifact_load(model_path, reason),
            other => other,
        })?;
        info!(
            "loaded recommendation model ({} classes) from {}",
            engine.classes().len(),
            model_path.display()
        );
        Ok(engine)
    }

    /// Product names in encoder order, which is also the model's output order.
    pub fn classes(&self) -> &[String] {
        self.encoders
            .get(TARGET_COLUMN)
            .map(|e| e.classes())
            .unwrap_or_default()
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    /// Single-row feature matrix in training column order.
    pub fn encode(&self, profile: &CustomerProfile) -> Result<Array2<f64>> {
        let marital = self.encoders.encode(MaritalStatus::FIELD, profile.marital_status.as_str())?;
        let income = self.encoders.encode(IncomeBracket::FIELD, profile.income_bracket.as_str())?;
        let event = self.encoders.encode(LifeEvent::FIELD, profile.life_event.as_str())?;
        let row = vec![
            f64::from(profile.age),
            marital as f64,
            f64::from(u8::from(profile.has_kids)),
            income as f64,
            event as f64,
        ];
        Ok(Array2::from_shape_vec((1, FEATURE_COLUMNS.len()), row)?)
    }

    /// Unrounded class probabilities in encoder order. They sum to 1.
    pub fn class_probabilities(&self, profile: &CustomerProfile) -> Result<Vec<(String, f64)>> {
        let x = self.encode(profile)?;
        let proba = self.model.predict_proba(x.view())?;
        Ok(self
            .classes()
            .iter()
            .cloned()
            .zip(proba.row(0).iter().copied())
            .collect())
    }

    /// Every trained product ranked by descending confidence.
    pub fn recommend(&self, profile: &CustomerProfile) -> Result<Vec<Recommendation>> {
        let probabilities = self.class_probabilities(profile)?;
        let ranked = rank(probabilities.iter().map(|(name, p)| (name.as_str(), *p)));
        if let Some(top) = ranked.first() {
            debug!("top recommendation {} ({:.3}) for {profile:?}", top.insurance, top.confidence);
        }
        Ok(ranked)
    }

    /// String-typed entry point: validates the fields, then recommends.
    pub fn recommend_fields(
        &self,
        age: i64,
        marital_status: &str,
        has_kids: bool,
        income_bracket: &str,
        life_event: &str,
    ) -> Result<Vec<Recommendation>> {
        let profile = CustomerProfile::parse(age, marital_status, has_kids, income_bracket, life_event)?;
        self.recommend(&profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::GradientBoostingParams;
    use crate::generate::{TableRow, generate};
    use crate::train::{TrainingConfig, train};
    use approx::assert_abs_diff_eq;
    use std::sync::OnceLock;

    fn engine() -> &'static RecommendationEngine {
        static ENGINE: OnceLock<RecommendationEngine> = OnceLock::new();
        ENGINE.get_or_init(|| {
            let rows: Vec<TableRow> = generate(1000, 42).iter().map(TableRow::from).collect();
            let config = TrainingConfig {
                params: GradientBoostingParams::new().n_estimators(30),
                ..TrainingConfig::default()
            };
            let outcome = train(&rows, &config).unwrap();
            RecommendationEngine::new(outcome.model, outcome.encoders).unwrap()
        })
    }

    fn all_profiles() -> Vec<CustomerProfile> {
        let mut out = Vec::new();
        for age in [18, 29, 30, 45, 55, 70, 99] {
            for &m in MaritalStatus::ALL {
                for kids in [false, true] {
                    for &i in IncomeBracket::ALL {
                        for &e in LifeEvent::ALL {
                            out.push(CustomerProfile::new(age, m, kids, i, e).unwrap());
                        }
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let ranked = rank([("auto", 0.2), ("health", 0.4), ("home", 0.2), ("term_life", 0.2)]);
        let names: Vec<_> = ranked.iter().map(|r| r.insurance.as_str()).collect();
        assert_eq!(names, ["health", "auto", "home", "term_life"]);
    }

    #[test]
    fn test_rank_rounds_to_three_decimals() {
        let ranked = rank([("a", 0.12345), ("b", 0.87655)]);
        assert_eq!(ranked[0].confidence, 0.877);
        assert_eq!(ranked[1].confidence, 0.123);
    }

    #[test]
    fn test_rounding_ties_keep_encoder_order() {
        // Distinct raw scores that round to the same confidence.
        let ranked = rank([("x", 0.3331), ("y", 0.3334), ("z", 0.3336)]);
        let names: Vec<_> = ranked.iter().map(|r| r.insurance.as_str()).collect();
        assert_eq!(names, ["z", "x", "y"]);
    }

    #[test]
    fn test_ranking_serializes_as_json_records() {
        let ranked = rank([("health", 0.25), ("term_life", 0.75)]);
        let json = serde_json::to_string(&ranked).unwrap();
        assert_eq!(
            json,
            r#"[{"insurance":"term_life","confidence":0.75},{"insurance":"health","confidence":0.25}]"#
        );
        let back: Vec<Recommendation> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ranked);
    }

    #[test]
    fn test_recommendations_cover_all_classes_and_sum_to_one() {
        let engine = engine();
        for profile in all_profiles() {
            let probabilities = engine.class_probabilities(&profile).unwrap();
            let total: f64 = probabilities.iter().map(|(_, p)| p).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);

            let ranked = engine.recommend(&profile).unwrap();
            assert_eq!(ranked.len(), engine.classes().len());
            assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
            assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        }
    }

    #[test]
    fn test_ties_follow_class_order() {
        let engine = engine();
        let order = |name: &str| engine.classes().iter().position(|c| c == name).unwrap();
        for profile in all_profiles().into_iter().step_by(7) {
            let ranked = engine.recommend(&profile).unwrap();
            for w in ranked.windows(2) {
                if w[0].confidence == w[1].confidence {
                    assert!(order(&w[0].insurance) < order(&w[1].insurance));
                }
            }
        }
    }

    #[test]
    fn test_new_baby_recommends_term_life() {
        let ranked = engine()
            .recommend_fields(34, "married", true, "medium", "new_baby")
            .unwrap();
        assert_eq!(ranked[0].insurance, "term_life");
    }

    #[test]
    fn test_senior_recommends_whole_life() {
        let ranked = engine()
            .recommend_fields(60, "single", false, "medium", "none")
            .unwrap();
        assert_eq!(ranked[0].insurance, "whole_life");
    }

    #[test]
    fn test_invalid_input_is_validation_error() {
        assert!(matches!(
            engine().recommend_fields(12, "single", false, "low", "none"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            engine().recommend_fields(30, "single", false, "rich", "none"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_unseen_category_is_unknown_category_error() {
        // Train on a table that never contains "widowed".
        let rows: Vec<TableRow> = generate(600, 8)
            .iter()
            .filter(|ex| ex.profile.marital_status != MaritalStatus::Widowed)
            .map(TableRow::from)
            .collect();
        let config = TrainingConfig {
            params: GradientBoostingParams::new().n_estimators(5),
            ..TrainingConfig::default()
        };
        let outcome = train(&rows, &config).unwrap();
        let engine = RecommendationEngine::new(outcome.model, outcome.encoders).unwrap();

        match engine.recommend_fields(40, "widowed", false, "medium", "none") {
            Err(Error::UnknownCategory { field, value }) => {
                assert_eq!(field, "marital_status");
                assert_eq!(value, "widowed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_artifacts_rejected() {
        let engine = engine();
        let mut encoders = EncoderSet::new();
        for e in engine.encoders().iter() {
            if e.field() != TARGET_COLUMN {
                encoders.insert(e.clone());
            }
        }
        encoders.insert(crate::encoder::LabelEncoder::fit(TARGET_COLUMN, ["auto", "home"]));
        let err = RecommendationEngine::new(engine.model.clone(), encoders).unwrap_err();
        assert!(matches!(err, Error::ArtifactLoad { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.msgpack");
        let encoders_path = dir.path().join("encoders.msgpack");
        let engine = engine();
        artifacts::save_model(&model_path, &engine.model).unwrap();
        artifacts::save_encoders(&encoders_path, engine.encoders()).unwrap();

        let loaded = RecommendationEngine::load(&model_path, &encoders_path).unwrap();
        let profile = CustomerProfile::parse(45, "divorced", true, "high", "bought_home").unwrap();
        assert_eq!(loaded.recommend(&profile).unwrap(), engine.recommend(&profile).unwrap());

        assert!(matches!(
            RecommendationEngine::load(&dir.path().join("missing.msgpack"), &encoders_path),
            Err(Error::ArtifactLoad { .. })
        ));
    }
}
