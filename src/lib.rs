//! # insurance-recommender
//!
//! Recommend an insurance product from a short customer profile using a
//! gradient-boosted tree classifier trained on synthetic data.
//!
//! The pipeline runs in three stages that only share files:
//!
//! - [`generate`] draws a labeled customer table from a seeded stream and
//!   the decision list in [`rules`]
//! - [`train`] fits label encoders and a [`boost::GradientBoostingClassifier`]
//!   (a linfa estimator), reports held-out metrics and persists both
//!   artifacts with `rmp-serde` (MessagePack)
//! - [`recommend`] loads the artifacts once and ranks every product for a
//!   new profile
//!
//! [`advisor`] and [`interview`] make up the interactive chatbot around the
//! engine.
//!
//! ## Example
//! ```rust,no_run
//! use std::path::Path;
//! use insurance_recommender::RecommendationEngine;
//!
//! let engine = RecommendationEngine::load(
//!     Path::new("model/insurance_model.msgpack"),
//!     Path::new("model/label_encoders.msgpack"),
//! )?;
//! for rec in engine.recommend_fields(34, "married", true, "medium", "new_baby")? {
//!     println!("{}: {:.1}%", rec.insurance, rec.confidence * 100.0);
//! }
//! # Ok::<(), insurance_recommender::Error>(())
//! ```

pub mod advisor;
pub mod artifacts;
pub mod boost;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod generate;
pub mod interview;
pub mod profile;
pub mod recommend;
pub mod rules;
pub mod train;

pub use encoder::{EncoderSet, LabelEncoder};
pub use error::{Error, Result};
pub use generate::{LabeledExample, generate};
pub use profile::{CustomerProfile, IncomeBracket, Insurance, LifeEvent, MaritalStatus};
pub use recommend::{Recommendation, RecommendationEngine};
pub use train::{TrainingConfig, TrainingOutcome};
