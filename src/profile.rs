//! Customer attributes and the fixed category domains they are drawn from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Accepted age range for real customers, `[MIN_AGE, MAX_AGE)`.
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 100;

macro_rules! category {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every value in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Column name used in the table and the encoder set.
            pub const FIELD: &'static str = $field;

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Comma-separated list of accepted labels, for prompts and errors.
            pub fn options() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(Error::Validation(format!(
                        "{} must be one of [{}], got '{}'",
                        $field,
                        Self::options(),
                        other
                    ))),
                }
            }
        }
    };
}

category! {
    MaritalStatus, "marital_status" {
        Single => "single",
        Married => "married",
        Divorced => "divorced",
        Widowed => "widowed",
    }
}

category! {
    IncomeBracket, "income_bracket" {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

category! {
    LifeEvent, "life_event" {
        None => "none",
        NewBaby => "new_baby",
        NewJob => "new_job",
        Retirement => "retirement",
        Marriage => "marriage",
        Divorce => "divorce",
        BoughtHome => "bought_home",
    }
}

category! {
    /// Insurance products the recommender can suggest.
    Insurance, "recommended_insurance" {
        TermLife => "term_life",
        WholeLife => "whole_life",
        Home => "home",
        Health => "health",
        Auto => "auto",
    }
}

/// One customer's attributes used for recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub age: u32,
    pub marital_status: MaritalStatus,
    pub has_kids: bool,
    pub income_bracket: IncomeBracket,
    pub life_event: LifeEvent,
}

impl CustomerProfile {
    /// Builds a profile for a real customer, rejecting ages outside `[18, 100)`.
    pub fn new(
        age: u32,
        marital_status: MaritalStatus,
        has_kids: bool,
        income_bracket: IncomeBracket,
        life_event: LifeEvent,
    ) -> Result<Self> {
        if !(MIN_AGE..MAX_AGE).contains(&age) {
            return Err(Error::Validation(format!(
                "age must be in [{MIN_AGE}, {MAX_AGE}), got {age}"
            )));
        }
        Ok(Self {
            age,
            marital_status,
            has_kids,
            income_bracket,
            life_event,
        })
    }

    /// Parses the string-typed fields of a profile.
    pub fn parse(
        age: i64,
        marital_status: &str,
        has_kids: bool,
        income_bracket: &str,
        life_event: &str,
    ) -> Result<Self> {
        let age = u32::try_from(age)
            .map_err(|_| Error::Validation(format!("age must be in [{MIN_AGE}, {MAX_AGE}), got {age}")))?;
        Self::new(
            age,
            marital_status.parse()?,
            has_kids,
            income_bracket.parse()?,
            life_event.parse()?,
        )
    }
}
