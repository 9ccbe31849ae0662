//! Domain rules that assign the ground-truth product to a synthetic customer.
//!
//! The rules form a decision list: they are tried top to bottom and the
//! first match wins. When none applies the label is drawn at random from
//! [`FALLBACK_PRODUCTS`].

use crate::profile::{CustomerProfile, IncomeBracket, Insurance, LifeEvent, MaritalStatus};

/// Products the last rule chooses between uniformly, in draw order.
pub const FALLBACK_PRODUCTS: [Insurance; 3] = [Insurance::Health, Insurance::TermLife, Insurance::Auto];

/// Human-readable form of each rule, indexed by [`Decision::Matched::rule`] - 1.
pub const RULES: [&str; 7] = [
    "life_event = new_baby OR (has_kids AND married) -> term_life",
    "age >= 55 OR life_event = retirement -> whole_life",
    "life_event = bought_home -> home",
    "income_bracket = low OR life_event = new_job -> health",
    "marital_status in {divorced, widowed} -> term_life",
    "age < 30 AND single -> health",
    "otherwise -> random {health, term_life, auto}",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A deterministic rule fired. `rule` is 1-based.
    Matched { rule: u8, product: Insurance },
    /// No deterministic rule applies; the caller draws from [`FALLBACK_PRODUCTS`].
    Fallback,
}

impl Decision {
    /// The rule text from [`RULES`] that produced this decision.
    pub fn describe(&self) -> &'static str {
        match self {
            Decision::Matched { rule, .. } => RULES[usize::from(*rule) - 1],
            Decision::Fallback => RULES[RULES.len() - 1],
        }
    }
}

/// Evaluates the decision list for `profile`.
pub fn decide(profile: &CustomerProfile) -> Decision {
    use Insurance::*;
    use LifeEvent::*;
    use MaritalStatus::*;

    let p = profile;
    let (rule, product) = match (p.age, p.marital_status, p.has_kids, p.income_bracket, p.life_event) {
        (.., NewBaby) | (_, Married, true, ..) => (1, TermLife),
        (age, ..) if age >= 55 => (2, WholeLife),
        (.., Retirement) => (2, WholeLife),
        (.., BoughtHome) => (3, Home),
        (_, _, _, IncomeBracket::Low, _) | (.., NewJob) => (4, Health),
        (_, Divorced | Widowed, ..) => (5, TermLife),
        (age, Single, ..) if age < 30 => (6, Health),
        _ => return Decision::Fallback,
    };
    Decision::Matched { rule, product }
}
