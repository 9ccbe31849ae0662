//! Label encoders that map category strings to contiguous integer codes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bijection between the sorted distinct values of one column and `0..k`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    field: String,
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits on the observed values of `field`. Classes are sorted and deduplicated.
    pub fn fit<'a, I>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        LabelEncoder {
            field: field.to_string(),
            classes,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Classes in code order: `classes()[code]` is the string for `code`.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn transform(&self, value: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| Error::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// One fitted [`LabelEncoder`] per categorical column, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSet {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl EncoderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, encoder: LabelEncoder) {
        self.encoders.insert(encoder.field.clone(), encoder);
    }

    pub fn get(&self, field: &str) -> Result<&LabelEncoder> {
        self.encoders
            .get(field)
            .ok_or_else(|| Error::DataIntegrity(format!("no encoder fitted for field '{field}'")))
    }

    pub fn encode(&self, field: &str, value: &str) -> Result<usize> {
        self.get(field)?.transform(value)
    }

    pub fn decode(&self, field: &str, code: usize) -> Result<&str> {
        let encoder = self.get(field)?;
        encoder.inverse_transform(code).ok_or_else(|| {
            Error::DataIntegrity(format!(
                "code {code} out of range for field '{field}' ({} classes)",
                encoder.len()
            ))
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelEncoder> {
        self.encoders.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_and_dedups() {
        let enc = LabelEncoder::fit("income_bracket", ["medium", "low", "high", "low"]);
        assert_eq!(enc.classes(), ["high", "low", "medium"]);
        assert_eq!(enc.transform("high").unwrap(), 0);
        assert_eq!(enc.transform("medium").unwrap(), 2);
    }

    #[test]
    fn test_round_trip() {
        let enc = LabelEncoder::fit("life_event", ["none", "new_baby", "bought_home", "retirement"]);
        for class in enc.classes() {
            let code = enc.transform(class).unwrap();
            assert_eq!(enc.inverse_transform(code), Some(class.as_str()));
        }
        assert_eq!(enc.inverse_transform(enc.len()), None);
    }

    #[test]
    fn test_unknown_category() {
        let enc = LabelEncoder::fit("marital_status", ["single", "married"]);
        match enc.transform("widowed") {
            Err(Error::UnknownCategory { field, value }) => {
                assert_eq!(field, "marital_status");
                assert_eq!(value, "widowed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_encoder_set_lookup() {
        let mut set = EncoderSet::new();
        set.insert(LabelEncoder::fit("marital_status", ["single", "married"]));
        assert_eq!(set.encode("marital_status", "single").unwrap(), 1);
        assert_eq!(set.decode("marital_status", 0).unwrap(), "married");
        assert!(matches!(set.get("income_bracket"), Err(Error::DataIntegrity(_))));
        assert!(matches!(set.decode("marital_status", 9), Err(Error::DataIntegrity(_))));
        assert_eq!(set.fields().collect::<Vec<_>>(), ["marital_status"]);
    }
}
