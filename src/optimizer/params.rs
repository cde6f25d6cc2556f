//! Hyperparameter values, sets and grids

use crate::error::{CvError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value.
///
/// Serialises as a bare JSON scalar so parameter files stay flat mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integers, or floats without a fractional part
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
            ParamValue::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::Null, Into::into)
    }
}

/// Named hyperparameters, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `other` override entries of `self`
    pub fn merged(&self, other: &ParamSet) -> ParamSet {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.0.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Float parameter; integers are widened
    pub fn f64_param(&self, name: &str) -> Result<Option<f64>> {
        self.typed(name, "a number", ParamValue::as_f64)
    }

    pub fn i64_param(&self, name: &str) -> Result<Option<i64>> {
        self.typed(name, "an integer", ParamValue::as_i64)
    }

    pub fn str_param(&self, name: &str) -> Result<Option<&str>> {
        self.typed(name, "a string", ParamValue::as_str)
    }

    pub fn bool_param(&self, name: &str) -> Result<Option<bool>> {
        self.typed(name, "a boolean", ParamValue::as_bool)
    }

    /// `Ok(None)` when absent or null, an error when present with the wrong type
    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &str,
        convert: impl Fn(&'a ParamValue) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.0.get(name) {
            None | Some(ParamValue::Null) => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| CvError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: format!("expected {}", expected),
            }),
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", entries.join(", "))
    }
}

impl FromIterator<(String, ParamValue)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        ParamSet(iter.into_iter().collect())
    }
}

/// One axis of a parameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Discrete parameter grid in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: Vec<GridAxis>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis; later axes vary faster
    pub fn axis<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.axes.push(GridAxis {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn n_candidates(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Cartesian product of all axes, first axis varying slowest
    pub fn candidates(&self) -> Vec<ParamSet> {
        let mut out = vec![ParamSet::new()];
        for axis in &self.axes {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |value| {
                        let mut set = prefix.clone();
                        set.insert(axis.name.clone(), value.clone());
                        set
                    })
                })
                .collect();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_set_json_is_flat() {
        let params = ParamSet::new()
            .with("C", 0.1)
            .with("penalty", "l2")
            .with("max_depth", None::<i64>)
            .with("n_estimators", 200i64)
            .with("bootstrap", true);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(
            json,
            r#"{"C":0.1,"bootstrap":true,"max_depth":null,"n_estimators":200,"penalty":"l2"}"#
        );
        let back: ParamSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_typed_access() {
        let params = ParamSet::new().with("C", 10i64).with("penalty", "l1");
        assert_eq!(params.f64_param("C").unwrap(), Some(10.0));
        assert_eq!(params.f64_param("missing").unwrap(), None);
        assert!(matches!(
            params.f64_param("penalty"),
            Err(CvError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_grid_order() {
        let grid = ParamGrid::new()
            .axis("a", vec![1i64, 2])
            .axis("b", vec!["x", "y", "z"]);
        let candidates = grid.candidates();
        assert_eq!(grid.n_candidates(), 6);
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0], ParamSet::new().with("a", 1i64).with("b", "x"));
        assert_eq!(candidates[1], ParamSet::new().with("a", 1i64).with("b", "y"));
        assert_eq!(candidates[3], ParamSet::new().with("a", 2i64).with("b", "x"));
    }

    #[test]
    fn test_empty_grid_has_one_candidate() {
        assert_eq!(ParamGrid::new().candidates(), vec![ParamSet::new()]);
    }
}
