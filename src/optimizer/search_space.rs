//! Search space definition for trial-based search

use super::params::{ParamSet, ParamValue};
use crate::error::{CvError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float { low: f64, high: f64, log_scale: bool },
    /// Integer parameter, inclusive bounds
    Int { low: i64, high: i64 },
    /// One of a fixed list of values
    Categorical { choices: Vec<ParamValue> },
    /// Boolean parameter
    Boolean,
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    pub fn categorical<V: Into<ParamValue>>(name: impl Into<String>, choices: Vec<V>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Boolean,
        }
    }

    fn validate(&self) -> Result<()> {
        let ok = match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                low <= high && (!log_scale || *low > 0.0)
            }
            ParameterType::Int { low, high } => low <= high,
            ParameterType::Categorical { choices } => !choices.is_empty(),
            ParameterType::Boolean => true,
        };
        if ok {
            Ok(())
        } else {
            Err(CvError::InvalidConfig(format!(
                "parameter {} has an empty or invalid range",
                self.name
            )))
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParamValue {
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                ParamValue::Float(val)
            }
            ParameterType::Int { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
            ParameterType::Categorical { choices } => {
                choices[rng.gen_range(0..choices.len())].clone()
            }
            ParameterType::Boolean => ParamValue::Bool(rng.gen()),
        }
    }
}

/// Ordered set of parameters sampled together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    pub fn categorical<V: Into<ParamValue>>(self, name: impl Into<String>, choices: Vec<V>) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(Parameter::boolean(name))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    /// Sample every parameter, in declaration order
    pub fn sample(&self, rng: &mut impl Rng) -> ParamSet {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }
}
