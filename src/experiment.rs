//! Experiment configurations and the registry that resolves them by name.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::exp_configs;
use crate::params::FlowParams;

/// Minimum Jaro-Winkler similarity for an unknown name to get a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// State of a running simulation as seen by custom callables.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub speeds: Vec<f64>,
    /// Vehicles per hour leaving the network.
    pub outflow: f64,
}

/// Metric evaluated by the runner at every step.
pub type Callable = fn(&Snapshot) -> f64;

pub type Callables = BTreeMap<String, Callable>;

/// Metrics that file-declared experiments can reference by name.
pub const METRICS: [(&str, Callable); 3] = [
    ("avg_speed", avg_speed),
    ("min_speed", min_speed),
    ("avg_outflow", avg_outflow),
];

/// Mean vehicle speed, 0 on an empty network.
pub fn avg_speed(s: &Snapshot) -> f64 {
    if s.speeds.is_empty() {
        return 0.0;
    }
    s.speeds.iter().sum::<f64>() / s.speeds.len() as f64
}

pub fn min_speed(s: &Snapshot) -> f64 {
    s.speeds.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn avg_outflow(s: &Snapshot) -> f64 {
    s.outflow.max(0.0)
}

/// Everything the runner needs for one experiment.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub flow_params: FlowParams,
    pub custom_callables: Option<Callables>,
}

impl ExperimentConfig {
    pub fn new(flow_params: FlowParams) -> Self {
        Self {
            flow_params,
            custom_callables: None,
        }
    }

    pub fn with_callables(mut self, callables: Callables) -> Self {
        self.custom_callables = Some(callables);
        self
    }

    pub fn callable_names(&self) -> Vec<String> {
        self.custom_callables
            .as_ref()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Experiment declared in a configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileExperiment {
    #[serde(default)]
    pub flow_params: FlowParams,
    /// Names from [`METRICS`].
    #[serde(default)]
    pub custom_callables: Vec<String>,
}

impl FileExperiment {
    fn resolve(&self, name: &str) -> Result<ExperimentConfig> {
        let cfg = ExperimentConfig::new(self.flow_params.clone());
        if self.custom_callables.is_empty() {
            return Ok(cfg);
        }

        let mut callables = Callables::new();
        for wanted in &self.custom_callables {
            let (_, f) = METRICS
                .iter()
                .find(|(n, _)| *n == wanted.as_str())
                .ok_or_else(|| Error::UnknownCallable {
                    experiment: name.to_string(),
                    name: wanted.clone(),
                    available: METRICS.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "),
                })?;
            callables.insert(wanted.clone(), *f);
        }
        Ok(cfg.with_callables(callables))
    }
}

enum Entry {
    Builtin(fn() -> ExperimentConfig),
    File(FileExperiment),
}

/// Explicit mapping from experiment name to configuration.
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in experiment.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (name, f) in exp_configs::BUILTIN {
            registry.register(name, f);
        }
        registry
    }

    pub fn register(&mut self, name: &str, f: fn() -> ExperimentConfig) {
        self.entries.insert(name.to_string(), Entry::Builtin(f));
    }

    /// Adds file-declared experiments, shadowing built-ins of the same name.
    ///
    /// Callable names are checked here so a bad file fails before any run.
    pub fn extend(&mut self, experiments: &BTreeMap<String, FileExperiment>) -> Result<()> {
        for (name, exp) in experiments {
            exp.resolve(name)?;
            if self.entries.contains_key(name) {
                log::warn!("experiment '{}' from config file shadows the built-in one", name);
            }
            self.entries.insert(name.clone(), Entry::File(exp.clone()));
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn load(&self, name: &str) -> Result<ExperimentConfig> {
        match self.entries.get(name) {
            Some(Entry::Builtin(f)) => Ok(f()),
            Some(Entry::File(exp)) => exp.resolve(name),
            None => Err(Error::UnknownExperiment {
                name: name.to_string(),
                hint: self.hint(name),
            }),
        }
    }

    fn hint(&self, name: &str) -> String {
        let closest = self
            .names()
            .map(|n| (n, strsim::jaro_winkler(name, n)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let available = self.names().collect::<Vec<_>>().join(", ");
        match closest {
            Some((n, _)) => format!(". did you mean '{}'? available: {}", n, available),
            None => format!(". available: {}", available),
        }
    }
}
