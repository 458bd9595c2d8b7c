use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Free-form parameters passed through to environments and networks.
pub type AdditionalParams = BTreeMap<String, toml::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    Traci,
    Aimsun,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::Traci
    }
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Simulator::Traci => write!(f, "traci"),
            Simulator::Aimsun => write!(f, "aimsun"),
        }
    }
}

/// Parameter bundle describing one experiment, handed to the runner as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    pub exp_tag: String,
    pub env_name: String,
    pub network: String,
    pub simulator: Simulator,
    pub sim: SimParams,
    pub env: EnvParams,
    pub net: NetParams,
    pub veh: Vec<VehicleType>,
    pub initial: InitialConfig,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            exp_tag: "experiment".to_string(),
            env_name: "AccelEnv".to_string(),
            network: "RingNetwork".to_string(),
            simulator: Simulator::Traci,
            sim: SimParams::default(),
            env: EnvParams::default(),
            net: NetParams::default(),
            veh: Vec::new(),
            initial: InitialConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Seconds of simulated time per step.
    pub sim_step: f64,
    pub render: bool,
    pub restart_instance: bool,
    pub print_warnings: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            sim_step: 0.1,
            render: false,
            restart_instance: false,
            print_warnings: true,
            emission_path: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvParams {
    pub horizon: u32,
    pub warmup_steps: u32,
    pub sims_per_step: u32,
    pub additional_params: AdditionalParams,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            horizon: 500,
            warmup_steps: 0,
            sims_per_step: 1,
            additional_params: AdditionalParams::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetParams {
    /// Network template file (e.g. a SUMO net.xml), if the network is not generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    pub additional_params: AdditionalParams,
    pub inflows: Vec<Inflow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inflow {
    pub veh_type: String,
    pub edge: String,
    pub vehs_per_hour: f64,
    pub depart_lane: String,
    pub depart_speed: f64,
}

impl Default for Inflow {
    fn default() -> Self {
        Self {
            veh_type: "human".to_string(),
            edge: String::new(),
            vehs_per_hour: 0.0,
            depart_lane: "free".to_string(),
            depart_speed: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleType {
    pub veh_id: String,
    pub num_vehicles: u32,
    pub acceleration_controller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_controller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_change_controller: Option<String>,
    /// Acceleration noise applied by the controller.
    pub noise: f64,
}

impl Default for VehicleType {
    fn default() -> Self {
        Self {
            veh_id: "human".to_string(),
            num_vehicles: 0,
            acceleration_controller: "IDMController".to_string(),
            routing_controller: None,
            lane_change_controller: None,
            noise: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConfig {
    pub spacing: String,
    pub bunching: f64,
    pub perturbation: f64,
    pub shuffle: bool,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            spacing: "uniform".to_string(),
            bunching: 0.0,
            perturbation: 0.0,
            shuffle: false,
        }
    }
}

/// Builds an `AdditionalParams` map from `(key, value)` pairs.
pub fn additional<const N: usize>(pairs: [(&str, toml::Value); N]) -> AdditionalParams {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
