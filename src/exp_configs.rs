//! Built-in non-RL experiments.

use toml::Value;

use crate::experiment::{self, Callables, ExperimentConfig};
use crate::params::{
    additional, EnvParams, FlowParams, Inflow, InitialConfig, NetParams, SimParams, VehicleType,
};

pub const BUILTIN: [(&str, fn() -> ExperimentConfig); 7] = [
    ("ring", ring),
    ("figure_eight", figure_eight),
    ("merge", merge),
    ("highway", highway),
    ("bottleneck", bottleneck),
    ("traffic_light_grid", traffic_light_grid),
    ("i210_subnetwork", i210_subnetwork),
];

fn human(num_vehicles: u32) -> VehicleType {
    VehicleType {
        veh_id: "human".to_string(),
        num_vehicles,
        acceleration_controller: "IDMController".to_string(),
        routing_controller: Some("ContinuousRouter".to_string()),
        lane_change_controller: None,
        noise: 0.2,
    }
}

fn inflow(edge: &str, vehs_per_hour: f64, depart_speed: f64) -> Inflow {
    Inflow {
        veh_type: "human".to_string(),
        edge: edge.to_string(),
        vehs_per_hour,
        depart_lane: "free".to_string(),
        depart_speed,
    }
}

/// 22 human drivers on a 230 m single-lane ring; stop-and-go waves form on their own.
pub fn ring() -> ExperimentConfig {
    ExperimentConfig::new(FlowParams {
        exp_tag: "ring".to_string(),
        env_name: "AccelEnv".to_string(),
        network: "RingNetwork".to_string(),
        sim: SimParams {
            sim_step: 0.1,
            render: true,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 1500,
            additional_params: additional([
                ("max_accel", Value::Float(1.0)),
                ("max_decel", Value::Float(1.0)),
                ("target_velocity", Value::Float(10.0)),
                ("sort_vehicles", Value::Boolean(false)),
            ]),
            ..EnvParams::default()
        },
        net: NetParams {
            additional_params: additional([
                ("length", Value::Integer(230)),
                ("lanes", Value::Integer(1)),
                ("speed_limit", Value::Integer(30)),
                ("resolution", Value::Integer(40)),
            ]),
            ..NetParams::default()
        },
        veh: vec![human(22)],
        initial: InitialConfig {
            bunching: 20.0,
            ..InitialConfig::default()
        },
        ..FlowParams::default()
    })
}

pub fn figure_eight() -> ExperimentConfig {
    ExperimentConfig::new(FlowParams {
        exp_tag: "figure8".to_string(),
        env_name: "AccelEnv".to_string(),
        network: "FigureEightNetwork".to_string(),
        sim: SimParams {
            render: true,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 1500,
            additional_params: additional([
                ("max_accel", Value::Float(3.0)),
                ("max_decel", Value::Float(3.0)),
                ("target_velocity", Value::Float(10.0)),
            ]),
            ..EnvParams::default()
        },
        net: NetParams {
            additional_params: additional([
                ("radius_ring", Value::Integer(30)),
                ("lanes", Value::Integer(1)),
                ("speed_limit", Value::Integer(30)),
                ("resolution", Value::Integer(40)),
            ]),
            ..NetParams::default()
        },
        veh: vec![human(14)],
        ..FlowParams::default()
    })
}

/// Single-lane highway with an on-ramp feeding 100 veh/h into 2000 veh/h of through traffic.
pub fn merge() -> ExperimentConfig {
    ExperimentConfig::new(FlowParams {
        exp_tag: "merge".to_string(),
        env_name: "MergePOEnv".to_string(),
        network: "MergeNetwork".to_string(),
        sim: SimParams {
            sim_step: 0.2,
            render: true,
            restart_instance: true,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 3600,
            sims_per_step: 5,
            warmup_steps: 0,
            additional_params: additional([
                ("max_accel", Value::Float(1.5)),
                ("max_decel", Value::Float(1.5)),
                ("target_velocity", Value::Float(20.0)),
                ("num_rl", Value::Integer(5)),
            ]),
        },
        net: NetParams {
            inflows: vec![
                inflow("inflow_highway", 2000.0, 10.0),
                inflow("inflow_merge", 100.0, 7.5),
            ],
            additional_params: additional([
                ("merge_length", Value::Integer(100)),
                ("pre_merge_length", Value::Integer(500)),
                ("post_merge_length", Value::Integer(100)),
                ("merge_lanes", Value::Integer(1)),
                ("highway_lanes", Value::Integer(1)),
                ("speed_limit", Value::Integer(30)),
            ]),
            ..NetParams::default()
        },
        veh: vec![VehicleType {
            routing_controller: None,
            ..human(5)
        }],
        ..FlowParams::default()
    })
}

pub fn highway() -> ExperimentConfig {
    ExperimentConfig::new(FlowParams {
        exp_tag: "highway".to_string(),
        env_name: "LaneChangeAccelEnv".to_string(),
        network: "HighwayNetwork".to_string(),
        sim: SimParams {
            sim_step: 0.1,
            render: true,
            restart_instance: true,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 1500,
            additional_params: additional([
                ("max_accel", Value::Float(1.0)),
                ("max_decel", Value::Float(1.0)),
                ("lane_change_duration", Value::Integer(5)),
                ("target_velocity", Value::Float(10.0)),
            ]),
            ..EnvParams::default()
        },
        net: NetParams {
            inflows: vec![inflow("highway_0", 2215.0, 23.0)],
            additional_params: additional([
                ("length", Value::Integer(1000)),
                ("lanes", Value::Integer(4)),
                ("speed_limit", Value::Integer(30)),
                ("num_edges", Value::Integer(1)),
            ]),
            ..NetParams::default()
        },
        veh: vec![VehicleType {
            routing_controller: None,
            lane_change_controller: Some("SimLaneChangeController".to_string()),
            ..human(0)
        }],
        ..FlowParams::default()
    })
}

/// Lane-reducing bottleneck (4 -> 2 -> 1 lanes with scaling 1).
pub fn bottleneck() -> ExperimentConfig {
    let mut callables = Callables::new();
    callables.insert("outflow".to_string(), experiment::avg_outflow as experiment::Callable);

    ExperimentConfig::new(FlowParams {
        exp_tag: "bay_bridge_bottleneck".to_string(),
        env_name: "BottleneckEnv".to_string(),
        network: "BottleneckNetwork".to_string(),
        sim: SimParams {
            sim_step: 0.5,
            render: false,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 1000,
            warmup_steps: 40,
            sims_per_step: 1,
            additional_params: additional([
                ("max_accel", Value::Integer(3)),
                ("max_decel", Value::Integer(3)),
                ("lane_change_duration", Value::Integer(5)),
                ("disable_tb", Value::Boolean(true)),
                ("disable_ramp_metering", Value::Boolean(true)),
            ]),
        },
        net: NetParams {
            inflows: vec![inflow("1", 2300.0, 10.0)],
            additional_params: additional([
                ("scaling", Value::Integer(1)),
                ("speed_limit", Value::Integer(23)),
            ]),
            ..NetParams::default()
        },
        veh: vec![VehicleType {
            acceleration_controller: "SimCarFollowingController".to_string(),
            routing_controller: None,
            lane_change_controller: Some("SimLaneChangeController".to_string()),
            noise: 0.0,
            ..human(0)
        }],
        ..FlowParams::default()
    })
    .with_callables(callables)
}

pub fn traffic_light_grid() -> ExperimentConfig {
    ExperimentConfig::new(FlowParams {
        exp_tag: "grid-intersection".to_string(),
        env_name: "TrafficLightGridEnv".to_string(),
        network: "TrafficLightGridNetwork".to_string(),
        sim: SimParams {
            sim_step: 0.1,
            render: true,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 400,
            additional_params: additional([
                ("switch_time", Value::Float(3.0)),
                ("tl_type", Value::String("controlled".to_string())),
                ("discrete", Value::Boolean(false)),
            ]),
            ..EnvParams::default()
        },
        net: NetParams {
            additional_params: additional([
                ("row_num", Value::Integer(1)),
                ("col_num", Value::Integer(1)),
                ("inner_length", Value::Integer(300)),
                ("short_length", Value::Integer(300)),
                ("long_length", Value::Integer(500)),
                ("cars_left", Value::Integer(20)),
                ("cars_right", Value::Integer(20)),
                ("cars_top", Value::Integer(20)),
                ("cars_bot", Value::Integer(20)),
                ("speed_limit", Value::Integer(35)),
                ("horizontal_lanes", Value::Integer(1)),
                ("vertical_lanes", Value::Integer(1)),
                ("traffic_lights", Value::Boolean(true)),
            ]),
            ..NetParams::default()
        },
        veh: vec![VehicleType {
            acceleration_controller: "SimCarFollowingController".to_string(),
            routing_controller: Some("GridRouter".to_string()),
            noise: 0.0,
            ..human(80)
        }],
        initial: InitialConfig {
            spacing: "custom".to_string(),
            shuffle: true,
            ..InitialConfig::default()
        },
        ..FlowParams::default()
    })
}

/// I-210 subnetwork replayed from a fixed network template, with merge-speed metrics.
pub fn i210_subnetwork() -> ExperimentConfig {
    let mut callables = Callables::new();
    callables.insert("avg_merge_speed".to_string(), experiment::avg_speed as experiment::Callable);
    callables.insert("avg_outflow".to_string(), experiment::avg_outflow as experiment::Callable);

    ExperimentConfig::new(FlowParams {
        exp_tag: "I-210_subnetwork".to_string(),
        env_name: "TestEnv".to_string(),
        network: "I210SubNetwork".to_string(),
        sim: SimParams {
            sim_step: 0.4,
            render: false,
            restart_instance: true,
            ..SimParams::default()
        },
        env: EnvParams {
            horizon: 10000,
            warmup_steps: 0,
            sims_per_step: 1,
            additional_params: Default::default(),
        },
        net: NetParams {
            template: Some("i210_with_ghost_cell_with_downstream.xml".into()),
            inflows: vec![
                inflow("ghost0", 2050.0, 25.5),
                inflow("27414345", 300.0, 10.0),
                inflow("27414342#0", 50.0, 10.0),
            ],
            additional_params: additional([("on_ramp", Value::Boolean(true))]),
        },
        veh: vec![VehicleType {
            routing_controller: Some("I210Router".to_string()),
            lane_change_controller: Some("SimLaneChangeController".to_string()),
            ..human(0)
        }],
        ..FlowParams::default()
    })
    .with_callables(callables)
}
