use crate::config::AppConfig;
use crate::error::Result;
use crate::experiment::{ExperimentConfig, Registry};
use crate::params::FlowParams;
use crate::runner::{RunRequest, Runner};

/// Applies the command-line overrides to freshly loaded flow params.
pub fn patch(cfg: &AppConfig, params: &mut FlowParams) {
    params.sim.render = cfg.render;
    params.simulator = cfg.simulator;

    if cfg.gen_emission {
        params.sim.emission_path = Some(cfg.emission_path.clone());
    }

    let seed = cfg
        .seed
        .or(params.sim.seed)
        .unwrap_or_else(|| rand::random());
    params.sim.seed = Some(seed);
}

pub fn request(cfg: &AppConfig) -> RunRequest {
    RunRequest {
        num_runs: cfg.num_runs,
        convert_to_csv: cfg.gen_emission,
        partition_name: cfg.partition_name.clone(),
        only_query: cfg.only_query.clone(),
    }
}

/// Loads the named experiment, patches it, and runs it once through the runner
/// built by `make_runner`.
pub fn launch<F, R>(cfg: &AppConfig, make_runner: F) -> Result<()>
where
    F: FnOnce(&AppConfig, ExperimentConfig) -> Result<R>,
    R: Runner,
{
    let mut registry = Registry::builtin();
    registry.extend(&cfg.experiments)?;

    let mut experiment = registry.load(&cfg.experiment)?;
    patch(cfg, &mut experiment.flow_params);

    let params = &experiment.flow_params;
    log::info!("Experiment: {} ({})", cfg.experiment, params.exp_tag);
    log::info!("Simulator: {}", params.simulator);
    log::info!("Seed: {}", params.sim.seed.unwrap_or_default());
    if let Some(path) = &params.sim.emission_path {
        log::info!("Emission path: {}", path.display());
    }
    log::debug!("queries: {}", cfg.only_query);

    let req = request(cfg);
    let mut runner = make_runner(cfg, experiment)?;
    runner.run(&req)
}
