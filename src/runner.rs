//! Runners take a patched experiment and carry out the requested runs.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{AppConfig, QuerySelection, RunnerConfig};
use crate::error::{Error, Result};
use crate::experiment::ExperimentConfig;
use crate::params::FlowParams;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Arguments of a single `Runner::run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub num_runs: u32,
    pub convert_to_csv: bool,
    pub partition_name: Option<String>,
    pub only_query: QuerySelection,
}

pub trait Runner {
    fn run(&mut self, request: &RunRequest) -> Result<()>;
}

/// Document describing everything a runner needs, encoded as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub experiment: String,
    pub num_runs: u32,
    pub convert_to_csv: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_name: Option<String>,
    pub only_query: Vec<String>,
    pub custom_callables: Vec<String>,
    pub flow_params: FlowParams,
}

impl RunPlan {
    pub fn new(experiment: &str, config: &ExperimentConfig, request: &RunRequest) -> Self {
        Self {
            experiment: experiment.to_string(),
            num_runs: request.num_runs,
            convert_to_csv: request.convert_to_csv,
            partition_name: request.partition_name.clone(),
            only_query: request.only_query.to_list(),
            custom_callables: config.callable_names(),
            flow_params: config.flow_params.clone(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// Writes the run plan to `out` instead of running anything.
pub struct PlanPrinter<W: Write> {
    experiment: String,
    config: ExperimentConfig,
    out: W,
}

impl<W: Write> PlanPrinter<W> {
    pub fn new(experiment: &str, config: ExperimentConfig, out: W) -> Self {
        Self {
            experiment: experiment.to_string(),
            config,
            out,
        }
    }
}

impl<W: Write> Runner for PlanPrinter<W> {
    fn run(&mut self, request: &RunRequest) -> Result<()> {
        let plan = RunPlan::new(&self.experiment, &self.config, request).to_toml()?;
        self.out.write_all(plan.as_bytes())?;
        self.out.flush()?;
        log::info!("no runner program configured, printed run plan for '{}'", self.experiment);
        Ok(())
    }
}

/// Hands the run plan to an external program on its stdin and waits for it.
pub struct ProcessRunner {
    experiment: String,
    config: ExperimentConfig,
    program: String,
    args: Vec<String>,
}

impl ProcessRunner {
    pub fn new(experiment: &str, config: ExperimentConfig, program: &str, args: &[String]) -> Self {
        Self {
            experiment: experiment.to_string(),
            config,
            program: program.to_string(),
            args: args.to_vec(),
        }
    }
}

impl Runner for ProcessRunner {
    fn run(&mut self, request: &RunRequest) -> Result<()> {
        let plan = RunPlan::new(&self.experiment, &self.config, request).to_toml()?;

        // The child shares our terminal and gets Ctrl-C too; stay alive until it exits.
        if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)) {
            match e {
                ctrlc::Error::MultipleHandlers => log::debug!("interrupt handler already installed"),
                e => return Err(e.into()),
            }
        }

        log::info!(
            "starting runner: {} {}",
            self.program,
            self.args.join(" ")
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| Error::RunnerSpawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(plan.as_bytes()) {
                Ok(()) => (),
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    log::debug!("runner closed stdin before reading the plan")
                }
                Err(e) => return Err(e.into()),
            }
        }

        let status = child.wait()?;
        if INTERRUPTED.load(Ordering::SeqCst) {
            log::warn!("interrupted, runner exited with {}", status);
        }
        if !status.success() {
            return Err(Error::RunnerFailed {
                program: self.program.clone(),
                code: status.code(),
            });
        }
        log::info!("runner finished {} run(s) of '{}'", request.num_runs, self.experiment);
        Ok(())
    }
}

/// Runner chosen from the `[runner]` config section.
pub enum AnyRunner {
    Plan(PlanPrinter<io::Stdout>),
    Process(ProcessRunner),
}

impl Runner for AnyRunner {
    fn run(&mut self, request: &RunRequest) -> Result<()> {
        match self {
            AnyRunner::Plan(r) => r.run(request),
            AnyRunner::Process(r) => r.run(request),
        }
    }
}

pub fn from_config(cfg: &AppConfig, experiment: ExperimentConfig) -> Result<AnyRunner> {
    Ok(build(&cfg.experiment, &cfg.runner, experiment))
}

fn build(name: &str, runner: &RunnerConfig, experiment: ExperimentConfig) -> AnyRunner {
    match &runner.program {
        Some(program) => AnyRunner::Process(ProcessRunner::new(name, experiment, program, &runner.args)),
        None => AnyRunner::Plan(PlanPrinter::new(name, experiment, io::stdout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exp_configs;

    fn request() -> RunRequest {
        RunRequest {
            num_runs: 2,
            convert_to_csv: true,
            partition_name: Some("partitionX".to_string()),
            only_query: QuerySelection::Only(vec!["q1".to_string()]),
        }
    }

    #[test]
    fn plan_printer_writes_parseable_plan() {
        let mut out = Vec::new();
        PlanPrinter::new("i210_subnetwork", exp_configs::i210_subnetwork(), &mut out)
            .run(&request())
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let plan: RunPlan = toml::from_str(&text).unwrap();
        assert_eq!(plan.experiment, "i210_subnetwork");
        assert_eq!(plan.num_runs, 2);
        assert!(plan.convert_to_csv);
        assert_eq!(plan.partition_name.as_deref(), Some("partitionX"));
        assert_eq!(plan.only_query, vec!["q1".to_string()]);
        assert_eq!(plan.custom_callables, vec!["avg_merge_speed", "avg_outflow"]);
        assert_eq!(plan.flow_params, exp_configs::i210_subnetwork().flow_params);
    }

    #[test]
    fn plan_omits_missing_partition() {
        let req = RunRequest {
            partition_name: None,
            only_query: QuerySelection::All,
            ..request()
        };
        let text = RunPlan::new("ring", &exp_configs::ring(), &req).to_toml().unwrap();
        assert!(!text.contains("partition_name"));
        assert!(text.contains(r#"only_query = ["all"]"#));
    }

    #[test]
    fn missing_program_selects_plan_printer() {
        let runner = build("ring", &RunnerConfig::default(), exp_configs::ring());
        assert!(matches!(runner, AnyRunner::Plan(_)));

        let cfg = RunnerConfig {
            program: Some("flow-experiment".to_string()),
            args: vec![],
        };
        assert!(matches!(build("ring", &cfg, exp_configs::ring()), AnyRunner::Process(_)));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reads_plan_from_stdin() {
        let args = vec!["-c".to_string(), "grep -q 'experiment = \"ring\"'".to_string()];
        let mut runner = ProcessRunner::new("ring", exp_configs::ring(), "sh", &args);
        runner.run(&request()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reports_exit_code() {
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        let mut runner = ProcessRunner::new("ring", exp_configs::ring(), "sh", &args);
        let err = runner.run(&request()).unwrap_err();
        assert!(matches!(err, Error::RunnerFailed { code: Some(3), .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let mut runner = ProcessRunner::new("ring", exp_configs::ring(), "/nonexistent/flow-runner", &[]);
        let err = runner.run(&request()).unwrap_err();
        assert!(matches!(err, Error::RunnerSpawn { .. }));
    }
}
