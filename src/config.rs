use clap::{CommandFactory, Parser};
use serde::Deserialize;
use log::LevelFilter;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::experiment::FileExperiment;
use crate::logging;
use crate::params::Simulator;

/// Partition name used when `--to_aws` is given without a value.
pub const DEFAULT_PARTITION: &str = "default";

/// Directory emission files are written to unless the config file says otherwise.
pub const DEFAULT_EMISSION_PATH: &str = "./data";

/// Which post-processing queries the runner should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySelection {
    All,
    Only(Vec<String>),
}

impl QuerySelection {
    /// List form handed to runners; `All` is spelled `["all"]`.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            QuerySelection::All => vec!["all".to_string()],
            QuerySelection::Only(q) => q.clone(),
        }
    }
}

impl fmt::Display for QuerySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerySelection::All => write!(f, "all"),
            QuerySelection::Only(q) if q.is_empty() => write!(f, "none"),
            QuerySelection::Only(q) => write!(f, "{}", q.join(", ")),
        }
    }
}

/// Run a non-RL traffic simulation experiment.
#[derive(Debug, Parser)]
#[command(name = "simulate", version, infer_long_args = true)]
#[command(about = "Parse arguments used when running a traffic simulation experiment")]
#[command(after_help = "Example: simulate EXP_CONFIG --num_runs 3 --no_render")]
pub struct Cli {
    /// Name of the experiment configuration to run
    #[arg(value_name = "EXP_CONFIG")]
    pub exp_config: String,

    /// Number of simulations to run
    #[arg(long = "num_runs", alias = "num-runs", value_name = "INT", default_value_t = 1,
          allow_negative_numbers = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub num_runs: u32,

    /// Run the simulation without rendering
    #[arg(long = "no_render", alias = "no-render")]
    pub no_render: bool,

    /// Run the simulation using Aimsun instead of SUMO
    #[arg(long)]
    pub aimsun: bool,

    /// Generate an emission file from the simulation
    #[arg(long = "gen_emission", alias = "gen-emission")]
    pub gen_emission: bool,

    /// Partition to store the output file under on S3 (implies --gen_emission)
    #[arg(long = "to_aws", alias = "to-aws", value_name = "PARTITION", num_args = 0..=1,
          allow_negative_numbers = true, default_missing_value = DEFAULT_PARTITION)]
    pub to_aws: Option<String>,

    /// Queries the upload pipeline should run (all when omitted)
    #[arg(long = "only_query", alias = "only-query", value_name = "QUERY", num_args = 0..,
          allow_negative_numbers = true)]
    pub only_query: Option<Vec<String>>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Simulator seed (random if omitted and the experiment sets none)
    #[arg(long, value_name = "SEED", allow_negative_numbers = true)]
    pub seed: Option<u32>,

    /// Log verbosity: none, error, warn, info, debug, trace
    #[arg(short, long, value_name = "LEVEL")]
    pub verbosity: Option<String>,
}

/// Options the parser knows, with the most values each one takes.
struct KnownOptions {
    /// `(name, arg id, max values)` for every long name and alias.
    longs: Vec<(String, String, usize)>,
    shorts: HashMap<char, usize>,
}

impl KnownOptions {
    fn from_command(cmd: &clap::Command) -> Self {
        let mut longs = Vec::new();
        let mut shorts = HashMap::new();
        for arg in cmd.get_arguments() {
            let max = arg
                .get_num_args()
                .map(|r| r.max_values())
                .unwrap_or_else(|| usize::from(arg.get_action().takes_values()));
            let id = arg.get_id().as_str();
            if let Some(long) = arg.get_long() {
                longs.push((long.to_string(), id.to_string(), max));
            }
            for alias in arg.get_all_aliases().unwrap_or_default() {
                longs.push((alias.to_string(), id.to_string(), max));
            }
            if let Some(short) = arg.get_short() {
                shorts.insert(short, max);
            }
        }
        Self { longs, shorts }
    }

    /// Exact name, else the single option `name` abbreviates.
    fn long(&self, name: &str) -> Option<usize> {
        if let Some((_, _, max)) = self.longs.iter().find(|(n, _, _)| n == name) {
            return Some(*max);
        }
        let mut hits = self.longs.iter().filter(|(n, _, _)| n.starts_with(name));
        let (_, id, max) = hits.next()?;
        hits.all(|(_, other, _)| other == id).then_some(*max)
    }

    fn short(&self, c: char) -> Option<usize> {
        self.shorts.get(&c).copied()
    }
}

/// Parses `tokens`, dropping anything the parser does not know.
///
/// Unknown flags and surplus positionals are returned in command-line order.
/// Long flags may be abbreviated to any unambiguous prefix. The first token
/// is the program name.
pub fn parse_known_args<I, T>(tokens: I) -> Result<(Cli, Vec<String>)>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut cmd = Cli::command();
    cmd.build();
    let known = KnownOptions::from_command(&cmd);

    let mut tokens = tokens.into_iter().map(Into::<String>::into);
    let mut kept: Vec<String> = tokens.next().into_iter().collect();
    let mut ignored = Vec::new();
    let mut exp_config: Option<String> = None;
    let mut positional_only = false;
    // values the last kept option may still take
    let mut pending = 0usize;

    for tok in tokens {
        if !positional_only && tok == "--" {
            positional_only = true;
            pending = 0;
            continue;
        }

        if positional_only || !is_flag(&tok) {
            if pending > 0 {
                pending -= 1;
                kept.push(tok);
            } else if exp_config.is_none() {
                exp_config = Some(tok);
            } else {
                ignored.push(tok);
            }
            continue;
        }

        let max = match tok.strip_prefix("--") {
            Some(long) => match long.split_once('=') {
                Some((name, _)) => known.long(name).map(|_| 0),
                None => known.long(long),
            },
            None => {
                let mut chars = tok[1..].chars();
                let c = chars.next();
                let attached = chars.next().is_some();
                c.and_then(|c| known.short(c)).map(|max| if attached { 0 } else { max })
            }
        };

        match max {
            Some(max) => {
                pending = max;
                kept.push(tok);
            }
            None => {
                pending = 0;
                ignored.push(tok);
            }
        }
    }

    if let Some(exp_config) = exp_config {
        kept.push("--".to_string());
        kept.push(exp_config);
    }

    let cli = Cli::try_parse_from(kept)?;
    Ok((cli, ignored))
}

fn is_flag(tok: &str) -> bool {
    tok.len() > 1 && tok.starts_with('-') && !is_negative_number(tok)
}

/// `-N` or `-N.N`; anything else with a leading dash is an option.
fn is_negative_number(tok: &str) -> bool {
    let Some(rest) = tok.strip_prefix('-') else {
        return false;
    };
    let (int, frac) = match rest.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (rest, None),
    };
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    match frac {
        Some(frac) => digits(int) && !frac.is_empty() && digits(frac),
        None => !int.is_empty() && digits(int),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub experiments: BTreeMap<String, FileExperiment>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub emission_path: PathBuf,
    pub seed: Option<u32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            emission_path: PathBuf::from(DEFAULT_EMISSION_PATH),
            seed: None,
        }
    }
}

/// External program that performs the runs. Without one the plan is printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub program: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbosity: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: "info".to_string(),
        }
    }
}

/// Resolved configuration after merging TOML file + CLI overrides.
#[derive(Debug)]
pub struct AppConfig {
    pub experiment: String,
    pub num_runs: u32,
    pub render: bool,
    pub simulator: Simulator,
    /// True when emission files were requested directly or implied by an upload.
    pub gen_emission: bool,
    pub emission_path: PathBuf,
    pub partition_name: Option<String>,
    pub only_query: QuerySelection,
    pub seed: Option<u32>,
    pub verbosity: LevelFilter,
    pub runner: RunnerConfig,
    pub experiments: BTreeMap<String, FileExperiment>,
}

impl AppConfig {
    /// Build the final config: defaults -> file values -> CLI overrides.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file_cfg = match &cli.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
                    path: path.clone(),
                    source,
                })?;
                toml::from_str::<FileConfig>(&contents)?
            }
            None => FileConfig::default(),
        };

        Ok(Self::merge(cli, file_cfg))
    }

    fn merge(cli: &Cli, file_cfg: FileConfig) -> Self {
        let verbosity = logging::parse_verbosity(
            cli.verbosity
                .as_deref()
                .unwrap_or(file_cfg.logging.verbosity.as_str()),
        );

        Self {
            experiment: cli.exp_config.clone(),
            num_runs: cli.num_runs,
            render: !cli.no_render,
            simulator: if cli.aimsun {
                Simulator::Aimsun
            } else {
                Simulator::Traci
            },
            gen_emission: cli.gen_emission || cli.to_aws.is_some(),
            emission_path: file_cfg.simulation.emission_path,
            partition_name: cli.to_aws.clone(),
            only_query: match &cli.only_query {
                Some(q) => QuerySelection::Only(q.clone()),
                None => QuerySelection::All,
            },
            seed: cli.seed.or(file_cfg.simulation.seed),
            verbosity,
            runner: file_cfg.runner,
            experiments: file_cfg.experiments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> (Cli, Vec<String>) {
        let mut tokens = vec!["simulate"];
        tokens.extend_from_slice(args);
        parse_known_args(tokens).unwrap()
    }

    fn resolve(args: &[&str]) -> AppConfig {
        let (cli, _) = parse(args);
        AppConfig::resolve(&cli).unwrap()
    }

    #[test]
    fn defaults_with_only_experiment_name() {
        let (cli, ignored) = parse(&["ring"]);
        assert_eq!(cli.exp_config, "ring");
        assert_eq!(cli.num_runs, 1);
        assert!(!cli.no_render);
        assert!(!cli.aimsun);
        assert!(!cli.gen_emission);
        assert_eq!(cli.to_aws, None);
        assert_eq!(cli.only_query, None);
        assert!(ignored.is_empty());

        let cfg = AppConfig::resolve(&cli).unwrap();
        assert!(cfg.render);
        assert_eq!(cfg.simulator, Simulator::Traci);
        assert!(!cfg.gen_emission);
        assert_eq!(cfg.partition_name, None);
        assert_eq!(cfg.only_query, QuerySelection::All);
        assert_eq!(cfg.emission_path, PathBuf::from("./data"));
        assert_eq!(cfg.verbosity, LevelFilter::Info);
    }

    #[test]
    fn to_aws_without_value_uses_default_partition() {
        let cfg = resolve(&["ring", "--to_aws"]);
        assert_eq!(cfg.partition_name.as_deref(), Some(DEFAULT_PARTITION));
        assert!(cfg.gen_emission);
    }

    #[test]
    fn to_aws_with_partition_implies_emission() {
        let cfg = resolve(&["ring", "--to_aws", "partitionX"]);
        assert_eq!(cfg.partition_name.as_deref(), Some("partitionX"));
        assert!(cfg.gen_emission);
    }

    #[test]
    fn render_and_simulator_flags() {
        let cfg = resolve(&["ring", "--no_render", "--aimsun"]);
        assert!(!cfg.render);
        assert_eq!(cfg.simulator, Simulator::Aimsun);
    }

    #[test]
    fn only_query_variants() {
        assert_eq!(
            resolve(&["ring", "--only_query", "q1", "q2"]).only_query,
            QuerySelection::Only(vec!["q1".to_string(), "q2".to_string()])
        );
        assert_eq!(
            resolve(&["ring", "--only_query"]).only_query,
            QuerySelection::Only(vec![])
        );
        assert_eq!(QuerySelection::All.to_list(), vec!["all".to_string()]);
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let (cli, ignored) = parse(&[
            "--foo", "ring", "--bar=1", "-x", "surplus", "--num_runs", "3",
        ]);
        assert_eq!(cli.exp_config, "ring");
        assert_eq!(cli.num_runs, 3);
        assert_eq!(ignored, vec!["--foo", "--bar=1", "-x", "surplus"]);
    }

    #[test]
    fn kebab_case_aliases_are_accepted() {
        let (cli, ignored) = parse(&["ring", "--num-runs", "2", "--no-render", "--gen-emission"]);
        assert_eq!(cli.num_runs, 2);
        assert!(cli.no_render);
        assert!(cli.gen_emission);
        assert!(ignored.is_empty());
    }

    #[test]
    fn ignored_tokens_keep_command_line_order() {
        let (cli, ignored) = parse(&["ring", "extra1", "--foo", "extra2", "-x"]);
        assert_eq!(cli.exp_config, "ring");
        assert_eq!(ignored, vec!["extra1", "--foo", "extra2", "-x"]);
    }

    #[test]
    fn negative_numbers_are_surplus_positionals() {
        let (cli, ignored) = parse(&["ring", "-1", "-2.5"]);
        assert_eq!(cli.exp_config, "ring");
        assert_eq!(cli.num_runs, 1);
        assert_eq!(ignored, vec!["-1", "-2.5"]);

        let (_, ignored) = parse(&["ring", "-inf"]);
        assert_eq!(ignored, vec!["-inf"]);
    }

    #[test]
    fn negative_value_for_known_flag_is_passed_through() {
        let (cli, ignored) = parse(&["ring", "--to_aws", "-2"]);
        assert_eq!(cli.to_aws.as_deref(), Some("-2"));
        assert!(ignored.is_empty());

        let err = parse_known_args(["simulate", "ring", "--num_runs", "-1"]).unwrap_err();
        assert!(matches!(err, Error::Usage(ref e) if e.kind() == ErrorKind::ValueValidation));
    }

    #[test]
    fn long_flags_accept_unambiguous_prefixes() {
        let (cli, ignored) = parse(&["ring", "--num", "3", "--no_r"]);
        assert_eq!(cli.num_runs, 3);
        assert!(cli.no_render);
        assert!(ignored.is_empty());

        let (cli, ignored) = parse(&["ring", "--aim", "--to", "p1"]);
        assert!(cli.aimsun);
        assert_eq!(cli.to_aws.as_deref(), Some("p1"));
        assert!(ignored.is_empty());
    }

    #[test]
    fn ambiguous_prefix_is_ignored() {
        let (cli, ignored) = parse(&["ring", "--n"]);
        assert_eq!(cli.num_runs, 1);
        assert!(!cli.no_render);
        assert_eq!(ignored, vec!["--n"]);
    }

    #[test]
    fn double_dash_ends_flag_parsing() {
        let (cli, ignored) = parse(&["--", "ring", "--no_render"]);
        assert_eq!(cli.exp_config, "ring");
        assert!(!cli.no_render);
        assert_eq!(ignored, vec!["--no_render"]);
    }

    #[test]
    fn missing_experiment_is_a_usage_error() {
        let err = parse_known_args(["simulate", "--num_runs", "2"]).unwrap_err();
        assert!(matches!(err, Error::Usage(ref e) if e.kind() == ErrorKind::MissingRequiredArgument));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn zero_runs_is_rejected() {
        let err = parse_known_args(["simulate", "ring", "--num_runs", "0"]).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn file_values_apply_below_cli_overrides() {
        let file_cfg: FileConfig = toml::from_str(
            r#"
            [simulation]
            emission_path = "/tmp/emissions"
            seed = 7

            [runner]
            program = "flow-experiment"
            args = ["--headless"]

            [logging]
            verbosity = "debug"

            [experiments.long_ring]
            custom_callables = ["avg_speed"]
            [experiments.long_ring.flow_params]
            exp_tag = "long_ring"
            "#,
        )
        .unwrap();

        let (cli, _) = parse(&["long_ring", "--seed", "11"]);
        let cfg = AppConfig::merge(&cli, file_cfg);
        assert_eq!(cfg.emission_path, PathBuf::from("/tmp/emissions"));
        assert_eq!(cfg.seed, Some(11));
        assert_eq!(cfg.verbosity, LevelFilter::Debug);
        assert_eq!(cfg.runner.program.as_deref(), Some("flow-experiment"));
        assert_eq!(cfg.runner.args, vec!["--headless".to_string()]);
        assert_eq!(cfg.experiments["long_ring"].flow_params.exp_tag, "long_ring");
    }

    #[test]
    fn unreadable_config_file_is_reported() {
        let (cli, _) = parse(&["ring", "--config", "/nonexistent/simulate.toml"]);
        let err = AppConfig::resolve(&cli).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
