use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileConstraintConfig, FileConvergenceConfig, FileLatticeConfig,
    FileOptimizerConfig,
};
use super::models::{GenerateAppConfig, SearchAppConfig};
use crate::cli::{GenerateArgs, SearchArgs};
use crate::error::{CliError, Result};
use casting::core::constraints::Constraint;
use casting::core::models::lattice::{LatticeBounds, ParameterRange};
use casting::engine::config::{
    ConvergenceConfig, EvaluatorSpec, OptimizerConfig, SearchConfigBuilder,
};
use std::str::FromStr;

pub fn build_search_config(args: &SearchArgs) -> Result<SearchAppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let seed = args.seed.or(file_config.seed).unwrap_or(defaults.seed);
    let lattice = merge_lattice(file_config.lattice.take(), &defaults)?;
    let constraint = merge_constraint(file_config.constraint.take())?;

    let mut optimizer = merge_optimizer(file_config.optimizer.take(), &defaults);
    if let Some(niterations) = args.niterations {
        optimizer.niterations = niterations;
    }

    let evaluator_file = file_config.evaluator.take().unwrap_or_default();
    let evaluator_name = args
        .evaluator
        .clone()
        .or(evaluator_file.name)
        .unwrap_or(defaults.evaluator);
    let evaluator = EvaluatorSpec::new(evaluator_name).with_params(evaluator_file.params);

    let core_config = SearchConfigBuilder::new()
        .seed(seed)
        .lattice(lattice)
        .constraint(constraint)
        .optimizer(optimizer)
        .evaluator(evaluator)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(SearchAppConfig {
        output_path: args.output.clone(),
        initial_path: args.initial.clone(),
        core_config,
    })
}

pub fn build_generate_config(args: &GenerateArgs) -> Result<GenerateAppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    if args.count == 0 {
        return Err(CliError::Argument(
            "--count must be at least 1".to_string(),
        ));
    }

    let lattice = merge_lattice(file_config.lattice.take(), &defaults)?;
    lattice
        .validate()
        .map_err(|e| CliError::Config(format!("Invalid lattice bounds: {}", e)))?;
    let constraint = merge_constraint(file_config.constraint.take())?;
    constraint
        .validate()
        .map_err(|e| CliError::Config(format!("Invalid constraint: {}", e)))?;

    Ok(GenerateAppConfig {
        output_path: args.output.clone(),
        count: args.count,
        seed: args.seed.or(file_config.seed).unwrap_or(defaults.seed),
        lattice,
        constraint,
    })
}

fn merge_lattice(
    file_val: Option<FileLatticeConfig>,
    defaults: &DefaultsConfig,
) -> Result<LatticeBounds> {
    let p = file_val.ok_or_else(|| {
        CliError::Config("missing required section `[lattice]`".to_string())
    })?;
    let angle = |range: Option<_>| {
        range
            .map(Into::into)
            .unwrap_or_else(|| ParameterRange::fixed(defaults.angle))
    };
    Ok(LatticeBounds {
        a: p.a.into(),
        b: p.b.into(),
        c: p.c.into(),
        alpha: angle(p.alpha),
        beta: angle(p.beta),
        gamma: angle(p.gamma),
    })
}

fn merge_constraint(file_val: Option<FileConstraintConfig>) -> Result<Constraint> {
    file_val
        .map(Into::into)
        .ok_or_else(|| CliError::Config("missing required section `[constraint]`".to_string()))
}

fn merge_optimizer(
    file_val: Option<FileOptimizerConfig>,
    defaults: &DefaultsConfig,
) -> OptimizerConfig {
    let p = file_val.unwrap_or_default();
    let d = &defaults.optimizer;
    OptimizerConfig {
        niterations: p.niterations.unwrap_or(d.niterations),
        headexpand: p.headexpand.unwrap_or(d.headexpand),
        nexpand: p.nexpand.unwrap_or(d.nexpand),
        nsimulate: p.nsimulate.unwrap_or(d.nsimulate),
        nplayouts: p.nplayouts.unwrap_or(d.nplayouts),
        exploreconstant: p.exploreconstant.unwrap_or(d.exploreconstant),
        maxdepth: p.maxdepth.unwrap_or(d.maxdepth),
        max_mutation: p.max_mutation.unwrap_or(d.max_mutation),
        expansion_attempts: p.expansion_attempts.unwrap_or(d.expansion_attempts),
        convergence: merge_convergence(p.convergence, defaults),
    }
}

fn merge_convergence(
    file_val: Option<FileConvergenceConfig>,
    defaults: &DefaultsConfig,
) -> Option<ConvergenceConfig> {
    file_val.map(|p| ConvergenceConfig {
        energy_threshold: p.energy_threshold.unwrap_or(defaults.energy_threshold),
        patience_iterations: p
            .patience_iterations
            .unwrap_or(defaults.patience_iterations),
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        if key == "seed" {
            config.seed = Some(parse_value(key, value_str)?);
            continue;
        }
        if key == "evaluator.name" {
            config.evaluator.get_or_insert_with(Default::default).name =
                Some(value_str.to_string());
            continue;
        }

        let optimizer = config.optimizer.get_or_insert_with(Default::default);
        match key {
            "optimizer.niterations" => optimizer.niterations = Some(parse_value(key, value_str)?),
            "optimizer.headexpand" => optimizer.headexpand = Some(parse_value(key, value_str)?),
            "optimizer.nexpand" => optimizer.nexpand = Some(parse_value(key, value_str)?),
            "optimizer.nsimulate" => optimizer.nsimulate = Some(parse_value(key, value_str)?),
            "optimizer.nplayouts" => optimizer.nplayouts = Some(parse_value(key, value_str)?),
            "optimizer.exploreconstant" => {
                optimizer.exploreconstant = Some(parse_value(key, value_str)?)
            }
            "optimizer.maxdepth" => optimizer.maxdepth = Some(parse_value(key, value_str)?),
            "optimizer.max-mutation" => {
                optimizer.max_mutation = Some(parse_value(key, value_str)?)
            }
            "optimizer.expansion-attempts" => {
                optimizer.expansion_attempts = Some(parse_value(key, value_str)?)
            }
            "optimizer.convergence.energy-threshold" => {
                optimizer
                    .convergence
                    .get_or_insert_with(Default::default)
                    .energy_threshold = Some(parse_value(key, value_str)?)
            }
            "optimizer.convergence.patience-iterations" => {
                optimizer
                    .convergence
                    .get_or_insert_with(Default::default)
                    .patience_iterations = Some(parse_value(key, value_str)?)
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
