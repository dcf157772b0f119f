use casting::core::constraints::Constraint;
use casting::core::generation::GeometryGenerator;
use casting::core::models::lattice::LatticeBounds;
use casting::core::models::structure::StructureData;
use casting::engine::config::{
    ConfigError, ConvergenceConfig, EvaluatorSpec, OptimizerConfig, SearchConfig,
    SearchConfigBuilder,
};
use casting::engine::error::EngineError;
use casting::engine::evaluators::{
    Evaluation, Evaluator, EvaluatorError, EvaluatorRegistry, PairPotentialEvaluator,
    SENTINEL_ENERGY,
};
use casting::engine::progress::{Progress, ProgressReporter};
use casting::workflows::search;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct AlwaysSentinel;

impl Evaluator for AlwaysSentinel {
    fn name(&self) -> &str {
        "always-sentinel"
    }
    fn evaluate(&self, structure: &StructureData) -> Result<Evaluation, EvaluatorError> {
        Ok(Evaluation::rejected(structure.clone()))
    }
}

struct Broken;

impl Evaluator for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn evaluate(&self, _: &StructureData) -> Result<Evaluation, EvaluatorError> {
        Err(EvaluatorError::Failed {
            evaluator: "broken".to_string(),
            reason: "solver crashed".to_string(),
        })
    }
}

fn registry() -> EvaluatorRegistry {
    let mut registry = EvaluatorRegistry::with_builtins();
    registry.register("always-sentinel", |_| Ok(Box::new(AlwaysSentinel)));
    registry.register("broken", |_| Ok(Box::new(Broken)));
    registry
}

fn optimizer(niterations: usize) -> OptimizerConfig {
    OptimizerConfig {
        niterations,
        headexpand: 4,
        nexpand: 2,
        nsimulate: 2,
        nplayouts: 3,
        maxdepth: 4,
        max_mutation: 0.01,
        ..OptimizerConfig::default()
    }
}

fn config(evaluator: &str, niterations: usize) -> SearchConfig {
    SearchConfigBuilder::new()
        .seed(12)
        .lattice(LatticeBounds::cubic(10.0, 12.0, 2.0))
        .constraint(Constraint::single_species("Cu", 4, 4, 2.0, 3.0))
        .optimizer(optimizer(niterations))
        .evaluator(EvaluatorSpec::new(evaluator))
        .build()
        .unwrap()
}

fn generated_root(config: &SearchConfig) -> StructureData {
    GeometryGenerator::new(config.lattice.clone(), Arc::new(config.constraint.clone()))
        .unwrap()
        .generate(&mut StdRng::seed_from_u64(config.seed))
        .unwrap()
}

#[test]
fn zero_iterations_reports_root_evaluation() {
    let config = config("pair-potential", 0);
    let result = search::run(&config, &registry(), &ProgressReporter::new()).unwrap();

    let root = generated_root(&config);
    let evaluator = PairPotentialEvaluator::from_params(&toml::Table::new()).unwrap();
    let expected = evaluator.evaluate(&root).unwrap();

    assert_eq!(result.tree_size, 1);
    assert_eq!(result.iterations, 0);
    assert!(result.history.is_empty());
    assert!(result.found_valid);
    assert_eq!(result.structure, root);
    assert_eq!(result.energy, expected.energy);
}

#[test]
fn always_sentinel_evaluator_returns_original_root() {
    let config = config("always-sentinel", 20);
    let result = search::run(&config, &registry(), &ProgressReporter::new()).unwrap();

    assert!(!result.found_valid);
    assert_eq!(result.energy, SENTINEL_ENERGY);
    assert_eq!(result.structure, generated_root(&config));
    assert!(result.history.iter().all(|&e| e == SENTINEL_ENERGY));
}

#[test]
fn pair_potential_search_never_worsens_the_root() {
    let config = config("pair-potential", 40);
    let result = search::run(&config, &registry(), &ProgressReporter::new()).unwrap();

    let evaluator = PairPotentialEvaluator::from_params(&toml::Table::new()).unwrap();
    let root_energy = evaluator.evaluate(&generated_root(&config)).unwrap().energy;

    assert!(result.found_valid);
    assert!(result.energy <= root_energy);
    assert_eq!(result.iterations, 40);
    assert_eq!(result.history.len(), 40);
    assert!(result.history.windows(2).all(|w| w[1] <= w[0]));
    assert!(result.tree_size > 1);
    assert!(casting::core::constraints::is_valid(&result.structure));
}

#[test]
fn same_seed_gives_identical_results() {
    let config = config("pair-potential", 25);
    let a = search::run(&config, &registry(), &ProgressReporter::new()).unwrap();
    let b = search::run(&config, &registry(), &ProgressReporter::new()).unwrap();
    assert_eq!(a.energy, b.energy);
    assert_eq!(a.structure, b.structure);
    assert_eq!(a.history, b.history);
    assert_eq!(a.tree_size, b.tree_size);
}

#[test]
fn unknown_evaluator_fails_before_search() {
    let events = AtomicUsize::new(0);
    let reporter = ProgressReporter::with_callback(Box::new(|_| {
        events.fetch_add(1, Ordering::SeqCst);
    }));
    let result = search::run(&config("vasp", 10), &registry(), &reporter);
    assert!(matches!(
        result,
        Err(EngineError::Config(ConfigError::UnknownEvaluator { .. }))
    ));
    drop(reporter);
    assert_eq!(events.load(Ordering::SeqCst), 0);
}

#[test]
fn unavailable_external_program_fails_before_search() {
    let mut params = toml::Table::new();
    params.insert(
        "program".to_string(),
        toml::Value::String("/nonexistent/energy-calculator".to_string()),
    );
    let mut config = config("external-command", 10);
    config.evaluator = EvaluatorSpec::new("external-command").with_params(params);

    let result = search::run(&config, &registry(), &ProgressReporter::new());
    assert!(matches!(
        result,
        Err(EngineError::Evaluator(EvaluatorError::Unavailable { .. }))
    ));
}

#[test]
fn evaluator_errors_abort_the_search() {
    let result = search::run(&config("broken", 10), &registry(), &ProgressReporter::new());
    assert!(matches!(
        result,
        Err(EngineError::Evaluator(EvaluatorError::Failed { .. }))
    ));
}

#[test]
fn convergence_stops_a_stagnant_search_early() {
    let mut config = config("always-sentinel", 100);
    config.optimizer.convergence = Some(ConvergenceConfig {
        energy_threshold: 0.0,
        patience_iterations: 5,
    });
    let result = search::run(&config, &registry(), &ProgressReporter::new()).unwrap();
    assert!(result.iterations < 100);
    assert_eq!(result.history.len(), result.iterations);
}

#[test]
fn run_with_root_starts_from_given_structure() {
    let config = config("pair-potential", 0);
    let start = generated_root(&config);
    let result =
        search::run_with_root(start.clone(), &config, &registry(), &ProgressReporter::new())
            .unwrap();
    assert_eq!(result.structure.parameters(), start.parameters());
    assert!(result.found_valid);
}

#[test]
fn progress_events_cover_every_iteration() {
    let increments = AtomicUsize::new(0);
    let reporter = ProgressReporter::with_callback(Box::new(|event| {
        if matches!(event, Progress::TaskIncrement) {
            increments.fetch_add(1, Ordering::SeqCst);
        }
    }));
    search::run(&config("pair-potential", 7), &registry(), &reporter).unwrap();
    drop(reporter);
    assert_eq!(increments.load(Ordering::SeqCst), 7);
}
