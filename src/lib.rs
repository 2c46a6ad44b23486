pub mod config;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod learning;
pub mod llm;
pub mod model;
pub mod perception;
pub mod planner;
pub mod resolver;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::driver::AppiumDriver;
use crate::engine::{ExecutionCoordinator, ExecutionJournal};
use crate::errors::MobiClawResult;
use crate::executor::ActionExecutor;
use crate::learning::LearningStore;
use crate::llm::oracle::ProviderOracle;
use crate::llm::registry::{OracleRole, ProviderRegistry};
use crate::perception::{EvidenceStore, ScreenAnalyzer};
use crate::planner::InstructionPlanner;
use crate::resolver::ElementResolver;
use crate::store::MemoryStore;

/// `RUST_LOG`-driven fmt subscriber, `info` when unset.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Wire the production stack: OpenAI-compatible oracles, in-memory store, Appium driver.
pub fn build_coordinator(cfg: &AppConfig) -> MobiClawResult<ExecutionCoordinator> {
    let registry = ProviderRegistry::from_config(cfg);
    let planner_oracle = Arc::new(ProviderOracle::for_role(&registry, OracleRole::Planner)?);
    let vision_oracle = Arc::new(ProviderOracle::for_role(&registry, OracleRole::Vision)?);

    let store = Arc::new(MemoryStore::new());
    let learning = Arc::new(LearningStore::new(
        store.clone(),
        cfg.automation.learning_enabled,
    ));
    let resolver = Arc::new(
        ElementResolver::new(
            learning.clone(),
            ScreenAnalyzer::new(vision_oracle),
            cfg.automation.confidence_threshold,
        )
        .with_successful_reuse(cfg.automation.reuse_successful_locators),
    );
    let executor = Arc::new(ActionExecutor::new(
        resolver,
        learning,
        EvidenceStore::new(&cfg.automation.screenshot_dir),
        cfg.automation.wait_timeout(),
    ));

    let mut coordinator = ExecutionCoordinator::new(
        store.clone(),
        store,
        Arc::new(InstructionPlanner::new(planner_oracle)),
        executor,
        Box::new(AppiumDriver::new(cfg.driver.clone())),
    )
    .with_instruction_timeout(cfg.automation.instruction_timeout());
    if cfg.automation.journal_enabled {
        coordinator = coordinator.with_journal(ExecutionJournal::in_data_dir());
    }

    tracing::info!(
        providers = ?registry.list_names(),
        driver = %cfg.driver.server_url,
        learning = cfg.automation.learning_enabled,
        "pipeline assembled"
    );
    Ok(coordinator)
}
