//! PushLog PR Grouping Engine: deterministic, rule-based change-set partitioning.
//!
//! Takes a change-set (paths, status, line counts) plus optional pattern and
//! dependency data, proposes groups by dependency connectivity, naming
//! patterns and directory locality, splits anything too large or mixed, and
//! validates the result with named rules.
//!
//! No AI, no DB, no network; pure computation.

pub mod atomicity;
pub mod batch;
pub mod concern;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod grouping;
pub mod normalize;
pub mod rules;
pub mod types;
pub mod validation;

pub use config::Policy;
pub use engine::Engine;
pub use error::EngineError;
pub use rules::Rule;
pub use types::{GroupingRequest, GroupingResponse, GroupingResult, StrategyType, ValidationReport};

/// Handle one request end to end: normalize, group, validate the final
/// grouping, and plan batches when a batch size was given.
pub fn run(request: &GroupingRequest) -> Result<GroupingResponse, EngineError> {
  let changes = normalize::normalize(&request.change_set)?;
  let strategy = engine::resolve_strategy(request.strategy.as_deref());
  let rules = Rule::parse_list(request.rules.as_deref());
  let deps = request.dependencies.as_ref();

  let engine = Engine::new(request.policy.clone());
  let result = engine.group(&changes, request.pattern_index.as_ref(), deps, strategy)?;
  let validation = engine.validate(&result.groups, &changes, deps, rules, true)?;
  let batches = request
    .batch_size
    .map(|size| engine.plan_batches(&changes, request.pattern_index.as_ref(), size))
    .transpose()?;

  Ok(GroupingResponse {
    result,
    validation,
    batches,
  })
}
