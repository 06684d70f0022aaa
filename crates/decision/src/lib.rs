#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
//! Goal, constraint, risk, and planning management producing proceed/halt decisions.

pub mod config;
pub mod constraint_handler;
pub mod context;
pub mod decision_engine;
pub mod error;
pub mod goal_manager;
pub mod planner;
pub mod risk_assessor;
pub mod scorer;

pub use config::{AbConfig, DecisionModelConfig};
pub use constraint_handler::ConstraintHandler;
pub use context::{AvailableOption, DecisionContext};
pub use decision_engine::{Decision, DecisionEngine};
pub use error::{DecisionError, DecisionResult};
pub use goal_manager::GoalManager;
pub use planner::{AdaptivePlanner, PlanFeedback};
pub use risk_assessor::{RiskAssessment, RiskAssessor};
pub use scorer::{load_scorer, ModelScorer};
