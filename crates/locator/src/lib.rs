//! Self-healing element locator
//!
//! This crate ties the workspace together:
//! - [`AutoHealLocator`] runs original selector, then cache, then AI healing
//! - [`StrategyRegistry`] holds the DOM and visual AI strategies by priority
//! - [`CostOptimizedHybridLocator`] orders them per [`ExecutionStrategy`]
//! - [`ConfidenceScorer`] ranks competing results
//! - [`AutoHealMonitor`] and [`AutoHealReporter`] watch and record lookups
//!
//! [`ExecutionStrategy`]: autoheal_core_types::ExecutionStrategy

pub mod config;
pub mod errors;
pub mod facade;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod reporter;
pub mod scorer;
pub mod strategies;
pub mod types;

pub use config::*;
pub use errors::*;
pub use facade::*;
pub use health::*;
pub use metrics::{
    register_metrics, AutoHealMetrics, CacheEvent, LocatorMetrics, LocatorMetricsSnapshot,
};
pub use monitor::*;
pub use orchestrator::*;
pub use registry::*;
pub use reporter::*;
pub use scorer::*;
pub use strategies::*;
pub use types::*;
