//! ariaprobe harness
//!
//! A declarative UI-assertion harness with automatic-retry semantics:
//! - Loads YAML scenario files selected by a glob pattern
//! - Queues visits, viewport changes, interactions and assertions per scenario
//! - Retries every assertion (and every interaction's readiness check)
//!   until it holds or its timeout elapses
//! - Runs each scenario in an isolated browser session and aggregates results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (runner)                   │
//! │    discover(config) -> [Scenario]                           │
//! │    run_scenarios([Scenario]) -> RunSummary                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CommandQueue (queue)        one Step at a time             │
//! │    ├── Navigate / SetViewport -> Session (navigation)       │
//! │    ├── Interact { selector, action }                        │
//! │    │     readiness via evaluate() then Driver::perform      │
//! │    └── Assert { selector, predicate, timeout }              │
//! │          evaluate() (retry)                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Selector::resolve(PageSnapshot) -> [NodeId]   (selector)   │
//! │  Predicate::check(PageSnapshot, [NodeId])      (predicate)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver (driver)                                            │
//! │    └── SimulatedBrowser over a YAML site fixture (sim)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod config;
pub mod dom;
pub mod driver;
pub mod error;
pub mod navigation;
pub mod pattern;
pub mod predicate;
pub mod preflight;
pub mod queue;
pub mod retry;
pub mod runner;
pub mod scenario;
pub mod selector;
pub mod sim;

pub use config::RunConfig;
pub use driver::{Driver, DriverFactory, PageSnapshot};
pub use error::{FailureKind, HarnessError, HarnessResult};
pub use queue::{CommandQueue, Step};
pub use retry::{Backoff, RetryPolicy};
pub use runner::{RunSummary, RunnerConfig, ScenarioResult, ScenarioStatus, TestRunner};
pub use scenario::Scenario;
pub use selector::Selector;
pub use sim::{SimulatedBrowserFactory, Site};
