//! stagehand: drive a live UI application from test code.
//!
//! The crate is organised leaf to root:
//! - [`host`]: frame clock, per-tick routines and the owning-thread bridge.
//! - [`wait`]: cooperative suspension with cancellation and timeouts.
//! - [`input`]: keyboard shim over the polling and event-queue backends.
//! - [`pointer`]: routed pointer gestures, touch gestures and scroll-into-view.
//! - [`assert`]: checks that capture artifacts and freeze time on failure.
//! - [`runner`]: one test case lifecycle with deadline and retry.
//! - [`suite`]: discovery, filtering, sequential execution and reporting.
//! - [`diagnostics`]: "what is the test doing right now" plus failure bundles.
//!
//! The application itself is reached only through the traits in [`ui`]. The
//! `mimic` module (feature `mimic`) provides an in-memory implementation of
//! all of them.

pub mod assert;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod geom;
pub mod harness;
pub mod host;
pub mod input;
#[cfg(feature = "mimic")]
pub mod mimic;
pub mod monitor;
pub mod pointer;
pub mod report;
pub mod runner;
pub mod scope;
pub mod suite;
pub mod tester;
pub mod trigger;
pub mod ui;
pub mod wait;

pub use error::{Error, Failure, FailureKind, Outcome, Result};
pub use geom::{Rect, Vec2};
pub use harness::Harness;
pub use host::Host;
pub use keysym::{Key, LegacyKey};
pub use scope::ExecutionScope;
pub use suite::{PlayTest, Suite, TestDefinition};
pub use tester::Tester;
pub use ui::ElementId;
