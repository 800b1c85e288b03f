// -- Lint policy ---------------------------------------------------------
// Crate-wide lints. Cargo.toml carries the same groups for tooling that
// reads [lints] only.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Function signature hygiene
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Behavior layer for a static portfolio page, compiled to wasm.
//!
//! The page ships plain HTML and CSS; `folio` adds everything that moves:
//! scroll-triggered reveals, lazy images, active-section highlighting, the
//! mobile drawer and smooth anchor scrolling, the custom cursor, the hero
//! typewriter, the node-graph background and a set of runtime performance
//! and accessibility mitigations.
//!
//! # Key entry points
//!
//! - [`App`] - boots the managers in order and wires page-wide handlers
//! - [`host::Host`] - the seam to the document; [`host::MemoryHost`] runs
//!   everything headless for tests
//! - [`options::Options`] - runtime configuration, read from an inline
//!   TOML element on the page
//! - [`lifecycle::Manager`] - the trait each feature manager implements
//!
//! # Architecture
//!
//! Every manager owns a [`dom::Subscriptions`] registry. Listeners, timers,
//! frames and watchers go through it, so `destroy` releases all of them in
//! one step and a manager can be initialized again without duplicating
//! handlers. Callbacks only hold weak references back to their manager.

pub mod animation;
pub mod app;
pub mod dom;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod navigation;
pub mod observation;
pub mod options;
pub mod performance;
#[cfg(feature = "web")]
mod web;

pub use app::App;
pub use error::FolioError;
pub use host::{Host, MemoryHost};
pub use lifecycle::{Manager, ManagerState};
pub use options::Options;
