#![deny(missing_docs)]
//! Dispatcher contract for doc-eval experiment descriptions.
//!
//! A [`Dispatcher`] owns the mock resolver configuration and the hooks of
//! one experiment [`Flavour`]. Per run it rewrites the configuration
//! ([`Dispatcher::pre_run`]), while the [`Runner`] emits the shell commands
//! for the requester pane. Site facts (bind address, wpan prefix, free tap)
//! are probed through a [`SiteShell`].

pub mod dispatcher;
pub mod resolver;
pub mod runner;
pub mod site;

pub use dispatcher::{Dispatcher, Flavour, Hooks, RunContext};
pub use resolver::{BindPorts, RecordSet, ResolverConfig};
pub use runner::{family, Runner, QUERY_MODULO};
pub use site::{LocalShell, SiteShell};
