#![deny(missing_docs)]
//! Experiment description generator for the DNS-over-CoAP evaluation.
//!
//! A [`Preset`] resolves into a [`Plan`] (axes, admission rules, grouping
//! and testbed). [`generate`] expands the plan into runs and experiments and
//! returns a [`Description`] ready to be written as `descs.yaml`.

pub mod axis;
pub mod constraint;
pub mod desc;
pub mod env;
pub mod factory;
pub mod naming;
pub mod overrides;
pub mod plan;
pub mod preset;
pub mod registry;
pub mod run;
pub mod testbed;

pub use axis::{CoapMethod, DnsTransport, LinkLayer, MaxAgeMode, RecordType, ResponseDelay};
pub use constraint::{Combination, Constraint};
pub use desc::{generate, Description, Schedule, DESCS_FILE_NAME};
pub use env::Env;
pub use factory::{derive_exp_id, expand, Expansion, GenerateOpts};
pub use naming::{expand as expand_name, run_template, ExperimentStub, NameTemplates};
pub use overrides::AxisOverrides;
pub use plan::{Partition, Plan, Timing};
pub use preset::{Overlay, Preset, PresetKind};
pub use registry::AxisRegistry;
pub use run::{Experiment, Run, RunArgs};
pub use testbed::{Firmware, Globals, Nodes, Testbed};
