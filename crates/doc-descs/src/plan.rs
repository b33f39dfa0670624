//! Everything the run factory needs to expand one description.

use serde::{Deserialize, Serialize};

use crate::axis::LinkLayer;
use crate::constraint::{load_constraints, Constraint};
use crate::registry::AxisRegistry;
use crate::testbed::Testbed;

/// How runs are grouped into experiments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "link_layers", rename_all = "snake_case")]
pub enum Partition {
    /// One experiment per link layer.
    PerLinkLayer,
    /// One experiment per run on the listed link layers (their nodes are
    /// reflashed for every run), one per link layer otherwise.
    PerRunOn(Vec<LinkLayer>),
}

/// Timing constants used for waits and reservation lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Seconds every run waits on top of the query time.
    pub base_wait: u64,
    /// Seconds added per run to the experiment duration.
    pub run_duration_slack: f64,
    /// Seconds of setup overhead of an experiment holding a single run.
    pub single_run_overhead: u64,
    /// Minutes added to the summed run durations.
    pub duration_margin: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            base_wait: 100,
            run_duration_slack: 300.0,
            single_run_overhead: 470,
            duration_margin: 20,
        }
    }
}

/// A fully resolved preset: axes, rules, grouping and testbed.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Experiment name.
    pub name: String,
    /// Terminal multiplexer session.
    pub tmux_session: String,
    /// Axis values.
    pub axes: AxisRegistry,
    /// Admission rules applied on top of the CoAP-only collapsing.
    pub constraints: Vec<Constraint>,
    /// Run grouping.
    pub partition: Partition,
    /// Waits and durations.
    pub timing: Timing,
    /// Firmwares and nodes.
    pub testbed: Testbed,
}

impl Plan {
    /// The load experiment every preset starts from.
    pub fn base() -> Self {
        Self {
            name: "doc-eval-load".to_owned(),
            tmux_session: "doc-eval-load".to_owned(),
            axes: AxisRegistry::default(),
            constraints: load_constraints(),
            partition: Partition::PerRunOn(vec![LinkLayer::Ble]),
            timing: Timing::default(),
            testbed: Testbed::load(),
        }
    }

    /// Link layer whose testbed data fills `globals`.
    pub fn primary_link_layer(&self) -> LinkLayer {
        self.axes
            .link_layers
            .first()
            .copied()
            .unwrap_or(LinkLayer::Ieee802154)
    }
}
