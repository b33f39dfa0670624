//! Runs and experiments as they appear in a description.

use serde::{Deserialize, Serialize};

use crate::axis::{CoapMethod, LinkLayer, MaxAgeMode, RecordType, ResponseDelay};
use crate::env::Env;

/// Run arguments read by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArgs {
    /// Average query rate in queries per second, rounded to one decimal.
    pub avg_queries_per_sec: f64,
    /// Upstream response delay.
    pub response_delay: ResponseDelay,
    /// Whether the queries are sent through the proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    /// Queried record type.
    pub record: RecordType,
    /// CoAP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<CoapMethod>,
    /// Max-Age mode configured at the resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_mode: Option<MaxAgeMode>,
}

/// A single measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Build and run environment.
    pub env: Env,
    /// Dispatcher arguments.
    pub args: RunArgs,
    /// Link layer of the run.
    pub link_layer: LinkLayer,
    /// Seconds to wait for the run to finish.
    pub wait: u64,
    /// Reflash firmware before the run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rebuild: bool,
    /// Name template overriding `globals.run_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Runs executed within one testbed reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    /// Testbed experiment id (derived unless scheduled by the caller).
    pub exp_id: u64,
    /// Experiment name.
    pub name: String,
    /// Reservation length in minutes for experiments holding a single run.
    pub duration: Option<u64>,
    /// Runs in execution order.
    pub runs: Vec<Run>,
}
