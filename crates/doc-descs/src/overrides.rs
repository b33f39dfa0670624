//! Operator supplied axis overrides loaded from YAML.

use std::fs;
use std::path::Path;

use doc_core::{from_yaml_str, DocError};
use serde::{Deserialize, Serialize};

use crate::axis::{CoapMethod, DnsTransport, LinkLayer, MaxAgeMode, RecordType, ResponseDelay};
use crate::registry::AxisRegistry;

/// Replacement values for a subset of the axes.
///
/// ```yaml
/// repetitions: 1
/// dns_transports: [coap, oscore]
/// coap_blocksizes: [null, 32]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisOverrides {
    /// Link layers.
    pub link_layers: Option<Vec<LinkLayer>>,
    /// DNS transports.
    pub dns_transports: Option<Vec<DnsTransport>>,
    /// CoAP methods.
    pub coap_methods: Option<Vec<CoapMethod>>,
    /// CoAP block sizes.
    pub coap_blocksizes: Option<Vec<Option<u16>>>,
    /// Record types.
    pub record_types: Option<Vec<RecordType>>,
    /// Max-Age modes.
    pub max_age_modes: Option<Vec<Option<MaxAgeMode>>>,
    /// Client CoAP cache switch values.
    pub client_coap_cache: Option<Vec<Option<bool>>>,
    /// DNS cache switch values.
    pub dns_cache: Option<Vec<Option<bool>>>,
    /// Proxy switch values.
    pub proxied: Option<Vec<Option<bool>>>,
    /// Query rates.
    pub avg_queries_per_sec: Option<Vec<f64>>,
    /// Response delays.
    pub response_delays: Option<Vec<ResponseDelay>>,
    /// Queries per run.
    pub query_count: Option<u32>,
    /// Repetitions of the axis product.
    pub repetitions: Option<u32>,
}

impl AxisOverrides {
    /// Parses overrides from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, DocError> {
        from_yaml_str(text)
    }

    /// Reads overrides from a YAML file.
    pub fn load(path: &Path) -> Result<Self, DocError> {
        let text = fs::read_to_string(path)
            .map_err(|err| DocError::io("overrides-read", path.display(), err))?;
        Self::from_yaml(&text)
    }

    /// Replaces every axis that has an override.
    pub fn apply(&self, axes: &mut AxisRegistry) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        set(&mut axes.link_layers, &self.link_layers);
        set(&mut axes.dns_transports, &self.dns_transports);
        set(&mut axes.coap_methods, &self.coap_methods);
        set(&mut axes.coap_blocksizes, &self.coap_blocksizes);
        set(&mut axes.record_types, &self.record_types);
        set(&mut axes.max_age_modes, &self.max_age_modes);
        set(&mut axes.client_coap_cache, &self.client_coap_cache);
        set(&mut axes.dns_cache, &self.dns_cache);
        set(&mut axes.proxied, &self.proxied);
        set(&mut axes.avg_queries_per_sec, &self.avg_queries_per_sec);
        set(&mut axes.response_delays, &self.response_delays);
        set(&mut axes.query_count, &self.query_count);
        set(&mut axes.repetitions, &self.repetitions);
    }
}
