//! The axis registry holding every value each experiment dimension may take.

use doc_core::{DocError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::axis::{CoapMethod, DnsTransport, LinkLayer, MaxAgeMode, RecordType, ResponseDelay};

/// Allowed values per experiment axis.
///
/// Optional axes use `None` as the "axis absent" sentinel: a registry with
/// `dns_cache == [None]` emits no `WITH_DNS_CACHE` and no naming segment.
/// CoAP-only axes collapse to their first value for non-CoAP transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisRegistry {
    /// Link layers to generate runs for.
    pub link_layers: Vec<LinkLayer>,
    /// DNS transports.
    pub dns_transports: Vec<DnsTransport>,
    /// CoAP methods (CoAP transports only).
    pub coap_methods: Vec<CoapMethod>,
    /// CoAP block sizes; `None` disables blockwise transfer (CoAP only).
    pub coap_blocksizes: Vec<Option<u16>>,
    /// Queried record types.
    pub record_types: Vec<RecordType>,
    /// Max-Age derivation modes (CoAP only).
    pub max_age_modes: Vec<Option<MaxAgeMode>>,
    /// Whether the requester caches CoAP responses.
    pub client_coap_cache: Vec<Option<bool>>,
    /// Whether the requester caches DNS responses.
    pub dns_cache: Vec<Option<bool>>,
    /// Whether queries travel through a CoAP proxy.
    pub proxied: Vec<Option<bool>>,
    /// Average query rates in queries per second.
    pub avg_queries_per_sec: Vec<f64>,
    /// Upstream response delays.
    pub response_delays: Vec<ResponseDelay>,
    /// Number of queries per run.
    pub query_count: u32,
    /// Number of times the full axis product is repeated.
    pub repetitions: u32,
}

impl Default for AxisRegistry {
    fn default() -> Self {
        Self {
            link_layers: vec![LinkLayer::Ieee802154],
            dns_transports: DnsTransport::ALL.to_vec(),
            coap_methods: vec![CoapMethod::Fetch, CoapMethod::Get, CoapMethod::Post],
            coap_blocksizes: vec![None, Some(16), Some(32), Some(64)],
            record_types: vec![RecordType::A, RecordType::Aaaa],
            max_age_modes: vec![None],
            client_coap_cache: vec![None],
            dns_cache: vec![None],
            proxied: vec![None],
            avg_queries_per_sec: vec![5.0, 10.0],
            response_delays: vec![
                ResponseDelay::NONE,
                ResponseDelay {
                    time: Some(1.0),
                    queries: Some(0.25),
                },
            ],
            query_count: 60,
            repetitions: 10,
        }
    }
}

impl AxisRegistry {
    /// Restricts the registry to a single link layer.
    pub fn select_link_layer(&mut self, link_layer: LinkLayer) {
        self.link_layers = vec![link_layer];
    }

    /// Whether some axis has no values, so that no run can be generated.
    pub fn has_empty_axis(&self) -> bool {
        self.repetitions == 0
            || self.link_layers.is_empty()
            || self.dns_transports.is_empty()
            || self.coap_methods.is_empty()
            || self.coap_blocksizes.is_empty()
            || self.record_types.is_empty()
            || self.max_age_modes.is_empty()
            || self.client_coap_cache.is_empty()
            || self.dns_cache.is_empty()
            || self.proxied.is_empty()
            || self.avg_queries_per_sec.is_empty()
            || self.response_delays.is_empty()
    }

    /// Whether the Max-Age axis contributes to runs.
    pub fn max_age_active(&self) -> bool {
        self.max_age_modes.iter().any(Option::is_some)
    }

    /// Whether the client CoAP cache axis contributes to runs.
    pub fn client_coap_cache_active(&self) -> bool {
        self.client_coap_cache.iter().any(Option::is_some)
    }

    /// Whether the DNS cache axis contributes to runs.
    pub fn dns_cache_active(&self) -> bool {
        self.dns_cache.iter().any(Option::is_some)
    }

    /// Whether the proxy axis contributes to runs.
    pub fn proxied_active(&self) -> bool {
        self.proxied.iter().any(Option::is_some)
    }

    /// Whether any CoAP transport is selected.
    pub fn has_coap(&self) -> bool {
        self.dns_transports.iter().any(DnsTransport::is_coap)
    }

    /// Whether blockwise transfers are selected for some CoAP transport.
    pub fn has_blockwise(&self) -> bool {
        self.has_coap() && self.coap_blocksizes.iter().any(Option::is_some)
    }

    /// Checks value ranges and sentinel usage of every axis.
    pub fn validate(&self) -> Result<(), DocError> {
        if self.query_count == 0 {
            return Err(DocError::Axis(ErrorInfo::new(
                "invalid-query-count",
                "query count must be positive",
            )));
        }
        for rate in &self.avg_queries_per_sec {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(DocError::Axis(
                    ErrorInfo::new("invalid-rate", "query rates must be positive")
                        .with_context("avg_queries_per_sec", rate.to_string()),
                ));
            }
        }
        for blocksize in self.coap_blocksizes.iter().flatten() {
            if !blocksize.is_power_of_two() || !(16..=1024).contains(blocksize) {
                return Err(DocError::Axis(
                    ErrorInfo::new("invalid-blocksize", "unsupported CoAP block size")
                        .with_context("coap_blocksize", blocksize.to_string())
                        .with_hint("block sizes are powers of two between 16 and 1024"),
                ));
            }
        }
        for delay in &self.response_delays {
            delay.validate()?;
        }
        check_sentinels("max_age_modes", &self.max_age_modes)?;
        check_sentinels("client_coap_cache", &self.client_coap_cache)?;
        check_sentinels("dns_cache", &self.dns_cache)?;
        check_sentinels("proxied", &self.proxied)?;
        Ok(())
    }
}

/// A switchable axis is either absent (all `None`) or fully present.
fn check_sentinels<T>(axis: &str, values: &[Option<T>]) -> Result<(), DocError> {
    let present = values.iter().filter(|value| value.is_some()).count();
    if present == 0 || present == values.len() {
        return Ok(());
    }
    Err(DocError::Axis(
        ErrorInfo::new("mixed-sentinel", "axis mixes absent and present values")
            .with_context("axis", axis),
    ))
}
