//! Cross-axis admission rules applied while expanding the axis product.

use serde::{Deserialize, Serialize};

use crate::axis::{CoapMethod, DnsTransport, LinkLayer, MaxAgeMode, RecordType, ResponseDelay};
use crate::registry::AxisRegistry;

/// One point of the axis product after CoAP-only axes were collapsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combination {
    /// Link layer.
    pub link_layer: LinkLayer,
    /// DNS transport.
    pub transport: DnsTransport,
    /// CoAP method, `None` for non-CoAP transports.
    pub method: Option<CoapMethod>,
    /// CoAP block size, `None` without blockwise transfer.
    pub blocksize: Option<u16>,
    /// Record type.
    pub record: RecordType,
    /// Max-Age mode.
    pub max_age_mode: Option<MaxAgeMode>,
    /// Client CoAP cache switch.
    pub client_coap_cache: Option<bool>,
    /// DNS cache switch.
    pub dns_cache: Option<bool>,
    /// Proxy switch.
    pub proxied: Option<bool>,
    /// Average queries per second.
    pub avg_queries_per_sec: f64,
    /// Upstream response delay.
    pub response_delay: ResponseDelay,
}

impl Combination {
    /// Compact rendering for error context.
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Rule deciding whether a [`Combination`] becomes a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Constraint {
    /// Blockwise transfers are only measured with `method`.
    BlockwiseOnlyWith {
        /// Method kept for blockwise runs.
        method: CoapMethod,
    },
    /// Blockwise transfers are never measured with `method`.
    NoBlockwiseWith {
        /// Method dropped for blockwise runs.
        method: CoapMethod,
    },
    /// OSCORE is only measured with `method`.
    OscoreOnlyWith {
        /// Method kept for OSCORE runs.
        method: CoapMethod,
    },
    /// OSCORE is never measured with `method`.
    NoOscoreWith {
        /// Method dropped for OSCORE runs.
        method: CoapMethod,
    },
    /// No blockwise transfers on `link_layer`.
    NoBlockwiseOn {
        /// Link layer without blockwise runs.
        link_layer: LinkLayer,
    },
    /// Caps the query rate for a block size.
    MaxRateForBlocksize {
        /// Block size the cap applies to.
        blocksize: u16,
        /// Highest admitted rate.
        max_rate: f64,
    },
    /// Caps the block size for a record type.
    MaxBlocksizeForRecord {
        /// Record type the cap applies to.
        record: RecordType,
        /// Largest admitted block size.
        max_blocksize: u16,
    },
    /// Delayed responses only below `rate`.
    DelayBelowRate {
        /// First rate without delayed responses.
        rate: f64,
    },
    /// Delayed responses only without blockwise transfer.
    DelayWithoutBlockwise,
    /// Proxied runs only over `transport`.
    ProxiedOnlyOver {
        /// Transport admitted for proxied runs.
        transport: DnsTransport,
    },
    /// Proxied runs only without blockwise transfer.
    ProxiedWithoutBlockwise,
    /// Proxied runs only query `record`.
    ProxiedOnlyFor {
        /// Record type admitted for proxied runs.
        record: RecordType,
    },
    /// Non-proxied runs use only the first Max-Age mode.
    MaxAgeVariesWhenProxied,
}

impl Constraint {
    /// Whether `combo` satisfies the rule.
    pub fn admits(&self, combo: &Combination, axes: &AxisRegistry) -> bool {
        let blockwise = combo.blocksize.is_some();
        let proxied = combo.proxied == Some(true);
        match self {
            Constraint::BlockwiseOnlyWith { method } => !blockwise || combo.method == Some(*method),
            Constraint::NoBlockwiseWith { method } => !blockwise || combo.method != Some(*method),
            Constraint::OscoreOnlyWith { method } => {
                combo.transport != DnsTransport::Oscore || combo.method == Some(*method)
            }
            Constraint::NoOscoreWith { method } => {
                combo.transport != DnsTransport::Oscore || combo.method != Some(*method)
            }
            Constraint::NoBlockwiseOn { link_layer } => {
                !blockwise || combo.link_layer != *link_layer
            }
            Constraint::MaxRateForBlocksize {
                blocksize,
                max_rate,
            } => combo.blocksize != Some(*blocksize) || combo.avg_queries_per_sec <= *max_rate,
            Constraint::MaxBlocksizeForRecord {
                record,
                max_blocksize,
            } => {
                combo.record != *record
                    || combo.blocksize.map_or(true, |size| size <= *max_blocksize)
            }
            Constraint::DelayBelowRate { rate } => {
                !combo.response_delay.is_active() || combo.avg_queries_per_sec < *rate
            }
            Constraint::DelayWithoutBlockwise => !combo.response_delay.is_active() || !blockwise,
            Constraint::ProxiedOnlyOver { transport } => !proxied || combo.transport == *transport,
            Constraint::ProxiedWithoutBlockwise => !proxied || !blockwise,
            Constraint::ProxiedOnlyFor { record } => !proxied || combo.record == *record,
            Constraint::MaxAgeVariesWhenProxied => {
                proxied || axes.max_age_modes.first() == Some(&combo.max_age_mode)
            }
        }
    }
}

/// Rules of the load preset.
pub fn load_constraints() -> Vec<Constraint> {
    vec![
        Constraint::BlockwiseOnlyWith {
            method: CoapMethod::Get,
        },
        Constraint::MaxRateForBlocksize {
            blocksize: 16,
            max_rate: 5.0,
        },
        Constraint::MaxBlocksizeForRecord {
            record: RecordType::A,
            max_blocksize: 58,
        },
        Constraint::DelayBelowRate { rate: 10.0 },
        Constraint::DelayWithoutBlockwise,
        Constraint::OscoreOnlyWith {
            method: CoapMethod::Fetch,
        },
        Constraint::NoBlockwiseOn {
            link_layer: LinkLayer::Ble,
        },
    ]
}

/// Rules shared by the proxy and Max-Age presets.
pub fn proxy_constraints() -> Vec<Constraint> {
    vec![
        Constraint::NoBlockwiseWith {
            method: CoapMethod::Get,
        },
        Constraint::NoOscoreWith {
            method: CoapMethod::Get,
        },
        Constraint::ProxiedOnlyOver {
            transport: DnsTransport::Coap,
        },
        Constraint::ProxiedWithoutBlockwise,
        Constraint::ProxiedOnlyFor {
            record: RecordType::Aaaa,
        },
        Constraint::MaxBlocksizeForRecord {
            record: RecordType::A,
            max_blocksize: 58,
        },
        Constraint::MaxAgeVariesWhenProxied,
    ]
}
