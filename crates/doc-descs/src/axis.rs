//! Value types for the experiment axes.

use std::fmt;
use std::str::FromStr;

use doc_core::{DocError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Radio link layer the testbed nodes communicate over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkLayer {
    /// IEEE 802.15.4 radios on the M3 nodes.
    Ieee802154,
    /// Bluetooth Low Energy on the nRF52840 boards.
    Ble,
}

impl LinkLayer {
    /// All supported link layers, in canonical order.
    pub const ALL: [LinkLayer; 2] = [LinkLayer::Ieee802154, LinkLayer::Ble];

    /// Canonical lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkLayer::Ieee802154 => "ieee802154",
            LinkLayer::Ble => "ble",
        }
    }
}

impl fmt::Display for LinkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkLayer {
    type Err = DocError;

    /// Accepts the canonical names and the usual spellings of 802.15.4
    /// (`IEEE 802.15.4`, `802154`, ...).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_ascii_lowercase();
        if mentions_802154(&lower) {
            return Ok(LinkLayer::Ieee802154);
        }
        if lower == "ble" {
            return Ok(LinkLayer::Ble);
        }
        Err(DocError::Axis(
            ErrorInfo::new("unknown-link-layer", format!("unknown link layer '{value}'"))
                .with_context("value", value)
                .with_hint("expected one of ieee802154, IEEE 802.15.4, 802154, ble"),
        ))
    }
}

/// Matches `802`, optional dot, `15`, optional dot, `4` anywhere in `value`.
fn mentions_802154(value: &str) -> bool {
    let bytes = value.as_bytes();
    (0..bytes.len()).any(|start| {
        let parts: [&[u8]; 3] = [b"802", b"15", b"4"];
        let mut rest = &bytes[start..];
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                if let Some(stripped) = rest.strip_prefix(b".") {
                    rest = stripped;
                }
            }
            match rest.strip_prefix(*part) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        }
        true
    })
}

/// DNS transport used between requester and resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsTransport {
    /// Plain DNS over UDP.
    Udp,
    /// DNS over DTLS.
    Dtls,
    /// DNS over CoAP.
    Coap,
    /// DNS over CoAP over DTLS.
    Coaps,
    /// DNS over CoAP protected with OSCORE.
    Oscore,
}

impl DnsTransport {
    /// All transports in canonical order.
    pub const ALL: [DnsTransport; 5] = [
        DnsTransport::Udp,
        DnsTransport::Dtls,
        DnsTransport::Coap,
        DnsTransport::Coaps,
        DnsTransport::Oscore,
    ];

    /// Whether the transport carries DNS messages in CoAP.
    pub fn is_coap(&self) -> bool {
        matches!(
            self,
            DnsTransport::Coap | DnsTransport::Coaps | DnsTransport::Oscore
        )
    }

    /// Lowercase identifier used in environments and names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsTransport::Udp => "udp",
            DnsTransport::Dtls => "dtls",
            DnsTransport::Coap => "coap",
            DnsTransport::Coaps => "coaps",
            DnsTransport::Oscore => "oscore",
        }
    }
}

impl fmt::Display for DnsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DnsTransport {
    type Err = DocError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DnsTransport::ALL
            .into_iter()
            .find(|transport| transport.as_str() == value)
            .ok_or_else(|| {
                DocError::Axis(
                    ErrorInfo::new("unknown-transport", format!("unknown DNS transport '{value}'"))
                        .with_context("value", value),
                )
            })
    }
}

/// CoAP request method used for DNS queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoapMethod {
    /// FETCH with the query in the payload.
    Fetch,
    /// GET with the query base64url-encoded in the URI.
    Get,
    /// POST with the query in the payload.
    Post,
}

impl CoapMethod {
    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoapMethod::Fetch => "fetch",
            CoapMethod::Get => "get",
            CoapMethod::Post => "post",
        }
    }
}

impl fmt::Display for CoapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DNS record type queried by the requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record.
    A,
    /// IPv6 address record.
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Address family passed to the requester shell command.
    pub fn family(&self) -> &'static str {
        match self {
            RecordType::A => "inet",
            RecordType::Aaaa => "inet6",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Aaaa => f.write_str("AAAA"),
        }
    }
}

/// How the resolver derives the CoAP Max-Age option from DNS TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxAgeMode {
    /// Max-Age is the minimum TTL of the response.
    #[default]
    Min,
    /// Max-Age is the minimum TTL and TTLs are reduced by it.
    Subtract,
    /// Max-Age follows DNS over HTTPS freshness rules.
    Dohlike,
    /// TTLs are extended to the end of life of the cached entry.
    Eolttls,
}

impl MaxAgeMode {
    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            MaxAgeMode::Min => "min",
            MaxAgeMode::Subtract => "subtract",
            MaxAgeMode::Dohlike => "dohlike",
            MaxAgeMode::Eolttls => "eolttls",
        }
    }
}

impl fmt::Display for MaxAgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artificial delay the mock upstream applies to a share of the queries.
///
/// Both fields are set or both are unset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseDelay {
    /// Delay in seconds.
    pub time: Option<f64>,
    /// Fraction of queries in `[0, 1]` that are delayed.
    pub queries: Option<f64>,
}

impl ResponseDelay {
    /// No delay.
    pub const NONE: ResponseDelay = ResponseDelay {
        time: None,
        queries: None,
    };

    /// Creates a validated delay of `time` seconds for a `queries` share.
    pub fn new(time: f64, queries: f64) -> Result<Self, DocError> {
        let delay = ResponseDelay {
            time: Some(time),
            queries: Some(queries),
        };
        delay.validate()?;
        Ok(delay)
    }

    /// Whether any query is delayed.
    pub fn is_active(&self) -> bool {
        self.time.is_some()
    }

    /// Checks the range of both fields.
    pub fn validate(&self) -> Result<(), DocError> {
        let invalid = |message: &str| {
            DocError::Axis(
                ErrorInfo::new("invalid-response-delay", message)
                    .with_context("time", format!("{:?}", self.time))
                    .with_context("queries", format!("{:?}", self.queries)),
            )
        };
        match (self.time, self.queries) {
            (None, None) => Ok(()),
            (Some(time), Some(queries)) => {
                if !time.is_finite() || time < 0.0 {
                    return Err(invalid("delay time must be a non-negative number"));
                }
                if !(0.0..=1.0).contains(&queries) {
                    return Err(invalid("delayed query share must lie in [0, 1]"));
                }
                Ok(())
            }
            _ => Err(invalid("delay time and query share must be set together")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_layer_spellings() {
        for value in ["ieee802154", "IEEE 802.15.4", "802154", "802.15.4"] {
            assert_eq!(value.parse::<LinkLayer>().unwrap(), LinkLayer::Ieee802154);
        }
        for value in ["ble", "BLE"] {
            assert_eq!(value.parse::<LinkLayer>().unwrap(), LinkLayer::Ble);
        }
        for layer in LinkLayer::ALL {
            assert_eq!(layer.as_str().parse::<LinkLayer>().unwrap(), layer);
        }
    }

    #[test]
    fn link_layer_rejects_indices_and_strangers() {
        for value in ["0", "1", "2", "wifi", "802.11", ""] {
            let err = value.parse::<LinkLayer>().unwrap_err();
            assert_eq!(err.info().code, "unknown-link-layer");
        }
    }

    #[test]
    fn coap_family() {
        let coap: Vec<_> = DnsTransport::ALL
            .into_iter()
            .filter(DnsTransport::is_coap)
            .collect();
        assert_eq!(
            coap,
            vec![DnsTransport::Coap, DnsTransport::Coaps, DnsTransport::Oscore]
        );
    }

    #[test]
    fn response_delay_bounds() {
        assert!(ResponseDelay::new(1.0, 0.25).is_ok());
        assert!(ResponseDelay::new(-1.0, 0.25).is_err());
        assert!(ResponseDelay::new(1.0, 1.5).is_err());
        let half = ResponseDelay {
            time: Some(1.0),
            queries: None,
        };
        assert!(half.validate().is_err());
        assert!(ResponseDelay::NONE.validate().is_ok());
    }
}
