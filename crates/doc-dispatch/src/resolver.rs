//! Configuration record of the mock DNS resolver.

use doc_core::{to_yaml_string, DocError, ErrorInfo};
use doc_descs::{DnsTransport, MaxAgeMode, ResponseDelay};
use serde::{Deserialize, Serialize};

/// DTLS PSK identity shared by resolver and requesters.
pub const DTLS_CREDENTIAL_ID: &str = "Client_identity";
/// DTLS pre-shared key.
pub const DTLS_CREDENTIAL_KEY: &str = "secretPSK";
/// A record served by the mock upstream.
pub const DNS_A_RECORD: &str = "10.0.0.7";
/// AAAA record served by the mock upstream.
pub const DNS_AAAA_RECORD: &str = "2001:db8::7";
/// Directory holding the resolver's OSCORE security context.
pub const OSCORE_KEYDIR: &str = "oscore_server_creds/from-client1/";

const DTLS_HANDSHAKE_DELAY: f64 = 0.04;

/// UDP ports the resolver binds per transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindPorts {
    /// Plain DNS over UDP.
    pub udp: u16,
    /// DNS over DTLS.
    pub dtls: u16,
    /// DNS over CoAP.
    pub coap: u16,
    /// DNS over CoAPS, always `coap + 1`.
    pub coaps: u16,
    /// OSCORE shares the CoAP port.
    pub oscore: u16,
}

impl BindPorts {
    /// Ports of the load experiments.
    pub const LOAD: BindPorts = BindPorts {
        udp: 5300,
        dtls: 8530,
        coap: 8383,
        coaps: 8384,
        oscore: 8383,
    };

    /// Ports of the proxy and Max-Age experiments.
    pub const PROXY: BindPorts = BindPorts {
        udp: 5301,
        dtls: 8531,
        coap: 8483,
        coaps: 8484,
        oscore: 8483,
    };

    /// Port serving `transport`.
    pub fn for_transport(&self, transport: DnsTransport) -> u16 {
        match transport {
            DnsTransport::Udp => self.udp,
            DnsTransport::Dtls => self.dtls,
            DnsTransport::Coap => self.coap,
            DnsTransport::Coaps => self.coaps,
            DnsTransport::Oscore => self.oscore,
        }
    }

    /// Ports forwarded by the border router, in transport order.
    pub fn all(&self) -> [u16; 5] {
        [self.udp, self.dtls, self.coap, self.coaps, self.oscore]
    }

    /// CoAPS must follow CoAP directly, the resolver derives it.
    pub fn validate(&self) -> Result<(), DocError> {
        if self.coaps != self.coap.wrapping_add(1) {
            return Err(DocError::Dispatch(
                ErrorInfo::new("invalid-bind-ports", "coaps port must follow the coap port")
                    .with_context("coap", self.coap.to_string())
                    .with_context("coaps", self.coaps.to_string()),
            ));
        }
        Ok(())
    }
}

/// DTLS handshake pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtlsTiming {
    /// Delay before ServerHelloDone in seconds.
    pub server_hello_done_delay: f64,
    /// Delay before Finished in seconds.
    pub finish_delay: f64,
}

/// DTLS PSK credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtlsCredentials {
    /// PSK identity.
    pub client_identity: String,
    /// Pre-shared key.
    pub psk: String,
}

/// One record or a set of records of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordSet {
    /// A single record.
    One(String),
    /// Several records, answered together.
    Many(Vec<String>),
}

/// Records of class `IN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InRecords {
    /// IPv4 records.
    #[serde(rename = "A")]
    pub a: RecordSet,
    /// IPv6 records.
    #[serde(rename = "AAAA")]
    pub aaaa: RecordSet,
}

/// The upstream the resolver answers from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockUpstream {
    /// Records of class `IN`.
    #[serde(rename = "IN")]
    pub records: InRecords,
    /// Range the record TTLs are drawn from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<[u32; 2]>,
    /// Delay applied to a share of the queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_delay: Option<ResponseDelay>,
}

/// A resolver endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Bind port.
    pub port: u16,
    /// Bind address, filled in once the site was probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// The CoAP endpoint with its caching knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoapTransportConfig {
    /// Bind port.
    pub port: u16,
    /// Bind address, filled in once the site was probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// How Max-Age is derived from the TTLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<MaxAgeMode>,
    /// Whether responses carry an ETag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_etag: Option<bool>,
}

/// Endpoints of the resolver; CoAPS and OSCORE derive from `coap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transports {
    /// DNS over UDP.
    pub udp: TransportConfig,
    /// DNS over DTLS.
    pub dtls: TransportConfig,
    /// DNS over CoAP.
    pub coap: CoapTransportConfig,
}

/// OSCORE security context location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscoreCredentials {
    /// Key directory.
    pub keydir: String,
    /// Client id within the key directory.
    pub client_id: String,
}

/// Configuration file handed to the resolver for each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// DTLS handshake pacing.
    pub dtls: DtlsTiming,
    /// DTLS credentials.
    pub dtls_credentials: DtlsCredentials,
    /// Mock upstream.
    pub mock_dns_upstream: MockUpstream,
    /// Endpoints.
    pub transports: Transports,
    /// OSCORE context, only for OSCORE runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscore_credentials: Option<OscoreCredentials>,
}

impl ResolverConfig {
    /// Base configuration binding `ports`.
    pub fn new(ports: &BindPorts) -> Self {
        Self {
            dtls: DtlsTiming {
                server_hello_done_delay: DTLS_HANDSHAKE_DELAY,
                finish_delay: DTLS_HANDSHAKE_DELAY,
            },
            dtls_credentials: DtlsCredentials {
                client_identity: DTLS_CREDENTIAL_ID.to_owned(),
                psk: DTLS_CREDENTIAL_KEY.to_owned(),
            },
            mock_dns_upstream: MockUpstream {
                records: InRecords {
                    a: RecordSet::One(DNS_A_RECORD.to_owned()),
                    aaaa: RecordSet::One(DNS_AAAA_RECORD.to_owned()),
                },
                ttl: None,
                response_delay: None,
            },
            transports: Transports {
                udp: TransportConfig {
                    port: ports.udp,
                    host: None,
                },
                dtls: TransportConfig {
                    port: ports.dtls,
                    host: None,
                },
                coap: CoapTransportConfig {
                    port: ports.coap,
                    host: None,
                    max_age: None,
                    use_etag: None,
                },
            },
            oscore_credentials: None,
        }
    }

    /// Binds every transport to `host`.
    pub fn bind(&mut self, host: &str) {
        self.transports.udp.host = Some(host.to_owned());
        self.transports.dtls.host = Some(host.to_owned());
        self.transports.coap.host = Some(host.to_owned());
    }

    /// Enables OSCORE with the requesters' context.
    pub fn with_oscore(mut self) -> Self {
        self.oscore_credentials = Some(OscoreCredentials {
            keydir: OSCORE_KEYDIR.to_owned(),
            client_id: ":client1".to_owned(),
        });
        self
    }

    /// Renders the configuration file.
    pub fn to_yaml(&self) -> Result<String, DocError> {
        to_yaml_string(self)
    }
}

/// AAAA records `2001:db8::7` through `2001:db8::10` for caching runs.
pub fn caching_aaaa_records() -> RecordSet {
    RecordSet::Many(
        ["7", "8", "9", "10"]
            .iter()
            .map(|suffix| DNS_AAAA_RECORD.replace("::7", &format!("::{suffix}")))
            .collect(),
    )
}
