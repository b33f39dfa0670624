//! Named presets and the overlays they are composed of.

use std::fmt;

use doc_core::{DocError, ErrorInfo};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::axis::{DnsTransport, LinkLayer, MaxAgeMode, RecordType, ResponseDelay};
use crate::constraint::proxy_constraints;
use crate::env::Env;
use crate::overrides::AxisOverrides;
use crate::plan::{Partition, Plan};
use crate::testbed::{docker_env_vars, Testbed};

/// CoAP response buffer size of the caching proxy in bytes.
pub const MAX_AGE_RESPONSE_SIZE: i64 = 228;

/// Factor the per-run slack grows by for scaled presets.
const SCALED_SLACK_FACTOR: f64 = 2.5;

/// The experiment families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetKind {
    /// Transport comparison under load.
    Load,
    /// Queries through a CoAP proxy.
    Proxy,
    /// Caching with the different Max-Age modes.
    MaxAge,
}

impl PresetKind {
    /// Name of the experiment and its tmux session.
    pub fn name(&self) -> &'static str {
        match self {
            PresetKind::Load => "doc-eval-load",
            PresetKind::Proxy => "doc-eval-proxy",
            PresetKind::MaxAge => "doc-eval-max_age",
        }
    }
}

/// A preset: a kind and an optional query count `N` replacing the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    /// Experiment family.
    pub kind: PresetKind,
    /// Scaled query count.
    pub scale: Option<u32>,
}

impl Preset {
    /// The load preset.
    pub fn load() -> Self {
        Self {
            kind: PresetKind::Load,
            scale: None,
        }
    }

    /// The proxy preset.
    pub fn proxy() -> Self {
        Self {
            kind: PresetKind::Proxy,
            scale: None,
        }
    }

    /// The Max-Age preset.
    pub fn max_age() -> Self {
        Self {
            kind: PresetKind::MaxAge,
            scale: None,
        }
    }

    /// The `n`-scaled variant of this preset.
    pub fn scaled(mut self, n: u32) -> Self {
        self.scale = Some(n);
        self
    }

    /// Experiment name, e.g. `doc-eval-max_age-24`.
    pub fn name(&self) -> String {
        match self.scale {
            Some(n) => format!("{}-{n}", self.kind.name()),
            None => self.kind.name().to_owned(),
        }
    }

    /// Overlays applied to [`Plan::base`], in order.
    pub fn overlays(&self) -> Vec<Overlay> {
        let mut overlays = match self.kind {
            PresetKind::Load => Vec::new(),
            PresetKind::Proxy => vec![Overlay::Proxy],
            PresetKind::MaxAge => vec![Overlay::Proxy, Overlay::MaxAge],
        };
        if let Some(n) = self.scale {
            overlays.push(Overlay::Scaled(n));
        }
        overlays
    }

    /// Resolves the preset into a plan.
    pub fn plan(&self) -> Result<Plan, DocError> {
        self.plan_with(&[])
    }

    /// Resolves the preset, then applies the caller's overlays.
    pub fn plan_with(&self, extra: &[Overlay]) -> Result<Plan, DocError> {
        let mut plan = Plan::base();
        for overlay in self.overlays().iter().chain(extra) {
            overlay.apply(&mut plan)?;
        }
        Ok(plan)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A modification of a [`Plan`].
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    /// Proxy topology, proxied axis and the proxy admission rules.
    Proxy,
    /// CoAP caching with the Max-Age modes; expects [`Overlay::Proxy`] first.
    MaxAge,
    /// Query count `N`, more proxy buffers and a longer slack.
    Scaled(u32),
    /// Restricts the runs to one link layer.
    LinkLayer(LinkLayer),
    /// Builds firmware in docker; OSCORE cannot be built there.
    Docker,
    /// Operator axis overrides.
    Axes(AxisOverrides),
}

impl Overlay {
    /// Applies the overlay in place.
    pub fn apply(&self, plan: &mut Plan) -> Result<(), DocError> {
        match self {
            Overlay::Proxy => {
                plan.name = PresetKind::Proxy.name().to_owned();
                plan.tmux_session = plan.name.clone();
                let axes = &mut plan.axes;
                axes.dns_transports =
                    vec![DnsTransport::Coap, DnsTransport::Coaps, DnsTransport::Oscore];
                axes.record_types = vec![RecordType::Aaaa, RecordType::A];
                axes.proxied = vec![Some(false), Some(true)];
                axes.avg_queries_per_sec = vec![5.0];
                axes.response_delays = vec![ResponseDelay::NONE];
                axes.query_count = 50;
                plan.constraints = proxy_constraints();
                plan.partition = Partition::PerLinkLayer;
                plan.testbed = Testbed::proxy();
            }
            Overlay::MaxAge => {
                plan.name = PresetKind::MaxAge.name().to_owned();
                plan.tmux_session = plan.name.clone();
                let axes = &mut plan.axes;
                axes.dns_transports = vec![DnsTransport::Coap];
                axes.coap_blocksizes = vec![None];
                axes.record_types = vec![RecordType::Aaaa];
                axes.max_age_modes = vec![Some(MaxAgeMode::Dohlike), Some(MaxAgeMode::Eolttls)];
                axes.client_coap_cache = vec![Some(false), Some(true)];
                axes.dns_cache = vec![Some(false), Some(true)];
                let proxy = plan.testbed.proxy_firmware.as_mut().ok_or_else(|| {
                    DocError::Consistency(
                        ErrorInfo::new("missing-proxy-firmware", "max-age runs need a proxy")
                            .with_context("plan", plan.name.clone()),
                    )
                })?;
                let cache_keys = [
                    "RIOT_CONFIG_KCONFIG_USEMODULE_NANOCOAP_CACHE",
                    "RIOT_CONFIG_KCONFIG_USEMODULE_NANOCOAP",
                    "RIOT_CONFIG_NANOCOAP_CACHE_RESPONSE_SIZE",
                    "RIOT_CONFIG_GCOAP_PDU_BUF_SIZE",
                ];
                proxy.env.extend(
                    &Env::new()
                        .with(cache_keys[0], "y")
                        .with(cache_keys[1], "y")
                        .with_int(cache_keys[2], MAX_AGE_RESPONSE_SIZE)
                        .with_int(cache_keys[3], MAX_AGE_RESPONSE_SIZE)
                        .with("DOCKER_ENV_VARS", docker_env_vars(&cache_keys)),
                );
            }
            Overlay::Scaled(n) => {
                if *n == 0 {
                    return Err(DocError::Axis(
                        ErrorInfo::new("invalid-scale", "scaled query count must be positive")
                            .with_context("n", n.to_string()),
                    ));
                }
                plan.name = format!("{}-{n}", plan.name);
                plan.axes.query_count = *n;
                plan.timing.run_duration_slack *= SCALED_SLACK_FACTOR;
                let nib = Env::new()
                    .with("RIOT_CONFIG_KCONFIG_USEMODULE_GNRC_IPV6_NIB", "y")
                    .with_int("RIOT_CONFIG_GNRC_IPV6_NIB_NUMOF", 16)
                    .with_int("RIOT_CONFIG_GNRC_IPV6_NIB_OFFL_NUMOF", 16);
                if let Some(proxy) = plan.testbed.proxy_firmware.as_mut() {
                    proxy.env.extend(&nib);
                    proxy.env.extend(
                        &Env::new()
                            .with("RIOT_CONFIG_KCONFIG_USEMODULE_GCOAP", "y")
                            .with_int("RIOT_CONFIG_GCOAP_REQ_WAITING_MAX", 70)
                            .with_int("RIOT_CONFIG_GCOAP_RESEND_BUFS_MAX", 70),
                    );
                    plan.testbed.sink_firmware.env.extend(&nib);
                    plan.testbed.scale_out();
                }
                plan.testbed.requester_firmware.env.set("QUIETER", "1");
            }
            Overlay::LinkLayer(link_layer) => {
                plan.testbed.ensure_supported(*link_layer)?;
                plan.axes.select_link_layer(*link_layer);
            }
            Overlay::Docker => {
                plan.testbed.docker = true;
                let before = plan.axes.dns_transports.len();
                plan.axes
                    .dns_transports
                    .retain(|transport| *transport != DnsTransport::Oscore);
                if plan.axes.dns_transports.len() != before {
                    warn!("unable to build libOSCORE in docker, skipping OSCORE runs");
                }
            }
            Overlay::Axes(overrides) => overrides.apply(&mut plan.axes),
        }
        Ok(())
    }
}
