//! Testbed setup shared by all runs of a description: firmwares, nodes and
//! the `globals` block.

use std::collections::BTreeMap;

use doc_core::{DocError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::axis::LinkLayer;
use crate::env::Env;
use crate::naming::NameTemplates;

/// Modules the BLE boards need on top of the regular build.
const BLE_MODULES: &str = "nimble_netif nimble_rpble";

// Sink, proxy, then requesters, with their link-layer addresses.
const SCALED_NODES: [(&str, &str); 8] = [
    ("m3-282", "aa:2c:b1:82:97:b5:4d:7b"),
    ("m3-288", "5a:84:04:c6:40:eb:46:23"),
    ("m3-2", "a6:4b:b8:1f:28:20:90:f6"),
    ("m3-3", "ee:bb:d6:2e:da:17:c4:1b"),
    ("m3-4", "aa:08:e0:73:a0:df:96:5f"),
    ("m3-70", "a6:96:d1:50:ff:29:5f:cf"),
    ("m3-71", "ba:70:ed:a5:93:b8:4d:bc"),
    ("m3-72", "ae:1d:64:ff:90:fe:8c:3c"),
];

/// Testbed site hosting the boards of `link_layer`.
pub fn site(link_layer: LinkLayer) -> &'static str {
    match link_layer {
        LinkLayer::Ieee802154 => "grenoble",
        LinkLayer::Ble => "saclay",
    }
}

/// IPv6 prefix delegated to the site of `link_layer`.
pub fn site_prefix(link_layer: LinkLayer) -> &'static str {
    match link_layer {
        LinkLayer::Ieee802154 => "2001:660:5307:3100::/57",
        LinkLayer::Ble => "2001:660:3207:04c0::/58",
    }
}

/// Board the firmwares are built for.
pub fn board(link_layer: LinkLayer) -> &'static str {
    match link_layer {
        LinkLayer::Ieee802154 => "iotlab-m3",
        LinkLayer::Ble => "nrf52840dk",
    }
}

/// Space-joined key list telling the docker build which variables to forward.
pub fn docker_env_vars(keys: &[&str]) -> String {
    keys.join(" ")
}

/// Firmware application and its build environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firmware {
    /// Application directory relative to the script directory.
    pub path: String,
    /// Target board, filled in per link layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    /// Build environment.
    #[serde(default, skip_serializing_if = "Env::is_empty")]
    pub env: Env,
}

impl Firmware {
    /// Firmware at `path` without board or environment.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            board: None,
            env: Env::new(),
        }
    }

    /// Replaces the build environment.
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }
}

/// Node forwarding requests between the requesters and the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyNode {
    /// Testbed node name.
    pub name: String,
}

/// Network topology of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// Testbed site.
    pub site: String,
    /// Border router node.
    pub sink: String,
    /// Proxy nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<ProxyNode>,
    /// Directed links as `[parent, child]` pairs.
    pub edgelist: Vec<[String; 2]>,
}

/// Nodes reserved for an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nodes {
    /// Topology.
    pub network: Network,
    /// Link-layer addresses of the nodes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub l2addrs: BTreeMap<String, String>,
}

impl Nodes {
    /// Topology at the site of `link_layer`.
    pub fn new(link_layer: LinkLayer, sink: &str, edges: &[(&str, &str)]) -> Self {
        Self {
            network: Network {
                site: site(link_layer).to_owned(),
                sink: sink.to_owned(),
                proxies: Vec::new(),
                edgelist: edges
                    .iter()
                    .map(|(parent, child)| [(*parent).to_owned(), (*child).to_owned()])
                    .collect(),
            },
            l2addrs: BTreeMap::new(),
        }
    }

    /// Adds proxy nodes.
    pub fn with_proxies(mut self, names: &[&str]) -> Self {
        self.network.proxies.extend(names.iter().map(|name| ProxyNode {
            name: (*name).to_owned(),
        }));
        self
    }

    /// Adds link-layer addresses.
    pub fn with_l2addrs(mut self, addrs: &[(&str, &str)]) -> Self {
        self.l2addrs.extend(
            addrs
                .iter()
                .map(|(node, addr)| ((*node).to_owned(), (*addr).to_owned())),
        );
        self
    }
}

/// Terminal multiplexer pane the runner types into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tmux {
    /// `session:window.pane` target.
    pub target: String,
}

/// The `globals` block of a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Globals {
    /// Directory the runner stores results in.
    pub results_dir: String,
    /// Environment shared by all builds; holds the first run's env.
    pub env: Env,
    /// Experiment name.
    pub name: String,
    /// IoT-LAB monitoring profiles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Border router firmware.
    pub sink_firmware: Firmware,
    /// Firmwares of the non-sink nodes, in node order.
    pub firmwares: Vec<Firmware>,
    /// Reserved nodes.
    pub nodes: Nodes,
    /// Run name template.
    pub run_name: String,
    /// Run name template for CoAP runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coap_run_name: Option<String>,
    /// Run name template for blockwise CoAP runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coap_blockwise_run_name: Option<String>,
    /// Multiplexer target.
    pub tmux: Tmux,
    /// Reservation length in minutes.
    pub duration: u64,
}

/// Static testbed configuration a preset starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testbed {
    /// Directory the runner stores results in.
    pub results_dir: String,
    /// IEEE 802.15.4 channel.
    pub default_channel: i64,
    /// Monitoring profiles (802.15.4 only).
    pub profiles: Vec<String>,
    /// Border router firmware.
    pub sink_firmware: Firmware,
    /// Proxy firmware, flashed first when present.
    pub proxy_firmware: Option<Firmware>,
    /// Requester firmware.
    pub requester_firmware: Firmware,
    /// Number of requester nodes.
    pub requesters: usize,
    /// Topology per supported link layer.
    pub topologies: BTreeMap<LinkLayer, Nodes>,
    /// Build firmware inside the RIOT docker image.
    pub docker: bool,
}

impl Testbed {
    /// Setup of the load experiments: one border router and one requester.
    pub fn load() -> Self {
        let sink_env = Env::new()
            .with("CFLAGS", "-DLOG_LEVEL=LOG_NONE")
            .with(
                "USEMODULE",
                "gnrc_rpl netstats_l2 gnrc_pktbuf_cmd od gnrc_sixlowpan_frag_stats",
            )
            .with("RIOT_CONFIG_KCONFIG_USEMODULE_GNRC_NETIF", "y")
            .with("RIOT_CONFIG_GNRC_NETIF_IPV6_DO_NOT_COMP_PREFIX", "y")
            .with("ETHOS_BAUDRATE", "500000");
        let mut topologies = BTreeMap::new();
        topologies.insert(
            LinkLayer::Ieee802154,
            Nodes::new(LinkLayer::Ieee802154, "m3-273", &[("m3-273", "m3-281")]),
        );
        topologies.insert(
            LinkLayer::Ble,
            Nodes::new(
                LinkLayer::Ble,
                "nrf52840dk-1",
                &[("nrf52840dk-1", "nrf52840dk-4")],
            ),
        );
        Self {
            results_dir: "../../results".to_owned(),
            default_channel: 16,
            profiles: vec!["sniffer16".to_owned()],
            sink_firmware: Firmware::new("../../RIOT/examples/gnrc_border_router")
                .with_env(sink_env),
            proxy_firmware: None,
            requester_firmware: Firmware::new("../../apps/requester"),
            requesters: 1,
            topologies,
            docker: false,
        }
    }

    /// Setup of the proxy experiments: border router, one proxy, two requesters.
    pub fn proxy() -> Self {
        let sink_keys = [
            "CFLAGS",
            "RIOT_CONFIG_KCONFIG_USEMODULE_GNRC_NETIF",
            "RIOT_CONFIG_GNRC_NETIF_IPV6_BR_AUTO_6CTX",
            "SHOULD_RUN_KCONFIG",
            "ETHOS_BAUDRATE",
            "DEFAULT_CHANNEL",
        ];
        let sink_env = Env::new()
            .with("CFLAGS", "-DLOG_LEVEL=LOG_WARNING")
            .with(
                "USEMODULE",
                "gnrc_pktbuf_cmd gnrc_rpl gnrc_sixlowpan_frag_stats netstats_l2 od",
            )
            .with("RIOT_CONFIG_KCONFIG_USEMODULE_GNRC_NETIF", "y")
            .with("RIOT_CONFIG_GNRC_NETIF_IPV6_BR_AUTO_6CTX", "n")
            .with("SHOULD_RUN_KCONFIG", "1")
            .with("ETHOS_BAUDRATE", "500000")
            .with("DOCKER_ENV_VARS", docker_env_vars(&sink_keys));
        let nodes = Nodes::new(
            LinkLayer::Ieee802154,
            "m3-209",
            &[
                ("m3-209", "m3-205"),
                ("m3-205", "m3-202"),
                ("m3-205", "m3-290"),
            ],
        )
        .with_proxies(&["m3-205"])
        .with_l2addrs(&[
            ("m3-202", "be:b2:ab:af:cd:8a:fb:ce"),
            ("m3-205", "66:4e:6f:87:a1:fa:2f:3e"),
            ("m3-209", "5e:8f:89:df:81:3d:33:b3"),
            ("m3-290", "be:93:f6:36:ea:07:d4:0b"),
        ]);
        let mut topologies = BTreeMap::new();
        topologies.insert(LinkLayer::Ieee802154, nodes);
        Self {
            results_dir: "../../results".to_owned(),
            default_channel: 16,
            profiles: vec!["sniffer16".to_owned()],
            sink_firmware: Firmware::new("../../RIOT/examples/gnrc_border_router")
                .with_env(sink_env),
            proxy_firmware: Some(Firmware::new("../../apps/proxy")),
            requester_firmware: Firmware::new("../../apps/requester")
                .with_env(Env::new().with_int("PROXIED", 1)),
            requesters: 2,
            topologies,
            docker: false,
        }
    }

    /// Swaps in the larger 802.15.4 line-up of the scaled experiments: the
    /// sink feeds one proxy which serves six requesters.
    pub fn scale_out(&mut self) {
        let (sink, _) = SCALED_NODES[0];
        let (proxy, _) = SCALED_NODES[1];
        let edges: Vec<(&str, &str)> = std::iter::once((sink, proxy))
            .chain(SCALED_NODES[2..].iter().map(|(node, _)| (proxy, *node)))
            .collect();
        let nodes = Nodes::new(LinkLayer::Ieee802154, sink, &edges)
            .with_proxies(&[proxy])
            .with_l2addrs(&SCALED_NODES);
        self.topologies = BTreeMap::from([(LinkLayer::Ieee802154, nodes)]);
        self.requesters = SCALED_NODES.len() - 2;
    }

    /// Whether a topology for `link_layer` exists.
    pub fn supports(&self, link_layer: LinkLayer) -> bool {
        self.topologies.contains_key(&link_layer)
    }

    /// Fails with an axis error when `link_layer` has no topology.
    pub fn ensure_supported(&self, link_layer: LinkLayer) -> Result<(), DocError> {
        if self.supports(link_layer) {
            Ok(())
        } else {
            Err(self.unsupported(link_layer))
        }
    }

    fn unsupported(&self, link_layer: LinkLayer) -> DocError {
        let supported: Vec<_> = self.topologies.keys().map(LinkLayer::as_str).collect();
        DocError::Axis(
            ErrorInfo::new(
                "unsupported-link-layer",
                format!("no testbed topology for link layer {link_layer}"),
            )
            .with_context("link_layer", link_layer.as_str())
            .with_hint(format!("supported: {}", supported.join(", "))),
        )
    }

    /// Builds the `globals` block for `link_layer`; `duration` is left at 0.
    pub fn globals(
        &self,
        name: &str,
        tmux_session: &str,
        link_layer: LinkLayer,
        query_count: u32,
        names: &NameTemplates,
    ) -> Result<Globals, DocError> {
        let nodes = self
            .topologies
            .get(&link_layer)
            .cloned()
            .ok_or_else(|| self.unsupported(link_layer))?;
        let board = board(link_layer).to_owned();

        let mut env = Env::new()
            .with_int("DEFAULT_CHANNEL", self.default_channel)
            .with_int("QUERY_COUNT", i64::from(query_count));
        env.set("SITE_PREFIX", site_prefix(link_layer));

        let mut sink_firmware = self.sink_firmware.clone();
        sink_firmware.board = Some(board.clone());
        let mut profiles = self.profiles.clone();
        if link_layer == LinkLayer::Ble {
            profiles.clear();
            sink_firmware.env.remove("ETHOS_BAUDRATE");
            let modules = match sink_firmware.env.get_str("USEMODULE") {
                Some(modules) => format!("{modules} {BLE_MODULES}"),
                None => BLE_MODULES.to_owned(),
            };
            sink_firmware.env.set("USEMODULE", modules);
        }
        if self.docker {
            env.set_int("BUILD_IN_DOCKER", 1);
            let modules = sink_firmware
                .env
                .get_str("USEMODULE")
                .unwrap_or_default()
                .to_owned();
            let cmdline = format!("-e 'USEMODULE={modules}'");
            let cmdline = match sink_firmware.env.get_str("DOCKER_ENVIRONMENT_CMDLINE") {
                Some(existing) => format!("{existing}{cmdline}"),
                None => cmdline,
            };
            sink_firmware.env.set("DOCKER_ENVIRONMENT_CMDLINE", cmdline);
        }

        let mut firmwares = Vec::with_capacity(self.requesters + 1);
        if let Some(proxy) = &self.proxy_firmware {
            firmwares.push(proxy.clone());
        }
        firmwares.extend(std::iter::repeat(self.requester_firmware.clone()).take(self.requesters));
        for firmware in &mut firmwares {
            firmware.board = Some(board.clone());
            if link_layer == LinkLayer::Ble {
                firmware.env.set("USEMODULE", BLE_MODULES);
            }
        }

        Ok(Globals {
            results_dir: self.results_dir.clone(),
            env,
            name: name.to_owned(),
            profiles,
            sink_firmware,
            firmwares,
            nodes,
            run_name: names.run_name.clone(),
            coap_run_name: names.coap_run_name.clone(),
            coap_blockwise_run_name: names.coap_blockwise_run_name.clone(),
            tmux: Tmux {
                target: format!("{tmux_session}:run.0"),
            },
            duration: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> NameTemplates {
        NameTemplates {
            run_name: "{exp.name}-{exp.exp_id}-{time}".to_owned(),
            coap_run_name: None,
            coap_blockwise_run_name: None,
        }
    }

    #[test]
    fn ble_globals_drop_ethos_and_profiles() {
        let globals = Testbed::load()
            .globals("doc-eval-load", "doc-eval-load", LinkLayer::Ble, 60, &names())
            .unwrap();
        assert!(globals.profiles.is_empty());
        assert!(!globals.sink_firmware.env.contains("ETHOS_BAUDRATE"));
        assert!(globals
            .sink_firmware
            .env
            .get_str("USEMODULE")
            .unwrap()
            .ends_with("nimble_netif nimble_rpble"));
        assert_eq!(globals.nodes.network.site, "saclay");
        assert_eq!(globals.sink_firmware.board.as_deref(), Some("nrf52840dk"));
        assert_eq!(
            globals.firmwares[0].env.get_str("USEMODULE"),
            Some("nimble_netif nimble_rpble")
        );
    }

    #[test]
    fn proxy_firmware_order_and_tmux_target() {
        let globals = Testbed::proxy()
            .globals(
                "doc-eval-proxy",
                "doc-eval-proxy",
                LinkLayer::Ieee802154,
                50,
                &names(),
            )
            .unwrap();
        let paths: Vec<_> = globals.firmwares.iter().map(|fw| fw.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["../../apps/proxy", "../../apps/requester", "../../apps/requester"]
        );
        assert_eq!(globals.tmux.target, "doc-eval-proxy:run.0");
        assert_eq!(
            globals.env.get_str("SITE_PREFIX"),
            Some("2001:660:5307:3100::/57")
        );
    }

    #[test]
    fn proxy_has_no_ble_topology() {
        let err = Testbed::proxy()
            .globals("p", "p", LinkLayer::Ble, 50, &names())
            .unwrap_err();
        assert_eq!(err.info().code, "unsupported-link-layer");
    }

    #[test]
    fn docker_forwards_sink_modules() {
        let mut testbed = Testbed::load();
        testbed.docker = true;
        let globals = testbed
            .globals("l", "l", LinkLayer::Ieee802154, 60, &names())
            .unwrap();
        assert_eq!(
            globals.env.get("BUILD_IN_DOCKER").and_then(|v| v.as_i64()),
            Some(1)
        );
        assert!(globals
            .sink_firmware
            .env
            .get_str("DOCKER_ENVIRONMENT_CMDLINE")
            .unwrap()
            .starts_with("-e 'USEMODULE=gnrc_rpl"));
    }

    #[test]
    fn scaled_out_proxy_serves_six_requesters() {
        let mut testbed = Testbed::proxy();
        testbed.scale_out();
        let globals = testbed
            .globals(
                "doc-eval-proxy-8",
                "doc-eval-proxy",
                LinkLayer::Ieee802154,
                8,
                &names(),
            )
            .unwrap();
        let network = &globals.nodes.network;
        assert_eq!(network.sink, "m3-282");
        assert_eq!(network.proxies, vec![ProxyNode { name: "m3-288".to_owned() }]);
        assert_eq!(network.edgelist.len(), 7);
        assert_eq!(network.edgelist[0], ["m3-282".to_owned(), "m3-288".to_owned()]);
        assert!(network.edgelist[1..].iter().all(|[parent, _]| parent == "m3-288"));
        assert_eq!(globals.nodes.l2addrs.len(), 8);
        assert_eq!(globals.firmwares.len(), 7);
        assert_eq!(globals.firmwares[0].path, "../../apps/proxy");
        assert!(!testbed.supports(LinkLayer::Ble));
    }
}
