//! The dispatcher: resolver configuration plus per-flavour hooks.

use std::fmt;
use std::str::FromStr;

use doc_core::{DocError, ErrorInfo};
use doc_descs::{CoapMethod, DnsTransport, Env, MaxAgeMode, Run};
use tracing::{debug, error, info};

use crate::resolver::{
    caching_aaaa_records, BindPorts, ResolverConfig, DTLS_CREDENTIAL_ID, DTLS_CREDENTIAL_KEY,
};
use crate::runner::Runner;
use crate::site::{default_iface, first_free_subnet, free_tap, global_inet6, SiteShell};

/// Port the requesters bind their DNS client to.
const CLIENT_PORT: u16 = 5853;

/// TTL range of the caching experiments.
const CACHING_TTL: [u32; 2] = [2, 8];

/// Which experiment family a description belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavour {
    /// Transport comparison under load.
    Load,
    /// Queries through a CoAP proxy.
    Proxy,
    /// Caching with the Max-Age modes.
    MaxAge,
}

impl Flavour {
    /// All flavours.
    pub const ALL: [Flavour; 3] = [Flavour::Load, Flavour::Proxy, Flavour::MaxAge];

    /// Identifier used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavour::Load => "load",
            Flavour::Proxy => "proxy",
            Flavour::MaxAge => "max-age",
        }
    }

    /// Guesses the flavour from an experiment name like `doc-eval-max_age-24`.
    pub fn infer(name: &str) -> Option<Self> {
        if name.contains("max_age") || name.contains("max-age") {
            Some(Flavour::MaxAge)
        } else if name.contains("proxy") {
            Some(Flavour::Proxy)
        } else if name.contains("load") {
            Some(Flavour::Load)
        } else {
            None
        }
    }

    /// Ports the resolver binds.
    pub fn bind_ports(&self) -> BindPorts {
        match self {
            Flavour::Load => BindPorts::LOAD,
            Flavour::Proxy | Flavour::MaxAge => BindPorts::PROXY,
        }
    }

    /// Hooks adjusting the resolver configuration.
    pub fn hooks(&self) -> Hooks {
        match self {
            Flavour::Load | Flavour::Proxy => Hooks::default(),
            Flavour::MaxAge => Hooks {
                configure: configure_caching,
                pre_run: set_max_age,
            },
        }
    }
}

impl fmt::Display for Flavour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flavour {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flavour::ALL
            .into_iter()
            .find(|flavour| flavour.as_str() == s || flavour.as_str().replace('-', "_") == s)
            .ok_or_else(|| {
                DocError::Dispatch(
                    ErrorInfo::new("unknown-flavour", "unknown dispatcher flavour")
                        .with_context("flavour", s)
                        .with_hint("expected load, proxy or max-age"),
                )
            })
    }
}

/// Resolver configuration hooks of a flavour.
#[derive(Clone, Copy)]
pub struct Hooks {
    /// Applied once when the dispatcher is created.
    pub configure: fn(&mut ResolverConfig),
    /// Applied before every run.
    pub pre_run: fn(&mut ResolverConfig, &Run),
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

fn keep(_: &mut ResolverConfig) {}

fn keep_for_run(_: &mut ResolverConfig, _: &Run) {}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            configure: keep,
            pre_run: keep_for_run,
        }
    }
}

fn configure_caching(config: &mut ResolverConfig) {
    config.transports.coap.use_etag = Some(true);
    config.mock_dns_upstream.ttl = Some(CACHING_TTL);
    config.mock_dns_upstream.records.aaaa = caching_aaaa_records();
}

fn set_max_age(config: &mut ResolverConfig, run: &Run) {
    config.transports.coap.max_age = Some(run.args.max_age_mode.unwrap_or(MaxAgeMode::Min));
}

/// State handed from [`Dispatcher::pre_run`] to [`Dispatcher::post_run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    /// Whether the requesters reached the resolver.
    pub resolver_reachable: bool,
    /// Global address of the proxy node, needed for proxied runs.
    pub proxy_address: Option<String>,
    /// Resolver configuration file content of the run.
    pub resolver_config: Option<String>,
    /// Endpoint the requesters query.
    pub endpoint: Option<String>,
    /// Commands for the requester shells, in order.
    pub node_cmds: Vec<String>,
    /// Environment entries added to the run.
    pub env: Env,
}

/// Prepares runs of one experiment flavour.
#[derive(Debug)]
pub struct Dispatcher<S> {
    flavour: Flavour,
    ports: BindPorts,
    config: ResolverConfig,
    hooks: Hooks,
    shell: S,
    bind_address: Option<String>,
    wpan_prefix: Option<String>,
}

impl<S: SiteShell> Dispatcher<S> {
    /// A dispatcher for `flavour` probing the site through `shell`.
    pub fn new(flavour: Flavour, shell: S) -> Result<Self, DocError> {
        let ports = flavour.bind_ports();
        ports.validate()?;
        let hooks = flavour.hooks();
        let mut config = ResolverConfig::new(&ports);
        (hooks.configure)(&mut config);
        Ok(Self {
            flavour,
            ports,
            config,
            hooks,
            shell,
            bind_address: None,
            wpan_prefix: None,
        })
    }

    /// Flavour of the dispatcher.
    pub fn flavour(&self) -> Flavour {
        self.flavour
    }

    /// Bound ports.
    pub fn ports(&self) -> &BindPorts {
        &self.ports
    }

    /// The current resolver configuration record.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// A fresh runner for one experiment.
    pub fn runner(&self) -> Runner {
        Runner::new(self.flavour)
    }

    /// Global address of the site host's default interface, probed once.
    pub fn get_resolver_bind_address(&mut self) -> Result<Option<String>, DocError> {
        if self.bind_address.is_none() {
            let routes = self.shell.ip_route()?;
            if let Some(iface) = default_iface(&routes) {
                let addrs = self.shell.ip_addr_show(iface)?;
                self.bind_address = global_inet6(&addrs).map(|addr| addr.to_string());
                debug!(iface, address = ?self.bind_address, "resolver bind address");
            }
        }
        Ok(self.bind_address.clone())
    }

    /// The probed bind address.
    pub fn resolver_bind_address(&self) -> Result<&str, DocError> {
        self.bind_address
            .as_deref()
            .ok_or_else(|| not_probed("bind-address-unknown", "get_resolver_bind_address"))
    }

    /// Pins the bind address instead of probing the site host.
    pub fn set_resolver_bind_address(&mut self, address: impl Into<String>) {
        self.bind_address = Some(address.into());
    }

    /// First /64 of `site_prefix` not routed on the site host, probed once.
    pub fn get_wpan_prefix(&mut self, site_prefix: &str) -> Result<Option<String>, DocError> {
        if self.wpan_prefix.is_none() {
            let routes = self.shell.ip_route()?;
            self.wpan_prefix = first_free_subnet(site_prefix, &routes)?.map(|net| net.to_string());
        }
        Ok(self.wpan_prefix.clone())
    }

    /// The probed wpan prefix.
    pub fn wpan_prefix(&self) -> Result<&str, DocError> {
        self.wpan_prefix
            .as_deref()
            .ok_or_else(|| not_probed("wpan-prefix-unknown", "get_wpan_prefix"))
    }

    /// Lowest unused `tap<n>` on the site host.
    pub fn get_free_tap(&self) -> Result<String, DocError> {
        Ok(free_tap(&self.shell.ip_link()?))
    }

    /// Border router command line for `sink` on `tap`.
    pub fn border_router_cmd(&self, sink: &str, tap: &str) -> Result<String, DocError> {
        let ports: Vec<String> = self.ports.all().iter().map(u16::to_string).collect();
        Ok(format!(
            "sudo ethos_uhcpd.py --udp-ports {} {sink} {tap} {}",
            ports.join(","),
            self.wpan_prefix()?
        ))
    }

    /// URI or socket address the requesters query for `run`.
    pub fn resolver_endpoint(&self, run: &Run) -> Result<String, DocError> {
        let address = self.resolver_bind_address()?;
        let transport = run_transport(run)?;
        let port = self.ports.for_transport(transport);
        let endpoint = match transport {
            DnsTransport::Udp | DnsTransport::Dtls => format!("[{address}]:{port}"),
            DnsTransport::Coap | DnsTransport::Coaps | DnsTransport::Oscore => {
                let scheme = match transport {
                    DnsTransport::Coaps => "coaps",
                    _ => "coap",
                };
                let query = match run.args.method {
                    Some(CoapMethod::Get) => "{?dns}",
                    _ => "",
                };
                format!("{scheme}://[{address}]:{port}/dns{query}")
            }
        };
        Ok(endpoint)
    }

    /// Configuration record for `run`: bound, with OSCORE context and delay.
    pub fn resolver_config(&self, run: &Run) -> Result<ResolverConfig, DocError> {
        let mut config = self.config.clone();
        config.bind(self.resolver_bind_address()?);
        if run_transport(run)? == DnsTransport::Oscore {
            config = config.with_oscore();
        }
        let delay = run.args.response_delay;
        if delay.queries.is_some_and(|queries| queries > 0.0) {
            config.mock_dns_upstream.response_delay = Some(delay);
        }
        Ok(config)
    }

    /// Rendered configuration file for `run`.
    pub fn resolver_config_yaml(&self, run: &Run) -> Result<String, DocError> {
        self.resolver_config(run)?.to_yaml()
    }

    /// Prepares `run`: applies the flavour hook, renders the resolver
    /// configuration and the requester commands.
    ///
    /// Fails when the requesters did not reach the resolver; the runner then
    /// only emits its `ERROR:` command.
    pub fn pre_run(
        &mut self,
        runner: &mut Runner,
        run: &Run,
        ctx: &mut RunContext,
    ) -> Result<(), DocError> {
        (self.hooks.pre_run)(&mut self.config, run);
        ctx.resolver_config = Some(self.resolver_config_yaml(run)?);
        let endpoint = self.resolver_endpoint(run)?;
        ctx.node_cmds = vec![format!(
            "init {endpoint} {CLIENT_PORT} {DTLS_CREDENTIAL_ID} {DTLS_CREDENTIAL_KEY}"
        )];
        ctx.endpoint = Some(endpoint);
        if run.args.proxied == Some(true) {
            let proxy = ctx.proxy_address.as_deref().ok_or_else(|| {
                DocError::Dispatch(ErrorInfo::new(
                    "missing-proxy-address",
                    "proxied run without a proxy address",
                ))
            })?;
            ctx.node_cmds.push(format!("proxy coap://[{proxy}]/"));
        }
        runner.resolver_running = ctx.resolver_reachable;
        ctx.env
            .set("RESOLVER_RUNNING", if ctx.resolver_reachable { "1" } else { "0" });
        if !ctx.resolver_reachable {
            error!("resolver is unreachable");
            return Err(DocError::Dispatch(ErrorInfo::new(
                "resolver-not-running",
                "resolver not running",
            )));
        }
        info!(endpoint = ctx.endpoint.as_deref().unwrap_or_default(), "run prepared");
        Ok(())
    }

    /// Tears `run` down: drops the configuration file and stops the resolver.
    pub fn post_run(&mut self, runner: &mut Runner, _run: &Run, ctx: &mut RunContext) {
        ctx.resolver_config = None;
        ctx.endpoint = None;
        ctx.node_cmds.clear();
        runner.resolver_running = false;
    }
}

fn not_probed(code: &str, probe: &str) -> DocError {
    DocError::Dispatch(
        ErrorInfo::new(code, "site was not probed yet").with_hint(format!("call {probe}() first")),
    )
}

fn run_transport(run: &Run) -> Result<DnsTransport, DocError> {
    let name = run.env.get_str("DNS_TRANSPORT").unwrap_or_default();
    name.parse().map_err(|_| {
        DocError::Dispatch(
            ErrorInfo::new("unexpected-transport", "unexpected DNS_TRANSPORT")
                .with_context("dns_transport", name),
        )
    })
}
