//! Probing of the testbed site host: routes, addresses and links.

use std::net::Ipv6Addr;
use std::process::Command;

use doc_core::{DocError, ErrorInfo};
use tracing::debug;

/// Source of `ip` command output on the site host.
pub trait SiteShell {
    /// Output of `ip -6 route`.
    fn ip_route(&self) -> Result<String, DocError>;

    /// Output of `ip -6 addr show dev <iface>`.
    fn ip_addr_show(&self, iface: &str) -> Result<String, DocError>;

    /// Output of `ip link`.
    fn ip_link(&self) -> Result<String, DocError>;
}

/// Runs `ip` locally or through `ssh` on the site host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalShell {
    ssh_target: Option<String>,
}

impl LocalShell {
    /// Runs the commands on this host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the commands on `target` (e.g. `user@grenoble.iot-lab.info`).
    pub fn over_ssh(target: impl Into<String>) -> Self {
        Self {
            ssh_target: Some(target.into()),
        }
    }

    fn output(&self, args: &[&str]) -> Result<String, DocError> {
        let mut command = match &self.ssh_target {
            Some(target) => {
                let mut ssh = Command::new("ssh");
                ssh.arg(target).arg("ip");
                ssh
            }
            None => Command::new("ip"),
        };
        command.args(args);
        debug!(?command, "probing site");
        let out = command
            .output()
            .map_err(|err| shell_error("ip", args, err.to_string()))?;
        if !out.status.success() {
            return Err(shell_error(
                "ip",
                args,
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

fn shell_error(program: &str, args: &[&str], hint: String) -> DocError {
    DocError::Dispatch(
        ErrorInfo::new("site-command", "site command failed")
            .with_context("command", format!("{program} {}", args.join(" ")))
            .with_hint(hint),
    )
}

impl SiteShell for LocalShell {
    fn ip_route(&self) -> Result<String, DocError> {
        self.output(&["-6", "route"])
    }

    fn ip_addr_show(&self, iface: &str) -> Result<String, DocError> {
        self.output(&["-6", "addr", "show", "dev", iface])
    }

    fn ip_link(&self) -> Result<String, DocError> {
        self.output(&["link"])
    }
}

/// Interface of the default route in `ip -6 route` output.
pub fn default_iface(ip_route: &str) -> Option<&str> {
    ip_route.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("default") {
            return None;
        }
        tokens.skip_while(|token| *token != "dev").nth(1)
    })
}

/// First global, non link-local address in `ip -6 addr show` output.
pub fn global_inet6(ip_addr: &str) -> Option<Ipv6Addr> {
    ip_addr.lines().find_map(|line| {
        if !line.starts_with(char::is_whitespace) {
            return None;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["inet6", cidr, "scope", "global", ..] => {
                let (addr, _) = cidr.split_once('/')?;
                let addr: Ipv6Addr = addr.parse().ok()?;
                (!is_link_local(&addr)).then_some(addr)
            }
            _ => None,
        }
    })
}

fn is_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xffc0 == 0xfe80
}

/// Link names in `ip link` output, without `@parent` suffixes.
pub fn link_names(ip_link: &str) -> Vec<&str> {
    ip_link
        .lines()
        .filter_map(|line| {
            let (index, rest) = line.split_once(':')?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let name = rest.trim_start().split(':').next()?.trim();
            Some(name.split('@').next().unwrap_or(name))
        })
        .collect()
}

/// Lowest `tap<n>` not present among the links.
pub fn free_tap(ip_link: &str) -> String {
    let links = link_names(ip_link);
    (0u32..)
        .map(|num| format!("tap{num}"))
        .find(|tap| !links.contains(&tap.as_str()))
        .unwrap_or_else(|| "tap0".to_owned())
}

/// An IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Net {
    addr: u128,
    len: u8,
}

impl Ipv6Net {
    /// Parses `addr/len`; host bits must be zero.
    pub fn parse(text: &str) -> Option<Self> {
        let (addr, len) = text.trim().split_once('/')?;
        let addr: Ipv6Addr = addr.parse().ok()?;
        let len: u8 = len.parse().ok()?;
        if len > 128 {
            return None;
        }
        let addr = u128::from(addr);
        if addr & !mask(len) != 0 {
            return None;
        }
        Some(Self { addr, len })
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// The `index`-th /64 within this network.
    fn subnet64(&self, index: u128) -> Ipv6Net {
        Ipv6Net {
            addr: self.addr | (index << 64),
            len: 64,
        }
    }
}

impl std::fmt::Display for Ipv6Net {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", Ipv6Addr::from(self.addr), self.len)
    }
}

fn mask(len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(len))
    }
}

/// Routed networks in `ip -6 route` output.
pub fn routed_networks(ip_route: &str) -> Vec<Ipv6Net> {
    ip_route
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|dest| dest.contains('/'))
        .filter_map(Ipv6Net::parse)
        .collect()
}

/// First /64 of `site_prefix` without a route on the site host.
///
/// `site_prefix` must be shorter than /64; `Ok(None)` when every /64 is
/// taken.
pub fn first_free_subnet(site_prefix: &str, ip_route: &str) -> Result<Option<Ipv6Net>, DocError> {
    let prefix = Ipv6Net::parse(site_prefix).ok_or_else(|| {
        DocError::Dispatch(
            ErrorInfo::new("invalid-site-prefix", "SITE_PREFIX is not an IPv6 network")
                .with_context("site_prefix", site_prefix),
        )
    })?;
    if prefix.prefix_len() >= 64 {
        return Err(DocError::Dispatch(
            ErrorInfo::new("invalid-site-prefix", "SITE_PREFIX must be shorter than /64")
                .with_context("site_prefix", site_prefix),
        ));
    }
    let routes = routed_networks(ip_route);
    let count = 1u128 << (64 - u32::from(prefix.prefix_len()));
    // routes.len() + 1 candidates always include a free one if any exists
    let free = (0..count)
        .take(routes.len() + 1)
        .map(|index| prefix.subnet64(index))
        .find(|subnet| !routes.contains(subnet));
    Ok(free)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_networks() {
        let net = Ipv6Net::parse("2001:db8::/62").unwrap();
        assert_eq!(net.prefix_len(), 62);
        assert_eq!(net.to_string(), "2001:db8::/62");
        assert!(Ipv6Net::parse("2001:db8::1/64").is_none());
        assert!(Ipv6Net::parse("default").is_none());
        assert_eq!(
            Ipv6Net::parse("2001:db8:0:0::/64"),
            Ipv6Net::parse("2001:db8::/64")
        );
    }

    #[test]
    fn link_names_strip_parents() {
        let links = "1: lo: <LOOPBACK,UP> mtu 65536\n    link/loopback 00:00\n\
                     7: veth0@if6: <BROADCAST> mtu 1500\n";
        assert_eq!(link_names(links), vec!["lo", "veth0"]);
    }
}
