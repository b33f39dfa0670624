use std::cell::Cell;
use std::rc::Rc;

use doc_core::DocError;
use doc_dispatch::site::{default_iface, first_free_subnet, free_tap, global_inet6, link_names};
use doc_dispatch::{Dispatcher, Flavour, SiteShell};
use proptest::prelude::*;

const BASE_ROUTES: &str = "::1 dev lo proto kernel metric 256 pref medium\n\
                           default via 2001:db8::1 dev ens3 metric 1024 onlink pref medium\n\
                           fe80::/64 dev ens3 proto kernel metric 256 pref medium\n";

struct CountingShell {
    routes: String,
    route_calls: Rc<Cell<usize>>,
}

impl CountingShell {
    fn new(routes: &str) -> Self {
        Self {
            routes: routes.to_owned(),
            route_calls: Rc::new(Cell::new(0)),
        }
    }
}

impl SiteShell for CountingShell {
    fn ip_route(&self) -> Result<String, DocError> {
        self.route_calls.set(self.route_calls.get() + 1);
        Ok(self.routes.clone())
    }

    fn ip_addr_show(&self, iface: &str) -> Result<String, DocError> {
        assert_eq!(iface, "ens3");
        Ok("    inet6 fe80::1/64 scope global\n    inet6 2001:db8::dead:c0ff:ee/64 scope global dynamic\n"
            .to_owned())
    }

    fn ip_link(&self) -> Result<String, DocError> {
        Ok("1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536\n\
            2: ens3: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n\
            3: tap0: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500\n\
            4: tap10: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500\n"
            .to_owned())
    }
}

#[test]
fn wpan_prefix_skips_routed_subnets() {
    let free = first_free_subnet("2001:db8::/62", BASE_ROUTES).expect("prefix");
    assert_eq!(free.map(|net| net.to_string()).as_deref(), Some("2001:db8::/64"));

    let routes = format!(
        "{BASE_ROUTES}2001:db8::/64 via fe80::1 dev tap0 metric 1024 onlink pref medium\n"
    );
    let free = first_free_subnet("2001:db8::/62", &routes).expect("prefix");
    assert_eq!(free.map(|net| net.to_string()).as_deref(), Some("2001:db8:0:1::/64"));

    let mut routes = BASE_ROUTES.to_owned();
    for n in 0..4 {
        routes.push_str(&format!("2001:db8:0:{n}::/64 via fe80::1 dev tap0 metric 1024\n"));
    }
    assert!(first_free_subnet("2001:db8::/62", &routes).expect("prefix").is_none());
}

#[test]
fn wpan_prefix_rejects_bad_site_prefixes() {
    for prefix in ["2001:db8::/64", "2001:db8::/72", "not-a-prefix", "2001:db8::1/62"] {
        let err = first_free_subnet(prefix, BASE_ROUTES).unwrap_err();
        assert_eq!(err.info().code, "invalid-site-prefix", "{prefix}");
    }
}

#[test]
fn dispatcher_caches_site_probes() {
    let mut dispatcher = Dispatcher::new(Flavour::Load, CountingShell::new(BASE_ROUTES))
        .expect("dispatcher");
    assert_eq!(
        dispatcher.wpan_prefix().unwrap_err().info().code,
        "wpan-prefix-unknown"
    );
    let prefix = dispatcher
        .get_wpan_prefix("2001:660:5307:3100::/57")
        .expect("probe");
    assert_eq!(prefix.as_deref(), Some("2001:660:5307:3100::/64"));
    assert_eq!(dispatcher.wpan_prefix().expect("cached"), "2001:660:5307:3100::/64");
    dispatcher
        .get_wpan_prefix("2001:660:5307:3100::/57")
        .expect("probe");

    let address = dispatcher.get_resolver_bind_address().expect("probe");
    assert_eq!(address.as_deref(), Some("2001:db8::dead:c0ff:ee"));
    dispatcher.get_resolver_bind_address().expect("probe");

    assert_eq!(dispatcher.get_free_tap().expect("tap"), "tap1");
    let cmd = dispatcher.border_router_cmd("m3-273", "tap1").expect("cmd");
    assert_eq!(
        cmd,
        "sudo ethos_uhcpd.py --udp-ports 5300,8530,8383,8384,8383 m3-273 tap1 \
         2001:660:5307:3100::/64"
    );
}

#[test]
fn route_probe_runs_once_per_fact() {
    let shell = CountingShell::new(BASE_ROUTES);
    let calls = Rc::clone(&shell.route_calls);
    let mut dispatcher = Dispatcher::new(Flavour::Proxy, shell).expect("dispatcher");
    dispatcher.get_wpan_prefix("2001:db8::/62").expect("probe");
    dispatcher.get_wpan_prefix("2001:db8::/62").expect("probe");
    dispatcher.get_resolver_bind_address().expect("probe");
    dispatcher.get_resolver_bind_address().expect("probe");
    assert_eq!(calls.get(), 2);
}

#[test]
fn parses_route_and_addr_output() {
    assert_eq!(default_iface(BASE_ROUTES), Some("ens3"));
    assert_eq!(default_iface("fe80::/64 dev ens3 proto kernel\n"), None);
    let addrs = "2: ens3: <UP> mtu 1500\n    inet6 fe80::2/64 scope link\n";
    assert_eq!(global_inet6(addrs), None);
    let addrs = "    inet6 2001:db8::2/64 scope global\n";
    assert_eq!(
        global_inet6(addrs).map(|addr| addr.to_string()).as_deref(),
        Some("2001:db8::2")
    );
}

#[test]
fn free_tap_compares_whole_names() {
    let links = "1: lo: <LOOPBACK> mtu 65536\n5: tap10: <UP> mtu 1500\n";
    assert_eq!(link_names(links), vec!["lo", "tap10"]);
    assert_eq!(free_tap(links), "tap0");
    let links = "1: tap0: <UP> mtu 1500\n2: tap1: <UP> mtu 1500\n";
    assert_eq!(free_tap(links), "tap2");
}

proptest! {
    #[test]
    fn free_tap_is_never_taken(taken in proptest::collection::btree_set(0u32..16, 0..12)) {
        let links: String = taken
            .iter()
            .enumerate()
            .map(|(idx, num)| format!("{}: tap{num}: <UP> mtu 1500\n", idx + 1))
            .collect();
        let tap = free_tap(&links);
        prop_assert!(tap.starts_with("tap"));
        prop_assert!(tap[3..].bytes().all(|b| b.is_ascii_digit()));
        let num: u32 = tap[3..].parse().unwrap();
        prop_assert!(!taken.contains(&num));
        prop_assert!((0..num).all(|lower| taken.contains(&lower)));
    }

    #[test]
    fn free_subnet_is_first_unrouted(taken in proptest::collection::btree_set(0u16..8, 0..8)) {
        let mut routes = BASE_ROUTES.to_owned();
        for n in &taken {
            routes.push_str(&format!("2001:db8:0:{n:x}::/64 via fe80::1 dev tap0\n"));
        }
        let free = first_free_subnet("2001:db8::/61", &routes).unwrap();
        match (0u16..8).find(|n| !taken.contains(n)) {
            Some(n) => {
                let expected = if n == 0 {
                    "2001:db8::/64".to_owned()
                } else {
                    format!("2001:db8:0:{n:x}::/64")
                };
                prop_assert_eq!(free.map(|net| net.to_string()), Some(expected));
            }
            None => prop_assert!(free.is_none()),
        }
    }
}
