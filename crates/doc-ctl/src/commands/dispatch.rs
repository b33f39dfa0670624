use std::collections::HashSet;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::net::Ipv6Addr;
use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use doc_descs::{expand_name, run_template, Description, ExperimentStub};
use doc_dispatch::{Dispatcher, Flavour, LocalShell, RunContext};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Description written by `doc-ctl descs`.
    pub descs: PathBuf,
    /// Dispatcher flavour (load, proxy, max-age), inferred from the experiment name if omitted.
    #[arg(long)]
    pub flavour: Option<Flavour>,
    /// Resolver bind address; probed on the site host when omitted.
    #[arg(long)]
    pub bind_address: Option<Ipv6Addr>,
    /// Probe the site host through ssh instead of locally.
    #[arg(long, value_name = "TARGET")]
    pub ssh: Option<String>,
    /// Global address of the proxy node, required for proxied runs.
    #[arg(long)]
    pub proxy_address: Option<Ipv6Addr>,
    /// Plan the runs as if the requesters could not reach the resolver.
    #[arg(long)]
    pub resolver_down: bool,
}

pub fn run(args: &DispatchArgs) -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string(&args.descs)?;
    let desc = Description::from_yaml_str(&text)?;
    let flavour = match args.flavour {
        Some(flavour) => flavour,
        None => Flavour::infer(&desc.globals.name).ok_or_else(|| {
            format!(
                "cannot infer a flavour from '{}', pass --flavour",
                desc.globals.name
            )
        })?,
    };

    let shell = match &args.ssh {
        Some(target) => LocalShell::over_ssh(target.clone()),
        None => LocalShell::new(),
    };
    let mut dispatcher = Dispatcher::new(flavour, shell)?;
    match args.bind_address {
        Some(address) => dispatcher.set_resolver_bind_address(address.to_string()),
        None => {
            if dispatcher.get_resolver_bind_address()?.is_none() {
                return Err("site host has no global address on its default route".into());
            }
        }
    }
    info!(%flavour, address = dispatcher.resolver_bind_address()?, "dispatching");

    let mut runner = dispatcher.runner();
    let mut out = io::stdout().lock();
    for exp in &desc.experiments {
        let stub = ExperimentStub {
            name: exp.name.clone(),
            exp_id: exp.exp_id,
        };
        for run in &exp.runs {
            let time = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
            let name = expand_name(run_template(&desc.globals, run), run, &stub, time)?;
            writeln!(out, "# {name}")?;

            let base: HashSet<String> = dispatcher
                .config()
                .to_yaml()?
                .lines()
                .map(str::to_owned)
                .collect();
            let mut ctx = RunContext {
                resolver_reachable: !args.resolver_down,
                proxy_address: args.proxy_address.map(|address| address.to_string()),
                ..RunContext::default()
            };
            match dispatcher.pre_run(&mut runner, run, &mut ctx) {
                Ok(()) => {
                    if let Some(config) = &ctx.resolver_config {
                        for line in config.lines().filter(|line| !base.contains(*line)) {
                            writeln!(out, "resolver: {line}")?;
                        }
                    }
                    for cmd in &ctx.node_cmds {
                        writeln!(out, "node: {cmd}")?;
                    }
                }
                Err(err) if err.info().code == "resolver-not-running" => {
                    warn!(run = %name, "resolver not reachable");
                }
                Err(err) => return Err(err.into()),
            }
            for cmd in runner.get_tmux_cmds(run) {
                writeln!(out, "tmux: {cmd}")?;
            }
            dispatcher.post_run(&mut runner, run, &mut ctx);
        }
    }
    Ok(())
}
