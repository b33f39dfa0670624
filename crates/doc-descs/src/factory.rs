//! Expansion of the axis product into runs and experiments.

use std::collections::BTreeMap;

use doc_core::{stable_id, DocError, ErrorInfo};
use serde::Serialize;
use tracing::debug;

use crate::axis::{DnsTransport, LinkLayer, RecordType};
use crate::constraint::{Combination, Constraint};
use crate::env::Env;
use crate::naming::NameTemplates;
use crate::plan::{Partition, Plan, Timing};
use crate::registry::AxisRegistry;
use crate::run::{Experiment, Run, RunArgs};

/// Flags of a generator invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOpts {
    /// Reflash before the first run of every experiment.
    pub rebuild_first: bool,
    /// Id of an already running testbed experiment.
    pub exp_id: Option<u64>,
}

/// Experiments of a plan plus the accumulated run time.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Experiments in emission order.
    pub experiments: Vec<Experiment>,
    /// Seconds of the runs grouped per link layer, slack included.
    pub duration_secs: f64,
}

impl Expansion {
    /// First run of the first experiment.
    pub fn first_run(&self) -> Option<&Run> {
        self.experiments.iter().find_map(|exp| exp.runs.first())
    }

    /// Reservation length in minutes of the grouped experiments.
    pub fn duration_minutes(&self, timing: &Timing) -> u64 {
        (self.duration_secs / 60.0) as u64 + timing.duration_margin
    }
}

// Positions of the axes within an index tuple, in emission order.
const LINK_LAYER: usize = 0;
const TRANSPORT: usize = 1;
const METHOD: usize = 2;
const BLOCKSIZE: usize = 3;
const RECORD: usize = 4;
const MAX_AGE: usize = 5;
const CLIENT_CACHE: usize = 6;
const DNS_CACHE: usize = 7;
const PROXIED: usize = 8;
const RATE: usize = 9;
const DELAY: usize = 10;

fn dimensions(axes: &AxisRegistry) -> [usize; 11] {
    [
        axes.link_layers.len(),
        axes.dns_transports.len(),
        axes.coap_methods.len(),
        axes.coap_blocksizes.len(),
        axes.record_types.len(),
        axes.max_age_modes.len(),
        axes.client_coap_cache.len(),
        axes.dns_cache.len(),
        axes.proxied.len(),
        axes.avg_queries_per_sec.len(),
        axes.response_delays.len(),
    ]
}

fn expand_grid(dims: &[usize], idx: usize, current: &mut Vec<usize>, outputs: &mut Vec<Vec<usize>>) {
    if idx == dims.len() {
        outputs.push(current.clone());
        return;
    }
    for value in 0..dims[idx] {
        current.push(value);
        expand_grid(dims, idx + 1, current, outputs);
        current.pop();
    }
}

/// Collapses CoAP-only axes for `indices`.
///
/// Returns `Ok(None)` for tuples that only differ from an already emitted
/// one in a collapsed axis, and an error when the surviving tuple still
/// carries a CoAP-only value on a transport that cannot use it.
fn combination(axes: &AxisRegistry, indices: &[usize]) -> Result<Option<Combination>, DocError> {
    let transport = axes.dns_transports[indices[TRANSPORT]];
    let coap = transport.is_coap();
    if !coap && (indices[METHOD] > 0 || indices[BLOCKSIZE] > 0 || indices[MAX_AGE] > 0) {
        return Ok(None);
    }
    if transport == DnsTransport::Oscore && indices[BLOCKSIZE] > 0 {
        return Ok(None);
    }
    let combo = Combination {
        link_layer: axes.link_layers[indices[LINK_LAYER]],
        transport,
        method: coap.then(|| axes.coap_methods[indices[METHOD]]),
        blocksize: axes.coap_blocksizes[indices[BLOCKSIZE]],
        record: axes.record_types[indices[RECORD]],
        max_age_mode: axes.max_age_modes[indices[MAX_AGE]],
        client_coap_cache: axes.client_coap_cache[indices[CLIENT_CACHE]],
        dns_cache: axes.dns_cache[indices[DNS_CACHE]],
        proxied: axes.proxied[indices[PROXIED]],
        avg_queries_per_sec: (axes.avg_queries_per_sec[indices[RATE]] * 10.0).round() / 10.0,
        response_delay: axes.response_delays[indices[DELAY]],
    };
    let inconsistent = |message: &str| {
        DocError::Consistency(
            ErrorInfo::new("coap-only-axis", message)
                .with_context("combination", combo.describe())
                .with_hint("put the absent value first on CoAP-only axes"),
        )
    };
    if !coap && combo.blocksize.is_some() {
        return Err(inconsistent("block size set for a non-CoAP transport"));
    }
    if !coap && combo.max_age_mode.is_some() {
        return Err(inconsistent("Max-Age mode set for a non-CoAP transport"));
    }
    if transport == DnsTransport::Oscore && combo.blocksize.is_some() {
        return Err(inconsistent("OSCORE does not support blockwise transfer"));
    }
    Ok(Some(combo))
}

fn admitted(constraints: &[Constraint], combo: &Combination, axes: &AxisRegistry) -> bool {
    constraints.iter().all(|rule| rule.admits(combo, axes))
}

/// Seconds a run needs to send all queries and collect the results.
pub fn run_wait(query_count: u32, combo: &Combination, timing: &Timing) -> u64 {
    let mut wait = (f64::from(query_count) / combo.avg_queries_per_sec).ceil() as u64 + timing.base_wait;
    if let Some(blocksize) = combo.blocksize {
        let blocksize = u64::from(blocksize);
        let response = match combo.record {
            RecordType::Aaaa => 70,
            RecordType::A => 58,
        };
        wait += (response / blocksize) * 100;
        wait += (42 / blocksize) * 100;
    }
    wait
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn make_run(combo: &Combination, wait: u64, names: &NameTemplates) -> Run {
    let mut env = Env::new().with("DNS_TRANSPORT", combo.transport.as_str());
    if let Some(cache) = combo.client_coap_cache {
        env.set("WITH_COAP_CACHE", flag(cache));
    }
    if let Some(cache) = combo.dns_cache {
        env.set("WITH_DNS_CACHE", flag(cache));
    }
    if let (true, Some(blocksize)) = (combo.transport.is_coap(), combo.blocksize) {
        env.set("COAP_BLOCKSIZE", blocksize.to_string());
    }
    let mut run = Run {
        env,
        args: RunArgs {
            avg_queries_per_sec: combo.avg_queries_per_sec,
            response_delay: combo.response_delay,
            proxied: combo.proxied,
            record: combo.record,
            method: combo.method,
            max_age_mode: combo.max_age_mode,
        },
        link_layer: combo.link_layer,
        wait,
        rebuild: false,
        name: None,
    };
    if run.args.method.is_some() {
        run.name = Some(names.select(&run).to_owned());
    }
    run
}

#[derive(Serialize)]
struct IdSeed<'a> {
    preset: &'a str,
    axes: &'a AxisRegistry,
    constraints: &'a [Constraint],
    partition: &'a Partition,
    experiment: usize,
}

/// Deterministic id of the `index`-th experiment of `plan`.
pub fn derive_exp_id(plan: &Plan, index: usize) -> Result<u64, DocError> {
    stable_id(&IdSeed {
        preset: &plan.name,
        axes: &plan.axes,
        constraints: &plan.constraints,
        partition: &plan.partition,
        experiment: index,
    })
}

/// Expands `plan` into experiments.
///
/// An axis without values yields no experiments.
pub fn expand(plan: &Plan, opts: &GenerateOpts) -> Result<Expansion, DocError> {
    let axes = &plan.axes;
    axes.validate()?;
    if axes.has_empty_axis() {
        debug!(plan = %plan.name, "empty axis, nothing to expand");
        return Ok(Expansion {
            experiments: Vec::new(),
            duration_secs: 0.0,
        });
    }

    let names = NameTemplates::for_axes(axes);
    let dims = dimensions(axes);
    let mut grid = Vec::new();
    expand_grid(&dims, 0, &mut Vec::with_capacity(dims.len()), &mut grid);

    let mut groups: Vec<Vec<Run>> = Vec::new();
    let mut group_of: BTreeMap<LinkLayer, usize> = BTreeMap::new();
    let mut single: Vec<bool> = Vec::new();
    let mut duration_secs = 0.0;
    for _ in 0..axes.repetitions {
        for indices in &grid {
            let Some(combo) = combination(axes, indices)? else {
                continue;
            };
            if !admitted(&plan.constraints, &combo, axes) {
                continue;
            }
            let wait = run_wait(axes.query_count, &combo, &plan.timing);
            let mut run = make_run(&combo, wait, &names);
            let own_experiment = matches!(
                &plan.partition,
                Partition::PerRunOn(layers) if layers.contains(&run.link_layer)
            );
            if own_experiment {
                run.rebuild = true;
                groups.push(vec![run]);
                single.push(true);
            } else {
                duration_secs += wait as f64 + plan.timing.run_duration_slack;
                let slot = *group_of.entry(run.link_layer).or_insert_with(|| {
                    groups.push(Vec::new());
                    single.push(false);
                    groups.len() - 1
                });
                groups[slot].push(run);
            }
        }
    }

    let mut experiments = Vec::with_capacity(groups.len());
    for (index, (mut runs, single)) in groups.into_iter().zip(single).enumerate() {
        if opts.rebuild_first || opts.exp_id.is_some() {
            if let Some(first) = runs.first_mut() {
                first.rebuild = true;
            }
        }
        let duration = if single {
            runs.first().map(|run| {
                ((run.wait + plan.timing.single_run_overhead) as f64 / 60.0).ceil() as u64
            })
        } else {
            None
        };
        let exp_id = match opts.exp_id {
            Some(exp_id) => exp_id,
            None => derive_exp_id(plan, index)?,
        };
        debug!(exp_id, runs = runs.len(), "experiment expanded");
        experiments.push(Experiment {
            exp_id,
            name: plan.name.clone(),
            duration,
            runs,
        });
    }
    Ok(Expansion {
        experiments,
        duration_secs,
    })
}
