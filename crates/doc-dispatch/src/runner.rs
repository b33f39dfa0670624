//! Shell commands issued into the requester pane per run.

use doc_descs::{CoapMethod, RecordType, Run};

use crate::dispatcher::Flavour;

/// Every `QUERY_MODULO`-th name is queried again by the caching runs.
pub const QUERY_MODULO: u32 = 8;

const LOAD_HOSTNAME: &str = "h.de";
const CACHING_HOSTNAME: &str = "id.exp.example.org";

/// Address family argument for `record`.
pub fn family(record: RecordType) -> &'static str {
    record.family()
}

/// Per-experiment state of the requester pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    /// Whether the resolver answered before the current run.
    pub resolver_running: bool,
    flavour: Flavour,
}

impl Runner {
    /// A runner for `flavour` that has not reached the resolver yet.
    pub fn new(flavour: Flavour) -> Self {
        Self {
            resolver_running: false,
            flavour,
        }
    }

    /// Flavour of the experiment.
    pub fn flavour(&self) -> Flavour {
        self.flavour
    }

    /// Commands starting the queries of `run`.
    ///
    /// Without a running resolver this is a single `ERROR:` line, so the
    /// run log shows why no queries went out.
    pub fn get_tmux_cmds(&self, run: &Run) -> Vec<String> {
        if !self.resolver_running {
            return vec!["ERROR: RESOLVER NOT RUNNING!".to_owned()];
        }
        let family = family(run.args.record);
        let cmd = match self.flavour {
            Flavour::Load => format!("query_bulk exec {LOAD_HOSTNAME} {family}"),
            Flavour::Proxy | Flavour::MaxAge => {
                let method = run.args.method.unwrap_or(CoapMethod::Fetch);
                format!("query_bulk exec {CACHING_HOSTNAME} {family} {method} {QUERY_MODULO}")
            }
        };
        vec![cmd]
    }
}
