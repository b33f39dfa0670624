use doc_descs::{
    derive_exp_id, expand_name, generate, run_template, Description, DnsTransport,
    ExperimentStub, GenerateOpts, LinkLayer, Overlay, Preset, Schedule,
};
use serde_yaml::Value;

const EXP_ID: u64 = 68486999;
const TIME: u64 = 596608887;

fn load(extra: &[Overlay], opts: GenerateOpts) -> Description {
    let plan = Preset::load().plan_with(extra).expect("plan");
    generate(&plan, &opts).expect("description")
}

fn parse(desc: &Description) -> Value {
    serde_yaml::from_str(&desc.to_yaml_string().expect("yaml")).expect("parse")
}

#[test]
fn default_load_is_one_unscheduled_experiment() {
    let plan = Preset::load().plan().expect("plan");
    let desc = generate(&plan, &GenerateOpts::default()).expect("description");
    let doc = parse(&desc);

    let unscheduled = doc["unscheduled"].as_sequence().expect("unscheduled");
    assert_eq!(unscheduled.len(), 1);
    let exp_id = unscheduled[0]["exp_id"].as_u64().expect("exp_id");
    assert_eq!(exp_id, derive_exp_id(&plan, 0).expect("id"));

    let runs = unscheduled[0]["runs"].as_sequence().expect("runs");
    assert!(!runs.is_empty());
    assert!(runs[0]["env"]["DNS_TRANSPORT"].as_str().is_some());
    assert!(runs[0].get("rebuild").is_none());
    for run in runs {
        assert!(run["args"].get("response_delay").is_some());
        assert!(run["env"].get("DNS_TRANSPORT").is_some());
    }
    assert!(doc.as_mapping().expect("map").keys().all(|key| key.is_string()));
}

#[test]
fn derived_ids_are_reproducible() {
    let first = load(&[], GenerateOpts::default());
    let second = load(&[], GenerateOpts::default());
    assert_eq!(first.experiments[0].exp_id, second.experiments[0].exp_id);
    assert_eq!(
        first.to_yaml_string().expect("yaml"),
        second.to_yaml_string().expect("yaml")
    );
    let proxy = generate(&Preset::proxy().plan().expect("plan"), &GenerateOpts::default())
        .expect("description");
    assert_ne!(first.experiments[0].exp_id, proxy.experiments[0].exp_id);
}

// Ids written into existing description files; a change here orphans them.
#[test]
fn derived_ids_are_pinned() {
    let load = Preset::load().plan().expect("plan");
    assert_eq!(derive_exp_id(&load, 0).expect("id"), 2749321511327734768);
    assert_eq!(derive_exp_id(&load, 1).expect("id"), 1216730348815015232);
    let proxy = Preset::proxy().plan().expect("plan");
    assert_eq!(derive_exp_id(&proxy, 0).expect("id"), 10509864864305377870);

    let desc = generate(&load, &GenerateOpts::default()).expect("description");
    assert_eq!(desc.experiments[0].exp_id, 2749321511327734768);
}

#[test]
fn rebuild_first_marks_first_run() {
    let desc = load(
        &[],
        GenerateOpts {
            rebuild_first: true,
            exp_id: None,
        },
    );
    let doc = parse(&desc);
    let runs = doc["unscheduled"][0]["runs"].as_sequence().expect("runs");
    assert_eq!(runs[0]["rebuild"].as_bool(), Some(true));
    assert!(runs[1].get("rebuild").is_none());
}

#[test]
fn scheduled_load_is_keyed_by_exp_id() {
    let desc = load(
        &[],
        GenerateOpts {
            rebuild_first: false,
            exp_id: Some(EXP_ID),
        },
    );
    assert_eq!(desc.schedule, Schedule::Scheduled(EXP_ID));
    let doc = parse(&desc);
    let map = doc.as_mapping().expect("map");
    assert!(map.get("unscheduled").is_none());
    let entry = map.get(&Value::from(EXP_ID)).expect("scheduled entry");
    let first = &entry["runs"][0];
    assert_eq!(first["rebuild"].as_bool(), Some(true));

    let run = &desc.experiments[0].runs[0];
    let stub = ExperimentStub {
        name: desc.globals.name.clone(),
        exp_id: EXP_ID,
    };
    let name = expand_name(run_template(&desc.globals, run), run, &stub, TIME).expect("name");
    assert!(name.contains("68486999"));
    assert!(name.contains("596608887"));
    assert!(name.starts_with("doc-eval-load-ieee802154-"));
}

#[test]
fn ble_runs_get_their_own_experiments() {
    let desc = load(&[Overlay::LinkLayer(LinkLayer::Ble)], GenerateOpts::default());
    assert!(desc.experiments.len() > 1);
    assert!(desc.runs().count() > 1);
    for exp in &desc.experiments {
        assert_eq!(exp.runs.len(), 1);
        let run = &exp.runs[0];
        assert!(run.rebuild);
        assert_eq!(run.link_layer, LinkLayer::Ble);
        assert!(!run.env.contains("COAP_BLOCKSIZE"));
        assert_eq!(exp.duration, Some((run.wait + 470).div_ceil(60)));
    }
    let ids: std::collections::BTreeSet<_> = desc.experiments.iter().map(|e| e.exp_id).collect();
    assert_eq!(ids.len(), desc.experiments.len());
    assert!(desc.globals.profiles.is_empty());
    assert_eq!(desc.globals.duration, 20);
}

#[test]
fn load_pruning_rules_hold() {
    let desc = load(&[], GenerateOpts::default());
    for run in desc.runs() {
        let transport: DnsTransport = run
            .env
            .get_str("DNS_TRANSPORT")
            .expect("transport")
            .parse()
            .expect("known transport");
        let blocksize = run
            .env
            .get_str("COAP_BLOCKSIZE")
            .map(|bs| bs.parse::<u16>().expect("number"));
        if !transport.is_coap() {
            assert!(run.args.method.is_none());
            assert!(blocksize.is_none());
            assert!(run.name.is_none());
        } else {
            assert!(run.name.is_some());
        }
        if let Some(blocksize) = blocksize {
            assert_eq!(run.args.method.map(|m| m.as_str()), Some("get"));
            assert!(!run.args.response_delay.is_active());
            if blocksize == 16 {
                assert!(run.args.avg_queries_per_sec <= 5.0);
            }
            if run.args.record.to_string() == "A" {
                assert!(blocksize <= 58);
            }
        }
        if transport == DnsTransport::Oscore {
            assert_eq!(run.args.method.map(|m| m.as_str()), Some("fetch"));
        }
        if run.args.response_delay.is_active() {
            assert!(run.args.avg_queries_per_sec < 10.0);
        }
    }
}

#[test]
fn globals_carry_first_run_env_and_duration() {
    let desc = load(&[], GenerateOpts::default());
    let first = &desc.experiments[0].runs[0];
    for key in first.env.keys() {
        assert_eq!(desc.globals.env.get(key), first.env.get(key));
    }
    let secs: f64 = desc.runs().map(|run| run.wait as f64 + 300.0).sum();
    assert_eq!(desc.globals.duration, (secs / 60.0) as u64 + 20);
    assert_eq!(
        desc.globals.env.get("QUERY_COUNT").and_then(Value::as_u64),
        Some(60)
    );
    assert_eq!(desc.globals.tmux.target, "doc-eval-load:run.0");
}

#[test]
fn emission_order_follows_axes() {
    let desc = load(&[], GenerateOpts::default());
    let transports: Vec<_> = desc
        .runs()
        .map(|run| run.env.get_str("DNS_TRANSPORT").expect("transport").to_owned())
        .collect();
    let per_repetition = transports.len() / 10;
    assert_eq!(transports.len() % 10, 0);
    assert_eq!(&transports[..per_repetition], &transports[per_repetition..2 * per_repetition]);
    let first_coap = transports.iter().position(|t| t == "coap").expect("coap run");
    assert!(transports[..first_coap]
        .iter()
        .all(|t| t == "udp" || t == "dtls"));
}

#[test]
fn docker_skips_oscore() {
    let desc = load(&[Overlay::Docker], GenerateOpts::default());
    assert!(desc
        .runs()
        .all(|run| run.env.get_str("DNS_TRANSPORT") != Some("oscore")));
    assert_eq!(
        desc.globals.env.get("BUILD_IN_DOCKER").and_then(Value::as_i64),
        Some(1)
    );
}

#[test]
fn description_round_trips_through_yaml() {
    for opts in [
        GenerateOpts::default(),
        GenerateOpts {
            rebuild_first: false,
            exp_id: Some(EXP_ID),
        },
    ] {
        let desc = load(&[], opts);
        let text = desc.to_yaml_string().expect("yaml");
        let parsed = Description::from_yaml_str(&text).expect("parse");
        assert_eq!(parsed, desc);
    }
}
