use doc_descs::{
    generate, AxisOverrides, CoapMethod, Description, DnsTransport, GenerateOpts, LinkLayer,
    Overlay, Preset, RecordType, DESCS_FILE_NAME,
};
use proptest::prelude::*;
use proptest::sample::subsequence;

fn check_load_rules(desc: &Description, query_count: u32) {
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
            .map(|bs| bs.parse::<u64>().expect("number"));
        assert_eq!(run.args.method.is_some(), transport.is_coap());
        if !transport.is_coap() || transport == DnsTransport::Oscore {
            assert!(blocksize.is_none());
        }
        if transport == DnsTransport::Oscore {
            assert_eq!(run.args.method, Some(CoapMethod::Fetch));
        }
        let mut wait = (f64::from(query_count) / run.args.avg_queries_per_sec).ceil() as u64 + 100;
        if let Some(blocksize) = blocksize {
            assert_eq!(run.args.method, Some(CoapMethod::Get));
            assert!(!run.args.response_delay.is_active());
            let response = if run.args.record == RecordType::A { 58 } else { 70 };
            assert!(blocksize <= response);
            wait += (response / blocksize) * 100 + (42 / blocksize) * 100;
        }
        assert_eq!(run.wait, wait);
    }
}

#[test]
fn generation_leaves_the_plan_untouched() {
    for preset in [Preset::load(), Preset::proxy(), Preset::max_age().scaled(6)] {
        let plan = preset.plan().expect("plan");
        let before = plan.clone();
        let desc = generate(&plan, &GenerateOpts::default()).expect("description");
        assert_eq!(plan, before);
        assert!(desc.runs().count() > 0);
    }
    let fresh = Preset::load().plan().expect("plan");
    assert_eq!(fresh.axes.repetitions, 10);
    assert_eq!(fresh.axes.query_count, 60);
}

#[test]
fn blocksize_for_plain_transport_is_inconsistent() {
    let overrides = AxisOverrides {
        coap_blocksizes: Some(vec![Some(16)]),
        ..AxisOverrides::default()
    };
    let plan = Preset::load()
        .plan_with(&[Overlay::Axes(overrides)])
        .expect("plan");
    let err = generate(&plan, &GenerateOpts::default()).unwrap_err();
    assert_eq!(err.info().code, "coap-only-axis");
    assert!(err.info().context.contains_key("combination"));
}

#[test]
fn empty_axis_yields_no_experiments() {
    let overrides = AxisOverrides::from_yaml("record_types: []\n").expect("overrides");
    let plan = Preset::load()
        .plan_with(&[Overlay::Axes(overrides)])
        .expect("plan");
    let desc = generate(&plan, &GenerateOpts::default()).expect("description");
    assert!(desc.experiments.is_empty());
    assert_eq!(desc.globals.duration, 20);
    let doc: serde_yaml::Value =
        serde_yaml::from_str(&desc.to_yaml_string().expect("yaml")).expect("parse");
    assert!(doc["unscheduled"].as_sequence().expect("unscheduled").is_empty());
}

#[test]
fn invalid_overrides_are_rejected() {
    assert!(AxisOverrides::from_yaml("link_layers: [lora]\n").is_err());
    assert!(AxisOverrides::from_yaml("transports: [udp]\n").is_err());
    let err = "wifi".parse::<LinkLayer>().unwrap_err();
    assert_eq!(err.info().code, "unknown-link-layer");

    let overrides = AxisOverrides {
        coap_blocksizes: Some(vec![None, Some(48)]),
        ..AxisOverrides::default()
    };
    let plan = Preset::load()
        .plan_with(&[Overlay::Axes(overrides)])
        .expect("plan");
    let err = generate(&plan, &GenerateOpts::default()).unwrap_err();
    assert_eq!(err.info().code, "invalid-blocksize");
}

#[test]
fn writes_descs_yaml_into_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let overrides = AxisOverrides::from_yaml("repetitions: 1\n").expect("overrides");
    let plan = Preset::load()
        .plan_with(&[Overlay::Axes(overrides)])
        .expect("plan");
    let desc = generate(&plan, &GenerateOpts::default()).expect("description");
    let path = desc.write_to_dir(dir.path()).expect("write");
    assert_eq!(path, dir.path().join(DESCS_FILE_NAME));
    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.starts_with("globals:"));
    let parsed = Description::from_yaml_str(&text).expect("parse");
    assert_eq!(parsed.fingerprint().expect("hash"), desc.fingerprint().expect("hash"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_overrides_keep_load_rules(
        transports in subsequence(DnsTransport::ALL.to_vec(), 1..=5),
        methods in subsequence(vec![CoapMethod::Fetch, CoapMethod::Get, CoapMethod::Post], 1..=3),
        blocksizes in subsequence(vec![16u16, 32, 64], 0..=3),
        records in subsequence(vec![RecordType::A, RecordType::Aaaa], 1..=2),
        query_count in 1u32..120,
        repetitions in 1u32..3,
    ) {
        let overrides = AxisOverrides {
            dns_transports: Some(transports.clone()),
            coap_methods: Some(methods),
            coap_blocksizes: Some(
                std::iter::once(None).chain(blocksizes.into_iter().map(Some)).collect(),
            ),
            record_types: Some(records),
            query_count: Some(query_count),
            repetitions: Some(repetitions),
            ..AxisOverrides::default()
        };
        let plan = Preset::load().plan_with(&[Overlay::Axes(overrides)]).unwrap();
        let desc = generate(&plan, &GenerateOpts::default()).unwrap();
        check_load_rules(&desc, query_count);

        let total = desc.runs().count();
        prop_assert_eq!(total % repetitions as usize, 0);
        for run in desc.runs() {
            let transport: DnsTransport = run.env.get_str("DNS_TRANSPORT").unwrap().parse().unwrap();
            prop_assert!(transports.contains(&transport));
        }

        let again = generate(&plan, &GenerateOpts::default()).unwrap();
        prop_assert_eq!(again, desc);
    }
}
