use doc_core::errors::{DocError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("axis", "link_layer")
        .with_context("value", "foobar")
}

#[test]
fn axis_error_surface() {
    let err = DocError::Axis(sample_info("unknown-link-layer", "unknown link layer"));
    assert_eq!(err.info().code, "unknown-link-layer");
    assert!(err.info().context.contains_key("value"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("axis error: unknown link layer"));
    assert!(rendered.contains("value=foobar"));
}

#[test]
fn consistency_error_surface() {
    let err = DocError::Consistency(sample_info("coap-only-axis", "blocksize on udp"));
    assert_eq!(err.info().code, "coap-only-axis");
    assert!(err.info().context.contains_key("axis"));
}

#[test]
fn io_error_keeps_path_and_hint() {
    let err = DocError::io("descs-write", "/nonexistent/descs.yaml", "permission denied");
    assert_eq!(err.info().code, "descs-write");
    assert_eq!(
        err.info().context.get("path").map(String::as_str),
        Some("/nonexistent/descs.yaml")
    );
    assert_eq!(err.info().hint.as_deref(), Some("permission denied"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = DocError::Naming(sample_info("unknown-placeholder", "no such field").with_hint("check"));
    let json = serde_json::to_string(&err).expect("encode");
    let back: DocError = serde_json::from_str(&json).expect("decode");
    assert_eq!(err, back);
}
