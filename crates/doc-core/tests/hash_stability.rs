use doc_core::{stable_hash_string, stable_id};
use serde_json::json;

#[test]
fn stable_id_ignores_key_order() {
    let a = json!({"name": "doc-eval-load", "axes": {"b": [1, 2], "a": ["x"]}});
    let b = json!({"axes": {"a": ["x"], "b": [1, 2]}, "name": "doc-eval-load"});
    assert_eq!(stable_id(&a).expect("id"), stable_id(&b).expect("id"));
    assert_eq!(
        stable_hash_string(&a).expect("hash"),
        stable_hash_string(&b).expect("hash")
    );
}

#[test]
fn stable_id_separates_inputs() {
    let a = stable_id(&("doc-eval-load", 0u32)).expect("id");
    let b = stable_id(&("doc-eval-load", 1u32)).expect("id");
    let c = stable_id(&("doc-eval-proxy", 0u32)).expect("id");
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, stable_id(&("doc-eval-load", 0u32)).expect("id"));
}

#[test]
fn fingerprint_is_hex_sha256() {
    let hash = stable_hash_string(&json!([1, 2, 3])).expect("hash");
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}
