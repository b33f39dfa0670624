//! Run name templates and their expansion.
//!
//! Templates use replacement fields in the style of the runner's format
//! strings: `{exp.name}`, `{run.env[DNS_TRANSPORT]}`,
//! `{run[args][proxied]:d}`, `{time}`. Attribute and item access are
//! interchangeable and `{{`/`}}` escape literal braces.

use doc_core::{DocError, ErrorInfo};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::registry::AxisRegistry;
use crate::run::Run;
use crate::testbed::Globals;

/// The run name templates stored in `globals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameTemplates {
    /// Template for every run.
    pub run_name: String,
    /// Template adding the CoAP method, present when CoAP transports are used.
    pub coap_run_name: Option<String>,
    /// Template adding the block size, present when blockwise runs exist.
    pub coap_blockwise_run_name: Option<String>,
}

impl NameTemplates {
    /// Derives the templates from the axes that contribute to runs.
    pub fn for_axes(axes: &AxisRegistry) -> Self {
        let coap = axes.has_coap();
        Self {
            run_name: template(axes, false, false),
            coap_run_name: coap.then(|| template(axes, true, false)),
            coap_blockwise_run_name: axes.has_blockwise().then(|| template(axes, true, true)),
        }
    }

    /// The template naming `run`.
    pub fn select(&self, run: &Run) -> &str {
        let coap = run.args.method.is_some();
        let blockwise = run.env.contains("COAP_BLOCKSIZE");
        match (coap, blockwise) {
            (true, true) => self
                .coap_blockwise_run_name
                .as_deref()
                .or(self.coap_run_name.as_deref())
                .unwrap_or(&self.run_name),
            (true, false) => self.coap_run_name.as_deref().unwrap_or(&self.run_name),
            _ => &self.run_name,
        }
    }
}

fn template(axes: &AxisRegistry, coap: bool, blockwise: bool) -> String {
    let mut out = String::from("{exp.name}-{run[link_layer]}-");
    if axes.max_age_active() {
        out.push_str("{run[args][max_age_mode]}-");
    }
    out.push_str("{run.env[DNS_TRANSPORT]}-");
    if coap {
        out.push_str("{run[args][method]}-");
    }
    if axes.dns_cache_active() {
        out.push_str("dc{run.env[WITH_DNS_CACHE]}-");
    }
    if axes.client_coap_cache_active() {
        out.push_str("ccc{run.env[WITH_COAP_CACHE]}-");
    }
    if axes.proxied_active() {
        out.push_str("proxied{run[args][proxied]:d}-");
    }
    if blockwise {
        out.push_str("b{run.env[COAP_BLOCKSIZE]}-");
    }
    out.push_str("{run[args][response_delay][time]}-{run[args][response_delay][queries]}-");
    out.push_str(&format!("{}x", axes.query_count));
    out.push_str("{run[args][avg_queries_per_sec]}-{run[args][record]}-{exp.exp_id}-{time}");
    out
}

/// The experiment fields a template may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentStub {
    /// Experiment name.
    pub name: String,
    /// Experiment id.
    pub exp_id: u64,
}

/// Template a runner uses for `run`: the run's own, else `globals.run_name`.
pub fn run_template<'a>(globals: &'a Globals, run: &'a Run) -> &'a str {
    run.name.as_deref().unwrap_or(&globals.run_name)
}

/// Expands `template` for `run` within `exp` at timestamp `time`.
pub fn expand(template: &str, run: &Run, exp: &ExperimentStub, time: u64) -> Result<String, DocError> {
    let mut context = Mapping::new();
    context.insert(Value::from("exp"), to_value(exp)?);
    context.insert(Value::from("run"), to_value(run)?);
    context.insert(Value::from("time"), Value::from(time));
    let context = Value::Mapping(context);

    let mut out = String::with_capacity(template.len() + 32);
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(naming_error("unterminated-field", template, &field)),
                    }
                }
                let (path, spec) = match field.split_once(':') {
                    Some((path, spec)) => (path, spec),
                    None => (field.as_str(), ""),
                };
                let value = resolve(&context, path)
                    .ok_or_else(|| naming_error("unknown-field", template, path))?;
                out.push_str(&format_value(value, spec).ok_or_else(|| {
                    naming_error("unsupported-format", template, &field)
                })?);
            }
            '}' => return Err(naming_error("unmatched-brace", template, "}")),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, DocError> {
    serde_yaml::to_value(value).map_err(|err| {
        DocError::Serde(ErrorInfo::new("yaml-serialize", err.to_string()))
    })
}

fn naming_error(code: &str, template: &str, field: &str) -> DocError {
    DocError::Naming(
        ErrorInfo::new(code, "cannot expand run name template")
            .with_context("template", template)
            .with_context("field", field),
    )
}

/// Walks `root.attr[key]...` through nested mappings and sequences.
fn resolve<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut keys = Vec::new();
    let mut rest = path;
    let head_end = rest.find(&['.', '['][..]).unwrap_or(rest.len());
    keys.push(&rest[..head_end]);
    rest = &rest[head_end..];
    while !rest.is_empty() {
        if let Some(attr) = rest.strip_prefix('.') {
            let end = attr.find(&['.', '['][..]).unwrap_or(attr.len());
            keys.push(&attr[..end]);
            rest = &attr[end..];
        } else if let Some(item) = rest.strip_prefix('[') {
            let end = item.find(']')?;
            keys.push(&item[..end]);
            rest = &item[end + 1..];
        } else {
            return None;
        }
    }
    keys.into_iter().try_fold(context, |value, key| {
        if key.is_empty() {
            return None;
        }
        match value {
            Value::Mapping(map) => map.get(key),
            Value::Sequence(seq) => key.parse::<usize>().ok().and_then(|idx| seq.get(idx)),
            _ => None,
        }
    })
}

fn format_value(value: &Value, spec: &str) -> Option<String> {
    match spec {
        "" => display(value),
        "d" => match value {
            Value::Bool(flag) => Some(u8::from(*flag).to_string()),
            Value::Number(number) if number.is_i64() || number.is_u64() => {
                Some(number.to_string())
            }
            _ => None,
        },
        _ => None,
    }
}

fn display(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("None".to_owned()),
        Value::Bool(true) => Some("True".to_owned()),
        Value::Bool(false) => Some("False".to_owned()),
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => {
            if let Some(int) = number.as_u64() {
                Some(int.to_string())
            } else if let Some(int) = number.as_i64() {
                Some(int.to_string())
            } else {
                number.as_f64().map(float_repr)
            }
        }
        _ => None,
    }
}

/// Floats keep a fractional digit (`5.0`), like the runner prints them.
fn float_repr(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{LinkLayer, RecordType, ResponseDelay};
    use crate::env::Env;
    use crate::run::RunArgs;

    fn run() -> Run {
        Run {
            env: Env::new().with("DNS_TRANSPORT", "udp"),
            args: RunArgs {
                avg_queries_per_sec: 5.0,
                response_delay: ResponseDelay::NONE,
                proxied: Some(true),
                record: RecordType::Aaaa,
                method: None,
                max_age_mode: None,
            },
            link_layer: LinkLayer::Ieee802154,
            wait: 112,
            rebuild: false,
            name: None,
        }
    }

    fn stub() -> ExperimentStub {
        ExperimentStub {
            name: "mock_experiment".to_owned(),
            exp_id: 68486999,
        }
    }

    #[test]
    fn expands_fields_and_specs() {
        let name = expand(
            "{exp.name}-{run[link_layer]}-{run.env[DNS_TRANSPORT]}-proxied{run[args][proxied]:d}-\
             {run[args][response_delay][time]}-{run[args][avg_queries_per_sec]}-\
             {run[args][record]}-{exp.exp_id}-{time}",
            &run(),
            &stub(),
            596608887,
        )
        .unwrap();
        assert_eq!(
            name,
            "mock_experiment-ieee802154-udp-proxied1-None-5.0-AAAA-68486999-596608887"
        );
    }

    #[test]
    fn escapes_braces() {
        assert_eq!(
            expand("{{x}}-{time}", &run(), &stub(), 7).unwrap(),
            "{x}-7"
        );
    }

    #[test]
    fn unknown_fields_fail() {
        let err = expand("{run[args][method]}", &run(), &stub(), 0).unwrap_err();
        assert_eq!(err.info().code, "unknown-field");
        let err = expand("{time:x}", &run(), &stub(), 0).unwrap_err();
        assert_eq!(err.info().code, "unsupported-format");
        let err = expand("{time", &run(), &stub(), 0).unwrap_err();
        assert_eq!(err.info().code, "unterminated-field");
    }

    #[test]
    fn float_rendering() {
        assert_eq!(float_repr(5.0), "5.0");
        assert_eq!(float_repr(0.25), "0.25");
        assert_eq!(float_repr(10.0), "10.0");
    }
}
