use serde::{Deserialize, Serialize};

use crate::{diff::diff_blocks, Body, DiffBlock, ResponseRecord};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Difference {
    StatusCode {
        message: String,
        expected: u16,
        actual: u16,
    },
    Body {
        message: String,
        expected: Body,
        actual: Body,
        #[serde(rename = "diffBlocks", default)]
        diff_blocks: Vec<DiffBlock>,
    },
}

impl Difference {
    pub fn message(&self) -> &str {
        match self {
            Difference::StatusCode { message, .. } | Difference::Body { message, .. } => message,
        }
    }
}

/// Compare two responses. Status codes first, then bodies: structured pairs
/// by deep equality (`normalized`) or by exact serialized text, textual pairs
/// by string equality, and mixed pairs are always different.
pub fn compare_responses(
    reference: &ResponseRecord,
    target: &ResponseRecord,
    normalized: bool,
) -> Vec<Difference> {
    let mut differences = Vec::new();

    if reference.status_code != target.status_code {
        differences.push(Difference::StatusCode {
            message: format!(
                "Status code mismatch: expected {}, got {}",
                reference.status_code, target.status_code
            ),
            expected: reference.status_code,
            actual: target.status_code,
        });
    }

    if let Some((message, normalized)) = body_mismatch(&reference.body, &target.body, normalized) {
        differences.push(Difference::Body {
            message,
            expected: reference.body.clone(),
            actual: target.body.clone(),
            diff_blocks: diff_blocks(&reference.body, &target.body, normalized),
        });
    }

    differences
}

/// The mismatch message and whether the diff should render with sorted keys.
fn body_mismatch(expected: &Body, actual: &Body, normalized: bool) -> Option<(String, bool)> {
    match (expected, actual) {
        (Body::Structured(a), Body::Structured(b)) if normalized => (a != b).then(|| {
            ("Response body differs (normalized comparison)".to_string(), true)
        }),
        (Body::Structured(a), Body::Structured(b)) => (a.to_string() != b.to_string())
            .then(|| ("Response body differs (strict comparison)".to_string(), false)),
        (a, b) if !a.is_structured() && !b.is_structured() => (a != b)
            .then(|| ("Response body differs (string comparison)".to_string(), false)),
        (a, b) => Some((
            format!(
                "Response body type mismatch: reference is {}, target is {}",
                kind_name(a),
                kind_name(b)
            ),
            false,
        )),
    }
}

fn kind_name(body: &Body) -> &'static str {
    if body.is_structured() {
        "JSON"
    } else {
        "string"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineKind;
    use serde_json::{json, Value};

    fn response(status: u16, body: Body) -> ResponseRecord {
        ResponseRecord {
            status_code: status,
            status_text: crate::status_text(status),
            body,
            duration: 1.0,
            error: None,
        }
    }

    fn json_body(s: &str) -> Body {
        Body::Structured(serde_json::from_str::<Value>(s).unwrap())
    }

    #[test]
    fn reordered_keys_should_differ_only_in_strict_mode() {
        let reference = response(200, json_body(r#"{"a":1,"b":2}"#));
        let target = response(200, json_body(r#"{"b":2,"a":1}"#));

        let strict = compare_responses(&reference, &target, false);
        assert_eq!(strict.len(), 1);
        assert!(matches!(strict[0], Difference::Body { .. }));
        assert!(strict[0].message().contains("strict"));

        assert!(compare_responses(&reference, &target, true).is_empty());
    }

    #[test]
    fn nested_reordered_keys_should_be_equal_when_normalized() {
        let reference = response(200, json_body(r#"{"x":{"p":[{"k":1,"j":2}],"q":true},"y":null}"#));
        let target = response(200, json_body(r#"{"y":null,"x":{"q":true,"p":[{"j":2,"k":1}]}}"#));
        assert!(compare_responses(&reference, &target, true).is_empty());
        assert_eq!(compare_responses(&reference, &target, false).len(), 1);
    }

    #[test]
    fn normalized_mode_should_keep_array_order_significant() {
        let reference = response(200, Body::Structured(json!([1, 2, 3])));
        let target = response(200, Body::Structured(json!([3, 2, 1])));
        let diffs = compare_responses(&reference, &target, true);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].message().contains("normalized"));
    }

    #[test]
    fn status_mismatch_should_carry_both_codes() {
        let reference = response(200, Body::Textual("same".into()));
        let target = response(404, Body::Textual("same".into()));
        let diffs = compare_responses(&reference, &target, false);
        assert_eq!(
            diffs,
            vec![Difference::StatusCode {
                message: "Status code mismatch: expected 200, got 404".into(),
                expected: 200,
                actual: 404,
            }]
        );
    }

    #[test]
    fn status_mismatch_should_not_skip_body_comparison() {
        let reference = response(200, Body::Textual("a".into()));
        let target = response(404, Body::Textual("b".into()));
        let diffs = compare_responses(&reference, &target, false);
        assert_eq!(diffs.len(), 2);
        assert!(matches!(diffs[0], Difference::StatusCode { .. }));
        assert!(matches!(diffs[1], Difference::Body { .. }));
    }

    #[test]
    fn mixed_bodies_should_always_differ() {
        let reference = response(200, json_body(r#"{"a":"x"}"#));
        let target = response(200, Body::Textual(r#"{"a":"x"}"#.into()));
        let diffs = compare_responses(&reference, &target, true);
        assert_eq!(diffs.len(), 1);
        assert_eq!(
            diffs[0].message(),
            "Response body type mismatch: reference is JSON, target is string"
        );
    }

    #[test]
    fn text_bodies_should_produce_aligned_blocks() {
        let reference = response(200, Body::Textual("line1\nline2\nline3".into()));
        let target = response(200, Body::Textual("line1\nCHANGED\nline3".into()));
        let diffs = compare_responses(&reference, &target, false);
        assert_eq!(diffs.len(), 1);
        match &diffs[0] {
            Difference::Body {
                message,
                diff_blocks,
                ..
            } => {
                assert_eq!(message, "Response body differs (string comparison)");
                assert_eq!(diff_blocks.len(), 1);
                let texts: Vec<(LineKind, &str)> = diff_blocks[0]
                    .lines
                    .iter()
                    .map(|l| {
                        let d = l.left.as_ref().or(l.right.as_ref()).unwrap();
                        (d.kind, d.text.as_str())
                    })
                    .collect();
                assert_eq!(
                    texts,
                    vec![
                        (LineKind::Unchanged, "line1"),
                        (LineKind::Removed, "line2"),
                        (LineKind::Added, "CHANGED"),
                        (LineKind::Unchanged, "line3"),
                    ]
                );
            }
            other => panic!("unexpected difference: {:?}", other),
        }
    }

    #[test]
    fn transport_failure_should_report_status_and_body() {
        let reference = response(200, json_body(r#"{"ok":true}"#));
        let target = ResponseRecord::failed(3.0, "connection refused");
        let diffs = compare_responses(&reference, &target, false);
        assert_eq!(diffs.len(), 2);
        assert!(matches!(
            diffs[0],
            Difference::StatusCode {
                expected: 200,
                actual: 0,
                ..
            }
        ));
        assert_eq!(
            diffs[1].message(),
            "Response body type mismatch: reference is JSON, target is string"
        );
    }

    #[test]
    fn failures_on_both_sides_should_be_equal() {
        let reference = ResponseRecord::failed(3.0, "timeout");
        let target = ResponseRecord::failed(5.0, "refused");
        assert!(compare_responses(&reference, &target, false).is_empty());
    }

    #[test]
    fn difference_should_serialize_with_type_tag() {
        let diff = Difference::StatusCode {
            message: "m".into(),
            expected: 200,
            actual: 500,
        };
        assert_eq!(
            serde_json::to_value(&diff).unwrap(),
            json!({"type": "status_code", "message": "m", "expected": 200, "actual": 500})
        );
    }
}
