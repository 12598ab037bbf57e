use std::collections::BTreeMap;

use http::Method;
use serde_json::Value;

use crate::{ComparisonReport, ComparisonResult, RequestBody, Side};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Headers as sent, including the implicit JSON content type.
fn sent_headers(
    headers: &BTreeMap<String, String>,
    body: Option<&RequestBody>,
) -> BTreeMap<String, String> {
    let mut headers = headers.clone();
    let is_json = matches!(body.and_then(RequestBody::payload), Some((_, true)));
    if is_json && !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
        headers.insert("Content-Type".into(), JSON_CONTENT_TYPE.into());
    }
    headers
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// A `curl` invocation that repeats the request.
pub fn curl_command(
    method: &Method,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: Option<&RequestBody>,
) -> String {
    let mut parts = vec!["curl".to_string()];
    if *method != Method::GET {
        parts.push(format!("-X {}", method));
    }
    parts.push(shell_quote(url));
    for (k, v) in sent_headers(headers, body) {
        parts.push(format!("-H {}", shell_quote(&format!("{}: {}", k, v))));
    }
    if let Some((payload, _)) = body.and_then(RequestBody::payload) {
        parts.push(format!("--data-raw {}", shell_quote(&payload)));
    }
    parts.join(" \\\n  ")
}

/// The request as raw HTTP text: request line, headers, blank line, body.
pub fn raw_http_request(
    method: &Method,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: Option<&RequestBody>,
) -> String {
    let mut out = format!("{} {} HTTP/1.1\n", method, url);
    for (k, v) in sent_headers(headers, body) {
        out.push_str(&format!("{}: {}\n", k, v));
    }
    if let Some((payload, _)) = body.and_then(RequestBody::payload) {
        out.push('\n');
        out.push_str(&payload);
        out.push('\n');
    }
    out
}

impl ComparisonResult {
    pub fn curl_command(&self, side: Side) -> String {
        let (url, headers) = self.sent(side);
        curl_command(&self.method, url, headers, self.request_body.as_ref())
    }

    pub fn raw_http_request(&self, side: Side) -> String {
        let (url, headers) = self.sent(side);
        raw_http_request(&self.method, url, headers, self.request_body.as_ref())
    }

    fn sent(&self, side: Side) -> (&str, &BTreeMap<String, String>) {
        match side {
            Side::Reference => (&self.reference_url, &self.reference_request_headers),
            Side::Target => (&self.target_url, &self.target_request_headers),
        }
    }
}

/// REST client `.http` file replaying every compared request. `@baseUrl`
/// points at the target; the reference variant is left commented out.
pub fn http_file(report: &ComparisonReport) -> String {
    let opts = &report.options;
    let mut out = String::new();

    if !opts.reference_base_url.is_empty() {
        out.push_str(&format!("@referenceBaseUrl = {}\n", opts.reference_base_url));
    }
    if !opts.target_base_url.is_empty() {
        out.push_str(&format!("@targetBaseUrl = {}\n", opts.target_base_url));
    }
    match (
        opts.reference_base_url.is_empty(),
        opts.target_base_url.is_empty(),
    ) {
        (false, false) => {
            out.push_str("# @baseUrl = {{referenceBaseUrl}}\n");
            out.push_str("@baseUrl = {{targetBaseUrl}}\n");
        }
        (_, false) => out.push_str("@baseUrl = {{targetBaseUrl}}\n"),
        (false, true) => out.push_str("@baseUrl = {{referenceBaseUrl}}\n"),
        (true, true) => {}
    }
    if !out.is_empty() {
        out.push_str("\n###\n\n");
    }

    for (i, r) in report.results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n###\n\n");
        }
        out.push_str(&format!("# {}\n", r.name));
        out.push_str(&format!("{} {}\n", r.method, r.url));
        for (k, v) in sent_headers(&r.reference_request_headers, r.request_body.as_ref()) {
            out.push_str(&format!("{}: {}\n", k, v));
        }
        if r.method != Method::GET && r.method != Method::HEAD {
            if let Some(body) = r.request_body.as_ref().and_then(http_file_body) {
                out.push('\n');
                out.push_str(&body);
                out.push('\n');
            }
        }
    }
    out
}

fn http_file_body(body: &RequestBody) -> Option<String> {
    match body {
        RequestBody::Text(s) if s.is_empty() => None,
        RequestBody::Text(s) => Some(s.clone()),
        RequestBody::Json(Value::Null) => None,
        RequestBody::Json(v) => {
            Some(serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
        }
    }
}
