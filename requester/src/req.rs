use std::{
    collections::BTreeMap,
    error::Error as StdError,
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

use http::{
    header::{HeaderName, CONTENT_TYPE},
    HeaderMap, HeaderValue, Method, StatusCode,
};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    placeholder::{replace_base_url, replace_header_placeholders},
    Error, Result,
};

const USER_AGENT: &str = concat!("apicmp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Reference,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Reference => write!(f, "reference"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// One logical request, sent once to each environment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reference_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_url: Option<String>,
    #[serde(
        with = "http_serde::method",
        skip_serializing_if = "is_default",
        default
    )]
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body: Option<RequestBody>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RequestBody {
    Text(String),
    Json(Value),
}

/// A response body: parsed JSON container, raw text, or nothing at all
/// (transport failure). Serialized as the bare JSON value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(from = "Value", into = "Value")]
pub enum Body {
    Structured(Value),
    Textual(String),
    #[default]
    Empty,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub status_code: u16,
    pub status_text: String,
    #[serde(default)]
    pub body: Body,
    /// milliseconds
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: Client,
}

fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    t == &T::default()
}

impl Request {
    /// URL template for a side: the per-side override if set, else the generic url.
    pub fn url_for(&self, side: Side) -> Option<&str> {
        let over = match side {
            Side::Reference => self.reference_url.as_deref(),
            Side::Target => self.target_url.as_deref(),
        };
        over.filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }

    pub fn resolve_url(&self, side: Side, base_url: &str) -> Result<String> {
        let url = self.url_for(side).ok_or_else(|| Error::MissingUrl {
            name: self.display_name().to_string(),
            side,
        })?;
        replace_base_url(url, base_url)
    }

    pub fn display_url(&self) -> &str {
        [&self.url, &self.reference_url, &self.target_url]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|u| !u.is_empty())
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.display_url(),
        }
    }

    /// Static headers with placeholders substituted, then `additional`
    /// overriding same-named (case-insensitive) entries.
    pub fn merged_headers(
        &self,
        replacements: &BTreeMap<String, String>,
        additional: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let mut headers = replace_header_placeholders(&self.headers, replacements)?;
        for (k, v) in additional {
            headers.retain(|name, _| !name.eq_ignore_ascii_case(k));
            headers.insert(k.clone(), v.clone());
        }
        Ok(headers)
    }

    pub fn build_headers(
        &self,
        replacements: &BTreeMap<String, String>,
        additional: &BTreeMap<String, String>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (k, v) in self.merged_headers(replacements, additional)? {
            let name = HeaderName::from_str(&k)
                .map_err(|_| Error::InvalidHeader(format!("invalid header name: {}", k)))?;
            let value = HeaderValue::from_str(&v)
                .map_err(|_| Error::InvalidHeader(format!("invalid value for header {}", k)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

impl RequestBody {
    /// Text sent on the wire and whether it is JSON; `None` for an empty body.
    pub(crate) fn payload(&self) -> Option<(String, bool)> {
        match self {
            RequestBody::Text(s) if s.is_empty() => None,
            RequestBody::Text(s) => Some((s.clone(), false)),
            RequestBody::Json(Value::Null) => None,
            RequestBody::Json(v) => Some((v.to_string(), true)),
        }
    }
}

impl Body {
    /// Build a body from response text. JSON objects and arrays become
    /// structured, a JSON string is unwrapped, everything else keeps the
    /// raw text.
    pub fn from_text(text: String, is_json: bool) -> Self {
        if is_json {
            match serde_json::from_str::<Value>(&text) {
                Ok(v @ (Value::Object(_) | Value::Array(_))) => return Body::Structured(v),
                Ok(Value::String(s)) => return Body::Textual(s),
                _ => {}
            }
        }
        Body::Textual(text)
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Body::Structured(_))
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Body::Empty,
            Value::String(s) => Body::Textual(s),
            v @ (Value::Object(_) | Value::Array(_)) => Body::Structured(v),
            v => Body::Textual(v.to_string()),
        }
    }
}

impl From<Body> for Value {
    fn from(b: Body) -> Self {
        match b {
            Body::Structured(v) => v,
            Body::Textual(s) => Value::String(s),
            Body::Empty => Value::Null,
        }
    }
}

impl ResponseRecord {
    pub fn failed(duration: f64, error: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            status_text: status_text(0),
            body: Body::Empty,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Status text from the fixed table, falling back to the canonical reason.
pub fn status_text(code: u16) -> String {
    let text = match code {
        0 => "Error",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => StatusCode::from_u16(code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or(""),
    };
    text.to_string()
}

impl HttpRequester {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Send `request` to one side. Only a missing URL is an error; any
    /// transport failure is returned as a status-0 record.
    pub async fn send(
        &self,
        request: &Request,
        side: Side,
        base_url: &str,
        header_replacements: &BTreeMap<String, String>,
        additional_headers: &BTreeMap<String, String>,
    ) -> Result<ResponseRecord> {
        let url = request.resolve_url(side, base_url)?;
        debug!(%side, %url, method = %request.method, "sending request");

        let start = Instant::now();
        let headers = match request.build_headers(header_replacements, additional_headers) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(%side, %url, "{}", e);
                return Ok(ResponseRecord::failed(elapsed_ms(start), e.to_string()));
            }
        };

        match self.execute(request, &url, headers).await {
            Ok((status, body)) => {
                let duration = elapsed_ms(start);
                debug!(%side, %url, status, duration, "received response");
                Ok(ResponseRecord {
                    status_code: status,
                    status_text: status_text(status),
                    body,
                    duration,
                    error: None,
                })
            }
            Err(e) => {
                let msg = error_chain(&e);
                warn!(%side, %url, "request failed: {}", msg);
                Ok(ResponseRecord::failed(elapsed_ms(start), msg))
            }
        }
    }

    async fn execute(
        &self,
        request: &Request,
        url: &str,
        mut headers: HeaderMap,
    ) -> std::result::Result<(u16, Body), reqwest::Error> {
        let payload = request.body.as_ref().and_then(RequestBody::payload);
        if let Some((_, true)) = payload {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some((body, _)) = payload {
            builder = builder.body(body);
        }

        let res = builder.send().await?;
        read_response(res).await
    }
}

async fn read_response(res: Response) -> std::result::Result<(u16, Body), reqwest::Error> {
    let status = res.status().as_u16();
    let is_json = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .map(|m| m.essence_str() == mime::APPLICATION_JSON.essence_str())
        .unwrap_or(false);
    let text = res.text().await?;
    Ok((status, Body::from_text(text, is_json)))
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn error_chain(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(err) = source {
        msg.push_str(": ");
        msg.push_str(&err.to_string());
        source = err.source();
    }
    msg
}
