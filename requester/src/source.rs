use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::{Error, Request, RequestBody, Result, Side};

const RESTFOX_NO_BODY: &str = "No Body";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// a flat JSON array of requests
    #[default]
    Generic,
    /// a Restfox collection export
    Restfox,
}

#[derive(Deserialize, Debug)]
struct RestfoxExport {
    collection: Vec<Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RestfoxRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    body: Option<RestfoxBody>,
    #[serde(default)]
    headers: Vec<RestfoxHeader>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RestfoxBody {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RestfoxHeader {
    name: String,
    value: String,
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "generic" => Ok(InputFormat::Generic),
            "restfox" => Ok(InputFormat::Restfox),
            _ => Err(Error::InvalidInput(format!(
                "invalid input file type '{}', must be 'generic' or 'restfox'",
                s
            ))),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputFormat::Generic => write!(f, "generic"),
            InputFormat::Restfox => write!(f, "restfox"),
        }
    }
}

/// Load, truncate to `limit` (when non-zero) and validate the requests.
pub async fn load_requests(
    path: impl AsRef<Path>,
    format: InputFormat,
    limit: Option<usize>,
) -> Result<Vec<Request>> {
    let content = fs::read_to_string(path).await?;
    let mut requests = match format {
        InputFormat::Generic => parse_generic(&content)?,
        InputFormat::Restfox => parse_restfox(&content)?,
    };
    if let Some(limit) = limit.filter(|l| *l > 0) {
        requests.truncate(limit);
    }
    validate(&requests)?;
    debug!(count = requests.len(), %format, "loaded requests");
    Ok(requests)
}

pub fn parse_generic(content: &str) -> Result<Vec<Request>> {
    let data: Value = serde_json::from_str(content)?;
    if !data.is_array() {
        return Err(Error::InvalidInput(
            "generic JSON file must be an array of requests".into(),
        ));
    }
    Ok(serde_json::from_value(data)?)
}

/// Keep only `request` entries of the collection and map them to generic requests.
pub fn parse_restfox(content: &str) -> Result<Vec<Request>> {
    let export: RestfoxExport = serde_json::from_str(content).map_err(|e| {
        Error::InvalidInput(format!("not a Restfox export: {}", e))
    })?;

    export
        .collection
        .into_iter()
        .filter(|item| item.get("_type").and_then(Value::as_str) == Some("request"))
        .map(|item| {
            let req: RestfoxRequest = serde_json::from_value(item)?;
            req.try_into()
        })
        .collect()
}

/// Every request must resolve a URL on both sides before anything is sent.
pub fn validate(requests: &[Request]) -> Result<()> {
    for req in requests {
        for side in [Side::Reference, Side::Target] {
            if req.url_for(side).is_none() {
                return Err(Error::MissingUrl {
                    name: req.display_name().to_string(),
                    side,
                });
            }
        }
    }
    Ok(())
}

impl TryFrom<RestfoxRequest> for Request {
    type Error = Error;

    fn try_from(req: RestfoxRequest) -> Result<Self> {
        let method = match req.method.as_deref() {
            None | Some("") => Method::GET,
            Some(m) => Method::from_str(&m.to_uppercase())
                .map_err(|_| Error::InvalidInput(format!("invalid method: {}", m)))?,
        };

        let body = req.body.and_then(|b| match (b.mime_type.as_deref(), b.text) {
            (Some(RESTFOX_NO_BODY), _) => None,
            (_, Some(text)) if !text.is_empty() => Some(RequestBody::Text(text)),
            _ => None,
        });

        let headers: BTreeMap<String, String> = req
            .headers
            .into_iter()
            .map(|h| (h.name, h.value))
            .collect();

        Ok(Request {
            url: req.url,
            method,
            body,
            headers,
            name: req.name,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_generic_fixture_should_work() {
        let requests = load_requests("fixtures/requests.json", InputFormat::Generic, None)
            .await
            .unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].display_name(), "List users");
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(
            requests[2].url_for(Side::Target),
            Some("{{baseUrl}}/v2/health")
        );
    }

    #[tokio::test]
    async fn limit_should_truncate_requests() {
        let requests = load_requests("fixtures/requests.json", InputFormat::Generic, Some(2))
            .await
            .unwrap();
        assert_eq!(requests.len(), 2);

        let requests = load_requests("fixtures/requests.json", InputFormat::Generic, Some(0))
            .await
            .unwrap();
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn load_restfox_fixture_should_skip_groups() {
        let requests = load_requests("fixtures/restfox.json", InputFormat::Restfox, None)
            .await
            .unwrap();
        assert_eq!(requests.len(), 2);

        let get = &requests[0];
        assert_eq!(get.name.as_deref(), Some("Get user"));
        assert_eq!(get.method, Method::GET);
        assert!(get.body.is_none());
        assert_eq!(get.headers["Accept"], "application/json");

        let post = &requests[1];
        assert_eq!(post.method, Method::POST);
        assert_eq!(
            post.body,
            Some(RequestBody::Text(r#"{"name":"bob"}"#.into()))
        );
    }

    #[test]
    fn generic_file_must_be_an_array() {
        let err = parse_generic(r#"{"url": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(matches!(parse_generic("not json").unwrap_err(), Error::Json(_)));
    }

    #[test]
    fn request_without_url_should_fail_validation() {
        let requests = parse_generic(r#"[{"referenceUrl": "{{baseUrl}}/a"}]"#).unwrap();
        let err = validate(&requests).unwrap_err();
        assert!(matches!(err, Error::MissingUrl { side: Side::Target, .. }));
    }

    #[test]
    fn input_format_should_parse() {
        assert_eq!("restfox".parse::<InputFormat>().unwrap(), InputFormat::Restfox);
        assert!("yaml".parse::<InputFormat>().is_err());
    }
}
