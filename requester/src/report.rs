use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::{Difference, InputFormat, Request, RequestBody, ResponseRecord, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resolved options of a `compare` run, stored verbatim in the report.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompareOptions {
    pub input_file: PathBuf,
    #[serde(default)]
    pub input_file_type: InputFormat,
    pub reference_base_url: String,
    pub target_base_url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub reference_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub target_headers: BTreeMap<String, String>,
    /// values for `{{name}}` placeholders in request header values
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub header_replacements: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub no_timestamp_in_report_filenames: bool,
    #[serde(default)]
    pub normalized_json_comparison: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub name: String,
    #[serde(with = "http_serde::method")]
    pub method: Method,
    pub url: String,
    /// URL actually requested on each side
    pub reference_url: String,
    pub target_url: String,
    pub reference_base_url: String,
    pub target_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_body: Option<RequestBody>,
    /// headers sent to each side, placeholders substituted
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub reference_request_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub target_request_headers: BTreeMap<String, String>,
    pub reference: ResponseRecord,
    pub target: ResponseRecord,
    pub differences: Vec<Difference>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub timestamp: DateTime<Utc>,
    pub command_line: String,
    pub options: CompareOptions,
    #[serde(default)]
    pub input_requests: Vec<Request>,
    pub summary: Summary,
    pub results: Vec<ComparisonResult>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl CompareOptions {
    pub fn new(
        input_file: impl Into<PathBuf>,
        reference_base_url: impl Into<String>,
        target_base_url: impl Into<String>,
    ) -> Self {
        Self {
            input_file: input_file.into(),
            input_file_type: InputFormat::default(),
            reference_base_url: reference_base_url.into(),
            target_base_url: target_base_url.into(),
            reference_headers: BTreeMap::new(),
            target_headers: BTreeMap::new(),
            header_replacements: BTreeMap::new(),
            limit: None,
            output_file: None,
            output_dir: None,
            no_timestamp_in_report_filenames: false,
            normalized_json_comparison: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ComparisonResult {
    pub fn passed(&self) -> bool {
        self.differences.is_empty()
    }

    /// Either side failed at the transport level.
    pub fn has_errors(&self) -> bool {
        self.reference.error.is_some() || self.target.error.is_some()
    }
}

impl Summary {
    pub fn from_results(results: &[ComparisonResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }
}

impl ComparisonReport {
    pub fn new(
        command_line: impl Into<String>,
        options: CompareOptions,
        input_requests: Vec<Request>,
        results: Vec<ComparisonResult>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            command_line: command_line.into(),
            options,
            input_requests,
            summary: Summary::from_results(&results),
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).await?;
        info!("report saved to {}", path.display());
        Ok(())
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
