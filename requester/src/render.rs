use std::{collections::BTreeMap, path::Path};

use minijinja::{context, Environment};
use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::{
    diff::canonical_text, export::http_file, ComparisonReport, ComparisonResult, DiffBlock,
    Difference, ResponseRecord, Result, Side, Summary,
};

const REPORT_TEMPLATE_NAME: &str = "report.html";
const REPORT_TEMPLATE: &str = include_str!("../templates/report.html");

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResultStatus {
    Passed,
    /// no differences, but at least one side failed at the transport level
    PassedWithErrors,
    Failed,
}

/// Rendering-ready projection of a [`ComparisonReport`].
#[derive(Serialize, Debug)]
pub struct ReportView {
    pub timestamp: String,
    pub command_line: String,
    pub input_file: String,
    /// input file stem, used for download names
    pub input_name: String,
    pub input_file_type: String,
    pub reference_base_url: String,
    pub target_base_url: String,
    pub comparison_mode: &'static str,
    /// resolved options shown in the collapsible config section
    pub config: Vec<(&'static str, String)>,
    pub summary: Summary,
    pub passed_with_errors: usize,
    pub results: Vec<ResultView>,
    pub report_json: String,
    pub input_requests_json: String,
    pub http_file: String,
}

#[derive(Serialize, Debug)]
pub struct ResultView {
    pub index: usize,
    pub name: String,
    pub method: String,
    pub url: String,
    pub reference_url: String,
    pub target_url: String,
    pub status: ResultStatus,
    pub reference: ResponseView,
    pub target: ResponseView,
    pub reference_curl: String,
    pub target_curl: String,
    pub reference_http: String,
    pub target_http: String,
    pub differences: Vec<DifferenceView>,
}

#[derive(Serialize, Debug)]
pub struct ResponseView {
    pub status_code: u16,
    pub status_text: String,
    pub duration: String,
    pub error: Option<String>,
    pub body: String,
}

#[derive(Serialize, Debug)]
pub struct DifferenceView {
    pub kind: &'static str,
    pub message: String,
    pub blocks: Vec<DiffBlock>,
}

pub struct HtmlRenderer {
    env: Environment<'static>,
}

impl ReportView {
    pub fn from_report(report: &ComparisonReport) -> Result<Self> {
        let results: Vec<ResultView> = report
            .results
            .iter()
            .enumerate()
            .map(|(index, r)| ResultView::new(index, r))
            .collect();
        let passed_with_errors = results
            .iter()
            .filter(|r| r.status == ResultStatus::PassedWithErrors)
            .count();
        let opts = &report.options;

        Ok(Self {
            timestamp: report.timestamp.to_rfc3339(),
            command_line: report.command_line.clone(),
            input_file: opts.input_file.display().to_string(),
            input_name: opts
                .input_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "requests".to_string()),
            input_file_type: opts.input_file_type.to_string(),
            reference_base_url: opts.reference_base_url.clone(),
            target_base_url: opts.target_base_url.clone(),
            comparison_mode: if opts.normalized_json_comparison {
                "normalized"
            } else {
                "strict"
            },
            config: config_entries(report),
            summary: report.summary,
            passed_with_errors,
            results,
            report_json: serde_json::to_string_pretty(report)?,
            input_requests_json: serde_json::to_string_pretty(&report.input_requests)?,
            http_file: http_file(report),
        })
    }
}

fn config_entries(report: &ComparisonReport) -> Vec<(&'static str, String)> {
    let opts = &report.options;
    let join = |m: &BTreeMap<String, String>, sep: &str| {
        m.iter()
            .map(|(k, v)| format!("{}{}{}", k, sep, v))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut entries = vec![
        ("Input file", opts.input_file.display().to_string()),
        ("Input file type", opts.input_file_type.to_string()),
        ("Reference base URL", opts.reference_base_url.clone()),
        ("Target base URL", opts.target_base_url.clone()),
        ("Timeout", format!("{} s", opts.timeout_secs)),
    ];
    if let Some(limit) = opts.limit {
        entries.push(("Limit", limit.to_string()));
    }
    if !opts.reference_headers.is_empty() {
        entries.push(("Reference headers", join(&opts.reference_headers, ": ")));
    }
    if !opts.target_headers.is_empty() {
        entries.push(("Target headers", join(&opts.target_headers, ": ")));
    }
    if !opts.header_replacements.is_empty() {
        entries.push(("Header variables", join(&opts.header_replacements, "=")));
    }
    entries
}

impl ResultView {
    fn new(index: usize, r: &ComparisonResult) -> Self {
        let status = match (r.passed(), r.has_errors()) {
            (false, _) => ResultStatus::Failed,
            (true, true) => ResultStatus::PassedWithErrors,
            (true, false) => ResultStatus::Passed,
        };
        Self {
            index,
            name: r.name.clone(),
            method: r.method.to_string(),
            url: r.url.clone(),
            reference_url: r.reference_url.clone(),
            target_url: r.target_url.clone(),
            status,
            reference: ResponseView::from(&r.reference),
            target: ResponseView::from(&r.target),
            reference_curl: r.curl_command(Side::Reference),
            target_curl: r.curl_command(Side::Target),
            reference_http: r.raw_http_request(Side::Reference),
            target_http: r.raw_http_request(Side::Target),
            differences: r.differences.iter().map(DifferenceView::from).collect(),
        }
    }
}

impl From<&ResponseRecord> for ResponseView {
    fn from(r: &ResponseRecord) -> Self {
        Self {
            status_code: r.status_code,
            status_text: r.status_text.clone(),
            duration: format!("{:.0} ms", r.duration),
            error: r.error.clone(),
            body: canonical_text(&r.body, false),
        }
    }
}

impl From<&Difference> for DifferenceView {
    fn from(d: &Difference) -> Self {
        match d {
            Difference::StatusCode { message, .. } => Self {
                kind: "status_code",
                message: message.clone(),
                blocks: Vec::new(),
            },
            Difference::Body {
                message,
                diff_blocks,
                ..
            } => Self {
                kind: "body",
                message: message.clone(),
                blocks: diff_blocks.clone(),
            },
        }
    }
}

impl HtmlRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &ReportView) -> Result<String> {
        let tmpl = self.env.get_template(REPORT_TEMPLATE_NAME)?;
        Ok(tmpl.render(context! { report => view })?)
    }

    pub async fn write(&self, report: &ComparisonReport, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let html = self.render(&ReportView::from_report(report)?)?;
        fs::write(path, html).await?;
        info!("HTML report saved to {}", path.display());
        Ok(())
    }
}
