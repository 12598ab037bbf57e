use std::time::Duration;

use tracing::{debug, info};

use crate::{
    compare_responses, CompareOptions, ComparisonReport, ComparisonResult, HttpRequester, Request,
    Result, Side,
};

/// Runs requests one at a time against both environments. The reference call
/// always completes before the target call starts, and requests never overlap.
#[derive(Debug, Clone)]
pub struct Session {
    requester: HttpRequester,
    options: CompareOptions,
}

impl Session {
    pub fn new(options: CompareOptions) -> Result<Self> {
        let requester = HttpRequester::new(Duration::from_secs(options.timeout_secs))?;
        Ok(Self { requester, options })
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    pub async fn compare(&self, request: &Request) -> Result<ComparisonResult> {
        let opts = &self.options;

        let reference = self
            .requester
            .send(
                request,
                Side::Reference,
                &opts.reference_base_url,
                &opts.header_replacements,
                &opts.reference_headers,
            )
            .await?;
        let target = self
            .requester
            .send(
                request,
                Side::Target,
                &opts.target_base_url,
                &opts.header_replacements,
                &opts.target_headers,
            )
            .await?;

        let differences =
            compare_responses(&reference, &target, opts.normalized_json_comparison);
        debug!(
            name = request.display_name(),
            differences = differences.len(),
            "compared"
        );

        Ok(ComparisonResult {
            name: request.display_name().to_string(),
            method: request.method.clone(),
            url: request.display_url().to_string(),
            reference_url: request.resolve_url(Side::Reference, &opts.reference_base_url)?,
            target_url: request.resolve_url(Side::Target, &opts.target_base_url)?,
            reference_base_url: opts.reference_base_url.clone(),
            target_base_url: opts.target_base_url.clone(),
            request_body: request.body.clone(),
            reference_request_headers: request
                .merged_headers(&opts.header_replacements, &opts.reference_headers)?,
            target_request_headers: request
                .merged_headers(&opts.header_replacements, &opts.target_headers)?,
            reference,
            target,
            differences,
        })
    }

    /// Compare every request in order. `on_progress` is called with the
    /// 1-based position before each request is sent.
    pub async fn run<F>(
        &self,
        requests: Vec<Request>,
        command_line: impl Into<String>,
        mut on_progress: F,
    ) -> Result<ComparisonReport>
    where
        F: FnMut(usize, usize, &Request),
    {
        info!(
            count = requests.len(),
            reference = %self.options.reference_base_url,
            target = %self.options.target_base_url,
            "processing requests"
        );

        let total = requests.len();
        let mut results = Vec::with_capacity(total);
        for (i, request) in requests.iter().enumerate() {
            on_progress(i + 1, total, request);
            results.push(self.compare(request).await?);
        }

        let report = ComparisonReport::new(command_line, self.options.clone(), requests, results);
        info!(
            total = report.summary.total,
            passed = report.summary.passed,
            failed = report.summary.failed,
            "comparison finished"
        );
        Ok(report)
    }
}
