use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use apicmp_lib::{CompareOptions, ComparisonReport, InputFormat};
use chrono::{DateTime, SecondsFormat, Utc};
use console::style;
use tracing_subscriber::{fmt, EnvFilter};

const REPORT_PREFIX: &str = "comparison-report";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub html: PathBuf,
}

/// Parse a `Name: value` header.
pub fn parse_header(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid header '{}', expected 'Name: value'", s))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(anyhow::anyhow!("invalid header name in '{}'", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a `key=value` pair.
pub fn parse_key_val(s: &str) -> Result<(String, String)> {
    let mut parts = s.splitn(2, '=');
    let key = parts
        .next()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing key in '{}'", s))?;
    let val = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing value in '{}'", s))?;
    Ok((key.to_string(), val.to_string()))
}

pub fn parse_input_format(s: &str) -> Result<InputFormat> {
    Ok(s.parse()?)
}

pub fn get_input_file(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(anyhow::anyhow!("input file {} not found", s))
    }
}

/// Log to stderr, level from `RUST_LOG` (default `info`).
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Where `compare` writes its JSON and HTML reports.
pub fn report_paths(options: &CompareOptions, timestamp: &DateTime<Utc>) -> ReportPaths {
    let dir = options.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    if let Some(file) = &options.output_file {
        let base = file
            .strip_suffix(".json")
            .or_else(|| file.strip_suffix(".html"))
            .unwrap_or(file);
        return ReportPaths {
            json: dir.join(format!("{}.json", base)),
            html: dir.join(format!("{}.html", base)),
        };
    }

    let stem = options
        .input_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let base = if options.no_timestamp_in_report_filenames {
        format!("{}-{}", REPORT_PREFIX, stem)
    } else {
        format!("{}-{}-{}", REPORT_PREFIX, stem, file_timestamp(timestamp))
    };
    ReportPaths {
        json: dir.join(format!("{}.json", base)),
        html: dir.join(format!("{}.html", base)),
    }
}

/// Where `report` writes the HTML regenerated from `input`.
pub fn html_path_for_report(
    input: &Path,
    output_file: Option<&str>,
    output_dir: Option<&Path>,
) -> PathBuf {
    if let Some(file) = output_file {
        let dir = output_dir.unwrap_or_else(|| Path::new("."));
        return if file.ends_with(".html") {
            dir.join(file)
        } else {
            dir.join(format!("{}.html", file))
        };
    }

    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = name.strip_suffix(".json").unwrap_or(&name);
    dir.join(format!("{}.html", base))
}

fn file_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Progress line rewritten in place when the output is a terminal. The first
/// write error is kept and returned by [`Progress::finish`].
#[derive(Debug)]
pub struct Progress<W: Write> {
    out: W,
    is_tty: bool,
    last_len: usize,
    error: Option<std::io::Error>,
}

impl Progress<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout(), atty::is(atty::Stream::Stdout))
    }
}

impl<W: Write> Progress<W> {
    pub fn new(out: W, is_tty: bool) -> Self {
        Self {
            out,
            is_tty,
            last_len: 0,
            error: None,
        }
    }

    pub fn update(&mut self, current: usize, total: usize, url: &str) {
        if self.error.is_some() {
            return;
        }
        let text = format!("[{}/{}] {}", current, total, url);
        let res = if self.is_tty {
            let padding = " ".repeat(self.last_len.saturating_sub(text.len()));
            write!(self.out, "\r{}{}", text, padding).and_then(|_| self.out.flush())
        } else {
            writeln!(self.out, "{}", text)
        };
        self.error = res.err();
        self.last_len = text.len();
    }

    pub fn finish(mut self) -> std::io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.last_len > 0 && self.is_tty {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

pub fn print_summary(output: &mut Vec<String>, report: &ComparisonReport) {
    let rule = "=".repeat(80);
    let summary = &report.summary;

    output.push(format!("\n{}\n", rule));
    output.push("COMPARISON SUMMARY\n".into());
    output.push(format!("{}\n", rule));
    output.push(format!("Total requests:   {}\n", summary.total));
    output.push(format!(
        "Passed:           {} {}\n",
        summary.passed,
        style("✓").green()
    ));
    output.push(format!(
        "Failed:           {} {}\n",
        summary.failed,
        style("✗").red()
    ));
    output.push(format!("{}\n", rule));

    if summary.failed > 0 {
        output.push("\nFailed requests:\n".into());
        for result in report.results.iter().filter(|r| !r.passed()) {
            output.push(format!("\n  {} {}\n", style("✗").red(), style(&result.name).bold()));
            output.push(format!("    URL: {}\n", style(&result.url).dim()));
            for diff in &result.differences {
                output.push(format!("    - {}\n", diff.message()));
            }
        }
    }
    output.push("\n".into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicmp_lib::{compare_responses, Body, ComparisonResult, Method, ResponseRecord};
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 11, 10, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn parse_header_should_work() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
        assert!(parse_header("Bad Name: value").is_err());
    }

    #[test]
    fn parse_key_val_should_work() {
        assert_eq!(
            parse_key_val("token=a=b").unwrap(),
            ("token".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("token").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn default_report_paths_should_include_timestamp() {
        let options = CompareOptions::new("data/requests.json", "http://a", "http://b");
        let paths = report_paths(&options, &timestamp());
        assert_eq!(
            paths.json,
            PathBuf::from("./comparison-report-requests-2025-11-11T10-30-45-123Z.json")
        );
        assert_eq!(
            paths.html,
            PathBuf::from("./comparison-report-requests-2025-11-11T10-30-45-123Z.html")
        );
    }

    #[test]
    fn report_paths_should_honor_output_options() {
        let mut options = CompareOptions::new("requests.json", "http://a", "http://b");
        options.no_timestamp_in_report_filenames = true;
        options.output_dir = Some(PathBuf::from("out"));
        let paths = report_paths(&options, &timestamp());
        assert_eq!(paths.json, PathBuf::from("out/comparison-report-requests.json"));

        options.output_file = Some("nightly.html".into());
        let paths = report_paths(&options, &timestamp());
        assert_eq!(paths.json, PathBuf::from("out/nightly.json"));
        assert_eq!(paths.html, PathBuf::from("out/nightly.html"));
    }

    #[test]
    fn html_path_for_report_should_follow_input() {
        let input = Path::new("reports/run-1.json");
        assert_eq!(
            html_path_for_report(input, None, None),
            PathBuf::from("reports/run-1.html")
        );
        assert_eq!(
            html_path_for_report(input, None, Some(Path::new("out"))),
            PathBuf::from("out/run-1.html")
        );
        assert_eq!(
            html_path_for_report(input, Some("view"), None),
            PathBuf::from("./view.html")
        );
    }

    #[test]
    fn progress_should_print_one_line_per_request_without_tty() {
        let mut progress = Progress::new(Vec::new(), false);
        progress.update(1, 2, "{{baseUrl}}/a");
        progress.update(2, 2, "{{baseUrl}}/b");
        let out = progress.finish().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[1/2] {{baseUrl}}/a\n[2/2] {{baseUrl}}/b\n"
        );
    }

    #[test]
    fn progress_should_rewrite_line_on_tty() {
        let mut progress = Progress::new(Vec::new(), true);
        progress.update(1, 2, "/long/path");
        progress.update(2, 2, "/x");
        let out = String::from_utf8(progress.finish().unwrap()).unwrap();
        assert_eq!(out, "\r[1/2] /long/path\r[2/2] /x        \n");
    }

    #[derive(Debug)]
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn progress_write_errors_should_surface_on_finish() {
        let mut progress = Progress::new(Broken, false);
        progress.update(1, 1, "/a");
        let err = progress.finish().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn summary_should_list_failed_requests() {
        let ok = ResponseRecord {
            status_code: 200,
            status_text: "OK".into(),
            body: Body::Textual("ok".into()),
            duration: 1.0,
            error: None,
        };
        let down = ResponseRecord::failed(1.0, "connection refused");
        let result = ComparisonResult {
            name: "Get user".into(),
            method: Method::GET,
            url: "{{baseUrl}}/users/1".into(),
            reference_url: "http://a/users/1".into(),
            target_url: "http://b/users/1".into(),
            reference_base_url: "http://a".into(),
            target_base_url: "http://b".into(),
            request_body: None,
            reference_request_headers: Default::default(),
            target_request_headers: Default::default(),
            differences: compare_responses(&ok, &down, false),
            reference: ok,
            target: down,
        };
        let options = CompareOptions::new("requests.json", "http://a", "http://b");
        let report = ComparisonReport::new("apicmp compare", options, vec![], vec![result]);

        let mut output = Vec::new();
        print_summary(&mut output, &report);
        let text = console::strip_ansi_codes(&output.concat()).into_owned();
        assert!(text.contains("Total requests:   1"));
        assert!(text.contains("Failed:           1"));
        assert!(text.contains("Get user"));
        assert!(text.contains("- Status code mismatch: expected 200, got 0"));
    }
}
