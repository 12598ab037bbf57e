use anyhow::Result;
use apicmp_cli_utils::{
    get_input_file, html_path_for_report, init_logger, parse_header, parse_input_format,
    parse_key_val, print_summary, report_paths, Progress,
};
use apicmp_lib::{load_requests, CompareOptions, ComparisonReport, HtmlRenderer, InputFormat, Session};
use clap::Parser;
use std::{io::Write, path::PathBuf};
use tracing::info;

/// Compare API responses between a reference and a target environment.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    action: Action,
}

#[derive(clap::Subcommand, Debug, Clone)]
enum Action {
    /// Compare API responses and generate JSON + HTML reports.
    Compare(CompareArgs),
    /// Generate the HTML report from an existing JSON comparison report.
    Report(ReportArgs),
}

#[derive(Parser, Debug, Clone)]
struct CompareArgs {
    /// Path to the JSON request file.
    #[clap(long, value_parser = get_input_file)]
    input_file: PathBuf,

    /// Type of input file: 'generic' or 'restfox'.
    #[clap(long, value_parser = parse_input_format, default_value = "generic")]
    input_file_type: InputFormat,

    /// Base URL of the reference (current) API.
    #[clap(long, value_parser)]
    reference_base_url: String,

    /// Base URL of the target (next) API.
    #[clap(long, value_parser)]
    target_base_url: String,

    /// Extra header for reference requests, as 'Name: value'.
    #[clap(long = "reference-header", value_parser = parse_header, number_of_values = 1)]
    reference_headers: Vec<(String, String)>,

    /// Extra header for target requests, as 'Name: value'.
    #[clap(long = "target-header", value_parser = parse_header, number_of_values = 1)]
    target_headers: Vec<(String, String)>,

    /// Value for a '{{name}}' placeholder in request headers, as 'name=value'.
    #[clap(long = "header-var", value_parser = parse_key_val, number_of_values = 1)]
    header_vars: Vec<(String, String)>,

    /// Limit the number of requests to compare.
    #[clap(long, value_parser)]
    limit: Option<usize>,

    /// Base name of the generated reports.
    #[clap(long, value_parser)]
    output_file: Option<String>,

    /// Directory of the generated reports.
    #[clap(long, value_parser)]
    output_dir: Option<PathBuf>,

    /// Omit the timestamp from report filenames.
    #[clap(long)]
    no_timestamp_in_report_filenames: bool,

    /// Ignore object key order when comparing JSON bodies.
    #[clap(long)]
    normalized_json_comparison: bool,

    /// Per-request timeout in seconds.
    #[clap(long, value_parser, default_value_t = 30)]
    timeout: u64,
}

#[derive(Parser, Debug, Clone)]
struct ReportArgs {
    /// Path to the JSON comparison report.
    #[clap(long, value_parser = get_input_file)]
    input_file: PathBuf,

    /// Name of the generated HTML file.
    #[clap(long, value_parser)]
    output_file: Option<String>,

    /// Directory of the generated HTML file.
    #[clap(long, value_parser)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger();

    let mut output: Vec<String> = Vec::new();

    let passed = match args.action {
        Action::Compare(args) => compare(&mut output, args).await?,
        Action::Report(args) => {
            report(args).await?;
            true
        }
    };

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    for line in output {
        write!(stdout, "{}", line)?;
    }
    stdout.flush()?;

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

async fn compare(output: &mut Vec<String>, args: CompareArgs) -> Result<bool> {
    let options = args.into_options();
    info!(
        input = %options.input_file.display(),
        format = %options.input_file_type,
        reference = %options.reference_base_url,
        target = %options.target_base_url,
        "starting comparison"
    );

    let requests = load_requests(&options.input_file, options.input_file_type, options.limit).await?;
    let session = Session::new(options)?;

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let mut progress = Progress::stdout();
    let report = session
        .run(requests, command_line, |i, n, req| {
            progress.update(i, n, req.display_url())
        })
        .await?;
    progress.finish()?;

    let paths = report_paths(&report.options, &report.timestamp);
    report.save_json(&paths.json).await?;
    HtmlRenderer::new()?.write(&report, &paths.html).await?;

    print_summary(output, &report);
    output.push(format!("JSON report: {}\n", paths.json.display()));
    output.push(format!("HTML report: {}\n", paths.html.display()));

    Ok(report.all_passed())
}

async fn report(args: ReportArgs) -> Result<()> {
    info!(input = %args.input_file.display(), "generating HTML report from JSON");

    let report = ComparisonReport::load_json(&args.input_file).await?;
    let path = html_path_for_report(
        &args.input_file,
        args.output_file.as_deref(),
        args.output_dir.as_deref(),
    );
    HtmlRenderer::new()?.write(&report, &path).await?;

    println!("HTML report generated: {}", path.display());
    Ok(())
}

impl CompareArgs {
    fn into_options(self) -> CompareOptions {
        let mut options = CompareOptions::new(
            self.input_file,
            self.reference_base_url,
            self.target_base_url,
        );
        options.input_file_type = self.input_file_type;
        options.reference_headers = self.reference_headers.into_iter().collect();
        options.target_headers = self.target_headers.into_iter().collect();
        options.header_replacements = self.header_vars.into_iter().collect();
        options.limit = self.limit;
        options.output_file = self.output_file;
        options.output_dir = self.output_dir;
        options.no_timestamp_in_report_filenames = self.no_timestamp_in_report_filenames;
        options.normalized_json_comparison = self.normalized_json_comparison;
        options.timeout_secs = self.timeout;
        options
    }
}
