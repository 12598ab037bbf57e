mod compare;
mod diff;
mod error;
mod export;
mod placeholder;
mod render;
mod report;
mod req;
mod run;
mod source;

pub use compare::{compare_responses, Difference};
pub use diff::{
    align_lines, canonical_text, diff_blocks, sort_keys, window, AlignedLine, DiffBlock,
    DiffLine, LineKind, CONTEXT_LINES,
};
pub use error::{Error, Result};
pub use export::{curl_command, http_file, raw_http_request};
pub use placeholder::{
    replace_base_url, replace_header_placeholders, substitute, BASE_URL_TOKEN,
};
pub use render::{DifferenceView, HtmlRenderer, ReportView, ResponseView, ResultStatus, ResultView};
pub use report::{CompareOptions, ComparisonReport, ComparisonResult, Summary};
pub use req::{status_text, Body, HttpRequester, Request, RequestBody, ResponseRecord, Side};
pub use run::Session;
pub use source::{load_requests, parse_generic, parse_restfox, validate, InputFormat};

// re-exports
pub use http::Method;
