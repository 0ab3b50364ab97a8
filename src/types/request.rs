//! Conversion request model.

use std::fmt;
use std::path::PathBuf;

/// A request as carried over the daemon socket. Always path-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Output format (e.g. `pdf`); `None` lets the engine infer it.
    pub format: Option<String>,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Engine filter options, passed through verbatim.
    pub options: Option<String>,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            format: None,
            input: input.into(),
            output: output.into(),
            options: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }
}

/// Where the engine should load the document from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLocation {
    /// Local filesystem path.
    Path(PathBuf),
    /// URL handed to the engine as-is. Never produced from a socket request.
    Url(String),
}

impl fmt::Display for InputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputLocation::Path(path) => write!(f, "{}", path.display()),
            InputLocation::Url(url) => f.write_str(url),
        }
    }
}

/// A unit of work for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: InputLocation,
    pub output: PathBuf,
    pub format: Option<String>,
    pub options: Option<String>,
}

impl ConversionJob {
    /// Build a job from a socket request. Daemon-served input is always a
    /// filesystem path; empty format/options mean "absent".
    pub fn from_request(request: ConversionRequest) -> Self {
        Self {
            input: InputLocation::Path(request.input),
            output: request.output,
            format: request.format.filter(|f| !f.is_empty()),
            options: request.options.filter(|o| !o.is_empty()),
        }
    }
}

/// Outcome of one conversion: `0` on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionResult {
    pub exit_code: i32,
}

impl ConversionResult {
    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_request_normalizes_empty_fields() {
        let request = ConversionRequest {
            format: Some(String::new()),
            input: PathBuf::from("/tmp/a.odt"),
            output: PathBuf::from("/tmp/a.pdf"),
            options: Some(String::new()),
        };
        let job = ConversionJob::from_request(request);
        assert_eq!(job.format, None);
        assert_eq!(job.options, None);
        assert_eq!(job.input, InputLocation::Path(PathBuf::from("/tmp/a.odt")));
    }

    #[test]
    fn from_request_keeps_populated_fields() {
        let request = ConversionRequest::new("in.docx", "out.html")
            .with_format("html")
            .with_options("SkipImages");
        let job = ConversionJob::from_request(request);
        assert_eq!(job.format.as_deref(), Some("html"));
        assert_eq!(job.options.as_deref(), Some("SkipImages"));
    }
}
