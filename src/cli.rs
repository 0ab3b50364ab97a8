//! Command-line interface.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::types::{Config, ConversionJob, ConversionRequest, Error, InputLocation, Result};

const AFTER_HELP: &str = "\
Known values for FORMAT include:
  For text documents: doc docx fodt html odt ott pdf txt xhtml

OPTIONS are passed to the engine verbatim as the filter part of the
conversion target, e.g. -f html -o 'XHTML Writer File:UTF8'.

With -s, a daemon is started on SOCKET_PATH if none is listening there.";

/// Convert office documents, optionally through a persistent daemon.
#[derive(Debug, Parser)]
#[command(name = "officeconv", version, after_help = AFTER_HELP)]
pub struct Cli {
    /// Output format (inferred from OUTPUT_FILE's extension when omitted)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Engine filter options
    #[arg(short = 'o', long, value_name = "OPTIONS")]
    pub options: Option<String>,

    /// INPUT_FILE is a URL (not allowed with --socket)
    #[arg(short = 'u', long)]
    pub url: bool,

    /// Convert through the daemon at SOCKET_PATH
    #[arg(short = 's', long, value_name = "SOCKET_PATH")]
    pub socket: Option<PathBuf>,

    /// Run as the daemon on SOCKET_PATH
    #[arg(short = 'l', long)]
    pub listen: bool,

    /// Fail instead of starting a daemon when none is listening
    #[arg(long)]
    pub no_spawn: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE", env = "OFFICECONV_CONFIG")]
    pub config: Option<PathBuf>,

    /// INPUT_FILE OUTPUT_FILE
    #[arg(value_name = "FILES")]
    pub files: Vec<OsString>,
}

/// What the process should do, after usage validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Run the daemon.
    Listen { socket: PathBuf },
    /// Convert through the daemon.
    Daemon {
        socket: PathBuf,
        request: ConversionRequest,
    },
    /// Convert in-process.
    Direct { job: ConversionJob },
}

impl Cli {
    /// Validate flag combinations and build the mode.
    pub fn mode(&self) -> Result<Mode> {
        if self.listen {
            let socket = match &self.socket {
                Some(socket) => socket.clone(),
                None => return Err(Error::usage("--listen requires --socket")),
            };
            if !self.files.is_empty()
                || self.format.is_some()
                || self.options.is_some()
                || self.url
                || self.no_spawn
            {
                return Err(Error::usage("--listen takes no other options or files"));
            }
            return Ok(Mode::Listen { socket });
        }

        if self.url && self.socket.is_some() {
            return Err(Error::usage("--url cannot be used with --socket"));
        }
        if self.no_spawn && self.socket.is_none() {
            return Err(Error::usage("--no-spawn requires --socket"));
        }

        let [input, output] = self.files.as_slice() else {
            return Err(Error::usage("expected INPUT_FILE and OUTPUT_FILE"));
        };
        let output = PathBuf::from(output);
        let format = self.format.clone().filter(|f| !f.is_empty());
        let options = self.options.clone().filter(|o| !o.is_empty());

        if let Some(socket) = &self.socket {
            return Ok(Mode::Daemon {
                socket: socket.clone(),
                request: ConversionRequest {
                    format,
                    input: PathBuf::from(input),
                    output,
                    options,
                },
            });
        }

        let input = if self.url {
            let url = input
                .clone()
                .into_string()
                .map_err(|_| Error::usage("URL is not valid UTF-8"))?;
            InputLocation::Url(url)
        } else {
            InputLocation::Path(PathBuf::from(input))
        };
        Ok(Mode::Direct {
            job: ConversionJob {
                input,
                output,
                format,
                options,
            },
        })
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if self.no_spawn {
            config.client.auto_spawn = false;
        }
        // The daemon has no terminal to report to; keep its lifecycle visible.
        if self.listen {
            config.observability.log_level = "info".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Mode> {
        let cli = Cli::try_parse_from(std::iter::once("officeconv").chain(args.iter().copied()))
            .map_err(|e| Error::usage(e.to_string()))?;
        cli.mode()
    }

    #[test]
    fn listen_mode() {
        assert_eq!(
            parse(&["-s", "/tmp/d.sock", "-l"]).unwrap(),
            Mode::Listen {
                socket: PathBuf::from("/tmp/d.sock")
            }
        );
    }

    #[test]
    fn listen_rejects_extras() {
        let cases: [&[&str]; 5] = [
            &["-l"],
            &["-s", "/tmp/d.sock", "-l", "-f", "pdf"],
            &["-s", "/tmp/d.sock", "-l", "-u"],
            &["-s", "/tmp/d.sock", "-l", "a.odt"],
            &["-s", "/tmp/d.sock", "-l", "--no-spawn"],
        ];
        for args in cases {
            let err = parse(args).unwrap_err();
            assert_eq!(err.exit_code(), 64, "args: {:?}", args);
        }
    }

    #[test]
    fn daemon_mode_request() {
        let mode = parse(&["-s", "/tmp/d.sock", "-f", "pdf", "/tmp/a.odt", "/tmp/a.pdf"]).unwrap();
        assert_eq!(
            mode,
            Mode::Daemon {
                socket: PathBuf::from("/tmp/d.sock"),
                request: ConversionRequest::new("/tmp/a.odt", "/tmp/a.pdf").with_format("pdf"),
            }
        );
    }

    #[test]
    fn url_with_socket_is_usage_error() {
        let err = parse(&["-u", "-s", "/tmp/d.sock", "http://x/a.odt", "a.pdf"]).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn direct_url_mode() {
        let mode = parse(&["-u", "-o", "SkipImages", "http://x/a.odt", "a.html"]).unwrap();
        let Mode::Direct { job } = mode else {
            panic!("expected direct mode");
        };
        assert_eq!(job.input, InputLocation::Url("http://x/a.odt".into()));
        assert_eq!(job.options.as_deref(), Some("SkipImages"));
        assert_eq!(job.format, None);
    }

    #[test]
    fn wrong_file_count_is_usage_error() {
        assert!(matches!(parse(&["a.odt"]), Err(Error::Usage(_))));
        assert!(matches!(parse(&["a", "b", "c"]), Err(Error::Usage(_))));
    }

    #[test]
    fn no_spawn_disables_auto_spawn() {
        let cli =
            Cli::try_parse_from(["officeconv", "--no-spawn", "-s", "/tmp/d.sock", "a", "b"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        assert!(!config.client.auto_spawn);
        assert!(matches!(cli.mode(), Ok(Mode::Daemon { .. })));
    }
}
