//! officeconv - command-line entry point.
//!
//! Three modes:
//! - direct: `officeconv [-u] [-f FORMAT] [-o OPTIONS] INPUT OUTPUT`
//! - through a daemon: `officeconv -s SOCKET [-f FORMAT] [-o OPTIONS] INPUT OUTPUT`
//! - as the daemon: `officeconv -s SOCKET -l`
//!
//! The process always ends via `std::process::exit` right after the work is
//! done, so an engine that misbehaves on teardown cannot change the result.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser};

use officeconv::cli::{Cli, Mode};
use officeconv::engine::SofficeProvider;
use officeconv::ipc::{ConversionClient, ConversionDaemon, ExecLauncher};
use officeconv::{direct, exit_code, Config, Error};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help / --version land here too and are not failures.
            let code = if err.use_stderr() {
                exit_code::USAGE
            } else {
                exit_code::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let mode = match cli.mode() {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("officeconv: {err}\n\n{}", Cli::command().render_usage());
            std::process::exit(err.exit_code());
        }
    };

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => fail(&err),
    };
    cli.apply(&mut config);
    officeconv::observability::init_tracing(&config.observability);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => fail(&Error::Io(err)),
    };

    let code = runtime.block_on(run(mode, config, cli.config));
    std::process::exit(code);
}

async fn run(mode: Mode, config: Config, config_file: Option<PathBuf>) -> i32 {
    match mode {
        Mode::Listen { socket } => {
            let provider = SofficeProvider::new(&config.engine);
            let err = ConversionDaemon::run(socket, config.daemon, &provider).await;
            report(&err)
        }
        Mode::Daemon { socket, request } => {
            let launcher = match ExecLauncher::current_exe() {
                Ok(launcher) => launcher.with_config_file(config_file),
                Err(err) => return report(&Error::Spawn(err)),
            };
            let client = ConversionClient::new(config.client, Arc::new(launcher));
            match client.convert(&socket, &request).await {
                Ok(code) => code,
                Err(err) => report(&err),
            }
        }
        Mode::Direct { job } => {
            let provider = SofficeProvider::new(&config.engine);
            direct::run(&provider, &job).await
        }
    }
}

fn report(err: &Error) -> i32 {
    eprintln!("officeconv: {err}");
    err.exit_code()
}

fn fail(err: &Error) -> ! {
    std::process::exit(report(err))
}
