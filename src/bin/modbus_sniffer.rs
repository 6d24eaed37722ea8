//! modbus_sniffer - passive RS485 Modbus RTU sniffer for battery telemetry
//!
//! Usage: modbus_sniffer -s /dev/ttyUSB0 -o /tmp/battery_data.json [-b 9600] [-d] [-p pidfile]
//!        modbus_sniffer --replay capture.bin -o /tmp/battery_data.json
//!
//! Exit status: 0 on graceful shutdown or help, 1 on bad arguments, a source
//! that cannot be opened, or a fatal read error.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use voltage_sniffer::logging::{init_logging, LoggingMode};
use voltage_sniffer::pidfile::PidFile;
use voltage_sniffer::shutdown::cancel_on_signal;
use voltage_sniffer::{open_serial, Args, Sniffer, SnifferResult, Source};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    if let Err(e) = init_logging(LoggingMode::from_daemon_flag(args.daemon), &args.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => {
            info!("Shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run until a signal, end of replay, or a fatal error.
///
/// A read error other than an interruption is returned and the process exits 1,
/// so a lost bus is not reported as a clean stop.
async fn run(args: Args) -> SnifferResult<()> {
    let source = args.source()?;
    let _pidfile = PidFile::create(&args.pidfile);

    let shutdown = CancellationToken::new();
    let signals = cancel_on_signal(shutdown.clone());

    let mut sniffer = Sniffer::new(args.sniffer_config());
    let result = match source {
        Source::Serial { port, baud } => {
            info!(
                "Starting: port={} baud={} output={}",
                port,
                baud,
                args.output.display()
            );
            let stream = open_serial(&port, baud)?;
            sniffer.run(stream, shutdown.clone()).await
        }
        Source::Replay(path) => {
            info!(
                "Starting: replay={} output={}",
                path.display(),
                args.output.display()
            );
            let file = tokio::fs::File::open(&path).await?;
            sniffer.run(file, shutdown.clone()).await
        }
    };

    shutdown.cancel();
    let _ = signals.await;
    result
}
