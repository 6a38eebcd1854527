use keyrd::{Channel, DirectAccess, EventSource, KeyrdError, LiveSource, Seat};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();

    // The channel binds before the input backend comes up, so a socket
    // problem is reported as one even when the backend is broken too.
    let path = keyrd::socket_path();
    let channel = match Channel::bind(&path) {
        Ok(channel) => channel,
        Err(err) => return fatal(err),
    };

    let seat = Seat::from_env();
    let source = match EventSource::new(DirectAccess, &seat) {
        Ok(source) => source,
        Err(err) => return fatal(err),
    };
    let source = match LiveSource::new(source) {
        Ok(source) => source,
        Err(err) => return fatal(err),
    };

    let daemon = channel.attach(source);

    info!(seat = seat.name(), path = %path.display(), "keyrd started");

    match daemon.run().await {
        Ok(()) => {
            info!("keyrd stopped");
            ExitCode::SUCCESS
        }
        Err(err) => fatal(err),
    }
}

fn fatal(err: KeyrdError) -> ExitCode {
    error!(error = %err, "fatal error");
    ExitCode::from(err.exit_code())
}
