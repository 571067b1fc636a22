use env_logger::{Builder, WriteStyle};
use log::error;
use temper::cli::{Invocation, USAGE};
use temper::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Arguments and configuration come first, before logging is up.
    let invocation = match Invocation::parse(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let config = AppConfig::load_or_default(&invocation.config).map_err(|e| {
        eprintln!("Failed to load configuration: {:#}", e);
        e
    })?;

    // Initialise logger with a configured log level
    Builder::new()
        .filter_level(config.get_log_level())
        .write_style(WriteStyle::Always)
        .format_timestamp_secs()
        .init();

    if let Err(e) = temper::run(config, invocation).await {
        error!("Application error: {e:#}");
        // Print chain of error causes
        let mut source = e.source();
        while let Some(cause) = source {
            error!("Caused by: {cause}");
            source = cause.source();
        }
        return Err(e);
    }
    Ok(())
}
