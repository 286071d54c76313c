//! Nested scopes sharing log files.
//!
//! Five nested blocks log to `output.log` and `output3.log`. Each file is
//! opened once, shared by every block that uses it, and closed when the
//! outermost block using it is done. Run with `KEEL_LOG=debug` to see every
//! borrow and release.

use keel_log::{LogConfig, LogEvent, LogResult, Logger, telemetry};

#[tokio::main]
async fn main() -> LogResult<()> {
    telemetry::init(&telemetry::filter_from_env("info"))?;

    let logger = Logger::new(LogConfig {
        echo: false,
        ..LogConfig::from_env()
    })?;
    logger.on(|event| match event {
        LogEvent::Opened { path } => println!("Open: {}", path.display()),
        LogEvent::Closed { path, lines_written } => {
            println!("Close: {} ({lines_written} records)", path.display());
        }
        LogEvent::Logged { path, message, .. } => println!("{}: {message}", path.display()),
    });

    // Block 0
    let mut block0 = logger.open("output.log").await?;
    block0.info("Log 0").await?;

    // Block 1
    logger
        .scoped("output.log", |log| Box::pin(async move { log.info("Log 1").await }))
        .await??;

    // Block 2
    logger
        .scoped("output.log", |log| {
            let logger = logger.clone();
            Box::pin(async move {
                log.info("Log 2").await?;

                // Block 3
                let mut block3 = logger.open("output3.log").await?;
                block3.info("Log 3").await?;

                // Block 4
                logger
                    .scoped("output.log", |log| Box::pin(async move { log.info("Log 4").await }))
                    .await??;

                block3.release().await?;
                LogResult::Ok(())
            })
        })
        .await??;

    block0.release().await?;

    // Block 5: the outermost lease has been released.
    println!("After main");
    match block0.get() {
        Ok(log) => log.info("Log 5").await?,
        Err(err) => println!("{err}"),
    }

    Ok(())
}
