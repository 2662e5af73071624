use clap::Parser as _;
use spanet_serial_tools::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

const LOG_VARIABLE: &str = "SPANET_SERIAL_TOOLS_LOG";

#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    Properties(commands::properties::Args),
    Read(commands::read::Args),
    Set(commands::set::Args),
    Pump(commands::pump::Args),
    Clock(commands::clock::Args),
    Monitor(commands::monitor::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter_description = std::env::var(LOG_VARIABLE).unwrap_or_else(|_| "warn".to_string());
    let filter = match filter_description.parse::<tracing_subscriber::filter::targets::Targets>() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("warning: ignoring {LOG_VARIABLE}: {e}");
            tracing_subscriber::filter::targets::Targets::new()
                .with_default(tracing::Level::WARN)
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::Properties(args) => end(commands::properties::run(args)),
        Commands::Read(args) => end(commands::read::run(args)),
        Commands::Set(args) => end(commands::set::run(args)),
        Commands::Pump(args) => end(commands::pump::run(args)),
        Commands::Clock(args) => end(commands::clock::run(args)),
        Commands::Monitor(args) => end(commands::monitor::run(args)),
    }
}
