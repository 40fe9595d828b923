use clap::Parser;

/// Dumpster fleet demo. Takes no flags; settings come from the
/// environment (see `Config`).
#[derive(Debug, Parser)]
#[command(
    name = "dumpster-fleet",
    version,
    about = "Registers a collection container and monitors its fill level"
)]
pub struct Cli {}
