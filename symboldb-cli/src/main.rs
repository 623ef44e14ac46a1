//! The symboldb command-line tool.

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The log filter honors an explicit SYMBOLDB_LOG; the flags only set
    // the default.
    if std::env::var_os("SYMBOLDB_LOG").is_none() {
        let default = if cli.quiet {
            "symboldb=warn"
        } else if cli.verbose {
            "symboldb=debug"
        } else {
            "symboldb=info"
        };
        std::env::set_var("SYMBOLDB_LOG", default);
    }
    symboldb_core::tracing::init_tracing();

    commands::run(cli)
}
