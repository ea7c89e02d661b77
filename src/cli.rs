//! CLI definitions for tabwire.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tabwire CLI.
#[derive(Parser)]
#[command(name = "tabwire")]
#[command(about = "Talk to a browser over its remote debugging protocol")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "tabwire.toml", global = true)]
    pub config: PathBuf,

    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Browser description; each flag overrides the `[discovery]` config section.
#[derive(Args, Debug, Default)]
pub(crate) struct BrowserArgs {
    /// Debugging socket URL (skips HTTP discovery)
    #[arg(long, global = true, env = "TABWIRE_CDP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Reported debugger address, e.g. localhost:9222
    #[arg(long, global = true)]
    pub debugger_address: Option<String>,

    /// Browser name (chrome, msedge, firefox)
    #[arg(long, global = true)]
    pub browser: Option<String>,

    /// Browser version to negotiate the protocol schema against
    #[arg(long, global = true)]
    pub browser_version: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the browser's /json/version report
    Version,

    /// List debugging targets
    Targets,

    /// Send one command and print its result
    Send {
        /// Method name, e.g. Runtime.evaluate
        method: String,

        /// Params as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,

        /// Send on the browser connection instead of a page session
        #[arg(long)]
        browser_scoped: bool,

        /// Prefer the page whose target id appears in this text
        #[arg(long)]
        target: Option<String>,
    },

    /// Print events as they arrive
    Listen {
        /// Event name, e.g. Page.loadEventFired
        event: String,

        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,

        /// Prefer the page whose target id appears in this text
        #[arg(long)]
        target: Option<String>,
    },
}
