//! Subcommand handlers for tabwire.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use tabwire_config::Config;
use tabwire_core::{
    BootstrapConfig, Capabilities, Command, DevTools, EndpointFinder, Event, ReqwestClientFactory,
    VersionCatalog,
};

use crate::cli::Commands;

/// Handle one subcommand against the browser described by `config`.
pub(crate) async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let caps = Capabilities::from_config(&config.discovery);
    debug!("Capabilities: {:?}", caps);

    match command {
        Commands::Version => print_version(&caps, config).await,
        Commands::Targets => {
            let devtools = connect(&caps, config).await?;
            let result = list_targets(&devtools).await;
            devtools.close().await;
            result
        }
        Commands::Send {
            method,
            params,
            browser_scoped,
            target,
        } => {
            let params: Value = serde_json::from_str(&params).context("--params is not valid JSON")?;
            let devtools = connect(&caps, config).await?;
            let result = send(&devtools, method, params, browser_scoped, target.as_deref()).await;
            devtools.close().await;
            result
        }
        Commands::Listen { event, count, target } => {
            let devtools = connect(&caps, config).await?;
            let result = listen(&devtools, event, count, target.as_deref()).await;
            devtools.close().await;
            result
        }
    }
}

async fn connect(caps: &Capabilities, config: &Config) -> Result<DevTools> {
    let catalog = VersionCatalog::builtin().with_fudge_factor(config.versions.fudge_factor);
    let bootstrap = BootstrapConfig::from(config);

    tabwire_core::connect(caps, &ReqwestClientFactory, &catalog, &bootstrap)
        .await?
        .ok_or_else(|| anyhow!("remote debugging is not available for this browser"))
}

async fn print_version(caps: &Capabilities, config: &Config) -> Result<()> {
    let endpoint = EndpointFinder::discover(&ReqwestClientFactory, caps, &config.connection)
        .await
        .ok_or_else(|| anyhow!("no debugging endpoint found"))?;

    println!("Socket:           {}", endpoint.url);
    match endpoint.version_report {
        Some(report) => {
            let field = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
            println!("Browser:          {}", field(report.browser));
            println!("Protocol-Version: {}", field(report.protocol_version));
            println!("User-Agent:       {}", field(report.user_agent));
            println!("V8-Version:       {}", field(report.v8_version));
        }
        None => println!("(explicit endpoint, no version report)"),
    }
    Ok(())
}

async fn list_targets(devtools: &DevTools) -> Result<()> {
    let targets = devtools.send(&devtools.domains().target().get_targets()).await?;

    if targets.is_empty() {
        println!("No targets.");
        return Ok(());
    }
    println!("{:<34} {:<16} {}", "ID", "TYPE", "URL");
    for target in targets {
        println!("{:<34} {:<16} {}", target.target_id.as_str(), target.target_type, target.url);
    }
    Ok(())
}

async fn send(
    devtools: &DevTools,
    method: String,
    params: Value,
    browser_scoped: bool,
    target: Option<&str>,
) -> Result<()> {
    if !params.is_object() {
        bail!("--params must be a JSON object");
    }

    let mut command = Command::<Value>::new(method, params);
    if browser_scoped {
        command = command.browser_scoped();
    } else {
        let session_id = devtools.create_session(target).await?;
        info!("Sending on session {}", session_id);
    }

    let result = devtools.send(&command).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn listen(devtools: &DevTools, event: String, count: Option<usize>, target: Option<&str>) -> Result<()> {
    let event = Event::<Value>::new(event);
    let mut events = devtools.listen(&event);
    devtools.create_session(target).await?;
    info!("Listening for {}", event.method());

    let mut received = 0;
    while count.is_none_or(|limit| received < limit) {
        tokio::select! {
            next = events.recv() => {
                let Some((sequence, params)) = next else {
                    break;
                };
                println!("#{} {}", sequence, serde_json::to_string(&params)?);
                received += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}
