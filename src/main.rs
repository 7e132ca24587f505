// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use opentalk_media_harness::{
    browser::ChromiumProvisioner,
    scenario::{Scenario, ScenarioRunner},
    settings::Settings,
    sources::SourceRegistry,
};

#[derive(Parser, Debug)]
#[clap(author, version, about = env!("CARGO_PKG_DESCRIPTION"), long_about = None)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Only run the scenario with this name, can be given multiple times
    #[clap(short, long = "scenario")]
    scenarios: Vec<String>,

    /// List the configured scenarios and exit
    #[clap(long)]
    list: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    env_logger::init();

    if let Err(e) = run(args).await {
        eprintln!("Exit on failure: {e:?}");
        std::process::exit(-1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = Settings::load(&args.config).context("Failed to read config")?;
    settings.liveness.validate()?;

    if args.list {
        for scenario in &settings.scenarios {
            println!(
                "{} ({} participants, room '{}')",
                scenario.name,
                scenario.participants.len(),
                scenario.room
            );
        }
        return Ok(());
    }

    let base_dir = Path::new(&args.config)
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let registry = SourceRegistry::from_settings(&settings.sources, base_dir)?;

    let scenarios = settings
        .scenarios
        .iter()
        .filter(|scenario| args.scenarios.is_empty() || args.scenarios.contains(&scenario.name))
        .map(|scenario| Scenario::from_settings(scenario, &registry))
        .collect::<Result<Vec<_>, _>>()?;

    if scenarios.is_empty() {
        bail!("No scenario selected");
    }

    let runner = ScenarioRunner::new(
        ChromiumProvisioner::new(settings.browser.clone()),
        settings.target.base_url.clone(),
    )
    .with_ui(settings.ui.clone())
    .with_liveness(settings.liveness.clone())
    .with_reachability_check(settings.target.check_reachable)
    .with_artifacts_dir(settings.artifacts.dir.clone());

    let mut failed = Vec::new();
    for scenario in &scenarios {
        match runner.run(scenario).await {
            Ok(report) => log::info!("{report}"),
            Err(e) => {
                log::error!("Scenario '{}' failed: {:?}", scenario.name, anyhow::Error::from(e));
                failed.push(scenario.name.as_str());
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} of {} scenarios failed: {}",
            failed.len(),
            scenarios.len(),
            failed.join(", ")
        );
    }

    log::info!("All {} scenarios passed", scenarios.len());

    Ok(())
}
