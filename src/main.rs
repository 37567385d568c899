use anyhow::Context;
use clap::Parser as _;
use tracing_subscriber::EnvFilter;

use mulping::{
    Error,
    cli::{Cli, Plan},
    display::{Table, format_raw_latency},
    mullvad::MullvadCli,
    ping::{Platform, SystemPing},
    ranking::{self, ProbeOptions, ProbedRelay, Ranking, Selection},
};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let message = e.to_string();
            eprintln!("{}", message.lines().next().unwrap_or_default());
            std::process::exit(1);
        }
    };

    init_tracing();

    if let Err(e) = run(cli) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Validate everything before touching the network.
    let plan = cli.plan()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    rt.block_on(execute(plan))
}

async fn execute(plan: Plan) -> anyhow::Result<()> {
    let relays = plan.cache.load(plan.refresh).await?;
    tracing::debug!(count = relays.len(), "Loaded relay list");

    let relays = plan.conditions.apply(&relays);
    if relays.is_empty() {
        return Err(Error::NoRelays.into());
    }

    let table = Table::new(&plan.attributes, Ranking::untested(relays.clone()).relays());
    let live = !plan.quiet && !plan.descending;
    let print_row = |relay: &ProbedRelay| {
        if live {
            println!("{}", table.row(relay));
        }
    };

    if live {
        println!("{}", table.top());
    }

    let ranking = if plan.ping {
        let pinger = SystemPing::new(&plan.ping_program, Platform::current());
        let options = ProbeOptions {
            family: plan.family,
            timeout: plan.timeout,
            concurrency: plan.jobs,
        };
        ranking::probe(relays, &pinger, &options, print_row).await?
    } else {
        let ranking = Ranking::untested(relays);
        ranking.relays().iter().for_each(print_row);
        ranking
    };

    if live {
        println!("{}\n", table.bottom());
    }

    if plan.descending {
        println!("{}\n", table.render(ranking.descending()));
    }

    ranking.ensure_reachable()?;

    if ranking.is_tested() {
        if let (Some(highest), Some(lowest)) = (ranking.highest(), ranking.lowest()) {
            println!(
                "Highest latency host: {} ({})",
                highest.hostname(),
                highest.round_trip_time.map(format_raw_latency).unwrap_or_default()
            );
            println!(
                "Lowest latency host: {} ({})",
                lowest.hostname(),
                lowest.round_trip_time.map(format_raw_latency).unwrap_or_default()
            );
        }
    }

    let Some(selection) = plan.selection else {
        return Ok(());
    };

    let chosen = ranking.select(selection, &mut rand::thread_rng())?;
    match selection {
        Selection::Lowest => println!("\nSelecting lowest latency server"),
        Selection::Random => println!("\nSelecting random server"),
    }

    MullvadCli::new(plan.mullvad_program)
        .set_relay(chosen.hostname())
        .await?;

    Ok(())
}
