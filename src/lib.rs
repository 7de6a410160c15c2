// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod source;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::SchedulerSection;
use crate::config::loader::load_and_validate;
use crate::dag::{DependencyGraph, SchedulerOptions, build_dependency_graph, cyclic_components};
use crate::errors::Result;
use crate::exec::{BoundedRetry, CreateResource, Executor, NoRetry, RetryPolicy, ShellCreator};
use crate::report::SchedulingReport;
use crate::source::{ManifestSource, RecordSource, ResourceFilter};
use crate::types::UnknownReferencePolicy;

/// Everything that shapes one [`schedule`] call apart from its collaborators.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    pub unknown_reference_policy: UnknownReferencePolicy,
    pub scheduler: SchedulerOptions,
    /// Deadline for the whole run. Reaching it cancels like Ctrl-C does.
    pub timeout: Option<Duration>,
}

impl ScheduleOptions {
    /// Options as described by a manifest's `[scheduler]` table.
    pub fn from_section(section: &SchedulerSection) -> Self {
        let retry_policy: Arc<dyn RetryPolicy> = if section.max_attempts > 1 {
            Arc::new(BoundedRetry::new(section.max_attempts, section.retry_backoff()))
        } else {
            Arc::new(NoRetry)
        };

        Self {
            unknown_reference_policy: section.unknown_reference_policy,
            scheduler: SchedulerOptions {
                max_in_flight: section.max_in_flight,
                retry_policy,
            },
            timeout: section.timeout(),
        }
    }
}

/// Build the dependency graph from `source`, refuse it if it has cycles, and
/// otherwise create every resource in dependency order.
///
/// A cyclic graph is not an `Err`: the returned report lists the cycles and
/// nothing is created. `Err` is reserved for failures to build the graph at
/// all (unreadable source, unknown reference under the `Fail` policy).
pub async fn schedule(
    source: &dyn RecordSource,
    filter: Option<&dyn ResourceFilter>,
    creator: Arc<dyn CreateResource>,
    options: ScheduleOptions,
) -> Result<SchedulingReport> {
    schedule_until(source, filter, creator, options, std::future::pending()).await
}

/// Like [`schedule`], but `shutdown` resolving cancels the run.
pub async fn schedule_until<F>(
    source: &dyn RecordSource,
    filter: Option<&dyn ResourceFilter>,
    creator: Arc<dyn CreateResource>,
    options: ScheduleOptions,
    shutdown: F,
) -> Result<SchedulingReport>
where
    F: Future<Output = ()>,
{
    let graph = build_dependency_graph(source, filter, options.unknown_reference_policy)?;
    info!(
        resources = graph.len(),
        dependencies = graph.edge_count(),
        "dependency graph built"
    );

    let cycles = graph.cycles();
    if !cycles.is_empty() {
        let cycles: Vec<Vec<String>> = cycles.iter().map(|c| c.keys(&graph)).collect();
        error!(?cycles, "dependency graph has cycles; nothing will be created");
        return Ok(SchedulingReport::rejected(&graph, cycles));
    }

    let executor = Executor::new(creator).with_options(options.scheduler);

    match options.timeout {
        Some(timeout) => {
            let deadline = async move {
                tokio::select! {
                    _ = shutdown => {}
                    _ = tokio::time::sleep(timeout) => {
                        warn!(?timeout, "run deadline reached; cancelling");
                    }
                }
            };
            executor.run_until(graph, deadline).await
        }
        None => executor.run_until(graph, shutdown).await,
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading and the optional selector
/// - dry-run printing, or
/// - a real run through [`ShellCreator`] with Ctrl-C cancellation
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let manifest = load_and_validate(&args.manifest)
        .with_context(|| format!("loading manifest {}", args.manifest.display()))?;

    let mut options = ScheduleOptions::from_section(&manifest.scheduler);
    if let Some(n) = args.max_in_flight {
        options.scheduler.max_in_flight = Some(n);
    }
    if let Some(timeout) = args.timeout {
        options.timeout = Some(timeout);
    }

    let source = ManifestSource::new(manifest);
    let filter = args.selector.as_ref().map(|s| s as &dyn ResourceFilter);

    if args.dry_run {
        let graph = build_dependency_graph(&source, filter, options.unknown_reference_policy)?;
        print_dry_run(&graph, &options)?;
        return Ok(());
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received");
    };

    let report = schedule_until(&source, filter, Arc::new(ShellCreator::new()), options, ctrl_c).await?;

    println!("kubedag report");
    print!("{report}");

    report.into_result()?;
    Ok(())
}

/// Print resources, edges and either creation waves or the detected cycles.
fn print_dry_run(graph: &DependencyGraph, options: &ScheduleOptions) -> Result<()> {
    println!("kubedag dry-run");
    println!(
        "  scheduler.unknown_reference_policy = {:?}",
        options.unknown_reference_policy
    );
    match options.scheduler.max_in_flight {
        Some(n) => println!("  scheduler.max_in_flight = {n}"),
        None => println!("  scheduler.max_in_flight = unbounded"),
    }
    if let Some(timeout) = options.timeout {
        println!("  scheduler.timeout = {timeout:?}");
    }
    println!();

    println!("resources ({}):", graph.len());
    for (_, node) in graph.iter() {
        println!("  - {}", node.key());
        let def = node.definition();
        if !def.labels.is_empty() {
            println!("      labels: {:?}", def.labels);
        }
        if let Some(ref cmd) = def.payload.cmd {
            println!("      cmd: {cmd}");
        }
        if !node.requires().is_empty() {
            println!("      requires: {:?}", graph.keys_of(node.requires()));
        }
    }
    println!();

    let cycles = graph.cycles();
    if cycles.is_empty() {
        let waves = graph.creation_waves()?;
        println!("creation waves ({}):", waves.len());
        for (i, wave) in waves.iter().enumerate() {
            println!("  {}: {}", i + 1, wave.join(", "));
        }
    } else {
        println!("cycles ({}):", cycles.len());
        for cycle in &cycles {
            println!("  - {}", cycle.keys(graph).join(" -> "));
        }
        println!("cyclic components:");
        for component in cyclic_components(graph) {
            println!("  - {}", component.join(", "));
        }
    }

    debug!("dry-run complete (nothing created)");
    Ok(())
}
