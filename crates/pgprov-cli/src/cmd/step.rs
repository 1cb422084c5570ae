use crate::output::print_json;
use anyhow::{anyhow, bail, Context};
use pgprov_core::config::Config;
use pgprov_core::lifecycle::Lifecycle;
use pgprov_core::types::{Step, StepOutput};
use pgprov_core::workspace::Workspace;
use std::path::Path;

/// Run one tool-backed step to completion in the foreground.
///
/// The configured timeout applies here exactly as it does for API jobs.
/// Ctrl-C drops the step, which kills the running tool.
pub fn run(root: &Path, step: Step, json: bool) -> anyhow::Result<()> {
    if !step.runs_tool() {
        bail!("'{step}' does not run an external tool");
    }
    let config = Config::load(root).context("failed to load pgprov.yaml")?;
    let ws = Workspace::from_config(root, &config);
    let timeout = config.timeouts.for_step(step);
    let lifecycle = Lifecycle::system(config);

    let rt = tokio::runtime::Runtime::new()?;
    let out = rt.block_on(async {
        let work = execute(&lifecycle, &ws, step);
        let bounded = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(r) => r,
                    Err(_) => Err(anyhow!("{step} timed out after {}s", limit.as_secs())),
                },
                None => work.await,
            }
        };
        tokio::select! {
            r = bounded => r,
            _ = tokio::signal::ctrl_c() => {
                Err(anyhow!("{step} interrupted; infrastructure state may be indeterminate"))
            }
        }
    })?;

    if json {
        print_json(&out)?;
    } else {
        if !out.stdout.is_empty() {
            println!("{}", out.stdout.trim_end());
        }
        if !out.stderr.is_empty() {
            eprintln!("{}", out.stderr.trim_end());
        }
        println!("{} ({:.1}s)", out.message, out.duration_seconds);
    }
    Ok(())
}

async fn execute(lifecycle: &Lifecycle, ws: &Workspace, step: Step) -> anyhow::Result<StepOutput> {
    let out = match step {
        Step::Init => lifecycle.init(ws).await?,
        Step::Plan => lifecycle.plan(ws).await?,
        Step::Apply => lifecycle.apply(ws).await?,
        Step::ConfigureDatabase => lifecycle.configure_database(ws).await?,
        Step::Generate => bail!("'{step}' does not run an external tool"),
    };
    Ok(out)
}
