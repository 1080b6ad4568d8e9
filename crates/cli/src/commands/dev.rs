use super::DevArgs;
use colored::Colorize;
use privacypass_config_core::{
    lifecycle, shutdown, AppConfig, Deployments, Prepared, RunningServices, Workspace,
};

pub async fn run(args: DevArgs) -> anyhow::Result<()> {
    let app = AppConfig::load(&args.config)?;
    let deployments = Deployments::resolve_all(&app)?;
    let workspace = Workspace::new(&app.directory)?;
    let running = RunningServices::new();

    let started = tokio::select! {
        result = start_all(&app, &deployments, &workspace, &running) => result,
        () = shutdown::interrupted() => {
            shutdown::shutdown(&running);
            return Ok(());
        }
    };

    if let Err(e) = started {
        // Don't leave detached process groups behind
        shutdown::shutdown(&running);
        return Err(e);
    }

    println!();
    println!(
        "{} Services started successfully. Press {} to stop them.",
        "✓".green(),
        "Ctrl+C".bold()
    );

    shutdown::interrupted().await;
    println!("{} Stopping services...", "■".red());
    shutdown::shutdown(&running);
    Ok(())
}

/// Prepare and start every declared service, in declaration order.
async fn start_all(
    app: &AppConfig,
    deployments: &Deployments,
    workspace: &Workspace,
    running: &RunningServices,
) -> anyhow::Result<()> {
    for (name, config) in app.services() {
        println!("{} Preparing {}...", "▶".blue(), name);

        match workspace.prepare(name, config).await? {
            Prepared::Local(workdir) => {
                let pgid = lifecycle::start(name, deployments, &workdir, running).await?;
                println!(
                    "{} {} running on {} (process group {})",
                    "✓".green(),
                    name.to_string().bold(),
                    deployments.get(name).base_url().cyan(),
                    pgid
                );
            }
            Prepared::External(url) => {
                println!(
                    "{} {} is hosted at {}, not starting it locally",
                    "ℹ".blue(),
                    name,
                    url.as_str().cyan()
                );
            }
        }
    }
    Ok(())
}
