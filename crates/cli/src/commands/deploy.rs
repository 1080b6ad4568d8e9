use super::ServiceArgs;
use colored::Colorize;
use privacypass_config_core::{AppConfig, DeployPlan, Prepared, Workspace};

pub async fn run(args: ServiceArgs) -> anyhow::Result<()> {
    let app = AppConfig::load(&args.config)?;
    let workspace = Workspace::new(&app.directory)?;

    // Every requested service must be deployable before anything is touched
    let mut plans = Vec::new();
    for name in args.selected() {
        let config = app.require(name)?;
        plans.push((config, DeployPlan::new(name, config)?));
    }

    for (config, plan) in plans {
        println!("{} Deploying {}...", "▶".blue(), plan.service);

        match workspace.prepare(plan.service, config).await? {
            Prepared::Local(workdir) => {
                plan.run(&workdir).await?;
                println!("{} {} deployed", "✓".green(), plan.service.to_string().bold());
            }
            Prepared::External(url) => {
                println!(
                    "{} {} is hosted at {}, skipping deployment",
                    "⚠".yellow(),
                    plan.service,
                    url.as_str().cyan()
                );
            }
        }
    }

    println!();
    println!("{} Services deployed successfully.", "✓".green());
    Ok(())
}
