use super::ServiceArgs;
use colored::Colorize;
use privacypass_config_core::{AppConfig, Prepared, TestPlan, Workspace};

pub async fn run(args: ServiceArgs) -> anyhow::Result<()> {
    let app = AppConfig::load(&args.config)?;
    let workspace = Workspace::new(&app.directory)?;

    let mut plans = Vec::new();
    for name in args.selected() {
        let config = app.require(name)?;
        plans.push((config, TestPlan::new(name, config)?));
    }

    for (config, plan) in plans {
        println!("{} Testing {}...", "▶".blue(), plan.service);

        match workspace.prepare(plan.service, config).await? {
            Prepared::Local(workdir) => {
                plan.run(&workdir).await?;
            }
            Prepared::External(url) => {
                println!(
                    "{} {} is hosted at {}, skipping end-to-end tests",
                    "⚠".yellow(),
                    plan.service,
                    url.as_str().cyan()
                );
            }
        }
    }

    println!();
    println!("{} Services tested successfully.", "✓".green());
    Ok(())
}
