use anyhow::Result;
use bm_core::config::PipelineConfig;
use clap::Parser;

pub mod cli;
pub mod pipeline;
pub mod plot;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    // 3. Charger la config et appliquer les overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    // 4. Pipeline complet
    let summary = pipeline::run(&config)?;

    // 5. Rapport console
    println!(
        "Samples : {} train / {} test ({} features, {} classes)",
        summary.train_rows,
        summary.test_rows,
        summary.feature_width,
        config.dataset.n_classes
    );
    println!();
    println!("Training loss");
    print!(
        "{}",
        plot::LossCurve::new(&summary.history.loss, cli.plot_width, 12)
    );
    if let (Some(loss), Some(acc)) = (
        summary.history.final_loss(),
        summary.history.accuracy.last(),
    ) {
        println!("final loss {loss:.4} - binary accuracy {acc:.4}");
    }
    println!();
    print!("{}", summary.report);
    println!();
    println!("Confusion matrix");
    print!("{}", summary.report.confusion());

    Ok(())
}

/// Load `--config` if it exists, defaults otherwise.
fn resolve_config(cli: &cli::Cli) -> Result<PipelineConfig> {
    if cli.config.exists() {
        bm_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(PipelineConfig::default())
    }
}
