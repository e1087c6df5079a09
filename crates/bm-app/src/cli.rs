use std::path::PathBuf;

use bm_core::config::PipelineConfig;
use clap::Parser;

/// bulkclass: bulk material classification from structure-borne sound.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Dossier des enregistrements (remplace dataset.data_dir).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Nombre d'epochs d'entraînement.
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Taille des mini-batches.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Graine du split train/test et de l'entraînement.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Largeur du graphe de perte, en colonnes.
    #[arg(long, default_value_t = 60)]
    pub plot_width: usize,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(ref dir) = self.data_dir {
            config.dataset.data_dir.clone_from(dir);
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(seed) = self.seed {
            config.dataset.split_seed = seed;
            config.training.seed = seed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "bulkclass",
            "--epochs",
            "3",
            "--batch-size",
            "16",
            "--seed",
            "7",
            "--data-dir",
            "/tmp/ramp",
        ]);
        let mut config = PipelineConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.dataset.split_seed, 7);
        assert_eq!(config.dataset.data_dir, PathBuf::from("/tmp/ramp"));
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::parse_from(["bulkclass"]);
        let mut config = PipelineConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.training.epochs, 200);
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        assert_eq!(cli.log_level, "info");
    }
}
