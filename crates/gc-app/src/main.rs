use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;

pub mod cli;
pub mod pipeline;

fn main() -> Result<()> {
    // 1. Parser la CLI. --help/--version sortent en 0 ; un argument inconnu
    //    ou invalide sort en 1.
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return Ok(());
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    // 2. Initialiser le logging (stderr).
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config fichier optionnelle.
    let file_config = match cli.config {
        Some(ref path) => gc_core::config::load_config(path)?,
        None => gc_core::config::FileConfig::default(),
    };

    // 4. Résoudre la configuration effective (défauts ← fichier ← flags).
    let config = cli.resolve(&file_config);

    // 5. Construire puis faire tourner le pipeline. Toute erreur
    //    d'initialisation remonte ici et sort en code 1.
    let input = cli.input.to_string_lossy().into_owned();
    let mut pipeline = pipeline::Pipeline::initialize(&input, config)?;
    pipeline.run()?;

    Ok(())
}
