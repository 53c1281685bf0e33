use std::path::PathBuf;

use clap::Parser;

use gc_core::config::{DitherMode, FileConfig, RenderMode, RendererConfig};
use gc_export::ExportConfig;

use crate::pipeline::PipelineConfig;

/// glyphcast — joue des fichiers vidéo en glyphes colorés dans le terminal.
///
/// Contrôles : espace pause, q quitte, c/d cyclent mode et dithering,
/// g/G et b/B ajustent gamma et contraste, 1/2/3 fixent le mode.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier vidéo d'entrée.
    pub input: PathBuf,

    /// Mode de rendu initial : gray, 256, truecolor.
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<RenderMode>,

    /// Dimensions de la grille de sortie, COLSxROWS.
    #[arg(long, value_parser = parse_dimensions)]
    pub grid: Option<(u16, u16)>,

    /// Doublement vertical half-block : on, off.
    #[arg(long, value_parser = parse_switch)]
    pub halfblock: Option<bool>,

    /// FPS de pacing forcé (0 = suivre les pts de la source).
    #[arg(long)]
    pub fps: Option<f64>,

    /// Désactiver l'audio.
    #[arg(long, default_value_t = false)]
    pub no_audio: bool,

    /// Volume audio en pourcents [0, 200].
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=200))]
    pub volume: Option<u32>,

    /// Mode export : encode la sortie ASCII vers ce fichier.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Grille d'export, COLSxROWS (défaut : la grille de rendu).
    #[arg(long, value_parser = parse_dimensions)]
    pub export_grid: Option<(u16, u16)>,

    /// Taille d'une cellule exportée en pixels, WxH.
    #[arg(long, value_parser = parse_dimensions)]
    pub export_font: Option<(u16, u16)>,

    /// CRF H.264 [0, 51].
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=51))]
    pub export_crf: Option<u8>,

    /// Frame rate d'export.
    #[arg(long)]
    pub export_fps: Option<f64>,

    /// Tramage initial : off, bayer2, bayer4.
    #[arg(long, value_parser = parse_dither)]
    pub dither: Option<DitherMode>,

    /// Gamma initial [0.5, 4.0].
    #[arg(long)]
    pub gamma: Option<f32>,

    /// Contraste initial [0.2, 3.0].
    #[arg(long)]
    pub contrast: Option<f32>,

    /// Débit terminal maximal en MB/s (indicatif).
    #[arg(long)]
    pub maxwrite: Option<f64>,

    /// Afficher la ligne de stats en haut de l'écran.
    #[arg(long, default_value_t = false)]
    pub stats: bool,

    /// Fichier de configuration TOML optionnel.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

fn parse_mode(value: &str) -> Result<RenderMode, String> {
    match value {
        "gray" => Ok(RenderMode::Gray),
        "256" => Ok(RenderMode::Ansi256),
        "truecolor" => Ok(RenderMode::TrueColor),
        other => Err(format!("mode inconnu : {other} (gray, 256, truecolor)")),
    }
}

fn parse_dither(value: &str) -> Result<DitherMode, String> {
    match value {
        "off" => Ok(DitherMode::Off),
        "bayer2" => Ok(DitherMode::Bayer2),
        "bayer4" => Ok(DitherMode::Bayer4),
        other => Err(format!("dither inconnu : {other} (off, bayer2, bayer4)")),
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("valeur invalide : {other} (on, off)")),
    }
}

/// Parse une dimension `WxH`, les deux composantes strictement positives.
fn parse_dimensions(value: &str) -> Result<(u16, u16), String> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| format!("dimension invalide : {value} (attendu WxH)"))?;
    let w: u16 = w.parse().map_err(|_| format!("largeur invalide : {w}"))?;
    let h: u16 = h.parse().map_err(|_| format!("hauteur invalide : {h}"))?;
    if w == 0 || h == 0 {
        return Err(format!("dimension nulle : {value}"));
    }
    Ok((w, h))
}

impl Cli {
    /// Résout la configuration effective : défauts ← fichier ← flags CLI.
    #[must_use]
    pub fn resolve(&self, file: &FileConfig) -> PipelineConfig {
        let defaults = RendererConfig::default();
        let mut renderer = RendererConfig {
            mode: self.mode.or(file.mode).unwrap_or(defaults.mode),
            dither: self.dither.or(file.dither).unwrap_or(defaults.dither),
            half_block: self
                .halfblock
                .or(file.half_block)
                .unwrap_or(defaults.half_block),
            grid_cols: self
                .grid
                .map(|(c, _)| c)
                .or(file.grid_cols)
                .unwrap_or(defaults.grid_cols),
            grid_rows: self
                .grid
                .map(|(_, r)| r)
                .or(file.grid_rows)
                .unwrap_or(defaults.grid_rows),
            gamma: self.gamma.or(file.gamma).unwrap_or(defaults.gamma),
            contrast: self.contrast.or(file.contrast).unwrap_or(defaults.contrast),
        }
        .clamped();

        let target_fps = self.fps.or(file.fps).unwrap_or(0.0).max(0.0);
        let volume_percent = self.volume.or(file.volume).unwrap_or(100).min(200);

        let export = self.export.as_ref().map(|output| {
            // La grille d'export remplace la grille de rendu : la frame
            // rasterisée et l'encodeur doivent toujours être d'accord.
            let (grid_cols, grid_rows) = self
                .export_grid
                .unwrap_or((renderer.grid_cols, renderer.grid_rows));
            let (font_w, font_h) = self.export_font.unwrap_or((8, 16));
            let fps = self
                .export_fps
                .or(if target_fps > 0.0 { Some(target_fps) } else { None })
                .unwrap_or(30.0);
            ExportConfig {
                output: output.clone(),
                grid_cols,
                grid_rows,
                font_w: u32::from(font_w),
                font_h: u32::from(font_h),
                crf: self.export_crf.unwrap_or(18),
                fps,
            }
        });
        if let Some(ref export) = export {
            renderer.grid_cols = export.grid_cols;
            renderer.grid_rows = export.grid_rows;
        }

        PipelineConfig {
            renderer,
            audio_enabled: !self.no_audio && export.is_none(),
            volume: volume_percent as f32 / 100.0,
            target_fps,
            show_stats: self.stats || file.stats.unwrap_or(false),
            max_write_mbps: self.maxwrite.unwrap_or(100.0),
            export,
        }
    }
}
