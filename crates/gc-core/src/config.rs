use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Mode de rendu couleur.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Niveaux de gris, émis en truecolor `g;g;g`.
    Gray,
    /// Quantification sur la palette xterm-256.
    Ansi256,
    /// Couleur directe 24 bits.
    TrueColor,
}

/// Mode de tramage ordonné.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DitherMode {
    /// Pas de tramage (seuil 0).
    Off,
    /// Matrice de Bayer 2×2.
    Bayer2,
    /// Matrice de Bayer 4×4.
    Bayer4,
}

/// Bornes de la correction gamma.
pub const GAMMA_MIN: f32 = 0.5;
/// Borne haute gamma.
pub const GAMMA_MAX: f32 = 4.0;
/// Bornes du contraste.
pub const CONTRAST_MIN: f32 = 0.2;
/// Borne haute contraste.
pub const CONTRAST_MAX: f32 = 3.0;

/// Configuration du renderer de glyphes.
///
/// Mutée uniquement par le plan de contrôle ; le renderer lit un snapshot
/// atomique par frame (voir `gc-ascii`).
///
/// # Example
/// ```
/// use gc_core::config::RendererConfig;
/// let config = RendererConfig::default();
/// assert_eq!(config.grid_cols, 120);
/// assert_eq!(config.grid_rows, 60);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct RendererConfig {
    /// Mode couleur courant.
    pub mode: RenderMode,
    /// Tramage courant.
    pub dither: DitherMode,
    /// Doubler la résolution verticale avec le glyphe `▄`.
    pub half_block: bool,
    /// Largeur de la grille de sortie, en cellules.
    pub grid_cols: u16,
    /// Hauteur de la grille de sortie, en cellules.
    pub grid_rows: u16,
    /// Gamma ∈ [0.5, 4.0].
    pub gamma: f32,
    /// Contraste ∈ [0.2, 3.0].
    pub contrast: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Ansi256,
            dither: DitherMode::Bayer4,
            half_block: false,
            grid_cols: 120,
            grid_rows: 60,
            gamma: 2.2,
            contrast: 1.0,
        }
    }
}

impl RendererConfig {
    /// Ramène gamma et contraste dans leurs bornes légales.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.gamma = self.gamma.clamp(GAMMA_MIN, GAMMA_MAX);
        self.contrast = self.contrast.clamp(CONTRAST_MIN, CONTRAST_MAX);
        self.grid_cols = self.grid_cols.max(1);
        self.grid_rows = self.grid_rows.max(1);
        self
    }
}

/// Valeurs optionnelles chargées depuis un fichier TOML (`--config`).
///
/// Chaque champ absent garde le défaut built-in ; les flags CLI explicites
/// écrasent les valeurs du fichier.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FileConfig {
    /// Mode de rendu initial.
    pub mode: Option<RenderMode>,
    /// Tramage initial.
    pub dither: Option<DitherMode>,
    /// Half-block initial.
    pub half_block: Option<bool>,
    /// Largeur de grille.
    pub grid_cols: Option<u16>,
    /// Hauteur de grille.
    pub grid_rows: Option<u16>,
    /// Gamma initial.
    pub gamma: Option<f32>,
    /// Contraste initial.
    pub contrast: Option<f32>,
    /// FPS de pacing (0 = pts source).
    pub fps: Option<f64>,
    /// Volume en pourcents [0, 200].
    pub volume: Option<u32>,
    /// Afficher la ligne de stats.
    pub stats: Option<bool>,
}

/// Charge un fichier de configuration TOML.
///
/// # Errors
/// `CoreError::Io` si le fichier est illisible, `Config` s'il est mal
/// formé, `InvalidDimensions` si une grille nulle y est déclarée.
pub fn load_config(path: &Path) -> Result<FileConfig, CoreError> {
    let text = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: FileConfig = toml::from_str(&text)
        .map_err(|e| CoreError::Config(format!("{} : {e}", path.display())))?;
    if parsed.grid_cols == Some(0) || parsed.grid_rows == Some(0) {
        return Err(CoreError::InvalidDimensions {
            cols: parsed.grid_cols.unwrap_or(0),
            rows: parsed.grid_rows.unwrap_or(0),
        });
    }
    Ok(parsed)
}
