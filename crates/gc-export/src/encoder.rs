use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use thiserror::Error;

use gc_core::frame::AsciiFrame;

use crate::rasterizer::Rasterizer;

/// Paramètres du mode export.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Fichier de sortie (l'extension choisit le conteneur).
    pub output: PathBuf,
    /// Largeur de grille exportée, en cellules.
    pub grid_cols: u16,
    /// Hauteur de grille exportée, en cellules.
    pub grid_rows: u16,
    /// Largeur d'une cellule, en pixels.
    pub font_w: u32,
    /// Hauteur d'une cellule, en pixels.
    pub font_h: u32,
    /// CRF H.264 [0, 51].
    pub crf: u8,
    /// Frame rate de sortie (pts = index de frame).
    pub fps: f64,
}

/// Errors originating from the export encoder.
#[derive(Error, Debug)]
pub enum ExportError {
    /// ffmpeg impossible à lancer (absent du PATH ?).
    #[error("Échec du lancement de l'encodeur ffmpeg (est-il dans le PATH ?) : {0}")]
    Spawn(std::io::Error),

    /// Échec d'écriture d'une frame dans le pipe (frame abandonnée).
    #[error("Écriture de frame vers l'encodeur échouée : {0}")]
    Encode(std::io::Error),

    /// La grille de la frame ne correspond pas aux dimensions de l'encodeur.
    #[error("Grille {got_cols}×{got_rows} incompatible avec l'export {want_cols}×{want_rows}")]
    DimensionMismatch {
        /// Largeur reçue.
        got_cols: u16,
        /// Hauteur reçue.
        got_rows: u16,
        /// Largeur attendue.
        want_cols: u16,
        /// Hauteur attendue.
        want_rows: u16,
    },

    /// L'encodeur a signalé une erreur à la finalisation.
    #[error("ffmpeg encoder error: {0}")]
    Finish(String),
}

/// Encode les frames ASCII rasterisées en H.264 via un process ffmpeg
/// nourri en rawvideo RGB24 sur stdin.
///
/// `close` ferme stdin (drain de l'encodeur, écriture du trailer) puis
/// attend le process.
pub struct Exporter {
    child: Option<Child>,
    rasterizer: Rasterizer,
    config: ExportConfig,
    rgb: Vec<u8>,
    frames_written: u64,
}

impl Exporter {
    /// Lance l'encodeur.
    ///
    /// # Errors
    /// `ExportError::Spawn` si ffmpeg ne démarre pas.
    pub fn open(config: ExportConfig) -> Result<Self, ExportError> {
        let rasterizer = Rasterizer::new(config.font_w, config.font_h);
        let (width, height) = rasterizer.target_dimensions(config.grid_cols, config.grid_rows);
        let fps = if config.fps > 0.0 { config.fps } else { 30.0 };

        let child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-vcodec",
                "rawvideo",
                "-s",
                &format!("{width}x{height}"),
                "-pix_fmt",
                "rgb24",
                "-r",
                &format!("{fps}"),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-crf",
                &config.crf.min(51).to_string(),
                "-pix_fmt",
                "yuv420p",
                "-hide_banner",
                "-loglevel",
                "error",
            ])
            .arg(&config.output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExportError::Spawn)?;

        log::info!(
            "Export ouvert : {} ({width}×{height} @ {fps} fps, crf {})",
            config.output.display(),
            config.crf
        );

        Ok(Self {
            child: Some(child),
            rasterizer,
            config,
            rgb: Vec::new(),
            frames_written: 0,
        })
    }

    /// Rasterise une frame et la pousse dans l'encodeur
    /// (pts implicite = index de frame, cadencé par `-r`).
    ///
    /// # Errors
    /// `Encode` sur échec d'écriture du pipe ; l'appelant journalise et
    /// continue (la frame est perdue, le pipeline survit).
    pub fn write_frame(&mut self, frame: &AsciiFrame) -> Result<(), ExportError> {
        if frame.cols != self.config.grid_cols || frame.rows != self.config.grid_rows {
            return Err(ExportError::DimensionMismatch {
                got_cols: frame.cols,
                got_rows: frame.rows,
                want_cols: self.config.grid_cols,
                want_rows: self.config.grid_rows,
            });
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        self.rasterizer.render_into(frame, &mut self.rgb);
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(&self.rgb).map_err(ExportError::Encode)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Nombre de frames effectivement encodées.
    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Ferme stdin, draine l'encodeur et attend le trailer.
    ///
    /// # Errors
    /// `Finish` si ffmpeg sort en erreur.
    pub fn close(&mut self) -> Result<(), ExportError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        drop(child.stdin.take());
        let output = child.wait_with_output().map_err(ExportError::Encode)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Finish(stderr.into_owned()));
        }
        log::info!("Export terminé : {} frames", self.frames_written);
        Ok(())
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Fermeture de l'export : {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_may_fail_without_ffmpeg() {
        // L'issue dépend de la présence de ffmpeg dans l'environnement.
        // Les deux cas sont valides — l'important est l'absence de panique
        // et un fichier nettoyé derrière soi.
        let path = std::env::temp_dir().join("glyphcast-export-test.mp4");
        let config = ExportConfig {
            output: path.clone(),
            grid_cols: 4,
            grid_rows: 2,
            font_w: 8,
            font_h: 16,
            crf: 18,
            fps: 30.0,
        };
        if let Ok(mut exporter) = Exporter::open(config) {
            let frame = AsciiFrame::new(4, 2, 0.0);
            let _ = exporter.write_frame(&frame);
            let _ = exporter.close();
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        // Pas besoin de ffmpeg : le check des dimensions précède le pipe.
        let config = ExportConfig {
            output: PathBuf::from("unused.mp4"),
            grid_cols: 4,
            grid_rows: 2,
            font_w: 8,
            font_h: 16,
            crf: 18,
            fps: 30.0,
        };
        let mut exporter = Exporter {
            child: None,
            rasterizer: Rasterizer::new(config.font_w, config.font_h),
            config,
            rgb: Vec::new(),
            frames_written: 0,
        };
        let frame = AsciiFrame::new(3, 2, 0.0);
        assert!(matches!(
            exporter.write_frame(&frame),
            Err(ExportError::DimensionMismatch { .. })
        ));
    }
}
