use std::io::{self, Stdout, Write};
use std::time::Instant;

use crossterm::style::Print;
use crossterm::{cursor, execute, terminal};

use gc_core::frame::AsciiFrame;

/// Fenêtre de chauffe avant que le débit mesuré soit significatif.
const RATE_WARMUP_SECS: f64 = 1.0;

/// Sink terminal : raw mode, curseur caché, présentation des frames
/// pré-sérialisées, ligne de stats et comptabilité du débit d'écriture.
///
/// `initialize`/`teardown` encadrent la session ; `Drop` rappelle
/// `teardown` pour que le terminal soit TOUJOURS restauré, même sur une
/// sortie en erreur.
pub struct TerminalSink {
    stdout: Stdout,
    initialized: bool,
    bytes_written: u64,
    started_at: Option<Instant>,
    /// Limite de débit indicative en MB/s. 0 = pas de contrôle.
    max_write_mbps: f64,
    rate_warned: bool,
}

impl TerminalSink {
    /// Crée un sink inactif, sans limite de débit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(0.0)
    }

    /// Crée un sink inactif avec une limite de débit indicative (MB/s).
    #[must_use]
    pub fn with_rate_limit(max_write_mbps: f64) -> Self {
        Self {
            stdout: io::stdout(),
            initialized: false,
            bytes_written: 0,
            started_at: None,
            max_write_mbps: max_write_mbps.max(0.0),
            rate_warned: false,
        }
    }

    /// Passe le terminal en raw mode (pas d'écho, pas de mode canonique),
    /// cache le curseur, efface l'écran et démarre l'horloge de débit.
    ///
    /// # Errors
    /// Propage l'échec d'initialisation du terminal — fatal pour le mode
    /// live.
    pub fn initialize(&mut self) -> io::Result<()> {
        if self.initialized {
            return Ok(());
        }
        terminal::enable_raw_mode()?;
        execute!(
            self.stdout,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All)
        )?;
        self.initialized = true;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Écrit le flux SGR pré-calculé d'une frame et flush.
    ///
    /// # Errors
    /// Une erreur d'écriture sur stdout signifie que le terminal a disparu ;
    /// l'appelant doit déclencher l'arrêt du pipeline.
    pub fn present(&mut self, frame: &AsciiFrame) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.stdout.write_all(&frame.ansi)?;
        self.stdout.flush()?;
        self.bytes_written += frame.ansi.len() as u64;
        self.check_write_rate();
        Ok(())
    }

    /// Affiche la ligne de stats en haut de l'écran sans déplacer le
    /// curseur logique : save / home / write / restore.
    ///
    /// # Errors
    /// Propage les erreurs d'écriture stdout.
    pub fn print_stats(&mut self, line: &str) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        execute!(
            self.stdout,
            cursor::SavePosition,
            cursor::MoveTo(0, 0),
            Print(line),
            cursor::RestorePosition
        )?;
        Ok(())
    }

    /// Total de bytes écrits par `present`.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Débit moyen mesuré depuis `initialize`, en MB/s. 0.0 tant que la
    /// fenêtre de chauffe n'est pas écoulée.
    #[must_use]
    pub fn write_rate_mbps(&self) -> f64 {
        let Some(started_at) = self.started_at else {
            return 0.0;
        };
        let secs = started_at.elapsed().as_secs_f64();
        if secs < RATE_WARMUP_SECS {
            return 0.0;
        }
        self.bytes_written as f64 / secs / 1_000_000.0
    }

    /// --maxwrite est indicatif : un dépassement est signalé une fois, sans
    /// brider la sortie.
    fn check_write_rate(&mut self) {
        if self.rate_warned || self.max_write_mbps <= 0.0 {
            return;
        }
        if self.write_rate_mbps() > self.max_write_mbps {
            log::warn!(
                "Débit terminal au-dessus de la limite indicative de {} MB/s",
                self.max_write_mbps
            );
            self.rate_warned = true;
        }
    }

    /// Restaure le terminal : SGR reset, curseur visible, raw mode coupé.
    pub fn teardown(&mut self) {
        if !self.initialized {
            return;
        }
        let _ = self.stdout.write_all(b"\x1b[0m");
        let _ = execute!(self.stdout, cursor::Show);
        let _ = self.stdout.flush();
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("Sortie du raw mode impossible : {e}");
        }
        self.initialized = false;
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_sink_is_inert() {
        let mut sink = TerminalSink::new();
        let frame = AsciiFrame::new(2, 2, 0.0);
        // Sans initialize(), aucun byte ne part vers stdout.
        sink.present(&frame).unwrap();
        sink.print_stats("FPS: 0.0").unwrap();
        assert_eq!(sink.bytes_written(), 0);
        assert_eq!(sink.write_rate_mbps(), 0.0);
        sink.teardown();
    }

    #[test]
    fn write_rate_is_zero_before_initialize() {
        let sink = TerminalSink::with_rate_limit(100.0);
        // Pas d'horloge tant que la session n'a pas démarré.
        assert_eq!(sink.write_rate_mbps(), 0.0);
    }

    #[test]
    fn rate_check_is_silent_without_limit() {
        let mut sink = TerminalSink::new();
        sink.bytes_written = u64::MAX / 2;
        sink.started_at = Some(Instant::now());
        sink.check_write_rate();
        assert!(!sink.rate_warned, "sans limite, jamais d'avertissement");
    }

    #[test]
    fn rate_check_warns_once_past_warmup() {
        let mut sink = TerminalSink::with_rate_limit(1.0);
        // Session démarrée il y a 2 s, 100 MB écrits → 50 MB/s mesurés.
        sink.started_at = Some(Instant::now() - std::time::Duration::from_secs(2));
        sink.bytes_written = 100_000_000;
        assert!(sink.write_rate_mbps() > 1.0);
        sink.check_write_rate();
        assert!(sink.rate_warned);
    }
}
