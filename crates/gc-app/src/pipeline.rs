use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use gc_ascii::AsciiRenderer;
use gc_audio::{AudioHandle, AudioOutput};
use gc_core::config::RendererConfig;
use gc_core::frame::AsciiFrame;
use gc_core::queue::BoundedQueue;
use gc_export::{ExportConfig, Exporter};
use gc_media::Decoder;
use gc_term::TerminalSink;

/// Profondeur de la file ASCII worker → presenter.
const ASCII_QUEUE_CAP: usize = 8;

/// Sample rate du sink audio, hérité du contrat du décodeur.
const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Canaux du sink audio.
const AUDIO_CHANNELS: u16 = 2;

/// Pas de polling de la pause (presenter) et de l'arrêt (pump).
const PAUSE_POLL: Duration = Duration::from_millis(20);
/// Cadence de polling clavier du plan de contrôle.
const KEY_POLL: Duration = Duration::from_millis(30);

/// Configuration complète du pipeline, résolue depuis la CLI.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Configuration initiale du renderer.
    pub renderer: RendererConfig,
    /// Audio demandé (peut encore être dégradé à l'init).
    pub audio_enabled: bool,
    /// Gain audio configuré (1.0 = 100 %).
    pub volume: f32,
    /// FPS de pacing forcé ; 0 = suivre les pts de la source.
    pub target_fps: f64,
    /// Afficher la ligne de stats.
    pub show_stats: bool,
    /// Débit stdout maximal indicatif, en MB/s.
    pub max_write_mbps: f64,
    /// Mode export si présent.
    pub export: Option<ExportConfig>,
}

/// Compteurs finaux du presenter.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineStats {
    /// Frames présentées ou encodées. Monotone.
    pub rendered: u64,
    /// Frames abandonnées par la politique de sync. Monotone.
    pub dropped: u64,
}

/// Décision de pacing du presenter face à une frame.
#[derive(Debug, PartialEq)]
pub(crate) enum Pace {
    /// Présenter immédiatement.
    Present,
    /// Dormir puis présenter.
    Sleep(Duration),
    /// Abandonner la frame (retard irrécupérable, horloge audio seulement).
    Drop,
}

/// Seuil au-delà duquel on dort avant de présenter.
const SLEEP_THRESHOLD: f64 = 0.010;
/// Retard au-delà duquel on abandonne la frame (chemin audio).
const DROP_THRESHOLD: f64 = -0.050;

/// Politique de sync A/V : `diff = target − clock_now`.
///
/// Ne jamais dropper sur l'horloge murale — sans audio, être en retard ne
/// s'entend pas, on présente simplement en retard.
pub(crate) fn pace(diff: f64, audio_master: bool) -> Pace {
    if diff > SLEEP_THRESHOLD {
        Pace::Sleep(Duration::from_secs_f64(diff))
    } else if audio_master && diff < DROP_THRESHOLD {
        Pace::Drop
    } else {
        Pace::Present
    }
}

/// Orchestrateur : cinq workers longue durée reliés par des files bornées.
///
/// décodeur → VideoQueue(8) → worker ASCII → AsciiQueue(8) → presenter,
/// décodeur → AudioQueue(32) → pump audio → sink. Le plan de contrôle
/// (clavier) mute l'état partagé. Voir `run` pour l'ordre d'arrêt.
pub struct Pipeline {
    decoder: Decoder,
    renderer: Arc<AsciiRenderer>,
    terminal: Option<TerminalSink>,
    exporter: Option<Exporter>,
    audio: Option<AudioHandle>,
    config: PipelineConfig,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    ascii_queue: Arc<BoundedQueue<AsciiFrame>>,
}

impl Pipeline {
    /// Ouvre le décodeur, le sink (terminal ou exporteur) et l'audio.
    ///
    /// L'audio dégrade en warning ; le reste est fatal.
    ///
    /// # Errors
    /// Source illisible, pas de flux vidéo, terminal ou encodeur
    /// indisponible.
    pub fn initialize(input: &str, config: PipelineConfig) -> Result<Self> {
        let decoder = Decoder::open(input, config.audio_enabled)
            .with_context(|| format!("Ouverture de {input} impossible"))?;

        let renderer = Arc::new(AsciiRenderer::new(config.renderer));

        let (terminal, exporter) = if let Some(export_config) = &config.export {
            (None, Some(Exporter::open(export_config.clone())?))
        } else {
            let mut sink = TerminalSink::with_rate_limit(config.max_write_mbps);
            sink.initialize()
                .context("Initialisation du terminal impossible")?;
            (Some(sink), None)
        };

        // Le device lui-même est ouvert dans le thread du pump (le stream
        // cpal y naît et y meurt) ; seule la poignée horloge/volume est
        // créée ici.
        let audio = if config.audio_enabled && decoder.has_audio() {
            Some(AudioHandle::new(AUDIO_SAMPLE_RATE, config.volume))
        } else {
            None
        };

        Ok(Self {
            decoder,
            renderer,
            terminal,
            exporter,
            audio,
            config,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            ascii_queue: Arc::new(BoundedQueue::new(ASCII_QUEUE_CAP)),
        })
    }

    /// Fait tourner le pipeline jusqu'à EOF, touche quitte ou erreur de
    /// sink, puis exécute l'arrêt ordonné : flag baissé, files fermées,
    /// décodeur stoppé, workers joints (ASCII, presenter, pump, contrôle).
    ///
    /// # Errors
    /// Propage un échec de création de thread.
    pub fn run(&mut self) -> Result<PipelineStats> {
        self.running.store(true, Ordering::SeqCst);
        self.decoder
            .start()
            .context("Lancement du thread de décodage impossible")?;

        // --- Worker ASCII : VideoQueue → render → AsciiQueue ---
        let ascii_worker = {
            let video_queue = self.decoder.video_frames();
            let ascii_queue = Arc::clone(&self.ascii_queue);
            let renderer = Arc::clone(&self.renderer);
            thread::Builder::new()
                .name("gc-ascii".to_string())
                .spawn(move || {
                    while let Some(frame) = video_queue.pop() {
                        let ascii = renderer.render(&frame);
                        if !ascii_queue.push(ascii) {
                            break;
                        }
                    }
                    ascii_queue.close();
                })?
        };

        // --- Pump audio : AudioQueue → ring du sink ---
        // Tourne même sans device : il draine la file pour ne pas bloquer
        // le décodeur. Le stream cpal est ouvert ici, dans son thread, et
        // y reste vivant jusqu'à l'arrêt ; un échec d'ouverture dégrade en
        // lecture muette (l'horloge ne démarre jamais, le presenter retombe
        // sur l'horloge murale).
        let audio_handle = self.audio.take();
        let audio_pump = {
            let audio_queue = self.decoder.audio_frames();
            let running = Arc::clone(&self.running);
            let handle = audio_handle.clone();
            thread::Builder::new()
                .name("gc-audio-pump".to_string())
                .spawn(move || {
                    let mut output = handle.as_ref().and_then(|handle| {
                        match AudioOutput::start(AUDIO_SAMPLE_RATE, AUDIO_CHANNELS, handle) {
                            Ok(output) => Some(output),
                            Err(e) => {
                                log::warn!("Audio désactivé : {e}");
                                None
                            }
                        }
                    });
                    while let Some(frame) = audio_queue.pop() {
                        if let Some(sink) = output.as_mut() {
                            sink.enqueue(&frame);
                        }
                    }
                    // Fin du flux décodé : le ring continue de jouer tant
                    // que la présentation n'est pas terminée.
                    while running.load(Ordering::SeqCst) {
                        thread::sleep(PAUSE_POLL);
                    }
                    if let Some(mut sink) = output.take() {
                        sink.stop();
                    }
                })?
        };

        // --- Presenter : AsciiQueue → terminal ou encodeur ---
        let presenter = {
            let ascii_queue = Arc::clone(&self.ascii_queue);
            let running = Arc::clone(&self.running);
            let paused = Arc::clone(&self.paused);
            let mut terminal = self.terminal.take();
            let mut exporter = self.exporter.take();
            let audio_handle = audio_handle.clone();
            let target_fps = self.config.target_fps;
            let show_stats = self.config.show_stats;
            thread::Builder::new()
                .name("gc-present".to_string())
                .spawn(move || {
                    present_loop(
                        &ascii_queue,
                        &running,
                        &paused,
                        terminal.as_mut(),
                        exporter.as_mut(),
                        audio_handle.as_ref(),
                        target_fps,
                        show_stats,
                    )
                    // TerminalSink/Exporter droppés ici : teardown du raw
                    // mode et drain de l'encodeur à la sortie du thread.
                })?
        };

        // --- Plan de contrôle : clavier → état partagé ---
        let control = {
            let running = Arc::clone(&self.running);
            let paused = Arc::clone(&self.paused);
            let renderer = Arc::clone(&self.renderer);
            let audio_handle = audio_handle.clone();
            let video_queue = self.decoder.video_frames();
            let audio_queue = self.decoder.audio_frames();
            let ascii_queue = Arc::clone(&self.ascii_queue);
            let volume = self.config.volume;
            thread::Builder::new()
                .name("gc-control".to_string())
                .spawn(move || {
                    // Fermer toutes les files libère chaque worker bloqué,
                    // jusqu'au décodeur.
                    let close_queues = move || {
                        video_queue.close();
                        audio_queue.close();
                        ascii_queue.close();
                    };
                    control_loop(
                        &running,
                        &paused,
                        &renderer,
                        audio_handle.as_ref(),
                        volume,
                        &close_queues,
                    );
                })?
        };

        // Le presenter est l'étage terminal : sa sortie signale EOF, quit
        // ou sink perdu.
        let stats = presenter.join().unwrap_or_else(|_| {
            log::error!("Le presenter a paniqué");
            PipelineStats::default()
        });

        // Arrêt ordonné.
        self.running.store(false, Ordering::SeqCst);
        self.ascii_queue.close();
        self.decoder.stop();
        if ascii_worker.join().is_err() {
            log::error!("Le worker ASCII a paniqué");
        }
        if audio_pump.join().is_err() {
            log::error!("Le pump audio a paniqué");
        }
        if control.join().is_err() {
            log::error!("Le plan de contrôle a paniqué");
        }

        log::info!(
            "Pipeline terminé : {} rendues, {} abandonnées",
            stats.rendered,
            stats.dropped
        );
        Ok(stats)
    }
}

/// Boucle du presenter. Retourne les compteurs finaux.
#[allow(clippy::too_many_arguments)]
fn present_loop(
    ascii_queue: &BoundedQueue<AsciiFrame>,
    running: &AtomicBool,
    paused: &AtomicBool,
    mut terminal: Option<&mut TerminalSink>,
    mut exporter: Option<&mut Exporter>,
    audio: Option<&AudioHandle>,
    target_fps: f64,
    show_stats: bool,
) -> PipelineStats {
    let mut stats = PipelineStats::default();
    let start = Instant::now();
    let wall_epoch = Instant::now();

    while let Some(frame) = ascii_queue.pop() {
        // En pause : dormir par petits pas, sans avancer les compteurs.
        while paused.load(Ordering::SeqCst) && running.load(Ordering::SeqCst) {
            thread::sleep(PAUSE_POLL);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        if let Some(exporter) = exporter.as_deref_mut() {
            // Mode export : aucun pacing, pts = index de frame.
            if let Err(e) = exporter.write_frame(&frame) {
                log::error!("Export error: {e}");
            }
        } else {
            let target = if target_fps > 0.0 {
                stats.rendered as f64 / target_fps
            } else {
                frame.pts
            };
            let (clock_now, audio_master) = match audio {
                Some(handle) if handle.is_started() => (handle.playback_time(), true),
                _ => (wall_epoch.elapsed().as_secs_f64(), false),
            };
            match pace(target - clock_now, audio_master) {
                Pace::Drop => {
                    stats.dropped += 1;
                    continue;
                }
                Pace::Sleep(duration) => thread::sleep(duration),
                Pace::Present => {}
            }
            if let Some(sink) = terminal.as_deref_mut() {
                if let Err(e) = sink.present(&frame) {
                    // Terminal disparu : tout le pipeline s'arrête.
                    log::error!("Écriture stdout impossible : {e}");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }

        stats.rendered += 1;
        if show_stats {
            publish_stats(
                &stats,
                start.elapsed(),
                paused.load(Ordering::SeqCst),
                terminal.as_deref_mut(),
            );
        }
    }

    stats
}

/// Formate et affiche la ligne de stats (en haut de l'écran en live, en
/// ligne de progression en export).
fn publish_stats(
    stats: &PipelineStats,
    elapsed: Duration,
    paused: bool,
    terminal: Option<&mut TerminalSink>,
) {
    let secs = elapsed.as_secs_f64();
    let fps = if secs > 0.0 {
        stats.rendered as f64 / secs
    } else {
        0.0
    };

    match terminal {
        Some(sink) => {
            let mbps = sink.write_rate_mbps();
            let mut line = format!(
                "FPS: {fps:.1} Rendered: {} Dropped: {} Write: {mbps:.1} MB/s",
                stats.rendered, stats.dropped
            );
            if paused {
                line.push_str(" [Paused]");
            }
            let _ = sink.print_stats(&line);
        }
        None => {
            print!("\r[export] FPS: {fps:.1} Frames: {}", stats.rendered);
            let _ = std::io::stdout().flush();
        }
    }
}

/// Boucle du plan de contrôle : un seul lecteur stdin, polling 30 ms.
fn control_loop(
    running: &AtomicBool,
    paused: &AtomicBool,
    renderer: &AsciiRenderer,
    audio: Option<&AudioHandle>,
    volume: f32,
    close_queues: &dyn Fn(),
) {
    while running.load(Ordering::SeqCst) {
        match event::poll(KEY_POLL) {
            Ok(true) => {
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                handle_key(key.code, running, paused, renderer, audio, volume);
                if !running.load(Ordering::SeqCst) {
                    close_queues();
                }
            }
            Ok(false) => {}
            Err(_) => {
                // Pas de terminal interactif (export, tests) : on attend.
                thread::sleep(KEY_POLL);
            }
        }
    }
}

/// Applique une touche à l'état partagé.
fn handle_key(
    code: KeyCode,
    running: &AtomicBool,
    paused: &AtomicBool,
    renderer: &AsciiRenderer,
    audio: Option<&AudioHandle>,
    volume: f32,
) {
    match code {
        KeyCode::Char(' ') => {
            let now_paused = !paused.load(Ordering::SeqCst);
            paused.store(now_paused, Ordering::SeqCst);
            if let Some(handle) = audio {
                // Pause : couper le son ; reprise : restaurer le gain
                // configuré.
                handle.set_volume(if now_paused { 0.0 } else { volume });
            }
        }
        KeyCode::Char('q' | 'Q') => {
            running.store(false, Ordering::SeqCst);
        }
        KeyCode::Char('c' | 'C') => renderer.cycle_mode(),
        KeyCode::Char('d' | 'D') => renderer.cycle_dither(),
        KeyCode::Char('g') => renderer.adjust_gamma(-0.1),
        KeyCode::Char('G') => renderer.adjust_gamma(0.1),
        KeyCode::Char('b') => renderer.adjust_contrast(-0.1),
        KeyCode::Char('B') => renderer.adjust_contrast(0.1),
        KeyCode::Char('1') => renderer.set_mode(gc_core::config::RenderMode::Gray),
        KeyCode::Char('2') => renderer.set_mode(gc_core::config::RenderMode::Ansi256),
        KeyCode::Char('3') => renderer.set_mode(gc_core::config::RenderMode::TrueColor),
        KeyCode::Char('r' | 'R') => renderer.configure(renderer.current_config()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::config::RenderMode;
    use gc_core::frame::VideoFrame;

    #[test]
    fn pace_sleeps_when_ahead() {
        match pace(0.5, true) {
            Pace::Sleep(d) => assert!((d.as_secs_f64() - 0.5).abs() < 1e-9),
            other => panic!("attendu Sleep, obtenu {other:?}"),
        }
        assert!(matches!(pace(0.011, false), Pace::Sleep(_)));
    }

    #[test]
    fn pace_drops_only_on_audio_clock() {
        // Une frame en retard de 100 ms sur l'horloge audio est abandonnée.
        assert_eq!(pace(-0.100, true), Pace::Drop);
        // Sur l'horloge murale, jamais de drop : on présente en retard.
        assert_eq!(pace(-0.100, false), Pace::Present);
    }

    #[test]
    fn pace_presents_inside_tolerance_band() {
        for diff in [-0.050, -0.020, 0.0, 0.005, 0.010] {
            assert_eq!(pace(diff, true), Pace::Present, "diff={diff}");
        }
        assert_eq!(pace(-0.051, true), Pace::Drop);
        assert_eq!(pace(0.0101, true), Pace::Sleep(Duration::from_secs_f64(0.0101)));
    }

    #[test]
    fn key_map_mutates_shared_state() {
        let running = AtomicBool::new(true);
        let paused = AtomicBool::new(false);
        let renderer = AsciiRenderer::new(RendererConfig::default());

        handle_key(KeyCode::Char(' '), &running, &paused, &renderer, None, 1.0);
        assert!(paused.load(Ordering::SeqCst));
        handle_key(KeyCode::Char(' '), &running, &paused, &renderer, None, 1.0);
        assert!(!paused.load(Ordering::SeqCst));

        handle_key(KeyCode::Char('1'), &running, &paused, &renderer, None, 1.0);
        assert_eq!(renderer.current_config().mode, RenderMode::Gray);
        handle_key(KeyCode::Char('3'), &running, &paused, &renderer, None, 1.0);
        assert_eq!(renderer.current_config().mode, RenderMode::TrueColor);

        handle_key(KeyCode::Char('G'), &running, &paused, &renderer, None, 1.0);
        assert!((renderer.current_config().gamma - 2.3).abs() < 1e-5);
        handle_key(KeyCode::Char('b'), &running, &paused, &renderer, None, 1.0);
        assert!((renderer.current_config().contrast - 0.9).abs() < 1e-5);

        handle_key(KeyCode::Char('q'), &running, &paused, &renderer, None, 1.0);
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn ascii_stage_preserves_order_and_pts() {
        // Mini-pipeline : producteur → VideoQueue(8) → worker → AsciiQueue.
        let video_queue = Arc::new(BoundedQueue::new(8));
        let ascii_queue = Arc::new(BoundedQueue::new(8));
        let renderer = Arc::new(AsciiRenderer::new(RendererConfig {
            grid_cols: 4,
            grid_rows: 2,
            ..RendererConfig::default()
        }));

        let worker = {
            let video_queue = Arc::clone(&video_queue);
            let ascii_queue = Arc::clone(&ascii_queue);
            let renderer = Arc::clone(&renderer);
            thread::spawn(move || {
                while let Some(frame) = video_queue.pop() {
                    if !ascii_queue.push(renderer.render(&frame)) {
                        break;
                    }
                }
                ascii_queue.close();
            })
        };

        for i in 0..20 {
            assert!(video_queue.push(VideoFrame::new(8, 8, f64::from(i) / 25.0)));
        }
        video_queue.close();

        let mut expected = 0u32;
        while let Some(ascii) = ascii_queue.pop() {
            assert!((ascii.pts - f64::from(expected) / 25.0).abs() < 1e-9);
            assert_eq!(ascii.cells.len(), 4 * 2);
            expected += 1;
        }
        assert_eq!(expected, 20, "toutes les frames traversent l'étage en ordre");
        worker.join().unwrap();
    }
}
