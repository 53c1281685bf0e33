use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Sample;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;

use gc_core::frame::{AudioFrame, VideoFrame};
use gc_core::queue::BoundedQueue;

use crate::error::MediaError;

/// Profondeur de la file vidéo. Un consommateur lent bloque le démuxeur.
const VIDEO_QUEUE_CAP: usize = 8;
/// Profondeur de la file audio.
const AUDIO_QUEUE_CAP: usize = 32;

/// Sample rate de sortie, fixé par le contrat du sink audio.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
/// Nombre de canaux de sortie.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Décodeur vidéo/audio adossé à ffmpeg.
///
/// `open` prépare le démuxeur et les codecs ; `start` lance le thread de
/// décodage qui pousse des `VideoFrame` RGB24 et des `AudioFrame` 48 kHz
/// stéréo s16 dans les files bornées. `stop` ferme les files (ce qui libère
/// tout push bloqué) puis joint le thread.
pub struct Decoder {
    video_queue: Arc<BoundedQueue<VideoFrame>>,
    audio_queue: Arc<BoundedQueue<AudioFrame>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    state: Option<DecodeState>,
    width: u32,
    height: u32,
    has_audio: bool,
}

struct DecodeState {
    ictx: ffmpeg::format::context::Input,
    video_index: usize,
    video_time_base: f64,
    video_decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    audio: Option<AudioState>,
}

struct AudioState {
    index: usize,
    time_base: f64,
    decoder: ffmpeg::decoder::Audio,
    /// Construit paresseusement sur la première frame décodée, une fois le
    /// format d'entrée réellement connu.
    resampler: Option<resampling::Context>,
}

fn rational_to_f64(r: ffmpeg::Rational) -> f64 {
    if r.denominator() == 0 {
        0.0
    } else {
        f64::from(r.numerator()) / f64::from(r.denominator())
    }
}

impl Decoder {
    /// Ouvre la source et prépare les codecs.
    ///
    /// Un échec d'ouverture du codec audio n'est pas fatal : l'audio est
    /// simplement désactivé (warning), conformément à la politique de
    /// dégradation du pipeline.
    ///
    /// # Errors
    /// `MediaError::Open` si la source est illisible, `NoVideoStream` si
    /// aucun flux vidéo n'est présent, `Codec`/`Scaler` sur échec d'init.
    pub fn open(url: &str, enable_audio: bool) -> Result<Self, MediaError> {
        ffmpeg::init().map_err(MediaError::Open)?;

        let ictx = ffmpeg::format::input(&url).map_err(MediaError::Open)?;

        let video_stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(MediaError::NoVideoStream)?;
        let video_index = video_stream.index();
        let video_time_base = rational_to_f64(video_stream.time_base());

        let video_ctx =
            ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
                .map_err(MediaError::Codec)?;
        let video_decoder = video_ctx
            .decoder()
            .video()
            .map_err(MediaError::Codec)?;

        let width = video_decoder.width();
        let height = video_decoder.height();

        let scaler = ffmpeg::software::scaling::Context::get(
            video_decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(MediaError::Scaler)?;

        let mut audio = None;
        if enable_audio {
            if let Some(audio_stream) = ictx.streams().best(ffmpeg::media::Type::Audio) {
                let index = audio_stream.index();
                let time_base = rational_to_f64(audio_stream.time_base());
                match ffmpeg::codec::context::Context::from_parameters(audio_stream.parameters())
                    .and_then(|ctx| ctx.decoder().audio())
                {
                    Ok(decoder) => {
                        audio = Some(AudioState {
                            index,
                            time_base,
                            decoder,
                            resampler: None,
                        });
                    }
                    Err(e) => {
                        log::warn!("Codec audio indisponible, audio désactivé : {e}");
                    }
                }
            }
        }

        let has_audio = audio.is_some();
        Ok(Self {
            video_queue: Arc::new(BoundedQueue::new(VIDEO_QUEUE_CAP)),
            audio_queue: Arc::new(BoundedQueue::new(AUDIO_QUEUE_CAP)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            state: Some(DecodeState {
                ictx,
                video_index,
                video_time_base,
                video_decoder,
                scaler,
                audio,
            }),
            width,
            height,
            has_audio,
        })
    }

    /// Dimensions natives du flux vidéo.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `true` si un flux audio décodable a été trouvé.
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// File de sortie vidéo (cap 8).
    #[must_use]
    pub fn video_frames(&self) -> Arc<BoundedQueue<VideoFrame>> {
        Arc::clone(&self.video_queue)
    }

    /// File de sortie audio (cap 32). Fermée immédiatement si pas d'audio.
    #[must_use]
    pub fn audio_frames(&self) -> Arc<BoundedQueue<AudioFrame>> {
        Arc::clone(&self.audio_queue)
    }

    /// Lance le thread de décodage. No-op si `start` a déjà été appelé.
    ///
    /// # Errors
    /// Propage l'échec de création du thread.
    pub fn start(&mut self) -> std::io::Result<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        self.running.store(true, Ordering::SeqCst);
        if !self.has_audio {
            // Personne ne produira jamais dessus ; le pump audio voit EOF.
            self.audio_queue.close();
        }

        let running = Arc::clone(&self.running);
        let video_queue = Arc::clone(&self.video_queue);
        let audio_queue = Arc::clone(&self.audio_queue);

        let handle = thread::Builder::new()
            .name("gc-decode".to_string())
            .spawn(move || {
                decode_loop(state, &running, &video_queue, &audio_queue);
                video_queue.close();
                audio_queue.close();
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Demande l'arrêt sans joindre : ferme les files (libérant tout push ou
    /// pop bloqué) et lève le flag. Appelable depuis n'importe quel thread.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.video_queue.close();
        self.audio_queue.close();
    }

    /// Arrête le décodage : interrompt le thread (files fermées) et le joint.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Boucle de décodage : démux → decode → conversion → push borné.
///
/// Le push bloque quand la file est pleine, ce qui remonte la backpressure
/// jusqu'à `av_read_frame`. Un push refusé signifie que les files ont été
/// fermées : on sort immédiatement.
fn decode_loop(
    mut state: DecodeState,
    running: &AtomicBool,
    video_queue: &BoundedQueue<VideoFrame>,
    audio_queue: &BoundedQueue<AudioFrame>,
) {
    while running.load(Ordering::SeqCst) {
        // Le Stream emprunte le contexte d'entrée ; on ne garde que son
        // index pour relâcher l'emprunt avant de toucher aux décodeurs.
        let (stream_index, packet) = match state.ictx.packets().next() {
            Some(Ok((stream, packet))) => (stream.index(), packet),
            Some(Err(e)) => {
                log::debug!("Fin du démux : {e}");
                break;
            }
            None => break,
        };

        if stream_index == state.video_index {
            if state.video_decoder.send_packet(&packet).is_ok()
                && !drain_video(&mut state, video_queue)
            {
                return;
            }
        } else if let Some(audio) = state.audio.as_mut() {
            if stream_index == audio.index
                && audio.decoder.send_packet(&packet).is_ok()
                && !drain_audio(audio, audio_queue)
            {
                return;
            }
        }
    }

    // Flush : certains codecs retiennent des frames (B-frames) ; on les
    // draine avant de fermer les files.
    if running.load(Ordering::SeqCst) {
        let _ = state.video_decoder.send_eof();
        let _ = drain_video(&mut state, video_queue);
        if let Some(audio) = state.audio.as_mut() {
            let _ = audio.decoder.send_eof();
            let _ = drain_audio(audio, audio_queue);
        }
    }
}

/// Draine les frames vidéo disponibles. Retourne `false` si la file de
/// sortie est fermée.
fn drain_video(state: &mut DecodeState, video_queue: &BoundedQueue<VideoFrame>) -> bool {
    let mut decoded = ffmpeg::frame::Video::empty();
    while state.video_decoder.receive_frame(&mut decoded).is_ok() {
        let mut rgb = ffmpeg::frame::Video::empty();
        if let Err(e) = state.scaler.run(&decoded, &mut rgb) {
            log::warn!("Conversion RGB24 échouée : {e}");
            continue;
        }

        let width = state.video_decoder.width();
        let height = state.video_decoder.height();
        let pts = decoded.pts().unwrap_or(0) as f64 * state.video_time_base;

        let mut frame = VideoFrame::new(width, height, pts);
        let stride = rgb.stride(0);
        let row_bytes = width as usize * 3;
        let src = rgb.data(0);
        for y in 0..height as usize {
            let src_row = &src[y * stride..y * stride + row_bytes];
            frame.data[y * row_bytes..(y + 1) * row_bytes].copy_from_slice(src_row);
        }

        if !video_queue.push(frame) {
            return false;
        }
    }
    true
}

/// Draine les frames audio disponibles, resamplées en 48 kHz stéréo s16.
/// Retourne `false` si la file de sortie est fermée.
fn drain_audio(audio: &mut AudioState, audio_queue: &BoundedQueue<AudioFrame>) -> bool {
    let target_format = Sample::I16(SampleType::Packed);
    let mut raw = ffmpeg::frame::Audio::empty();
    while audio.decoder.receive_frame(&mut raw).is_ok() {
        if audio.resampler.is_none() {
            // Les sources mono doivent être déclarées MONO, sinon swr
            // interprète mal le layout.
            let src_layout = if raw.ch_layout().channels() >= 2 {
                raw.ch_layout()
            } else {
                ChannelLayout::MONO
            };
            match resampling::Context::get2(
                raw.format(),
                src_layout,
                raw.rate(),
                target_format,
                ChannelLayout::STEREO,
                OUTPUT_SAMPLE_RATE,
            ) {
                Ok(ctx) => audio.resampler = Some(ctx),
                Err(e) => {
                    log::warn!("Resampler indisponible, frame audio ignorée : {e}");
                    continue;
                }
            }
        }
        let Some(resampler) = audio.resampler.as_mut() else {
            continue;
        };

        let mut resampled = ffmpeg::frame::Audio::empty();
        if resampler.run(&raw, &mut resampled).is_err() || resampled.samples() == 0 {
            continue;
        }

        let sample_count = resampled.samples() * usize::from(OUTPUT_CHANNELS);
        let bytes = resampled.data(0);
        let mut samples = Vec::with_capacity(sample_count);
        for chunk in bytes[..sample_count * 2].chunks_exact(2) {
            samples.push(i16::from_ne_bytes([chunk[0], chunk[1]]));
        }

        let pts = raw.pts().unwrap_or(0) as f64 * audio.time_base;
        let frame = AudioFrame {
            samples,
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
            pts,
        };
        if !audio_queue.push(frame) {
            return false;
        }
    }
    true
}
