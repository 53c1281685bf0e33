use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;

use gc_core::clock::PlaybackClock;
use gc_core::frame::AudioFrame;

/// Profondeur du ring : une seconde de stéréo 48 kHz.
const RING_CAPACITY: usize = 48_000 * 2;

/// Pas d'attente du pump quand le ring est plein.
const ENQUEUE_RETRY: Duration = Duration::from_millis(5);

/// Errors originating from the audio device layer.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Pas de périphérique de sortie.
    #[error("Pas de périphérique audio de sortie")]
    NoDevice,

    /// Échec de construction du stream.
    #[error("Construction du stream audio impossible : {0}")]
    Build(#[from] cpal::BuildStreamError),

    /// Échec de démarrage du stream.
    #[error("Démarrage du stream audio impossible : {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Poignée partagée vers l'horloge et le volume du sink.
///
/// Clonable et `Send` : le presenter lit l'horloge, le plan de contrôle
/// pilote le volume (pause → 0, reprise → volume configuré).
#[derive(Clone)]
pub struct AudioHandle {
    clock: Arc<PlaybackClock>,
    volume_bits: Arc<AtomicU32>,
    stopped: Arc<AtomicBool>,
}

impl AudioHandle {
    /// Crée la poignée partagée avant l'ouverture du device. Tant que le
    /// stream n'a pas servi son premier buffer, `is_started()` reste faux
    /// et le presenter retombe sur l'horloge murale.
    #[must_use]
    pub fn new(sample_rate: u32, volume: f32) -> Self {
        Self {
            clock: Arc::new(PlaybackClock::new(sample_rate)),
            volume_bits: Arc::new(AtomicU32::new(volume.max(0.0).to_bits())),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Secondes de flux réellement délivrées au device.
    #[must_use]
    pub fn playback_time(&self) -> f64 {
        self.clock.pos_secs()
    }

    /// `true` une fois le premier buffer servi (l'horloge est significative).
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.clock.is_started()
    }

    /// Fixe le facteur de volume appliqué aux échantillons suivants.
    pub fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Facteur de volume courant.
    #[must_use]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    /// Demande l'arrêt : débloque un `enqueue` en attente de place.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Sink de lecture stéréo. Possède le stream cpal et le côté producteur du
/// ring. Le stream cpal n'est pas garanti `Send` : cette valeur doit
/// naître, vivre et mourir dans le thread du pump audio.
pub struct AudioOutput {
    _stream: cpal::Stream,
    producer: Producer<i16>,
    stopped: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Ouvre le périphérique par défaut en f32 aux paramètres demandés et
    /// démarre le stream, câblé sur l'horloge et le volume de `handle`.
    ///
    /// Le callback ne bloque jamais et n'alloue jamais : il draine le ring,
    /// convertit s16 → f32, applique le volume et complète en silence sur
    /// underrun. L'horloge n'avance que des frames réellement servies.
    ///
    /// # Errors
    /// `AudioError` si le périphérique manque ou si le stream ne démarre
    /// pas ; l'appelant dégrade alors en lecture muette.
    pub fn start(
        sample_rate: u32,
        channels: u16,
        handle: &AudioHandle,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let (producer, mut consumer) = RingBuffer::new(RING_CAPACITY);

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let cb_clock = Arc::clone(&handle.clock);
        let cb_volume = Arc::clone(&handle.volume_bits);
        let cb_channels = usize::from(channels);
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                cb_clock.mark_started();
                let volume = f32::from_bits(cb_volume.load(Ordering::Relaxed));
                fill_from_ring(&mut consumer, data, volume, cb_channels, &cb_clock);
            },
            |err| {
                log::error!("Erreur du stream audio : {err}");
            },
            None,
        )?;
        stream.play()?;
        log::info!("Audio démarré : {sample_rate} Hz, {channels} canaux, f32");

        Ok(Self {
            _stream: stream,
            producer,
            stopped: Arc::clone(&handle.stopped),
        })
    }

    /// Enfile les échantillons d'une frame dans le ring.
    ///
    /// Bloque (par petites siestes) quand le ring est plein — c'est la
    /// backpressure qui remonte jusqu'au décodeur — et abandonne si le sink
    /// est arrêté.
    pub fn enqueue(&mut self, frame: &AudioFrame) {
        let mut index = 0;
        while index < frame.samples.len() {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            if self.producer.push(frame.samples[index]).is_ok() {
                index += 1;
            } else {
                std::thread::sleep(ENQUEUE_RETRY);
            }
        }
    }

    /// Arrête le sink ; les échantillons encore dans le ring sont perdus.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Cœur du callback de pull : draine le ring vers `data`, applique le
/// volume, zéro-fill sur underrun, avance l'horloge des frames délivrées.
fn fill_from_ring(
    consumer: &mut Consumer<i16>,
    data: &mut [f32],
    volume: f32,
    channels: usize,
    clock: &PlaybackClock,
) {
    let mut delivered = 0usize;
    for slot in data.iter_mut() {
        match consumer.pop() {
            Ok(sample) => {
                *slot = f32::from(sample) / 32768.0 * volume;
                delivered += 1;
            }
            Err(_) => {
                // Underrun : silence, l'horloge n'avance pas.
                *slot = 0.0;
            }
        }
    }
    if channels > 0 {
        clock.advance((delivered / channels) as u64);
    }
}
