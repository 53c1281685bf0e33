use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Horloge maîtresse pour la synchronisation A/V.
///
/// L'audio est le maître : le callback du device avance `frames_played` à
/// chaque buffer servi depuis le ring. Le presenter lit `pos_secs()` pour
/// caler ses frames. En l'absence d'audio, le presenter retombe sur une
/// horloge murale (voir l'orchestrateur).
///
/// Tous les champs sont atomiques — zero-alloc, zero-lock, `Send + Sync`.
///
/// # Example
/// ```
/// use gc_core::clock::PlaybackClock;
/// let clock = PlaybackClock::new(48000);
/// assert!(!clock.is_started());
/// clock.advance(48000);
/// clock.mark_started();
/// assert!((clock.pos_secs() - 1.0).abs() < 1e-9);
/// ```
pub struct PlaybackClock {
    /// Frames (paires d'échantillons stéréo) délivrées au device.
    frames_played: AtomicU64,
    /// Sample rate du flux de sortie.
    sample_rate: AtomicU32,
    /// `true` une fois le premier callback device servi.
    started: AtomicBool,
}

impl PlaybackClock {
    /// Crée une horloge au sample rate donné.
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames_played: AtomicU64::new(0),
            sample_rate: AtomicU32::new(sample_rate),
            started: AtomicBool::new(false),
        }
    }

    /// Position de lecture en secondes : `frames_played / sample_rate`.
    #[inline]
    #[must_use]
    pub fn pos_secs(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.frames_played.load(Ordering::Relaxed) as f64 / f64::from(rate)
    }

    /// Avance l'horloge de `frames` frames délivrées (appelé par le
    /// callback audio — jamais ailleurs).
    #[inline]
    pub fn advance(&self, frames: u64) {
        self.frames_played.fetch_add(frames, Ordering::Relaxed);
    }

    /// Marque l'horloge comme démarrée (premier buffer servi).
    #[inline]
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    /// `true` si l'audio a commencé à jouer.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_monotonically() {
        let clock = PlaybackClock::new(48000);
        assert_eq!(clock.pos_secs(), 0.0);
        clock.advance(24000);
        assert!((clock.pos_secs() - 0.5).abs() < 1e-9);
        clock.advance(24000);
        assert!((clock.pos_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clock_zero_sample_rate() {
        let clock = PlaybackClock::new(0);
        clock.advance(1000);
        assert_eq!(clock.pos_secs(), 0.0);
    }
}
