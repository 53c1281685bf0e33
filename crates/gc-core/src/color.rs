//! LUTs et utilitaires couleur purs : luminance Rec. 709, gamma, contraste,
//! palette xterm-256 et packing RGB 24 bits.

/// Les 16 couleurs ANSI de base (liste VGA historique).
pub const ANSI_BASE_COLORS: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

/// Palette xterm-256 complète. Compile-time const, zero-alloc.
///
/// Entrées 0..16 : couleurs ANSI de base. 16..232 : cube 6×6×6 avec niveaux
/// {0, 95, 135, 175, 215, 255}. 232..256 : rampe de gris `8 + i·10`.
pub const XTERM_PALETTE: [(u8, u8, u8); 256] = {
    let mut palette = [(0u8, 0u8, 0u8); 256];
    let mut i = 0;
    while i < 16 {
        palette[i] = ANSI_BASE_COLORS[i];
        i += 1;
    }

    let mut idx = 16;
    let mut r = 0u16;
    while r < 6 {
        let mut g = 0u16;
        while g < 6 {
            let mut b = 0u16;
            while b < 6 {
                let rr = if r == 0 { 0 } else { (55 + r * 40) as u8 };
                let gg = if g == 0 { 0 } else { (55 + g * 40) as u8 };
                let bb = if b == 0 { 0 } else { (55 + b * 40) as u8 };
                palette[idx] = (rr, gg, bb);
                idx += 1;
                b += 1;
            }
            g += 1;
        }
        r += 1;
    }

    let mut gray = 0u16;
    while gray < 24 {
        let v = (8 + gray * 10) as u8;
        palette[idx] = (v, v, v);
        idx += 1;
        gray += 1;
    }

    palette
};

/// Accès à la palette xterm-256.
#[inline]
#[must_use]
pub fn xterm_palette() -> &'static [(u8, u8, u8); 256] {
    &XTERM_PALETTE
}

/// Index de la couleur xterm la plus proche (distance euclidienne carrée,
/// argmin sur les 256 entrées).
///
/// # Example
/// ```
/// use gc_core::color::xterm_index_from_rgb;
/// assert_eq!(xterm_index_from_rgb(0, 0, 0), 0);
/// assert_eq!(xterm_index_from_rgb(215, 0, 0), 160);
/// ```
#[must_use]
pub fn xterm_index_from_rgb(r: u8, g: u8, b: u8) -> u8 {
    let mut best_index = 0usize;
    let mut best_dist = i32::MAX;
    for (i, &(pr, pg, pb)) in XTERM_PALETTE.iter().enumerate() {
        let dr = i32::from(pr) - i32::from(r);
        let dg = i32::from(pg) - i32::from(g);
        let db = i32::from(pb) - i32::from(b);
        let dist = dr * dr + dg * dg + db * db;
        if dist < best_dist {
            best_dist = dist;
            best_index = i;
        }
    }
    best_index as u8
}

/// Luminance perceptuelle Rec. 709. Entrées [0, 255], sortie [0.0, 255.0].
///
/// # Example
/// ```
/// use gc_core::color::luminance;
/// assert!((luminance(255, 255, 255) - 255.0).abs() < 0.01);
/// assert_eq!(luminance(0, 0, 0), 0.0);
/// ```
#[inline(always)]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b)
}

/// Correction gamma : `(v/255)^(1/γ)`, clampé sur [0.0, 1.0].
#[inline(always)]
#[must_use]
pub fn apply_gamma(value: f32, gamma: f32) -> f32 {
    let normalized = (value / 255.0).clamp(0.0, 1.0);
    normalized.powf(1.0 / gamma).clamp(0.0, 1.0)
}

/// Contraste centré sur 0.5 : `(v − 0.5)·c + 0.5`, clampé sur [0.0, 1.0].
#[inline(always)]
#[must_use]
pub fn apply_contrast(value: f32, contrast: f32) -> f32 {
    ((value - 0.5) * contrast + 0.5).clamp(0.0, 1.0)
}

/// Packe un triplet RGB en entier 24 bits `0xRRGGBB`.
///
/// # Example
/// ```
/// use gc_core::color::pack_rgb;
/// assert_eq!(pack_rgb(0x80, 0x80, 0x80), 0x0080_8080);
/// ```
#[inline(always)]
#[must_use]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Dépacke un entier 24 bits en triplet `(r, g, b)`.
#[inline(always)]
#[must_use]
pub fn unpack_rgb(value: u32) -> (u8, u8, u8) {
    (
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    )
}
