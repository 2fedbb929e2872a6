//! Deterministic synthetic images and distortions for dssim tests.
//!
//! Buffers are packed bytes with `bpp` bytes per pixel, generated with an LCG
//! PRNG so inputs are identical on every platform.

// ============================================================================
// LCG PRNG
// ============================================================================

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u8(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFF) as u8
    }

    pub fn next_u8_range(&mut self, min: u8, max: u8) -> u8 {
        let range = u64::from(max - min) + 1;
        let val = u64::from(self.next_u8());
        (u64::from(min) + (val * range / 256)) as u8
    }
}

// ============================================================================
// Image Generation Functions
// ============================================================================

/// Every pixel set to `px` (which must be `bpp` bytes long).
pub fn gen_uniform(width: usize, height: usize, px: &[u8]) -> Vec<u8> {
    px.iter()
        .copied()
        .cycle()
        .take(width * height * px.len())
        .collect()
}

/// Seeded random image
pub fn gen_random(width: usize, height: usize, bpp: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    (0..width * height * bpp).map(|_| rng.next_u8()).collect()
}

/// Seeded random image with limited range, leaving headroom for offsets
pub fn gen_random_midrange(width: usize, height: usize, bpp: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    (0..width * height * bpp)
        .map(|_| rng.next_u8_range(64, 192))
        .collect()
}

/// Smooth RGB pattern: red varies with x, green with y, blue diagonally
pub fn gen_color_gradient(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / (width - 1).max(1)) as u8);
            data.push((y * 255 / (height - 1).max(1)) as u8);
            data.push(((x + y) * 127 / (width + height)) as u8);
        }
    }
    data
}

/// Checkerboard of `block_size` squares, `bpp` equal bytes per pixel
pub fn gen_checkerboard(
    width: usize,
    height: usize,
    bpp: usize,
    block_size: usize,
    lo: u8,
    hi: u8,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * bpp);
    for y in 0..height {
        for x in 0..width {
            let val = if (x / block_size + y / block_size) % 2 == 0 { lo } else { hi };
            data.extend(std::iter::repeat(val).take(bpp));
        }
    }
    data
}

// ============================================================================
// Distortion Functions
// ============================================================================

/// Adds `delta` to every byte, saturating
pub fn distort_brightness(img: &[u8], delta: i16) -> Vec<u8> {
    img.iter()
        .map(|&v| (i16::from(v) + delta).clamp(0, 255) as u8)
        .collect()
}

/// Adds seeded noise of up to `amplitude` to every byte
pub fn distort_noise(img: &[u8], seed: u64, amplitude: u8) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    img.iter()
        .map(|&v| {
            let noise = i16::from(rng.next_u8_range(0, amplitude.saturating_mul(2)))
                - i16::from(amplitude);
            (i16::from(v) + noise).clamp(0, 255) as u8
        })
        .collect()
}

/// Sets the alpha byte of every RGBA pixel
pub fn with_alpha(rgba: &[u8], alpha: u8) -> Vec<u8> {
    let mut out = rgba.to_vec();
    for px in out.chunks_exact_mut(4) {
        px[3] = alpha;
    }
    out
}
