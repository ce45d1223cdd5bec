#![allow(dead_code)]

use std::sync::OnceLock;

use palette::Srgb;
use quantbench::PixelGrid;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// A smooth two-axis gradient, similar to a photo of the sky or a soft background.
#[allow(clippy::cast_possible_truncation)]
pub fn gradient(width: u32, height: u32) -> PixelGrid {
    PixelGrid::from_fn(width, height, |x, y| {
        Srgb::new(
            (x * 255 / (width - 1)) as u8,
            (y * 255 / (height - 1)) as u8,
            ((x + y) % 256) as u8,
        )
    })
    .expect("valid gradient dimensions")
}

/// Uniform random noise, the worst case for every strategy.
pub fn noise(width: u32, height: u32, seed: u64) -> PixelGrid {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    PixelGrid::from_fn(width, height, |_, _| Srgb::new(rng.gen(), rng.gen(), rng.gen()))
        .expect("valid noise dimensions")
}

/// A few large flat regions with slightly jittered colors, like a cartoon or a screenshot.
pub fn blobs(width: u32, height: u32, seed: u64) -> PixelGrid {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    let centers = (0..12)
        .map(|_| {
            let color: [u8; 3] = rng.gen();
            (rng.gen_range(0..width), rng.gen_range(0..height), color)
        })
        .collect::<Vec<_>>();

    PixelGrid::from_fn(width, height, |x, y| {
        let &(_, _, [r, g, b]) = centers
            .iter()
            .min_by_key(|&&(cx, cy, _)| cx.abs_diff(x).pow(2) + cy.abs_diff(y).pow(2))
            .expect("at least one center");

        let jitter = rng.gen_range(0..4);
        Srgb::new(r.saturating_add(jitter), g.saturating_sub(jitter), b)
    })
    .expect("valid blob dimensions")
}

static IMAGES: OnceLock<Vec<(String, PixelGrid)>> = OnceLock::new();

/// The synthetic images used by every benchmark.
pub fn images() -> &'static [(String, PixelGrid)] {
    IMAGES.get_or_init(|| {
        vec![
            ("gradient".to_owned(), gradient(640, 480)),
            ("noise".to_owned(), noise(640, 480, 0)),
            ("blobs".to_owned(), blobs(640, 480, 0)),
        ]
    })
}
