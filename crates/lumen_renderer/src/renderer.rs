//! Core path tracing renderer.
//!
//! Implements Monte Carlo path tracing with:
//! - Iterative ray tracing with a hard bounce cap
//! - Sky gradient background
//! - Anti-aliasing via jittered multi-sampling
//! - Clamped gamma correction

use crate::{gen_f32, Camera, Color, Hittable, Ray, RenderError, SHADOW_EPSILON};
use lumen_math::Interval;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// How finished pixels reach the shared raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStrategy {
    /// Workers send finished buckets to one aggregator that owns the raster.
    #[default]
    Aggregate,
    /// Workers write straight into disjoint scanline bands of the raster.
    Disjoint,
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel for anti-aliasing
    pub samples_per_pixel: u32,
    /// Maximum ray bounce depth
    pub max_depth: u32,
    /// Worker thread count; hardware parallelism when unset
    pub threads: Option<usize>,
    /// Bucket edge length (Aggregate) or rows per band (Disjoint)
    pub bucket_size: u32,
    pub strategy: RenderStrategy,
    /// Fixed seed for reproducible renders; OS entropy when unset
    pub seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            samples_per_pixel: 50,
            max_depth: 50,
            threads: None,
            bucket_size: crate::DEFAULT_BUCKET_SIZE,
            strategy: RenderStrategy::Aggregate,
            seed: None,
        }
    }
}

impl RenderConfig {
    /// Image aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Reject configurations that cannot produce an image.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::InvalidConfig(
                "samples_per_pixel must be at least 1".to_string(),
            ));
        }
        if self.bucket_size == 0 {
            return Err(RenderError::InvalidConfig(
                "bucket_size must be at least 1".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(RenderError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compute the color seen by a ray.
///
/// Follows the ray through at most `max_depth` scatter events, carrying the
/// product of attenuations. A ray still bouncing when the cap is reached
/// contributes black; so does a ray absorbed by its material.
pub fn ray_color(ray: &Ray, world: &dyn Hittable, max_depth: u32, rng: &mut dyn RngCore) -> Color {
    let mut ray = *ray;
    let mut throughput = Color::ONE;

    for _ in 0..max_depth {
        let Some(rec) = world.hit(&ray, Interval::new(SHADOW_EPSILON, f32::INFINITY)) else {
            return throughput * sky_gradient(&ray);
        };

        match rec.material.scatter(&ray, &rec, rng) {
            Some(result) => {
                throughput *= result.attenuation;
                ray = result.scattered;
            }
            None => return Color::ZERO,
        }
    }

    Color::ZERO
}

/// Compute sky gradient background.
///
/// White looking straight down, sky blue looking straight up.
pub fn sky_gradient(ray: &Ray) -> Color {
    let unit_direction = ray.direction().normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    let white = Color::new(1.0, 1.0, 1.0);
    let blue = Color::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// Apply gamma correction (gamma = 2.0) to a value clamped to [0, 1].
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    Interval::UNIT.clamp(linear).sqrt()
}

/// Convert a radiance estimate to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    // The clamp keeps every product below 256
    let to_byte = |c: f32| (linear_to_gamma(c) * 255.99).floor() as u8;
    [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
}

/// Render a single pixel with multi-sampling.
///
/// `(x, y)` is in rendered space, where `y = 0` is the bottom row.
pub fn render_pixel(
    camera: &Camera,
    world: &dyn Hittable,
    x: u32,
    y: u32,
    config: &RenderConfig,
    rng: &mut dyn RngCore,
) -> Color {
    let mut pixel_color = Color::ZERO;

    for _ in 0..config.samples_per_pixel {
        // Jitter inside the pixel cell
        let u = (x as f32 + gen_f32(rng)) / config.width as f32;
        let v = (y as f32 + gen_f32(rng)) / config.height as f32;
        let ray = camera.get_ray(u, v);
        pixel_color += ray_color(&ray, world, config.max_depth, rng);
    }

    // Average the samples
    pixel_color / config.samples_per_pixel as f32
}

/// Finished RGBA8 image, row-major with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Bytes per pixel.
    pub const CHANNELS: usize = 4;

    /// Create a new raster filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * Self::CHANNELS],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raster row that holds rendered-space row `y`.
    ///
    /// Rendering runs bottom-up, images are stored top-down.
    #[inline]
    pub fn flipped_row(&self, y: u32) -> u32 {
        self.height - 1 - y
    }

    fn offset(&self, x: u32, row: u32) -> usize {
        (row as usize * self.width as usize + x as usize) * Self::CHANNELS
    }

    /// Get the pixel at column `x` of raster row `row`.
    pub fn get(&self, x: u32, row: u32) -> [u8; 4] {
        let i = self.offset(x, row);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Set the pixel at column `x` of raster row `row`.
    pub fn set(&mut self, x: u32, row: u32, rgba: [u8; 4]) {
        let i = self.offset(x, row);
        self.pixels[i..i + Self::CHANNELS].copy_from_slice(&rgba);
    }

    /// Raw RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable raw RGBA bytes, for handing out disjoint row bands.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Render the entire scene on the calling thread.
///
/// Reference implementation for the parallel scheduler; with the same
/// generator state it produces the same image every time.
pub fn render(
    camera: &Camera,
    world: &dyn Hittable,
    config: &RenderConfig,
    rng: &mut dyn RngCore,
) -> Raster {
    let mut image = Raster::new(config.width, config.height);

    for y in 0..config.height {
        let row = image.flipped_row(y);
        for x in 0..config.width {
            let color = render_pixel(camera, world, x, y, config, rng);
            image.set(x, row, color_to_rgba(color));
        }
    }

    image
}
