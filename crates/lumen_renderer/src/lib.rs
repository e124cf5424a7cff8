//! Lumen Renderer - CPU Path Tracing
//!
//! A Monte Carlo path tracer for scenes of spheres with diffuse materials.
//! Buckets of the image are rendered by a fixed pool of worker threads,
//! each owning a private random generator.

mod bucket;
mod camera;
mod hittable;
mod material;
mod renderer;
mod scene;
mod scheduler;
mod sphere;

pub use bucket::{
    generate_buckets, generate_scanlines, render_bucket, Bucket, BucketResult,
    DEFAULT_BUCKET_SIZE,
};
pub use camera::{Camera, CameraConfig};
pub use hittable::{HitRecord, Hittable, HittableList, SHADOW_EPSILON};
pub use material::{random_in_unit_sphere, Color, Lambertian, Material, ScatterResult};
pub use renderer::{
    color_to_rgba, linear_to_gamma, ray_color, render, render_pixel, sky_gradient, Raster,
    RenderConfig, RenderStrategy,
};
pub use scene::{
    load_scene, MaterialDescription, SceneDescription, SceneError, SphereDescription,
};
pub use scheduler::{render_parallel, worker_count, RenderError, WorkQueue};
pub use sphere::Sphere;

/// Re-export Vec3 and common math types from lumen_math
pub use lumen_math::{Interval, Ray, Vec3};

use rand::{Rng, RngCore};

/// Draw a uniform `f32` in `[0, 1)` from an object-safe generator.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}
