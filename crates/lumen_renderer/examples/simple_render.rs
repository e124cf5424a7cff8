//! Simple path tracer example.
//!
//! Renders a small scene with one thread and saves it as PPM, without
//! going through the scheduler or the image encoder.

use lumen_renderer::{
    render, Camera, Color, HittableList, Lambertian, Material, Raster,
    RenderConfig, Sphere, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

fn main() -> std::io::Result<()> {
    println!("Lumen Path Tracer - Simple Example");
    println!("==================================");

    let world = build_scene();

    let config = RenderConfig {
        width: 400,
        height: 225,
        samples_per_pixel: 20,
        max_depth: 10,
        ..RenderConfig::default()
    };

    let camera = Camera::new(
        Vec3::new(0.0, 1.0, 2.0), // look_from
        Vec3::new(0.0, 0.0, -1.0), // look_at
        Vec3::new(0.0, 1.0, 0.0), // vup
        60.0,
        config.aspect_ratio(),
    );

    println!(
        "Rendering {}x{} @ {} spp...",
        config.width, config.height, config.samples_per_pixel
    );

    let start = std::time::Instant::now();
    let mut rng = StdRng::seed_from_u64(42);
    let image = render(&camera, &world, &config, &mut rng);
    println!("Rendered in {:?}", start.elapsed());

    let filename = "output.ppm";
    save_ppm(&image, filename)?;
    println!("Saved to {}", filename);
    Ok(())
}

fn build_scene() -> HittableList {
    let ground: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.5, 0.5, 0.5)));
    let warm: Arc<dyn Material> = Arc::new(Lambertian::new(Color::new(0.8, 0.4, 0.1)));

    let mut world = HittableList::new();
    world.add(Box::new(Sphere::new(Vec3::new(0.0, -100.5, -1.0), 100.0, ground)));

    // Three spheres sharing one material
    for x in [-1.1, 0.0, 1.1] {
        world.add(Box::new(Sphere::new(Vec3::new(x, 0.0, -1.0), 0.5, Arc::clone(&warm))));
    }

    println!("Created {} objects", world.len());
    world
}

fn save_ppm(image: &Raster, filename: &str) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "P3")?;
    writeln!(writer, "{} {}", image.width(), image.height())?;
    writeln!(writer, "255")?;

    for row in 0..image.height() {
        for x in 0..image.width() {
            let [r, g, b, _] = image.get(x, row);
            writeln!(writer, "{} {} {}", r, g, b)?;
        }
    }

    writer.flush()
}
