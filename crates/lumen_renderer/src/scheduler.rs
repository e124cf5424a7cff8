//! Parallel bucket scheduler.
//!
//! A producer fills a [`WorkQueue`] with buckets once, then a fixed pool of
//! workers drains it. Each worker owns its random generator. Finished pixels
//! reach the raster in one of two ways (see [`RenderStrategy`]):
//!
//! - `Aggregate`: workers send [`BucketResult`]s over a channel and the
//!   calling thread, as the only raster owner, copies them in.
//! - `Disjoint`: the raster is split into full-width bands up front and each
//!   queued band carries exclusive `&mut` access to its rows.
//!
//! Rendered-space row `y` always lands in raster row `height - 1 - y`.

use std::num::NonZeroUsize;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::ThreadPool;
use thiserror::Error;

use crate::bucket::{generate_buckets, generate_scanlines, render_bucket, Bucket, BucketResult};
use crate::renderer::{color_to_rgba, render_pixel, Raster, RenderConfig, RenderStrategy};
use crate::{Camera, Hittable};

/// Errors that can occur before rendering starts.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid render configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Closed multi-consumer queue of work items.
///
/// All items are pushed at construction and the producing side is dropped,
/// so `pop` returns `None` exactly once the queue has been drained.
pub struct WorkQueue<T> {
    receiver: Mutex<Receiver<T>>,
}

impl<T> WorkQueue<T> {
    /// Fill a queue from `items` and close it.
    pub fn new<I: IntoIterator<Item = T>>(items: I) -> Self {
        let (sender, receiver) = mpsc::channel();
        for item in items {
            // The receiver is alive, so sending cannot fail
            let _ = sender.send(item);
        }
        Self {
            receiver: Mutex::new(receiver),
        }
    }

    /// Take the next item, or `None` when the queue is drained.
    pub fn pop(&self) -> Option<T> {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        receiver.recv().ok()
    }
}

/// Number of workers a render will use.
pub fn worker_count(config: &RenderConfig) -> usize {
    config.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    })
}

/// Seed for the generator that renders bucket `index`.
fn bucket_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Random generator owned by exactly one worker.
///
/// With a fixed seed it is re-seeded per bucket, so the pixels of a bucket
/// do not depend on which worker renders it.
struct WorkerRng {
    seed: Option<u64>,
    rng: StdRng,
}

impl WorkerRng {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { seed, rng }
    }

    fn for_bucket(&mut self, bucket: &Bucket) -> &mut StdRng {
        if let Some(seed) = self.seed {
            self.rng = StdRng::seed_from_u64(bucket_seed(seed, bucket.index));
        }
        &mut self.rng
    }
}

/// Render the scene on a fixed pool of worker threads.
///
/// Returns once every worker has drained the queue.
pub fn render_parallel(
    camera: &Camera,
    world: &dyn Hittable,
    config: &RenderConfig,
) -> Result<Raster, RenderError> {
    config.validate()?;

    let threads = worker_count(config);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("lumen-worker-{i}"))
        .build()?;

    log::info!(
        "Rendering {}x{} @ {} spp, max depth {}, {} workers, {:?} strategy",
        config.width,
        config.height,
        config.samples_per_pixel,
        config.max_depth,
        threads,
        config.strategy
    );

    let start = Instant::now();
    let mut raster = Raster::new(config.width, config.height);
    match config.strategy {
        RenderStrategy::Aggregate => {
            render_aggregate(&pool, threads, camera, world, config, &mut raster)
        }
        RenderStrategy::Disjoint => {
            render_disjoint(&pool, threads, camera, world, config, &mut raster)
        }
    }
    log::info!("Rendered in {:?}", start.elapsed());

    Ok(raster)
}

fn render_aggregate(
    pool: &ThreadPool,
    threads: usize,
    camera: &Camera,
    world: &dyn Hittable,
    config: &RenderConfig,
    raster: &mut Raster,
) {
    let buckets = generate_buckets(config.width, config.height, config.bucket_size);
    let total = buckets.len();
    let queue = WorkQueue::new(buckets);
    let (sender, results) = mpsc::channel::<BucketResult>();

    pool.in_place_scope(|s| {
        for worker in 0..threads {
            let sender = sender.clone();
            let queue = &queue;
            s.spawn(move |_| {
                let mut rng = WorkerRng::new(config.seed);
                let mut rendered = 0usize;
                while let Some(bucket) = queue.pop() {
                    let pixels = render_bucket(&bucket, camera, world, config, rng.for_bucket(&bucket));
                    if sender.send(BucketResult::new(bucket, pixels)).is_err() {
                        break;
                    }
                    rendered += 1;
                }
                log::debug!("Worker {worker} rendered {rendered} buckets");
            });
        }

        // Only the workers hold senders now; the stream ends when they finish
        drop(sender);

        for (done, result) in results.into_iter().enumerate() {
            write_bucket(raster, &result);
            log::trace!("Bucket {} complete ({}/{})", result.bucket.index, done + 1, total);
        }
    });
}

/// Copy a finished bucket into the raster, flipping rows.
fn write_bucket(raster: &mut Raster, result: &BucketResult) {
    let bucket = &result.bucket;
    for (i, rgba) in result.pixels.iter().enumerate() {
        let local_x = i as u32 % bucket.width;
        let local_y = i as u32 / bucket.width;
        let row = raster.flipped_row(bucket.y + local_y);
        raster.set(bucket.x + local_x, row, *rgba);
    }
}

fn render_disjoint(
    pool: &ThreadPool,
    threads: usize,
    camera: &Camera,
    world: &dyn Hittable,
    config: &RenderConfig,
    raster: &mut Raster,
) {
    let bands = generate_scanlines(config.width, config.height, config.bucket_size);
    let row_bytes = config.width as usize * Raster::CHANNELS;
    let band_bytes = row_bytes * config.bucket_size as usize;

    // Raster rows run top-down, so chunking from the end pairs band 0 with
    // the bottom rows and leaves the short remainder band at the top
    let queue = WorkQueue::new(bands.into_iter().zip(raster.as_bytes_mut().rchunks_mut(band_bytes)));

    pool.in_place_scope(|s| {
        for worker in 0..threads {
            let queue = &queue;
            s.spawn(move |_| {
                let mut rng = WorkerRng::new(config.seed);
                let mut rendered = 0usize;
                while let Some((band, pixels)) = queue.pop() {
                    render_band(&band, pixels, camera, world, config, rng.for_bucket(&band));
                    rendered += 1;
                }
                log::debug!("Worker {worker} rendered {rendered} bands");
            });
        }
    });
}

/// Render a full-width band straight into its slice of the raster.
fn render_band(
    band: &Bucket,
    pixels: &mut [u8],
    camera: &Camera,
    world: &dyn Hittable,
    config: &RenderConfig,
    rng: &mut StdRng,
) {
    for local_y in 0..band.height {
        let row = (band.height - 1 - local_y) as usize;
        for x in 0..band.width {
            let color = render_pixel(camera, world, x, band.y + local_y, config, rng);
            let i = (row * band.width as usize + x as usize) * Raster::CHANNELS;
            pixels[i..i + Raster::CHANNELS].copy_from_slice(&color_to_rgba(color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render, Color, HittableList, Lambertian, Sphere, Vec3};
    use std::sync::Arc;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn scene() -> (Camera, HittableList) {
        let camera = Camera::new(
            Vec3::new(-0.5, 0.5, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::Y,
            90.0,
            2.0,
        );
        let blue: Arc<dyn crate::Material> = Arc::new(Lambertian::new(Color::new(0.1, 0.2, 0.5)));
        let mut world = HittableList::new();
        world.add(Box::new(Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, blue.clone())));
        world.add(Box::new(Sphere::new(
            Vec3::new(0.0, -100.5, -1.0),
            100.0,
            Arc::new(Lambertian::new(Color::new(0.8, 0.8, 0.0))),
        )));
        world.add(Box::new(Sphere::new(Vec3::new(-1.0, 0.0, -1.0), 0.5, blue.clone())));
        world.add(Box::new(Sphere::new(Vec3::new(-1.0, 0.0, -1.0), -0.45, blue)));
        (camera, world)
    }

    fn config(strategy: RenderStrategy, threads: usize) -> RenderConfig {
        RenderConfig {
            width: 24,
            height: 13,
            samples_per_pixel: 4,
            max_depth: 10,
            threads: Some(threads),
            bucket_size: 5,
            strategy,
            seed: Some(1234),
        }
    }

    fn assert_fully_written(raster: &Raster) {
        assert!(raster.as_bytes().chunks(Raster::CHANNELS).all(|px| px[3] == 255));
    }

    #[test]
    fn test_work_queue_drains_once() {
        let queue = WorkQueue::new(0..5);
        let drained: Vec<i32> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_work_queue_concurrent_pop() {
        let queue = WorkQueue::new(0..1000usize);
        let seen = Mutex::new(vec![0u32; 1000]);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(item) = queue.pop() {
                        seen.lock().unwrap()[item] += 1;
                    }
                });
            }
        });

        assert!(seen.into_inner().unwrap().iter().all(|&n| n == 1));
    }

    #[test]
    fn test_worker_count() {
        let fixed = RenderConfig {
            threads: Some(3),
            ..RenderConfig::default()
        };
        assert_eq!(worker_count(&fixed), 3);
        assert!(worker_count(&RenderConfig::default()) >= 1);
    }

    #[test]
    fn test_aggregate_independent_of_worker_count() {
        init_logging();
        let (camera, world) = scene();

        let reference = render_parallel(&camera, &world, &config(RenderStrategy::Aggregate, 1)).unwrap();
        assert_fully_written(&reference);

        for threads in [2, 8] {
            let raster =
                render_parallel(&camera, &world, &config(RenderStrategy::Aggregate, threads)).unwrap();
            assert_eq!(raster, reference, "{threads} workers");
        }
    }

    #[test]
    fn test_disjoint_independent_of_worker_count() {
        init_logging();
        let (camera, world) = scene();

        let reference = render_parallel(&camera, &world, &config(RenderStrategy::Disjoint, 1)).unwrap();
        assert_fully_written(&reference);

        for threads in [2, 8] {
            let raster =
                render_parallel(&camera, &world, &config(RenderStrategy::Disjoint, threads)).unwrap();
            assert_eq!(raster, reference, "{threads} workers");
        }
    }

    #[test]
    fn test_single_unit_matches_reference_render() {
        // With one bucket covering the whole image both strategies consume
        // the same random stream as the single-threaded renderer
        let (camera, world) = scene();
        for strategy in [RenderStrategy::Aggregate, RenderStrategy::Disjoint] {
            let config = RenderConfig {
                bucket_size: 64,
                ..config(strategy, 4)
            };
            let mut rng = StdRng::seed_from_u64(bucket_seed(1234, 0));
            let expected = render(&camera, &world, &config, &mut rng);

            let raster = render_parallel(&camera, &world, &config).unwrap();
            assert_eq!(raster, expected, "{strategy:?}");
        }
    }

    #[test]
    fn test_sky_rows_ordered_top_to_bottom() {
        // Red falls off toward the zenith, so it must not decrease going
        // down the raster however many bands or buckets the image is cut into
        let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 90.0, 24.0 / 13.0);
        let world = HittableList::new();

        for strategy in [RenderStrategy::Aggregate, RenderStrategy::Disjoint] {
            for threads in [1, 3] {
                let raster = render_parallel(&camera, &world, &config(strategy, threads)).unwrap();
                let reds: Vec<u8> = (0..raster.height()).map(|row| raster.get(12, row)[0]).collect();

                assert!(
                    reds.windows(2).all(|pair| pair[0] <= pair[1]),
                    "{strategy:?} with {threads} workers: {reds:?}"
                );
                assert!(reds[0] < reds[reds.len() - 1]);
            }
        }
    }

    #[test]
    fn test_repeatable_with_seed() {
        let (camera, world) = scene();
        let config = config(RenderStrategy::Aggregate, 4);
        let a = render_parallel(&camera, &world, &config).unwrap();
        let b = render_parallel(&camera, &world, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseeded_render_completes() {
        let (camera, world) = scene();
        for strategy in [RenderStrategy::Aggregate, RenderStrategy::Disjoint] {
            let config = RenderConfig {
                seed: None,
                ..config(strategy, 3)
            };
            let raster = render_parallel(&camera, &world, &config).unwrap();
            assert_eq!((raster.width(), raster.height()), (24, 13));
            assert_fully_written(&raster);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (camera, world) = scene();
        let config = RenderConfig {
            height: 0,
            ..config(RenderStrategy::Aggregate, 2)
        };
        assert!(matches!(
            render_parallel(&camera, &world, &config),
            Err(RenderError::InvalidConfig(_))
        ));
    }
}
