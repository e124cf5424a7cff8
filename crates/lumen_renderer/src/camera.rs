//! Camera for ray generation.

use crate::Ray;
use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

/// Camera pose and lens as read from a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub vfov: f32,
    /// Width / height; derived from the image size when absent
    pub aspect_ratio: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-0.5, 0.5, 1.0),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::Y,
            vfov: 90.0,
            aspect_ratio: None,
        }
    }
}

/// Pinhole camera for generating primary rays.
///
/// Everything is derived once at construction; the camera is read-only
/// afterwards and shared by all render workers.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    origin: Vec3,
    lower_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
}

impl Camera {
    /// Create a camera at `position` looking toward `look_at`.
    ///
    /// - `vfov`: vertical field of view in degrees
    /// - `aspect`: viewport width / height
    pub fn new(position: Vec3, look_at: Vec3, up: Vec3, vfov: f32, aspect: f32) -> Self {
        let half_height = (vfov.to_radians() / 2.0).tan();
        let half_width = aspect * half_height;

        // Orthonormal camera basis
        let w = (position - look_at).normalize();
        let u = up.cross(w).normalize();
        let v = w.cross(u);

        let origin = position;
        let lower_left = origin - half_width * u - half_height * v - w;

        Self {
            origin,
            lower_left,
            horizontal: 2.0 * half_width * u,
            vertical: 2.0 * half_height * v,
            u,
            v,
            w,
        }
    }

    /// Build a camera from scene configuration.
    ///
    /// `default_aspect` is used when the configuration leaves the aspect
    /// ratio open, normally `width / height` of the output image.
    pub fn from_config(config: &CameraConfig, default_aspect: f32) -> Self {
        Self::new(
            config.position,
            config.look_at,
            config.up,
            config.vfov,
            config.aspect_ratio.unwrap_or(default_aspect),
        )
    }

    /// Generate the ray through viewport coordinates `(s, t)`.
    ///
    /// `(0, 0)` is the lower-left corner and `(1, 1)` the upper-right. The
    /// direction is left un-normalized.
    #[inline]
    pub fn get_ray(&self, s: f32, t: f32) -> Ray {
        Ray::new(
            self.origin,
            self.lower_left + s * self.horizontal + t * self.vertical - self.origin,
        )
    }

    /// The `(u, v, w)` basis: right, up and backward.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (self.u, self.v, self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_camera_center_ray() {
        let position = Vec3::new(-0.5, 0.5, 1.0);
        let look_at = Vec3::new(0.0, 0.0, -1.0);
        let camera = Camera::new(position, look_at, Vec3::Y, 90.0, 16.0 / 9.0);

        let ray = camera.get_ray(0.5, 0.5);
        let expected = (look_at - position).normalize();

        assert_eq!(ray.origin, position);
        assert!((ray.direction.normalize() - expected).length() < EPS);
    }

    #[test]
    fn test_camera_basis_orthonormal() {
        let camera = Camera::new(
            Vec3::new(3.0, 2.0, 1.0),
            Vec3::new(0.0, 0.5, -2.0),
            Vec3::Y,
            40.0,
            1.5,
        );
        let (u, v, w) = camera.basis();

        for axis in [u, v, w] {
            assert!((axis.length() - 1.0).abs() < EPS);
        }
        assert!(u.dot(v).abs() < EPS);
        assert!(v.dot(w).abs() < EPS);
        assert!(w.dot(u).abs() < EPS);
    }

    #[test]
    fn test_camera_viewport_corners() {
        // 90 degree fov: half height is tan(45) = 1
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y, 90.0, 2.0);

        let lower_left = camera.get_ray(0.0, 0.0).direction;
        let upper_right = camera.get_ray(1.0, 1.0).direction;

        assert!((lower_left - Vec3::new(-2.0, -1.0, -1.0)).length() < EPS);
        assert!((upper_right - Vec3::new(2.0, 1.0, -1.0)).length() < EPS);
    }

    #[test]
    fn test_camera_from_config_aspect() {
        let config = CameraConfig {
            position: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vfov: 90.0,
            ..CameraConfig::default()
        };

        let derived = Camera::from_config(&config, 2.0);
        assert!((derived.get_ray(1.0, 0.5).direction.x - 2.0).abs() < EPS);

        let fixed = Camera::from_config(
            &CameraConfig {
                aspect_ratio: Some(1.0),
                ..config
            },
            2.0,
        );
        assert!((fixed.get_ray(1.0, 0.5).direction.x - 1.0).abs() < EPS);
    }

    #[test]
    fn test_camera_config_json_defaults() {
        let config: CameraConfig = serde_json::from_str(r#"{ "vfov": 40.0 }"#).unwrap();
        assert_eq!(config.vfov, 40.0);
        assert_eq!(config.position, CameraConfig::default().position);
        assert_eq!(config.aspect_ratio, None);
    }
}
