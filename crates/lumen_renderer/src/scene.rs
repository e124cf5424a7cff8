//! Scene description files.
//!
//! A scene is a JSON document with optional `render`, `camera`,
//! `materials` and `objects` sections. Anything left out falls back to the
//! built-in scene: five diffuse spheres, one of them a hollow shell.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use lumen_math::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Camera, CameraConfig, Color, HittableList, Lambertian, Material, RenderConfig, Sphere};

/// Errors that can occur while loading or building a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error("Object {0} must set exactly one of `material` or `albedo`")]
    AmbiguousMaterial(usize),

    #[error("Albedo of {owner} must lie in [0, 1], got {albedo}")]
    InvalidAlbedo { owner: String, albedo: Vec3 },

    #[error("Object {index} has invalid radius {radius}")]
    InvalidRadius { index: usize, radius: f32 },

    #[error("Degenerate camera: {0}")]
    DegenerateCamera(String),
}

/// Material entry of a scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MaterialDescription {
    Lambertian { albedo: Color },
}

impl MaterialDescription {
    fn build(&self, owner: &str) -> Result<Arc<dyn Material>, SceneError> {
        match self {
            MaterialDescription::Lambertian { albedo } => {
                check_albedo(owner, *albedo)?;
                Ok(Arc::new(Lambertian::new(*albedo)))
            }
        }
    }
}

/// One sphere of a scene file.
///
/// The surface either names an entry of `materials` (shared by every
/// sphere that names it) or carries its own diffuse `albedo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphereDescription {
    pub center: Vec3,
    pub radius: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub albedo: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

impl SphereDescription {
    fn with_albedo(center: Vec3, radius: f32, albedo: Color) -> Self {
        Self {
            center,
            radius,
            albedo: Some(albedo),
            material: None,
        }
    }
}

/// Full description of a render: settings, camera and geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub materials: BTreeMap<String, MaterialDescription>,
    pub objects: Vec<SphereDescription>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        let blue = Color::new(0.1, 0.2, 0.5);
        Self {
            render: RenderConfig::default(),
            camera: CameraConfig::default(),
            materials: BTreeMap::new(),
            objects: vec![
                SphereDescription::with_albedo(Vec3::new(0.0, 0.0, -1.0), 0.5, blue),
                SphereDescription::with_albedo(
                    Vec3::new(0.0, -100.5, -1.0),
                    100.0,
                    Color::new(0.8, 0.8, 0.0),
                ),
                SphereDescription::with_albedo(
                    Vec3::new(1.0, 0.0, -1.0),
                    0.5,
                    Color::new(0.8, 0.6, 0.2),
                ),
                // Glass-like bubble: outer surface plus an inward-facing shell
                SphereDescription::with_albedo(Vec3::new(-1.0, 0.0, -1.0), 0.5, blue),
                SphereDescription::with_albedo(Vec3::new(-1.0, 0.0, -1.0), -0.45, blue),
            ],
        }
    }
}

impl SceneDescription {
    /// Parse a scene from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize the scene as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the world from the object list.
    ///
    /// Named materials are built once and shared between their spheres.
    pub fn build_world(&self) -> Result<HittableList, SceneError> {
        let mut shared = BTreeMap::new();
        for (name, description) in &self.materials {
            shared.insert(name.as_str(), description.build(name)?);
        }

        let mut world = HittableList::new();
        for (index, object) in self.objects.iter().enumerate() {
            if !object.radius.is_finite() || object.radius == 0.0 {
                return Err(SceneError::InvalidRadius {
                    index,
                    radius: object.radius,
                });
            }

            let material: Arc<dyn Material> = match (&object.material, object.albedo) {
                (Some(name), None) => shared
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| SceneError::UnknownMaterial(name.clone()))?,
                (None, Some(albedo)) => {
                    check_albedo(&format!("object {index}"), albedo)?;
                    Arc::new(Lambertian::new(albedo))
                }
                _ => return Err(SceneError::AmbiguousMaterial(index)),
            };

            log::debug!(
                "Object {index}: sphere at {} radius {}",
                object.center,
                object.radius
            );
            world.add(Box::new(Sphere::new(object.center, object.radius, material)));
        }

        Ok(world)
    }

    /// Build the camera, using the render size for a missing aspect ratio.
    pub fn build_camera(&self) -> Result<Camera, SceneError> {
        let camera = &self.camera;
        let view = camera.position - camera.look_at;
        if view.length_squared() == 0.0 {
            return Err(SceneError::DegenerateCamera(
                "position and look_at coincide".to_string(),
            ));
        }
        if camera.up.cross(view).length_squared() == 0.0 {
            return Err(SceneError::DegenerateCamera(
                "up is parallel to the view direction".to_string(),
            ));
        }
        if !(camera.vfov > 0.0 && camera.vfov < 180.0) {
            return Err(SceneError::DegenerateCamera(format!(
                "vfov must lie in (0, 180), got {}",
                camera.vfov
            )));
        }

        Ok(Camera::from_config(camera, self.render.aspect_ratio()))
    }
}

fn check_albedo(owner: &str, albedo: Color) -> Result<(), SceneError> {
    if albedo.cmpge(Color::ZERO).all() && albedo.cmple(Color::ONE).all() {
        Ok(())
    } else {
        Err(SceneError::InvalidAlbedo {
            owner: owner.to_string(),
            albedo,
        })
    }
}

/// Load a scene description from a JSON file.
pub fn load_scene(path: impl AsRef<Path>) -> Result<SceneDescription, SceneError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let scene = SceneDescription::from_json(&text)?;
    log::info!(
        "Loaded scene {} with {} objects and {} materials",
        path.display(),
        scene.objects.len(),
        scene.materials.len()
    );
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Hittable, Interval, Ray, SHADOW_EPSILON};

    #[test]
    fn test_default_scene_builds() {
        let scene = SceneDescription::default();
        let world = scene.build_world().unwrap();
        assert_eq!(world.len(), 5);
        scene.build_camera().unwrap();
    }

    #[test]
    fn test_default_scene_round_trips_through_json() {
        let scene = SceneDescription::default();
        let parsed = SceneDescription::from_json(&scene.to_json().unwrap()).unwrap();
        assert_eq!(parsed, scene);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let scene = SceneDescription::from_json(r#"{ "render": { "width": 64, "height": 32 } }"#)
            .unwrap();
        assert_eq!(scene.render.width, 64);
        assert_eq!(scene.render.samples_per_pixel, 50);
        assert_eq!(scene.objects.len(), 5);
        assert_eq!(scene.camera, CameraConfig::default());
    }

    #[test]
    fn test_named_materials_and_inline_albedo() {
        let json = r#"{
            "materials": { "red": { "type": "lambertian", "albedo": [0.9, 0.1, 0.1] } },
            "objects": [
                { "center": [0.0, 0.0, -1.0], "radius": 0.5, "material": "red" },
                { "center": [0.0, 0.0, -3.0], "radius": 0.5, "material": "red" },
                { "center": [0.0, -100.5, -1.0], "radius": 100.0, "albedo": [0.5, 0.5, 0.5] }
            ]
        }"#;
        let world = SceneDescription::from_json(json).unwrap().build_world().unwrap();
        assert_eq!(world.len(), 3);

        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = world
            .hit(&ray, Interval::new(SHADOW_EPSILON, f32::INFINITY))
            .unwrap();
        assert!((rec.t - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_material_rejected() {
        let json = r#"{ "objects": [ { "center": [0, 0, -1], "radius": 0.5, "material": "gold" } ] }"#;
        let err = SceneDescription::from_json(json).unwrap().build_world().unwrap_err();
        assert!(matches!(err, SceneError::UnknownMaterial(name) if name == "gold"));
    }

    #[test]
    fn test_material_choice_must_be_unique() {
        let neither = r#"{ "objects": [ { "center": [0, 0, -1], "radius": 0.5 } ] }"#;
        let err = SceneDescription::from_json(neither).unwrap().build_world().unwrap_err();
        assert!(matches!(err, SceneError::AmbiguousMaterial(0)));

        let both = r#"{
            "materials": { "a": { "type": "lambertian", "albedo": [0.5, 0.5, 0.5] } },
            "objects": [ { "center": [0, 0, -1], "radius": 0.5, "material": "a", "albedo": [1, 1, 1] } ]
        }"#;
        let err = SceneDescription::from_json(both).unwrap().build_world().unwrap_err();
        assert!(matches!(err, SceneError::AmbiguousMaterial(0)));
    }

    #[test]
    fn test_albedo_out_of_range_rejected() {
        let json = r#"{ "objects": [ { "center": [0, 0, -1], "radius": 0.5, "albedo": [1.2, 0, 0] } ] }"#;
        let err = SceneDescription::from_json(json).unwrap().build_world().unwrap_err();
        assert!(matches!(err, SceneError::InvalidAlbedo { .. }));
    }

    #[test]
    fn test_zero_radius_rejected_negative_allowed() {
        let zero = r#"{ "objects": [ { "center": [0, 0, -1], "radius": 0.0, "albedo": [0.5, 0.5, 0.5] } ] }"#;
        let err = SceneDescription::from_json(zero).unwrap().build_world().unwrap_err();
        assert!(matches!(err, SceneError::InvalidRadius { index: 0, .. }));

        let shell = r#"{ "objects": [ { "center": [0, 0, -1], "radius": -0.4, "albedo": [0.5, 0.5, 0.5] } ] }"#;
        assert!(SceneDescription::from_json(shell).unwrap().build_world().is_ok());
    }

    #[test]
    fn test_degenerate_camera_rejected() {
        let mut scene = SceneDescription::default();
        scene.camera.look_at = scene.camera.position;
        assert!(matches!(scene.build_camera(), Err(SceneError::DegenerateCamera(_))));

        let mut scene = SceneDescription::default();
        scene.camera.position = Vec3::new(0.0, 5.0, 0.0);
        scene.camera.look_at = Vec3::ZERO;
        assert!(matches!(scene.build_camera(), Err(SceneError::DegenerateCamera(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SceneDescription::from_json("{ \"objects\": [ }"),
            Err(SceneError::Parse(_))
        ));
    }

    #[test]
    fn test_bundled_scene_parses() {
        let scene = SceneDescription::from_json(include_str!("../../../scenes/bubbles.json")).unwrap();
        assert_eq!(scene.render.seed, Some(7));
        assert_eq!(scene.build_world().unwrap().len(), 6);
        scene.build_camera().unwrap();
    }

    #[test]
    fn test_load_scene_from_file() {
        let path = std::env::temp_dir().join(format!("lumen-scene-{}.json", std::process::id()));
        std::fs::write(&path, SceneDescription::default().to_json().unwrap()).unwrap();

        let scene = load_scene(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(scene.objects.len(), 5);

        assert!(matches!(load_scene(&path), Err(SceneError::Io(_))));
    }
}
