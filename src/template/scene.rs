use serde::{Deserialize, Serialize};

use crate::error::{ChefError, Result};

/// Placement of a layer on the canvas. Angles are kept in [0, 360) and
/// opacity in [0, 1] by the setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f32,
    pub top: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub angle: f32,
    pub opacity: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            opacity: 1.0,
        }
    }
}

impl Geometry {
    pub fn at(left: f32, top: f32) -> Self {
        Geometry {
            left,
            top,
            ..Default::default()
        }
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle.rem_euclid(360.0);
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }
}

/// Fill paint; colors are `#rrggbb` strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    pub fill: String,
}

impl Default for Paint {
    fn default() -> Self {
        Paint {
            fill: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rect,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    #[serde(default)]
    pub weight: FontWeight,
    #[serde(default)]
    pub style: FontStyle,
    #[serde(default)]
    pub align: TextAlign,
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec {
            family: "Arial".to_string(),
            size: 40.0,
            weight: FontWeight::default(),
            style: FontStyle::default(),
            align: TextAlign::default(),
        }
    }
}

/// One visual layer. The variant set is the whole model; no renderer-native
/// object graph leaks into storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    /// Full-canvas photo, always drawn first
    Background { src: String },
    Shape {
        kind: ShapeKind,
        width: f32,
        height: f32,
        geometry: Geometry,
        paint: Paint,
    },
    Text {
        content: String,
        geometry: Geometry,
        paint: Paint,
        font: FontSpec,
        #[serde(default)]
        is_placeholder: bool,
    },
    Image {
        src: String,
        width: f32,
        height: f32,
        geometry: Geometry,
    },
    Path {
        points: Vec<[f32; 2]>,
        geometry: Geometry,
        paint: Paint,
    },
}

impl Layer {
    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        match self {
            Layer::Background { .. } => None,
            Layer::Shape { geometry, .. }
            | Layer::Text { geometry, .. }
            | Layer::Image { geometry, .. }
            | Layer::Path { geometry, .. } => Some(geometry),
        }
    }

    pub fn paint_mut(&mut self) -> Option<&mut Paint> {
        match self {
            Layer::Shape { paint, .. } | Layer::Text { paint, .. } | Layer::Path { paint, .. } => {
                Some(paint)
            }
            _ => None,
        }
    }
}

/// An ordered collection of layers over a fixed-size canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    layers: Vec<Layer>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Scene {
            width,
            height,
            layers: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Append a layer; returns its index.
    pub fn add_layer(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn remove_layer(&mut self, index: usize) -> Result<Layer> {
        if index >= self.layers.len() {
            return Err(ChefError::Validation(format!("No layer at index {index}")));
        }
        Ok(self.layers.remove(index))
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer> {
        let len = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or_else(|| ChefError::Validation(format!("No layer at index {index} (of {len})")))
    }

    /// Replace the background photo, inserting the layer at the bottom if the
    /// scene has none yet.
    pub fn set_background(&mut self, src: impl Into<String>) {
        let src = src.into();
        for layer in &mut self.layers {
            if let Layer::Background { src: existing } = layer {
                *existing = src;
                return;
            }
        }
        self.layers.insert(0, Layer::Background { src });
    }

    pub fn background(&self) -> Option<&str> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Background { src } => Some(src.as_str()),
            _ => None,
        })
    }

    pub fn set_position(&mut self, index: usize, left: f32, top: f32) -> Result<()> {
        let geometry = self.require_geometry(index)?;
        geometry.left = left;
        geometry.top = top;
        Ok(())
    }

    pub fn set_scale(&mut self, index: usize, scale_x: f32, scale_y: f32) -> Result<()> {
        let geometry = self.require_geometry(index)?;
        geometry.scale_x = scale_x;
        geometry.scale_y = scale_y;
        Ok(())
    }

    pub fn set_angle(&mut self, index: usize, angle: f32) -> Result<()> {
        self.require_geometry(index)?.set_angle(angle);
        Ok(())
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> Result<()> {
        self.require_geometry(index)?.set_opacity(opacity);
        Ok(())
    }

    pub fn set_fill(&mut self, index: usize, fill: impl Into<String>) -> Result<()> {
        let layer = self.layer_mut(index)?;
        let paint = layer
            .paint_mut()
            .ok_or_else(|| ChefError::Validation(format!("Layer {index} has no paint")))?;
        paint.fill = fill.into();
        Ok(())
    }

    pub fn set_font(&mut self, index: usize, font: FontSpec) -> Result<()> {
        match self.layer_mut(index)? {
            Layer::Text { font: slot, .. } => {
                *slot = font;
                Ok(())
            }
            _ => Err(ChefError::Validation(format!(
                "Layer {index} is not a text layer"
            ))),
        }
    }

    fn require_geometry(&mut self, index: usize) -> Result<&mut Geometry> {
        self.layer_mut(index)?
            .geometry_mut()
            .ok_or_else(|| ChefError::Validation(format!("Layer {index} has no geometry")))
    }

    /// Mark the text layer at `index` as the title placeholder, clearing the
    /// marker from every other layer. At most one placeholder exists at a
    /// time.
    pub fn set_placeholder(&mut self, index: usize) -> Result<()> {
        match self.layers.get(index) {
            Some(Layer::Text { .. }) => {}
            Some(_) => {
                return Err(ChefError::Validation(format!(
                    "Layer {index} is not a text layer"
                )))
            }
            None => return Err(ChefError::Validation(format!("No layer at index {index}"))),
        }

        for (i, layer) in self.layers.iter_mut().enumerate() {
            if let Layer::Text { is_placeholder, .. } = layer {
                *is_placeholder = i == index;
            }
        }
        Ok(())
    }

    /// Drop the placeholder marker entirely.
    pub fn clear_placeholder(&mut self) {
        for layer in &mut self.layers {
            if let Layer::Text { is_placeholder, .. } = layer {
                *is_placeholder = false;
            }
        }
    }

    pub fn placeholder_index(&self) -> Option<usize> {
        self.layers.iter().position(
            |layer| matches!(layer, Layer::Text { is_placeholder: true, .. }),
        )
    }

    /// Replace the placeholder layer's content with `title`. Returns whether
    /// a placeholder existed.
    pub fn substitute_placeholder(&mut self, title: &str) -> bool {
        for layer in &mut self.layers {
            if let Layer::Text {
                content,
                is_placeholder: true,
                ..
            } = layer
            {
                *content = title.to_string();
                return true;
            }
        }
        false
    }

    /// Serialize to the stored JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reconstruct a scene from a stored document. `from_json` and `to_json`
    /// are mutually idempotent: a round trip reproduces the document.
    pub fn from_json(json: &str) -> Result<Scene> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scene() -> Scene {
        let mut scene = Scene::new(1024, 1024);
        scene.set_background("https://cdn.example/photo.jpg");
        scene.add_layer(Layer::Shape {
            kind: ShapeKind::Rect,
            width: 400.0,
            height: 120.0,
            geometry: Geometry::at(50.0, 800.0),
            paint: Paint {
                fill: "#222222".to_string(),
            },
        });
        let title = scene.add_layer(Layer::Text {
            content: "Sample Text".to_string(),
            geometry: Geometry::at(60.0, 820.0),
            paint: Paint {
                fill: "#ffffff".to_string(),
            },
            font: FontSpec::default(),
            is_placeholder: false,
        });
        scene.set_placeholder(title).unwrap();
        scene
    }

    #[test]
    fn test_serialize_roundtrip_is_identical() {
        let scene = sample_scene();
        let first = scene.to_json().unwrap();
        let reparsed = Scene::from_json(&first).unwrap();
        let second = reparsed.to_json().unwrap();
        assert_eq!(first, second);
        assert_eq!(scene, reparsed);
    }

    #[test]
    fn test_placeholder_is_mutually_exclusive() {
        let mut scene = sample_scene();
        let other = scene.add_layer(Layer::Text {
            content: "Subtitle".to_string(),
            geometry: Geometry::default(),
            paint: Paint::default(),
            font: FontSpec::default(),
            is_placeholder: false,
        });

        assert_eq!(scene.placeholder_index(), Some(2));
        scene.set_placeholder(other).unwrap();
        assert_eq!(scene.placeholder_index(), Some(other));

        // The previous placeholder was cleared, not duplicated
        let flagged = scene
            .layers()
            .iter()
            .filter(|layer| matches!(layer, Layer::Text { is_placeholder: true, .. }))
            .count();
        assert_eq!(flagged, 1);
    }

    #[test]
    fn test_set_placeholder_rejects_non_text() {
        let mut scene = sample_scene();
        let err = scene.set_placeholder(1).unwrap_err();
        assert!(err.to_string().contains("not a text layer"));
        // Existing placeholder untouched after the failed call
        assert_eq!(scene.placeholder_index(), Some(2));
    }

    #[test]
    fn test_substitute_placeholder_sets_title() {
        let mut scene = sample_scene();
        assert!(scene.substitute_placeholder("Greek Salad"));
        match &scene.layers()[2] {
            Layer::Text { content, .. } => assert_eq!(content, "Greek Salad"),
            other => panic!("unexpected layer {other:?}"),
        }

        scene.clear_placeholder();
        assert!(!scene.substitute_placeholder("ignored"));
    }

    #[test]
    fn test_angle_normalized_and_opacity_clamped() {
        let mut scene = sample_scene();
        scene.set_angle(1, 450.0).unwrap();
        scene.set_opacity(1, 1.7).unwrap();
        match &scene.layers()[1] {
            Layer::Shape { geometry, .. } => {
                assert!((geometry.angle - 90.0).abs() < 1e-6);
                assert!((geometry.opacity - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected layer {other:?}"),
        }

        scene.set_angle(1, -90.0).unwrap();
        match &scene.layers()[1] {
            Layer::Shape { geometry, .. } => assert!((geometry.angle - 270.0).abs() < 1e-6),
            other => panic!("unexpected layer {other:?}"),
        }
    }

    #[test]
    fn test_geometry_paint_and_font_setters() {
        let mut scene = sample_scene();
        scene.set_position(1, 100.0, 200.0).unwrap();
        scene.set_scale(1, 2.0, 0.5).unwrap();
        scene.set_fill(1, "#00ff00").unwrap();
        match &scene.layers()[1] {
            Layer::Shape {
                geometry, paint, ..
            } => {
                assert_eq!((geometry.left, geometry.top), (100.0, 200.0));
                assert_eq!((geometry.scale_x, geometry.scale_y), (2.0, 0.5));
                assert_eq!(paint.fill, "#00ff00");
            }
            other => panic!("unexpected layer {other:?}"),
        }

        scene
            .set_font(
                2,
                FontSpec {
                    family: "Lora".to_string(),
                    size: 72.0,
                    weight: FontWeight::Bold,
                    style: FontStyle::Italic,
                    align: TextAlign::Center,
                },
            )
            .unwrap();
        match &scene.layers()[2] {
            Layer::Text { font, .. } => {
                assert_eq!(font.family, "Lora");
                assert_eq!(font.weight, FontWeight::Bold);
            }
            other => panic!("unexpected layer {other:?}"),
        }

        // Paint and font setters reject layers of the wrong kind
        assert!(scene.set_font(1, FontSpec::default()).is_err());
        assert!(scene.set_fill(0, "#123456").is_err());
    }

    #[test]
    fn test_background_replaced_in_place() {
        let mut scene = sample_scene();
        scene.set_background("https://cdn.example/other.jpg");
        assert_eq!(scene.background(), Some("https://cdn.example/other.jpg"));
        let backgrounds = scene
            .layers()
            .iter()
            .filter(|layer| matches!(layer, Layer::Background { .. }))
            .count();
        assert_eq!(backgrounds, 1);
    }

    #[test]
    fn test_remove_layer_out_of_bounds() {
        let mut scene = sample_scene();
        assert!(scene.remove_layer(99).is_err());
        let removed = scene.remove_layer(1).unwrap();
        assert!(matches!(removed, Layer::Shape { .. }));
        assert_eq!(scene.layers().len(), 2);
    }
}
