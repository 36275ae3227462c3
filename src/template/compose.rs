use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use ab_glyph::{FontArc, PxScale};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_ellipse_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::point::Point;
use log::debug;
use reqwest::Client;

use crate::error::{ChefError, Result};
use crate::template::scene::{FontSpec, FontStyle, FontWeight, Geometry, Layer, Scene, ShapeKind, TextAlign};

/// Hosts that refuse cross-origin reads; their images must come through the
/// read-through proxy or the exported canvas is unusable.
const RESTRICTED_HOSTS: [&str; 1] = ["bfl.ai"];
const READ_THROUGH_PROXY: &str = "https://api.allorigins.win/raw?url=";

const JPEG_QUALITY: u8 = 90;
const LINE_SPACING: f32 = 1.2;

/// Route `url` through the public read-through proxy when its host is known
/// to block cross-origin image reads.
pub fn proxied_url(url: &str) -> String {
    if RESTRICTED_HOSTS.iter().any(|host| url.contains(host)) {
        format!("{READ_THROUGH_PROXY}{}", urlencoding::encode(url))
    } else {
        url.to_string()
    }
}

/// Fonts available to the renderer, keyed by lowercased family name.
/// Variant files register as `family-bold`, `family-italic` or
/// `family-bold-italic`; resolution falls back variant -> family -> first
/// registered font.
#[derive(Default)]
pub struct FontCatalog {
    fonts: BTreeMap<String, FontArc>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Register a font from raw TTF/OTF bytes
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| ChefError::Validation(format!("Invalid font data for {family}: {e}")))?;
        self.fonts.insert(family.to_lowercase(), font);
        Ok(())
    }

    /// Load every .ttf/.otf under `dir`; the file stem becomes the family key
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut catalog = FontCatalog::new();
        let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
                .unwrap_or(false);
            if !is_font {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            catalog.register(stem, bytes)?;
            debug!("Registered font {stem}");
        }
        Ok(catalog)
    }

    fn resolve(&self, spec: &FontSpec) -> Result<&FontArc> {
        let family = spec.family.to_lowercase();
        let mut candidates = Vec::new();
        match (spec.weight, spec.style) {
            (FontWeight::Bold, FontStyle::Italic) => {
                candidates.push(format!("{family}-bold-italic"))
            }
            (FontWeight::Bold, FontStyle::Normal) => candidates.push(format!("{family}-bold")),
            (FontWeight::Normal, FontStyle::Italic) => candidates.push(format!("{family}-italic")),
            (FontWeight::Normal, FontStyle::Normal) => {}
        }
        candidates.push(family);

        for candidate in &candidates {
            if let Some(font) = self.fonts.get(candidate) {
                return Ok(font);
            }
        }
        self.fonts.values().next().ok_or(ChefError::NotConfigured(
            "Font catalog (fonts_dir)",
        ))
    }
}

/// Off-screen scene renderer: reconstructs a stored scene over a recipe
/// photo and exports a single raster image.
pub struct Composer {
    client: Client,
    fonts: FontCatalog,
}

impl Composer {
    pub fn new(fonts: FontCatalog) -> Result<Self> {
        Ok(Composer {
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
            fonts,
        })
    }

    /// Render `scene` over the photo at `photo_url`, substituting the title
    /// into the placeholder layer if one exists.
    pub async fn compose(
        &self,
        scene: &Scene,
        photo_url: &str,
        title: Option<&str>,
    ) -> Result<RgbaImage> {
        let mut scene = scene.clone();
        if let Some(title) = title {
            scene.substitute_placeholder(title);
        }

        let photo = self.fetch_image(photo_url).await?;

        let mut images: BTreeMap<String, DynamicImage> = BTreeMap::new();
        for layer in scene.layers() {
            if let Layer::Image { src, .. } = layer {
                if !images.contains_key(src) {
                    images.insert(src.clone(), self.fetch_image(src).await?);
                }
            }
        }

        self.render(&scene, &photo, &images)
    }

    /// Render and export as JPEG bytes
    pub async fn compose_jpeg(
        &self,
        scene: &Scene,
        photo_url: &str,
        title: Option<&str>,
    ) -> Result<Vec<u8>> {
        let canvas = self.compose(scene, photo_url, title).await?;
        encode_jpeg(&canvas)
    }

    /// Pure rendering pass over pre-fetched images; the supplied photo
    /// replaces any stored background, scaled to canvas dimensions with the
    /// original aspect ratio ignored.
    pub fn render(
        &self,
        scene: &Scene,
        photo: &DynamicImage,
        images: &BTreeMap<String, DynamicImage>,
    ) -> Result<RgbaImage> {
        let mut canvas = imageops::resize(
            photo,
            scene.width,
            scene.height,
            imageops::FilterType::Triangle,
        );

        for layer in scene.layers() {
            match layer {
                // The photo is the background for output composition
                Layer::Background { .. } => {}
                Layer::Shape {
                    kind,
                    width,
                    height,
                    geometry,
                    paint,
                } => {
                    let w = scaled_dim(*width, geometry.scale_x);
                    let h = scaled_dim(*height, geometry.scale_y);
                    let color = parse_color(&paint.fill)?;
                    let mut buf = match kind {
                        ShapeKind::Rect => RgbaImage::from_pixel(w, h, color),
                        ShapeKind::Circle => {
                            let mut buf = transparent(w, h);
                            draw_filled_ellipse_mut(
                                &mut buf,
                                (w as i32 / 2, h as i32 / 2),
                                w as i32 / 2,
                                h as i32 / 2,
                                color,
                            );
                            buf
                        }
                    };
                    apply_opacity(&mut buf, geometry.opacity);
                    place(&mut canvas, buf, geometry);
                }
                Layer::Path {
                    points,
                    geometry,
                    paint,
                } => {
                    if points.len() < 3 {
                        continue;
                    }
                    let color = parse_color(&paint.fill)?;
                    let scaled: Vec<Point<i32>> = points
                        .iter()
                        .map(|[x, y]| {
                            Point::new(
                                (x * geometry.scale_x).round() as i32,
                                (y * geometry.scale_y).round() as i32,
                            )
                        })
                        .collect();
                    let max_x = scaled.iter().map(|p| p.x).max().unwrap_or(0).max(1);
                    let max_y = scaled.iter().map(|p| p.y).max().unwrap_or(0).max(1);
                    let mut buf = transparent(max_x as u32 + 1, max_y as u32 + 1);
                    let mut polygon = scaled;
                    if polygon.first() == polygon.last() {
                        polygon.pop();
                    }
                    draw_polygon_mut(&mut buf, &polygon, color);
                    apply_opacity(&mut buf, geometry.opacity);
                    place(&mut canvas, buf, geometry);
                }
                Layer::Image {
                    src,
                    width,
                    height,
                    geometry,
                } => {
                    let source = images.get(src).ok_or_else(|| {
                        ChefError::Validation(format!("Image layer source not fetched: {src}"))
                    })?;
                    let w = scaled_dim(*width, geometry.scale_x);
                    let h = scaled_dim(*height, geometry.scale_y);
                    let mut buf =
                        imageops::resize(source, w, h, imageops::FilterType::Triangle);
                    apply_opacity(&mut buf, geometry.opacity);
                    place(&mut canvas, buf, geometry);
                }
                Layer::Text {
                    content,
                    geometry,
                    paint,
                    font,
                    ..
                } => {
                    let buf = self.render_text(content, font, paint, geometry)?;
                    place(&mut canvas, buf, geometry);
                }
            }
        }

        Ok(canvas)
    }

    fn render_text(
        &self,
        content: &str,
        spec: &FontSpec,
        paint: &crate::template::scene::Paint,
        geometry: &Geometry,
    ) -> Result<RgbaImage> {
        let font = self.fonts.resolve(spec)?;
        let color = parse_color(&paint.fill)?;
        let scale = PxScale::from(spec.size * geometry.scale_y.max(f32::EPSILON));
        let line_height = (spec.size * geometry.scale_y * LINE_SPACING).ceil() as u32;

        let lines: Vec<&str> = content.lines().collect();
        let widths: Vec<u32> = lines
            .iter()
            .map(|line| text_size(scale, font, line).0)
            .collect();
        let block_w = widths.iter().copied().max().unwrap_or(1).max(1);
        let block_h = (line_height * lines.len() as u32).max(1);

        let mut buf = transparent(block_w, block_h);
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let x = match spec.align {
                TextAlign::Left => 0,
                TextAlign::Center => (block_w - widths[i]) / 2,
                TextAlign::Right => block_w - widths[i],
            };
            draw_text_mut(
                &mut buf,
                color,
                x as i32,
                (i as u32 * line_height) as i32,
                scale,
                font,
                line,
            );
        }
        apply_opacity(&mut buf, geometry.opacity);
        Ok(buf)
    }

    async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let fetch_url = proxied_url(url);
        debug!("Fetching image {fetch_url}");
        let response = self.client.get(&fetch_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChefError::Api(format!(
                "Failed to load image ({status}): {url}"
            )));
        }
        let bytes = response.bytes().await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

/// Downscale a reference image so its long edge is at most `max_size`,
/// preserving aspect ratio, and re-encode as PNG.
pub fn process_image(bytes: &[u8], max_size: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());

    let (new_w, new_h) = if width > height && width > max_size {
        (max_size, (height as u64 * max_size as u64 / width as u64) as u32)
    } else if height > max_size {
        ((width as u64 * max_size as u64 / height as u64) as u32, max_size)
    } else {
        (width, height)
    };

    let resized = if (new_w, new_h) == (width, height) {
        img
    } else {
        img.resize_exact(new_w, new_h, imageops::FilterType::Triangle)
    };

    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Encode a rendered canvas as JPEG
pub fn encode_jpeg(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// `data:image/jpeg;base64,...` form of exported JPEG bytes
pub fn to_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}

fn transparent(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([0, 0, 0, 0]))
}

fn scaled_dim(dim: f32, scale: f32) -> u32 {
    (dim * scale).round().max(1.0) as u32
}

fn apply_opacity(buf: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if (opacity - 1.0).abs() < f32::EPSILON {
        return;
    }
    for pixel in buf.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * opacity).round() as u8;
    }
}

/// Overlay a layer buffer at its geometry's position, rotating about the
/// layer center when the angle is non-zero.
fn place(canvas: &mut RgbaImage, buf: RgbaImage, geometry: &Geometry) {
    let (w, h) = buf.dimensions();
    let left = geometry.left.round() as i64;
    let top = geometry.top.round() as i64;

    if geometry.angle.abs() < f32::EPSILON {
        imageops::overlay(canvas, &buf, left, top);
        return;
    }

    // Pad to the rotation's bounding square before rotating
    let side = (((w * w + h * h) as f32).sqrt().ceil() as u32).max(1);
    let mut padded = transparent(side, side);
    imageops::overlay(
        &mut padded,
        &buf,
        ((side - w) / 2) as i64,
        ((side - h) / 2) as i64,
    );
    let rotated = rotate_about_center(
        &padded,
        geometry.angle.to_radians(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    );
    let dx = left + w as i64 / 2 - side as i64 / 2;
    let dy = top + h as i64 / 2 - side as i64 / 2;
    imageops::overlay(canvas, &rotated, dx, dy);
}

fn parse_color(fill: &str) -> Result<Rgba<u8>> {
    let hex = fill.trim_start_matches('#');
    let (r, g, b) = match hex.len() {
        6 => (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ),
        3 => {
            let expand = |c: &str| u8::from_str_radix(c, 16).map(|v| v * 17);
            (expand(&hex[0..1]), expand(&hex[1..2]), expand(&hex[2..3]))
        }
        _ => {
            return Err(ChefError::Validation(format!(
                "Unsupported fill color: {fill}"
            )))
        }
    };
    match (r, g, b) {
        (Ok(r), Ok(g), Ok(b)) => Ok(Rgba([r, g, b, 255])),
        _ => Err(ChefError::Validation(format!(
            "Unsupported fill color: {fill}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::scene::Paint;
    use image::GenericImageView;

    fn shapes_scene() -> Scene {
        let mut scene = Scene::new(100, 100);
        scene.set_background("https://cdn.example/photo.jpg");
        scene.add_layer(Layer::Shape {
            kind: ShapeKind::Rect,
            width: 40.0,
            height: 20.0,
            geometry: Geometry::at(10.0, 10.0),
            paint: Paint {
                fill: "#ff0000".to_string(),
            },
        });
        scene
    }

    fn composer() -> Composer {
        Composer::new(FontCatalog::new()).unwrap()
    }

    fn solid_photo(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn test_background_scaled_to_canvas_ignoring_aspect() {
        let photo = solid_photo(640, 480, [0, 0, 255, 255]);
        let canvas = composer()
            .render(&shapes_scene(), &photo, &BTreeMap::new())
            .unwrap();
        assert_eq!(canvas.dimensions(), (100, 100));
        // A corner outside any layer keeps the photo color
        assert_eq!(canvas.get_pixel(99, 99), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_rect_layer_painted_at_position() {
        let photo = solid_photo(100, 100, [0, 0, 0, 255]);
        let canvas = composer()
            .render(&shapes_scene(), &photo, &BTreeMap::new())
            .unwrap();
        assert_eq!(canvas.get_pixel(30, 15), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(5, 5), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_opacity_blends_with_background() {
        let mut scene = shapes_scene();
        scene.set_opacity(1, 0.5).unwrap();
        let photo = solid_photo(100, 100, [0, 0, 0, 255]);
        let canvas = composer().render(&scene, &photo, &BTreeMap::new()).unwrap();
        let pixel = canvas.get_pixel(30, 15);
        // Half-opacity red over black lands mid-range
        assert!(pixel[0] > 100 && pixel[0] < 160, "got {pixel:?}");
        assert_eq!(pixel[2], 0);
    }

    #[test]
    fn test_text_layer_without_fonts_is_an_error() {
        let mut scene = shapes_scene();
        scene.add_layer(Layer::Text {
            content: "Title".to_string(),
            geometry: Geometry::at(5.0, 5.0),
            paint: Paint::default(),
            font: FontSpec::default(),
            is_placeholder: true,
        });
        let photo = solid_photo(100, 100, [0, 0, 0, 255]);
        let err = composer()
            .render(&scene, &photo, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ChefError::NotConfigured(_)));
    }

    #[test]
    fn test_proxied_url_routes_restricted_hosts() {
        let url = "https://cdn.bfl.ai/images/sample.jpg?sig=abc";
        let proxied = proxied_url(url);
        assert!(proxied.starts_with("https://api.allorigins.win/raw?url="));
        assert!(proxied.contains("https%3A%2F%2Fcdn.bfl.ai"));

        let plain = "https://img.recraft.ai/out.png";
        assert_eq!(proxied_url(plain), plain);
    }

    #[test]
    fn test_parse_color_forms() {
        assert_eq!(parse_color("#ff8800").unwrap(), Rgba([255, 136, 0, 255]));
        assert_eq!(parse_color("#f80").unwrap(), Rgba([255, 136, 0, 255]));
        assert!(parse_color("tomato").is_err());
    }

    #[test]
    fn test_process_image_downscales_long_edge() {
        let big = solid_photo(800, 400, [10, 20, 30, 255]);
        let mut bytes = Cursor::new(Vec::new());
        big.write_to(&mut bytes, ImageFormat::Png).unwrap();

        let processed = process_image(bytes.get_ref(), 200).unwrap();
        let reloaded = image::load_from_memory(&processed).unwrap();
        assert_eq!(reloaded.width(), 200);
        assert_eq!(reloaded.height(), 100);

        // Already-small images pass through at original dimensions
        let small = solid_photo(50, 40, [1, 2, 3, 255]);
        let mut small_bytes = Cursor::new(Vec::new());
        small.write_to(&mut small_bytes, ImageFormat::Png).unwrap();
        let processed = process_image(small_bytes.get_ref(), 200).unwrap();
        let reloaded = image::load_from_memory(&processed).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (50, 40));
    }

    #[test]
    fn test_data_url_prefix() {
        let url = to_data_url(&[0xff, 0xd8, 0xff]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_jpeg_export_roundtrips() {
        let photo = solid_photo(100, 100, [0, 0, 0, 255]);
        let canvas = composer()
            .render(&shapes_scene(), &photo, &BTreeMap::new())
            .unwrap();
        let jpeg = encode_jpeg(&canvas).unwrap();
        let reloaded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(reloaded.dimensions(), (100, 100));
    }
}
