mod compose;
mod scene;

pub use compose::{
    encode_jpeg, process_image, proxied_url, to_data_url, Composer, FontCatalog,
};
pub use scene::{
    FontSpec, FontStyle, FontWeight, Geometry, Layer, Paint, Scene, ShapeKind, TextAlign,
};
