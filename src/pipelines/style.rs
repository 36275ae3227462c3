use log::info;
use uuid::Uuid;

use crate::error::{ChefError, Result};
use crate::model::Style;
use crate::pricing::STYLE_CREATION_COST;
use crate::providers::{ImageOptions, RecraftClient};
use crate::store::Backend;
use crate::template::process_image;

const BASE_STYLE: &str = "realistic_image";
const THUMBNAIL_PROMPT: &str =
    "A beautiful plate of food on a rustic wooden table with natural lighting";
/// Maximum dimension in pixels for reference images
const MAX_IMAGE_SIZE: u32 = 1024;
/// Reference upload size bounds in bytes
const MIN_TOTAL_SIZE: usize = 100;
const MAX_TOTAL_SIZE: usize = 5 * 1024 * 1024;

/// Register a custom style from reference images, generate its thumbnail,
/// persist it and charge the flat creation cost.
pub async fn create_style(
    recraft: &RecraftClient,
    store: &Backend,
    name: &str,
    images: Vec<(String, Vec<u8>)>,
) -> Result<Style> {
    if name.trim().is_empty() {
        return Err(ChefError::Validation(
            "Style name is required.".to_string(),
        ));
    }
    if images.is_empty() {
        return Err(ChefError::Validation(
            "At least one reference image is required.".to_string(),
        ));
    }

    let total_size: usize = images.iter().map(|(_, bytes)| bytes.len()).sum();
    if total_size > MAX_TOTAL_SIZE {
        return Err(ChefError::Validation(format!(
            "Total image size exceeds 5MB limit. Current total: {:.2}MB",
            total_size as f64 / 1024.0 / 1024.0
        )));
    }
    if total_size < MIN_TOTAL_SIZE {
        return Err(ChefError::Validation(
            "Total image size is too small. Please add larger images.".to_string(),
        ));
    }

    let balance = store
        .token_balance()
        .await
        .map_err(|_| ChefError::Api("Failed to check token balance".to_string()))?;
    if balance < STYLE_CREATION_COST {
        return Err(ChefError::InsufficientTokens(format!(
            "Style creation requires {STYLE_CREATION_COST} tokens."
        )));
    }

    // Downscale reference images before upload
    let mut processed = Vec::with_capacity(images.len());
    for (file_name, bytes) in images {
        let png = process_image(&bytes, MAX_IMAGE_SIZE)?;
        processed.push((png_name(&file_name), png));
    }

    let style_id = recraft.create_style(BASE_STYLE, processed).await?;

    // One test generation doubles as the thumbnail
    let thumbnail_url = recraft
        .generate_image(
            THUMBNAIL_PROMPT,
            &ImageOptions {
                custom_style_id: Some(style_id.clone()),
                ..Default::default()
            },
        )
        .await?;

    let style = Style {
        id: Uuid::new_v4(),
        name: name.to_string(),
        base_style: BASE_STYLE.to_string(),
        custom_style_id: style_id,
        thumbnail_url: Some(thumbnail_url),
    };
    store.insert_style(&style).await?;

    let debited = store
        .try_debit_tokens(STYLE_CREATION_COST)
        .await
        .unwrap_or(false);
    if !debited {
        return Err(ChefError::Api("Failed to deduct tokens".to_string()));
    }

    info!("Created style '{}' ({})", style.name, style.custom_style_id);
    Ok(style)
}

fn png_name(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.png"),
        None => format!("{original}.png"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_name_replaces_extension() {
        assert_eq!(png_name("photo.jpeg"), "photo.png");
        assert_eq!(png_name("photo"), "photo.png");
        assert_eq!(png_name("a.b.c.jpg"), "a.b.c.png");
    }
}
