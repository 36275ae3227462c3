//! All token costs in one place. Pricing intentionally differs per feature;
//! callers must read from here rather than re-deriving constants.

use crate::model::TokenPackage;

/// Flat cost of registering a custom style
pub const STYLE_CREATION_COST: i64 = 10;

/// Per-recipe image cost by provider
pub const RECIPE_IMAGE_COST_FLUX: i64 = 1;
pub const RECIPE_IMAGE_COST_RECRAFT: i64 = 2;

/// Purchasable bundles shown in the top-up dialog
pub const TOKEN_PACKAGES: [TokenPackage; 3] = [
    TokenPackage {
        tokens: 30,
        price_usd: 3,
        description: "Perfect for trying out the service",
    },
    TokenPackage {
        tokens: 200,
        price_usd: 17,
        description: "Most popular for regular bloggers",
    },
    TokenPackage {
        tokens: 800,
        price_usd: 70,
        description: "Best value for power users",
    },
];

/// Tokens required for a plagiarism check: 2 per started 500-word block.
pub fn plagiarism_cost(word_count: u64) -> i64 {
    (word_count.div_ceil(500) * 2) as i64
}

/// Tokens required for a feed extraction of `count` recipe ideas.
pub fn feed_extraction_cost(count: u64) -> i64 {
    count.div_ceil(25) as i64
}

/// Whitespace-delimited word count, the unit the plagiarism pricing is
/// quoted in.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
