use log::info;

use crate::error::Result;
use crate::model::TokenPackage;
use crate::pricing::TOKEN_PACKAGES;
use crate::store::Backend;

/// Look up a catalog package by its token amount.
pub fn package_for(tokens: i64) -> Option<&'static TokenPackage> {
    TOKEN_PACKAGES.iter().find(|pkg| pkg.tokens == tokens)
}

/// Credit a completed purchase. Payment capture itself is the payment
/// provider's job; this runs only after it reports success. Returns the new
/// balance.
pub async fn complete_purchase(store: &Backend, package: &TokenPackage) -> Result<i64> {
    store.add_tokens(package.tokens).await?;
    let balance = store.token_balance().await?;
    info!(
        "Credited {} tokens (${} package); balance now {balance}",
        package.tokens, package.price_usd
    );
    Ok(balance)
}
