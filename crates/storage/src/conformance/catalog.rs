use std::future::Future;

use super::{
    fresh, Backend, ConformanceFixture, TestResult, LIMITED_ITEM, LIMITED_STOCK, UNLIMITED_ITEM,
};
use crate::record::PurchaseSubmission;
use crate::StoreError;

pub(super) async fn run_catalog_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "catalog",
            "fetch_item_returns_variations",
            fetch_item_returns_variations(factory).await,
        ),
        TestResult::from_result(
            "catalog",
            "missing_item_is_not_found",
            missing_item_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "catalog",
            "purchase_within_stock_is_accepted",
            purchase_within_stock_is_accepted(factory).await,
        ),
        TestResult::from_result(
            "catalog",
            "purchase_beyond_stock_is_rejected",
            purchase_beyond_stock_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "catalog",
            "unmanaged_stock_never_rejects",
            unmanaged_stock_never_rejects(factory).await,
        ),
    ]
}

fn submission(item_id: &str, quantity: u32) -> PurchaseSubmission {
    PurchaseSubmission {
        product_id: item_id.to_string(),
        quantity,
        selection: [("Size".to_string(), "M".to_string())]
            .into_iter()
            .collect(),
    }
}

async fn fetch_item_returns_variations<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let item = backend
        .fetch_item(LIMITED_ITEM)
        .await
        .map_err(|e| format!("fetch: {e}"))?;
    if item.id != LIMITED_ITEM {
        return Err(format!("fetched wrong item: {}", item.id));
    }
    if !item.manage_stock || item.stock_quantity != LIMITED_STOCK {
        return Err(format!(
            "stock fields not preserved: manage={}, qty={}",
            item.manage_stock, item.stock_quantity
        ));
    }
    let variation = item.variations.first().ok_or("variations missing")?;
    if variation.options != ["S", "M", "L"] {
        return Err(format!(
            "option order not preserved: {:?}",
            variation.options
        ));
    }
    Ok(())
}

async fn missing_item_is_not_found<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    match backend.fetch_item("no-such-item").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected NotFound, got {other}")),
        Ok(item) => Err(format!("expected NotFound, got item {}", item.id)),
    }
}

async fn purchase_within_stock_is_accepted<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let quantity = LIMITED_STOCK as u32;
    let receipt = backend
        .submit_purchase(submission(LIMITED_ITEM, quantity))
        .await
        .map_err(|e| format!("purchase: {e}"))?;
    if receipt.product_id != LIMITED_ITEM || receipt.quantity != quantity {
        return Err(format!(
            "receipt does not match submission: {}x{}",
            receipt.product_id, receipt.quantity
        ));
    }
    if receipt.purchase_id.is_empty() {
        return Err("receipt has no purchase id".to_string());
    }
    Ok(())
}

async fn purchase_beyond_stock_is_rejected<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let quantity = LIMITED_STOCK as u32 + 1;
    match backend.submit_purchase(submission(LIMITED_ITEM, quantity)).await {
        Err(StoreError::Rejected { .. }) => Ok(()),
        Err(other) => Err(format!("expected Rejected, got {other}")),
        Ok(receipt) => Err(format!(
            "oversold: accepted purchase {}",
            receipt.purchase_id
        )),
    }
}

async fn unmanaged_stock_never_rejects<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    backend
        .submit_purchase(submission(UNLIMITED_ITEM, 50))
        .await
        .map_err(|e| format!("unmanaged stock purchase rejected: {e}"))?;
    Ok(())
}
