use std::future::Future;
use std::sync::Arc;

use super::{fresh, Backend, ConformanceFixture, TestResult, LIMITED_ITEM, LIMITED_STOCK};
use crate::record::PurchaseSubmission;
use crate::StoreError;

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    vec![TestResult::from_result(
        "concurrent",
        "racing_purchases_never_oversell",
        racing_purchases_never_oversell(factory).await,
    )]
}

// ── Racing purchases: exactly LIMITED_STOCK win ─────────────────────────────

/// N tasks each try to buy one unit of an item with LIMITED_STOCK units.
/// Exactly LIMITED_STOCK succeed; the rest must be rejected.
async fn racing_purchases_never_oversell<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = Arc::new(fresh(factory).await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let b = backend.clone();
        handles.push(tokio::spawn(async move {
            let result = b
                .submit_purchase(PurchaseSubmission {
                    product_id: LIMITED_ITEM.to_string(),
                    quantity: 1,
                    selection: Default::default(),
                })
                .await;
            match result {
                Ok(_) => Ok(true),
                Err(StoreError::Rejected { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StoreError| format!("storage error: {e}"))?;
        if won {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }

    if accepted != LIMITED_STOCK as usize {
        return Err(format!(
            "expected exactly {LIMITED_STOCK} accepted purchases, \
             got {accepted} ({rejected} rejected)"
        ));
    }
    Ok(())
}
