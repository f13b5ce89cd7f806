use std::future::Future;

use super::{
    fresh, Backend, ConformanceFixture, TestResult, BOOK, BOOK_BUCKET, BOOK_PATH, BUYER,
    PENDING_BUYER, REFUNDED_BUYER, REVOKED_BUYER,
};
use crate::record::PaymentStatus;

pub(super) async fn run_entitlement_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "entitlement",
            "completed_and_granted_is_found",
            completed_and_granted_is_found(factory).await,
        ),
        TestResult::from_result(
            "entitlement",
            "joined_content_carries_location",
            joined_content_carries_location(factory).await,
        ),
        TestResult::from_result(
            "entitlement",
            "inactive_purchases_are_invisible",
            inactive_purchases_are_invisible(factory).await,
        ),
        TestResult::from_result(
            "entitlement",
            "unknown_user_and_content_are_invisible",
            unknown_user_and_content_are_invisible(factory).await,
        ),
    ]
}

async fn completed_and_granted_is_found<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let record = backend
        .find_active_entitlement(BOOK, BUYER)
        .await
        .map_err(|e| format!("query: {e}"))?
        .ok_or("expected an active entitlement for the buyer")?;

    if record.user_id != BUYER || record.content_id != BOOK {
        return Err(format!(
            "wrong record returned: {}/{}",
            record.user_id, record.content_id
        ));
    }
    if record.payment_status != PaymentStatus::Completed || !record.access_granted {
        return Err(format!(
            "returned record is not active: status={}, granted={}",
            record.payment_status.as_str(),
            record.access_granted
        ));
    }
    Ok(())
}

async fn joined_content_carries_location<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let record = backend
        .find_active_entitlement(BOOK, BUYER)
        .await
        .map_err(|e| format!("query: {e}"))?
        .ok_or("expected an active entitlement for the buyer")?;

    let content = record.content.ok_or("joined content row missing")?;
    let location = content.file_url.ok_or("joined content has no file_url")?;
    if !location.contains(BOOK_BUCKET) || !location.contains(BOOK_PATH) {
        return Err(format!("unexpected document location: {location}"));
    }
    Ok(())
}

async fn inactive_purchases_are_invisible<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    for user in [PENDING_BUYER, REFUNDED_BUYER, REVOKED_BUYER] {
        let found = backend
            .find_active_entitlement(BOOK, user)
            .await
            .map_err(|e| format!("query for {user}: {e}"))?;
        if found.is_some() {
            return Err(format!("inactive purchase of {user} was returned"));
        }
    }
    Ok(())
}

async fn unknown_user_and_content_are_invisible<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let cases = [(BOOK, "stranger"), ("no-such-book", BUYER)];
    for (content_id, user_id) in cases {
        let found = backend
            .find_active_entitlement(content_id, user_id)
            .await
            .map_err(|e| format!("query for {content_id}/{user_id}: {e}"))?;
        if found.is_some() {
            return Err(format!(
                "entitlement returned for {content_id}/{user_id}"
            ));
        }
    }
    Ok(())
}
