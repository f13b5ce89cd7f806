use std::future::Future;
use std::time::Duration;

use super::{fresh, Backend, ConformanceFixture, TestResult, BOOK_BUCKET, BOOK_PATH};

pub(super) async fn run_signer_tests<B, F, Fut>(factory: &F) -> Vec<TestResult>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    vec![
        TestResult::from_result(
            "signer",
            "signed_url_differs_from_public_url",
            signed_url_differs_from_public_url(factory).await,
        ),
        TestResult::from_result(
            "signer",
            "public_url_names_bucket_and_path",
            public_url_names_bucket_and_path(factory).await,
        ),
    ]
}

async fn signed_url_differs_from_public_url<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let signed = backend
        .create_signed_url(BOOK_BUCKET, BOOK_PATH, Duration::from_secs(3600))
        .await
        .map_err(|e| format!("sign: {e}"))?;
    if signed.is_empty() {
        return Err("signed URL is empty".to_string());
    }
    if signed == backend.public_url(BOOK_BUCKET, BOOK_PATH) {
        return Err("signed URL is identical to the public URL".to_string());
    }
    Ok(())
}

async fn public_url_names_bucket_and_path<B, F, Fut>(factory: &F) -> Result<(), String>
where
    B: Backend,
    F: Fn(ConformanceFixture) -> Fut,
    Fut: Future<Output = B>,
{
    let backend = fresh(factory).await;
    let url = backend.public_url(BOOK_BUCKET, BOOK_PATH);
    let expected_suffix = format!("/{BOOK_BUCKET}/{BOOK_PATH}");
    if !url.starts_with(backend.base_url()) || !url.ends_with(&expected_suffix) {
        return Err(format!("unexpected public URL: {url}"));
    }
    Ok(())
}
