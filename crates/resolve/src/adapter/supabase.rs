//! Hosted REST / object-storage client.

use std::time::Duration;

use async_trait::async_trait;
use bookstall_storage::{
    CatalogBackend, CatalogItemRecord, EntitlementRecord, EntitlementStore, ObjectSigner,
    PurchaseReceipt, PurchaseSubmission, StoreError,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{ServiceConfig, TableNames};

/// Client for the hosted backend.
///
/// - `apikey: <anon key>` on every request
/// - `Authorization: Bearer <access token>`, or the anon key when signed out
/// - 4xx answers become [`StoreError::Rejected`] with the service's message;
///   other failures become [`StoreError::Transport`]
#[derive(Clone)]
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    bearer: String,
    tables: TableNames,
    agent: ureq::Agent,
}

impl SupabaseClient {
    pub fn new(config: &ServiceConfig, tables: TableNames) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(config.timeout_secs.map(Duration::from_secs))
            .http_status_as_error(false)
            .build();
        let bearer = config
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| config.anon_key.clone());

        SupabaseClient {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            bearer,
            tables,
            agent: ureq::Agent::new_with_config(agent_config),
        }
    }

    fn rest_url(&self, relation: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, relation)
    }

    /// Run `call` on the blocking pool with a prepared [`Request`].
    async fn blocking<T, F>(&self, what: &'static str, call: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Request) -> Result<T, StoreError> + Send + 'static,
    {
        let request = Request {
            agent: self.agent.clone(),
            anon_key: self.anon_key.clone(),
            bearer: self.bearer.clone(),
        };
        tokio::task::spawn_blocking(move || call(request))
            .await
            .map_err(|e| StoreError::Backend(format!("{what}: task join error: {e}")))?
    }
}

/// What a blocking call needs from the client.
struct Request {
    agent: ureq::Agent,
    anon_key: String,
    bearer: String,
}

impl Request {
    fn get(&self, url: &str, query: &[(&str, String)], what: &str) -> Result<String, StoreError> {
        let mut request = self
            .agent
            .get(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", &format!("Bearer {}", self.bearer))
            .header("Accept", "application/json");
        for (key, value) in query {
            request = request.query(*key, value);
        }
        read_response(request.call(), what)
    }

    fn post(&self, url: &str, body: &serde_json::Value, what: &str) -> Result<String, StoreError> {
        let response = self
            .agent
            .post(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", &format!("Bearer {}", self.bearer))
            .send_json(body);
        read_response(response, what)
    }
}

fn read_response(
    response: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    what: &str,
) -> Result<String, StoreError> {
    let mut response = response.map_err(|e| StoreError::Transport {
        message: format!("{what}: {e}"),
    })?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| StoreError::Transport {
            message: format!("{what}: error reading response: {e}"),
        })?;

    match status {
        200..=299 => Ok(body),
        400..=499 => Err(StoreError::Rejected {
            message: error_message(&body).unwrap_or_else(|| format!("HTTP {status}")),
        }),
        _ => Err(StoreError::Transport {
            message: match error_message(&body) {
                Some(message) => format!("{what}: HTTP {status}: {message}"),
                None => format!("{what}: HTTP {status}"),
            },
        }),
    }
}

/// The human-readable part of an error body.
///
/// REST errors carry `message`; storage errors carry `error` and/or
/// `message`; gateways sometimes use `msg`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error", "msg"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Decode {
        what: what.to_string(),
        message: e.to_string(),
    })
}

/// Decode a body that is either one object or an array of them.
fn decode_one<T: DeserializeOwned>(body: &str, what: &str) -> Result<Option<T>, StoreError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<R> {
        Many(Vec<R>),
        One(R),
    }
    Ok(match decode::<OneOrMany<T>>(body, what)? {
        OneOrMany::Many(rows) => rows.into_iter().next(),
        OneOrMany::One(row) => Some(row),
    })
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Turn a sign response path into an absolute URL.
///
/// The service answers `/object/sign/...`, relative to `/storage/v1`.
/// Absolute answers are used as-is.
fn absolute_signed_url(base_url: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_string();
    }
    let signed = signed.trim_start_matches('/');
    let signed = signed.strip_prefix("storage/v1/").unwrap_or(signed);
    format!("{base_url}/storage/v1/{signed}")
}

/// `{base}/storage/v1/object/{kind}/{bucket}/{key}` with each segment of
/// the decoded key percent-encoded.
fn object_url(base_url: &str, kind: &str, bucket: &str, path: &str) -> Result<String, StoreError> {
    let invalid = || StoreError::Backend(format!("service url '{base_url}' cannot hold a path"));
    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(["storage", "v1", "object", kind, bucket.trim_matches('/')])
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url.into())
}

#[async_trait]
impl EntitlementStore for SupabaseClient {
    async fn find_active_entitlement(
        &self,
        content_id: &str,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, StoreError> {
        let url = self.rest_url(&self.tables.purchases);
        let query = vec![
            (
                "select",
                format!("*,content:{}(id,title,file_url,business_id)", self.tables.content),
            ),
            ("book_id", format!("eq.{content_id}")),
            ("user_id", format!("eq.{user_id}")),
            ("payment_status", "eq.completed".to_string()),
            ("access_granted", "eq.true".to_string()),
            ("limit", "1".to_string()),
        ];
        tracing::debug!(content_id, table = %self.tables.purchases, "querying entitlement");

        let found: Option<EntitlementRecord> = self
            .blocking("entitlement query", move |req| {
                let body = req.get(&url, &query, "entitlement query")?;
                decode_one(&body, "entitlement")
            })
            .await?;
        // The filter is server-side; re-check so a misconfigured table can
        // never grant access.
        Ok(found.filter(|e| e.grants_access()))
    }
}

#[async_trait]
impl ObjectSigner for SupabaseClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let url = object_url(&self.base_url, "sign", bucket, path)?;
        let body = serde_json::json!({ "expiresIn": expires_in.as_secs() });

        let signed: SignResponse = self
            .blocking("sign object", move |req| {
                let body = req.post(&url, &body, "sign object")?;
                decode(&body, "sign response")
            })
            .await?;
        Ok(absolute_signed_url(&self.base_url, &signed.signed_url))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        object_url(&self.base_url, "public", bucket, path).unwrap_or_else(|_| {
            format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
        })
    }
}

#[async_trait]
impl CatalogBackend for SupabaseClient {
    async fn fetch_item(&self, item_id: &str) -> Result<CatalogItemRecord, StoreError> {
        let url = self.rest_url(&self.tables.products);
        let query = vec![
            ("id", format!("eq.{item_id}")),
            ("select", "*".to_string()),
            ("limit", "1".to_string()),
        ];

        let found: Option<CatalogItemRecord> = self
            .blocking("product lookup", move |req| {
                let body = req.get(&url, &query, "product lookup")?;
                decode_one(&body, "product")
            })
            .await?;
        found.ok_or_else(|| StoreError::NotFound {
            kind: "product".to_string(),
            id: item_id.to_string(),
        })
    }

    async fn submit_purchase(
        &self,
        submission: PurchaseSubmission,
    ) -> Result<PurchaseReceipt, StoreError> {
        let url = self.rest_url(&format!("rpc/{}", self.tables.purchase_rpc));
        let body = serde_json::to_value(&submission).map_err(|e| StoreError::Decode {
            what: "purchase submission".to_string(),
            message: e.to_string(),
        })?;

        let receipt: Option<PurchaseReceipt> = self
            .blocking("purchase", move |req| {
                let body = req.post(&url, &body, "purchase")?;
                decode_one(&body, "purchase receipt")
            })
            .await?;
        receipt.ok_or_else(|| StoreError::Decode {
            what: "purchase receipt".to_string(),
            message: "empty response".to_string(),
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
