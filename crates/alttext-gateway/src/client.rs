//! HTTP client for the licensing and generation service.

use std::sync::Arc;
use std::time::Duration;

use alttext_config::{LicenseKey, SettingsStore};
use alttext_core::{
    BatchItemResult, EncodedImage, GenerationError, QuotaGateway, UsageSnapshot,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::model::{
    BatchRequest, BatchResponse, ErrorBody, GenerateRequest, GenerateResponse,
    GenerationAllowance, IncrementRequest, ReturnUrlRequest, Subscription, UrlResponse,
    UsageIncrement,
};

/// Header carrying the license key on every authenticated request.
pub const HEADER_AUTHORIZATION: &str = "x-authorization";

const PATH_SUBSCRIPTION: &str = "/api/plugin/subscription";
const PATH_PORTAL: &str = "/api/plugin/portal";
const PATH_USAGE: &str = "/api/plugin/usage";
const PATH_USAGE_INCREMENT: &str = "/api/plugin/usage/increment";
const PATH_GENERATE: &str = "/api/plugin/generate";
const PATH_GENERATE_BATCH: &str = "/api/plugin/generate-batch";
const PATH_CHECKOUT: &str = "/api/plugin/checkout";

/// Client for the licensing service, authenticated with the stored license key.
#[derive(Clone)]
pub struct LicensingClient {
    http: Client,
    base_url: Url,
    settings: Arc<dyn SettingsStore>,
}

impl LicensingClient {
    /// Build a client with its own connection pool and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        settings: Arc<dyn SettingsStore>,
    ) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                operation: "client.build",
                source,
            })?;
        Ok(Self::with_client(http, base_url, settings))
    }

    /// Build a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(http: Client, base_url: Url, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            http,
            base_url,
            settings,
        }
    }

    /// Base URL of the service.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Public pricing page.
    #[must_use]
    pub fn pricing_url(&self) -> String {
        format!("{}/pricing", self.base_str())
    }

    /// Account dashboard page.
    #[must_use]
    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.base_str())
    }

    /// Whether a license key is stored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Settings`] if the settings cannot be read.
    pub async fn has_license_key(&self) -> GatewayResult<bool> {
        Ok(self.license_key().await?.is_some())
    }

    /// Subscription for the stored key; the free tier when no key is stored or
    /// the service cannot be reached.
    pub async fn subscription(&self) -> Subscription {
        let key = match self.license_key().await {
            Ok(Some(key)) => key,
            Ok(None) => return Subscription::free_tier(),
            Err(err) => {
                warn!(error = %err, detail = %err.user_message(), "settings unavailable; assuming free tier");
                return Subscription::free_tier();
            }
        };

        info!(license = %key.log_prefix(), "fetching subscription");
        match self
            .get_json::<Subscription>("subscription", PATH_SUBSCRIPTION, &key)
            .await
        {
            Ok(subscription) => subscription,
            Err(GatewayError::Remote { status: 401, .. }) => {
                warn!("license key is invalid or expired");
                Subscription::free_tier()
            }
            Err(err) => {
                warn!(error = %err, detail = %err.user_message(), "subscription lookup failed");
                Subscription::free_tier()
            }
        }
    }

    /// Usage for the stored key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingLicenseKey`] without a key, or the
    /// transport/remote failure.
    pub async fn usage(&self) -> GatewayResult<UsageSnapshot> {
        let key = self.require_key().await?;
        self.get_json("usage", PATH_USAGE, &key).await
    }

    /// Usage for the stored key, falling back to the free-tier allowance for
    /// the current month when no key is stored or the lookup fails.
    pub async fn usage_with_limits(&self) -> UsageSnapshot {
        match self.usage().await {
            Ok(usage) => usage,
            Err(GatewayError::MissingLicenseKey) => UsageSnapshot::free_tier(Utc::now()),
            Err(err) => {
                warn!(error = %err, detail = %err.user_message(), "usage lookup failed; assuming free tier");
                UsageSnapshot::free_tier(Utc::now())
            }
        }
    }

    /// Record `count` generations against the current period.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingLicenseKey`] without a key, or the
    /// remote failure.
    pub async fn increment_usage(&self, count: u64) -> GatewayResult<UsageIncrement> {
        let key = self.require_key().await?;
        let request = self
            .post(PATH_USAGE_INCREMENT, &key)?
            .json(&IncrementRequest { count });
        self.send_json("usage.increment", request, "Failed to increment usage")
            .await
    }

    /// Whether `count` more generations fit in the current allowance.
    pub async fn can_generate(&self, count: u64) -> GenerationAllowance {
        GenerationAllowance::evaluate(&self.usage_with_limits().await, count)
    }

    /// Generate alt text for one image.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingLicenseKey`] without a key, or the
    /// remote failure carrying the service's message.
    pub async fn generate_alt_text(&self, image: &EncodedImage) -> GatewayResult<String> {
        let key = self.require_key().await?;
        let data_url = image.data_url();
        let request = self
            .post(PATH_GENERATE, &key)?
            .json(&GenerateRequest { image: &data_url });
        let response: GenerateResponse = self
            .send_json("generate", request, "Failed to generate alt text")
            .await?;
        Ok(response.alt_text)
    }

    /// Generate alt text for several images in one request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an empty batch,
    /// [`GatewayError::MissingLicenseKey`] without a key, or the remote failure.
    pub async fn generate_alt_text_batch(
        &self,
        images: &[EncodedImage],
    ) -> GatewayResult<Vec<BatchItemResult>> {
        let key = self.require_key().await?;
        if images.is_empty() {
            return Err(GatewayError::InvalidRequest {
                operation: "generate.batch",
                reason: "Images array is required and must not be empty",
            });
        }
        let data_urls: Vec<String> = images.iter().map(EncodedImage::data_url).collect();
        let request = self.post(PATH_GENERATE_BATCH, &key)?.json(&BatchRequest {
            images: data_urls.iter().map(String::as_str).collect(),
        });
        let response: BatchResponse = self
            .send_json(
                "generate.batch",
                request,
                "Failed to generate alt text batch",
            )
            .await?;
        debug!(requested = images.len(), returned = response.results.len(), "batch generated");
        Ok(response.results)
    }

    /// Billing portal session URL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank return URL,
    /// [`GatewayError::MissingLicenseKey`] without a key, or the remote failure.
    pub async fn portal_url(&self, return_url: &str) -> GatewayResult<String> {
        if return_url.trim().is_empty() {
            return Err(GatewayError::InvalidRequest {
                operation: "portal",
                reason: "returnUrl is required",
            });
        }
        let key = self.require_key().await?;
        let request = self.post(PATH_PORTAL, &key)?.json(&ReturnUrlRequest {
            return_url: Some(return_url),
        });
        let response: UrlResponse = self
            .send_json("portal", request, "Failed to create portal session")
            .await?;
        Ok(response.url)
    }

    /// Checkout session URL for upgrading the plan.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingLicenseKey`] without a key, or the
    /// remote failure.
    pub async fn checkout_url(&self, return_url: Option<&str>) -> GatewayResult<String> {
        let key = self.require_key().await?;
        let request = self
            .post(PATH_CHECKOUT, &key)?
            .json(&ReturnUrlRequest { return_url });
        let response: UrlResponse = self
            .send_json("checkout", request, "Failed to get checkout URL")
            .await?;
        Ok(response.url)
    }

    async fn license_key(&self) -> GatewayResult<Option<LicenseKey>> {
        self.settings
            .license_key()
            .await
            .map_err(|source| GatewayError::Settings { source })
    }

    async fn require_key(&self) -> GatewayResult<LicenseKey> {
        self.license_key()
            .await?
            .ok_or(GatewayError::MissingLicenseKey)
    }

    fn base_str(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn endpoint(&self, path: &'static str) -> GatewayResult<Url> {
        Url::parse(&format!("{}{path}", self.base_str()))
            .map_err(|source| GatewayError::Endpoint { path, source })
    }

    fn post(&self, path: &'static str, key: &LicenseKey) -> GatewayResult<RequestBuilder> {
        Ok(self
            .http
            .post(self.endpoint(path)?)
            .header(HEADER_AUTHORIZATION, key.expose()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &'static str,
        key: &LicenseKey,
    ) -> GatewayResult<T> {
        let request = self
            .http
            .get(self.endpoint(path)?)
            .header(HEADER_AUTHORIZATION, key.expose());
        self.send_json(operation, request, "Request failed").await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        fallback: &'static str,
    ) -> GatewayResult<T> {
        let response = request
            .send()
            .await
            .map_err(|source| GatewayError::Transport { operation, source })?;
        if !response.status().is_success() {
            return Err(remote_error(operation, response, fallback).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|source| GatewayError::Decode { operation, source })
    }
}

async fn remote_error(operation: &'static str, response: Response, fallback: &str) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    let message = body
        .error
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    warn!(operation, status, %message, "licensing service returned an error");
    GatewayError::Remote {
        operation,
        status,
        message,
    }
}

#[async_trait]
impl QuotaGateway for LicensingClient {
    async fn generate_one(&self, image: &EncodedImage) -> Result<String, GenerationError> {
        self.generate_alt_text(image)
            .await
            .map_err(GenerationError::from)
    }

    async fn generate_many(
        &self,
        images: &[EncodedImage],
    ) -> Result<Vec<BatchItemResult>, GenerationError> {
        self.generate_alt_text_batch(images)
            .await
            .map_err(GenerationError::from)
    }

    async fn usage_snapshot(&self) -> Result<UsageSnapshot, GenerationError> {
        self.usage().await.map_err(GenerationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alttext_config::{MemorySettingsStore, PluginSettings};
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    const KEY: &str = "strapix_test_key";

    fn client_for(server: &MockServer, with_key: bool) -> LicensingClient {
        let settings = if with_key {
            MemorySettingsStore::with_license_key(LicenseKey::parse(KEY).expect("key"))
        } else {
            MemorySettingsStore::new(PluginSettings::default())
        };
        LicensingClient::with_client(
            Client::new(),
            server.base_url().parse().expect("valid URL"),
            Arc::new(settings),
        )
    }

    fn jpeg(payload: &str) -> EncodedImage {
        EncodedImage {
            mime: "image/jpeg".into(),
            base64: payload.into(),
        }
    }

    #[tokio::test]
    async fn generate_sends_data_url_with_license_header() -> GatewayResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/plugin/generate")
                .header(HEADER_AUTHORIZATION, KEY)
                .json_body(json!({ "image": "data:image/jpeg;base64,QUJD" }));
            then.status(200)
                .json_body(json!({ "altText": "A lighthouse at dusk" }));
        });

        let text = client_for(&server, true)
            .generate_alt_text(&jpeg("QUJD"))
            .await?;
        assert_eq!(text, "A lighthouse at dusk");
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn generate_surfaces_remote_error_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/plugin/generate");
            then.status(403)
                .json_body(json!({ "error": "Usage limit exceeded for this billing period" }));
        });

        let err = client_for(&server, true)
            .generate_one(&jpeg("QUJD"))
            .await
            .expect_err("quota error");
        assert!(err.is_quota_exceeded());
        assert_eq!(err.message(), "Usage limit exceeded for this billing period");
    }

    #[tokio::test]
    async fn generate_falls_back_when_error_body_is_missing() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/plugin/generate");
            then.status(500).body("upstream exploded");
        });

        let err = client_for(&server, true)
            .generate_alt_text(&jpeg("QUJD"))
            .await
            .expect_err("remote error");
        assert!(matches!(
            err,
            GatewayError::Remote { status: 500, ref message, .. } if message == "Failed to generate alt text"
        ));
    }

    #[tokio::test]
    async fn missing_key_short_circuits_without_network() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/plugin/generate");
            then.status(200).json_body(json!({ "altText": "unexpected" }));
        });

        let client = client_for(&server, false);
        assert!(matches!(
            client.generate_alt_text(&jpeg("QUJD")).await,
            Err(GatewayError::MissingLicenseKey)
        ));
        assert!(!client.has_license_key().await.expect("settings"));
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn batch_posts_every_image_and_returns_positional_results() -> GatewayResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/plugin/generate-batch")
                .header(HEADER_AUTHORIZATION, KEY)
                .json_body(json!({
                    "images": ["data:image/jpeg;base64,AAA", "data:image/jpeg;base64,BBB"]
                }));
            then.status(200).json_body(json!({
                "results": [
                    { "success": true, "altText": "First", "index": 0 },
                    { "success": false, "error": "Usage limit exceeded", "index": 1 }
                ]
            }));
        });

        let results = client_for(&server, true)
            .generate_alt_text_batch(&[jpeg("AAA"), jpeg("BBB")])
            .await?;
        mock.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].alt_text.as_deref(), Some("First"));
        assert!(!results[1].success);
        assert!(results[1].clone().into_text().unwrap_err().is_quota_exceeded());
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_locally() {
        let server = MockServer::start_async().await;
        let err = client_for(&server, true)
            .generate_alt_text_batch(&[])
            .await
            .expect_err("empty batch");
        assert_eq!(
            err.user_message(),
            "Images array is required and must not be empty"
        );
    }

    #[tokio::test]
    async fn subscription_falls_back_to_free_tier() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/plugin/subscription");
            then.status(401);
        });

        assert_eq!(
            client_for(&server, true).subscription().await,
            Subscription::free_tier()
        );
        assert_eq!(
            client_for(&server, false).subscription().await,
            Subscription::free_tier()
        );
    }

    #[tokio::test]
    async fn subscription_decodes_active_plan() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/plugin/subscription")
                .header(HEADER_AUTHORIZATION, KEY);
            then.status(200).json_body(json!({
                "hasSubscription": true,
                "isActive": true,
                "cancelAtPeriodEnd": false,
                "status": "active",
                "planName": "Growth",
                "currentPeriodEnd": null,
                "generationsLimit": 1000,
                "autoTagging": true,
                "bulkProcessing": true,
                "usage": null
            }));
        });

        let subscription = client_for(&server, true).subscription().await;
        assert!(subscription.is_active);
        assert_eq!(subscription.generations_limit, 1000);
    }

    #[tokio::test]
    async fn usage_with_limits_falls_back_on_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/plugin/usage");
            then.status(503);
        });

        let usage = client_for(&server, true).usage_with_limits().await;
        assert_eq!(usage.used, 0);
        assert_eq!(usage.limit, 10);

        let allowance = client_for(&server, false).can_generate(3).await;
        assert!(allowance.allowed);
        assert_eq!(allowance.remaining, 10);
    }

    #[tokio::test]
    async fn usage_snapshot_decodes_remote_counters() -> Result<(), GenerationError> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/plugin/usage");
            then.status(200).json_body(json!({
                "used": 10,
                "limit": 10,
                "periodStart": "2026-10-01T00:00:00Z",
                "periodEnd": "2026-11-01T00:00:00Z"
            }));
        });

        let usage = client_for(&server, true).usage_snapshot().await?;
        assert!(usage.is_limit_reached());
        Ok(())
    }

    #[tokio::test]
    async fn increment_posts_count() -> GatewayResult<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/plugin/usage/increment")
                .json_body(json!({ "count": 3 }));
            then.status(200)
                .json_body(json!({ "used": 7, "limit": 10, "remaining": 3 }));
        });

        let increment = client_for(&server, true).increment_usage(3).await?;
        mock.assert();
        assert_eq!(increment.remaining, 3);
        Ok(())
    }

    #[tokio::test]
    async fn portal_and_checkout_return_session_urls() -> GatewayResult<()> {
        let server = MockServer::start_async().await;
        let portal = server.mock(|when, then| {
            when.method(POST)
                .path("/api/plugin/portal")
                .json_body(json!({ "returnUrl": "http://localhost/admin" }));
            then.status(200)
                .json_body(json!({ "url": "https://billing.example/session" }));
        });
        let checkout = server.mock(|when, then| {
            when.method(POST)
                .path("/api/plugin/checkout")
                .json_body(json!({}));
            then.status(400).json_body(json!({ "error": "No plan selected" }));
        });

        let client = client_for(&server, true);
        assert_eq!(
            client.portal_url("http://localhost/admin").await?,
            "https://billing.example/session"
        );
        let err = client.checkout_url(None).await.expect_err("checkout error");
        assert_eq!(err.user_message(), "No plan selected");
        portal.assert();
        checkout.assert();

        assert!(matches!(
            client.portal_url("  ").await,
            Err(GatewayError::InvalidRequest { .. })
        ));
        Ok(())
    }

    #[test]
    fn pricing_and_dashboard_urls_follow_base() {
        let client = LicensingClient::with_client(
            Client::new(),
            "https://strapix.com".parse().expect("url"),
            Arc::new(MemorySettingsStore::default()),
        );
        assert_eq!(client.pricing_url(), "https://strapix.com/pricing");
        assert_eq!(client.dashboard_url(), "https://strapix.com/dashboard");
    }
}
