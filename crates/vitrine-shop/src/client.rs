use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use vitrine_core::error::AppError;
use vitrine_core::traits::{ListingPayload, RemoteProduct, ShopClient};

use crate::types::{
    ImageBody, ImageEnvelope, ImagesResponseEnvelope, ProductBody, ProductEnvelope,
    ProductResponseEnvelope, ProductsResponseEnvelope, RemoteProductBody,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the commerce platform's product resource.
///
/// Maps the platform's throttling contract onto the error taxonomy: a 429
/// becomes [`AppError::RateLimited`] carrying the Retry-After hint, a 422
/// becomes the terminal [`AppError::PlatformRejected`], a 404 on lookup is
/// simply `Ok(None)`.
#[derive(Clone)]
pub struct RestShopClient {
    client: Client,
    base_url: String,
    token: String,
    timeout_secs: u64,
}

impl RestShopClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, AppError> {
        let response = request
            .header("X-Shopify-Access-Token", &self.token)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(
                    response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok()),
                );
                Err(AppError::RateLimited { retry_after })
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::PlatformRejected(body))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::HttpError(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body
                )))
            }
        }
    }

    /// As `send`, but a 404 resolves to `Ok(None)`.
    async fn send_optional(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<Response>, AppError> {
        match self.send(request).await {
            Ok(response) => Ok(Some(response)),
            Err(AppError::HttpError(msg)) if msg.starts_with("HTTP 404") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn remote_from(body: RemoteProductBody) -> RemoteProduct {
    RemoteProduct {
        id: body.id,
        handle: body.handle,
        image_count: body.images.len(),
    }
}

/// Parse a Retry-After header value (seconds, possibly fractional).
fn parse_retry_after(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| *v >= 0.0)
}

impl ShopClient for RestShopClient {
    async fn get_product(&self, id: i64) -> Result<Option<RemoteProduct>, AppError> {
        let request = self.client.get(self.url(&format!("/products/{id}.json")));
        let Some(response) = self.send_optional(request).await? else {
            return Ok(None);
        };
        let envelope: ProductResponseEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Product response: {e}")))?;
        Ok(Some(remote_from(envelope.product)))
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<RemoteProduct>, AppError> {
        let request = self
            .client
            .get(self.url("/products.json"))
            .query(&[("handle", handle)]);
        let Some(response) = self.send_optional(request).await? else {
            return Ok(None);
        };
        let envelope: ProductsResponseEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Product list response: {e}")))?;
        Ok(envelope
            .products
            .into_iter()
            .find(|p| p.handle == handle)
            .map(remote_from))
    }

    async fn create_product(&self, payload: &ListingPayload) -> Result<RemoteProduct, AppError> {
        let body = ProductEnvelope {
            product: ProductBody::from_listing(payload, true),
        };
        let request = self.client.post(self.url("/products.json")).json(&body);
        let response = self.send(request).await?;
        let envelope: ProductResponseEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Create response: {e}")))?;
        tracing::info!(handle = %payload.handle, id = envelope.product.id, "Created listing");
        Ok(remote_from(envelope.product))
    }

    async fn update_product(&self, id: i64, payload: &ListingPayload) -> Result<(), AppError> {
        let body = ProductEnvelope {
            product: ProductBody::from_listing(payload, false),
        };
        let request = self
            .client
            .put(self.url(&format!("/products/{id}.json")))
            .json(&body);
        self.send(request).await?;
        tracing::info!(handle = %payload.handle, id, "Updated listing");
        Ok(())
    }

    async fn replace_images(&self, id: i64, image_urls: &[String]) -> Result<(), AppError> {
        // Wholesale: drop every remote image, then submit the local list.
        let request = self
            .client
            .get(self.url(&format!("/products/{id}/images.json")));
        let response = self.send(request).await?;
        let envelope: ImagesResponseEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Image list response: {e}")))?;

        for image in envelope.images {
            let request = self.client.delete(self.url(&format!(
                "/products/{id}/images/{image_id}.json",
                image_id = image.id
            )));
            self.send(request).await?;
        }

        for src in image_urls {
            let body = ImageEnvelope {
                image: ImageBody { src: src.clone() },
            };
            let request = self
                .client
                .post(self.url(&format!("/products/{id}/images.json")))
                .json(&body);
            self.send(request).await?;
        }

        tracing::info!(id, images = image_urls.len(), "Replaced image set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after(Some("2.0")), Some(2.0));
        assert_eq!(parse_retry_after(Some(" 4 ")), Some(4.0));
        assert_eq!(parse_retry_after(Some("0.5")), Some(0.5));
        assert_eq!(parse_retry_after(Some("-1")), None);
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn base_url_is_normalized() {
        let client = RestShopClient::new("https://shop.example/admin/api/", "token").unwrap();
        assert_eq!(
            client.url("/products.json"),
            "https://shop.example/admin/api/products.json"
        );
    }
}
