use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;

use plate_core::mfds::{ExternalError, ExternalPage, SearchField, parse_search_body};
use plate_core::service::NutritionDatabase;

pub struct MfdsClient {
    client: reqwest::Client,
    base_url: String,
    service_key: Option<String>,
}

impl MfdsClient {
    pub fn new(base_url: &str, service_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "plate-cli/{} (nutrition tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            service_key,
        })
    }

    pub fn build_search_url(
        &self,
        service_key: &str,
        field: SearchField,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Url, ExternalError> {
        let page = page.to_string();
        let page_size = page_size.to_string();
        Url::parse_with_params(
            &self.base_url,
            &[
                ("serviceKey", service_key),
                ("pageNo", page.as_str()),
                ("numOfRows", page_size.as_str()),
                ("type", "json"),
                (field.param(), query),
            ],
        )
        .map_err(|e| ExternalError::Network(format!("invalid base URL: {e}")))
    }
}

#[async_trait(?Send)]
impl NutritionDatabase for MfdsClient {
    async fn search_by_field(
        &self,
        field: SearchField,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ExternalPage, ExternalError> {
        let service_key = self
            .service_key
            .as_deref()
            .ok_or(ExternalError::MissingServiceKey)?;
        let url = self.build_search_url(service_key, field, query, page, page_size)?;

        tracing::debug!(field = field.param(), query, page, "querying MFDS");
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExternalError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| ExternalError::Network(e.to_string()))?;

        parse_search_body(&body)
    }
}
