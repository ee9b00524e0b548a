//! Copernicus Data Space catalogue client (OpenSearch "resto" API).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::CopernicusConfig;
use crate::metrics;

use super::{CatalogClient, CatalogError, CatalogQuery, ProductDescriptor};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureProperties {
    title: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    cloud_cover: Option<f64>,
}

/// Catalogue client backed by the public Copernicus search endpoint.
pub struct CopernicusCatalog {
    client: Client,
    base_url: String,
}

impl CopernicusCatalog {
    pub fn new(config: &CopernicusConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.catalog_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the search URL for one page of one region.
    fn build_search_url(&self, query: &CatalogQuery) -> String {
        let mut url = format!(
            "{}/{}/search.json?maxRecords={}&page={}&productType={}&sortParam={}&sortOrder={}&startDate={}&box={}",
            self.base_url,
            query.family.collection(),
            query.max_records,
            query.page,
            urlencoding::encode(&query.product_type),
            urlencoding::encode(&query.sort_param),
            urlencoding::encode(&query.sort_order),
            urlencoding::encode(&query.start.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            urlencoding::encode(&query.region.to_query_string()),
        );

        if let Some(cloud) = query.max_cloud_cover {
            url.push_str(&format!(
                "&cloudCover={}",
                urlencoding::encode(&format!("[0,{}]", cloud))
            ));
        }

        url
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a raw response body into descriptors. Features without a usable
/// timestamp are dropped with a warning.
pub(crate) fn parse_search_response(
    body: &str,
    query: &CatalogQuery,
) -> Result<Vec<ProductDescriptor>, CatalogError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Parse(e.to_string()))?;

    let mut descriptors = Vec::with_capacity(response.features.len());
    for feature in response.features {
        let props = feature.properties;
        let published = props
            .published
            .as_deref()
            .or(props.start_date.as_deref())
            .and_then(parse_timestamp);

        let Some(published_at) = published else {
            warn!(id = %feature.id, title = %props.title, "Skipping feature without timestamp");
            continue;
        };

        descriptors.push(ProductDescriptor {
            id: feature.id,
            title: props.title,
            family: query.family,
            product_type: query.product_type.clone(),
            published_at,
            cloud_cover: props.cloud_cover,
            region: query.region,
        });
    }

    Ok(descriptors)
}

#[async_trait]
impl CatalogClient for CopernicusCatalog {
    fn name(&self) -> &str {
        "copernicus"
    }

    async fn search(&self, query: &CatalogQuery) -> Result<Vec<ProductDescriptor>, CatalogError> {
        let result = self.fetch_page(query).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["copernicus_catalog", "search", status])
            .inc();
        result
    }
}

impl CopernicusCatalog {
    async fn fetch_page(&self, query: &CatalogQuery) -> Result<Vec<ProductDescriptor>, CatalogError> {
        let url = self.build_search_url(query);
        debug!(family = %query.family, region = %query.region, page = query.page, "Querying catalog");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout
            } else {
                CatalogError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::ConnectionFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_search_response(&body, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BoundingBox, SatelliteFamily};

    fn query() -> CatalogQuery {
        CatalogQuery {
            family: SatelliteFamily::S2,
            region: "10,45,11,46".parse::<BoundingBox>().unwrap(),
            product_type: "L2A".to_string(),
            start: DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            max_cloud_cover: Some(5.0),
            max_records: 5,
            page: 1,
            sort_param: "startDate".to_string(),
            sort_order: "descending".to_string(),
        }
    }

    #[test]
    fn test_build_search_url() {
        let catalog = CopernicusCatalog::new(&CopernicusConfig::default()).unwrap();
        let url = catalog.build_search_url(&query());
        assert!(url.starts_with(
            "https://catalogue.dataspace.copernicus.eu/resto/api/collections/Sentinel2/search.json?"
        ));
        assert!(url.contains("maxRecords=5"));
        assert!(url.contains("productType=L2A"));
        assert!(url.contains("startDate=2024-06-01T00%3A00%3A00Z"));
        assert!(url.contains("box=10%2C45%2C11%2C46"));
        assert!(url.contains("cloudCover=%5B0%2C5%5D"));
    }

    #[test]
    fn test_build_search_url_without_cloud_cover() {
        let catalog = CopernicusCatalog::new(&CopernicusConfig::default()).unwrap();
        let mut q = query();
        q.family = SatelliteFamily::S1;
        q.max_cloud_cover = None;
        let url = catalog.build_search_url(&q);
        assert!(url.contains("/Sentinel1/"));
        assert!(!url.contains("cloudCover"));
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "id": "a1b2",
                    "properties": {
                        "title": "S2A_MSIL2A_20240614T101031_N0510_R022_T32TQM_20240614T161608.SAFE",
                        "published": "2024-06-14T17:02:11.123456Z",
                        "cloudCover": 2.5
                    }
                },
                {
                    "id": "no-time",
                    "properties": { "title": "broken" }
                }
            ]
        }"#;
        let products = parse_search_response(body, &query()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "a1b2");
        assert_eq!(products[0].cloud_cover, Some(2.5));
        assert_eq!(products[0].family, SatelliteFamily::S2);
        assert_eq!(products[0].region.to_query_string(), "10,45,11,46");
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert!(parse_search_response("{}", &query()).unwrap().is_empty());
        assert!(matches!(
            parse_search_response("<html>", &query()),
            Err(CatalogError::Parse(_))
        ));
    }
}
