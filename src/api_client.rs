use crate::config::Config;
use crate::data::format_date;
use crate::entity::{Entity, FetchMethod};
use crate::error::Error;
use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const ACCESS_TOKEN_HEADER: &str = "Access-Token";

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AdsApi: Send + Sync + 'static {
    /// Fetches every record of the given entity type from the vendor API.
    /// # Arguments
    /// * `entity` - The entity type to fetch.
    /// * `date` - The report date. Only the stats report is filtered by it.
    /// # Returns
    /// A Result containing either the raw vendor records across all pages or an Error.
    async fn fetch_records(&self, entity: Entity, date: &NaiveDate) -> Result<Vec<Value>, Error>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    advertiser_id: String,
    page_size: u32,
    max_pages: u32,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ReportRequest<'a> {
    advertiser_id: &'a str,
    report_type: &'static str,
    data_level: &'static str,
    dimensions: [&'static str; 1],
    metrics: [&'static str; 3],
    start_date: String,
    end_date: String,
    page: u32,
    page_size: u32,
}

#[derive(Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    // Error envelopes carry `"data": {}`, so the page is only parsed once the code is ok.
    data: Option<Value>,
}

#[derive(Deserialize)]
struct PageData {
    list: Vec<Value>,
    page_info: Option<PageInfo>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(default = "single_page")]
    total_page: u32,
}

fn single_page() -> u32 {
    1
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(ApiClient {
            client,
            base_url: config.api_url.to_string(),
            token: config.access_token.to_string(),
            advertiser_id: config.advertiser_id.to_string(),
            page_size: config.page_size,
            max_pages: config.max_pages,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn endpoint_url(&self, entity: Entity) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(entity.endpoint());
        Ok(url)
    }

    async fn fetch_page(&self, entity: Entity, date: &NaiveDate, page: u32) -> Result<PageData, Error> {
        let url = self.endpoint_url(entity)?;
        let endpoint = url.path().to_string();

        let request = match entity.method() {
            FetchMethod::Post => self.client.post(url).json(&ReportRequest {
                advertiser_id: &self.advertiser_id,
                report_type: "BASIC",
                data_level: "AUCTION_AD",
                dimensions: ["ad_id"],
                metrics: ["spend", "impressions", "clicks"],
                start_date: format_date(date),
                end_date: format_date(date),
                page,
                page_size: self.page_size,
            }),
            FetchMethod::Get => self.client.get(url).query(&[
                ("advertiser_id", self.advertiser_id.clone()),
                ("page", page.to_string()),
                ("page_size", self.page_size.to_string()),
            ]),
        };

        let resp = request
            .header(ACCESS_TOKEN_HEADER, &self.token)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| self.transport_error(err, &endpoint))?;

        let body: Value = resp
            .json()
            .await
            .map_err(|err| self.transport_error(err, &endpoint))?;

        let envelope: Envelope =
            serde_json::from_value(body.clone()).map_err(|err| Error::UnexpectedResponse {
                message: format!("{}: {}", err, body),
            })?;

        if envelope.code != 0 {
            return Err(Error::ApiError {
                endpoint,
                code: envelope.code,
                message: envelope.message,
            });
        }

        let data = envelope.data.ok_or_else(|| Error::UnexpectedResponse {
            message: format!("missing 'data' in {}", body),
        })?;

        serde_json::from_value(data).map_err(|err| Error::UnexpectedResponse {
            message: format!("{}: {}", err, body),
        })
    }

    fn transport_error(&self, err: reqwest::Error, endpoint: &str) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                endpoint: endpoint.to_string(),
                seconds: self.timeout_secs,
            }
        } else {
            Error::ApiFailure(err)
        }
    }
}

#[async_trait::async_trait]
impl AdsApi for ApiClient {
    async fn fetch_records(&self, entity: Entity, date: &NaiveDate) -> Result<Vec<Value>, Error> {
        let mut records = vec![];
        let mut page = 1;

        loop {
            let data = self.fetch_page(entity, date, page).await?;
            let fetched = data.list.len();
            let total_pages = data.page_info.map(|info| info.total_page).unwrap_or(1);

            debug!(
                "fetched {} {} records from page {}/{}",
                fetched, entity, page, total_pages
            );
            records.extend(data.list);

            if fetched == 0 || page >= total_pages {
                break;
            }

            if page >= self.max_pages {
                return Err(Error::PageLimitExceeded {
                    entity: entity.to_string(),
                    max_pages: self.max_pages,
                    total_pages,
                });
            }

            page += 1;
        }

        Ok(records)
    }
}
