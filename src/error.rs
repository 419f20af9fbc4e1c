use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Request to {endpoint} timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },

    #[error("API responded with error: {0}")]
    ApiFailure(#[from] reqwest::Error),

    #[error("Failed to parse URL: {0}")]
    UrlParsingFailed(#[from] url::ParseError),

    #[error("API {endpoint} returned code {code}: {message}")]
    ApiError {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("Unexpected response structure: {message}")]
    UnexpectedResponse { message: String },

    #[error("Fetching {entity} stopped after {max_pages} pages, {total_pages} pages available")]
    PageLimitExceeded {
        entity: String,
        max_pages: u32,
        total_pages: u32,
    },

    #[error("Failed to obtain warehouse access token: {message}")]
    WarehouseAuth { message: String },

    #[error("BigQuery errors for {table}: {errors}")]
    Upload { table: String, errors: String },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}
