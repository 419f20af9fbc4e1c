use crate::config::Config;
use crate::data::WarehouseRow;
use crate::error::Error;
use gcp_auth::TokenProvider;
use log::info;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync + 'static {
    /// Inserts rows into a table in one batched call.
    ///
    /// # Arguments
    /// * `table` - The fully qualified destination table.
    /// * `rows` - The rows to insert, in order.
    ///
    /// # Returns
    /// A Result containing the per-row errors reported by the warehouse (empty on success)
    /// or an Error if the call itself failed.
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[WarehouseRow],
    ) -> Result<Vec<InsertError>, Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(config: &Config, table: &str) -> Self {
        TableRef {
            project: config.project_id.clone(),
            dataset: config.dataset_id.clone(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InsertError {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}:", self.index)?;
        for detail in &self.errors {
            write!(f, " [{}] {}", detail.reason, detail.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    NothingToUpload,
    Inserted(usize),
}

/// Uploads rows to one table. Empty input never reaches the warehouse; any
/// reported error fails the whole batch.
pub async fn upload(
    warehouse: &dyn Warehouse,
    table: &TableRef,
    rows: &[WarehouseRow],
) -> Result<UploadOutcome, Error> {
    if rows.is_empty() {
        info!("nothing to upload to {}", table);
        return Ok(UploadOutcome::NothingToUpload);
    }

    let errors = warehouse.insert_rows(table, rows).await?;

    if !errors.is_empty() {
        return Err(Error::Upload {
            table: table.to_string(),
            errors: errors
                .iter()
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    info!("inserted {} rows into {}", rows.len(), table);
    Ok(UploadOutcome::Inserted(rows.len()))
}

const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

#[derive(Clone)]
pub struct BigQueryClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    skip_invalid_rows: bool,
    ignore_unknown_values: bool,
    rows: &'a [WarehouseRow],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl BigQueryClient {
    pub fn new(config: &Config) -> Self {
        BigQueryClient {
            client: Client::new(),
            base_url: config.warehouse_api_url.to_string(),
            token: config.warehouse_token.clone(),
        }
    }

    /// Uses the configured token when present, otherwise Application Default
    /// Credentials (service account key, gcloud user, or metadata server).
    async fn access_token(&self) -> Result<String, Error> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }

        let provider = gcp_auth::provider().await.map_err(|err| Error::WarehouseAuth {
            message: err.to_string(),
        })?;
        let token = provider
            .token(&[BIGQUERY_SCOPE])
            .await
            .map_err(|err| Error::WarehouseAuth {
                message: err.to_string(),
            })?;

        Ok(token.as_str().to_string())
    }
}

#[async_trait::async_trait]
impl Warehouse for BigQueryClient {
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[WarehouseRow],
    ) -> Result<Vec<InsertError>, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(&[
                "projects",
                table.project.as_str(),
                "datasets",
                table.dataset.as_str(),
                "tables",
                table.table.as_str(),
                "insertAll",
            ]);

        let token = self.access_token().await?;

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&InsertAllRequest {
                skip_invalid_rows: false,
                ignore_unknown_values: false,
                rows,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error.message)
                .unwrap_or(body);
            return Err(Error::Upload {
                table: table.to_string(),
                errors: format!("{}: {}", status, message),
            });
        }

        let response: InsertAllResponse = resp.json().await?;
        Ok(response.insert_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_warehouse(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn rows(n: usize) -> Vec<WarehouseRow> {
        (0..n)
            .map(|i| WarehouseRow {
                insert_id: format!("stats:2024-03-01:{}", i),
                json: json!({"ad_id": i.to_string()}),
            })
            .collect()
    }

    fn table() -> TableRef {
        TableRef {
            project: "proj".to_string(),
            dataset: "ds".to_string(),
            table: "tiktok_ads_stats".to_string(),
        }
    }

    #[test]
    fn test_table_ref_display() {
        assert_eq!(table().to_string(), "proj.ds.tiktok_ads_stats");
    }

    #[tokio::test]
    async fn test_upload_empty_rows_skips_warehouse() {
        let mut warehouse = MockWarehouse::new();
        warehouse.expect_insert_rows().never();

        let outcome = upload(&warehouse, &table(), &[]).await.unwrap();

        assert_eq!(outcome, UploadOutcome::NothingToUpload);
    }

    #[tokio::test]
    async fn test_upload_success() {
        let mut warehouse = MockWarehouse::new();
        warehouse
            .expect_insert_rows()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let outcome = upload(&warehouse, &table(), &rows(3)).await.unwrap();

        assert_eq!(outcome, UploadOutcome::Inserted(3));
    }

    #[tokio::test]
    async fn test_upload_errors_fail_whole_batch() {
        let mut warehouse = MockWarehouse::new();
        warehouse.expect_insert_rows().times(1).returning(|_, _| {
            Ok(vec![InsertError {
                index: 1,
                errors: vec![ErrorDetail {
                    reason: "invalid".to_string(),
                    location: "spend".to_string(),
                    message: "Cannot convert value".to_string(),
                }],
            }])
        });

        let result = upload(&warehouse, &table(), &rows(3)).await;

        assert!(matches!(
            result.unwrap_err(),
            Error::Upload { table, errors }
                if table == "proj.ds.tiktok_ads_stats" && errors.contains("row 1: [invalid] Cannot convert value")
        ));
    }

    #[tokio::test]
    async fn test_bigquery_insert_all_request() {
        async fn insert_all(
            Path((project, dataset, table)): Path<(String, String, String)>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            assert_eq!((project.as_str(), dataset.as_str()), ("proj", "ds"));
            assert_eq!(table, "tiktok_ads_stats");
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer wh_token")
            );
            assert_eq!(body["skipInvalidRows"], false);
            assert_eq!(body["rows"][0]["insertId"], "stats:2024-03-01:0");
            assert_eq!(body["rows"][1]["json"]["ad_id"], "1");
            Json(json!({"kind": "bigquery#tableDataInsertAllResponse"}))
        }
        let base = spawn_warehouse(Router::new().route(
            "/projects/:project/datasets/:dataset/tables/:table/insertAll",
            post(insert_all),
        ))
        .await;
        let client = BigQueryClient::new(&test_config("http://unused", &base));

        let errors = client.insert_rows(&table(), &rows(2)).await.unwrap();

        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_bigquery_insert_errors_parsed() {
        async fn insert_all() -> Json<Value> {
            Json(json!({
                "insertErrors": [
                    {"index": 0, "errors": [{"reason": "invalid", "message": "no such field: foo"}]}
                ]
            }))
        }
        let base = spawn_warehouse(Router::new().route(
            "/projects/:project/datasets/:dataset/tables/:table/insertAll",
            post(insert_all),
        ))
        .await;
        let client = BigQueryClient::new(&test_config("http://unused", &base));

        let errors = client.insert_rows(&table(), &rows(1)).await.unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].errors[0].message, "no such field: foo");
    }

    #[tokio::test]
    async fn test_bigquery_error_status_keeps_message() {
        async fn insert_all() -> (StatusCode, Json<Value>) {
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": {"code": 404, "message": "Not found: Table proj:ds.tiktok_ads_stats", "status": "NOT_FOUND"}
                })),
            )
        }
        let base = spawn_warehouse(Router::new().route(
            "/projects/:project/datasets/:dataset/tables/:table/insertAll",
            post(insert_all),
        ))
        .await;
        let client = BigQueryClient::new(&test_config("http://unused", &base));

        let result = client.insert_rows(&table(), &rows(1)).await;

        assert!(matches!(
            result.unwrap_err(),
            Error::Upload { errors, .. }
                if errors.contains("404") && errors.contains("Not found: Table proj:ds.tiktok_ads_stats")
        ));
    }

    #[tokio::test]
    async fn test_bigquery_error_status_plain_body() {
        async fn insert_all() -> (StatusCode, &'static str) {
            (StatusCode::BAD_GATEWAY, "upstream unavailable")
        }
        let base = spawn_warehouse(Router::new().route(
            "/projects/:project/datasets/:dataset/tables/:table/insertAll",
            post(insert_all),
        ))
        .await;
        let client = BigQueryClient::new(&test_config("http://unused", &base));

        let result = client.insert_rows(&table(), &rows(1)).await;

        assert!(matches!(
            result.unwrap_err(),
            Error::Upload { errors, .. } if errors.contains("upstream unavailable")
        ));
    }
}
