use crate::api_client::AdsApi;
use crate::config::Config;
use crate::data::format_date;
use crate::entity::Entity;
use crate::error::Error;
use crate::warehouse::{upload, TableRef, UploadOutcome, Warehouse};
use chrono::{Days, Local, NaiveDate};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Error,
}

/// Outcome of one trigger, rendered as the response body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunResult {
    pub status: RunStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<String, bool>>,
}

/// The day before `today`.
pub fn target_date(today: NaiveDate) -> NaiveDate {
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

pub fn yesterday() -> NaiveDate {
    target_date(Local::now().date_naive())
}

/// Fetches, maps and uploads one entity type for `date`.
pub async fn load_entity(
    api: &dyn AdsApi,
    warehouse: &dyn Warehouse,
    config: &Config,
    entity: Entity,
    date: &NaiveDate,
) -> Result<UploadOutcome, Error> {
    info!("loading {} for {}", entity, date);

    let records = match api.fetch_records(entity, date).await {
        Ok(records) => records,
        Err(err) if config.soft_fail => {
            warn!("failed to fetch {}, continuing without data: {}", entity, err);
            vec![]
        }
        Err(err) => return Err(err),
    };

    let rows = entity.map_records(&records, date)?;
    if rows.len() < records.len() {
        info!(
            "dropped {} of {} {} records without impressions",
            records.len() - rows.len(),
            records.len(),
            entity
        );
    }

    let table = TableRef::new(config, entity.table_id(config));
    upload(warehouse, &table, &rows).await
}

/// Loads the daily stats report.
pub async fn run_stats(
    api: &dyn AdsApi,
    warehouse: &dyn Warehouse,
    config: &Config,
    date: &NaiveDate,
) -> RunResult {
    let date_str = Some(format_date(date));

    match load_entity(api, warehouse, config, Entity::Stats, date).await {
        Ok(UploadOutcome::Inserted(rows)) => RunResult {
            status: RunStatus::Success,
            message: "Data processed successfully".to_string(),
            rows_processed: Some(rows),
            date: date_str,
            results: None,
        },
        Ok(UploadOutcome::NothingToUpload) => RunResult {
            status: RunStatus::Success,
            message: "No data to upload".to_string(),
            rows_processed: Some(0),
            date: date_str,
            results: None,
        },
        Err(err) => {
            error!("failed to load stats for {}: {}", date, err);
            RunResult {
                status: RunStatus::Error,
                message: err.to_string(),
                rows_processed: None,
                date: date_str,
                results: None,
            }
        }
    }
}

/// Loads ads, ad groups and campaigns independently and reports each.
pub async fn update_meta(
    api: &dyn AdsApi,
    warehouse: &dyn Warehouse,
    config: &Config,
    date: &NaiveDate,
) -> RunResult {
    let mut results = BTreeMap::new();
    let mut failures = vec![];
    let mut rows_processed = 0;

    for entity in Entity::METADATA {
        match load_entity(api, warehouse, config, entity, date).await {
            Ok(outcome) => {
                if let UploadOutcome::Inserted(rows) = outcome {
                    rows_processed += rows;
                }
                results.insert(entity.to_string(), true);
            }
            Err(err) => {
                error!("failed to load {}: {}", entity, err);
                failures.push(format!("{}: {}", entity, err));
                results.insert(entity.to_string(), false);
            }
        }
    }

    let (status, message) = if failures.is_empty() {
        (RunStatus::Success, "Metadata updated successfully".to_string())
    } else if failures.len() < Entity::METADATA.len() {
        (RunStatus::PartialSuccess, failures.join("; "))
    } else {
        (RunStatus::Error, failures.join("; "))
    };

    RunResult {
        rows_processed: (status != RunStatus::Error).then_some(rows_processed),
        status,
        message,
        date: Some(format_date(date)),
        results: Some(results),
    }
}
