use crate::config::Config;
use crate::data::{self, WarehouseRow};
use crate::error::Error;
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;

/// The kinds of vendor data the loader moves, each with its own endpoint,
/// row shape and destination table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    Stats,
    Ads,
    AdGroups,
    Campaigns,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMethod {
    /// JSON body, used by the reporting endpoint.
    Post,
    /// Query string, used by the metadata endpoints.
    Get,
}

impl Entity {
    pub const METADATA: [Entity; 3] = [Entity::Ads, Entity::AdGroups, Entity::Campaigns];

    pub fn name(&self) -> &'static str {
        match self {
            Entity::Stats => "stats",
            Entity::Ads => "ads",
            Entity::AdGroups => "adgroups",
            Entity::Campaigns => "campaigns",
        }
    }

    /// Path segments below the API base url. The trailing empty segment keeps
    /// the trailing slash the vendor requires.
    pub fn endpoint(&self) -> &'static [&'static str] {
        match self {
            Entity::Stats => &["report", "integrated", "get", ""],
            Entity::Ads => &["ad", "get", ""],
            Entity::AdGroups => &["adgroup", "get", ""],
            Entity::Campaigns => &["campaign", "get", ""],
        }
    }

    pub fn method(&self) -> FetchMethod {
        match self {
            Entity::Stats => FetchMethod::Post,
            _ => FetchMethod::Get,
        }
    }

    pub fn table_id<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            Entity::Stats => &config.table_id,
            Entity::Ads => &config.ads_table_id,
            Entity::AdGroups => &config.adgroups_table_id,
            Entity::Campaigns => &config.campaigns_table_id,
        }
    }

    /// Projects vendor records into warehouse rows. Records that should not be
    /// loaded (zero-impression stats) are skipped.
    pub fn map_records(&self, records: &[Value], date: &NaiveDate) -> Result<Vec<WarehouseRow>, Error> {
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let row = match self {
                Entity::Stats => data::stats_row(record, date)?
                    .map(|row| WarehouseRow::new(*self, &row.ad_id, date, &row))
                    .transpose()?,
                _ => {
                    let row = data::meta_row(*self, record, date)?;
                    Some(WarehouseRow::new(*self, &row.id, date, &row)?)
                }
            };

            if let Some(row) = row {
                rows.push(row);
            }
        }

        Ok(rows)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
