use crate::entity::Entity;
use crate::error::Error;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Daily performance of one ad.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub ad_id: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub date: String,
}

/// Flat metadata record shared by ads, ad groups and campaigns.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MetaRow {
    pub id: String,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub status: Option<String>,
    pub date: String,
}

/// A row ready for the warehouse, keyed for de-duplication.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WarehouseRow {
    #[serde(rename = "insertId")]
    pub insert_id: String,
    pub json: Value,
}

impl WarehouseRow {
    /// The insert id is scoped to the (entity, date) partition, so re-sending
    /// the same logical row for the same day is recognised as a duplicate.
    pub fn new<T: Serialize>(
        entity: Entity,
        key: &str,
        date: &NaiveDate,
        row: &T,
    ) -> Result<Self, Error> {
        Ok(WarehouseRow {
            insert_id: format!("{}:{}:{}", entity, format_date(date), key),
            json: serde_json::to_value(row)?,
        })
    }
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

///
/// Projects a reporting record into a [`StatsRow`].
///
/// # Arguments
/// * `record` - a record of the form `{"dimensions": {"ad_id": ..}, "metrics": {..}}`
/// * `date` - the report date attached to the row
///
/// # Returns
/// `Ok(None)` for records without impressions, which are not loaded.
pub fn stats_row(record: &Value, date: &NaiveDate) -> Result<Option<StatsRow>, Error> {
    let dimensions = object_field(record, "dimensions")?;
    let metrics = object_field(record, "metrics")?;

    let ad_id = id_field(dimensions, "ad_id")?;
    let impressions = parse_u64(metrics, "impressions")?;

    if impressions == 0 {
        return Ok(None);
    }

    Ok(Some(StatsRow {
        ad_id,
        spend: parse_f64(metrics, "spend")?,
        impressions,
        clicks: parse_u64(metrics, "clicks")?,
        date: format_date(date),
    }))
}

/// Projects a metadata record into a [`MetaRow`] using the field names of
/// the given entity.
pub fn meta_row(entity: Entity, record: &Value, date: &NaiveDate) -> Result<MetaRow, Error> {
    let (id, name, parent) = match entity {
        Entity::Ads => ("ad_id", "ad_name", Some("adgroup_id")),
        Entity::AdGroups => ("adgroup_id", "adgroup_name", Some("campaign_id")),
        Entity::Campaigns => ("campaign_id", "campaign_name", None),
        Entity::Stats => {
            return Err(Error::UnexpectedResponse {
                message: "stats records have no metadata shape".to_string(),
            })
        }
    };

    Ok(MetaRow {
        id: id_field(record, id)?,
        name: optional_string(record, name),
        parent_id: parent.and_then(|field| optional_string(record, field)),
        status: optional_string(record, "operation_status"),
        date: format_date(date),
    })
}

fn object_field<'a>(record: &'a Value, field: &str) -> Result<&'a Value, Error> {
    match record.get(field) {
        Some(value) if value.is_object() => Ok(value),
        _ => Err(Error::UnexpectedResponse {
            message: format!("record is missing object '{}': {}", field, record),
        }),
    }
}

// Vendor ids come back as strings or numbers depending on the endpoint.
fn optional_string(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_field(record: &Value, field: &str) -> Result<String, Error> {
    optional_string(record, field).ok_or_else(|| Error::UnexpectedResponse {
        message: format!("record is missing '{}': {}", field, record),
    })
}

fn parse_f64(metrics: &Value, field: &str) -> Result<f64, Error> {
    let value = match metrics.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    value.ok_or_else(|| invalid_metric(metrics, field))
}

fn parse_u64(metrics: &Value, field: &str) -> Result<u64, Error> {
    let value = match metrics.get(field) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    value.ok_or_else(|| invalid_metric(metrics, field))
}

fn invalid_metric(metrics: &Value, field: &str) -> Error {
    Error::UnexpectedResponse {
        message: format!("metric '{}' is missing or not numeric: {}", field, metrics),
    }
}
