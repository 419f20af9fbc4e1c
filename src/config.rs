use clap::Args as ClapArgs;

const DEFAULT_API_URL: &str = "https://business-api.tiktok.com/open_api/v1.3";
const DEFAULT_WAREHOUSE_API_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const DEFAULT_STATS_TABLE: &str = "tiktok_ads_stats";
const DEFAULT_ADS_TABLE: &str = "tiktok_ads";
const DEFAULT_ADGROUPS_TABLE: &str = "tiktok_adgroups";
const DEFAULT_CAMPAIGNS_TABLE: &str = "tiktok_campaigns";

#[derive(ClapArgs, Clone, Debug)]
pub struct Config {
    #[arg(long, default_value = DEFAULT_API_URL, env = "API_URL")]
    pub(crate) api_url: String,

    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub(crate) access_token: String,

    #[arg(long, env = "ADVERTISER_ID")]
    pub(crate) advertiser_id: String,

    #[arg(long, env = "PROJECT_ID")]
    pub(crate) project_id: String,

    #[arg(long, env = "DATASET_ID")]
    pub(crate) dataset_id: String,

    /// Destination table for daily stats.
    #[arg(long, default_value = DEFAULT_STATS_TABLE, env = "TABLE_ID")]
    pub(crate) table_id: String,

    #[arg(long, default_value = DEFAULT_ADS_TABLE, env = "ADS_TABLE_ID")]
    pub(crate) ads_table_id: String,

    #[arg(long, default_value = DEFAULT_ADGROUPS_TABLE, env = "ADGROUPS_TABLE_ID")]
    pub(crate) adgroups_table_id: String,

    #[arg(long, default_value = DEFAULT_CAMPAIGNS_TABLE, env = "CAMPAIGNS_TABLE_ID")]
    pub(crate) campaigns_table_id: String,

    #[arg(long, default_value = DEFAULT_WAREHOUSE_API_URL, env = "WAREHOUSE_API_URL")]
    pub(crate) warehouse_api_url: String,

    /// Bearer token for the warehouse API. Application Default Credentials are used when absent.
    #[arg(long, env = "WAREHOUSE_ACCESS_TOKEN", hide_env_values = true)]
    pub(crate) warehouse_token: Option<String>,

    #[arg(long, default_value_t = 30, env = "REQUEST_TIMEOUT_SECS")]
    pub(crate) request_timeout_secs: u64,

    #[arg(long, default_value_t = 1000, env = "PAGE_SIZE")]
    pub(crate) page_size: u32,

    #[arg(long, default_value_t = 100, env = "MAX_PAGES")]
    pub(crate) max_pages: u32,

    /// Log vendor fetch failures and continue with an empty result instead of failing the run.
    #[arg(long, env = "SOFT_FAIL")]
    pub(crate) soft_fail: bool,
}

#[cfg(test)]
pub(crate) fn test_config(api_url: &str, warehouse_api_url: &str) -> Config {
    Config {
        api_url: api_url.to_string(),
        access_token: "test_token".to_string(),
        advertiser_id: "adv_1".to_string(),
        project_id: "proj".to_string(),
        dataset_id: "ds".to_string(),
        table_id: DEFAULT_STATS_TABLE.to_string(),
        ads_table_id: DEFAULT_ADS_TABLE.to_string(),
        adgroups_table_id: DEFAULT_ADGROUPS_TABLE.to_string(),
        campaigns_table_id: DEFAULT_CAMPAIGNS_TABLE.to_string(),
        warehouse_api_url: warehouse_api_url.to_string(),
        warehouse_token: Some("wh_token".to_string()),
        request_timeout_secs: 5,
        page_size: 2,
        max_pages: 10,
        soft_fail: false,
    }
}
