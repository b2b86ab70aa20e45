use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::entities::website_result;
use crate::monitor::Target;

// Model for registering a new website
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateWebsite {
    pub url: String,
    pub interval_seconds: i32,
    pub regexp_pattern: Option<String>,
}

// Model for changing the schedule of a registered website. An empty
// `regexpPattern` clears the pattern.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateWebsite {
    pub interval_seconds: Option<i32>,
    pub regexp_pattern: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteResultDetails {
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: Option<DateTime<Utc>>,
    pub response_time_ms: Option<i64>,
    pub http_status_code: Option<i32>,
    pub is_up: bool,
    pub is_regex_pattern_compliant: Option<bool>,
}

impl From<website_result::Model> for WebsiteResultDetails {
    fn from(model: website_result::Model) -> Self {
        Self {
            is_up: model
                .http_status_code
                .is_some_and(|code| (200..400).contains(&code)),
            request_timestamp: model.request_timestamp,
            response_timestamp: model.response_timestamp,
            response_time_ms: model.response_time_ms,
            http_status_code: model.http_status_code,
            is_regex_pattern_compliant: model.is_regex_pattern_compliant,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteDetails {
    pub id: i32,
    pub url: String,
    pub interval_seconds: i32,
    pub regexp_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<WebsiteResultDetails>,
}

impl WebsiteDetails {
    pub fn from_target(target: &Target, last_result: Option<website_result::Model>) -> Self {
        Self {
            id: target.id,
            url: target.url.clone(),
            interval_seconds: target.interval_seconds(),
            regexp_pattern: target.pattern_str().map(str::to_string),
            last_result: last_result.map(WebsiteResultDetails::from),
        }
    }
}
