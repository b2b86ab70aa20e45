use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "website_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub website_id: i32,
    pub request_timestamp: ChronoDateTimeUtc,
    #[sea_orm(nullable)]
    pub response_timestamp: Option<ChronoDateTimeUtc>,
    #[sea_orm(nullable)]
    pub response_time_ms: Option<i64>,
    #[sea_orm(nullable)]
    pub http_status_code: Option<i32>,
    #[sea_orm(nullable)]
    pub is_regex_pattern_compliant: Option<bool>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::website::Entity",
        from = "Column::WebsiteId",
        to = "super::website::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Website,
}

impl Related<super::website::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Website.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
