use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "websites")]
pub struct Model {
    // Ids are assigned by the in-memory registry, not by the database.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(unique)]
    pub url: String,
    pub interval_seconds: i32,
    #[sea_orm(nullable)]
    pub regexp_pattern: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::website_result::Entity")]
    WebsiteResult,
}

impl Related<super::website_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebsiteResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
