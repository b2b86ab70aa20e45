//! SeaORM entities for the monitoring tables.

pub mod website;
pub mod website_result;

pub mod prelude {
    pub use super::website::Entity as Website;
    pub use super::website_result::Entity as WebsiteResult;
}
