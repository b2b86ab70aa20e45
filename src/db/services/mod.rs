pub mod website_result_service;
pub mod website_service;
