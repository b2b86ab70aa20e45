pub mod website_models;
