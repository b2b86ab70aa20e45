pub mod website_routes;
