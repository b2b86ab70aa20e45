/// Version string baked in at build time. `SITEWATCH_VERSION` overrides the
/// crate version for release builds.
pub const VERSION: &str = match option_env!("SITEWATCH_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
