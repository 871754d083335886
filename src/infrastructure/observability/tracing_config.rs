/// Configuration for tracing initialization.
pub struct TracingConfig {
    pub environment: String,
    pub json_format: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        // Deployed environments get machine-readable logs unless overridden.
        let json_format = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(environment == "production");
        Self {
            environment,
            json_format,
        }
    }
}
