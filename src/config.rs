#![allow(dead_code)]

use std::env;

use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub trusted_hosts: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub database_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub catalog_cache_ttl_seconds: u64,
    pub catalog_cache_max_entries: u64,
    // Pricing rules. Percentages are whole numbers, e.g. 10 means 10%.
    pub minimum_area: i64,
    pub electronic_discount_percent: f64,
    pub advance_payment_percent: f64,
    pub company_timezone: String,
    pub booking_time_slots: Vec<String>,
    pub whatsapp_phone_e164: Option<String>,
    pub payment_number: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_token_secret: Option<String>,
    pub admin_token_ttl_hours: i64,
    pub imgbb_api_key: Option<String>,
    pub upload_max_images: usize,
    pub assistant_enabled: bool,
    pub openai_api_key: Option<String>,
    pub openai_primary_model: String,
    pub openai_fallback_models: Vec<String>,
    pub assistant_max_tool_steps: u32,
    pub assistant_timeout_seconds: u64,
    pub booking_feed_poll_interval_seconds: u64,
    pub booking_feed_snapshot_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Clean Master API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            trusted_hosts: parse_csv(&env_or("TRUSTED_HOSTS", "localhost,127.0.0.1")),
            rate_limit_enabled: env_parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            database_url: env_opt("DATABASE_URL"),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            catalog_cache_ttl_seconds: env_parse_or("CATALOG_CACHE_TTL_SECONDS", 30),
            catalog_cache_max_entries: env_parse_or("CATALOG_CACHE_MAX_ENTRIES", 8),
            minimum_area: env_parse_or("MINIMUM_AREA_SQM", 100),
            electronic_discount_percent: env_parse_or("ELECTRONIC_DISCOUNT_PERCENT", 10.0),
            advance_payment_percent: env_parse_or("ADVANCE_PAYMENT_PERCENT", 25.0),
            company_timezone: env_or("COMPANY_TIMEZONE", "Africa/Cairo"),
            booking_time_slots: parse_csv(&env_or(
                "BOOKING_TIME_SLOTS",
                "08:00,10:00,12:00,14:00,16:00,18:00,20:00",
            )),
            whatsapp_phone_e164: env_opt("WHATSAPP_PHONE_E164"),
            payment_number: env_opt("PAYMENT_NUMBER"),
            admin_username: env_opt("ADMIN_USERNAME"),
            admin_password: env_opt("ADMIN_PASSWORD"),
            admin_token_secret: env_opt("ADMIN_TOKEN_SECRET"),
            admin_token_ttl_hours: env_parse_or("ADMIN_TOKEN_TTL_HOURS", 12),
            imgbb_api_key: env_opt("IMGBB_API_KEY"),
            upload_max_images: env_parse_or("UPLOAD_MAX_IMAGES", 8),
            assistant_enabled: env_parse_bool_or("ASSISTANT_ENABLED", true),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_primary_model: env_or("OPENAI_PRIMARY_MODEL", "gpt-4.1-mini"),
            openai_fallback_models: parse_csv(&env_or("OPENAI_FALLBACK_MODELS", "gpt-4o-mini")),
            assistant_max_tool_steps: env_parse_or("ASSISTANT_MAX_TOOL_STEPS", 6),
            assistant_timeout_seconds: env_parse_or("ASSISTANT_TIMEOUT_SECONDS", 45),
            booking_feed_poll_interval_seconds: env_parse_or(
                "BOOKING_FEED_POLL_INTERVAL_SECONDS",
                10,
            ),
            booking_feed_snapshot_limit: env_parse_or("BOOKING_FEED_SNAPSHOT_LIMIT", 500),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn electronic_discount_rate(&self) -> f64 {
        self.electronic_discount_percent / 100.0
    }

    pub fn advance_payment_rate(&self) -> f64 {
        self.advance_payment_percent / 100.0
    }

    pub fn company_tz(&self) -> Tz {
        self.company_timezone
            .parse::<Tz>()
            .unwrap_or(chrono_tz::Africa::Cairo)
    }

    pub fn admin_login_enabled(&self) -> bool {
        self.admin_username.is_some()
            && self.admin_password.is_some()
            && self.admin_token_secret.is_some()
    }

    pub fn openai_model_chain(&self) -> Vec<String> {
        let mut models = Vec::new();

        let primary = self.openai_primary_model.trim();
        if !primary.is_empty() {
            models.push(primary.to_string());
        }

        for model in &self.openai_fallback_models {
            let candidate = model.trim();
            if candidate.is_empty() {
                continue;
            }
            if !models.iter().any(|existing| existing == candidate) {
                models.push(candidate.to_string());
            }
        }

        models
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref().map(str::to_ascii_lowercase) {
        Some(value) if value == "1" || value == "true" || value == "yes" || value == "on" => true,
        Some(value) if value == "0" || value == "false" || value == "no" || value == "off" => false,
        Some(_) => default,
        None => default,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::{normalize_prefix, parse_csv};

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
    }

    #[test]
    fn parses_time_slot_csv() {
        let slots = parse_csv("08:00, 10:00 ,,12:00");
        assert_eq!(slots, vec!["08:00", "10:00", "12:00"]);
    }
}
