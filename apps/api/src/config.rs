use anyhow::{Context, Result};

/// Default upper bound on an uploaded resume (5 MiB).
pub const DEFAULT_MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing. SMTP and object storage
/// are optional groups: when absent, the matching adapter runs disabled.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub admin_api_token: String,
    pub frontend_url: String,
    pub company_name: String,
    pub max_resume_bytes: usize,
    pub smtp: Option<SmtpConfig>,
    pub storage: Option<StorageConfig>,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// Mailbox that receives new-application alerts.
    pub hr_mailbox: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub public_base_url: String,
    pub root_folder: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            admin_api_token: require_env("ADMIN_API_TOKEN")?,
            frontend_url: optional_env("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            company_name: optional_env("COMPANY_NAME")
                .unwrap_or_else(|| "Careers Team".to_string()),
            max_resume_bytes: optional_env("MAX_RESUME_BYTES")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MAX_RESUME_BYTES must be a byte count")?
                .unwrap_or(DEFAULT_MAX_RESUME_BYTES),
            smtp: smtp_from_env()?,
            storage: storage_from_env(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn smtp_from_env() -> Result<Option<SmtpConfig>> {
    let (Some(host), Some(username), Some(password)) = (
        optional_env("SMTP_HOST"),
        optional_env("SMTP_USERNAME"),
        optional_env("SMTP_PASSWORD"),
    ) else {
        return Ok(None);
    };

    let port = optional_env("SMTP_PORT")
        .map(|v| v.parse::<u16>())
        .transpose()
        .context("SMTP_PORT must be a valid port number")?
        .unwrap_or(587);
    let from_address = optional_env("SMTP_FROM").unwrap_or_else(|| username.clone());
    let hr_mailbox = optional_env("HR_NOTIFICATION_EMAIL").unwrap_or_else(|| from_address.clone());

    Ok(Some(SmtpConfig {
        host,
        port,
        username,
        password,
        from_address,
        hr_mailbox,
    }))
}

fn storage_from_env() -> Option<StorageConfig> {
    let bucket = optional_env("S3_BUCKET")?;
    let endpoint = optional_env("S3_ENDPOINT")?;
    let access_key_id = optional_env("AWS_ACCESS_KEY_ID")?;
    let secret_access_key = optional_env("AWS_SECRET_ACCESS_KEY")?;
    let endpoint = endpoint.trim_end_matches('/').to_string();
    let public_base_url = optional_env("S3_PUBLIC_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("{endpoint}/{bucket}"));

    Some(StorageConfig {
        bucket,
        endpoint,
        region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        access_key_id,
        secret_access_key,
        public_base_url,
        root_folder: optional_env("RESUME_ROOT_FOLDER")
            .unwrap_or_else(|| "career-applications".to_string()),
    })
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats unset and blank variables the same way.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
impl Config {
    /// A config with every optional integration switched off.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/careers_test".to_string(),
            admin_api_token: "test-admin-token".to_string(),
            frontend_url: "https://careers.example.com".to_string(),
            company_name: "Acme Careers".to_string(),
            max_resume_bytes: DEFAULT_MAX_RESUME_BYTES,
            smtp: None,
            storage: None,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
