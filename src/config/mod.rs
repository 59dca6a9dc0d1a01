use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
    /// Source addresses allowed to talk to the lock. Empty disables the check.
    #[serde(default)]
    pub trusted_ips: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_any_origin: bool,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub session_timeout_minutes: i64,
    pub max_concurrent_sessions: usize,
    pub session_refresh_interval_ms: i64,
    pub max_login_attempts: u32,
    pub lockout_duration_minutes: i64,
    pub max_failed_attempts_permanent: u32,
    pub rate_limit_window_seconds: i64,
    pub max_requests_per_window: usize,
    pub auth_timeout_ms: i64,
    pub token_length: usize,
    pub token_alphabet: String,
    pub min_password_length: usize,
    pub require_strong_passwords: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    pub primary: CredentialConfig,
    #[serde(default)]
    pub secondary: Option<CredentialConfig>,
    #[serde(default)]
    pub override_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockConfig {
    pub auto_lock_delay_ms: i64,
    pub max_unlock_duration_ms: i64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    Servo,
    Stepper,
    Dc,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServoConfig {
    pub pin: u8,
    pub lock_angle: u8,
    pub unlock_angle: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StepperConfig {
    pub step_pin: u8,
    pub dir_pin: u8,
    #[serde(default)]
    pub enable_pin: Option<u8>,
    pub unlock_steps: u32,
    pub lock_steps: u32,
    pub step_delay_us: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DcConfig {
    pub pin1: u8,
    pub pin2: u8,
    pub run_ms: u64,
}

/// All three variants carry settings so a deployment can switch `kind`
/// without rewriting the file; only the selected one is ever built.
#[derive(Debug, Deserialize, Clone)]
pub struct ActuatorConfig {
    pub kind: ActuatorKind,
    pub servo: ServoConfig,
    pub stepper: StepperConfig,
    pub dc: DcConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub security: SecurityConfig,
    pub credentials: CredentialsConfig,
    pub lock: LockConfig,
    pub actuator: ActuatorConfig,
    pub logging: LoggingConfig,
}

const DEFAULT_TOKEN_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 80)?
        .set_default("server.workers", num_cpus::get() as i64)?
        .set_default("cors.enabled", true)?
        .set_default("cors.allow_any_origin", false)?
        .set_default("cors.max_age", 3600)?
        .set_default("security.session_timeout_minutes", 30)?
        .set_default("security.max_concurrent_sessions", 2)?
        .set_default("security.session_refresh_interval_ms", 300_000)?
        .set_default("security.max_login_attempts", 3)?
        .set_default("security.lockout_duration_minutes", 15)?
        .set_default("security.max_failed_attempts_permanent", 5)?
        .set_default("security.rate_limit_window_seconds", 60)?
        .set_default("security.max_requests_per_window", 10)?
        .set_default("security.auth_timeout_ms", 30 * 60 * 1000)?
        .set_default("security.token_length", 32)?
        .set_default("security.token_alphabet", DEFAULT_TOKEN_ALPHABET)?
        .set_default("security.min_password_length", 8)?
        .set_default("security.require_strong_passwords", true)?
        .set_default("lock.auto_lock_delay_ms", 5000)?
        .set_default("lock.max_unlock_duration_ms", 10_000)?
        .set_default("lock.poll_interval_ms", 100)?
        .set_default("actuator.kind", "stepper")?
        .set_default("actuator.servo.pin", 18)?
        .set_default("actuator.servo.lock_angle", 0)?
        .set_default("actuator.servo.unlock_angle", 90)?
        .set_default("actuator.stepper.step_pin", 19)?
        .set_default("actuator.stepper.dir_pin", 21)?
        .set_default("actuator.stepper.enable_pin", 22)?
        .set_default("actuator.stepper.unlock_steps", 200)?
        .set_default("actuator.stepper.lock_steps", 200)?
        .set_default("actuator.stepper.step_delay_us", 1000)?
        .set_default("actuator.dc.pin1", 16)?
        .set_default("actuator.dc.pin2", 17)?
        .set_default("actuator.dc.run_ms", 1000)?
        .set_default("logging.max_entries", 100)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = with_defaults(Config::builder())?
            .set_default("environment", "development")?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_CREDENTIALS__PRIMARY__PASSWORD=...`
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with fixed credentials and small actuator timings, no file or
    /// environment sources.
    pub fn new_for_test() -> Result<Self, ConfigError> {
        let settings: Settings = with_defaults(Config::builder())?
            .set_default("environment", "test")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("credentials.primary.username", "admin")?
            .set_default("credentials.primary.password", "DoorUnlock2025!@#")?
            .set_default("credentials.override_password", "EmergencyAccess2025!@#$%")?
            .set_default("actuator.stepper.unlock_steps", 4)?
            .set_default("actuator.stepper.lock_steps", 4)?
            .set_default("actuator.stepper.step_delay_us", 10)?
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings the core cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sec = &self.security;
        if sec.token_length == 0 {
            return Err(ConfigError::Message("security.token_length must be positive".into()));
        }
        if sec.token_alphabet.chars().count() < 2 {
            return Err(ConfigError::Message(
                "security.token_alphabet needs at least two symbols".into(),
            ));
        }
        if sec.max_concurrent_sessions == 0 {
            return Err(ConfigError::Message(
                "security.max_concurrent_sessions must be positive".into(),
            ));
        }
        if sec.max_login_attempts == 0 || sec.max_failed_attempts_permanent < sec.max_login_attempts {
            return Err(ConfigError::Message(
                "security.max_failed_attempts_permanent must be >= max_login_attempts > 0".into(),
            ));
        }
        if self.lock.max_unlock_duration_ms < self.lock.auto_lock_delay_ms {
            return Err(ConfigError::Message(
                "lock.max_unlock_duration_ms must be >= lock.auto_lock_delay_ms".into(),
            ));
        }

        let creds = &self.credentials;
        self.check_secret("credentials.primary.password", &creds.primary.password)?;
        if let Some(secondary) = &creds.secondary {
            self.check_secret("credentials.secondary.password", &secondary.password)?;
        }
        if let Some(override_password) = &creds.override_password {
            self.check_secret("credentials.override_password", override_password)?;
        }
        Ok(())
    }

    fn check_secret(&self, key: &str, secret: &str) -> Result<(), ConfigError> {
        if secret.chars().count() < self.security.min_password_length {
            return Err(ConfigError::Message(format!(
                "{} is shorter than {} characters",
                key, self.security.min_password_length
            )));
        }
        if self.security.require_strong_passwords && !is_strong(secret) {
            return Err(ConfigError::Message(format!(
                "{} must mix upper case, lower case, digits and symbols",
                key
            )));
        }
        Ok(())
    }
}

fn is_strong(secret: &str) -> bool {
    secret.chars().any(|c| c.is_ascii_uppercase())
        && secret.chars().any(|c| c.is_ascii_lowercase())
        && secret.chars().any(|c| c.is_ascii_digit())
        && secret.chars().any(|c| !c.is_alphanumeric())
}
