use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Plain HTTP settings (link discovery, photo downloads)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// WebDriver session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_size")]
    pub window_size: String,

    /// Navigation and critical page elements.
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// History and detail panels.
    #[serde(default = "default_panel_timeout_secs")]
    pub panel_timeout_secs: u64,

    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    #[serde(default = "default_gallery_timeout_secs")]
    pub gallery_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_login_settle_secs")]
    pub login_settle_secs: u64,
}

/// Output locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_for_sale_dir")]
    pub for_sale_dir: PathBuf,

    #[serde(default = "default_sold_expired_dir")]
    pub sold_expired_dir: PathBuf,

    #[serde(default = "default_photos_dir")]
    pub photos_dir: PathBuf,
}

/// Batch driver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Exact `type` detail value a record must carry to be written.
    #[serde(default = "default_property_type")]
    pub property_type: String,

    #[serde(default = "default_subdistricts")]
    pub subdistricts: Vec<Subdistrict>,

    /// Used by `sold-expired` and `photos` when no URLs are given on the command line.
    #[serde(default)]
    pub listing_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Subdistrict {
    pub name: String,
    pub id: u32,
}

/// Site login, read from `VIEWPOINT_EMAIL` / `VIEWPOINT_PASSWORD`.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.viewpoint.ca".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    750
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "viewpoint-scraper/0.1 (personal market research)".to_string()
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}
fn default_window_size() -> String {
    "1920,1080".to_string()
}
fn default_page_timeout_secs() -> u64 {
    60
}
fn default_panel_timeout_secs() -> u64 {
    5
}
fn default_login_timeout_secs() -> u64 {
    5
}
fn default_gallery_timeout_secs() -> u64 {
    20
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_login_settle_secs() -> u64 {
    5
}
fn default_for_sale_dir() -> PathBuf {
    PathBuf::from("data/for_sale")
}
fn default_sold_expired_dir() -> PathBuf {
    PathBuf::from("data/sold_expired")
}
fn default_photos_dir() -> PathBuf {
    PathBuf::from("data/photos")
}
fn default_property_type() -> String {
    "Single Family".to_string()
}
fn default_subdistricts() -> Vec<Subdistrict> {
    [
        ("Subdistrict A (Bedford)", 74),
        ("Subdistrict F (Bedford)", 73),
        ("Subdistrict H (Bedford)", 85),
        ("Subdistrict A (Kingswood, Haliburton Hills, Hammonds Plains)", 86),
        ("Subdistrict F (Fairmount, Clayton Park, Rockingham)", 23),
    ]
    .into_iter()
    .map(|(name, id)| Subdistrict { name: name.to_string(), id })
    .collect()
}
fn default_true() -> bool {
    true
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            window_size: default_window_size(),
            page_timeout_secs: default_page_timeout_secs(),
            panel_timeout_secs: default_panel_timeout_secs(),
            login_timeout_secs: default_login_timeout_secs(),
            gallery_timeout_secs: default_gallery_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            login_settle_secs: default_login_settle_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            for_sale_dir: default_for_sale_dir(),
            sold_expired_dir: default_sold_expired_dir(),
            photos_dir: default_photos_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            property_type: default_property_type(),
            subdistricts: default_subdistricts(),
            listing_urls: Vec::new(),
        }
    }
}

impl BrowserConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn panel_timeout(&self) -> Duration {
        Duration::from_secs(self.panel_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn gallery_timeout(&self) -> Duration {
        Duration::from_secs(self.gallery_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("VIEWPOINT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Self::from_config(cfg)
    }

    /// A bad value anywhere fails the whole load rather than reverting to defaults.
    pub fn from_config(cfg: config::Config) -> Result<Self> {
        cfg.try_deserialize().context("Invalid configuration")
    }
}

impl Credentials {
    /// Requires `AppConfig::load` (or another `.env` load) to have run first.
    pub fn from_env() -> Result<Self> {
        let email = std::env::var("VIEWPOINT_EMAIL").context("VIEWPOINT_EMAIL is not set")?;
        let password =
            std::env::var("VIEWPOINT_PASSWORD").context("VIEWPOINT_PASSWORD is not set")?;
        Ok(Self { email, password })
    }
}
