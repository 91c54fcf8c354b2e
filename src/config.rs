//! Configuration types for the bouncer.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// CrowdSec local API connection.
    pub crowdsec: CrowdSecConfig,

    /// Cloudflare account, list and sync settings.
    pub cloudflare: CloudflareConfig,

    /// Backoff for failed flushes.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// CrowdSec LAPI configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrowdSecConfig {
    /// LAPI base URL.
    #[serde(default = "default_lapi_url")]
    pub lapi_url: String,

    /// Bouncer API key (supports ${ENV_VAR} syntax).
    #[serde(default)]
    pub lapi_key: String,

    /// How often to poll the decision stream (seconds).
    #[serde(default = "default_stream_frequency")]
    pub update_frequency_seconds: u64,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Decision scopes to request.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for CrowdSecConfig {
    fn default() -> Self {
        Self {
            lapi_url: default_lapi_url(),
            lapi_key: String::new(),
            update_frequency_seconds: default_stream_frequency(),
            timeout_ms: default_timeout(),
            scopes: default_scopes(),
        }
    }
}

fn default_lapi_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_stream_frequency() -> u64 {
    10
}

fn default_timeout() -> u64 {
    10000
}

fn default_scopes() -> Vec<String> {
    vec!["ip".to_string(), "range".to_string()]
}

/// Cloudflare configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudflareConfig {
    /// API token with list and firewall permissions (supports ${ENV_VAR} syntax).
    #[serde(default)]
    pub api_token: String,

    /// Account owning the IP list.
    #[serde(default)]
    pub account_id: String,

    /// Zone to install the blocking rule in. No rule is managed when unset.
    #[serde(default)]
    pub zone_id: Option<String>,

    /// API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Name of the managed IP list.
    #[serde(default = "default_list_name")]
    pub ip_list_name: String,

    /// Description for the list and the firewall rule.
    #[serde(default = "default_list_description")]
    pub ip_list_description: String,

    /// Comment attached to every list item.
    #[serde(default = "default_item_comment")]
    pub item_comment: String,

    /// How often to push batched changes (seconds).
    #[serde(default = "default_flush_frequency")]
    pub update_frequency_seconds: u64,

    /// Action of the firewall rule.
    #[serde(default)]
    pub rule_action: RuleAction,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            account_id: String::new(),
            zone_id: None,
            api_base_url: default_api_base_url(),
            ip_list_name: default_list_name(),
            ip_list_description: default_list_description(),
            item_comment: default_item_comment(),
            update_frequency_seconds: default_flush_frequency(),
            rule_action: RuleAction::default(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_list_name() -> String {
    "crowdsec".to_string()
}

fn default_list_description() -> String {
    "IP list managed by crowdsec-cloudflare-bouncer".to_string()
}

fn default_item_comment() -> String {
    "Added by crowdsec-cloudflare-bouncer".to_string()
}

fn default_flush_frequency() -> u64 {
    30
}

/// Firewall rule action for listed IPs.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    #[default]
    Block,
    Challenge,
    JsChallenge,
    ManagedChallenge,
    Log,
}

impl RuleAction {
    /// Name used by the Cloudflare API.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Block => "block",
            RuleAction::Challenge => "challenge",
            RuleAction::JsChallenge => "js_challenge",
            RuleAction::ManagedChallenge => "managed_challenge",
            RuleAction::Log => "log",
        }
    }
}

/// Retry policy for failed flushes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Delay before the first retry (seconds). Doubles per failure.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_seconds: u64,

    /// Maximum delay between retries (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,

    /// Give up and exit when failures persist longer than this (seconds).
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_seconds: default_initial_backoff(),
            max_backoff_seconds: default_max_backoff(),
            max_age_seconds: default_max_age(),
        }
    }
}

fn default_initial_backoff() -> u64 {
    30
}

fn default_max_backoff() -> u64 {
    600
}

fn default_max_age() -> u64 {
    3600
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.crowdsec.lapi_key.is_empty() {
            anyhow::bail!("crowdsec.lapi_key is required");
        }
        if reqwest::Url::parse(&self.crowdsec.lapi_url).is_err() {
            anyhow::bail!("crowdsec.lapi_url is not a valid URL: {}", self.crowdsec.lapi_url);
        }
        if self.crowdsec.update_frequency_seconds == 0 {
            anyhow::bail!("crowdsec.update_frequency_seconds must be > 0");
        }

        if self.cloudflare.api_token.is_empty() {
            anyhow::bail!("cloudflare.api_token is required");
        }
        if self.cloudflare.account_id.is_empty() {
            anyhow::bail!("cloudflare.account_id is required");
        }
        if matches!(self.cloudflare.zone_id.as_deref(), Some("")) {
            anyhow::bail!("cloudflare.zone_id must not be empty when set");
        }
        if self.cloudflare.update_frequency_seconds == 0 {
            anyhow::bail!("cloudflare.update_frequency_seconds must be > 0");
        }

        // List names are referenced as `$name` in rule expressions.
        let name = &self.cloudflare.ip_list_name;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            anyhow::bail!(
                "cloudflare.ip_list_name must be lowercase letters, digits or '_': {}",
                name
            );
        }

        if self.retry.initial_backoff_seconds > self.retry.max_backoff_seconds {
            anyhow::bail!(
                "retry.initial_backoff_seconds ({}) must be <= retry.max_backoff_seconds ({})",
                self.retry.initial_backoff_seconds,
                self.retry.max_backoff_seconds
            );
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# CrowdSec Cloudflare bouncer configuration

crowdsec:
  lapi_url: "http://127.0.0.1:8080"
  lapi_key: "${CROWDSEC_LAPI_KEY}"     # From `cscli bouncers add`
  update_frequency_seconds: 10         # Decision stream poll interval
  timeout_ms: 10000
  scopes:
    - ip
    - range

cloudflare:
  api_token: "${CLOUDFLARE_API_TOKEN}"
  account_id: "your-account-id"
  zone_id: "your-zone-id"              # Omit to skip firewall rule management
  ip_list_name: crowdsec               # Recreated empty at startup
  ip_list_description: "IP list managed by crowdsec-cloudflare-bouncer"
  item_comment: "Added by crowdsec-cloudflare-bouncer"
  update_frequency_seconds: 30         # Batched list updates interval
  rule_action: block                   # block, challenge, js_challenge, managed_challenge, log
  timeout_ms: 10000

# Backoff for failed list updates
retry:
  initial_backoff_seconds: 30
  max_backoff_seconds: 600
  max_age_seconds: 3600                # Exit when failing for longer than this
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> anyhow::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    Ok(result)
}
