//! Configuration loading for RelayBot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Assistant id used for ordinary replies when none is configured.
pub const DEFAULT_RESPONDER: &str = "concierge";

/// Assistant id used for payment intent detection when none is configured.
pub const DEFAULT_CLASSIFIER: &str = "payment-detector";

const DEFAULT_RESPONDER_INSTRUCTIONS: &str = "You are a friendly customer service assistant. \
Answer clearly and briefly. Separate distinct ideas with a blank line.";

const DEFAULT_CLASSIFIER_INSTRUCTIONS: &str = "You decide whether a customer message expresses \
the intention to pay, make a payment, or asks how to pay. Reply with exactly one word: YES or NO.";

const DEFAULT_PAYMENT_INSTRUCTIONS: &str = "To complete your payment, scan the QR code below \
with your banking app and send us a screenshot of the receipt.";

/// Get the RelayBot home directory (~/.relaybot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".relaybot"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.relaybot/settings.json
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from an explicit path, healing and validating them.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'relaybot init' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let mut settings: Settings = serde_json::from_str(&content)?;

    // Installs written before the classifier existed lack its profile.
    if ensure_default_assistants(&mut settings) {
        let updated = serde_json::to_string_pretty(&settings)?;
        std::fs::write(path, updated)?;
        tracing::info!("Applied default assistant provisioning to {}", path.display());
    }

    apply_env_overrides(&mut settings);
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Write a fresh settings file. Refuses to overwrite an existing one.
pub fn write_default_settings(path: &Path) -> Result<Settings> {
    if path.exists() {
        return Err(Error::Config(format!(
            "Settings file already exists at {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let settings = Settings::default();
    std::fs::write(path, serde_json::to_string_pretty(&settings)?)?;
    tracing::info!("Wrote default settings to {}", path.display());
    Ok(settings)
}

fn ensure_default_assistants(settings: &mut Settings) -> bool {
    let mut changed = false;

    if settings.routing.responder.is_none() {
        settings.routing.responder = Some(DEFAULT_RESPONDER.to_string());
        changed = true;
    }
    if settings.routing.classifier.is_none() {
        settings.routing.classifier = Some(DEFAULT_CLASSIFIER.to_string());
        changed = true;
    }

    if settings.routing.responder.as_deref() == Some(DEFAULT_RESPONDER)
        && !settings.assistants.contains_key(DEFAULT_RESPONDER)
    {
        settings
            .assistants
            .insert(DEFAULT_RESPONDER.to_string(), AssistantConfig::responder());
        changed = true;
    }
    if settings.routing.classifier.as_deref() == Some(DEFAULT_CLASSIFIER)
        && !settings.assistants.contains_key(DEFAULT_CLASSIFIER)
    {
        settings
            .assistants
            .insert(DEFAULT_CLASSIFIER.to_string(), AssistantConfig::classifier());
        changed = true;
    }

    changed
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Some(token) = non_empty_env("TELEGRAM_BOT_TOKEN") {
        settings.channels.telegram.bot_token = Some(token);
    }
    if let Some(key) = non_empty_env("OPENAI_API_KEY") {
        settings.models.openai.api_key = Some(key);
    }
    if let Some(path) = non_empty_env("RELAYBOT_QR_PATH") {
        settings.payment.qr_path = Some(PathBuf::from(path));
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_settings(settings: &Settings) -> Result<()> {
    for (role, id) in [
        ("routing.responder", settings.routing.responder.as_deref()),
        ("routing.classifier", settings.routing.classifier.as_deref()),
    ] {
        if let Some(id) = id {
            if !settings.assistants.contains_key(id) {
                return Err(Error::Config(format!(
                    "{} '{}' not found in settings.assistants",
                    role, id
                )));
            }
        }
    }
    if settings.conversation.max_history == 0 {
        return Err(Error::Config(
            "conversation.max_history must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Channel configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChannelConfig {
    pub bot_token: Option<String>,
}

/// Channels configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Channels {
    #[serde(default)]
    pub telegram: ChannelConfig,
}

/// Provider model configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProviderModel {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Models configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Models {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: ProviderModel,
    #[serde(default)]
    pub ollama: ProviderModel,
    #[serde(default = "default_request_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    120
}

impl Default for Models {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            openai: ProviderModel::default(),
            ollama: ProviderModel::default(),
            timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// An assistant profile: the instructions and model behind an assistant id.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AssistantConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: String,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl AssistantConfig {
    fn responder() -> Self {
        Self {
            name: Some("Concierge".to_string()),
            instructions: DEFAULT_RESPONDER_INSTRUCTIONS.to_string(),
            model: None,
            provider: None,
        }
    }

    fn classifier() -> Self {
        Self {
            name: Some("Payment detector".to_string()),
            instructions: DEFAULT_CLASSIFIER_INSTRUCTIONS.to_string(),
            model: None,
            provider: None,
        }
    }
}

/// Which assistant answers and which one classifies.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Routing {
    pub responder: Option<String>,
    pub classifier: Option<String>,
}

impl Routing {
    pub fn responder_id(&self) -> &str {
        self.responder.as_deref().unwrap_or(DEFAULT_RESPONDER)
    }

    pub fn classifier_id(&self) -> &str {
        self.classifier.as_deref().unwrap_or(DEFAULT_CLASSIFIER)
    }
}

/// Payment reply configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Payment {
    pub qr_path: Option<PathBuf>,
    #[serde(default = "default_payment_instructions")]
    pub instructions: String,
}

fn default_payment_instructions() -> String {
    DEFAULT_PAYMENT_INSTRUCTIONS.to_string()
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            qr_path: None,
            instructions: default_payment_instructions(),
        }
    }
}

/// In-memory conversation state limits.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationSettings {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

fn default_max_history() -> usize {
    20
}

fn default_idle_ttl_secs() -> u64 {
    6 * 3600
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

/// Status web server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Web {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    3008
}

impl Default for Web {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

/// RelayBot settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default)]
    pub channels: Channels,

    #[serde(default)]
    pub models: Models,

    #[serde(default)]
    pub assistants: HashMap<String, AssistantConfig>,

    #[serde(default)]
    pub routing: Routing,

    #[serde(default)]
    pub payment: Payment,

    #[serde(default)]
    pub conversation: ConversationSettings,

    #[serde(default)]
    pub web: Web,
}

impl Default for Settings {
    fn default() -> Self {
        let mut assistants = HashMap::new();
        assistants.insert(DEFAULT_RESPONDER.to_string(), AssistantConfig::responder());
        assistants.insert(DEFAULT_CLASSIFIER.to_string(), AssistantConfig::classifier());

        Self {
            channels: Channels::default(),
            models: Models::default(),
            assistants,
            routing: Routing {
                responder: Some(DEFAULT_RESPONDER.to_string()),
                classifier: Some(DEFAULT_CLASSIFIER.to_string()),
            },
            payment: Payment::default(),
            conversation: ConversationSettings::default(),
            web: Web::default(),
        }
    }
}

impl Settings {
    /// Resolve the payment QR asset once, relative to the home dir when not absolute.
    pub fn resolve_payment_asset(&self) -> Result<PathBuf> {
        let configured = self.payment.qr_path.as_ref().ok_or_else(|| {
            Error::Config("payment.qr_path is not set (or set RELAYBOT_QR_PATH)".to_string())
        })?;

        let path = if configured.is_absolute() {
            configured.clone()
        } else {
            get_home_dir()?.join(configured)
        };

        if !path.is_file() {
            return Err(Error::Config(format!(
                "Payment QR asset not found at {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Copy of the settings with secrets replaced, for display.
    pub fn masked(&self) -> Settings {
        let mut copy = self.clone();
        for secret in [
            &mut copy.channels.telegram.bot_token,
            &mut copy.models.openai.api_key,
            &mut copy.models.ollama.api_key,
        ] {
            if secret.is_some() {
                *secret = Some("********".to_string());
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings_validate() {
        let settings = Settings::default();
        assert!(validate_settings(&settings).is_ok());
        assert_eq!(settings.routing.responder_id(), DEFAULT_RESPONDER);
        assert_eq!(settings.routing.classifier_id(), DEFAULT_CLASSIFIER);
    }

    #[test]
    fn test_load_heals_missing_assistants() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"models": {"provider": "ollama"}}"#).unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.models.provider, "ollama");
        assert!(settings.assistants.contains_key(DEFAULT_RESPONDER));
        assert!(settings.assistants.contains_key(DEFAULT_CLASSIFIER));

        // Healing is written back.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(DEFAULT_CLASSIFIER));
    }

    #[test]
    fn test_unknown_routing_target_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"routing": {"responder": "ghost"}}"#).unwrap();

        let err = load_settings_from(&path).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_missing_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_settings_from(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_write_default_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        assert!(write_default_settings(&path).is_ok());
        assert!(write_default_settings(&path).is_err());
    }

    #[test]
    fn test_payment_asset_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let qr = temp_dir.path().join("qr.png");

        let mut settings = Settings::default();
        assert!(settings.resolve_payment_asset().is_err());

        settings.payment.qr_path = Some(qr.clone());
        assert!(settings.resolve_payment_asset().is_err());

        std::fs::write(&qr, b"png").unwrap();
        assert_eq!(settings.resolve_payment_asset().unwrap(), qr);
    }

    #[test]
    fn test_masked_hides_secrets() {
        let mut settings = Settings::default();
        settings.channels.telegram.bot_token = Some("123:abc".to_string());

        let masked = settings.masked();
        assert_eq!(masked.channels.telegram.bot_token.as_deref(), Some("********"));
        assert!(masked.models.openai.api_key.is_none());
    }
}
