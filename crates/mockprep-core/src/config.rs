use std::{collections::HashSet, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
}

fn default_max_concurrent() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Responses analyzed at the same time. 1 keeps the pass sequential.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_llm_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_transcription_model() -> String {
    "whisper-large-v3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_transcription_model")]
    pub model: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_transcription_model(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_media_root() -> String {
    "media".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_media_root")]
    pub media_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            media_root: default_media_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub enabled: bool,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockprepConfig {
    pub main: MainConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl MockprepConfig {
    pub fn provider(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.provider_id == provider_id)
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Loads `main.yaml` and `providers.d/*.yaml` from a config directory.
pub fn load_config(root: &Path) -> Result<MockprepConfig> {
    let mut main: MainConfig = read_yaml_file(&root.join("main.yaml"))?;
    let providers_dir = root.join("providers.d");
    let mut providers = if providers_dir.exists() {
        read_yaml_dir::<ProviderConfig>(&providers_dir)?
    } else {
        Vec::new()
    };

    resolve_main_env(&mut main);
    resolve_providers_env(&mut providers);

    let config = MockprepConfig { main, providers };
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &MockprepConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.provider_id.as_str()) {
            return Err(anyhow!("duplicate provider_id: {}", provider.provider_id));
        }
    }

    if config.main.runtime.max_concurrent == 0 {
        return Err(anyhow!("runtime.max_concurrent must be at least 1"));
    }

    let temperature = config.main.pipeline.llm.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(anyhow!(
            "pipeline.llm.temperature must be within [0, 2], got {temperature}"
        ));
    }

    let pipeline = &config.main.pipeline;
    for (stage, provider_id) in [
        ("llm", pipeline.llm.provider.as_str()),
        ("transcription", pipeline.transcription.provider.as_str()),
    ] {
        match config.provider(provider_id) {
            None => {
                return Err(anyhow!(
                    "unknown provider_id in pipeline.{stage}: {provider_id}"
                ))
            }
            Some(provider) if !provider.enabled => {
                return Err(anyhow!(
                    "disabled provider_id in pipeline.{stage}: {provider_id}"
                ))
            }
            Some(_) => {}
        }
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn read_yaml_dir<T>(dir: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read config dir: {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read dir entry: {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        items.push(read_yaml_file::<T>(&path)?);
    }
    Ok(items)
}

fn resolve_main_env(main: &mut MainConfig) {
    main.app.name = resolve_env_var(&main.app.name);
    main.app.env = resolve_env_var(&main.app.env);

    let pipeline = &mut main.pipeline;
    pipeline.llm.provider = resolve_env_var(&pipeline.llm.provider);
    pipeline.llm.model = resolve_env_var(&pipeline.llm.model);
    pipeline.transcription.provider = resolve_env_var(&pipeline.transcription.provider);
    pipeline.transcription.model = resolve_env_var(&pipeline.transcription.model);
    if let Some(language) = &mut pipeline.transcription.language {
        *language = resolve_env_var(language);
    }

    main.storage.data_dir = resolve_env_var(&main.storage.data_dir);
    main.storage.media_root = resolve_env_var(&main.storage.media_root);
}

fn resolve_providers_env(providers: &mut [ProviderConfig]) {
    for provider in providers {
        provider.provider_id = resolve_env_var(&provider.provider_id);
        if let Some(api_base) = &mut provider.api_base {
            *api_base = resolve_env_var(api_base);
        }
        if let Some(api_key) = &mut provider.api_key {
            *api_key = resolve_env_var(api_key);
        }
    }
}
