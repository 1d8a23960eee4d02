/*!
 * Backend profiles: every provider described as data.
 *
 * A profile records what the shared core needs to know about a provider
 * (language dialect, prompt shape, placeholder family, cache behaviour,
 * settings) without any provider-specific code. Only the `kind` decides
 * which wire protocol is spoken.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::language_utils::LanguageMap;
use crate::providers::ContentErrorPolicy;
use crate::translation::placeholder::PlaceholderStyle;
use crate::translation::postprocess::{PostProcess, ResponseFormat};
use crate::translation::prompts::{PayloadShape, PromptStyle};

/// Wire protocol spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// `/chat/completions` style APIs
    OpenAiCompatible,
    /// Ollama `/api/chat`
    Ollama,
    /// Self-hosted MT inference server
    MtServer,
    /// DeepLX bridge
    DeepLX,
    /// No built-in client; the caller supplies a `Backend`
    External,
}

/// How a setting value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    /// Free text
    #[default]
    Plain,
    /// Must parse as a URL
    Url,
    /// Credential; never logged
    Secret,
}

/// One setting a profile understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingSpec {
    /// Setting key, also the environment override name
    pub key: String,
    /// Built-in default
    pub default: Option<String>,
    /// Construction fails when no layer provides a value
    pub required: bool,
    /// Value interpretation
    pub kind: SettingKind,
}

impl SettingSpec {
    /// Optional setting with a default
    pub fn optional(key: &str, default: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            default: default.map(str::to_string),
            required: false,
            kind: SettingKind::Plain,
        }
    }

    /// Setting that must be provided
    pub fn required(key: &str) -> Self {
        Self {
            key: key.to_string(),
            default: None,
            required: true,
            kind: SettingKind::Plain,
        }
    }

    /// Mark the setting as an endpoint URL
    pub fn url(mut self) -> Self {
        self.kind = SettingKind::Url;
        self
    }

    /// Mark the setting as a credential
    pub fn secret(mut self) -> Self {
        self.kind = SettingKind::Secret;
        self
    }
}

/// Capability record for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendProfile {
    /// Provider name (registry key and cache identity)
    pub name: String,
    /// Wire protocol
    pub kind: BackendKind,
    /// Generic to provider language codes
    pub lang_map: LanguageMap,
    /// Accepts a caller-supplied prompt template
    pub custom_prompt: bool,
    /// Marker family the provider keeps intact
    pub placeholder_style: PlaceholderStyle,
    /// Request payload shape
    pub payload_shape: PayloadShape,
    /// Default prompt flavour
    pub prompt_style: PromptStyle,
    /// Every call behaves as if the cache were bypassed
    pub cache_exempt: bool,
    /// Setting that turns `cache_exempt` on at runtime
    pub cache_exempt_key: Option<String>,
    /// What a provider content refusal turns into
    pub content_error_policy: ContentErrorPolicy,
    /// Output clean-up applied before sanity checks
    pub postprocess: PostProcess,
    /// Settings the provider understands
    pub settings: Vec<SettingSpec>,
    /// Setting holding the default model
    pub model_key: Option<String>,
    /// Model used when neither the caller nor the settings name one
    pub default_model: Option<String>,
    /// Setting holding the endpoint
    pub endpoint_key: Option<String>,
    /// Endpoint used when the profile has no endpoint setting
    pub fixed_endpoint: Option<String>,
    /// Path appended to the endpoint (`/v1` for Xinference)
    pub endpoint_suffix: Option<String>,
    /// Setting holding the credential
    pub api_key_key: Option<String>,
    /// Parameters that change the output and so belong in the cache key
    pub cache_params: BTreeMap<String, serde_json::Value>,
    /// Default worker bound for batch dispatch
    pub max_concurrent_requests: usize,
}

impl BackendProfile {
    /// Bare profile with conservative defaults
    pub fn new(name: &str, kind: BackendKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            lang_map: LanguageMap::new(),
            custom_prompt: false,
            placeholder_style: PlaceholderStyle::RichTextPair,
            payload_shape: PayloadShape::Text,
            prompt_style: PromptStyle::Standard,
            cache_exempt: false,
            cache_exempt_key: None,
            content_error_policy: ContentErrorPolicy::Raise,
            postprocess: PostProcess::default(),
            settings: Vec::new(),
            model_key: None,
            default_model: None,
            endpoint_key: None,
            fixed_endpoint: None,
            endpoint_suffix: None,
            api_key_key: None,
            cache_params: BTreeMap::new(),
            max_concurrent_requests: 4,
        }
    }

    /// Set the language map
    pub fn with_lang_map(mut self, pairs: &[(&str, &str)]) -> Self {
        self.lang_map = LanguageMap::from_pairs(pairs.iter().copied());
        self
    }

    /// Add a setting
    pub fn with_setting(mut self, spec: SettingSpec) -> Self {
        self.settings.push(spec);
        self
    }

    /// Declare the model setting and its default
    pub fn with_model(mut self, key: &str, default: Option<&str>) -> Self {
        self.model_key = Some(key.to_string());
        self.default_model = default.map(str::to_string);
        self.settings.push(SettingSpec::optional(key, default));
        self
    }

    /// Declare the endpoint setting
    pub fn with_endpoint(mut self, key: &str, default: Option<&str>) -> Self {
        self.endpoint_key = Some(key.to_string());
        let spec = match default {
            Some(_) => SettingSpec::optional(key, default),
            None => SettingSpec::required(key),
        };
        self.settings.push(spec.url());
        self
    }

    /// Declare a fixed endpoint
    pub fn with_fixed_endpoint(mut self, endpoint: &str) -> Self {
        self.fixed_endpoint = Some(endpoint.to_string());
        self
    }

    /// Declare the credential setting
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key_key = Some(key.to_string());
        self.settings.push(SettingSpec::required(key).secret());
        self
    }

    /// Add a cache-impacting parameter
    pub fn with_cache_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.cache_params.insert(key.to_string(), value);
        self
    }

    /// Make this a chat-style LLM profile.
    ///
    /// LLM backends use formula markers, accept custom prompts and are sampled
    /// at temperature 0 so that formula markers survive.
    pub fn llm_chat(mut self) -> Self {
        self.custom_prompt = true;
        self.placeholder_style = PlaceholderStyle::Formula;
        self.payload_shape = PayloadShape::Chat;
        self.cache_params
            .insert("temperature".to_string(), serde_json::json!(0));
        self
    }

    /// Whether the profile has a built-in client
    pub fn has_builtin_backend(&self) -> bool {
        self.kind != BackendKind::External
    }

    /// Whether this profile declares `key`
    pub fn declares(&self, key: &str) -> bool {
        self.settings.iter().any(|spec| spec.key == key)
    }
}

/// Domain hint sent to Qwen-MT by default
const QWEN_MT_DOMAINS: &str = "This sentence is extracted from a scientific paper. \
When translating, please pay close attention to the use of specialized terminology \
and adhere to scientific sentence structures to keep the technical rigor and precision of the original text.";

/// Names of every built-in profile, in registry order
pub const BUILTIN_NAMES: &[&str] = &[
    "google",
    "bing",
    "deepl",
    "deeplx",
    "ollama",
    "xinference",
    "openai",
    "azure-openai",
    "llm",
    "modelscope",
    "zhipu",
    "silicon",
    "gemini",
    "azure",
    "tencent",
    "anythingllm",
    "dify",
    "grok",
    "groq",
    "deepseek",
    "openailiked",
    "qwen-mt",
    "mt",
];

/// Look up a built-in profile by name (case-insensitive)
pub fn builtin(name: &str) -> Option<BackendProfile> {
    let profile = match name.trim().to_lowercase().as_str() {
        "google" => {
            let mut p = BackendProfile::new("google", BackendKind::External)
                .with_lang_map(&[("zh", "zh-CN")]);
            p.content_error_policy = ContentErrorPolicy::Sentinel;
            p
        }
        "bing" => BackendProfile::new("bing", BackendKind::External)
            .with_lang_map(&[("zh", "zh-Hans")]),
        "deepl" => BackendProfile::new("deepl", BackendKind::External)
            .with_lang_map(&[("zh", "zh-Hans")])
            .with_api_key("DEEPL_AUTH_KEY"),
        "deeplx" => BackendProfile::new("deeplx", BackendKind::DeepLX)
            .with_lang_map(&[("zh", "zh-Hans")])
            .with_endpoint("DEEPLX_ENDPOINT", Some("https://api.deepl.com/translate"))
            .with_setting(SettingSpec::optional("DEEPLX_ACCESS_TOKEN", None).secret()),
        "ollama" => {
            let mut p = BackendProfile::new("ollama", BackendKind::Ollama)
                .with_endpoint("OLLAMA_HOST", Some("http://127.0.0.1:11434"))
                .with_model("OLLAMA_MODEL", Some("gemma2"))
                .llm_chat();
            // Ollama keeps the classic rich-text markers
            p.placeholder_style = PlaceholderStyle::RichTextPair;
            p.postprocess.strip_think_blocks = true;
            p.max_concurrent_requests = 2;
            p
        }
        "xinference" => {
            let mut p = BackendProfile::new("xinference", BackendKind::OpenAiCompatible)
                .with_endpoint("XINFERENCE_HOST", Some("http://127.0.0.1:9997"))
                .with_model("XINFERENCE_MODEL", Some("gemma-2-it"))
                .llm_chat();
            p.placeholder_style = PlaceholderStyle::RichTextPair;
            p.payload_shape = PayloadShape::MergedChat;
            p.endpoint_suffix = Some("/v1".to_string());
            p.postprocess.strip_tokens = vec!["<end_of_turn>".to_string()];
            p.max_concurrent_requests = 2;
            p
        }
        "openai" => openai_like("openai", "OPENAI", "https://api.openai.com/v1", Some("gpt-4o-mini")),
        "azure-openai" => BackendProfile::new("azure-openai", BackendKind::External)
            .with_endpoint("AZURE_OPENAI_BASE_URL", None)
            .with_api_key("AZURE_OPENAI_API_KEY")
            .with_model("AZURE_OPENAI_MODEL", Some("gpt-4o-mini"))
            .llm_chat(),
        "llm" => {
            let mut p = openai_like("llm", "OPENAI", "https://api.openai.com/v1", Some("gpt-3.5-turbo"))
                .with_setting(SettingSpec::optional("LLM_IGNORE_CACHE", Some("false")));
            p.prompt_style = PromptStyle::Tagged;
            p.cache_exempt_key = Some("LLM_IGNORE_CACHE".to_string());
            p.postprocess.response_format = ResponseFormat::Tagged;
            p.postprocess.trim_unbalanced_quotes = true;
            p
        }
        "modelscope" => openai_like(
            "modelscope",
            "MODELSCOPE",
            "https://api-inference.modelscope.cn/v1",
            Some("Qwen/Qwen2.5-32B-Instruct"),
        ),
        "zhipu" => {
            let mut p = hosted_openai(
                "zhipu",
                "ZHIPU",
                "https://open.bigmodel.cn/api/paas/v4",
                "glm-4-flash",
            );
            p.content_error_policy = ContentErrorPolicy::Sentinel;
            p
        }
        "silicon" => hosted_openai(
            "silicon",
            "SILICON",
            "https://api.siliconflow.cn/v1",
            "Qwen/Qwen2.5-7B-Instruct",
        ),
        "gemini" => hosted_openai(
            "gemini",
            "GEMINI",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            "gemini-1.5-flash",
        ),
        "azure" => BackendProfile::new("azure", BackendKind::External)
            .with_lang_map(&[("zh", "zh-Hans")])
            .with_endpoint("AZURE_ENDPOINT", Some("https://api.translator.azure.cn"))
            .with_api_key("AZURE_API_KEY"),
        "tencent" => BackendProfile::new("tencent", BackendKind::External)
            .with_setting(SettingSpec::required("TENCENTCLOUD_SECRET_ID").secret())
            .with_setting(SettingSpec::required("TENCENTCLOUD_SECRET_KEY").secret()),
        "anythingllm" => {
            let mut p = BackendProfile::new("anythingllm", BackendKind::External)
                .with_endpoint("AnythingLLM_URL", None)
                .with_api_key("AnythingLLM_APIKEY");
            p.custom_prompt = true;
            p.payload_shape = PayloadShape::Chat;
            p
        }
        "dify" => BackendProfile::new("dify", BackendKind::External)
            .with_endpoint("DIFY_API_URL", None)
            .with_api_key("DIFY_API_KEY"),
        "grok" => hosted_openai("grok", "GORK", "https://api.x.ai/v1", "grok-2-1212"),
        "groq" => hosted_openai(
            "groq",
            "GROQ",
            "https://api.groq.com/openai/v1",
            "llama-3-3-70b-versatile",
        ),
        "deepseek" => {
            let mut p = hosted_openai(
                "deepseek",
                "DEEPSEEK",
                "https://api.deepseek.com/v1",
                "deepseek-chat",
            );
            p.postprocess.strip_think_blocks = true;
            p
        }
        "openailiked" => {
            let mut p = BackendProfile::new("openailiked", BackendKind::OpenAiCompatible)
                .with_endpoint("OPENAILIKED_BASE_URL", None)
                .with_setting(SettingSpec::optional("OPENAILIKED_API_KEY", None).secret())
                .with_model("OPENAILIKED_MODEL", None)
                .llm_chat();
            p.api_key_key = Some("OPENAILIKED_API_KEY".to_string());
            p
        }
        "qwen-mt" => {
            let mut p = hosted_openai(
                "qwen-mt",
                "ALI",
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
                "qwen-mt-turbo",
            )
            .with_lang_map(&[
                ("zh", "Chinese"),
                ("zh-tw", "Chinese"),
                ("en", "English"),
                ("fr", "French"),
                ("de", "German"),
                ("ja", "Japanese"),
                ("ko", "Korean"),
                ("ru", "Russian"),
                ("es", "Spanish"),
                ("it", "Italian"),
            ])
            .with_setting(SettingSpec::optional("ALI_DOMAINS", Some(QWEN_MT_DOMAINS)));
            p.payload_shape = PayloadShape::Text;
            p
        }
        "mt" => {
            let mut p = BackendProfile::new("mt", BackendKind::MtServer)
                .with_lang_map(&[("zh", "zh-CN")])
                .with_endpoint(
                    "MT_BASE_URL",
                    Some("http://0.0.0.0:8899/v2/models/ensemble/generate"),
                )
                .with_setting(SettingSpec::optional("MT_MAX_TOKENS", Some("511")));
            p.default_model = Some("mt".to_string());
            p.max_concurrent_requests = 8;
            p
        }
        _ => return None,
    };
    Some(profile)
}

/// Every built-in profile, in registry order
pub fn all() -> Vec<BackendProfile> {
    BUILTIN_NAMES.iter().filter_map(|name| builtin(name)).collect()
}

/// Built-in profile, or the mock profile under the name "mock"
pub fn lookup(name: &str) -> Option<BackendProfile> {
    if name.trim().eq_ignore_ascii_case(MOCK_NAME) {
        Some(mock())
    } else {
        builtin(name)
    }
}

/// Name of the dry-run profile
pub const MOCK_NAME: &str = "mock";

/// Profile for `MockBackend`: plain text payloads, rich-text markers
pub fn mock() -> BackendProfile {
    let mut p = BackendProfile::new(MOCK_NAME, BackendKind::External);
    p.default_model = Some(MOCK_NAME.to_string());
    p.max_concurrent_requests = 16;
    p
}

/// OpenAI-compatible profile whose endpoint is configurable
fn openai_like(name: &str, prefix: &str, base_url: &str, model: Option<&str>) -> BackendProfile {
    BackendProfile::new(name, BackendKind::OpenAiCompatible)
        .with_endpoint(&format!("{}_BASE_URL", prefix), Some(base_url))
        .with_api_key(&format!("{}_API_KEY", prefix))
        .with_model(&format!("{}_MODEL", prefix), model)
        .llm_chat()
}

/// OpenAI-compatible profile pinned to a hosted endpoint
fn hosted_openai(name: &str, prefix: &str, base_url: &str, model: &str) -> BackendProfile {
    BackendProfile::new(name, BackendKind::OpenAiCompatible)
        .with_fixed_endpoint(base_url)
        .with_api_key(&format!("{}_API_KEY", prefix))
        .with_model(&format!("{}_MODEL", prefix), Some(model))
        .llm_chat()
}
