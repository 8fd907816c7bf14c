use cadence_core::config::ModelConfig;

/// Endpoint defaults for an OpenAI-compatible provider.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    let (default_base_url, extra_headers): (&'static str, &'static [(&str, &str)]) =
        match provider {
            "openai" => ("https://api.openai.com/v1/chat/completions", &[]),
            "ollama" => ("http://localhost:11434/v1/chat/completions", &[]),
            "vllm" => ("http://localhost:8000/v1/chat/completions", &[]),
            "lmstudio" => ("http://localhost:1234/v1/chat/completions", &[]),
            "groq" => ("https://api.groq.com/openai/v1/chat/completions", &[]),
            "openrouter" => (
                "https://openrouter.ai/api/v1/chat/completions",
                &[("X-Title", "Cadence")],
            ),
            "together" => ("https://api.together.xyz/v1/chat/completions", &[]),
            "mistral" => ("https://api.mistral.ai/v1/chat/completions", &[]),
            "deepseek" => ("https://api.deepseek.com/v1/chat/completions", &[]),
            "perplexity" => ("https://api.perplexity.ai/chat/completions", &[]),
            _ => return None,
        };
    Some(ProviderPreset {
        default_base_url,
        extra_headers,
    })
}

/// Fill in `base_url` and preset headers the user left unset.
pub fn apply_preset_defaults(config: &mut ModelConfig) {
    let Some(preset) = get_preset(&config.provider) else {
        return;
    };
    if config.base_url.is_none() {
        config.base_url = Some(preset.default_base_url.to_string());
    }
    for (k, v) in preset.extra_headers {
        // User overrides take precedence
        config
            .extra_headers
            .entry(k.to_string())
            .or_insert_with(|| v.to_string());
    }
}
