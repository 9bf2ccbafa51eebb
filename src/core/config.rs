use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    // When set, requests are routed deployment-style
    // (/openai/deployments/<model>/... with an api-version query param)
    // instead of the direct /v1/chat/completions path.
    pub openai_api_version: Option<String>,
    pub gateway_api_hostname: Option<String>,
    pub google_api_hostname: String,
    pub google_access_token: String,
    pub google_project_id: String,
    pub google_location: String,
    pub fallback_model: String,
    pub default_system_prompt: String,
    pub default_temperature: f32,
    pub upstream_timeout_secs: u64,
    pub auth_disabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let openai_api_hostname = env::var("CROSSTALK_OPENAI_API_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let openai_api_version = env::var("CROSSTALK_OPENAI_API_VERSION").ok();
        let gateway_api_hostname = env::var("CROSSTALK_GATEWAY_API_HOST").ok();
        let google_api_hostname = env::var("CROSSTALK_GOOGLE_API_HOST")
            .unwrap_or_else(|_| "https://us-central1-aiplatform.googleapis.com".to_string());
        let google_access_token =
            env::var("CROSSTALK_GOOGLE_ACCESS_TOKEN").unwrap_or_else(|_| String::new());
        let google_project_id =
            env::var("CROSSTALK_GOOGLE_PROJECT_ID").unwrap_or_else(|_| String::new());
        let google_location =
            env::var("CROSSTALK_GOOGLE_LOCATION").unwrap_or_else(|_| "us-central1".to_string());
        let fallback_model =
            env::var("CROSSTALK_FALLBACK_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let default_system_prompt = env::var("CROSSTALK_SYSTEM_PROMPT")
            .unwrap_or_else(|_| "You are a helpful assistant.".to_string());
        let default_temperature = env::var("CROSSTALK_DEFAULT_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1.0);
        let upstream_timeout_secs = env::var("CROSSTALK_UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        let auth_disabled = env::var("CROSSTALK_AUTH_DISABLED").is_ok();

        Self {
            openai_api_hostname,
            openai_api_key,
            openai_api_version,
            gateway_api_hostname,
            google_api_hostname,
            google_access_token,
            google_project_id,
            google_location,
            fallback_model,
            default_system_prompt,
            default_temperature,
            upstream_timeout_secs,
            auth_disabled,
        }
    }
}
