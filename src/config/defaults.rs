//! Default values for configuration

/// Default remote content service root
pub fn default_base_url() -> String {
    std::env::var("FULLLINES_BASE_URL").unwrap_or_else(|_| "https://ff15.aikotoba.jp".to_string())
}

/// Default section catalog file (relative to the base directory)
pub fn default_sections_file() -> String {
    "sections.json".to_string()
}

/// Default speaker catalog file (relative to the base directory)
pub fn default_characters_file() -> String {
    "characters.json".to_string()
}

/// Default request timeout in seconds
pub fn default_fetch_timeout() -> u64 {
    15
}

/// Default delay between file fetches (2 seconds)
pub fn default_request_delay_ms() -> u64 {
    2000
}

/// Default consecutive failures before a run is aborted
pub fn default_max_consecutive_failures() -> u32 {
    3
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("fulllines/{} (Dialogue Extractor)", env!("CARGO_PKG_VERSION"))
}

/// Default hard cap on search results
pub fn default_search_max_results() -> usize {
    1000
}
