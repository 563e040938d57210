//! Engine configuration.
//!
//! All values have defaults matching the conventional `/api/v1/` REST
//! layout; deployments override them through any serde source (TOML is
//! provided as a convenience).

use serde::Deserialize;

use crate::paginate::PageStyle;

/// Top-level engine configuration, immutable after startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URI prefix stripped before route classification.
    pub base_uri: String,

    /// Page size used when the request does not carry a limit.
    pub default_limit: u64,

    /// Pagination strategy and parameter names.
    pub pagination: PaginationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            default_limit: default_limit(),
            pagination: PaginationConfig::default(),
        }
    }
}

fn default_base_uri() -> String {
    "/api/v1/".to_string()
}

fn default_limit() -> u64 {
    10
}

impl EngineConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// Pagination strategy selection and the parameter names it reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub style: PageStyle,
    pub limit_param: String,
    pub offset_param: String,
    pub page_param: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            style: PageStyle::default(),
            limit_param: "limit".to_string(),
            offset_param: "offset".to_string(),
            page_param: "page".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_conventional_layout() {
        let config = EngineConfig::default();
        assert_eq!(config.base_uri, "/api/v1/");
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.pagination.style, PageStyle::Offset);
        assert_eq!(config.pagination.limit_param, "limit");
        assert_eq!(config.pagination.offset_param, "offset");
        assert_eq!(config.pagination.page_param, "page");
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            base_uri = "/rest/v2/"
            default_limit = 25

            [pagination]
            style = "page"
            page_param = "p"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.base_uri, "/rest/v2/");
        assert_eq!(config.default_limit, 25);
        assert_eq!(config.pagination.style, PageStyle::Page);
        assert_eq!(config.pagination.page_param, "p");
        assert_eq!(config.pagination.limit_param, "limit");
    }
}
