use crate::core::session::{DEFAULT_SESSION_TTL_MINUTES, MAX_SESSION_TTL_MINUTES};
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 匯入工具的 TOML 設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_minutes: u64,
}

impl ApiConfig {
    /// The token, unless it is still an unexpanded `${VAR}` placeholder.
    pub fn token(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .filter(|token| !token.is_empty() && !token.starts_with("${"))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: DEFAULT_SESSION_TTL_MINUTES as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "./output".to_string(),
        }
    }
}

impl ImportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_TOKEN})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImportError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }

    pub fn report_path(&self) -> &str {
        &self.output.report_path
    }

    pub fn session_ttl_minutes(&self) -> u64 {
        self.session.ttl_minutes
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.api.token()
    }
}

impl Validate for ImportConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api.base_url", &self.api.base_url)?;

        if let Some(timeout) = self.api.timeout_seconds {
            validate_positive_number("api.timeout_seconds", timeout, 1)?;
        }
        if let Some(token) = &self.api.auth_token {
            validate_non_empty_string("api.auth_token", token)?;
        }

        validate_positive_number("session.ttl_minutes", self.session.ttl_minutes, 1)?;
        if self.session.ttl_minutes > MAX_SESSION_TTL_MINUTES as u64 {
            return Err(ImportError::InvalidConfigValueError {
                field: "session.ttl_minutes".to_string(),
                value: self.session.ttl_minutes.to_string(),
                reason: format!("Value must be at most {}", MAX_SESSION_TTL_MINUTES),
            });
        }

        validate_path("output.report_path", &self.output.report_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let config = ImportConfig::from_toml_str(
            r#"
[api]
base_url = "https://schedule.example.org/api"
timeout_seconds = 15
auth_token = "abc123"

[session]
ttl_minutes = 45

[output]
report_path = "./reports"
"#,
        )
        .unwrap();

        assert_eq!(config.base_url(), "https://schedule.example.org/api");
        assert_eq!(config.api.timeout_seconds, Some(15));
        assert_eq!(config.auth_token(), Some("abc123"));
        assert_eq!(config.session_ttl_minutes(), 45);
        assert_eq!(config.report_path(), "./reports");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sections_default() {
        let config = ImportConfig::from_toml_str(
            r#"
[api]
base_url = "http://localhost:8080"
"#,
        )
        .unwrap();

        assert_eq!(config.session_ttl_minutes(), 30);
        assert_eq!(config.report_path(), "./output");
        assert_eq!(config.auth_token(), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ROSTER_IMPORT_TEST_TOKEN", "from-env");

        let config = ImportConfig::from_toml_str(
            r#"
[api]
base_url = "http://localhost:8080"
auth_token = "${ROSTER_IMPORT_TEST_TOKEN}"
"#,
        )
        .unwrap();
        assert_eq!(config.auth_token(), Some("from-env"));

        std::env::remove_var("ROSTER_IMPORT_TEST_TOKEN");
    }

    #[test]
    fn test_unset_env_var_is_not_a_token() {
        let config = ImportConfig::from_toml_str(
            r#"
[api]
base_url = "http://localhost:8080"
auth_token = "${ROSTER_IMPORT_SURELY_UNSET_VAR}"
"#,
        )
        .unwrap();
        assert_eq!(config.auth_token(), None);
    }

    #[test]
    fn test_config_validation() {
        let bad_url = ImportConfig::from_toml_str("[api]\nbase_url = \"not a url\"\n").unwrap();
        assert!(bad_url.validate().is_err());

        let zero_ttl = ImportConfig::from_toml_str(
            "[api]\nbase_url = \"http://localhost\"\n[session]\nttl_minutes = 0\n",
        )
        .unwrap();
        assert!(zero_ttl.validate().is_err());

        let huge_ttl = ImportConfig::from_toml_str(
            "[api]\nbase_url = \"http://localhost\"\n[session]\nttl_minutes = 99999999\n",
        )
        .unwrap();
        assert!(huge_ttl.validate().is_err());
    }

    #[test]
    fn test_missing_api_section_is_rejected() {
        assert!(ImportConfig::from_toml_str("[session]\nttl_minutes = 5\n").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[api]\nbase_url = \"https://api.example.com\"\n")
            .unwrap();

        let config = ImportConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.base_url(), "https://api.example.com");
    }
}
