//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL；未设置时使用内存存储
    pub url: Option<Secret<String>>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 签名密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 令牌有效期（秒）
    pub token_ttl_secs: u64,
    /// 时钟偏差容忍窗口（秒），仅作用于签发时间
    pub clock_skew_leeway_secs: u64,
    /// 密码最小长度
    pub password_min_length: usize,
    /// Argon2 内存开销（KiB）
    pub argon2_memory_kib: u32,
    /// Argon2 迭代次数
    pub argon2_iterations: u32,
    /// Argon2 并行度
    pub argon2_parallelism: u32,
    /// 登录失败时不区分"用户不存在"与"密码错误"
    pub uniform_login_failure: bool,
    /// 启动时写入内存存储的管理员账号（可选）
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_password: Option<Secret<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// 允许跨域访问的来源（精确匹配）
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置（签名密钥没有默认值，必须由部署方提供）
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.token_ttl_secs", 3600)?
            .set_default("security.clock_skew_leeway_secs", 30)?
            .set_default("security.password_min_length", 8)?
            .set_default("security.argon2_memory_kib", 65536)?
            .set_default("security.argon2_iterations", 3)?
            .set_default("security.argon2_parallelism", 4)?
            .set_default("security.uniform_login_failure", false)?
            .set_default(
                "cors.allowed_origins",
                vec!["http://localhost:4200".to_string(), "http://localhost:80".to_string()],
            )?;

        // 从环境变量加载配置（前缀为 CATALOG_）
        settings = settings.add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证 JWT 密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // 验证令牌有效期
        if self.security.token_ttl_secs < 60 || self.security.token_ttl_secs > 86400 {
            return Err(ConfigError::Message(
                "token_ttl_secs must be between 60 and 86400 (1 minute to 24 hours)".to_string(),
            ));
        }

        if self.security.clock_skew_leeway_secs > 300 {
            return Err(ConfigError::Message(
                "clock_skew_leeway_secs must be <= 300".to_string(),
            ));
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        // 引导管理员账号必须成对出现
        if self.security.bootstrap_admin_username.is_some()
            != self.security.bootstrap_admin_password.is_some()
        {
            return Err(ConfigError::Message(
                "bootstrap_admin_username and bootstrap_admin_password must be set together"
                    .to_string(),
            ));
        }

        if self.cors.allowed_origins.iter().any(|o| o.trim() == "*") {
            return Err(ConfigError::Message(
                "Wildcard origin cannot be combined with credentialed CORS".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "CATALOG_SERVER__ADDR",
            "CATALOG_LOGGING__LEVEL",
            "CATALOG_LOGGING__FORMAT",
            "CATALOG_SECURITY__JWT_SECRET",
            "CATALOG_SECURITY__TOKEN_TTL_SECS",
            "CATALOG_SECURITY__BOOTSTRAP_ADMIN_USERNAME",
            "CATALOG_CORS__ALLOWED_ORIGINS",
            "CATALOG_DATABASE__URL",
        ] {
            std::env::remove_var(key);
        }
    }

    fn set_secret() {
        std::env::set_var(
            "CATALOG_SECURITY__JWT_SECRET",
            "test-secret-key-for-testing-only-min-32-chars",
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        set_secret();

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:3000");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.security.token_ttl_secs, 3600);
        assert_eq!(config.security.clock_skew_leeway_secs, 30);
        assert!(!config.security.uniform_login_failure);
        assert!(config.database.url.is_none());
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://localhost:4200".to_string(), "http://localhost:80".to_string()]
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_requires_jwt_secret() {
        clear_env();

        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("jwt_secret"), "{}", err);
    }

    #[test]
    #[serial]
    fn test_config_cors_origins_from_env() {
        clear_env();
        set_secret();
        std::env::set_var(
            "CATALOG_CORS__ALLOWED_ORIGINS",
            "https://shop.example.com,https://admin.example.com",
        );

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert_eq!(config.cors.allowed_origins[1], "https://admin.example.com");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_invalid_port() {
        clear_env();
        set_secret();
        std::env::set_var("CATALOG_SERVER__ADDR", "0.0.0.0:80");

        let result = AppConfig::from_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_short_secret() {
        clear_env();
        std::env::set_var("CATALOG_SECURITY__JWT_SECRET", "too-short");

        let result = AppConfig::from_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_ttl_out_of_range() {
        clear_env();
        set_secret();
        std::env::set_var("CATALOG_SECURITY__TOKEN_TTL_SECS", "5");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_half_bootstrap_admin() {
        clear_env();
        set_secret();
        std::env::set_var("CATALOG_SECURITY__BOOTSTRAP_ADMIN_USERNAME", "root");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }
}
