//! 统一配置中心
//!
//! 加载顺序：内置默认值 → `APP_CONFIG_FILE` 指向的文件（toml/yaml/json）
//! → `APP_` 前缀的环境变量（以 `__` 分隔层级，例如 `APP_SERVER__PORT`）。

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const DEV_JWT_SECRET: &str = "dev-secret-key-not-for-production-use-minimum-32-chars";

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub auth: AuthConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// 允许携带凭证跨域访问的前端地址
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 数据库配置。未设置 `url` 时使用进程内存储。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    #[validate(length(min = 32, message = "JWT secret must be at least 32 characters long"))]
    pub secret: String,
    #[validate(range(min = 1))]
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    #[validate(length(min = 1))]
    pub cookie_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 4, max = 31))]
    pub bcrypt_cost: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 3001,
                cors_origins: vec!["http://localhost:5173".into()],
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: DEV_JWT_SECRET.into(),
                expiration_hours: 24 * 7,
            },
            auth: AuthConfig {
                cookie_name: "auth-token".into(),
                bcrypt_cost: None,
            },
        }
    }
}

impl AppConfig {
    /// 按默认值 → 配置文件 → 环境变量的优先级加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        Self::from_figment(fig.merge(Env::prefixed("APP_").split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt.secret == DEV_JWT_SECRET
    }

    /// 适合写入日志的配置描述，数据库口令与 JWT 密钥会被隐藏
    pub fn sanitize(&self) -> String {
        let database = match &self.database.url {
            Some(url) => redact_url(url),
            None => "in-memory".to_owned(),
        };
        format!(
            "server={} cors_origins={:?} database={} max_connections={} jwt_secret=[REDACTED] jwt_expiration_hours={} cookie={} bcrypt_cost={:?}",
            self.bind_addr(),
            self.server.cors_origins,
            database,
            self.database.max_connections,
            self.jwt.expiration_hours,
            self.auth.cookie_name,
            self.auth.bcrypt_cost,
        )
    }
}

fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://[REDACTED]{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_owned(),
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
