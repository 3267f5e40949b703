use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

/// Admin account seeded at startup when missing. Seeding is skipped when the
/// password is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            name: "Admin".to_string(),
            email: "admin@tombola.com".to_string(),
            password: String::new(),
        }
    }
}

/// HTTP mail API (Mailgun compatible). Mail is disabled when `api_key` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailConfig {
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from_address: String,
}

/// Unsigned Cloudinary uploads. Uploads are disabled when `cloud_name` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    #[serde(default)]
    pub cloud_name: String,
    #[serde(default)]
    pub upload_preset: String,
    #[serde(default = "default_cloudinary_base_url")]
    pub api_base_url: String,
}

fn default_cloudinary_base_url() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            upload_preset: String::new(),
            api_base_url: default_cloudinary_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL used in links sent by email
    pub public_url: String,
    /// Interval of the expired-draw sweep, seconds
    pub draw_sweep_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".to_string(),
            draw_sweep_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 配置文件不存在时完全依赖环境变量
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = env::var("DATABASE_URL")
                    .map_err(|_| "DATABASE_URL is not set and config.toml was not found")?;
                Self::with_defaults(database_url)
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(s).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    pub fn with_defaults(database_url: String) -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "change-me-in-production".to_string(),
                access_token_expires_in: 3600,
                refresh_token_expires_in: 604_800,
            },
            admin: AdminConfig::default(),
            mail: MailConfig::default(),
            cloudinary: CloudinaryConfig::default(),
            app: AppConfig::default(),
        }
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse::<T>().ok())
        }

        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = parsed("PORT").or_else(|| parsed("SERVER_PORT")) {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(mc) = parsed("DB_MAX_CONNECTIONS") {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(n) = parsed("JWT_ACCESS_EXPIRES_IN") {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(n) = parsed("JWT_REFRESH_EXPIRES_IN") {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("ADMIN_NAME") {
            self.admin.name = v;
        }
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            self.admin.email = v;
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD") {
            self.admin.password = v;
        }
        if let Ok(v) = env::var("MAIL_API_BASE_URL") {
            self.mail.api_base_url = v;
        }
        if let Ok(v) = env::var("MAIL_API_KEY") {
            self.mail.api_key = v;
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from_address = v;
        }
        if let Ok(v) = env::var("CLOUDINARY_CLOUD_NAME") {
            self.cloudinary.cloud_name = v;
        }
        if let Ok(v) = env::var("CLOUDINARY_UPLOAD_PRESET") {
            self.cloudinary.upload_preset = v;
        }
        if let Ok(v) = env::var("CLOUDINARY_API_BASE_URL") {
            self.cloudinary.api_base_url = v;
        }
        if let Ok(v) = env::var("PUBLIC_URL") {
            self.app.public_url = v;
        }
        if let Some(n) = parsed("DRAW_SWEEP_INTERVAL_SECS") {
            self.app.draw_sweep_interval_secs = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::from_toml_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            url = "postgres://localhost/tombola"
            max_connections = 5

            [jwt]
            secret = "secret"
            access_token_expires_in = 60
            refresh_token_expires_in = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.admin.email, "admin@tombola.com");
        assert!(config.admin.password.is_empty());
        assert!(config.mail.api_key.is_empty());
        assert_eq!(config.cloudinary.api_base_url, "https://api.cloudinary.com/v1_1");
        assert_eq!(config.app.draw_sweep_interval_secs, 60);
    }

    #[test]
    fn test_parse_full_sections() {
        let config = Config::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [database]
            url = "sqlite::memory:"
            max_connections = 1

            [jwt]
            secret = "secret"
            access_token_expires_in = 60
            refresh_token_expires_in = 120

            [admin]
            name = "Root"
            email = "root@example.com"
            password = "hunter22"

            [cloudinary]
            cloud_name = "demo"
            upload_preset = "unsigned"

            [app]
            public_url = "https://tombola.example.com"
            draw_sweep_interval_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.admin.name, "Root");
        assert_eq!(config.cloudinary.cloud_name, "demo");
        assert_eq!(config.app.public_url, "https://tombola.example.com");
        assert_eq!(config.app.draw_sweep_interval_secs, 30);
    }

    #[test]
    fn test_missing_required_section_fails() {
        assert!(Config::from_toml_str("[server]\nhost = \"x\"\nport = 1\n").is_err());
    }
}
