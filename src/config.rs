use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub qr: QrConfig,
    #[serde(default)]
    pub loyalty: LoyaltyConfig,
    #[serde(default)]
    pub renewal: RenewalConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
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
    /// 单个原子单元（事务）的超时时间，超时返回 StorageUnavailable
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

/// 外部身份系统签发的访问令牌（员工 / 顾客 / 管理员）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    pub secret: String,
    #[serde(default = "default_pos_ttl")]
    pub pos_token_ttl_secs: i64,
    #[serde(default = "default_identity_ttl")]
    pub static_identity_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyConfig {
    pub currency_units_per_point: i64,
    pub voucher_validity_days: i64,
    pub streak_length_days: i32,
    pub streak_bonus_points: i64,
    pub birthday_bonus_points: i64,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            currency_units_per_point: 10,
            voucher_validity_days: 30,
            streak_length_days: 7,
            streak_bonus_points: 20,
            birthday_bonus_points: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalConfig {
    pub cycle_months: u32,
    pub check_interval_secs: u64,
    /// 整个类别事务的时限，独立于请求级的 statement_timeout_secs
    #[serde(default = "default_renewal_timeout")]
    pub timeout_secs: u64,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            cycle_months: 12,
            check_interval_secs: 6 * 3600,
            timeout_secs: default_renewal_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub push_webhook_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            push_webhook_url: None,
            api_key: None,
            timeout_secs: default_notification_timeout(),
        }
    }
}

fn default_statement_timeout() -> u64 {
    5
}

fn default_renewal_timeout() -> u64 {
    30 * 60
}

fn default_pos_ttl() -> i64 {
    90
}

fn default_identity_ttl() -> i64 {
    365 * 24 * 3600
}

fn default_notification_timeout() -> u64 {
    5
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn override_parse<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(v) = env::var(name)
        && let Ok(parsed) = v.parse()
    {
        *target = parsed;
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;
                let qr_secret =
                    get_env("QR_SECRET").ok_or("缺少 QR_SECRET 环境变量，且未找到配置文件")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                        statement_timeout_secs: get_env_parse(
                            "DB_STATEMENT_TIMEOUT_SECS",
                            default_statement_timeout(),
                        ),
                    },
                    auth: AuthConfig {
                        secret: get_env("AUTH_JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                    },
                    qr: QrConfig {
                        secret: qr_secret,
                        pos_token_ttl_secs: get_env_parse("QR_POS_TTL_SECS", default_pos_ttl()),
                        static_identity_ttl_secs: get_env_parse(
                            "QR_STATIC_IDENTITY_TTL_SECS",
                            default_identity_ttl(),
                        ),
                    },
                    loyalty: LoyaltyConfig::default(),
                    renewal: RenewalConfig::default(),
                    notification: NotificationConfig {
                        push_webhook_url: get_env("PUSH_WEBHOOK_URL"),
                        api_key: get_env("PUSH_API_KEY"),
                        timeout_secs: default_notification_timeout(),
                    },
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        override_parse("SERVER_PORT", &mut config.server.port);
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        override_parse("DB_MAX_CONNECTIONS", &mut config.database.max_connections);
        override_parse(
            "DB_STATEMENT_TIMEOUT_SECS",
            &mut config.database.statement_timeout_secs,
        );
        if let Ok(v) = env::var("AUTH_JWT_SECRET") {
            config.auth.secret = v;
        }
        if let Ok(v) = env::var("QR_SECRET") {
            config.qr.secret = v;
        }
        override_parse("QR_POS_TTL_SECS", &mut config.qr.pos_token_ttl_secs);
        override_parse(
            "QR_STATIC_IDENTITY_TTL_SECS",
            &mut config.qr.static_identity_ttl_secs,
        );
        override_parse(
            "LOYALTY_CURRENCY_UNITS_PER_POINT",
            &mut config.loyalty.currency_units_per_point,
        );
        override_parse(
            "LOYALTY_VOUCHER_VALIDITY_DAYS",
            &mut config.loyalty.voucher_validity_days,
        );
        override_parse("RENEWAL_CYCLE_MONTHS", &mut config.renewal.cycle_months);
        override_parse(
            "RENEWAL_CHECK_INTERVAL_SECS",
            &mut config.renewal.check_interval_secs,
        );
        override_parse("RENEWAL_TIMEOUT_SECS", &mut config.renewal.timeout_secs);
        if let Ok(v) = env::var("PUSH_WEBHOOK_URL") {
            config.notification.push_webhook_url = Some(v);
        }
        if let Ok(v) = env::var("PUSH_API_KEY") {
            config.notification.api_key = Some(v);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.qr.secret.len() < 32 {
            return Err("qr.secret 至少需要 32 个字符".to_string());
        }
        if self.loyalty.currency_units_per_point <= 0 {
            return Err("loyalty.currency_units_per_point 必须为正数".to_string());
        }
        if self.renewal.cycle_months == 0 {
            return Err("renewal.cycle_months 必须为正数".to_string());
        }
        if self.renewal.timeout_secs == 0 {
            return Err("renewal.timeout_secs 必须为正数".to_string());
        }
        Ok(())
    }
}
