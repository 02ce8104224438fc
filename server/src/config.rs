//! Server configuration.

/// Operator account configuration.
#[derive(Clone)]
pub struct AdminConfig {
    /// Admin login name. Reserved: ordinary users cannot register it.
    pub username: String,
    /// Admin password (plaintext; hashed once at startup).
    pub password: String,
    /// Email stored on the admin row.
    pub email: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: String::new(),
            email: "admin@cashdesk.local".to_string(),
        }
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Database URL. The in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Connection pool size.
    pub max_connections: u32,
    /// Admin account.
    pub admin: AdminConfig,
    /// Log level.
    pub log_level: String,
    /// Emit JSON log lines.
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 2022,
            database_url: None,
            max_connections: 10,
            admin: AdminConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CASHDESK_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        let port = std::env::var("CASHDESK_LISTEN_PORT").or_else(|_| std::env::var("SERVER_PORT"));
        if let Ok(port) = port {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }

        if let Ok(max) = std::env::var("CASHDESK_DB_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.max_connections = max;
            }
        }

        if let Ok(username) = std::env::var("CASHDESK_ADMIN_USERNAME") {
            config.admin.username = username;
        }

        if let Ok(password) = std::env::var("CASHDESK_ADMIN_PASSWORD") {
            config.admin.password = password;
        }

        if let Ok(email) = std::env::var("CASHDESK_ADMIN_EMAIL") {
            config.admin.email = email;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(json) = std::env::var("CASHDESK_LOG_JSON") {
            config.log_json = matches!(json.as_str(), "1" | "true" | "TRUE" | "yes");
        }

        config
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if let Some(url) = &self.database_url {
            if url.is_empty() {
                return Err("Database URL cannot be empty".to_string());
            }
        }

        if self.max_connections == 0 {
            return Err("Max connections must be at least 1".to_string());
        }

        if self.admin.username.trim().is_empty() {
            return Err("Admin username cannot be empty".to_string());
        }

        if self.admin.password.chars().count() < 6 {
            return Err("Admin password must be at least 6 characters".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ServerConfig {
        ServerConfig {
            admin: AdminConfig {
                password: "s3cret!".to_string(),
                ..AdminConfig::default()
            },
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_default_config_needs_admin_password() {
        assert!(ServerConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = valid();
        config.listen_port = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.database_url = Some(String::new());
        assert!(config.validate().is_err());

        let mut config = valid();
        config.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.admin.username = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admin_password_redacted() {
        let debug = format!("{:?}", valid());
        assert!(!debug.contains("s3cret!"));
        assert!(debug.contains("<redacted>"));
    }
}
