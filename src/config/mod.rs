use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub paths: PathSettings,
    pub nginx: NginxSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Locations of the files this process owns exclusively.
#[derive(Debug, Clone, Deserialize)]
pub struct PathSettings {
    pub config: String,
    pub session: String,
    pub analytics: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NginxSettings {
    /// The live nginx.conf this service rewrites managed regions in.
    pub conf_path: String,
    /// The nginx binary used for `-s reload`.
    pub binary: String,
    /// The nginx-rtmp /stat endpoint polled for viewer counts.
    pub stat_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("paths.config", "data/config.json")?
            .set_default("paths.session", "data/session.json")?
            .set_default("paths.analytics", "data/analytics.json")?
            .set_default("nginx.conf_path", "/usr/local/nginx/conf/nginx.conf")?
            .set_default("nginx.binary", "/usr/local/nginx/sbin/nginx")?
            .set_default("nginx.stat_url", "http://127.0.0.1:8080/stat")?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
