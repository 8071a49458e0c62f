use serde::{Deserialize, Serialize};

/// Declarative configuration owned by this service (`config.json`).
///
/// Field names stay camelCase on disk so existing config files keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_api_key: Option<String>,
    pub platforms: Vec<Platform>,
    pub custom_platforms: Vec<Platform>,
    pub hls: HlsSettings,
    pub auth: AuthSettings,
}

impl StreamConfig {
    /// Resolve the admin key: environment wins, then either config location.
    pub fn admin_key(&self) -> Option<String> {
        std::env::var("ADMIN_API_KEY")
            .ok()
            .or_else(|| self.admin_api_key.clone())
            .or_else(|| self.auth.admin_api_key.clone())
    }
}

/// A restreaming destination. Built-in and custom platforms share this shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Platform {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    pub key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsSettings {
    pub fragment_duration: u32,
    pub playlist_length: u32,
    pub cleanup: bool,
    pub profile: String,
}

impl Default for HlsSettings {
    fn default() -> Self {
        Self {
            fragment_duration: 2,
            playlist_length: 60,
            cleanup: true,
            profile: HlsProfile::Lowcpu.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    pub users: Vec<StreamUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_api_key: Option<String>,
}

/// A publisher allowed to push to the ingest, identified by username + stream key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUser {
    pub username: String,
    pub key: String,
}

/// Transcoding intensity for the HLS pipeline. Each profile maps to a fixed
/// script invoked by nginx-rtmp on publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsProfile {
    Lowcpu,
    High,
}

impl HlsProfile {
    /// Parse a user-supplied profile name. Accepts the `highcpu`/`full`
    /// aliases; returns `None` for anything unrecognized.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "lowcpu" => Some(HlsProfile::Lowcpu),
            "high" | "highcpu" | "full" => Some(HlsProfile::High),
            _ => None,
        }
    }

    /// Normalize an optional/unknown profile, falling back to `lowcpu`.
    pub fn normalize(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or(HlsProfile::Lowcpu)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HlsProfile::Lowcpu => "lowcpu",
            HlsProfile::High => "high",
        }
    }

    /// The transcoding script nginx-rtmp runs for this profile.
    pub fn script(&self) -> &'static str {
        match self {
            HlsProfile::Lowcpu => "ffmpeg-abr-lowcpu.sh",
            HlsProfile::High => "ffmpeg-abr.sh",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_aliases_normalize_to_high() {
        assert_eq!(HlsProfile::parse("highcpu"), Some(HlsProfile::High));
        assert_eq!(HlsProfile::parse("full"), Some(HlsProfile::High));
        assert_eq!(HlsProfile::parse("FULL"), Some(HlsProfile::High));
        assert_eq!(HlsProfile::parse("FULL").unwrap().script(), "ffmpeg-abr.sh");
    }

    #[test]
    fn test_unknown_profile_normalizes_to_lowcpu() {
        assert_eq!(HlsProfile::normalize(Some("turbo")), HlsProfile::Lowcpu);
        assert_eq!(HlsProfile::normalize(None), HlsProfile::Lowcpu);
        assert_eq!(HlsProfile::normalize(None).script(), "ffmpeg-abr-lowcpu.sh");
    }

    #[test]
    fn test_config_round_trips_camel_case() {
        let json = r#"{
            "platforms": [{"name": "YouTube", "url": "rtmp://a.rtmp.youtube.com/live2", "key": "abc", "enabled": true}],
            "customPlatforms": [],
            "hls": {"fragmentDuration": 4, "playlistLength": 30, "cleanup": false, "profile": "high"},
            "auth": {"users": [{"username": "alice", "key": "k1"}], "hlsSecret": "topsecret"}
        }"#;
        let config: StreamConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.platforms.len(), 1);
        assert_eq!(config.hls.fragment_duration, 4);
        assert_eq!(config.auth.hls_secret.as_deref(), Some("topsecret"));

        let out = serde_json::to_string(&config).unwrap();
        assert!(out.contains("customPlatforms"));
        assert!(out.contains("hlsSecret"));
    }
}
