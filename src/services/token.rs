use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

/// Default token lifetime: 7 days.
pub const DEFAULT_TOKEN_VALIDITY_SECS: i64 = 604_800;

/// A time-limited access token for an HLS resource, matching the nginx
/// secure_link_md5 verification formula.
#[derive(Debug, Clone, Serialize)]
pub struct HlsToken {
    pub md5: String,
    pub expires: i64,
}

/// Generate a token for `uri` expiring `validity_seconds` from now.
pub fn generate_hls_token(uri: &str, secret: &str, validity_seconds: i64) -> HlsToken {
    let expires = chrono::Utc::now().timestamp() + validity_seconds;
    HlsToken {
        md5: sign(uri, secret, expires),
        expires,
    }
}

/// The signature nginx expects: md5 over `{expires}{uri} {secret}` encoded
/// as URL-safe base64 without padding. The concatenation order, the single
/// space, and the encoding must all match the verifier exactly; any drift
/// silently produces tokens the server rejects.
fn sign(uri: &str, secret: &str, expires: i64) -> String {
    let digest = md5::compute(format!("{expires}{uri} {secret}"));
    URL_SAFE_NO_PAD.encode(digest.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "/hls/master.m3u8";
    const SECRET: &str = "topsecret";
    const EXPIRES: i64 = 1_700_000_000;

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign(URI, SECRET, EXPIRES);
        let b = sign(URI, SECRET, EXPIRES);
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_changes_with_any_input() {
        let base = sign(URI, SECRET, EXPIRES);
        assert_ne!(base, sign("/hls/master.m3u9", SECRET, EXPIRES));
        assert_ne!(base, sign(URI, "topsecreT", EXPIRES));
        assert_ne!(base, sign(URI, SECRET, EXPIRES + 1));
    }

    #[test]
    fn test_signature_is_url_safe() {
        // 16-byte digest -> 22 base64 chars, no padding, no '+' or '/'.
        let sig = sign(URI, SECRET, EXPIRES);
        assert_eq!(sig.len(), 22);
        assert!(!sig.contains('+'));
        assert!(!sig.contains('/'));
        assert!(!sig.contains('='));
    }

    #[test]
    fn test_generate_sets_future_expiry() {
        let token = generate_hls_token(URI, SECRET, DEFAULT_TOKEN_VALIDITY_SECS);
        let now = chrono::Utc::now().timestamp();
        assert!(token.expires > now);
        assert!(token.expires <= now + DEFAULT_TOKEN_VALIDITY_SECS);
    }
}
