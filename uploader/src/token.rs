//! The persisted OAuth2 credential payload.

use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before Google would reject them.
const EXPIRY_LEEWAY: SignedDuration = SignedDuration::from_secs(30);

/// An OAuth2 access-token bundle as stored in `youtube_access_tokens.access_token`.
///
/// The JSON shape matches Google's token endpoint response with an added `created` field
/// (unix seconds), which is what expiry is measured from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenBundle {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of `access_token` in seconds, counted from `created`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Space-separated list of granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(with = "jiff::fmt::serde::timestamp::second::required")]
    pub created: Timestamp,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AccessTokenBundle {
    /// Captures a token endpoint response, stamping it as created at `created`.
    ///
    /// `created` is truncated to whole seconds, the precision it is persisted with.
    pub fn from_response(token: &BasicTokenResponse, created: Timestamp) -> Self {
        let created = Timestamp::from_second(created.as_second()).unwrap_or(created);
        Self {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            token_type: default_token_type(),
            expires_in: token
                .expires_in()
                .and_then(|d| i64::try_from(d.as_secs()).ok()),
            scope: token.scopes().map(|scopes| {
                scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            created,
        }
    }

    /// When this token should stop being used, if it carries a lifetime at all.
    pub fn expires_at(&self) -> Option<Timestamp> {
        let expires_in = SignedDuration::from_secs(self.expires_in?);
        self.created
            .checked_add(expires_in)
            .ok()?
            .checked_sub(EXPIRY_LEEWAY)
            .ok()
    }

    /// A token without a known lifetime is always considered expired.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.expires_at() {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Folds a refreshed token over this one.
    ///
    /// Google usually omits the refresh token from refresh responses; the original one stays
    /// valid and must not be lost.
    pub fn refreshed(&self, mut new: AccessTokenBundle) -> AccessTokenBundle {
        if new.refresh_token.is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            new.refresh_token = self.refresh_token.clone();
        }
        if new.scope.is_none() {
            new.scope = self.scope.clone();
        }
        new
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or("").split_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bundle(created: i64, expires_in: Option<i64>) -> AccessTokenBundle {
        AccessTokenBundle {
            access_token: "ya29.access".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: None,
            created: Timestamp::from_second(created).unwrap(),
        }
    }

    #[test]
    fn parses_stored_google_bundle() {
        let stored = serde_json::json!({
            "access_token": "ya29.a0Af",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "1//0g",
            "scope": "https://www.googleapis.com/auth/youtube https://www.googleapis.com/auth/youtube.upload",
            "created": 1_700_000_000
        });
        let bundle: AccessTokenBundle = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(bundle.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(bundle.created.as_second(), 1_700_000_000);
        assert_eq!(
            bundle.scopes().collect::<Vec<_>>(),
            vec![
                "https://www.googleapis.com/auth/youtube",
                "https://www.googleapis.com/auth/youtube.upload"
            ]
        );
        assert_eq!(serde_json::to_value(&bundle).unwrap(), stored);
    }

    #[test]
    fn token_type_defaults_to_bearer() {
        let bundle: AccessTokenBundle = serde_json::from_value(serde_json::json!({
            "access_token": "ya29",
            "created": 10
        }))
        .unwrap();
        assert_eq!(bundle.token_type, "Bearer");
        assert!(!bundle.has_refresh_token());
    }

    #[test]
    fn expiry_includes_leeway() {
        let token = bundle(1_000, Some(3600));
        let at = |s| Timestamp::from_second(s).unwrap();
        assert!(!token.is_expired_at(at(1_000)));
        assert!(!token.is_expired_at(at(1_000 + 3600 - 31)));
        assert!(token.is_expired_at(at(1_000 + 3600 - 30)));
        assert!(token.is_expired_at(at(1_000 + 3600)));
    }

    #[test]
    fn token_without_lifetime_is_expired() {
        assert!(bundle(1_000, None).is_expired_at(Timestamp::from_second(1_000).unwrap()));
    }

    #[test]
    fn refresh_preserves_refresh_token() {
        let mut old = bundle(1_000, Some(3600));
        old.refresh_token = Some("1//keep".to_string());
        old.scope = Some("https://www.googleapis.com/auth/youtube".to_string());

        let new = old.refreshed(bundle(5_000, Some(3600)));
        assert_eq!(new.refresh_token.as_deref(), Some("1//keep"));
        assert_eq!(new.scope, old.scope);
        assert_eq!(new.created.as_second(), 5_000);

        let mut rotated = bundle(6_000, Some(3600));
        rotated.refresh_token = Some("1//new".to_string());
        assert_eq!(
            old.refreshed(rotated).refresh_token.as_deref(),
            Some("1//new")
        );
    }
}
