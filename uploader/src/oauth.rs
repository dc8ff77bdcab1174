//! OAuth 2.0 management for YouTube API authentication.
//!
//! This module encapsulates the OAuth operations this crate needs: building the consent URL,
//! exchanging an authorization code, refreshing an expired access token, and (for the CLI)
//! running a one-shot redirect listener to complete the flow locally.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::token::AccessTokenBundle;
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body};
use jiff::Timestamp;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenUrl, reqwest,
};
use oauth2::url::Url;
use std::future::Future;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint URL used for both code exchange and token refresh
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const OAUTH_DONE: &str = "YouTube access granted. You can close this window.";

/// Exchanges a refresh token for a new access token.
///
/// This is the only capability the credential store needs from the OAuth client, so it is the
/// only one it sees.
pub trait TokenRefresher {
    /// Returns the refreshed bundle. The caller is responsible for persisting it.
    fn refresh(
        &self,
        bundle: &AccessTokenBundle,
    ) -> impl Future<Output = Result<AccessTokenBundle>> + Send;
}

/// Manages OAuth 2.0 authentication flows for YouTube API access.
///
/// Holds the client registration (id, secret, scopes, redirect URL) loaded from [`Config`].
/// The underlying [`BasicClient`] is rebuilt per request since its endpoints are encoded in
/// its type.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: ClientId,
    client_secret: ClientSecret,
    scopes: Vec<Scope>,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
}

impl OAuthManager {
    /// Creates a new OAuth manager from configuration.
    ///
    /// Fails with [`Error::Configuration`] if the client id or secret is missing, or if the
    /// redirect URL cannot be formed.
    pub fn new(config: &Config) -> Result<Self> {
        let (client_id, client_secret) = config.credentials()?;
        let redirect_url = RedirectUrl::new(config.redirect_url())
            .map_err(|e| Error::Configuration(format!("invalid redirect URL: {e}")))?;
        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Configuration(format!("build OAuth HTTP client: {e}")))?;

        Ok(Self {
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            scopes: config.scopes.iter().cloned().map(Scope::new).collect(),
            redirect_url,
            http_client,
        })
    }

    pub fn redirect_url(&self) -> &RedirectUrl {
        &self.redirect_url
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Builds the Google consent URL the user must visit.
    ///
    /// Offline access is requested with a forced consent prompt so Google issues a refresh
    /// token every time. The returned [`CsrfToken`] must match the `state` the user comes
    /// back with.
    pub fn authorization_url(&self) -> (Url, CsrfToken) {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(
                AuthUrl::new(AUTH_URL.to_string()).expect("Invalid authorization endpoint URL"),
            )
            .set_redirect_uri(self.redirect_url.clone());

        client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned())
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url()
    }

    /// Exchanges an authorization code from the redirect for a token bundle.
    pub async fn exchange_code(&self, code: AuthorizationCode) -> Result<AccessTokenBundle> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(
                TokenUrl::new(TOKEN_URL.to_string()).expect("Invalid token endpoint URL"),
            )
            .set_redirect_uri(self.redirect_url.clone());

        let token: BasicTokenResponse = client
            .exchange_code(code)
            .request_async(&self.http_client)
            .await
            .map_err(|e| Error::RefreshExchange(format!("exchange authorization code: {e}")))?;

        tracing::debug!("exchanged authorization code for access token");
        Ok(AccessTokenBundle::from_response(&token, Timestamp::now()))
    }

    /// Performs a complete OAuth 2.0 authorization flow to obtain a new token bundle.
    ///
    /// This method:
    /// 1. Starts listening on the configured redirect address
    /// 2. Opens the user's browser at the consent URL
    /// 3. Waits for the redirect and exchanges the authorization code
    pub async fn authenticate(&self) -> eyre::Result<AccessTokenBundle> {
        let (auth_url, csrf) = self.authorization_url();
        let eventually_authorization_code = self
            .setup_redirect(csrf)
            .await
            .context("set up redirect endpoint")?;

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            tracing::warn!(%e, "could not open browser, visit the URL manually");
            eprintln!("Open this URL to authorize access:\n{auth_url}");
        }

        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        self.exchange_code(authorization_code)
            .await
            .context("exchange authorization code with access token")
    }

    /// Sets up a local HTTP server to receive the OAuth authorization callback.
    ///
    /// Binds the host and port of the configured redirect URL, serves the redirect path, and
    /// validates the CSRF token before handing back the authorization code.
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<impl Future<Output = eyre::Result<AuthorizationCode>>> {
        let redirect = self.redirect_url.url();
        let host = redirect
            .host_str()
            .ok_or_else(|| eyre::eyre!("redirect URL has no host"))?
            .to_string();
        let port = redirect
            .port_or_known_default()
            .ok_or_else(|| eyre::eyre!("redirect URL has no port"))?;
        let path = redirect.path().to_string();

        let socket = tokio::net::TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("bind to {host}:{port}"))?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let r = async move {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let (got, mut gotten) = tokio::sync::mpsc::channel(1);
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    let path = path.clone();
                    async move {
                        if req.uri().path() != path {
                            let mut not_found = Response::new(Full::<Bytes>::from("not found"));
                            *not_found.status_mut() = StatusCode::NOT_FOUND;
                            return Ok::<_, std::convert::Infallible>(not_found);
                        }
                        let (state, code) = parse_redirect_query(req.uri().query().unwrap_or(""));
                        if state.as_deref() != Some(csrf.secret().as_str()) {
                            let mut bad = Response::new(Full::<Bytes>::from("invalid csrf token"));
                            *bad.status_mut() = StatusCode::BAD_REQUEST;
                            return Ok(bad);
                        }
                        let Some(code) = code else {
                            let mut bad =
                                Response::new(Full::<Bytes>::from("no authorization code found"));
                            *bad.status_mut() = StatusCode::BAD_REQUEST;
                            return Ok(bad);
                        };
                        // receiver lives until the server below exits
                        let _ = got.send(AuthorizationCode::new(code)).await;
                        Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE)))
                    }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        if let Err(e) = exit {
                            Err(e).context("redirect server got bad request")
                        } else {
                            eyre::bail!("redirect server exit prematurely");
                        }
                    }
                    code = gotten.recv() => {
                        serve.as_mut().graceful_shutdown();
                        // let the success page reach the browser
                        let _ = serve.as_mut().await;
                        code.ok_or_else(|| eyre::eyre!("redirect handler dropped"))
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok(async move { rx.await.context("redirect future dropped prematurely")? })
    }
}

/// Pulls `state` and `code` out of the redirect's query string.
fn parse_redirect_query(query: &str) -> (Option<String>, Option<String>) {
    let mut state = None;
    let mut code = None;
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        match &*k {
            "state" => state = Some(v.into_owned()),
            "code" => code = Some(v.into_owned()),
            _ => {}
        }
    }
    (state, code)
}

impl TokenRefresher for OAuthManager {
    async fn refresh(&self, bundle: &AccessTokenBundle) -> Result<AccessTokenBundle> {
        let Some(refresh_token) = bundle.refresh_token.clone() else {
            return Err(Error::RefreshExchange(
                "no refresh token available".to_string(),
            ));
        };

        tracing::debug!("attempting to refresh OAuth token");

        // Create a minimal OAuth client for token refresh (no redirect URL needed)
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(
                TokenUrl::new(TOKEN_URL.to_string()).expect("Invalid token endpoint URL"),
            );

        let refresh_token = RefreshToken::new(refresh_token);
        let token = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http_client)
            .await
            .map_err(|e| Error::RefreshExchange(e.to_string()))?;

        tracing::debug!("successfully refreshed OAuth token");
        Ok(bundle.refreshed(AccessTokenBundle::from_response(&token, Timestamp::now())))
    }
}
