//! Google ClientLogin authentication
//!
//! ClientLogin answers a form-encoded POST with a line-oriented body such as
//!
//! ```text
//! SID=...
//! LSID=...
//! Auth=...
//! ```
//!
//! The `Auth` value is the token used by [`crate::PredictionClient`]. When
//! Google wants interactive verification the body carries `Error=`,
//! `CaptchaToken=` and `CaptchaUrl=` lines instead; pass the solved
//! challenge back through [`ClientLogin::param`] (`logintoken`,
//! `logincaptcha`).

use crate::config::ClientConfig;
use crate::error::{PredictionError, Result};
use crate::models::AuthToken;
use crate::observability::{operations, Outcome, RequestLogger};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Length of the `Auth=` prefix stripped from the token line
const AUTH_PREFIX_LEN: usize = 5;

/// Builder and executor for a ClientLogin request
#[derive(Clone)]
pub struct ClientLogin {
    http: Client,
    url: String,
    source: String,
    extra_params: BTreeMap<String, String>,
    timeout: Duration,
    logger: RequestLogger,
}

impl Default for ClientLogin {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientLogin {
    /// ClientLogin against the default Google endpoint
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            http: Client::new(),
            url: config.login_url.clone(),
            source: config.source.clone(),
            extra_params: BTreeMap::new(),
            timeout: config.request_timeout(),
            logger: RequestLogger::default(),
        }
    }

    /// Override the login endpoint
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Add a form field; replaces a default field with the same name
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.extra_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a preconfigured HTTP client (proxies, custom TLS, ...)
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Form fields sent for the given credentials, extra params applied last
    pub fn form_fields(&self, email: &str, password: &str) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("accountType".to_string(), "HOSTED_OR_GOOGLE".to_string());
        fields.insert("Email".to_string(), email.to_string());
        fields.insert("Passwd".to_string(), escape_password(password));
        fields.insert("source".to_string(), self.source.clone());
        fields.insert("service".to_string(), "xapi".to_string());

        for (key, value) in &self.extra_params {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }

    /// Exchange email and password for an auth token
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthToken> {
        let started = Instant::now();
        debug!(url = %self.url, "Requesting ClientLogin token");

        let result = self.send(email, password).await;
        let elapsed = started.elapsed().as_secs_f64();

        let (status, body) = match result {
            Ok(response) => response,
            Err(e) => {
                self.logger
                    .log_completed(operations::CLIENT_LOGIN, None, None, elapsed, Outcome::Failure);
                return Err(e);
            }
        };

        match extract_auth_token(&body) {
            Ok(token) => {
                self.logger.log_completed(
                    operations::CLIENT_LOGIN,
                    None,
                    Some(status),
                    elapsed,
                    Outcome::Success,
                );
                Ok(token)
            }
            Err(e) => {
                self.logger.log_completed(
                    operations::CLIENT_LOGIN,
                    None,
                    Some(status),
                    elapsed,
                    Outcome::RemoteError,
                );
                if let PredictionError::AuthTokenNotFound { error, .. } = &e {
                    self.logger
                        .log_login_rejected(error.as_deref(), e.is_captcha_challenge());
                }
                Err(e)
            }
        }
    }

    async fn send(&self, email: &str, password: &str) -> Result<(u16, String)> {
        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .form(&self.form_fields(email, password))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Pull the token out of a ClientLogin response body
pub fn extract_auth_token(body: &str) -> Result<AuthToken> {
    body.lines()
        .find(|line| line.starts_with("Auth"))
        .and_then(|line| line.get(AUTH_PREFIX_LEN..))
        .map(AuthToken::from)
        .ok_or_else(|| PredictionError::AuthTokenNotFound {
            error: line_value(body, "Error"),
            captcha_url: line_value(body, "CaptchaUrl"),
            captcha_token: line_value(body, "CaptchaToken"),
        })
}

/// Percent-escape the password the way libcurl's `escape` does
///
/// The form encoder escapes the result again when the request is sent.
fn escape_password(password: &str) -> String {
    url::form_urlencoded::byte_serialize(password.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

fn line_value(body: &str, key: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix(key))
        .find_map(|rest| rest.strip_prefix('='))
        .map(str::to_string)
}

/// Obtain a token from the default ClientLogin endpoint
///
/// Use [`obtain_auth_token_with`] or the [`ClientLogin`] builder to change the
/// login URL or send extra form fields.
pub async fn obtain_auth_token(email: &str, password: &str) -> Result<AuthToken> {
    ClientLogin::new().authenticate(email, password).await
}

/// Obtain a token from `login_url`, merging `extra_params` over the default fields
pub async fn obtain_auth_token_with<I, K, V>(
    email: &str,
    password: &str,
    login_url: &str,
    extra_params: I,
) -> Result<AuthToken>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    ClientLogin::new()
        .url(login_url)
        .params(extra_params)
        .authenticate(email, password)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_auth_token() {
        let token = extract_auth_token("SID=x\nLSID=y\nAuth=abc123\n").unwrap();
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn test_extract_auth_token_handles_crlf() {
        let token = extract_auth_token("SID=x\r\nAuth=abc123\r\n").unwrap();
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn test_bare_auth_line_is_not_a_token() {
        let err = extract_auth_token("SID=x\nAuth\n").unwrap_err();
        assert!(matches!(err, PredictionError::AuthTokenNotFound { .. }));
    }

    #[test]
    fn test_empty_auth_value_is_passed_through() {
        let token = extract_auth_token("SID=x\nAuth=\n").unwrap();
        assert_eq!(token.expose(), "");
    }

    #[test]
    fn test_missing_auth_line() {
        let err = extract_auth_token("SID=x\nLSID=y\n").unwrap_err();
        match err {
            PredictionError::AuthTokenNotFound {
                error,
                captcha_url,
                captcha_token,
            } => {
                assert!(error.is_none());
                assert!(captcha_url.is_none());
                assert!(captcha_token.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_captcha_challenge_is_reported() {
        let body = "Url=https://www.google.com/login/captcha\nError=CaptchaRequired\nCaptchaToken=tok\nCaptchaUrl=Captcha?ctoken=tok\n";
        let err = extract_auth_token(body).unwrap_err();

        assert!(err.is_captcha_challenge());
        match err {
            PredictionError::AuthTokenNotFound {
                error,
                captcha_url,
                captcha_token,
            } => {
                assert_eq!(error.as_deref(), Some("CaptchaRequired"));
                assert_eq!(captcha_url.as_deref(), Some("Captcha?ctoken=tok"));
                assert_eq!(captcha_token.as_deref(), Some("tok"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_default_form_fields() {
        let fields = ClientLogin::new().form_fields("foo@gmail.com", "p@ss word");

        assert_eq!(fields["accountType"], "HOSTED_OR_GOOGLE");
        assert_eq!(fields["Email"], "foo@gmail.com");
        assert_eq!(fields["Passwd"], "p%40ss%20word");
        assert_eq!(fields["source"], "companyName-applicationName-versionID");
        assert_eq!(fields["service"], "xapi");
    }

    #[test]
    fn test_password_escaping_matches_curl() {
        assert_eq!(escape_password("a+b*c~d"), "a%2Bb%2Ac~d");
        assert_eq!(escape_password("plain-pass_1.0"), "plain-pass_1.0");
        assert_eq!(escape_password("ünï"), "%C3%BCn%C3%AF");
    }

    #[test]
    fn test_extra_params_override_defaults() {
        let fields = ClientLogin::new()
            .param("service", "other")
            .params([("logintoken", "tok"), ("logincaptcha", "answer")])
            .form_fields("foo@gmail.com", "secret");

        assert_eq!(fields["service"], "other");
        assert_eq!(fields["logintoken"], "tok");
        assert_eq!(fields["logincaptcha"], "answer");
        assert_eq!(fields.len(), 7);
    }
}
