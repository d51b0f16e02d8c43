//! Default HTTP implementation of the account client
//!
//! Talks to a JSON account service: `POST /v1/session` to log in,
//! `GET /v1/accounts/{handle}` to resolve a handle, and
//! `GET /v1/accounts/{id}/followers` / `.../following` for the relationship
//! listings. HTTP 429 responses surface as client errors whose description
//! carries a rate-limit signature, so the fetch engine's classifier fires.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::client::{AccountClient, AccountId, AccountRef, AccountSummary, ClientError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_code: Option<&'a str>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    challenge_required: bool,
}

#[derive(Deserialize)]
struct AccountResponse {
    id: String,
}

#[derive(Deserialize)]
struct RelatedAccount {
    id: String,
    display_name: Option<String>,
}

/// Account service client over HTTP. Holds the session token obtained by
/// `login`; one instance per run.
pub struct HttpAccountClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpAccountClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Client(err.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn bearer(&self) -> Result<String, ClientError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| ClientError::Authentication("not logged in".to_string()))
    }

    async fn get_authed(&self, url: &str) -> Result<reqwest::Response, ClientError> {
        let token = self.bearer().await?;
        self.http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ClientError::Client(err.to_string()))
    }

    async fn list_related(
        &self,
        account: &AccountRef,
        relation: &str,
    ) -> Result<Vec<AccountSummary>, ClientError> {
        let url = format!(
            "{}/v1/accounts/{}/{}",
            self.base_url,
            account.as_str(),
            relation
        );
        let response = self.get_authed(&url).await?;

        match response.status() {
            status if status.is_success() => {
                let related: Vec<RelatedAccount> = response
                    .json()
                    .await
                    .map_err(|err| ClientError::Client(err.to_string()))?;
                Ok(related
                    .into_iter()
                    .map(|account| AccountSummary {
                        id: AccountId::new(account.id),
                        display_name: account.display_name,
                    })
                    .collect())
            }
            StatusCode::TOO_MANY_REQUESTS => Err(rate_limited()),
            status => Err(ClientError::Client(format!(
                "HTTP {} listing {}",
                status, relation
            ))),
        }
    }
}

fn rate_limited() -> ClientError {
    ClientError::Client("rate limit exceeded (HTTP 429)".to_string())
}

#[async_trait]
impl AccountClient for HttpAccountClient {
    async fn login(
        &self,
        username: &str,
        password: &str,
        code: Option<&str>,
    ) -> Result<(), ClientError> {
        let url = format!("{}/v1/session", self.base_url);
        let request = LoginRequest {
            username,
            password,
            verification_code: code,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| ClientError::Client(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: LoginResponse = response
                .json()
                .await
                .map_err(|err| ClientError::Client(err.to_string()))?;
            *self.token.write().await = Some(body.token);
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited());
        }

        let body: ErrorResponse = response.json().await.unwrap_or(ErrorResponse {
            error: format!("HTTP {}", status),
            challenge_required: false,
        });

        if body.challenge_required {
            Err(ClientError::ChallengeRequired(body.error))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ClientError::Authentication(body.error))
        } else {
            Err(ClientError::Client(body.error))
        }
    }

    async fn resolve_handle(&self, handle: &str) -> Result<AccountRef, ClientError> {
        let url = format!("{}/v1/accounts/{}", self.base_url, handle);
        let response = self.get_authed(&url).await?;

        match response.status() {
            status if status.is_success() => {
                let body: AccountResponse = response
                    .json()
                    .await
                    .map_err(|err| ClientError::Client(err.to_string()))?;
                Ok(AccountRef::new(body.id))
            }
            StatusCode::NOT_FOUND => Err(ClientError::UnknownHandle(handle.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(rate_limited()),
            status => Err(ClientError::Client(format!(
                "HTTP {} resolving {}",
                status, handle
            ))),
        }
    }

    async fn list_followers(
        &self,
        account: &AccountRef,
    ) -> Result<Vec<AccountSummary>, ClientError> {
        self.list_related(account, "followers").await
    }

    async fn list_following(
        &self,
        account: &AccountRef,
    ) -> Result<Vec<AccountSummary>, ClientError> {
        self.list_related(account, "following").await
    }
}
