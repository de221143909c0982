//! REST access to the notification backend

use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::record::NotificationRecord;
use crate::session::Session;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Backend operations the synchronizer depends on
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// `GET /notification`: the caller's notifications, newest first
    async fn fetch_all(&self, session: &Session) -> Result<Vec<NotificationRecord>>;

    /// `PATCH /notification/{id}/seen`: returns the updated record
    async fn mark_seen(&self, session: &Session, id: &str) -> Result<NotificationRecord>;

    /// `PATCH /notification/seen-all`
    async fn mark_all_seen(&self, session: &Session) -> Result<()>;
}

/// Every backend payload is wrapped as `{"data": ...}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// [`NotificationApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpNotificationApi {
    client: Client,
    base_url: Url,
}

impl HttpNotificationApi {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(NotifyError::config(format!(
                "API base URL cannot carry paths: {}",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str], session: &Session) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.endpoint(segments))
            .header(reqwest::header::ACCEPT, "application/json");
        match &session.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_raw(builder: RequestBuilder) -> Result<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(NotifyError::status(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let body = Self::send_raw(builder).await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_all(&self, session: &Session) -> Result<Vec<NotificationRecord>> {
        let records: Vec<NotificationRecord> =
            Self::send(self.request(Method::GET, &["notification"], session)).await?;
        tracing::debug!(
            user_id = %session.user_id,
            count = records.len(),
            "fetched notifications"
        );
        Ok(records)
    }

    async fn mark_seen(&self, session: &Session, id: &str) -> Result<NotificationRecord> {
        Self::send(self.request(Method::PATCH, &["notification", id, "seen"], session)).await
    }

    async fn mark_all_seen(&self, session: &Session) -> Result<()> {
        Self::send_raw(self.request(Method::PATCH, &["notification", "seen-all"], session))
            .await
            .map(|_| ())
    }
}
