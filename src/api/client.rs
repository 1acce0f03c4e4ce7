use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::api::events::IncomingEvent;
use crate::api::models::NewMessage;
use crate::api::stream::{MessageStream, SnapshotSender, Subscription};
use crate::error::StreamError;

#[derive(Debug, Deserialize)]
struct AppendResponse {
    id: String,
}

/// Talks to the document store: HTTP for appends, a WebSocket for the
/// ordered listen feed of one collection.
pub struct RemoteStreamClient {
    http: HttpClient,
    base_url: Url,
    collection: String,
    token: Option<String>,
}

impl RemoteStreamClient {
    pub fn new(base_url: &str, collection: impl Into<String>) -> Result<Self, StreamError> {
        let normalized = crate::utils::normalize_url(base_url);
        let base_url = Url::parse(&normalized)
            .map_err(|e| StreamError::Protocol(format!("invalid server url {normalized}: {e}")))?;
        Ok(Self {
            http: HttpClient::new(),
            base_url,
            collection: collection.into(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn base_api(&self) -> String {
        let trimmed = self.base_url.as_str().trim_end_matches('/');
        if trimmed.ends_with("/api") {
            trimmed.to_string()
        } else {
            format!("{trimmed}/api")
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.header("Authorization", format!("Bearer {t}")),
            None => req,
        }
    }

    pub fn documents_url(&self) -> String {
        format!("{}/v1/collections/{}/documents", self.base_api(), self.collection)
    }

    /// The listen endpoint, on the WebSocket scheme matching the server's.
    pub fn listen_url(&self) -> Result<Url, StreamError> {
        let raw = format!(
            "{}/v1/collections/{}/listen?orderBy=createdAt&direction=asc",
            self.base_api(),
            self.collection
        );
        let mut url = Url::parse(&raw).map_err(|e| StreamError::Protocol(e.to_string()))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| StreamError::Protocol(format!("cannot listen on {raw}")))?;
        if let Some(t) = &self.token {
            url.query_pairs_mut().append_pair("token", t);
        }
        Ok(url)
    }
}

#[async_trait]
impl MessageStream for RemoteStreamClient {
    async fn append(&self, message: NewMessage) -> Result<String, StreamError> {
        let req = self.with_auth(self.http.post(self.documents_url()).json(&message));
        let resp = req
            .send()
            .await
            .map_err(|e| StreamError::Append(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StreamError::Append(format!("HTTP {}", resp.status())));
        }
        let body: AppendResponse = resp
            .json()
            .await
            .map_err(|e| StreamError::Protocol(e.to_string()))?;
        Ok(body.id)
    }

    async fn subscribe(&self) -> Result<Subscription, StreamError> {
        let url = self.listen_url()?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::Subscription(e.to_string()))?;
        log::info!("listening on {}", url.path());

        let (sender, subscription) = Subscription::channel();
        tokio::spawn(forward_frames(ws_stream, sender));
        Ok(subscription)
    }
}

/// Pumps listen frames into the subscription until either side goes away.
async fn forward_frames<S>(mut ws: S, sender: SnapshotSender)
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    loop {
        let frame = tokio::select! {
            () = sender.cancelled() => {
                log::debug!("listen feed cancelled by subscriber");
                return;
            }
            frame = ws.next() => frame,
        };

        let delivered = match frame {
            Some(Ok(WsMessage::Text(text))) => match IncomingEvent::parse(&text) {
                Ok(event) => match event.into_delivery() {
                    Ok(snapshot) => sender.deliver(snapshot),
                    Err(err) => sender.fail(err),
                },
                Err(err) => {
                    log::warn!("dropping malformed listen frame: {err}");
                    true
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                sender.fail(StreamError::Subscription("listen feed closed".into()));
                return;
            }
            Some(Ok(_)) => true,
            Some(Err(e)) => {
                sender.fail(StreamError::Subscription(e.to_string()));
                return;
            }
        };

        if !delivered {
            return;
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;
