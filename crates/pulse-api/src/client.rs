// SPDX-FileCopyrightText: 2026 Pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote authority's REST API.
//!
//! Provides [`ApiClient`], which builds the request paths, decodes the
//! response envelopes, and maps failures onto the [`PulseError`] taxonomy:
//! reads become `Poll`, writes become `Request`, attachment bundles become
//! `Upload`. No request is retried.

use std::time::Duration;

use pulse_core::{
    BoxError, ConversationSummary, Message, NotificationPage, OutgoingMessage, PresenceStatus,
    PulseError, UploadBundle, UserId,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{
    ApiErrorResponse, Envelope, SendMessageBody, StatusResponse, StatusUpdate,
    UnreadCountResponse,
};

/// Which failure class a call maps to.
#[derive(Debug, Clone, Copy)]
enum CallKind {
    Read,
    Write,
    Upload,
}

impl CallKind {
    fn error(self, message: String, source: Option<BoxError>) -> PulseError {
        match self {
            CallKind::Read => PulseError::Poll { message, source },
            CallKind::Write => PulseError::Request { message, source },
            CallKind::Upload => PulseError::Upload { message, source },
        }
    }
}

/// HTTP client for the remote authority.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PulseError> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = base_url.into();
        Url::parse(&base_url)
            .map_err(|e| PulseError::Config(format!("invalid API base URL `{base_url}`: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /notifications?user={id}`
    pub async fn fetch_notifications(&self, user: &UserId) -> Result<NotificationPage, PulseError> {
        let mut url = self.url(&["notifications"], CallKind::Read)?;
        url.query_pairs_mut().append_pair("user", user.as_str());
        let page: Envelope<NotificationPage> = self.get_json(url).await?;
        Ok(page.into_inner())
    }

    /// `PUT /notifications/read-all?user={id}`
    pub async fn mark_all_notifications_read(&self, user: &UserId) -> Result<(), PulseError> {
        let mut url = self.url(&["notifications", "read-all"], CallKind::Write)?;
        url.query_pairs_mut().append_pair("user", user.as_str());
        self.send_empty(self.client.request(Method::PUT, url), CallKind::Write)
            .await
    }

    /// `PUT /notifications/{id}/read`
    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), PulseError> {
        let url = self.url(&["notifications", notification_id, "read"], CallKind::Write)?;
        self.send_empty(self.client.request(Method::PUT, url), CallKind::Write)
            .await
    }

    /// `GET /messages/conversation/{selfId}/{peerId}`
    pub async fn fetch_conversation(
        &self,
        self_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, PulseError> {
        let url = self.url(
            &["messages", "conversation", self_id.as_str(), peer_id.as_str()],
            CallKind::Read,
        )?;
        let messages: Envelope<Vec<Message>> = self.get_json(url).await?;
        Ok(messages.into_inner())
    }

    /// `GET /messages/conversations/{id}`
    pub async fn fetch_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, PulseError> {
        let url = self.url(&["messages", "conversations", user.as_str()], CallKind::Read)?;
        let summaries: Envelope<Vec<ConversationSummary>> = self.get_json(url).await?;
        Ok(summaries.into_inner())
    }

    /// `POST /messages`
    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, PulseError> {
        let url = self.url(&["messages"], CallKind::Write)?;
        let body = SendMessageBody {
            sender_id: message.sender_id.as_str(),
            receiver_id: message.receiver_id.as_str(),
            content: &message.body,
        };
        let request = self.client.post(url).json(&body);
        let stored: Envelope<Message> = self.send_json(request, CallKind::Write).await?;
        Ok(stored.into_inner())
    }

    /// `POST /messages/with-attachments` as one multipart form.
    pub async fn send_message_with_attachments(
        &self,
        bundle: &UploadBundle,
    ) -> Result<Message, PulseError> {
        let url = self.url(&["messages", "with-attachments"], CallKind::Upload)?;

        let mut form = Form::new()
            .text("sender_id", bundle.sender_id.to_string())
            .text("receiver_id", bundle.receiver_id.to_string())
            .text("content", bundle.body.clone());

        for file in &bundle.files {
            let mut part = Part::bytes(file.data.clone()).file_name(file.file_name.clone());
            if let Some(mime) = &file.mime_type {
                part = part.mime_str(mime).map_err(|e| {
                    CallKind::Upload.error(
                        format!("invalid mime type `{mime}` for {}: {e}", file.file_name),
                        Some(Box::new(e)),
                    )
                })?;
            }
            form = form.part("files", part);
        }

        debug!(
            files = bundle.files.len(),
            bytes = bundle.total_bytes(),
            "submitting attachment bundle"
        );
        let request = self.client.post(url).multipart(form);
        let stored: Envelope<Message> = self.send_json(request, CallKind::Upload).await?;
        Ok(stored.into_inner())
    }

    /// `PUT /messages/read/{senderId}/{receiverId}`
    pub async fn mark_conversation_read(
        &self,
        sender_id: &UserId,
        receiver_id: &UserId,
    ) -> Result<(), PulseError> {
        let url = self.url(
            &["messages", "read", sender_id.as_str(), receiver_id.as_str()],
            CallKind::Write,
        )?;
        self.send_empty(self.client.request(Method::PUT, url), CallKind::Write)
            .await
    }

    /// `GET /messages/unread/{id}`
    pub async fn unread_message_count(&self, user: &UserId) -> Result<u64, PulseError> {
        let url = self.url(&["messages", "unread", user.as_str()], CallKind::Read)?;
        let count: UnreadCountResponse = self.get_json(url).await?;
        Ok(count.count())
    }

    /// `PUT /messages/status/{id}`
    pub async fn announce_presence(&self, user: &UserId, online: bool) -> Result<(), PulseError> {
        let url = self.url(&["messages", "status", user.as_str()], CallKind::Write)?;
        let request = self
            .client
            .request(Method::PUT, url)
            .json(&StatusUpdate { is_online: online });
        self.send_empty(request, CallKind::Write).await
    }

    /// `GET /messages/status/{id}`
    pub async fn fetch_presence(&self, user: &UserId) -> Result<PresenceStatus, PulseError> {
        let url = self.url(&["messages", "status", user.as_str()], CallKind::Read)?;
        let status: Envelope<StatusResponse> = self.get_json(url).await?;
        let status = status.into_inner();
        Ok(PresenceStatus {
            user_id: user.clone(),
            is_online: status.is_online,
            device_class: status.device_class,
        })
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str], kind: CallKind) -> Result<Url, PulseError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| kind.error(format!("invalid base URL `{}`: {e}", self.base_url), None))?;
        url.path_segments_mut()
            .map_err(|_| kind.error(format!("base URL `{}` cannot be a base", self.base_url), None))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, PulseError> {
        self.send_json(self.client.get(url), CallKind::Read).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        kind: CallKind,
    ) -> Result<T, PulseError> {
        let response = self.execute(request, kind).await?;
        let body = response
            .text()
            .await
            .map_err(|e| kind.error(format!("failed to read response body: {e}"), Some(Box::new(e))))?;
        serde_json::from_str(&body)
            .map_err(|e| kind.error(format!("failed to parse response: {e}"), Some(Box::new(e))))
    }

    async fn send_empty(
        &self,
        request: reqwest::RequestBuilder,
        kind: CallKind,
    ) -> Result<(), PulseError> {
        self.execute(request, kind).await.map(|_| ())
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        kind: CallKind,
    ) -> Result<Response, PulseError> {
        let response = request
            .send()
            .await
            .map_err(|e| kind.error(format!("HTTP request failed: {e}"), Some(Box::new(e))))?;

        let status = response.status();
        debug!(status = %status, url = %response.url(), "authority response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => format!("authority returned {status}: {}", api_err.message),
            Err(_) => format!("authority returned {status}: {body}"),
        };
        Err(kind.error(message, None))
    }
}
