//! Azure Storage Queue backend implementation using the HTTP REST API.
//!
//! This module talks to the queue service endpoints directly instead of going
//! through an SDK. That keeps the request/response handling transparent and
//! lets unit tests run against mocked HTTP responses.
//!
//! ## Authentication
//!
//! Requests carry a SharedKey authorization header: an HMAC-SHA256 signature
//! over the canonical string-to-sign, keyed with the base64-decoded storage
//! account key.
//!
//! ## Service limits
//!
//! The queue service enforces a 64 KiB ceiling on the (base64-encoded)
//! message body and a seven-day maximum visibility window. Violations come
//! back as HTTP errors and surface as [`BackendError`] values; this module
//! never pre-validates or truncates on the service's behalf.
//!
//! ## Endpoints
//!
//! The account endpoint defaults to `https://{account}.queue.core.windows.net`
//! and can be overridden for emulators and tests.

use crate::backend::QueueBackend;
use crate::config::AzureQueueConfig;
use crate::error::BackendError;
use crate::message::{LeaseReceipt, QueueName, RawMessage};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client as HttpClient, Method, StatusCode};
use sha2::Sha256;
use std::fmt;
use std::time::Duration;

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request
const API_VERSION: &str = "2021-12-02";

// ============================================================================
// SharedKey Signing
// ============================================================================

/// SharedKey signer for Storage service requests
///
/// Builds the canonical string-to-sign from the request (verb, standard
/// headers, canonicalized `x-ms-*` headers, canonicalized resource) and signs
/// it with HMAC-SHA256 under the decoded account key.
#[derive(Clone)]
struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl SharedKeySigner {
    fn new(account: String, access_key: &str) -> Result<Self, BackendError> {
        let key = STANDARD.decode(access_key).map_err(|e| {
            BackendError::Authentication(format!("access key is not valid base64: {}", e))
        })?;
        Ok(Self { account, key })
    }

    /// Build the Authorization header value for one request
    ///
    /// `query` must be sorted by parameter name; values are the decoded forms.
    fn authorization(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        content_length: usize,
        content_type: &str,
        date: &str,
    ) -> String {
        let canonicalized_headers = format!(
            "x-ms-date:{}\nx-ms-version:{}\n",
            date, API_VERSION
        );

        let mut canonicalized_resource = format!("/{}{}", self.account, path);
        for (name, value) in query {
            canonicalized_resource.push_str(&format!("\n{}:{}", name, value));
        }

        // Content-Length is the empty string when the body is empty
        // (API versions 2015-02-21 and later).
        let content_length = if content_length == 0 {
            String::new()
        } else {
            content_length.to_string()
        };

        let string_to_sign = format!(
            "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
            method.as_str(),
            content_length,
            content_type,
            canonicalized_headers,
            canonicalized_resource
        );

        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        format!("SharedKey {}:{}", self.account, signature)
    }
}

// ============================================================================
// Azure Storage Queue Backend
// ============================================================================

/// Azure Storage Queue backend
///
/// Stateless per call; clone-cheap via the shared HTTP client. One instance
/// serves every queue under the configured storage account.
pub struct AzureQueueBackend {
    http_client: HttpClient,
    signer: SharedKeySigner,
    endpoint: String,
}

impl AzureQueueBackend {
    /// Create new Azure Storage Queue backend
    ///
    /// # Errors
    ///
    /// Returns an error when the account name is empty, the access key is not
    /// valid base64, or the HTTP client cannot be constructed.
    pub fn new(config: AzureQueueConfig) -> Result<Self, BackendError> {
        if config.account.is_empty() {
            return Err(BackendError::Authentication(
                "storage account name cannot be empty".to_string(),
            ));
        }

        let signer = SharedKeySigner::new(config.account.clone(), &config.access_key)?;

        let endpoint = match config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.queue.core.windows.net", config.account),
        };

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
        })
    }

    /// Make a signed HTTP request and return the response body
    ///
    /// `query` must be sorted by parameter name so the signature and the URL
    /// agree on ordering.
    async fn make_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<(StatusCode, String), BackendError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_type = if body.is_some() { "application/xml" } else { "" };
        let content_length = body.as_ref().map(|b| b.len()).unwrap_or(0);

        let authorization = self.signer.authorization(
            &method,
            path,
            query,
            content_length,
            content_type,
            &date,
        );

        let mut url = format!("{}{}", self.endpoint, path);
        if !query.is_empty() {
            let query_string = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{}?{}", url, query_string);
        }

        let mut request = self
            .http_client
            .request(method, &url)
            .header("Authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION);

        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/xml")
                .body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Network(format!("request timeout: {}", e))
            } else if e.is_connect() {
                BackendError::Network(format!("connection failed: {}", e))
            } else {
                BackendError::Network(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(format!("failed to read response body: {}", e)))?;

        Ok((status, response_body))
    }

    /// Parse an error response body into a typed backend error
    ///
    /// Error bodies are `<Error><Code/><Message/></Error>` documents; the
    /// service error code drives the mapping and is preserved verbatim for
    /// codes this layer does not recognize.
    fn parse_error_response(&self, xml: &str, status: StatusCode) -> BackendError {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut error_code = None;
        let mut error_message = None;
        let mut in_code = false;
        let mut in_message = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"Code" => in_code = true,
                    b"Message" => in_message = true,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if in_code {
                        error_code = e.unescape().ok().map(|s| s.into_owned());
                        in_code = false;
                    } else if in_message {
                        error_message = e.unescape().ok().map(|s| s.into_owned());
                        in_message = false;
                    }
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        let code = error_code.unwrap_or_else(|| format!("Http{}", status.as_u16()));
        let message = error_message.unwrap_or_else(|| "unknown error".to_string());

        match code.as_str() {
            "QueueNotFound" | "QueueBeingDeleted" => BackendError::NotFound {
                queue_name: message,
            },
            "QueueAlreadyExists" => BackendError::AlreadyExists {
                queue_name: message,
            },
            "MessageNotFound" | "PopReceiptMismatch" => BackendError::ReceiptNotFound {
                receipt: message,
            },
            "AuthenticationFailed" | "AuthorizationFailure" => {
                BackendError::Authentication(format!("{}: {}", code, message))
            }
            _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
                BackendError::Authentication(format!("{}: {}", code, message))
            }
            _ => BackendError::Service { code, message },
        }
    }

    /// Parse a Get Messages XML response into raw messages
    fn parse_messages_response(&self, xml: &str) -> Result<Vec<RawMessage>, BackendError> {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut messages = Vec::new();
        let mut in_message = false;
        let mut current_id: Option<String> = None;
        let mut current_pop_receipt: Option<String> = None;
        let mut current_text: Option<String> = None;

        let mut in_id = false;
        let mut in_pop_receipt = false;
        let mut in_text = false;

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"QueueMessage" => {
                        in_message = true;
                        current_id = None;
                        current_pop_receipt = None;
                        current_text = None;
                    }
                    b"MessageId" if in_message => in_id = true,
                    b"PopReceipt" if in_message => in_pop_receipt = true,
                    b"MessageText" if in_message => in_text = true,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    let text = e.unescape().ok().map(|s| s.into_owned());
                    if in_id {
                        current_id = text;
                        in_id = false;
                    } else if in_pop_receipt {
                        current_pop_receipt = text;
                        in_pop_receipt = false;
                    } else if in_text {
                        current_text = text;
                        in_text = false;
                    }
                }
                Ok(Event::End(ref e)) if e.name().as_ref() == b"QueueMessage" => {
                    in_message = false;

                    if let (Some(id), Some(pop_receipt), Some(text)) = (
                        current_id.take(),
                        current_pop_receipt.take(),
                        current_text.take(),
                    ) {
                        let payload = STANDARD.decode(&text).map_err(|e| {
                            BackendError::InvalidResponse(format!(
                                "message text is not valid base64: {}",
                                e
                            ))
                        })?;

                        messages.push(RawMessage {
                            receipt: LeaseReceipt::new(id, pop_receipt),
                            payload: Bytes::from(payload),
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(BackendError::InvalidResponse(format!(
                        "XML parsing error: {}",
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(messages)
    }
}

impl fmt::Debug for AzureQueueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureQueueBackend")
            .field("account", &self.signer.account)
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl QueueBackend for AzureQueueBackend {
    async fn create_queue(&self, queue: &QueueName) -> Result<(), BackendError> {
        let path = format!("/{}", queue.as_str());
        let (status, body) = self.make_request(Method::PUT, &path, &[], None).await?;

        match status {
            StatusCode::CREATED => Ok(()),
            // 204: a queue with this name already exists with matching metadata
            StatusCode::NO_CONTENT => Err(BackendError::AlreadyExists {
                queue_name: queue.to_string(),
            }),
            _ => Err(self.parse_error_response(&body, status)),
        }
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<(), BackendError> {
        let path = format!("/{}", queue.as_str());
        let (status, body) = self.make_request(Method::DELETE, &path, &[], None).await?;

        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(self.parse_error_response(&body, status))
        }
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, BackendError> {
        let path = format!("/{}", queue.as_str());
        let query = [("comp", "metadata".to_string())];
        let (status, body) = self.make_request(Method::GET, &path, &query, None).await?;

        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(self.parse_error_response(&body, status)),
        }
    }

    async fn send(
        &self,
        queue: &QueueName,
        payload: &Bytes,
        initial_invisibility: Duration,
    ) -> Result<(), BackendError> {
        let path = format!("/{}/messages", queue.as_str());

        let mut query = Vec::new();
        let delay_secs = initial_invisibility.as_secs();
        if delay_secs > 0 {
            query.push(("visibilitytimeout", delay_secs.to_string()));
        }

        let body = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            STANDARD.encode(payload)
        );

        let (status, response_body) = self
            .make_request(Method::POST, &path, &query, Some(body))
            .await?;

        if status == StatusCode::CREATED {
            Ok(())
        } else {
            Err(self.parse_error_response(&response_body, status))
        }
    }

    async fn receive_batch(
        &self,
        queue: &QueueName,
        max_items: u32,
        visibility: Duration,
    ) -> Result<Vec<RawMessage>, BackendError> {
        let path = format!("/{}/messages", queue.as_str());

        // Service bounds: 1-32 messages per page, visibility at least 1 second.
        let query = [
            ("numofmessages", max_items.clamp(1, 32).to_string()),
            ("visibilitytimeout", visibility.as_secs().max(1).to_string()),
        ];

        let (status, body) = self.make_request(Method::GET, &path, &query, None).await?;

        if status == StatusCode::OK {
            self.parse_messages_response(&body)
        } else {
            Err(self.parse_error_response(&body, status))
        }
    }

    async fn delete(&self, queue: &QueueName, receipt: &LeaseReceipt) -> Result<(), BackendError> {
        let path = format!("/{}/messages/{}", queue.as_str(), receipt.message_id());
        let query = [("popreceipt", receipt.pop_receipt().to_string())];

        let (status, body) = self
            .make_request(Method::DELETE, &path, &query, None)
            .await?;

        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(self.parse_error_response(&body, status))
        }
    }

    async fn clear(&self, queue: &QueueName) -> Result<(), BackendError> {
        let path = format!("/{}/messages", queue.as_str());
        let (status, body) = self.make_request(Method::DELETE, &path, &[], None).await?;

        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(self.parse_error_response(&body, status))
        }
    }
}
