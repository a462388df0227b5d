use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::discovery::{normalize_client_endpoint, DiscoveryDocument, DISCOVERY_PATH};
use super::ChatApi;
use crate::account::{auth_response_from_value, AuthResponse, IpAuthorizationPoll, LoginOutcome, User};
use crate::channel::{normalize_channel, normalize_guild, normalize_guild_channel, Channel, Guild};
use crate::config::ClientConfig;
use crate::error::{mentions_captcha, Error, Result};
use crate::json::extract_list;
use crate::message::{normalize_message, normalize_messages, ImageUpload, Message};

const IP_AUTHORIZATION_REQUIRED: &str = "IP_AUTHORIZATION_REQUIRED";
const DEFAULT_CAPTCHA_KIND: &str = "hcaptcha";
/// Form part carrying the single uploaded image
const IMAGE_PART: &str = "files[0]";

/// A solved captcha to attach to an auth request
#[derive(Clone, Debug, PartialEq)]
pub struct Captcha {
    pub token: String,
    /// Provider name, e.g. "hcaptcha" or "turnstile"
    pub kind: Option<String>,
}

impl Captcha {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), kind: None }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    fn kind(&self) -> &str {
        self.kind.as_deref().filter(|k| !k.is_empty()).unwrap_or(DEFAULT_CAPTCHA_KIND)
    }
}

enum Body {
    Empty,
    Json(Value),
    Multipart(Form),
}

/// HTTP client for one Fluxer instance.
///
/// Holds its own session token and discovery cache; any number of clients can coexist.
pub struct FluxerClient {
    http: Client,
    config: ClientConfig,
    token: Option<String>,
    discovery: RwLock<Option<DiscoveryDocument>>,
}

impl FluxerClient {
    pub fn new(mut config: ClientConfig) -> Result<Self> {
        Url::parse(&config.api_base_url)?;
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();

        Ok(Self {
            http: Client::builder().build()?,
            config,
            token: None,
            discovery: RwLock::new(None),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn base(&self) -> &str {
        &self.config.api_base_url
    }

    /// The discovery document, fetched once and cached; a failed fetch is not cached
    pub async fn discover(&self) -> DiscoveryDocument {
        if let Some(doc) = self.discovery.read().await.as_ref() {
            return doc.clone();
        }

        match self.fetch_discovery().await {
            Ok(doc) => {
                debug!("Discovered endpoints: {:?}", doc.endpoints);
                *self.discovery.write().await = Some(doc.clone());
                doc
            }
            Err(e) => {
                warn!("Discovery failed, using default paths: {}", e);
                DiscoveryDocument::fallback(self.base())
            }
        }
    }

    async fn fetch_discovery(&self) -> Result<DiscoveryDocument> {
        let url = format!("{}{}", self.base(), DISCOVERY_PATH);
        let response = self
            .http
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                code: None,
                message: status_message(status),
            });
        }
        Ok(response.json::<DiscoveryDocument>().await?)
    }

    /// Issue one request. Bodies are never logged.
    async fn send(
        &self,
        method: Method,
        url: &str,
        log_path: &str,
        body: Body,
        origin: Option<&str>,
        captcha: Option<&Captcha>,
    ) -> Result<Value> {
        debug!("{} {}", method, log_path);

        let mut request = self.http.request(method.clone(), url);
        if let Some(origin) = origin {
            request = request
                .header(ORIGIN, origin)
                .header(REFERER, format!("{}/", origin))
                .header("X-Requested-With", "XMLHttpRequest");
        }
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(captcha) = captcha {
            request = request
                .header("X-Captcha-Token", captcha.token.as_str())
                .header("X-Captcha-Type", captcha.kind());
        }
        request = match body {
            Body::Empty => request.header(CONTENT_TYPE, "application/json"),
            Body::Json(value) => request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&value)?),
            // reqwest sets the multipart boundary itself
            Body::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("{} {} -> {}", method, log_path, status.as_u16());

        interpret_response(status, &text)
    }

    /// Auth endpoints live at the bare base under more than one prefix; try each in turn
    async fn request_auth(
        &self,
        paths: &[String],
        method: Method,
        body: Option<Value>,
        captcha: Option<&Captcha>,
    ) -> Result<Value> {
        let mut failures = Vec::with_capacity(paths.len());
        for path in paths {
            let url = format!("{}{}", self.base(), path);
            let attempt = body.clone().map(Body::Json).unwrap_or(Body::Empty);
            match self.send(method.clone(), &url, path, attempt, None, captcha).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!("{} failed, trying next: {}", path, e);
                    failures.push(format!("{}: {}", path, e));
                }
            }
        }
        Err(auth_failure(failures))
    }

    async fn request_client(&self, method: Method, path: &str, body: Body) -> Result<Value> {
        let discovery = self.discover().await;
        let path = normalize_client_endpoint(path);
        let url = format!("{}{}", discovery.client_base(self.base()), path);
        let origin = discovery.origin(&self.config.webapp_origin);
        self.send(method, &url, path, body, Some(origin), None).await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        captcha: Option<&Captcha>,
    ) -> Result<LoginOutcome> {
        // Warm the discovery cache; auth itself does not depend on it
        self.discover().await;

        let raw = self
            .request_auth(
                &auth_paths("login"),
                Method::POST,
                Some(json!({ "email": email, "password": password })),
                captcha,
            )
            .await?;
        LoginOutcome::from_value(&raw).ok_or(Error::UnexpectedShape("login"))
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
        captcha: Option<&Captcha>,
    ) -> Result<AuthResponse> {
        let raw = self
            .request_auth(
                &auth_paths("register"),
                Method::POST,
                Some(json!({ "email": email, "password": password, "username": username })),
                captcha,
            )
            .await?;
        auth_response_from_value(&raw).ok_or(Error::UnexpectedShape("register"))
    }

    pub async fn current_user(&self) -> Result<User> {
        let raw = self.request_client(Method::GET, "/api/v1/users/@me", Body::Empty).await?;
        User::from_value(&raw).ok_or(Error::UnexpectedShape("user"))
    }

    pub async fn poll_ip_authorization(&self, ticket: &str) -> Result<IpAuthorizationPoll> {
        let raw = self
            .request_auth(&ip_authorization_paths("poll", ticket), Method::GET, None, None)
            .await?;
        Ok(serde_json::from_value(raw)?)
    }

    pub async fn resend_ip_authorization(&self, ticket: &str) -> Result<()> {
        self.request_auth(&ip_authorization_paths("resend", ticket), Method::POST, None, None)
            .await?;
        Ok(())
    }

    /// The user's own channels, direct messages included
    pub async fn channels(&self) -> Result<Vec<Channel>> {
        let raw = self
            .request_client(Method::GET, "/api/v1/users/@me/channels", Body::Empty)
            .await?;
        let list = extract_list(&raw, "channels").ok_or(Error::UnexpectedShape("channels"))?;
        Ok(list.iter().map(normalize_channel).collect())
    }

    pub async fn channel(&self, channel_id: &str) -> Result<Channel> {
        let raw = self
            .request_client(Method::GET, &format!("/api/v1/channels/{}", channel_id), Body::Empty)
            .await?;
        if !raw.is_object() {
            return Err(Error::UnexpectedShape("channel"));
        }
        Ok(normalize_channel(&raw))
    }

    pub async fn guilds(&self) -> Result<Vec<Guild>> {
        let raw = self
            .request_client(Method::GET, "/api/v1/users/@me/guilds", Body::Empty)
            .await?;
        let list = extract_list(&raw, "guilds").ok_or(Error::UnexpectedShape("guilds"))?;
        Ok(list.iter().map(normalize_guild).collect())
    }

    pub async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>> {
        let raw = self
            .request_client(Method::GET, &format!("/api/v1/guilds/{}/channels", guild_id), Body::Empty)
            .await?;
        let list = extract_list(&raw, "channels").ok_or(Error::UnexpectedShape("guild channels"))?;
        Ok(list.iter().map(|ch| normalize_guild_channel(ch, guild_id)).collect())
    }

    pub async fn get_messages(
        &self,
        channel_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<Message>> {
        let raw = self
            .request_client(Method::GET, &messages_path(channel_id, limit, before), Body::Empty)
            .await?;
        let list = extract_list(&raw, "messages").ok_or(Error::UnexpectedShape("messages"))?;
        Ok(normalize_messages(list))
    }

    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        let raw = self
            .request_client(
                Method::POST,
                &format!("/api/v1/channels/{}/messages", channel_id),
                Body::Json(json!({ "content": content })),
            )
            .await?;
        Ok(normalize_message(&raw))
    }

    pub async fn send_message_with_image(
        &self,
        channel_id: &str,
        content: &str,
        image: &ImageUpload,
    ) -> Result<Message> {
        let filename = image.upload_name(Utc::now().timestamp_millis());
        let payload = image_payload(content, &filename);

        let file = Part::bytes(image.bytes.to_vec())
            .file_name(filename)
            .mime_str(image.upload_mime())?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part(IMAGE_PART, file);

        let raw = self
            .request_client(
                Method::POST,
                &format!("/api/v1/channels/{}/messages", channel_id),
                Body::Multipart(form),
            )
            .await?;
        Ok(normalize_message(&raw))
    }

    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<Message> {
        let raw = self
            .request_client(
                Method::PATCH,
                &message_path(channel_id, message_id),
                Body::Json(json!({ "content": content })),
            )
            .await?;
        Ok(normalize_message(&raw))
    }

    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.request_client(
            Method::DELETE,
            &message_path(channel_id, message_id),
            Body::Empty,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatApi for FluxerClient {
    async fn get_messages(
        &self,
        channel_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<Message>> {
        FluxerClient::get_messages(self, channel_id, limit, before).await
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        FluxerClient::send_message(self, channel_id, content).await
    }

    async fn send_message_with_image(
        &self,
        channel_id: &str,
        content: &str,
        image: &ImageUpload,
    ) -> Result<Message> {
        FluxerClient::send_message_with_image(self, channel_id, content, image).await
    }
}

fn auth_paths(action: &str) -> Vec<String> {
    vec![format!("/auth/{}", action), format!("/v1/auth/{}", action)]
}

fn ip_authorization_paths(action: &str, ticket: &str) -> Vec<String> {
    let ticket: String = url::form_urlencoded::byte_serialize(ticket.as_bytes()).collect();
    auth_paths(&format!("ip-authorization/{}?ticket={}", action, ticket))
}

fn message_path(channel_id: &str, message_id: &str) -> String {
    format!("/api/v1/channels/{}/messages/{}", channel_id, message_id)
}

/// The `payload_json` part of an image send; attachment 0 refers to [`IMAGE_PART`]
fn image_payload(content: &str, filename: &str) -> Value {
    json!({
        "content": content,
        "attachments": [{ "id": 0, "filename": filename }],
    })
}

fn messages_path(channel_id: &str, limit: u32, before: Option<&str>) -> String {
    let mut path = format!("/api/v1/channels/{}/messages?limit={}", channel_id, limit);
    if let Some(before) = before {
        path.push_str("&before=");
        path.extend(url::form_urlencoded::byte_serialize(before.as_bytes()));
    }
    path
}

fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {}: {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// Map a status and body text to the JSON value or the API error it stands for
fn interpret_response(status: StatusCode, text: &str) -> Result<Value> {
    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(text)?);
    }

    let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    let code = body.get("code").and_then(Value::as_str).map(str::to_string);

    // Not a failure: the login flow continues with an emailed approval
    if status == StatusCode::FORBIDDEN && code.as_deref() == Some(IP_AUTHORIZATION_REQUIRED) {
        return Ok(body);
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| status_message(status));

    Err(Error::Api { status: status.as_u16(), code, message })
}

fn auth_failure(failures: Vec<String>) -> Error {
    if failures.iter().any(|f| mentions_captcha(f)) {
        Error::CaptchaRequired
    } else {
        Error::AllEndpointsFailed(failures)
    }
}
