//! Outbound notifications to the chat webhook.
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text { content: String },
    Markdown { title: String, text: String },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Markdown { .. } => "markdown",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook URL is not configured")]
    NotConfigured,
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(String),
    #[error("failed to reach webhook: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("webhook rejected message: errcode {errcode}: {errmsg}")]
    Rejected { errcode: i64, errmsg: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Chat webhook payload for a message.
pub fn build_payload(message: &Message, at_all: bool) -> Value {
    match message {
        Message::Text { content } => json!({
            "msgtype": "text",
            "text": { "content": content },
            "at": { "isAtAll": at_all },
        }),
        Message::Markdown { title, text } => json!({
            "msgtype": "markdown",
            "markdown": { "title": title, "text": text },
            "at": { "isAtAll": at_all },
        }),
    }
}

#[derive(Deserialize)]
struct WebhookReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: Option<Url>,
    at_all: bool,
}

impl fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The URL embeds the access token.
        f.debug_struct("WebhookNotifier")
            .field("configured", &self.url.is_some())
            .field("at_all", &self.at_all)
            .finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    /// `url` of `None` yields a notifier whose every send fails with
    /// [`NotifyError::NotConfigured`].
    pub fn new(url: Option<&str>, at_all: bool) -> Result<Self, NotifyError> {
        let url = url
            .map(|u| Url::parse(u).map_err(|e| NotifyError::InvalidUrl(e.to_string())))
            .transpose()?;
        let http = Client::builder()
            .user_agent(concat!("chain-watchbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, url, at_all })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    pub fn build_request(&self, message: &Message) -> Result<reqwest::Request, NotifyError> {
        let url = self.url.clone().ok_or(NotifyError::NotConfigured)?;
        Ok(self
            .http
            .post(url)
            .json(&build_payload(message, self.at_all))
            .build()?)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let request = self.build_request(message)?;
        let res = self.http.execute(request).await?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Status { status, body });
        }
        // A 200 can still carry an application-level rejection.
        if let Ok(reply) = serde_json::from_str::<WebhookReply>(&body) {
            if reply.errcode != 0 {
                return Err(NotifyError::Rejected {
                    errcode: reply.errcode,
                    errmsg: reply.errmsg,
                });
            }
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        match message {
            Message::Text { content } => info!(msgtype = "text", "{}", content),
            Message::Markdown { title, text } => {
                info!(msgtype = "markdown", %title, "{}", text)
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn markdown() -> Message {
        Message::Markdown {
            title: "New project".into(),
            text: "### Moon".into(),
        }
    }

    #[test]
    fn payload_shapes() {
        let text = build_payload(&Message::Text { content: "hi".into() }, true);
        assert_eq!(text["msgtype"], "text");
        assert_eq!(text["text"]["content"], "hi");
        assert_eq!(text["at"]["isAtAll"], true);

        let md = build_payload(&markdown(), false);
        assert_eq!(md["msgtype"], "markdown");
        assert_eq!(md["markdown"]["title"], "New project");
        assert_eq!(md["markdown"]["text"], "### Moon");
        assert_eq!(md["at"]["isAtAll"], false);
        assert!(md.get("text").is_none());
    }

    #[test]
    fn debug_hides_url() {
        let n = WebhookNotifier::new(Some("https://hook.example/robot/send?access_token=secret"), false)
            .unwrap();
        assert!(!format!("{:?}", n).contains("secret"));
    }

    #[tokio::test]
    async fn unconfigured_send_fails_without_network() {
        let n = WebhookNotifier::new(None, false).unwrap();
        assert!(!n.is_configured());
        let err = n.send(&markdown()).await.unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured));
    }

    #[tokio::test]
    async fn send_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/robot/send"))
            .and(body_partial_json(serde_json::json!({ "msgtype": "markdown" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errcode": 0, "errmsg": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/robot/send", server.uri());
        let n = WebhookNotifier::new(Some(&url), false).unwrap();
        n.send(&markdown()).await.unwrap();
    }

    #[tokio::test]
    async fn non_2xx_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let n = WebhookNotifier::new(Some(&server.uri()), false).unwrap();
        match n.send(&markdown()).await.unwrap_err() {
            NotifyError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn errcode_in_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errcode": 310000, "errmsg": "keywords not in content"
            })))
            .mount(&server)
            .await;

        let n = WebhookNotifier::new(Some(&server.uri()), false).unwrap();
        match n.send(&markdown()).await.unwrap_err() {
            NotifyError::Rejected { errcode, errmsg } => {
                assert_eq!(errcode, 310000);
                assert!(errmsg.contains("keywords"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
