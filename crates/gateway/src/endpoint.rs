//! # リモートエンドポイント
//!
//! Gatewayが呼び出す通信路をトレイトで抽象化する。
//!
//! ## 実装
//! - [`HttpEndpoint`]: reqwestによるHTTP通信（本番用）
//! - テストでは任意のタイミングで応答を返すモック実装に差し替える

use crate::config::{EndpointConfig, HttpMethod};
use crate::error::{CallError, GatewayError};

/// リモートエンドポイントの抽象インターフェース。
///
/// 1回の呼び出しで1往復の通信を行い、レスポンスボディをJSONとして返す。
/// 失敗は全て [`CallError`] に分類して返し、握りつぶさない。
#[async_trait::async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// リクエストを送信し、デコード済みのレスポンスボディを返す。
    ///
    /// `body` が `None` の場合はボディなしで送信する。
    async fn call(&self, body: Option<serde_json::Value>) -> Result<serde_json::Value, CallError>;

    /// ログ出力用の宛先表記。
    fn target(&self) -> String;
}

/// reqwestによるHTTPエンドポイント実装。
pub struct HttpEndpoint {
    /// HTTPクライアント
    client: reqwest::Client,
    /// 接続先設定
    config: EndpointConfig,
}

impl HttpEndpoint {
    /// 設定からHTTPエンドポイントを構築する。
    pub fn new(config: EndpointConfig) -> Result<Self, GatewayError> {
        if config.timeout.is_zero() {
            return Err(GatewayError::Config(
                "タイムアウトは0より大きい必要があります".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("HTTPクライアントの構築に失敗: {e}")))?;
        Ok(Self { client, config })
    }

    fn classify_send_error(&self, e: reqwest::Error) -> CallError {
        if e.is_timeout() {
            CallError::Timeout(self.config.timeout)
        } else {
            CallError::Transport(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn call(&self, body: Option<serde_json::Value>) -> Result<serde_json::Value, CallError> {
        let mut request = match self.config.method {
            HttpMethod::Get => {
                if body.is_some() {
                    tracing::debug!(endpoint = %self.target(), "GETリクエストのためボディを破棄します");
                }
                self.client.get(&self.config.url)
            }
            HttpMethod::Post => {
                let request = self.client.post(&self.config.url);
                match &body {
                    Some(b) => request.json(b),
                    None => request,
                }
            }
        };
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        if !status.is_success() {
            return Err(CallError::Status {
                status: status.as_u16(),
                body: response_body,
            });
        }

        serde_json::from_str(&response_body).map_err(|e| CallError::Decode(e.to_string()))
    }

    fn target(&self) -> String {
        format!("{} {}", self.config.method, self.config.url)
    }
}
