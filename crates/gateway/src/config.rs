//! # エンドポイント設定
//!
//! 環境変数からの設定読み込み。
//! 1つのGatewayは1つの [`EndpointConfig`] に対応する。
//!
//! ## 環境変数
//! `{PREFIX}` はエンドポイントごとの接頭辞（例: `SIEGE_MOVE`, `SIEGE_INIT`）。
//! - `{PREFIX}_URL` — リクエスト先URL
//! - `{PREFIX}_METHOD` — `GET` / `POST`
//! - `{PREFIX}_SCHEMA` — `game-state` / `prompt`
//! - `SIEGE_API_TOKEN` — 全エンドポイント共通のBearerトークン
//! - `SIEGE_TIMEOUT_SECS` — 全エンドポイント共通のタイムアウト（秒）

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use siege_types::RequestSchema;

use crate::error::GatewayError;

/// AI手番エンドポイントの環境変数接頭辞
pub const MOVE_ENV_PREFIX: &str = "SIEGE_MOVE";
/// 初期盤面エンドポイントの環境変数接頭辞
pub const INIT_ENV_PREFIX: &str = "SIEGE_INIT";

/// デフォルトのタイムアウト（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTPメソッド。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// ボディなし
    Get,
    /// JSONボディ付き
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            other => Err(GatewayError::Config(format!(
                "未サポートのHTTPメソッド: {other}"
            ))),
        }
    }
}

/// 1つのリモートエンドポイントの設定。
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// リクエスト先URL
    pub url: String,
    /// HTTPメソッド
    pub method: HttpMethod,
    /// 静的Bearerトークン（Noneの場合はAuthorizationヘッダーを付けない）
    pub bearer_token: Option<String>,
    /// 1回の呼び出しのタイムアウト
    pub timeout: Duration,
    /// 受け付けるリクエストスキーマ
    pub schema: RequestSchema,
}

impl EndpointConfig {
    /// POST + `game-state` スキーマの設定を作成する。
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            bearer_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            schema: RequestSchema::GameState,
        }
    }

    /// HTTPメソッドを指定する。
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Bearerトークンを指定する。
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// タイムアウトを指定する。
    ///
    /// 0の場合はGateway/エンドポイント構築時に [`GatewayError::Config`] になる。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// リクエストスキーマを指定する。
    pub fn with_schema(mut self, schema: RequestSchema) -> Self {
        self.schema = schema;
        self
    }

    /// AI手番エンドポイントの設定を環境変数から構築する。
    pub fn move_from_env() -> Result<Self, GatewayError> {
        Self::from_env(
            MOVE_ENV_PREFIX,
            "http://localhost:8080/api/ai-move",
            HttpMethod::Post,
        )
    }

    /// 初期盤面エンドポイントの設定を環境変数から構築する。
    pub fn init_from_env() -> Result<Self, GatewayError> {
        Self::from_env(
            INIT_ENV_PREFIX,
            "http://localhost:8080/api/initial-state",
            HttpMethod::Get,
        )
    }

    /// 環境変数から構築する。
    pub fn from_env(
        prefix: &str,
        default_url: &str,
        default_method: HttpMethod,
    ) -> Result<Self, GatewayError> {
        Self::from_lookup(prefix, default_url, default_method, |key| {
            std::env::var(key).ok()
        })
    }

    /// 任意のキー参照関数から構築する。
    fn from_lookup<F>(
        prefix: &str,
        default_url: &str,
        default_method: HttpMethod,
        lookup: F,
    ) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(&format!("{prefix}_URL")).unwrap_or_else(|| default_url.to_string());

        let method = match lookup(&format!("{prefix}_METHOD")) {
            Some(m) => m.parse::<HttpMethod>()?,
            None => default_method,
        };

        let schema = match lookup(&format!("{prefix}_SCHEMA")) {
            Some(s) => s.parse::<RequestSchema>().map_err(GatewayError::Config)?,
            None => RequestSchema::GameState,
        };

        let bearer_token = lookup("SIEGE_API_TOKEN").filter(|t| !t.is_empty());
        if bearer_token.is_none() {
            tracing::warn!(
                prefix,
                "SIEGE_API_TOKENが未設定です。Authorizationヘッダーなしで送信します"
            );
        }

        let timeout_secs = match lookup("SIEGE_TIMEOUT_SECS") {
            Some(s) => s.trim().parse::<u64>().map_err(|e| {
                GatewayError::Config(format!("SIEGE_TIMEOUT_SECSが不正です ({s}): {e}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(GatewayError::Config(
                "SIEGE_TIMEOUT_SECSは1以上である必要があります".to_string(),
            ));
        }

        Ok(Self {
            url,
            method,
            bearer_token,
            timeout: Duration::from_secs(timeout_secs),
            schema,
        })
    }
}
