//! # Gateway エラー型
//!
//! 呼び出し側に返すエラー（[`GatewayError`]）と、
//! リモート呼び出しの失敗として状態に保持されるエラー（[`CallError`]）を分けて定義する。
//!
//! 呼び出し中の再呼び出しはエラーではなく [`crate::Admission::Rejected`] で通知する。

use std::time::Duration;

use siege_types::RequestSchema;

/// Gatewayエラー型。
/// 操作そのものが実行できなかった場合に呼び出し側へ返す。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// ペイロードのJSONシリアライズに失敗
    #[error("ペイロードのシリアライズに失敗: {0}")]
    Payload(String),
    /// エンドポイントが受け付けないスキーマのペイロード
    #[error("リクエストスキーマが一致しません: 設定={expected}, ペイロード={actual}")]
    SchemaMismatch {
        /// エンドポイント設定のスキーマ
        expected: RequestSchema,
        /// 渡されたペイロードのスキーマ
        actual: RequestSchema,
    },
    /// 設定値が不正
    #[error("設定が不正です: {0}")]
    Config(String),
    /// tokioランタイムの外で構築された
    #[error("tokioランタイムが見つかりません: {0}")]
    NoRuntime(String),
}

/// リモート呼び出しの失敗。
/// [`crate::CallState::Failed`] に保持され、結果取得のたびに複製して返す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// 接続・送信・受信の失敗
    #[error("通信に失敗: {0}")]
    Transport(String),
    /// 設定したタイムアウト内に応答がなかった
    #[error("リクエストがタイムアウトしました ({0:?})")]
    Timeout(Duration),
    /// 2xx以外のHTTPステータス
    #[error("サーバーがエラーを返しました: HTTP {status} - {body}")]
    Status {
        /// HTTPステータスコード
        status: u16,
        /// レスポンスボディ（テキスト）
        body: String,
    },
    /// レスポンスがJSONとして解釈できない
    #[error("レスポンスのパースに失敗: {0}")]
    Decode(String),
}

impl CallError {
    /// 認証系のステータス（401/403）かどうか。
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CallError::Status { status: 401 | 403, .. })
    }
}
