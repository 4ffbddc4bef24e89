//! # 更新ループ
//!
//! ゲームホストの描画ループと同じく、一定フレームレートでGatewayをポーリングする。
//! ループ自体は応答を待ってブロックせず、フレームごとに `has_result` を確認するだけ。

use std::time::Duration;

use siege_gateway::SingleFlightGateway;
use tokio::time::MissedTickBehavior;

/// デフォルトのポーリングレート（フレーム/秒）
pub const DEFAULT_FPS: u32 = 60;

/// 呼び出しが完了するまでフレームごとにポーリングし、結果を取り出す。
///
/// 失敗した呼び出しは [`siege_gateway::CallError`] としてそのまま返す。
pub async fn poll_until_done(
    gateway: &SingleFlightGateway,
    fps: u32,
) -> anyhow::Result<serde_json::Value> {
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frames: u64 = 0;
    loop {
        ticker.tick().await;
        frames += 1;

        if !gateway.has_result() {
            continue;
        }

        tracing::debug!(frames, "呼び出し完了を検出");
        return match gateway.take_result() {
            Some(Ok(body)) => Ok(body),
            Some(Err(e)) => {
                if e.is_unauthorized() {
                    tracing::error!(
                        endpoint = %gateway.target(),
                        "認証に失敗しました。SIEGE_API_TOKENを確認してください"
                    );
                }
                Err(e.into())
            }
            None => Err(anyhow::anyhow!(
                "呼び出しが開始されていません: {}",
                gateway.target()
            )),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Json;
    use siege_gateway::{CallError, EndpointConfig};

    async fn start_mock_api() -> String {
        let app = axum::Router::new()
            .route(
                "/ai-move",
                post(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Json(serde_json::json!({ "move": "left" }))
                }),
            )
            .route(
                "/unauthorized",
                post(|| async { (StatusCode::UNAUTHORIZED, "invalid token") }),
            )
            .route(
                "/broken",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        format!("http://127.0.0.1:{port}")
    }

    /// ポーリングで応答ボディを取り出し、Gatewayが再利用可能になることを確認
    #[tokio::test]
    async fn test_poll_until_done_success() {
        let base = start_mock_api().await;
        let gateway =
            SingleFlightGateway::from_config(EndpointConfig::new(format!("{base}/ai-move")))
                .unwrap();

        assert!(gateway.start_call(&serde_json::json!({})).unwrap().is_accepted());
        let body = poll_until_done(&gateway, DEFAULT_FPS).await.unwrap();

        assert_eq!(body, serde_json::json!({ "move": "left" }));
        assert_eq!(gateway.get_result(), None);
        assert!(gateway.start_call(&serde_json::json!({})).unwrap().is_accepted());
    }

    /// サーバーエラーが呼び出し失敗として返ることを確認
    #[tokio::test]
    async fn test_poll_until_done_failure() {
        let base = start_mock_api().await;
        let gateway =
            SingleFlightGateway::from_config(EndpointConfig::new(format!("{base}/broken")))
                .unwrap();

        assert!(gateway.start_call(&serde_json::json!({})).unwrap().is_accepted());
        let err = poll_until_done(&gateway, DEFAULT_FPS).await.unwrap_err();

        let call_err = err.downcast_ref::<CallError>().unwrap();
        assert!(matches!(call_err, CallError::Status { status: 500, .. }));
    }

    /// 認証失敗が認証エラーとして識別できることを確認
    #[tokio::test]
    async fn test_poll_until_done_unauthorized() {
        let base = start_mock_api().await;
        let gateway = SingleFlightGateway::from_config(
            EndpointConfig::new(format!("{base}/unauthorized")).with_bearer_token("wrong"),
        )
        .unwrap();

        assert!(gateway.start_call(&serde_json::json!({})).unwrap().is_accepted());
        let err = poll_until_done(&gateway, DEFAULT_FPS).await.unwrap_err();

        let call_err = err.downcast_ref::<CallError>().unwrap();
        assert!(call_err.is_unauthorized());
    }

    /// 呼び出しを開始していない場合はエラーになることを確認
    #[tokio::test]
    async fn test_poll_without_call() {
        let gateway =
            SingleFlightGateway::from_config(EndpointConfig::new("http://127.0.0.1:9/unused"))
                .unwrap();
        assert!(poll_until_done(&gateway, 0).await.is_err());
    }
}
