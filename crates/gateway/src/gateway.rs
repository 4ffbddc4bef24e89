//! # シングルフライト・リモート呼び出しGateway
//!
//! 1つのリモートエンドポイントへの通信を直列化し、同時に未完了の往復が
//! 1つを超えないことを保証する。結果はポーリング（[`SingleFlightGateway::has_result`],
//! [`SingleFlightGateway::get_result`]）または待機（[`SingleFlightGateway::wait`]）で取得する。
//!
//! ## 状態遷移
//! ```text
//! Idle ──start──▶ InFlight ──成功──▶ Completed(body)
//!                    │    └──失敗──▶ Failed(error)
//! Completed / Failed ──start──▶ InFlight
//! Completed / Failed ──take_result──▶ Idle
//! ```
//! InFlight中のstartは拒否され、状態は変化しない。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use siege_types::{RequestPayload, RequestSchema};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::EndpointConfig;
use crate::endpoint::{HttpEndpoint, RemoteEndpoint};
use crate::error::{CallError, GatewayError};

/// Gatewayの呼び出し状態。
#[derive(Debug, Clone, PartialEq)]
pub enum CallState {
    /// 呼び出し前、または結果を取り出した後
    Idle,
    /// 通信中
    InFlight,
    /// 直近の呼び出しが成功した
    Completed(serde_json::Value),
    /// 直近の呼び出しが失敗した
    Failed(CallError),
}

impl CallState {
    /// 通信中かどうか。
    pub fn is_in_flight(&self) -> bool {
        matches!(self, CallState::InFlight)
    }

    fn outcome(&self) -> Option<Result<serde_json::Value, CallError>> {
        match self {
            CallState::Completed(value) => Some(Ok(value.clone())),
            CallState::Failed(err) => Some(Err(err.clone())),
            CallState::Idle | CallState::InFlight => None,
        }
    }
}

/// 呼び出し開始要求の受理結果。
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 受理され、リクエストが発行された
    Accepted,
    /// 別の呼び出しが通信中のため拒否された（何も発行していない）
    Rejected,
}

impl Admission {
    /// 受理されたかどうか。
    pub fn is_accepted(self) -> bool {
        self == Admission::Accepted
    }
}

/// シングルフライト・リモート呼び出しGateway。
///
/// クローンは同じ状態を共有するハンドルになる。
#[derive(Clone)]
pub struct SingleFlightGateway {
    /// 呼び出し先
    endpoint: Arc<dyn RemoteEndpoint>,
    /// 受け付けるリクエストスキーマ
    schema: RequestSchema,
    /// 1回の呼び出しの上限時間
    timeout: Duration,
    /// 呼び出し状態。読み書きはこのチャネルのロック下で行う。
    state: Arc<watch::Sender<CallState>>,
    /// 通信タスクを実行するランタイム
    runtime: Handle,
}

impl SingleFlightGateway {
    /// 現在のtokioランタイム上で動くGatewayを構築する。
    pub fn new<E>(endpoint: E, schema: RequestSchema, timeout: Duration) -> Result<Self, GatewayError>
    where
        E: RemoteEndpoint + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| GatewayError::NoRuntime(e.to_string()))?;
        Self::with_runtime(endpoint, schema, timeout, runtime)
    }

    /// ランタイムを明示してGatewayを構築する。
    ///
    /// ランタイム外のスレッド（同期的な更新ループ等）から使う場合に指定する。
    /// タイムアウトが0の場合は設定エラー。
    pub fn with_runtime<E>(
        endpoint: E,
        schema: RequestSchema,
        timeout: Duration,
        runtime: Handle,
    ) -> Result<Self, GatewayError>
    where
        E: RemoteEndpoint + 'static,
    {
        if timeout.is_zero() {
            return Err(GatewayError::Config(
                "タイムアウトは0より大きい必要があります".to_string(),
            ));
        }
        let (state, _) = watch::channel(CallState::Idle);
        Ok(Self {
            endpoint: Arc::new(endpoint),
            schema,
            timeout,
            state: Arc::new(state),
            runtime,
        })
    }

    /// 設定からHTTPエンドポイントを持つGatewayを構築する。
    pub fn from_config(config: EndpointConfig) -> Result<Self, GatewayError> {
        let schema = config.schema;
        let timeout = config.timeout;
        Self::new(HttpEndpoint::new(config)?, schema, timeout)
    }

    /// 受け付けるリクエストスキーマ。
    pub fn schema(&self) -> RequestSchema {
        self.schema
    }

    /// ログ出力用の宛先表記。
    pub fn target(&self) -> String {
        self.endpoint.target()
    }

    /// ペイロードをJSONボディとして呼び出しを開始する。
    ///
    /// 通信中であれば [`Admission::Rejected`] を返し、状態は変えない。
    /// 受理した場合は応答を待たずに [`Admission::Accepted`] を返す。
    pub fn start_call<P>(&self, payload: &P) -> Result<Admission, GatewayError>
    where
        P: Serialize + ?Sized,
    {
        let body =
            serde_json::to_value(payload).map_err(|e| GatewayError::Payload(e.to_string()))?;
        Ok(self.dispatch(Some(body)))
    }

    /// 型付きペイロードで呼び出しを開始する。
    ///
    /// ペイロードのスキーマが設定と異なる場合は送信せずにエラーを返す。
    pub fn start_request(&self, payload: &RequestPayload) -> Result<Admission, GatewayError> {
        if payload.schema() != self.schema {
            return Err(GatewayError::SchemaMismatch {
                expected: self.schema,
                actual: payload.schema(),
            });
        }
        self.start_call(payload)
    }

    /// ボディなしで呼び出しを開始する（GETエンドポイント用）。
    pub fn start_fetch(&self) -> Admission {
        self.dispatch(None)
    }

    /// 結果が読める状態か（通信中でないか）。
    pub fn has_result(&self) -> bool {
        !self.state.borrow().is_in_flight()
    }

    /// 直近の呼び出し結果を返す。
    ///
    /// 通信中、または一度も完了していない場合は `None`。
    /// 結果は消費しないため、次の呼び出しが受理されるまで同じ値を返し続ける。
    pub fn get_result(&self) -> Option<Result<serde_json::Value, CallError>> {
        self.state.borrow().outcome()
    }

    /// 直近の呼び出し結果を取り出し、状態をIdleに戻す。
    ///
    /// 通信中は何もせず `None` を返す。
    pub fn take_result(&self) -> Option<Result<serde_json::Value, CallError>> {
        let mut taken = None;
        self.state.send_if_modified(|state| match state {
            CallState::Completed(_) | CallState::Failed(_) => {
                taken = std::mem::replace(state, CallState::Idle).outcome();
                true
            }
            CallState::Idle | CallState::InFlight => false,
        });
        taken
    }

    /// 現在の状態のスナップショット。
    pub fn state(&self) -> CallState {
        self.state.borrow().clone()
    }

    /// 通信中でなくなるまで待機し、[`Self::get_result`] と同じ値を返す。
    pub async fn wait(&self) -> Option<Result<serde_json::Value, CallError>> {
        let mut rx = self.state.subscribe();
        let outcome = match rx.wait_for(|state| !state.is_in_flight()).await {
            Ok(state) => state.outcome(),
            Err(_) => None,
        };
        outcome
    }

    fn dispatch(&self, body: Option<serde_json::Value>) -> Admission {
        // 判定と遷移はチャネルのロック下で一度に行う
        let accepted = self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                false
            } else {
                *state = CallState::InFlight;
                true
            }
        });
        if !accepted {
            tracing::debug!(endpoint = %self.endpoint.target(), "通信中のため呼び出しを拒否");
            return Admission::Rejected;
        }

        let call_id = uuid::Uuid::new_v4();
        tracing::info!(%call_id, endpoint = %self.endpoint.target(), "リモート呼び出しを開始");

        let endpoint = Arc::clone(&self.endpoint);
        let guard = CompletionGuard {
            state: Arc::clone(&self.state),
            call_id,
            completed: false,
        };
        let timeout = self.timeout;
        let runtime = self.runtime.clone();

        // ランタイム停止でこのタスクが破棄された場合はguardが失敗に遷移させる
        self.runtime.spawn(async move {
            let guard = guard;
            let mut task = runtime.spawn(async move { endpoint.call(body).await });

            let outcome = match tokio::time::timeout(timeout, &mut task).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(CallError::Transport(format!("呼び出しタスクが異常終了: {e}"))),
                Err(_) => {
                    task.abort();
                    Err(CallError::Timeout(timeout))
                }
            };

            let next = match outcome {
                Ok(body) => {
                    tracing::info!(%call_id, "リモート呼び出し完了");
                    CallState::Completed(body)
                }
                Err(e) => {
                    tracing::warn!(%call_id, error = %e, "リモート呼び出し失敗");
                    CallState::Failed(e)
                }
            };
            guard.complete(next);
        });

        Admission::Accepted
    }
}

/// 通信タスクが結果を書き込まずに破棄された場合、状態をInFlightから抜けさせる。
struct CompletionGuard {
    state: Arc<watch::Sender<CallState>>,
    call_id: uuid::Uuid,
    completed: bool,
}

impl CompletionGuard {
    fn complete(mut self, next: CallState) {
        self.completed = true;
        self.state.send_replace(next);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        tracing::warn!(call_id = %self.call_id, "通信タスクが完了前に破棄されました");
        self.state.send_replace(CallState::Failed(CallError::Transport(
            "ランタイム停止により呼び出しが中断されました".to_string(),
        )));
    }
}
