//! # Siege Link Gateway
//!
//! ゲームホストからAPIサーバーへの呼び出しを仲介するシングルフライトGateway。
//!
//! ## 構成
//! - [`gateway`]: 同時に1件だけ通信するGateway本体とポーリングAPI
//! - [`endpoint`]: 通信路の抽象（[`RemoteEndpoint`]）とHTTP実装
//! - [`config`]: 環境変数からのエンドポイント設定
//! - [`error`]: 呼び出し側エラーと通信失敗の分類
//!
//! ## 使い方
//! ```no_run
//! # async fn run() -> Result<(), siege_gateway::GatewayError> {
//! use siege_gateway::{EndpointConfig, SingleFlightGateway};
//!
//! let gateway = SingleFlightGateway::from_config(EndpointConfig::move_from_env()?)?;
//! let _ = gateway.start_call(&serde_json::json!({ "prompt": "next move?" }))?;
//! // 更新ループ側でフレームごとにポーリングする
//! if gateway.has_result() {
//!     let _result = gateway.get_result();
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod gateway;

pub use config::{EndpointConfig, HttpMethod};
pub use endpoint::{HttpEndpoint, RemoteEndpoint};
pub use error::{CallError, GatewayError};
pub use gateway::{Admission, CallState, SingleFlightGateway};
