//! # Siege Link CLI
//!
//! シングルフライトGatewayを更新ループから駆動するコマンドラインホスト。
//!
//! ## サブコマンド
//! - `init-state` — 初期盤面を取得し、スポーン計画を表示
//! - `ai-move --state <file>` — 盤面スナップショットをAI手番APIに送信
//! - `prompt <text>` — プロンプトを送信（`prompt` スキーマのエンドポイント）
//!
//! 接続先は環境変数（`SIEGE_MOVE_*`, `SIEGE_INIT_*`, `SIEGE_API_TOKEN`,
//! `SIEGE_TIMEOUT_SECS`）から読み込み、グローバルオプションで上書きできる。

mod host;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use siege_gateway::{Admission, EndpointConfig, SingleFlightGateway};
use siege_types::{AiMoveRequest, InitialGameState, PromptRequest, RequestPayload, RequestSchema};

#[derive(Debug, Parser)]
#[command(name = "siege-cli", version, about = "Siege Link command-line host")]
struct Cli {
    /// リクエスト先URL（環境変数の設定を上書き）
    #[arg(long, global = true)]
    url: Option<String>,

    /// Bearerトークン（SIEGE_API_TOKENを上書き）
    #[arg(long, global = true)]
    token: Option<String>,

    /// タイムアウト秒数（SIEGE_TIMEOUT_SECSを上書き）
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// リクエストスキーマ（game-state / prompt）
    #[arg(long, global = true)]
    schema: Option<RequestSchema>,

    /// ポーリングレート（フレーム/秒）
    #[arg(long, global = true, default_value_t = host::DEFAULT_FPS)]
    fps: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 初期盤面を取得する
    InitState,
    /// 盤面スナップショットをAI手番APIに送信する
    AiMove {
        /// AiMoveRequest形式のJSONファイル
        #[arg(long)]
        state: PathBuf,
    },
    /// プロンプトを送信する
    Prompt {
        /// プロンプト本文
        text: String,
    },
}

impl Cli {
    /// コマンドラインの指定で設定を上書きする。
    fn apply_overrides(&self, mut config: EndpointConfig) -> anyhow::Result<EndpointConfig> {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(token) = &self.token {
            config.bearer_token = Some(token.clone());
        }
        if let Some(secs) = self.timeout_secs {
            anyhow::ensure!(secs > 0, "--timeout-secsは1以上である必要があります");
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(schema) = self.schema {
            config.schema = schema;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let body = run(&cli).await?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<serde_json::Value> {
    match &cli.command {
        Command::InitState => {
            let config = cli.apply_overrides(EndpointConfig::init_from_env()?)?;
            let gateway = SingleFlightGateway::from_config(config)?;

            ensure_accepted(gateway.start_fetch())?;
            let body = host::poll_until_done(&gateway, cli.fps).await?;

            let state: InitialGameState = serde_json::from_value(body.clone())
                .context("初期盤面のパースに失敗")?;
            let plan = state.spawn_plan();
            tracing::info!(
                attackers = plan.attackers.len(),
                defenders = plan.defenders.len(),
                "初期盤面を取得"
            );
            for b in plan.attackers.iter().chain(plan.defenders.iter()) {
                tracing::info!(
                    id = b.id,
                    group = ?b.group,
                    kind = ?b.kind,
                    sprite_row = b.kind.sprite_row(b.group),
                    troops = b.troops.len(),
                    "スポーン"
                );
            }
            Ok(body)
        }
        Command::AiMove { state } => {
            let raw = std::fs::read_to_string(state)
                .with_context(|| format!("盤面ファイルの読み込みに失敗: {}", state.display()))?;
            let request: AiMoveRequest =
                serde_json::from_str(&raw).context("盤面ファイルのパースに失敗")?;
            send(cli, RequestPayload::from(request)).await
        }
        Command::Prompt { text } => {
            let body = send(
                cli,
                RequestPayload::from(PromptRequest {
                    prompt: text.clone(),
                }),
            )
            .await?;
            if let Some(response) = body.get("response").and_then(|r| r.as_str()) {
                tracing::info!(response, "プロンプト応答");
            }
            Ok(body)
        }
    }
}

/// 型付きペイロードをAI手番エンドポイントに送信し、完了までポーリングする。
async fn send(cli: &Cli, payload: RequestPayload) -> anyhow::Result<serde_json::Value> {
    let config = cli.apply_overrides(EndpointConfig::move_from_env()?)?;
    let gateway = SingleFlightGateway::from_config(config)?;

    ensure_accepted(gateway.start_request(&payload)?)?;
    host::poll_until_done(&gateway, cli.fps).await
}

fn ensure_accepted(admission: Admission) -> anyhow::Result<()> {
    match admission {
        Admission::Accepted => Ok(()),
        Admission::Rejected => Err(anyhow::anyhow!("別の呼び出しが通信中です")),
    }
}
