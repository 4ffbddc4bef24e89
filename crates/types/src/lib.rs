//! # Siege Link 共有型定義
//!
//! ゲームホストとAPIサーバー間でやり取りするJSONデータ構造を
//! Rust構造体として提供する。
//!
//! ## リクエストスキーマ
//! - `game-state`: 盤面スナップショット（AI手番API）
//! - `prompt`: 自由形式のプロンプト文字列
//!
//! どちらを使うかはエンドポイント設定で明示的に選択する（[`RequestSchema`]）。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 陣営・兵種
// ---------------------------------------------------------------------------

/// 陣営。プレイヤー側が攻撃、AI側が防衛。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// 攻撃側（プレイヤー）
    Attacker,
    /// 防衛側（AI）
    Defender,
}

/// 大隊の兵種。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattalionKind {
    /// 弓兵
    Archer,
    /// 歩兵
    Warrior,
}

impl BattalionKind {
    /// サーバーが返す兵種文字列を解釈する。
    ///
    /// 大文字小文字は区別しない。`"warrior"` 以外は全て弓兵として扱う。
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("warrior") {
            BattalionKind::Warrior
        } else {
            BattalionKind::Archer
        }
    }

    /// スプライトシートの行番号。
    ///
    /// 防衛側のシートは攻撃側と行の並びが逆になっている。
    pub fn sprite_row(self, group: Group) -> u8 {
        match (group, self) {
            (Group::Attacker, BattalionKind::Warrior) => 0,
            (Group::Attacker, BattalionKind::Archer) => 1,
            (Group::Defender, BattalionKind::Warrior) => 1,
            (Group::Defender, BattalionKind::Archer) => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// AI手番リクエスト
// ---------------------------------------------------------------------------

/// 盤面上の大隊スナップショット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattalionSnapshot {
    /// 大隊ID
    pub id: u32,
    /// 兵種
    #[serde(rename = "type")]
    pub kind: BattalionKind,
    /// ワールド座標 `[x, y]`
    pub position: [f32; 2],
    /// 残存兵数
    pub troop_count: f32,
}

/// 直近の移動指示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 指示対象の大隊ID
    pub battalion_id: u32,
    /// 移動先 `[x, y]`
    pub target: [f32; 2],
}

/// AI手番APIへのリクエスト（`game-state` スキーマ）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMoveRequest {
    /// 攻撃側の大隊
    pub attackers: Vec<BattalionSnapshot>,
    /// 防衛側の大隊
    pub defenders: Vec<BattalionSnapshot>,
    /// 城壁の残り耐久値
    pub wall_health: f32,
    /// 直近の移動指示
    pub last_moves: Vec<MoveRecord>,
    /// ワールドサイズ `[幅, 高さ]`
    pub world_size: [f32; 2],
}

/// プロンプトAPIへのリクエスト（`prompt` スキーマ）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// プロンプト本文
    pub prompt: String,
}

// ---------------------------------------------------------------------------
// スキーマ選択
// ---------------------------------------------------------------------------

/// エンドポイントが受け付けるリクエストスキーマ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestSchema {
    /// [`AiMoveRequest`]
    GameState,
    /// [`PromptRequest`]
    Prompt,
}

impl fmt::Display for RequestSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestSchema::GameState => f.write_str("game-state"),
            RequestSchema::Prompt => f.write_str("prompt"),
        }
    }
}

impl FromStr for RequestSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "game-state" | "game_state" => Ok(RequestSchema::GameState),
            "prompt" => Ok(RequestSchema::Prompt),
            other => Err(format!("不明なリクエストスキーマ: {other}")),
        }
    }
}

/// 型付きリクエストペイロード。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestPayload {
    /// 盤面スナップショット
    GameState(AiMoveRequest),
    /// プロンプト
    Prompt(PromptRequest),
}

impl RequestPayload {
    /// このペイロードのスキーマ。
    pub fn schema(&self) -> RequestSchema {
        match self {
            RequestPayload::GameState(_) => RequestSchema::GameState,
            RequestPayload::Prompt(_) => RequestSchema::Prompt,
        }
    }
}

impl From<AiMoveRequest> for RequestPayload {
    fn from(req: AiMoveRequest) -> Self {
        RequestPayload::GameState(req)
    }
}

impl From<PromptRequest> for RequestPayload {
    fn from(req: PromptRequest) -> Self {
        RequestPayload::Prompt(req)
    }
}

// ---------------------------------------------------------------------------
// 初期盤面レスポンス
// ---------------------------------------------------------------------------

/// 初期盤面APIのレスポンス。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialGameState {
    /// プレイヤー側の初期配置
    pub user_init_data: SideInitData,
    /// AI側の初期配置
    pub ai_init_data: SideInitData,
}

/// 片陣営の初期配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideInitData {
    /// 大隊一覧
    pub battalions: Vec<BattalionInit>,
}

/// 初期配置の大隊。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattalionInit {
    /// 兵種ラベル（"Warrior", "archer" 等）
    #[serde(rename = "type")]
    pub kind: String,
    /// 各兵士の座標 `[x, y]`
    pub troops: Vec<[f32; 2]>,
    /// 大隊の重心（サーバーによっては省略される）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_center: Option<[f32; 2]>,
}

/// 大隊のスポーン情報。
#[derive(Debug, Clone, PartialEq)]
pub struct BattalionSpawnInfo {
    /// 大隊ID（1始まり、陣営をまたいで連番）
    pub id: u32,
    /// 陣営
    pub group: Group,
    /// 兵種
    pub kind: BattalionKind,
    /// 各兵士の座標
    pub troops: Vec<[f32; 2]>,
}

/// 両陣営のスポーン計画。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpawnPlan {
    /// 攻撃側
    pub attackers: Vec<BattalionSpawnInfo>,
    /// 防衛側
    pub defenders: Vec<BattalionSpawnInfo>,
}

impl InitialGameState {
    /// 初期盤面をスポーン計画に変換する。
    ///
    /// プレイヤー側が攻撃、AI側が防衛となる。IDはプレイヤー側から順に1始まりで振る。
    pub fn spawn_plan(&self) -> SpawnPlan {
        let mut next_id = 0u32;
        let mut convert = |group: Group, side: &SideInitData| -> Vec<BattalionSpawnInfo> {
            side.battalions
                .iter()
                .map(|b| {
                    next_id += 1;
                    BattalionSpawnInfo {
                        id: next_id,
                        group,
                        kind: BattalionKind::from_label(&b.kind),
                        troops: b.troops.clone(),
                    }
                })
                .collect()
        };

        let attackers = convert(Group::Attacker, &self.user_init_data);
        let defenders = convert(Group::Defender, &self.ai_init_data);
        SpawnPlan {
            attackers,
            defenders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_initial_state() -> serde_json::Value {
        serde_json::json!({
            "userInitData": {
                "battalions": [
                    { "type": "Warrior", "troops": [[1.0, 2.0], [1.5, 2.0]], "avgCenter": [1.25, 2.0] },
                    { "type": "ARCHER", "troops": [[3.0, 4.0]] }
                ]
            },
            "aiInitData": {
                "battalions": [
                    { "type": "warrior", "troops": [[10.0, 4.0]] }
                ]
            }
        })
    }

    /// 初期盤面のIDが陣営をまたいで連番になることを確認
    #[test]
    fn test_spawn_plan_ids_and_groups() {
        let state: InitialGameState = serde_json::from_value(sample_initial_state()).unwrap();
        let plan = state.spawn_plan();

        assert_eq!(plan.attackers.len(), 2);
        assert_eq!(plan.defenders.len(), 1);
        assert_eq!(plan.attackers[0].id, 1);
        assert_eq!(plan.attackers[1].id, 2);
        assert_eq!(plan.defenders[0].id, 3);
        assert!(plan.attackers.iter().all(|b| b.group == Group::Attacker));
        assert_eq!(plan.defenders[0].group, Group::Defender);
        assert_eq!(plan.attackers[0].troops, vec![[1.0, 2.0], [1.5, 2.0]]);
    }

    /// 兵種ラベルが大文字小文字を区別せずに解釈されることを確認
    #[test]
    fn test_kind_label_case_insensitive() {
        let state: InitialGameState = serde_json::from_value(sample_initial_state()).unwrap();
        let plan = state.spawn_plan();

        assert_eq!(plan.attackers[0].kind, BattalionKind::Warrior);
        assert_eq!(plan.attackers[1].kind, BattalionKind::Archer);
        assert_eq!(plan.defenders[0].kind, BattalionKind::Warrior);
        assert_eq!(BattalionKind::from_label("knight"), BattalionKind::Archer);
    }

    /// 防衛側のスプライト行が反転していることを確認
    #[test]
    fn test_sprite_row_mirrored_for_defenders() {
        assert_eq!(BattalionKind::Warrior.sprite_row(Group::Attacker), 0);
        assert_eq!(BattalionKind::Warrior.sprite_row(Group::Defender), 1);
        assert_eq!(BattalionKind::Archer.sprite_row(Group::Attacker), 1);
        assert_eq!(BattalionKind::Archer.sprite_row(Group::Defender), 0);
    }

    /// AI手番リクエストが規定のフィールド名でシリアライズされることを確認
    #[test]
    fn test_ai_move_request_field_names() {
        let req = AiMoveRequest {
            attackers: vec![BattalionSnapshot {
                id: 1,
                kind: BattalionKind::Warrior,
                position: [40.0, 22.5],
                troop_count: 3.0,
            }],
            defenders: vec![],
            wall_health: 500.0,
            last_moves: vec![MoveRecord {
                battalion_id: 1,
                target: [50.0, 22.5],
            }],
            world_size: [80.0, 45.0],
        };

        let value = serde_json::to_value(RequestPayload::from(req)).unwrap();
        assert_eq!(value["attackers"][0]["type"], "warrior");
        assert_eq!(value["wall_health"], 500.0);
        assert_eq!(value["last_moves"][0]["battalion_id"], 1);
        assert_eq!(value["world_size"], serde_json::json!([80.0, 45.0]));
        assert!(value.get("prompt").is_none());
    }

    /// スキーマ文字列の解釈
    #[test]
    fn test_request_schema_from_str() {
        assert_eq!("game-state".parse::<RequestSchema>(), Ok(RequestSchema::GameState));
        assert_eq!(" Prompt ".parse::<RequestSchema>(), Ok(RequestSchema::Prompt));
        assert!("graphql".parse::<RequestSchema>().is_err());

        let payload = RequestPayload::from(PromptRequest {
            prompt: "next move?".to_string(),
        });
        assert_eq!(payload.schema(), RequestSchema::Prompt);
        assert_eq!(payload.schema().to_string(), "prompt");
    }
}
