//! 表现层节奏：规则本身从不等待，由调用方在延迟后触发下一步。

use serde::{Deserialize, Serialize};

use super::config::RulesConfig;
use super::rules::GameAction;
use super::state::{BattlePhase, GameState};

/// 调用方应在 `delay_ms` 毫秒后执行的下一个动作。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledStep {
    pub action: GameAction,
    pub delay_ms: u32,
}

pub fn follow_up(state: &GameState, config: &RulesConfig) -> Option<ScheduledStep> {
    match state.phase {
        BattlePhase::EnemyTurn => Some(ScheduledStep {
            action: GameAction::EnemyAct,
            delay_ms: config.pacing.enemy_turn_delay_ms,
        }),
        BattlePhase::VillageEntrance => Some(ScheduledStep {
            action: GameAction::EnterVillage,
            delay_ms: config.pacing.village_entrance_delay_ms,
        }),
        _ => None,
    }
}
