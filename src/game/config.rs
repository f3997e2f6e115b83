//! 数值配置。所有平衡常数都来自这里，而不是写死在规则里。

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid rules config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 目的地类型的抽取概率（绝对概率，总和小于 1 时剩余部分回落为普通战斗）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DestinationWeights {
    pub elite: f64,
    pub rest: f64,
    pub shop: f64,
    pub event: f64,
}

impl Default for DestinationWeights {
    fn default() -> Self {
        Self {
            elite: 0.2,
            rest: 0.25,
            shop: 0.2,
            event: 0.25,
        }
    }
}

/// 表现层的节奏延迟，核心规则从不等待它们。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    pub enemy_turn_delay_ms: u32,
    pub village_entrance_delay_ms: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enemy_turn_delay_ms: 800,
            village_entrance_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub starting_hp: i32,
    pub starting_energy: i32,
    pub starting_gold: u32,
    pub hand_size: usize,
    pub total_rounds: u32,
    /// 这些回合提供 3 个目的地选项，其余回合提供 2 个。
    pub wide_choice_rounds: Vec<u32>,
    pub elite_min_round: u32,
    pub shop_min_round: u32,
    pub destination_weights: DestinationWeights,
    pub rest_heal_percent: u32,
    pub reward_cards_normal: usize,
    pub reward_cards_elite: usize,
    pub gold_normal: u32,
    pub gold_elite: u32,
    pub gold_boss: u32,
    pub intent_growth_per_round: i32,
    pub monster_buff_start_round: u32,
    pub village_rounds: Vec<u32>,
    pub accessory_offer_count: usize,
    pub companion_offer_count: usize,
    pub pacing: PacingConfig,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            starting_hp: 80,
            starting_energy: 3,
            starting_gold: 99,
            hand_size: 5,
            total_rounds: 7,
            wide_choice_rounds: vec![3, 5],
            elite_min_round: 2,
            shop_min_round: 2,
            destination_weights: DestinationWeights::default(),
            rest_heal_percent: 30,
            reward_cards_normal: 3,
            reward_cards_elite: 4,
            gold_normal: 15,
            gold_elite: 30,
            gold_boss: 100,
            intent_growth_per_round: 1,
            monster_buff_start_round: 4,
            village_rounds: vec![4],
            accessory_offer_count: 3,
            companion_offer_count: 2,
            pacing: PacingConfig::default(),
        }
    }
}

impl RulesConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 非 boss 回合的选项数量。boss 回合由 `progression::generate` 按本局总回合数判断。
    pub fn option_count(&self, round: u32) -> usize {
        if self.wide_choice_rounds.contains(&round) {
            3
        } else {
            2
        }
    }

    pub fn is_village_round(&self, round: u32) -> bool {
        self.village_rounds.contains(&round)
    }
}
