use serde::{Deserialize, Serialize};

use super::state::Card;
use crate::log::content_warning;

/// buff 与被动效果监听的回合事件。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    TurnStart,
    TurnEnd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    Enemy,
    #[serde(rename = "self")]
    Actor,
}

impl Default for EffectTarget {
    fn default() -> Self {
        EffectTarget::Enemy
    }
}

/// 效果类型是封闭集合；数据里出现未知标签时保留原文，结算时记录并跳过。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum EffectKind {
    Damage,
    Block,
    Draw,
    Energy,
    ApplyBuff,
    Unrecognized(String),
}

impl EffectKind {
    pub fn as_str(&self) -> &str {
        match self {
            EffectKind::Damage => "damage",
            EffectKind::Block => "block",
            EffectKind::Draw => "draw",
            EffectKind::Energy => "energy",
            EffectKind::ApplyBuff => "apply_buff",
            EffectKind::Unrecognized(tag) => tag,
        }
    }
}

impl From<String> for EffectKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "damage" => EffectKind::Damage,
            "block" => EffectKind::Block,
            "draw" => EffectKind::Draw,
            "energy" => EffectKind::Energy,
            "apply_buff" => EffectKind::ApplyBuff,
            _ => EffectKind::Unrecognized(tag),
        }
    }
}

impl From<EffectKind> for String {
    fn from(kind: EffectKind) -> Self {
        kind.as_str().to_string()
    }
}

/// 卡牌上的一条声明式效果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardEffect {
    pub kind: EffectKind,
    #[serde(default)]
    pub value: i32,
    #[serde(default)]
    pub target: EffectTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buff_id: Option<String>,
}

impl CardEffect {
    pub fn new(kind: EffectKind, value: i32, target: EffectTarget) -> Self {
        Self {
            kind,
            value,
            target,
            buff_id: None,
        }
    }

    pub fn damage(value: i32) -> Self {
        Self::new(EffectKind::Damage, value, EffectTarget::Enemy)
    }

    pub fn block(value: i32) -> Self {
        Self::new(EffectKind::Block, value, EffectTarget::Actor)
    }

    pub fn draw(count: i32) -> Self {
        Self::new(EffectKind::Draw, count, EffectTarget::Actor)
    }

    pub fn energy(amount: i32) -> Self {
        Self::new(EffectKind::Energy, amount, EffectTarget::Actor)
    }

    pub fn apply_buff(buff_id: impl Into<String>) -> Self {
        Self {
            kind: EffectKind::ApplyBuff,
            value: 1,
            target: EffectTarget::Actor,
            buff_id: Some(buff_id.into()),
        }
    }
}

/// 手牌中持有时在指定事件触发的被动效果（例如诅咒牌）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassiveEffect {
    pub trigger: TriggerEvent,
    pub kind: EffectKind,
    pub value: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectBundle {
    pub damage_to_target: i32,
    pub block_to_actor: i32,
    pub buffs_to_apply: Vec<String>,
    pub draw_count: u32,
    pub energy_delta: i32,
}

impl EffectBundle {
    fn accumulate(&mut self, card_key: &str, effect: &CardEffect) {
        match &effect.kind {
            EffectKind::Damage => self.damage_to_target += effect.value.max(0),
            EffectKind::Block => self.block_to_actor += effect.value.max(0),
            EffectKind::Draw => self.draw_count += effect.value.max(0) as u32,
            EffectKind::Energy => self.energy_delta += effect.value,
            EffectKind::ApplyBuff => match &effect.buff_id {
                Some(buff_id) => self.buffs_to_apply.push(buff_id.clone()),
                None => content_warning(&format!(
                    "card `{card_key}` has an apply_buff effect without buff_id; effect skipped"
                )),
            },
            EffectKind::Unrecognized(tag) => content_warning(&format!(
                "card `{card_key}` uses unknown effect kind `{tag}`; effect skipped"
            )),
        }
    }
}

/// 按声明顺序汇总卡牌的全部效果；同类效果累加（3×3 伤害 = 9）。
pub fn resolve(card: &Card) -> EffectBundle {
    let mut bundle = EffectBundle::default();
    for effect in &card.effects {
        bundle.accumulate(&card.key, effect);
    }
    bundle
}
