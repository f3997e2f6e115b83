//! buff 账本：玩家身上按施加顺序排列的计时/叠层修正。

use serde::{Deserialize, Serialize};

use super::content::{BuffDuration, ContentCatalog};
use super::effects::{EffectKind, TriggerEvent};
use crate::log::content_warning;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveBuff {
    pub buff_id: String,
    pub stacks: u32,
    pub duration: BuffDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffApplication {
    Added,
    Stacked { stacks: u32 },
    /// 不可叠加的 buff 重复施加，忽略。
    Rejected,
    UnknownBuff,
}

/// 某个事件下所有 buff 触发效果的汇总值。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerTotals {
    pub block_gained: i32,
    pub damage_dealt: i32,
    pub cards_drawn: i32,
    pub energy_gained: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct BuffLedger {
    entries: Vec<ActiveBuff>,
}

impl BuffLedger {
    pub fn entries(&self) -> &[ActiveBuff] {
        &self.entries
    }

    pub fn get(&self, buff_id: &str) -> Option<&ActiveBuff> {
        self.entries.iter().find(|buff| buff.buff_id == buff_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 叠层不刷新持续时间。
    pub fn apply(&mut self, catalog: &ContentCatalog, buff_id: &str) -> BuffApplication {
        let Some(definition) = catalog.buff(buff_id) else {
            content_warning(&format!("unknown buff `{buff_id}`; application skipped"));
            return BuffApplication::UnknownBuff;
        };

        if let Some(existing) = self.entries.iter_mut().find(|buff| buff.buff_id == buff_id) {
            if !definition.stackable {
                return BuffApplication::Rejected;
            }
            existing.stacks += 1;
            return BuffApplication::Stacked {
                stacks: existing.stacks,
            };
        }

        self.entries.push(ActiveBuff {
            buff_id: buff_id.to_string(),
            stacks: 1,
            duration: definition.duration,
        });
        BuffApplication::Added
    }

    pub fn collect_trigger_effects(
        &self,
        catalog: &ContentCatalog,
        event: TriggerEvent,
    ) -> TriggerTotals {
        let mut totals = TriggerTotals::default();
        for buff in &self.entries {
            let Some(definition) = catalog.buff(&buff.buff_id) else {
                content_warning(&format!("active buff `{}` has no definition", buff.buff_id));
                continue;
            };
            let stacks = buff.stacks as i32;
            for trigger in definition.triggers.iter().filter(|t| t.event == event) {
                let amount = trigger.value * stacks;
                match &trigger.kind {
                    EffectKind::Block => totals.block_gained += amount,
                    EffectKind::Damage => totals.damage_dealt += amount,
                    EffectKind::Draw => totals.cards_drawn += amount,
                    EffectKind::Energy => totals.energy_gained += amount,
                    other => content_warning(&format!(
                        "buff `{}` triggers unsupported effect `{}`; skipped",
                        buff.buff_id,
                        other.as_str()
                    )),
                }
            }
        }
        totals
    }

    /// 回合计时的 buff 减 1，归零即整条移除；战斗级 buff 不受影响。返回过期的 buff id。
    pub fn decay_durations(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        self.entries.retain_mut(|buff| match &mut buff.duration {
            BuffDuration::Turns(remaining) => {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    expired.push(buff.buff_id.clone());
                    false
                } else {
                    true
                }
            }
            BuffDuration::Combat => true,
        });
        expired
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }
}
