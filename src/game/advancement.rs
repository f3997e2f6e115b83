//! 职业进阶：基础职业在卡组满足标签数量要求时解锁进阶职业。

use super::content::{ClassDefinition, ClassId, ClassTier, ContentCatalog};
use super::state::{AdvancementOffer, Card, Player};
use crate::log::content_warning;

/// 当前职业可以进阶到的全部职业，按职业 id 排序。
pub fn available_advancements(
    catalog: &ContentCatalog,
    current_class: &str,
    full_deck: &[Card],
) -> Vec<ClassId> {
    let Some(current) = catalog.class(current_class) else {
        content_warning(&format!("player class `{current_class}` has no definition"));
        return Vec::new();
    };
    if current.tier != ClassTier::Base {
        return Vec::new();
    }

    catalog
        .classes()
        .filter(|class| class.tier == ClassTier::Advanced)
        .filter(|class| match &class.requirement {
            Some(requirement) => {
                let tagged = full_deck
                    .iter()
                    .filter(|card| card.has_tag(&requirement.tag))
                    .count();
                tagged >= requirement.min_cards
            }
            None => false,
        })
        .map(|class| class.id.clone())
        .collect()
}

/// 只有一个候选时自动选中；没有候选则不进入进阶阶段。
pub fn offer(candidates: Vec<ClassId>) -> Option<AdvancementOffer> {
    match candidates.len() {
        0 => None,
        1 => Some(AdvancementOffer {
            auto_selected: candidates.first().cloned(),
            candidates,
        }),
        _ => Some(AdvancementOffer {
            candidates,
            auto_selected: None,
        }),
    }
}

pub fn apply(player: &mut Player, target: &ClassDefinition) {
    player.character_class = target.id.clone();
    player.buffs.clear_all();
}
