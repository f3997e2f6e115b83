//! 村庄：饰品、设施路由、酒馆伙伴与血之祭坛契约。

use rand::seq::IteratorRandom;
use rand::Rng;

use super::config::RulesConfig;
use super::content::{
    AccessoryDefinition, AccessoryEffect, AltarBoon, AltarPenalty, AltarRewardDefinition,
    CompanionDefinition, ContentCatalog, FacilityKind, RegionDefinition,
};
use super::rules::RuleError;
use super::state::{GameEvent, GameState, RunState};
use crate::log::content_warning;

/// 选择设施后的去向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityRoute {
    Tavern,
    BloodAltar,
    Leave,
}

/// 抽取尚未拥有的饰品，按 id 顺序返回。
pub fn roll_accessory_offers<R: Rng + ?Sized>(
    catalog: &ContentCatalog,
    run: &RunState,
    config: &RulesConfig,
    rng: &mut R,
) -> Vec<String> {
    let mut offers: Vec<String> = catalog
        .accessory_ids()
        .filter(|id| !run.accessories.contains(id))
        .cloned()
        .choose_multiple(rng, config.accessory_offer_count);
    offers.sort();
    offers
}

pub fn roll_companion_offers<R: Rng + ?Sized>(
    catalog: &ContentCatalog,
    run: &RunState,
    config: &RulesConfig,
    rng: &mut R,
) -> Vec<String> {
    let mut offers: Vec<String> = catalog
        .companion_ids()
        .filter(|id| !run.companions.contains(id))
        .cloned()
        .choose_multiple(rng, config.companion_offer_count);
    offers.sort();
    offers
}

/// 饰品加入本局；生命、能量、金币效果立即生效，开战护甲留到每场战斗开始。
pub fn acquire_accessory(
    state: &mut GameState,
    accessory: &AccessoryDefinition,
    events: &mut Vec<GameEvent>,
) {
    state.run.accessories.push(accessory.id.clone());
    match accessory.effect {
        AccessoryEffect::MaxHp { amount } => state.player.raise_max_hp(amount),
        AccessoryEffect::MaxEnergy { amount } => {
            state.player.max_energy = (state.player.max_energy + amount).max(0);
            state.player.energy = state.player.energy.min(state.player.max_energy);
        }
        AccessoryEffect::Gold { amount } => state.player.gold += amount,
        AccessoryEffect::CombatStartBlock { .. } => {}
    }
    events.push(GameEvent::AccessoryAcquired {
        accessory_id: accessory.id.clone(),
    });
}

/// 区域未登记或目录里不存在的设施一律视为离开村庄。
pub fn route_facility(
    catalog: &ContentCatalog,
    region: &RegionDefinition,
    facility_id: &str,
) -> FacilityRoute {
    if !region.facilities.iter().any(|id| id == facility_id) {
        return FacilityRoute::Leave;
    }
    match catalog.facility(facility_id).map(|facility| facility.kind) {
        Some(FacilityKind::Tavern) => FacilityRoute::Tavern,
        Some(FacilityKind::BloodAltar) => FacilityRoute::BloodAltar,
        None => {
            content_warning(&format!("facility `{facility_id}` has no definition"));
            FacilityRoute::Leave
        }
    }
}

/// 伙伴加入本局，其绑定的卡牌直接进入完整卡组。
pub fn recruit_companion(
    state: &mut GameState,
    catalog: &ContentCatalog,
    companion: &CompanionDefinition,
    events: &mut Vec<GameEvent>,
) {
    state.run.companions.push(companion.id.clone());
    events.push(GameEvent::CompanionJoined {
        companion_id: companion.id.clone(),
    });
    match catalog.card(&companion.card_key) {
        Some(definition) => {
            let card_id = state.add_card_to_deck(definition);
            events.push(GameEvent::CardAdded {
                card_id,
                card_key: definition.key.clone(),
            });
        }
        None => content_warning(&format!(
            "companion `{}` references unknown card `{}`",
            companion.id, companion.card_key
        )),
    }
}

/// 提交祭坛选择。先校验全部 id，任何未知 id 都使整次提交失败且不修改状态。
/// 返回是否激活了祭坛（至少选了一项）。
pub fn activate_altar(
    state: &mut GameState,
    catalog: &ContentCatalog,
    reward_ids: &[String],
    events: &mut Vec<GameEvent>,
) -> Result<bool, RuleError> {
    let mut selected: Vec<&AltarRewardDefinition> = Vec::new();
    for reward_id in reward_ids {
        if selected.iter().any(|reward| &reward.id == reward_id) {
            continue;
        }
        let reward = catalog
            .altar_reward(reward_id)
            .ok_or_else(|| RuleError::UnknownAltarReward {
                reward_id: reward_id.clone(),
            })?;
        selected.push(reward);
    }

    if selected.is_empty() {
        return Ok(false);
    }

    for reward in &selected {
        apply_boon(state, catalog, &reward.boon, events);
        apply_penalty(state, catalog, &reward.penalty, events);
    }

    let bonus_energy = selected.len() == catalog.altar_rewards().len();
    if bonus_energy {
        state.player.max_energy += 1;
    }
    state.run.altar_activated = true;
    events.push(GameEvent::AltarActivated {
        reward_ids: selected.iter().map(|reward| reward.id.clone()).collect(),
        bonus_energy,
    });
    Ok(true)
}

fn apply_boon(
    state: &mut GameState,
    catalog: &ContentCatalog,
    boon: &AltarBoon,
    events: &mut Vec<GameEvent>,
) {
    match boon {
        AltarBoon::Gold { amount } => state.player.gold += amount,
        AltarBoon::MaxHp { amount } => state.player.raise_max_hp(*amount),
        AltarBoon::Accessory { accessory_id } => match catalog.accessory(accessory_id) {
            Some(_) if state.run.accessories.contains(accessory_id) => {}
            Some(accessory) => acquire_accessory(state, accessory, events),
            None => content_warning(&format!(
                "altar boon references unknown accessory `{accessory_id}`"
            )),
        },
    }
}

fn apply_penalty(
    state: &mut GameState,
    catalog: &ContentCatalog,
    penalty: &AltarPenalty,
    events: &mut Vec<GameEvent>,
) {
    match penalty {
        AltarPenalty::HpCost { amount } => {
            state.player.hp = (state.player.hp - (*amount).max(0)).max(1);
        }
        AltarPenalty::GoldCost { amount } => {
            state.player.gold = state.player.gold.saturating_sub(*amount);
        }
        AltarPenalty::CurseCard { card_key } => match catalog.card(card_key) {
            Some(definition) => {
                let card_id = state.add_card_to_deck(definition);
                events.push(GameEvent::CardAdded {
                    card_id,
                    card_key: card_key.clone(),
                });
            }
            None => content_warning(&format!("altar penalty references unknown card `{card_key}`")),
        },
        AltarPenalty::MonsterHpBuff { percent } => state.run.monster_hp_buff += percent,
        AltarPenalty::MonsterAttackBuff { percent } => state.run.monster_attack_buff += percent,
    }
}
