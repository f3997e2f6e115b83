//! 战斗引擎：抽牌堆/手牌/弃牌堆、出牌结算、敌人意图与回合推进。

use rand::seq::SliceRandom;
use rand::Rng;

use super::buffs::BuffApplication;
use super::config::RulesConfig;
use super::content::{AccessoryEffect, ContentCatalog, EnemyDefinition};
use super::effects::{self, EffectKind, TriggerEvent};
use super::rules::RuleError;
use super::state::{
    BattleState, Card, CardId, CardType, CombatCues, Combatant, Enemy, GameEvent, GameState,
    Intent, Player, RewardOffer, RunState,
};
use crate::log::content_warning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatOutcome {
    Continue,
    EnemyDefeated,
    PlayerDefeated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawReport {
    pub drawn: usize,
    pub reshuffles: u32,
}

/// 百分比加成先乘后向下取整。
pub fn scale(value: i32, percent: f64) -> i32 {
    (f64::from(value) * (1.0 + percent)).floor() as i32
}

/// 从抽牌堆末尾抽牌；抽空时把整个弃牌堆洗回抽牌堆继续抽，两者都空则静默停止。
pub fn draw<R: Rng + ?Sized>(
    battle: &mut BattleState,
    count: usize,
    rng: &mut R,
    events: &mut Vec<GameEvent>,
) -> DrawReport {
    let mut report = DrawReport::default();
    for _ in 0..count {
        if battle.draw_pile.is_empty() {
            if battle.discard.is_empty() {
                break;
            }
            let mut pile = std::mem::take(&mut battle.discard);
            pile.shuffle(rng);
            events.push(GameEvent::DeckReshuffled { cards: pile.len() });
            battle.draw_pile = pile;
            battle.cues.shuffling = true;
            report.reshuffles += 1;
        }
        if let Some(card) = battle.draw_pile.pop() {
            events.push(GameEvent::CardDrawn { card_id: card.id });
            battle.hand.push(card);
            report.drawn += 1;
        }
    }
    report
}

/// 结算出牌后延迟的抽牌效果。
pub fn flush_pending_draws<R: Rng + ?Sized>(
    battle: &mut BattleState,
    rng: &mut R,
    events: &mut Vec<GameEvent>,
) -> DrawReport {
    let count = std::mem::take(&mut battle.pending_draws) as usize;
    draw(battle, count, rng, events)
}

/// 按回合取行动表中的意图，叠加回合成长；攻击意图在怪物加成生效时再乘百分比。
pub fn scheduled_intent(
    definition: &EnemyDefinition,
    turn: u32,
    run: &RunState,
    config: &RulesConfig,
) -> Intent {
    if definition.intents.is_empty() {
        content_warning(&format!("enemy `{}` has an empty intent schedule", definition.key));
        return Intent::Buff { value: 0 };
    }
    let index = turn.saturating_sub(1) as usize % definition.intents.len();
    let growth = config.intent_growth_per_round * run.round.saturating_sub(1) as i32;
    match definition.intents[index] {
        Intent::Attack { value } => {
            let mut value = value + growth;
            if run.monster_buffs_active(config.monster_buff_start_round) {
                value = scale(value, run.monster_attack_buff);
            }
            Intent::Attack { value }
        }
        Intent::Defend { value } => Intent::Defend {
            value: value + growth,
        },
        buff @ Intent::Buff { .. } => buff,
    }
}

fn apply_buffs(
    player: &mut Player,
    catalog: &ContentCatalog,
    buff_ids: &[String],
    events: &mut Vec<GameEvent>,
) {
    for buff_id in buff_ids {
        let stacks = match player.buffs.apply(catalog, buff_id) {
            BuffApplication::Added => 1,
            BuffApplication::Stacked { stacks } => stacks,
            BuffApplication::Rejected | BuffApplication::UnknownBuff => continue,
        };
        events.push(GameEvent::BuffApplied {
            buff_id: buff_id.clone(),
            stacks,
        });
    }
}

fn strike_enemy(battle: &mut BattleState, amount: i32, events: &mut Vec<GameEvent>) {
    let report = battle.enemy.take_damage(amount);
    battle.cues.enemy_hit = report.taken > 0;
    events.push(GameEvent::DamageResolved {
        target: Combatant::Enemy,
        amount: report.taken,
        absorbed: report.absorbed,
    });
}

fn guard_player(player: &mut Player, amount: i32, events: &mut Vec<GameEvent>) {
    if amount <= 0 {
        return;
    }
    player.gain_block(amount);
    events.push(GameEvent::BlockGained {
        target: Combatant::Player,
        amount,
    });
}

/// 诅咒牌在回合开始时对持有者造成的被动伤害总和。
pub fn curse_damage_in_hand(hand: &[Card]) -> i32 {
    hand.iter()
        .filter(|card| card.card_type == CardType::Curse)
        .filter_map(|card| card.passive.as_ref())
        .filter(|passive| {
            passive.trigger == TriggerEvent::TurnStart && passive.kind == EffectKind::Damage
        })
        .map(|passive| passive.value.max(0))
        .sum()
}

/// 开始一场新战斗：从完整卡组复制并洗出抽牌堆，揭示第一个意图并抽起手牌。
pub fn start_encounter<R: Rng + ?Sized>(
    state: &mut GameState,
    catalog: &ContentCatalog,
    config: &RulesConfig,
    rng: &mut R,
    definition: &EnemyDefinition,
    elite: bool,
    boss: bool,
    events: &mut Vec<GameEvent>,
) {
    let mut max_hp = definition.max_hp;
    if state.run.monster_buffs_active(config.monster_buff_start_round) {
        max_hp = scale(max_hp, state.run.monster_hp_buff).max(1);
    }
    let intent = scheduled_intent(definition, 1, &state.run, config);
    let enemy = Enemy {
        key: definition.key.clone(),
        name: definition.name.clone(),
        hp: max_hp,
        max_hp,
        block: 0,
        intent,
    };

    let mut pile = state.deck.clone();
    pile.shuffle(rng);
    let mut battle = BattleState::new(enemy, pile, elite, boss);

    state.player.buffs.clear_all();
    state.player.block = 0;
    state.player.energy = state.player.max_energy;

    events.push(GameEvent::EncounterStarted {
        enemy_key: definition.key.clone(),
        elite,
        boss,
    });
    events.push(GameEvent::IntentRevealed { intent });

    let opening_block: i32 = state
        .run
        .accessories
        .iter()
        .filter_map(|id| catalog.accessory(id))
        .map(|accessory| match accessory.effect {
            AccessoryEffect::CombatStartBlock { amount } => amount,
            _ => 0,
        })
        .sum();
    guard_player(&mut state.player, opening_block, events);

    draw(&mut battle, config.hand_size, rng, events);
    state.battle = Some(battle);
}

/// 打出一张手牌。所有拒绝都发生在修改状态之前。
pub fn play_card<R: Rng + ?Sized>(
    state: &mut GameState,
    catalog: &ContentCatalog,
    rng: &mut R,
    card_id: CardId,
    events: &mut Vec<GameEvent>,
) -> Result<CombatOutcome, RuleError> {
    let GameState { player, battle, .. } = state;
    let battle = battle.as_mut().ok_or(RuleError::NoActiveBattle)?;

    let index = battle
        .find_card_in_hand_index(card_id)
        .ok_or(RuleError::CardNotFound { card_id })?;
    let pending = &battle.hand[index];
    if pending.card_type == CardType::Curse {
        return Err(RuleError::Unplayable { card_id });
    }
    if player.energy < pending.cost {
        return Err(RuleError::InsufficientEnergy {
            required: pending.cost,
            available: player.energy,
        });
    }

    battle.cues = CombatCues::default();
    let card = battle.hand.remove(index);
    player.energy -= card.cost;
    events.push(GameEvent::CardPlayed { card_id });

    let bundle = effects::resolve(&card);
    if bundle.damage_to_target > 0 {
        battle.cues.player_attacking = true;
        strike_enemy(battle, bundle.damage_to_target, events);
    }
    guard_player(player, bundle.block_to_actor, events);
    apply_buffs(player, catalog, &bundle.buffs_to_apply, events);
    player.energy = (player.energy + bundle.energy_delta).max(0);

    if card.leaves_play() {
        events.push(GameEvent::CardExhausted { card_id });
        battle.exhausted.push(card);
    } else {
        battle.discard.push(card);
    }

    if battle.enemy.is_defeated() {
        battle.pending_draws = 0;
        return Ok(CombatOutcome::EnemyDefeated);
    }

    battle.pending_draws += bundle.draw_count;
    flush_pending_draws(battle, rng, events);
    Ok(CombatOutcome::Continue)
}

/// 回合结束：触发 turn_end buff，整手牌进入弃牌堆。
pub fn end_turn(
    state: &mut GameState,
    catalog: &ContentCatalog,
    events: &mut Vec<GameEvent>,
) -> Result<CombatOutcome, RuleError> {
    let GameState { player, battle, .. } = state;
    let battle = battle.as_mut().ok_or(RuleError::NoActiveBattle)?;
    battle.cues = CombatCues::default();

    let totals = player.buffs.collect_trigger_effects(catalog, TriggerEvent::TurnEnd);
    guard_player(player, totals.block_gained, events);
    if totals.damage_dealt > 0 {
        strike_enemy(battle, totals.damage_dealt, events);
    }

    let hand = std::mem::take(&mut battle.hand);
    battle.discard.extend(hand);
    events.push(GameEvent::TurnEnded { turn: battle.turn });

    if battle.enemy.is_defeated() {
        Ok(CombatOutcome::EnemyDefeated)
    } else {
        Ok(CombatOutcome::Continue)
    }
}

/// 敌人执行当前意图；玩家存活时推进到下一回合并抽新手牌。
pub fn enemy_act<R: Rng + ?Sized>(
    state: &mut GameState,
    catalog: &ContentCatalog,
    config: &RulesConfig,
    rng: &mut R,
    events: &mut Vec<GameEvent>,
) -> Result<CombatOutcome, RuleError> {
    let GameState {
        player, battle, run, ..
    } = state;
    let battle = battle.as_mut().ok_or(RuleError::NoActiveBattle)?;
    battle.cues = CombatCues::default();

    match battle.enemy.intent {
        Intent::Attack { value } => {
            battle.cues.enemy_attacking = true;
            let report = player.take_damage(value);
            battle.cues.player_hit = report.taken > 0;
            events.push(GameEvent::DamageResolved {
                target: Combatant::Player,
                amount: report.taken,
                absorbed: report.absorbed,
            });
        }
        Intent::Defend { value } => {
            battle.enemy.block += value.max(0);
            events.push(GameEvent::BlockGained {
                target: Combatant::Enemy,
                amount: value.max(0),
            });
        }
        Intent::Buff { value } => events.push(GameEvent::EnemyBuffed { value }),
    }

    if player.is_defeated() {
        events.push(GameEvent::PlayerDefeated);
        return Ok(CombatOutcome::PlayerDefeated);
    }

    battle.turn += 1;
    events.push(GameEvent::TurnStarted { turn: battle.turn });
    player.block = 0;
    player.energy = player.max_energy;

    let totals = player.buffs.collect_trigger_effects(catalog, TriggerEvent::TurnStart);
    guard_player(player, totals.block_gained, events);
    for buff_id in player.buffs.decay_durations() {
        events.push(GameEvent::BuffExpired { buff_id });
    }

    match catalog.enemy(&battle.enemy.key) {
        Some(definition) => {
            battle.enemy.intent = scheduled_intent(definition, battle.turn, run, config);
            events.push(GameEvent::IntentRevealed {
                intent: battle.enemy.intent,
            });
        }
        None => content_warning(&format!(
            "enemy `{}` has no definition; intent left unchanged",
            battle.enemy.key
        )),
    }

    draw(battle, config.hand_size, rng, events);

    let curse_damage = curse_damage_in_hand(&battle.hand);
    if curse_damage > 0 {
        player.lose_hp(curse_damage);
        battle.cues.player_hit = true;
        events.push(GameEvent::CurseTriggered {
            damage: curse_damage,
        });
        if player.is_defeated() {
            events.push(GameEvent::PlayerDefeated);
            return Ok(CombatOutcome::PlayerDefeated);
        }
    }

    Ok(CombatOutcome::Continue)
}

/// 胜利结算：发放金币、清空 buff、生成奖励卡并丢弃战斗状态。
pub fn conclude_victory<R: Rng + ?Sized>(
    state: &mut GameState,
    catalog: &ContentCatalog,
    config: &RulesConfig,
    rng: &mut R,
    events: &mut Vec<GameEvent>,
) -> RewardOffer {
    let (elite, boss) = state
        .battle
        .as_ref()
        .map(|battle| (battle.elite, battle.boss))
        .unwrap_or((false, false));
    let gold = if boss {
        config.gold_boss
    } else if elite {
        config.gold_elite
    } else {
        config.gold_normal
    };

    state.player.gold += gold;
    state.player.buffs.clear_all();
    state.player.block = 0;
    state.battle = None;
    events.push(GameEvent::EncounterWon { gold });

    let count = if elite {
        config.reward_cards_elite
    } else {
        config.reward_cards_normal
    };
    let card_keys: Vec<String> = catalog
        .reward_pool()
        .choose_multiple(rng, count)
        .map(|card| card.key.clone())
        .collect();
    events.push(GameEvent::RewardOffered {
        card_keys: card_keys.clone(),
    });
    RewardOffer { card_keys }
}

pub fn conclude_defeat(state: &mut GameState) {
    state.player.buffs.clear_all();
    state.battle = None;
}
