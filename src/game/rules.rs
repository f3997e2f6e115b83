use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    advancement, combat,
    combat::CombatOutcome,
    config::RulesConfig,
    content::{ClassId, ContentCatalog},
    pacing::{self, ScheduledStep},
    progression,
    state::{
        BattlePhase, CardId, DestinationId, DestinationKind, GameEvent, GameState,
        IntegrityError, Player, RunState, VillageVisit,
    },
    village::{self, FacilityRoute},
};
use crate::log;

/// 玩家或调用方可以发起的全部动作。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameAction {
    PlayCard {
        card_id: CardId,
    },
    EndTurn,
    EnemyAct,
    ChooseDestination {
        destination_id: DestinationId,
    },
    ChooseRewardCard {
        #[serde(default)]
        card_key: Option<String>,
    },
    ConfirmAdvancement {
        #[serde(default)]
        class_id: Option<ClassId>,
    },
    EnterVillage,
    ChooseAccessory {
        accessory_id: String,
    },
    ChooseFacility {
        facility_id: String,
    },
    ChooseCompanion {
        #[serde(default)]
        companion_id: Option<String>,
    },
    ChooseAltarRewards {
        #[serde(default)]
        reward_ids: Vec<String>,
    },
    LeaveVillage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the run is already finished")]
    RunFinished,
    #[error("action requires phase {expected:?}, current phase is {actual:?}")]
    InvalidPhase {
        expected: BattlePhase,
        actual: BattlePhase,
    },
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition { from: BattlePhase, to: BattlePhase },
    #[error("no battle in progress")]
    NoActiveBattle,
    #[error("card {card_id} is not in hand")]
    CardNotFound { card_id: CardId },
    #[error("card {card_id} cannot be played")]
    Unplayable { card_id: CardId },
    #[error("card costs {required} energy, only {available} available")]
    InsufficientEnergy { required: i32, available: i32 },
    #[error("destination {destination_id} is not on offer")]
    DestinationNotFound { destination_id: DestinationId },
    #[error("card `{card_key}` is not part of the reward offer")]
    RewardNotOffered { card_key: String },
    #[error("unknown card `{card_key}`")]
    UnknownCard { card_key: String },
    #[error("unknown enemy `{enemy_key}`")]
    UnknownEnemy { enemy_key: String },
    #[error("unknown region `{region_id}`")]
    UnknownRegion { region_id: String },
    #[error("unknown class `{class_id}`")]
    UnknownClass { class_id: ClassId },
    #[error("content catalog has no base class")]
    MissingBaseClass,
    #[error("several classes qualify; a choice is required")]
    AdvancementChoiceRequired,
    #[error("class `{class_id}` is not an offered advancement")]
    AdvancementNotOffered { class_id: ClassId },
    #[error("accessory `{accessory_id}` is not on offer")]
    AccessoryNotOffered { accessory_id: String },
    #[error("companion `{companion_id}` is not on offer")]
    CompanionNotOffered { companion_id: String },
    #[error("unknown altar reward `{reward_id}`")]
    UnknownAltarReward { reward_id: String },
    #[error("state integrity violated: {error}")]
    IntegrityViolation { error: IntegrityError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    /// 需要调用方延迟后自动触发的下一步（敌人行动、进入村庄）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<ScheduledStep>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>, config: &RulesConfig) -> Self {
        let next = pacing::follow_up(&state, config);
        Self { state, events, next }
    }
}

/// 规则引擎：持有只读内容表、数值配置与注入的随机源，状态由调用方持有并显式传入。
pub struct RuleEngine<R = SmallRng> {
    content: ContentCatalog,
    config: RulesConfig,
    rng: R,
}

impl RuleEngine<SmallRng> {
    pub fn new(content: ContentCatalog, config: RulesConfig) -> Self {
        Self::with_rng(content, config, SmallRng::from_entropy())
    }

    pub fn with_seed(content: ContentCatalog, config: RulesConfig, seed: u64) -> Self {
        Self::with_rng(content, config, SmallRng::seed_from_u64(seed))
    }
}

impl Default for RuleEngine<SmallRng> {
    fn default() -> Self {
        Self::new(ContentCatalog::sample(), RulesConfig::default())
    }
}

impl<R: Rng> RuleEngine<R> {
    pub fn with_rng(content: ContentCatalog, config: RulesConfig, rng: R) -> Self {
        Self {
            content,
            config,
            rng,
        }
    }

    pub fn content(&self) -> &ContentCatalog {
        &self.content
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    fn ensure_running(state: &GameState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::RunFinished);
        }
        Ok(())
    }

    fn ensure_phase(state: &GameState, allowed: &[BattlePhase]) -> Result<(), RuleError> {
        if allowed.contains(&state.phase) {
            return Ok(());
        }
        Err(RuleError::InvalidPhase {
            expected: allowed.first().copied().unwrap_or(state.phase),
            actual: state.phase,
        })
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    /// 所有阶段切换都经过这里，不在边表中的切换直接拒绝。
    fn transition(
        state: &mut GameState,
        next: BattlePhase,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        let from = state.phase;
        if !from.can_transition_to(next) {
            return Err(RuleError::IllegalTransition { from, to: next });
        }
        log::phase_transition(&from, &next);
        state.phase = next;
        events.push(GameEvent::PhaseChanged { from, to: next });
        Ok(())
    }

    /// 校验后执行；任何一步失败都回滚到执行前的快照。
    fn guarded<F>(
        &mut self,
        state: &mut GameState,
        allowed: &[BattlePhase],
        op: F,
    ) -> Result<Vec<GameEvent>, RuleError>
    where
        F: FnOnce(&mut Self, &mut GameState, &mut Vec<GameEvent>) -> Result<(), RuleError>,
    {
        Self::ensure_running(state)?;
        Self::ensure_phase(state, allowed)?;
        Self::ensure_integrity(state)?;

        let snapshot = state.clone();
        let mut events = Vec::new();
        match op(self, state, &mut events) {
            Ok(()) => {
                state.event_log.extend(events.iter().cloned());
                Ok(events)
            }
            Err(error) => {
                tracing::debug!(target: "deckbound::rules", %error, "action rejected");
                *state = snapshot;
                Err(error)
            }
        }
    }

    /// 以基础职业的初始卡组开始一局新冒险。
    pub fn start_run(&mut self, region_id: &str) -> Result<GameState, RuleError> {
        let region = self
            .content
            .region(region_id)
            .ok_or_else(|| RuleError::UnknownRegion {
                region_id: region_id.to_string(),
            })?;
        let class = self.content.base_class().ok_or(RuleError::MissingBaseClass)?;

        let player = Player::new(
            self.config.starting_hp,
            self.config.starting_energy,
            self.config.starting_gold,
            class.id.clone(),
        );
        let run = RunState::new(region.id.clone(), self.config.total_rounds);
        let mut state = GameState::new(player, run);
        for key in &class.starter_deck {
            match self.content.card(key) {
                Some(definition) => {
                    state.add_card_to_deck(definition);
                }
                None => {
                    log::content_warning(&format!("starter deck references unknown card `{key}`"))
                }
            }
        }

        let mut events = vec![GameEvent::RunStarted {
            region_id: region.id.clone(),
            class_id: class.id.clone(),
        }];
        tracing::info!(target: "deckbound::rules", region = region_id, "run started");
        self.settle_destination_selection(&mut state, &mut events)?;
        state.event_log.extend(events);
        Ok(state)
    }

    /// 进入目的地选择时依次判断：冒险结束、未访问的村庄回合、否则生成新选项。
    fn settle_destination_selection(
        &mut self,
        state: &mut GameState,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        state.destinations.clear();

        if state.run.round > state.run.total_rounds {
            state.run.is_complete = true;
            Self::transition(state, BattlePhase::Victory, events)?;
            events.push(GameEvent::RunCompleted);
            return Ok(());
        }

        let round = state.run.round;
        if self.config.is_village_round(round) && !state.run.villages_visited.contains(&round) {
            state.run.villages_visited.push(round);
            return Self::transition(state, BattlePhase::VillageEntrance, events);
        }

        let (content, config, rng) = (&self.content, &self.config, &mut self.rng);
        let region = content
            .region(&state.run.region_id)
            .ok_or_else(|| RuleError::UnknownRegion {
                region_id: state.run.region_id.clone(),
            })?;
        state.destinations =
            progression::generate(round, state.run.total_rounds, region, config, rng);
        events.push(GameEvent::DestinationsRolled {
            round,
            options: state.destinations.iter().map(|option| option.id).collect(),
        });
        Ok(())
    }

    fn enter_destination_selection(
        &mut self,
        state: &mut GameState,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        Self::transition(state, BattlePhase::DestinationSelection, events)?;
        self.settle_destination_selection(state, events)
    }

    fn advance_round(
        &mut self,
        state: &mut GameState,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        state.run.round += 1;
        self.enter_destination_selection(state, events)
    }

    fn begin_encounter(
        &mut self,
        state: &mut GameState,
        enemy_key: &str,
        elite: bool,
        boss: bool,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        let (content, config, rng) = (&self.content, &self.config, &mut self.rng);
        let definition = content.enemy(enemy_key).ok_or_else(|| RuleError::UnknownEnemy {
            enemy_key: enemy_key.to_string(),
        })?;
        combat::start_encounter(state, content, config, rng, definition, elite, boss, events);
        Self::transition(state, BattlePhase::PlayerTurn, events)
    }

    fn resolve_victory(
        &mut self,
        state: &mut GameState,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        let offer =
            combat::conclude_victory(state, &self.content, &self.config, &mut self.rng, events);
        state.reward = Some(offer);
        Self::transition(state, BattlePhase::Reward, events)
    }

    fn resolve_defeat(state: &mut GameState, events: &mut Vec<GameEvent>) -> Result<(), RuleError> {
        combat::conclude_defeat(state);
        Self::transition(state, BattlePhase::Defeat, events)
    }

    fn leave(
        &mut self,
        state: &mut GameState,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), RuleError> {
        state.village = None;
        self.enter_destination_selection(state, events)
    }

    pub fn play_card(
        &mut self,
        state: &mut GameState,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::PlayerTurn], |engine, state, events| {
            match combat::play_card(state, &engine.content, &mut engine.rng, card_id, events)? {
                CombatOutcome::EnemyDefeated => engine.resolve_victory(state, events),
                _ => Ok(()),
            }
        })
    }

    pub fn end_turn(&mut self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::PlayerTurn], |engine, state, events| {
            match combat::end_turn(state, &engine.content, events)? {
                CombatOutcome::EnemyDefeated => engine.resolve_victory(state, events),
                _ => Self::transition(state, BattlePhase::EnemyTurn, events),
            }
        })
    }

    pub fn enemy_act(&mut self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::EnemyTurn], |engine, state, events| {
            let outcome =
                combat::enemy_act(state, &engine.content, &engine.config, &mut engine.rng, events)?;
            match outcome {
                CombatOutcome::PlayerDefeated => Self::resolve_defeat(state, events),
                _ => Self::transition(state, BattlePhase::PlayerTurn, events),
            }
        })
    }

    pub fn choose_destination(
        &mut self,
        state: &mut GameState,
        destination_id: DestinationId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::DestinationSelection], |engine, state, events| {
            let option = state
                .destinations
                .iter()
                .find(|option| option.id == destination_id)
                .cloned()
                .ok_or(RuleError::DestinationNotFound { destination_id })?;

            let destination = option.destination_type();
            state.destinations.clear();
            state.run.selected_destination = Some(destination);
            events.push(GameEvent::DestinationChosen {
                destination_id,
                destination,
            });

            match option.kind {
                DestinationKind::Normal { enemy_key } => {
                    engine.begin_encounter(state, &enemy_key, false, false, events)
                }
                DestinationKind::Elite { enemy_key, boss } => {
                    engine.begin_encounter(state, &enemy_key, true, boss, events)
                }
                DestinationKind::Rest { heal_percent } => {
                    let amount =
                        (i64::from(state.player.max_hp) * i64::from(heal_percent) / 100) as i32;
                    let healed = state.player.heal(amount);
                    events.push(GameEvent::RestTaken { healed });
                    engine.advance_round(state, events)
                }
                DestinationKind::Shop | DestinationKind::Event => {
                    engine.advance_round(state, events)
                }
            }
        })
    }

    /// 领取奖励卡（`None` 表示跳过），随后检查职业进阶。
    pub fn choose_reward_card(
        &mut self,
        state: &mut GameState,
        card_key: Option<&str>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::Reward], |engine, state, events| {
            if let Some(key) = card_key {
                let offered = state
                    .reward
                    .as_ref()
                    .map_or(false, |offer| offer.card_keys.iter().any(|k| k == key));
                if !offered {
                    return Err(RuleError::RewardNotOffered {
                        card_key: key.to_string(),
                    });
                }
                let definition = engine.content.card(key).ok_or_else(|| RuleError::UnknownCard {
                    card_key: key.to_string(),
                })?;
                let card_id = state.add_card_to_deck(definition);
                events.push(GameEvent::CardAdded {
                    card_id,
                    card_key: key.to_string(),
                });
            }
            state.reward = None;

            let candidates = advancement::available_advancements(
                &engine.content,
                &state.player.character_class,
                &state.deck,
            );
            match advancement::offer(candidates) {
                Some(offer) => {
                    state.advancement = Some(offer);
                    Self::transition(state, BattlePhase::ClassAdvancement, events)
                }
                None => engine.advance_round(state, events),
            }
        })
    }

    /// 确认进阶。单一候选时忽略参数直接使用自动选中的职业。
    pub fn confirm_advancement(
        &mut self,
        state: &mut GameState,
        class_id: Option<&str>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::ClassAdvancement], |engine, state, events| {
            let offer = state
                .advancement
                .clone()
                .ok_or(RuleError::AdvancementChoiceRequired)?;
            let target = match (offer.auto_selected, class_id) {
                (Some(auto), _) => auto,
                (None, Some(id)) if offer.candidates.iter().any(|candidate| candidate == id) => {
                    id.to_string()
                }
                (None, Some(id)) => {
                    return Err(RuleError::AdvancementNotOffered {
                        class_id: id.to_string(),
                    })
                }
                (None, None) => return Err(RuleError::AdvancementChoiceRequired),
            };

            let definition = engine
                .content
                .class(&target)
                .ok_or_else(|| RuleError::UnknownClass {
                    class_id: target.clone(),
                })?;
            advancement::apply(&mut state.player, definition);
            events.push(GameEvent::ClassAdvanced {
                class_id: definition.id.clone(),
            });
            for key in &definition.unlock_cards {
                match engine.content.card(key) {
                    Some(card) => {
                        let card_id = state.add_card_to_deck(card);
                        events.push(GameEvent::CardAdded {
                            card_id,
                            card_key: key.clone(),
                        });
                    }
                    None => log::content_warning(&format!(
                        "class `{}` unlocks unknown card `{key}`",
                        definition.id
                    )),
                }
            }
            state.advancement = None;
            engine.advance_round(state, events)
        })
    }

    /// 村庄入口的延迟结束（或被跳过）后调用。
    pub fn enter_village(&mut self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::VillageEntrance], |engine, state, events| {
            let offers = village::roll_accessory_offers(
                &engine.content,
                &state.run,
                &engine.config,
                &mut engine.rng,
            );
            let nothing_to_offer = offers.is_empty();
            state.village = Some(VillageVisit {
                accessory_offers: offers,
                companion_offers: Vec::new(),
            });
            Self::transition(state, BattlePhase::VillageAccessory, events)?;
            if nothing_to_offer {
                Self::transition(state, BattlePhase::VillageFacility, events)?;
            }
            Ok(())
        })
    }

    pub fn choose_accessory(
        &mut self,
        state: &mut GameState,
        accessory_id: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::VillageAccessory], |engine, state, events| {
            let not_offered = || RuleError::AccessoryNotOffered {
                accessory_id: accessory_id.to_string(),
            };
            let offered = state
                .village
                .as_ref()
                .map_or(false, |visit| visit.accessory_offers.iter().any(|id| id == accessory_id));
            if !offered {
                return Err(not_offered());
            }
            let accessory = engine.content.accessory(accessory_id).ok_or_else(not_offered)?;

            village::acquire_accessory(state, accessory, events);
            if let Some(visit) = state.village.as_mut() {
                visit.accessory_offers.clear();
            }
            Self::transition(state, BattlePhase::VillageFacility, events)
        })
    }

    pub fn choose_facility(
        &mut self,
        state: &mut GameState,
        facility_id: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::VillageFacility], |engine, state, events| {
            let region = engine
                .content
                .region(&state.run.region_id)
                .ok_or_else(|| RuleError::UnknownRegion {
                    region_id: state.run.region_id.clone(),
                })?;

            match village::route_facility(&engine.content, region, facility_id) {
                FacilityRoute::Tavern => {
                    let offers = village::roll_companion_offers(
                        &engine.content,
                        &state.run,
                        &engine.config,
                        &mut engine.rng,
                    );
                    let visit = state.village.get_or_insert_with(VillageVisit::default);
                    visit.companion_offers = offers;
                    Self::transition(state, BattlePhase::TavernCompanion, events)
                }
                FacilityRoute::BloodAltar => {
                    Self::transition(state, BattlePhase::BloodAltarReward, events)
                }
                FacilityRoute::Leave => engine.leave(state, events),
            }
        })
    }

    /// 招募伙伴（`None` 表示不招募），回到设施选择。
    pub fn choose_companion(
        &mut self,
        state: &mut GameState,
        companion_id: Option<&str>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::TavernCompanion], |engine, state, events| {
            if let Some(id) = companion_id {
                let not_offered = || RuleError::CompanionNotOffered {
                    companion_id: id.to_string(),
                };
                let offered = state
                    .village
                    .as_ref()
                    .map_or(false, |visit| visit.companion_offers.iter().any(|offer| offer == id));
                if !offered {
                    return Err(not_offered());
                }
                let companion = engine.content.companion(id).ok_or_else(not_offered)?;
                village::recruit_companion(state, &engine.content, companion, events);
            }
            if let Some(visit) = state.village.as_mut() {
                visit.companion_offers.clear();
            }
            Self::transition(state, BattlePhase::VillageFacility, events)
        })
    }

    pub fn choose_altar_rewards(
        &mut self,
        state: &mut GameState,
        reward_ids: &[String],
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.guarded(state, &[BattlePhase::BloodAltarReward], |engine, state, events| {
            village::activate_altar(state, &engine.content, reward_ids, events)?;
            Self::transition(state, BattlePhase::VillageFacility, events)
        })
    }

    pub fn leave_village(&mut self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        let allowed = [
            BattlePhase::VillageFacility,
            BattlePhase::TavernCompanion,
            BattlePhase::BloodAltarReward,
        ];
        self.guarded(state, &allowed, |engine, state, events| engine.leave(state, events))
    }

    pub fn apply_action(
        &mut self,
        state: &mut GameState,
        action: &GameAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        match action {
            GameAction::PlayCard { card_id } => self.play_card(state, *card_id),
            GameAction::EndTurn => self.end_turn(state),
            GameAction::EnemyAct => self.enemy_act(state),
            GameAction::ChooseDestination { destination_id } => {
                self.choose_destination(state, *destination_id)
            }
            GameAction::ChooseRewardCard { card_key } => {
                self.choose_reward_card(state, card_key.as_deref())
            }
            GameAction::ConfirmAdvancement { class_id } => {
                self.confirm_advancement(state, class_id.as_deref())
            }
            GameAction::EnterVillage => self.enter_village(state),
            GameAction::ChooseAccessory { accessory_id } => {
                self.choose_accessory(state, accessory_id)
            }
            GameAction::ChooseFacility { facility_id } => self.choose_facility(state, facility_id),
            GameAction::ChooseCompanion { companion_id } => {
                self.choose_companion(state, companion_id.as_deref())
            }
            GameAction::ChooseAltarRewards { reward_ids } => {
                self.choose_altar_rewards(state, reward_ids)
            }
            GameAction::LeaveVillage => self.leave_village(state),
        }
    }

    /// 执行动作并附带快照与下一步节奏提示。
    pub fn resolve(
        &mut self,
        state: &mut GameState,
        action: &GameAction,
    ) -> Result<RuleResolution, RuleError> {
        let events = self.apply_action(state, action)?;
        Ok(RuleResolution::new(state.clone(), events, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{
        BattleState, CardType, DestinationOption, DestinationType, Enemy, Intent,
    };

    fn engine() -> RuleEngine {
        RuleEngine::with_seed(ContentCatalog::sample(), RulesConfig::default(), 42)
    }

    fn started(engine: &mut RuleEngine) -> GameState {
        engine.start_run("ember_vale").expect("sample region should start")
    }

    fn force_destination(state: &mut GameState, kind: DestinationKind) -> DestinationId {
        let id = progression::next_destination_id();
        state.destinations = vec![DestinationOption { id, kind }];
        id
    }

    /// 直接布置一场受控的战斗：给定手牌、抽牌堆（末尾先抽）与敌人。
    fn stage_battle(
        engine: &RuleEngine,
        state: &mut GameState,
        hand: &[&str],
        pile: &[&str],
        enemy_hp: i32,
        intent: Intent,
    ) {
        state.deck.clear();
        for key in hand.iter().chain(pile.iter()) {
            let definition = engine.content().card(key).expect("sample card should exist");
            state.add_card_to_deck(definition);
        }
        let (hand_cards, pile_cards) = state.deck.split_at(hand.len());
        let enemy = Enemy {
            key: "slime".into(),
            name: "Acid Slime".into(),
            hp: enemy_hp,
            max_hp: enemy_hp,
            block: 0,
            intent,
        };
        let mut battle = BattleState::new(enemy, pile_cards.to_vec(), false, false);
        battle.hand = hand_cards.to_vec();
        battle.card_count = state.deck.len();

        state.battle = Some(battle);
        state.destinations.clear();
        state.run.selected_destination = Some(DestinationType::Normal);
        state.phase = BattlePhase::PlayerTurn;
    }

    fn hand_card(state: &GameState, key: &str) -> CardId {
        state
            .battle
            .as_ref()
            .and_then(|battle| battle.hand.iter().find(|card| card.key == key))
            .map(|card| card.id)
            .expect("card should be in hand")
    }

    fn battle(state: &GameState) -> &BattleState {
        state.battle.as_ref().expect("battle should be active")
    }

    fn phase_edges(events: &[GameEvent]) -> Vec<(BattlePhase, BattlePhase)> {
        events
            .iter()
            .filter_map(|event| match event {
                GameEvent::PhaseChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    fn win_staged_battle(engine: &mut RuleEngine, state: &mut GameState) {
        let strike = hand_card(state, "strike");
        engine.play_card(state, strike).expect("lethal strike should resolve");
        assert_eq!(state.phase, BattlePhase::Reward);
    }

    #[test]
    fn start_run_builds_starter_deck_and_first_options() {
        let mut engine = engine();
        let state = started(&mut engine);

        assert_eq!(state.phase, BattlePhase::DestinationSelection);
        assert_eq!(state.player.character_class, "warrior");
        assert_eq!(state.player.hp, 80);
        assert_eq!(state.deck.len(), 10);
        assert_eq!(state.destinations.len(), 2);
        assert_eq!(state.destinations[0].destination_type(), DestinationType::Normal);
        assert!(matches!(state.event_log.first(), Some(GameEvent::RunStarted { .. })));
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn unknown_region_is_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.start_run("nowhere").err(),
            Some(RuleError::UnknownRegion {
                region_id: "nowhere".into()
            })
        );
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let mut first = engine();
        let mut second = engine();
        let a = started(&mut first);
        let b = started(&mut second);

        let kinds = |state: &GameState| -> Vec<DestinationKind> {
            state.destinations.iter().map(|option| option.kind.clone()).collect()
        };
        assert_eq!(kinds(&a), kinds(&b));
    }

    #[test]
    fn iron_wave_damages_and_blocks_then_discards() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.player.hp = 50;
        state.player.max_hp = 50;
        stage_battle(&engine, &mut state, &["iron_wave"], &[], 20, Intent::Attack { value: 6 });

        let card_id = hand_card(&state, "iron_wave");
        let events = engine.play_card(&mut state, card_id).expect("iron wave should be playable");

        let battle = battle(&state);
        assert_eq!(battle.enemy.hp, 15);
        assert_eq!(state.player.block, 5);
        assert_eq!(state.player.energy, 2);
        assert!(battle.hand.is_empty());
        assert_eq!(battle.discard.iter().map(|card| card.id).collect::<Vec<_>>(), vec![card_id]);
        assert!(battle.cues.player_attacking && battle.cues.enemy_hit);
        assert!(events.contains(&GameEvent::CardPlayed { card_id }));
        assert_eq!(state.phase, BattlePhase::PlayerTurn);
    }

    #[test]
    fn insufficient_energy_is_rejected_without_change() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(&engine, &mut state, &["strike"], &[], 20, Intent::Attack { value: 6 });
        state.player.energy = 0;
        let before = state.clone();

        let card_id = hand_card(&state, "strike");
        let result = engine.play_card(&mut state, card_id);
        assert_eq!(
            result,
            Err(RuleError::InsufficientEnergy {
                required: 1,
                available: 0
            })
        );
        assert_eq!(state, before);
    }

    #[test]
    fn curses_cannot_be_played() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(&engine, &mut state, &["regret"], &[], 20, Intent::Attack { value: 6 });

        let card_id = hand_card(&state, "regret");
        assert_eq!(engine.play_card(&mut state, card_id), Err(RuleError::Unplayable { card_id }));
    }

    #[test]
    fn combat_actions_outside_combat_are_rejected() {
        let mut engine = engine();
        let mut state = started(&mut engine);

        assert_eq!(
            engine.play_card(&mut state, 1),
            Err(RuleError::InvalidPhase {
                expected: BattlePhase::PlayerTurn,
                actual: BattlePhase::DestinationSelection
            })
        );
        assert!(engine.enemy_act(&mut state).is_err());
        assert!(engine.enter_village(&mut state).is_err());
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        let before = state.clone();

        assert_eq!(
            engine.choose_destination(&mut state, u64::MAX),
            Err(RuleError::DestinationNotFound {
                destination_id: u64::MAX
            })
        );
        assert_eq!(state, before);
    }

    #[test]
    fn power_card_is_exhausted_and_applies_buff() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(&engine, &mut state, &["metallicize"], &[], 20, Intent::Attack { value: 6 });

        let card_id = hand_card(&state, "metallicize");
        engine.play_card(&mut state, card_id).expect("power should be playable");

        assert_eq!(battle(&state).exhausted.len(), 1);
        assert!(battle(&state).discard.is_empty());
        assert_eq!(state.player.buffs.get("plating").map(|buff| buff.stacks), Some(1));
    }

    #[test]
    fn draw_effects_resolve_after_the_card_is_discarded() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &["battle_trance"],
            &["strike", "defend", "defend"],
            20,
            Intent::Attack { value: 6 },
        );

        let card_id = hand_card(&state, "battle_trance");
        engine.play_card(&mut state, card_id).expect("battle trance should be playable");

        let battle = battle(&state);
        assert_eq!(battle.hand.len(), 2);
        assert_eq!(battle.draw_pile.len(), 1);
        assert_eq!(battle.discard[0].key, "battle_trance");
        assert_eq!(battle.pending_draws, 0);
    }

    #[test]
    fn lethal_play_moves_to_reward() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &["strike", "defend"],
            &[],
            5,
            Intent::Attack { value: 6 },
        );
        state.player.buffs.apply(engine.content(), "plating");

        let events = {
            let strike = hand_card(&state, "strike");
            engine.play_card(&mut state, strike).expect("lethal strike should resolve")
        };

        assert_eq!(state.phase, BattlePhase::Reward);
        assert!(state.battle.is_none());
        assert_eq!(state.player.gold, 99 + 15);
        assert!(state.player.buffs.is_empty());
        let offer = state.reward.as_ref().expect("reward should be offered");
        assert_eq!(offer.card_keys.len(), 3);
        let mut unique = offer.card_keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3, "reward cards are distinct");
        assert!(events.contains(&GameEvent::EncounterWon { gold: 15 }));
    }

    #[test]
    fn elite_victory_offers_four_cards() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(&engine, &mut state, &["strike"], &[], 5, Intent::Attack { value: 6 });
        state.run.selected_destination = Some(DestinationType::Elite);
        if let Some(battle) = state.battle.as_mut() {
            battle.elite = true;
        }

        win_staged_battle(&mut engine, &mut state);
        assert_eq!(state.player.gold, 99 + 30);
        assert_eq!(state.reward.as_ref().map(|offer| offer.card_keys.len()), Some(4));
    }

    #[test]
    fn end_turn_discards_hand_and_schedules_enemy() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &["strike", "defend"],
            &[],
            20,
            Intent::Attack { value: 6 },
        );

        let resolution = engine
            .resolve(&mut state, &GameAction::EndTurn)
            .expect("end turn should resolve");

        assert_eq!(state.phase, BattlePhase::EnemyTurn);
        assert!(battle(&state).hand.is_empty());
        assert_eq!(battle(&state).discard.len(), 2);
        assert_eq!(resolution.next.map(|step| step.action), Some(GameAction::EnemyAct));
    }

    #[test]
    fn enemy_attack_hits_block_first_then_next_turn_begins() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &["defend"],
            &["strike", "strike", "strike", "strike", "strike"],
            20,
            Intent::Attack { value: 6 },
        );

        let card_id = hand_card(&state, "defend");
        engine.play_card(&mut state, card_id).expect("defend should be playable");
        engine.end_turn(&mut state).expect("end turn should succeed");
        engine.enemy_act(&mut state).expect("enemy should act");

        let battle = battle(&state);
        assert_eq!(state.player.hp, 79);
        assert_eq!(state.phase, BattlePhase::PlayerTurn);
        assert_eq!(battle.turn, 2);
        assert_eq!(state.player.block, 0);
        assert_eq!(state.player.energy, state.player.max_energy);
        assert_eq!(battle.hand.len(), 5);
        assert_eq!(battle.enemy.intent, Intent::Defend { value: 5 });
    }

    #[test]
    fn defeat_is_terminal_and_idempotent() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.player.hp = 4;
        stage_battle(&engine, &mut state, &[], &["strike"], 20, Intent::Attack { value: 10 });

        engine.end_turn(&mut state).expect("end turn should succeed");
        let events = engine.enemy_act(&mut state).expect("enemy should act");

        assert_eq!(state.phase, BattlePhase::Defeat);
        assert!(events.contains(&GameEvent::PlayerDefeated));
        assert!(state.battle.is_none());

        let before = state.clone();
        assert_eq!(engine.enemy_act(&mut state), Err(RuleError::RunFinished));
        assert_eq!(engine.play_card(&mut state, 1), Err(RuleError::RunFinished));
        assert_eq!(engine.end_turn(&mut state), Err(RuleError::RunFinished));
        assert_eq!(state, before);
    }

    #[test]
    fn curses_in_the_new_hand_deal_damage() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &[],
            &["regret", "strike", "regret", "strike", "strike"],
            20,
            Intent::Buff { value: 0 },
        );

        engine.end_turn(&mut state).expect("end turn should succeed");
        let events = engine.enemy_act(&mut state).expect("enemy should act");

        assert_eq!(state.player.hp, 76);
        assert!(events.contains(&GameEvent::CurseTriggered { damage: 4 }));
        assert_eq!(state.phase, BattlePhase::PlayerTurn);
    }

    #[test]
    fn turn_start_buffs_add_block_and_expire() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &[],
            &["strike", "strike", "strike", "strike", "strike"],
            100,
            Intent::Buff { value: 0 },
        );
        state.player.buffs.apply(engine.content(), "plating");
        state.player.buffs.apply(engine.content(), "barricade");

        let mut blocks = Vec::new();
        let mut expired = Vec::new();
        for _ in 0..3 {
            engine.end_turn(&mut state).expect("end turn should succeed");
            let events = engine.enemy_act(&mut state).expect("enemy should act");
            blocks.push(state.player.block);
            expired.extend(
                events
                    .into_iter()
                    .filter(|event| matches!(event, GameEvent::BuffExpired { .. })),
            );
        }

        assert_eq!(blocks, vec![7, 7, 3]);
        assert_eq!(
            expired,
            vec![GameEvent::BuffExpired {
                buff_id: "barricade".into()
            }]
        );
    }

    #[test]
    fn turn_end_buff_damage_can_win_the_encounter() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(&engine, &mut state, &["defend"], &[], 3, Intent::Attack { value: 6 });
        state.player.buffs.apply(engine.content(), "fury");

        engine.end_turn(&mut state).expect("end turn should succeed");
        assert_eq!(state.phase, BattlePhase::Reward);
    }

    #[test]
    fn cards_are_conserved_through_many_turns() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.player.max_hp = 999;
        state.player.hp = 999;
        let deck: Vec<String> = state.deck.iter().map(|card| card.key.clone()).collect();
        let keys: Vec<&str> = deck.iter().map(String::as_str).collect();
        let (hand, pile) = keys.split_at(5);
        stage_battle(&engine, &mut state, hand, pile, 500, Intent::Attack { value: 6 });

        for _ in 0..60 {
            match state.phase {
                BattlePhase::PlayerTurn => {
                    let playable = state
                        .battle
                        .as_ref()
                        .and_then(|battle| {
                            battle.hand.iter().find(|card| {
                                card.card_type != CardType::Curse
                                    && card.cost <= state.player.energy
                            })
                        })
                        .map(|card| card.id);
                    let step = match playable {
                        Some(card_id) => engine.play_card(&mut state, card_id),
                        None => engine.end_turn(&mut state),
                    };
                    step.expect("player step should succeed");
                }
                BattlePhase::EnemyTurn => {
                    engine.enemy_act(&mut state).expect("enemy step should succeed");
                }
                _ => break,
            }
            state.integrity_check().expect("cards should be conserved");
            if let Some(battle) = &state.battle {
                assert_eq!(battle.zone_total(), battle.card_count);
            }
        }
    }

    #[test]
    fn single_qualifying_class_is_auto_selected() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &["strike"],
            &["rage_strike", "rage_strike", "rage_strike"],
            1,
            Intent::Attack { value: 6 },
        );
        win_staged_battle(&mut engine, &mut state);

        engine.choose_reward_card(&mut state, None).expect("skipping the reward is allowed");
        assert_eq!(state.phase, BattlePhase::ClassAdvancement);
        assert_eq!(
            state.advancement.as_ref().and_then(|offer| offer.auto_selected.as_deref()),
            Some("berserker")
        );

        engine.confirm_advancement(&mut state, None).expect("auto selection should confirm");
        assert_eq!(state.player.character_class, "berserker");
        assert!(state.deck.iter().any(|card| card.key == "berserk_roar"));
        assert_eq!(state.phase, BattlePhase::DestinationSelection);
        assert_eq!(state.run.round, 2);
        assert!(!state.destinations.is_empty());
    }

    #[test]
    fn several_qualifying_classes_require_a_choice() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(
            &engine,
            &mut state,
            &["strike"],
            &["rage_strike", "rage_strike", "rage_strike", "bulwark", "bulwark", "aegis"],
            1,
            Intent::Attack { value: 6 },
        );
        win_staged_battle(&mut engine, &mut state);
        engine.choose_reward_card(&mut state, None).expect("skipping the reward is allowed");

        assert_eq!(
            engine.confirm_advancement(&mut state, None),
            Err(RuleError::AdvancementChoiceRequired)
        );
        assert_eq!(
            engine.confirm_advancement(&mut state, Some("knight")),
            Err(RuleError::AdvancementNotOffered {
                class_id: "knight".into()
            })
        );
        engine
            .confirm_advancement(&mut state, Some("guardian"))
            .expect("offered class should confirm");
        assert_eq!(state.player.character_class, "guardian");
        assert!(state.deck.iter().any(|card| card.key == "bastion"));
    }

    #[test]
    fn reward_card_joins_the_deck() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        stage_battle(&engine, &mut state, &["strike"], &[], 1, Intent::Attack { value: 6 });
        win_staged_battle(&mut engine, &mut state);

        assert_eq!(
            engine.choose_reward_card(&mut state, Some("bastion")),
            Err(RuleError::RewardNotOffered {
                card_key: "bastion".into()
            })
        );

        let key = state
            .reward
            .as_ref()
            .and_then(|offer| offer.card_keys.first().cloned())
            .expect("reward should contain cards");
        engine
            .choose_reward_card(&mut state, Some(key.as_str()))
            .expect("offered card should be accepted");

        assert_eq!(state.deck.len(), 2);
        assert_eq!(state.deck[1].key, key);
        assert_eq!(state.run.round, 2);
        assert_eq!(state.phase, BattlePhase::DestinationSelection);
    }

    #[test]
    fn rest_heals_a_share_of_max_hp() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.player.hp = 40;
        let id = force_destination(&mut state, DestinationKind::Rest { heal_percent: 30 });

        let events = engine.choose_destination(&mut state, id).expect("rest should resolve");

        assert_eq!(state.player.hp, 64);
        assert!(events.contains(&GameEvent::RestTaken { healed: 24 }));
        assert_eq!(state.run.round, 2);
        assert_eq!(state.phase, BattlePhase::DestinationSelection);
    }

    #[test]
    fn combat_start_applies_accessory_block_and_monster_buffs() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.run.accessories.push("iron_badge".into());
        state.run.altar_activated = true;
        state.run.monster_hp_buff = 0.2;
        state.run.monster_attack_buff = 0.5;
        state.run.round = 4;

        let id = force_destination(
            &mut state,
            DestinationKind::Normal {
                enemy_key: "slime".into(),
            },
        );
        engine.choose_destination(&mut state, id).expect("encounter should start");

        let battle = battle(&state);
        assert_eq!(state.phase, BattlePhase::PlayerTurn);
        assert_eq!(state.player.block, 5);
        assert_eq!(battle.enemy.max_hp, 24);
        assert_eq!(battle.enemy.intent, Intent::Attack { value: 13 });
        assert_eq!(battle.hand.len(), 5);
        assert_eq!(battle.card_count, 10);
    }

    #[test]
    fn monster_buffs_wait_for_their_start_round() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.run.altar_activated = true;
        state.run.monster_hp_buff = 0.2;
        state.run.round = 3;

        let id = force_destination(
            &mut state,
            DestinationKind::Normal {
                enemy_key: "slime".into(),
            },
        );
        engine.choose_destination(&mut state, id).expect("encounter should start");
        assert_eq!(battle(&state).enemy.max_hp, 20);
    }

    #[test]
    fn reward_reaches_village_only_through_destination_selection() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.run.round = 3;
        stage_battle(&engine, &mut state, &["strike"], &[], 1, Intent::Attack { value: 6 });
        win_staged_battle(&mut engine, &mut state);

        let events = engine.choose_reward_card(&mut state, None).expect("skip should resolve");

        assert_eq!(state.phase, BattlePhase::VillageEntrance);
        assert_eq!(
            phase_edges(&events),
            vec![
                (BattlePhase::Reward, BattlePhase::DestinationSelection),
                (BattlePhase::DestinationSelection, BattlePhase::VillageEntrance),
            ]
        );
    }

    #[test]
    fn full_village_visit() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.run.round = 3;
        let id = force_destination(&mut state, DestinationKind::Shop);

        let resolution = engine
            .resolve(&mut state, &GameAction::ChooseDestination { destination_id: id })
            .expect("shop should resolve");
        assert_eq!(state.phase, BattlePhase::VillageEntrance);
        assert_eq!(state.run.round, 4);
        let next = resolution.next.expect("village entrance should schedule a step");
        assert_eq!(next.action, GameAction::EnterVillage);
        assert_eq!(next.delay_ms, 1500);

        engine.apply_action(&mut state, &next.action).expect("village should open");
        assert_eq!(state.phase, BattlePhase::VillageAccessory);
        let offers = state
            .village
            .as_ref()
            .map(|visit| visit.accessory_offers.clone())
            .unwrap_or_default();
        assert_eq!(offers.len(), 3);

        engine
            .choose_accessory(&mut state, &offers[0])
            .expect("offered accessory should be accepted");
        assert_eq!(state.phase, BattlePhase::VillageFacility);
        assert_eq!(state.run.accessories, vec![offers[0].clone()]);

        engine.choose_facility(&mut state, "tavern").expect("tavern should open");
        assert_eq!(state.phase, BattlePhase::TavernCompanion);
        let companion = state
            .village
            .as_ref()
            .and_then(|visit| visit.companion_offers.first().cloned())
            .expect("tavern should offer companions");
        let deck_before = state.deck.len();
        engine
            .choose_companion(&mut state, Some(companion.as_str()))
            .expect("offered companion should join");
        assert_eq!(state.deck.len(), deck_before + 1);
        assert_eq!(state.phase, BattlePhase::VillageFacility);

        engine.choose_facility(&mut state, "blood_altar").expect("altar should open");
        assert_eq!(state.phase, BattlePhase::BloodAltarReward);
        engine
            .choose_altar_rewards(&mut state, &["pact_of_blood".to_string()])
            .expect("known pact should commit");
        assert!(state.run.altar_activated);
        assert_eq!(state.phase, BattlePhase::VillageFacility);
        engine.choose_facility(&mut state, "blood_altar").expect("altar should reopen");
        assert_eq!(state.phase, BattlePhase::BloodAltarReward);
        engine
            .choose_altar_rewards(&mut state, &[])
            .expect("empty commit should return to the facilities");
        assert_eq!(state.phase, BattlePhase::VillageFacility);

        engine.leave_village(&mut state).expect("leaving should be allowed");
        assert_eq!(state.phase, BattlePhase::DestinationSelection);
        assert_eq!(state.run.round, 4);
        assert_eq!(state.destinations.len(), 2);
        assert!(state.village.is_none());
    }

    #[test]
    fn unknown_facility_leaves_the_village() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.phase = BattlePhase::VillageFacility;
        state.village = Some(VillageVisit::default());

        engine.choose_facility(&mut state, "blacksmith").expect("unknown facility should leave");
        assert_eq!(state.phase, BattlePhase::DestinationSelection);
        assert!(!state.destinations.is_empty());
    }

    fn commit_pact_twice(engine: &mut RuleEngine, state: &mut GameState, reward_id: &str) {
        state.phase = BattlePhase::VillageFacility;
        state.village = Some(VillageVisit::default());
        for _ in 0..2 {
            engine.choose_facility(state, "blood_altar").expect("altar should open");
            engine
                .choose_altar_rewards(state, &[reward_id.to_string()])
                .expect("known pact should commit");
            assert_eq!(state.phase, BattlePhase::VillageFacility);
        }
    }

    #[test]
    fn repeated_altar_pacts_accumulate_monster_hp() {
        let mut engine = engine();
        let mut state = started(&mut engine);

        commit_pact_twice(&mut engine, &mut state, "pact_of_fangs");

        assert!((state.run.monster_hp_buff - 0.4).abs() < 1e-9);
        assert_eq!(state.run.accessories, vec!["iron_badge".to_string()]);
    }

    #[test]
    fn repeated_altar_pacts_accumulate_monster_attack() {
        let mut tables =
            serde_json::to_value(ContentCatalog::sample()).expect("sample should serialize");
        tables["altar_rewards"]
            .as_array_mut()
            .expect("altar rewards should be a table")
            .push(serde_json::json!({
                "id": "pact_of_rage",
                "name": "Pact of Rage",
                "boon": { "type": "gold", "amount": 10 },
                "penalty": { "type": "monster_attack_buff", "percent": 0.25 }
            }));
        let catalog =
            ContentCatalog::from_json(&tables.to_string()).expect("extended catalog should load");
        let mut engine = RuleEngine::with_seed(catalog, RulesConfig::default(), 42);
        let mut state = started(&mut engine);
        let gold_before = state.player.gold;

        commit_pact_twice(&mut engine, &mut state, "pact_of_rage");

        assert!((state.run.monster_attack_buff - 0.5).abs() < 1e-9);
        assert_eq!(state.player.gold, gold_before + 20);
    }

    #[test]
    fn altar_commit_with_unknown_reward_changes_nothing() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.phase = BattlePhase::BloodAltarReward;
        state.village = Some(VillageVisit::default());
        let before = state.clone();

        let reward_ids = ["pact_of_blood".to_string(), "pact_of_nothing".to_string()];
        let result = engine.choose_altar_rewards(&mut state, &reward_ids);
        assert!(matches!(result, Err(RuleError::UnknownAltarReward { .. })));
        assert_eq!(state, before);
    }

    #[test]
    fn boss_victory_completes_the_run() {
        let mut engine = engine();
        let mut state = started(&mut engine);
        state.run.round = 6;
        let id = force_destination(&mut state, DestinationKind::Event);
        engine.choose_destination(&mut state, id).expect("event should resolve");

        assert_eq!(state.run.round, 7);
        assert_eq!(state.destinations.len(), 1);
        assert_eq!(
            state.destinations[0].kind,
            DestinationKind::Elite {
                enemy_key: "dragon".into(),
                boss: true
            }
        );

        let boss_id = state.destinations[0].id;
        engine.choose_destination(&mut state, boss_id).expect("boss fight should start");
        assert!(battle(&state).boss);
        if let Some(battle) = state.battle.as_mut() {
            battle.enemy.hp = 1;
        }
        let attack = battle(&state)
            .hand
            .iter()
            .find(|card| card.card_type == CardType::Attack)
            .map(|card| card.id)
            .expect("a starter hand always holds an attack");
        engine.play_card(&mut state, attack).expect("lethal attack should resolve");

        assert_eq!(state.phase, BattlePhase::Reward);
        assert_eq!(state.player.gold, 99 + 100);
        assert_eq!(state.reward.as_ref().map(|offer| offer.card_keys.len()), Some(4));

        let events = engine.choose_reward_card(&mut state, None).expect("skip should resolve");
        assert_eq!(state.phase, BattlePhase::Victory);
        assert!(state.run.is_complete);
        assert!(events.contains(&GameEvent::RunCompleted));
        assert_eq!(engine.leave_village(&mut state), Err(RuleError::RunFinished));
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: GameAction = serde_json::from_str(r#"{ "type": "play_card", "card_id": 3 }"#)
            .expect("play action should parse");
        assert_eq!(action, GameAction::PlayCard { card_id: 3 });

        let action: GameAction = serde_json::from_str(r#"{ "type": "choose_reward_card" }"#)
            .expect("skip action should parse");
        assert_eq!(action, GameAction::ChooseRewardCard { card_key: None });

        let error = serde_json::to_value(RuleError::InsufficientEnergy {
            required: 2,
            available: 1,
        })
        .expect("errors should serialize");
        assert_eq!(error["type"], "InsufficientEnergy");
    }
}
