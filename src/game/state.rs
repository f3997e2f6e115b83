use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::buffs::BuffLedger;
use super::content::{CardDefinition, ClassId};
use super::effects::{CardEffect, PassiveEffect};

/// 卡牌实例标识（同一定义抽到两次也是两个不同的 id）。
pub type CardId = u32;
/// 目的地选项标识，进程内单调递增。
pub type DestinationId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Attack,
    Skill,
    Power,
    Curse,
}

/// 战斗中使用的卡牌实例。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub key: String,
    pub name: String,
    pub card_type: CardType,
    pub cost: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<CardEffect>,
    #[serde(default)]
    pub exhaust: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive: Option<PassiveEffect>,
}

impl Card {
    /// 能力牌与消耗牌打出后永久移出本场战斗。
    pub fn leaves_play(&self) -> bool {
        self.exhaust || self.card_type == CardType::Power
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// 护甲先吸收伤害，剩余部分扣血。返回 (实际受到的伤害, 剩余护甲)。
pub fn absorb(block: i32, damage: i32) -> (i32, i32) {
    let damage = damage.max(0);
    let block = block.max(0);
    ((damage - block).max(0), (block - damage).max(0))
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DamageReport {
    pub absorbed: i32,
    pub taken: i32,
}

/// 玩家状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub block: i32,
    pub energy: i32,
    pub max_energy: i32,
    #[serde(default)]
    pub gold: u32,
    pub character_class: ClassId,
    #[serde(default)]
    pub buffs: BuffLedger,
}

impl Player {
    pub fn new(
        max_hp: i32,
        max_energy: i32,
        gold: u32,
        character_class: impl Into<ClassId>,
    ) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            block: 0,
            energy: max_energy,
            max_energy,
            gold,
            character_class: character_class.into(),
            buffs: BuffLedger::default(),
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }

    pub fn take_damage(&mut self, amount: i32) -> DamageReport {
        let before = self.block;
        let (taken, remaining) = absorb(self.block, amount);
        self.block = remaining;
        self.hp -= taken;
        DamageReport {
            absorbed: before - remaining,
            taken,
        }
    }

    /// 无视护甲直接扣血（诅咒牌的被动伤害）。
    pub fn lose_hp(&mut self, amount: i32) {
        self.hp -= amount.max(0);
    }

    pub fn gain_block(&mut self, amount: i32) {
        self.block += amount.max(0);
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
        self.hp - before
    }

    /// 提升生命上限时同步回复相同数值。
    pub fn raise_max_hp(&mut self, amount: i32) {
        self.max_hp += amount;
        self.hp = (self.hp + amount).min(self.max_hp).max(1);
    }
}

/// 敌人公开的下一步行动。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Attack { value: i32 },
    Defend { value: i32 },
    Buff { value: i32 },
}

impl Intent {
    pub fn value(&self) -> i32 {
        match self {
            Intent::Attack { value } | Intent::Defend { value } | Intent::Buff { value } => *value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Enemy {
    pub key: String,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub block: i32,
    pub intent: Intent,
}

impl Enemy {
    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }

    pub fn take_damage(&mut self, amount: i32) -> DamageReport {
        let before = self.block;
        let (taken, remaining) = absorb(self.block, amount);
        self.block = remaining;
        self.hp -= taken;
        DamageReport {
            absorbed: before - remaining,
            taken,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Combatant {
    Player,
    Enemy,
}

/// 给渲染层的动画提示位，规则本身从不读取。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombatCues {
    pub player_attacking: bool,
    pub enemy_attacking: bool,
    pub player_hit: bool,
    pub enemy_hit: bool,
    pub shuffling: bool,
}

/// 单场战斗的运行时状态，战斗结束即丢弃。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleState {
    pub enemy: Enemy,
    #[serde(default)]
    pub draw_pile: Vec<Card>,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub discard: Vec<Card>,
    #[serde(default)]
    pub exhausted: Vec<Card>,
    pub turn: u32,
    /// 开战时的卡牌总数，四个区域之和必须始终等于它。
    pub card_count: usize,
    #[serde(default)]
    pub pending_draws: u32,
    #[serde(default)]
    pub elite: bool,
    #[serde(default)]
    pub boss: bool,
    #[serde(default)]
    pub cues: CombatCues,
}

impl BattleState {
    pub fn new(enemy: Enemy, draw_pile: Vec<Card>, elite: bool, boss: bool) -> Self {
        let card_count = draw_pile.len();
        Self {
            enemy,
            draw_pile,
            hand: Vec::new(),
            discard: Vec::new(),
            exhausted: Vec::new(),
            turn: 1,
            card_count,
            pending_draws: 0,
            elite,
            boss,
            cues: CombatCues::default(),
        }
    }

    pub fn zone_total(&self) -> usize {
        self.draw_pile.len() + self.hand.len() + self.discard.len() + self.exhausted.len()
    }

    pub fn find_card_in_hand_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.draw_pile
            .iter()
            .chain(self.hand.iter())
            .chain(self.discard.iter())
            .chain(self.exhausted.iter())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    Normal,
    Elite,
    Rest,
    Shop,
    Event,
}

impl DestinationType {
    pub fn is_combat(self) -> bool {
        matches!(self, DestinationType::Normal | DestinationType::Elite)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationKind {
    Normal {
        enemy_key: String,
    },
    Elite {
        enemy_key: String,
        #[serde(default)]
        boss: bool,
    },
    Rest {
        heal_percent: u32,
    },
    Shop,
    Event,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationOption {
    pub id: DestinationId,
    #[serde(flatten)]
    pub kind: DestinationKind,
}

impl DestinationOption {
    pub fn destination_type(&self) -> DestinationType {
        match self.kind {
            DestinationKind::Normal { .. } => DestinationType::Normal,
            DestinationKind::Elite { .. } => DestinationType::Elite,
            DestinationKind::Rest { .. } => DestinationType::Rest,
            DestinationKind::Shop => DestinationType::Shop,
            DestinationKind::Event => DestinationType::Event,
        }
    }

    pub fn enemy_key(&self) -> Option<&str> {
        match &self.kind {
            DestinationKind::Normal { enemy_key } | DestinationKind::Elite { enemy_key, .. } => {
                Some(enemy_key)
            }
            _ => None,
        }
    }
}

/// 整局冒险的进度。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    pub region_id: String,
    pub round: u32,
    pub total_rounds: u32,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub accessories: Vec<String>,
    #[serde(default)]
    pub companions: Vec<String>,
    #[serde(default)]
    pub altar_activated: bool,
    #[serde(default)]
    pub monster_hp_buff: f64,
    #[serde(default)]
    pub monster_attack_buff: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_destination: Option<DestinationType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub villages_visited: Vec<u32>,
}

impl RunState {
    pub fn new(region_id: impl Into<String>, total_rounds: u32) -> Self {
        Self {
            region_id: region_id.into(),
            round: 1,
            total_rounds,
            is_complete: false,
            accessories: Vec::new(),
            companions: Vec::new(),
            altar_activated: false,
            monster_hp_buff: 0.0,
            monster_attack_buff: 0.0,
            selected_destination: None,
            villages_visited: Vec::new(),
        }
    }

    /// 祭坛激活后，怪物加成只从配置的回合开始生效。
    pub fn monster_buffs_active(&self, start_round: u32) -> bool {
        self.altar_activated && self.round >= start_round
    }
}

/// 战斗阶段：唯一决定当前哪些操作合法的状态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    PlayerTurn,
    EnemyTurn,
    Victory,
    Defeat,
    Reward,
    ClassAdvancement,
    DestinationSelection,
    VillageEntrance,
    VillageAccessory,
    VillageFacility,
    TavernCompanion,
    BloodAltarReward,
}

impl Default for BattlePhase {
    fn default() -> Self {
        Self::DestinationSelection
    }
}

impl BattlePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, BattlePhase::Victory | BattlePhase::Defeat)
    }

    pub fn can_transition_to(self, next: BattlePhase) -> bool {
        use BattlePhase::*;
        match self {
            PlayerTurn => matches!(next, EnemyTurn | Reward | Defeat),
            EnemyTurn => matches!(next, PlayerTurn | Defeat),
            Reward => matches!(next, DestinationSelection | ClassAdvancement),
            ClassAdvancement => matches!(next, DestinationSelection),
            DestinationSelection => matches!(
                next,
                DestinationSelection | PlayerTurn | VillageEntrance | Victory
            ),
            VillageEntrance => matches!(next, VillageAccessory),
            VillageAccessory => matches!(next, VillageFacility),
            VillageFacility => matches!(
                next,
                TavernCompanion | BloodAltarReward | DestinationSelection
            ),
            TavernCompanion | BloodAltarReward => {
                matches!(next, VillageFacility | DestinationSelection)
            }
            Victory | Defeat => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardOffer {
    pub card_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvancementOffer {
    pub candidates: Vec<ClassId>,
    /// 只有一个职业满足条件时自动选中，不需要玩家选择。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_selected: Option<ClassId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VillageVisit {
    #[serde(default)]
    pub accessory_offers: Vec<String>,
    #[serde(default)]
    pub companion_offers: Vec<String>,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    RunStarted {
        region_id: String,
        class_id: ClassId,
    },
    PhaseChanged {
        from: BattlePhase,
        to: BattlePhase,
    },
    DestinationsRolled {
        round: u32,
        options: Vec<DestinationId>,
    },
    DestinationChosen {
        destination_id: DestinationId,
        destination: DestinationType,
    },
    RestTaken {
        healed: i32,
    },
    EncounterStarted {
        enemy_key: String,
        elite: bool,
        boss: bool,
    },
    IntentRevealed {
        intent: Intent,
    },
    CardDrawn {
        card_id: CardId,
    },
    DeckReshuffled {
        cards: usize,
    },
    CardPlayed {
        card_id: CardId,
    },
    CardExhausted {
        card_id: CardId,
    },
    DamageResolved {
        target: Combatant,
        amount: i32,
        absorbed: i32,
    },
    BlockGained {
        target: Combatant,
        amount: i32,
    },
    BuffApplied {
        buff_id: String,
        stacks: u32,
    },
    BuffExpired {
        buff_id: String,
    },
    EnemyBuffed {
        value: i32,
    },
    CurseTriggered {
        damage: i32,
    },
    TurnEnded {
        turn: u32,
    },
    TurnStarted {
        turn: u32,
    },
    EncounterWon {
        gold: u32,
    },
    PlayerDefeated,
    RewardOffered {
        card_keys: Vec<String>,
    },
    CardAdded {
        card_id: CardId,
        card_key: String,
    },
    ClassAdvanced {
        class_id: ClassId,
    },
    AccessoryAcquired {
        accessory_id: String,
    },
    CompanionJoined {
        companion_id: String,
    },
    AltarActivated {
        reward_ids: Vec<String>,
        bonus_energy: bool,
    },
    RunCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("card id {card_id} appears more than once")]
    DuplicateCardId { card_id: CardId },
    #[error("battle holds {actual} cards but started with {expected}")]
    CardCountMismatch { expected: usize, actual: usize },
    #[error("hp {hp} exceeds max hp {max_hp}")]
    HpAboveMax { hp: i32, max_hp: i32 },
    #[error("phase {phase:?} requires an active battle")]
    MissingBattle { phase: BattlePhase },
}

/// 游戏整体状态，由单一控制者持有并显式传入每个操作。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub phase: BattlePhase,
    pub player: Player,
    pub run: RunState,
    /// 整局的完整卡组，每场战斗从它复制出抽牌堆。
    #[serde(default)]
    pub deck: Vec<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battle: Option<BattleState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<DestinationOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardOffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advancement: Option<AdvancementOffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<VillageVisit>,
    #[serde(default)]
    pub next_card_id: CardId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    pub fn new(player: Player, run: RunState) -> Self {
        Self {
            phase: BattlePhase::default(),
            player,
            run,
            deck: Vec::new(),
            battle: None,
            destinations: Vec::new(),
            reward: None,
            advancement: None,
            village: None,
            next_card_id: 1,
            event_log: Vec::new(),
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// 实例化一张卡牌并直接加入完整卡组。
    pub fn add_card_to_deck(&mut self, definition: &CardDefinition) -> CardId {
        let id = self.next_card_id;
        self.next_card_id += 1;
        self.deck.push(definition.instantiate(id));
        id
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.player.hp > self.player.max_hp {
            return Err(IntegrityError::HpAboveMax {
                hp: self.player.hp,
                max_hp: self.player.max_hp,
            });
        }

        let mut seen = HashSet::new();
        for card in &self.deck {
            if !seen.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
        }

        match &self.battle {
            Some(battle) => {
                let actual = battle.zone_total();
                if actual != battle.card_count {
                    return Err(IntegrityError::CardCountMismatch {
                        expected: battle.card_count,
                        actual,
                    });
                }
                let mut seen = HashSet::new();
                for card in battle.cards() {
                    if !seen.insert(card.id) {
                        return Err(IntegrityError::DuplicateCardId { card_id: card.id });
                    }
                }
            }
            None if matches!(self.phase, BattlePhase::PlayerTurn | BattlePhase::EnemyTurn) => {
                return Err(IntegrityError::MissingBattle { phase: self.phase });
            }
            None => {}
        }

        Ok(())
    }
}
