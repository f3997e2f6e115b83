//! 静态内容表：卡牌、buff、敌人、区域、职业、饰品、设施、伙伴与祭坛契约。
//!
//! 内容在启动时加载一次，之后只读；规则代码只通过 id 查表，不为具体职业写分支。

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::effects::{CardEffect, EffectKind, EffectTarget, PassiveEffect, TriggerEvent};
use super::state::{Card, CardId, CardType, Intent};
use crate::log::content_warning;

pub type ClassId = String;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("invalid content catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Starter,
    Common,
    Uncommon,
    Rare,
    Special,
    Curse,
}

impl Rarity {
    pub fn is_rewardable(self) -> bool {
        matches!(self, Rarity::Common | Rarity::Uncommon | Rarity::Rare)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDefinition {
    pub key: String,
    pub name: String,
    pub card_type: CardType,
    pub cost: i32,
    #[serde(default)]
    pub effects: Vec<CardEffect>,
    #[serde(default)]
    pub exhaust: bool,
    pub rarity: Rarity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive: Option<PassiveEffect>,
}

impl CardDefinition {
    pub fn instantiate(&self, id: CardId) -> Card {
        Card {
            id,
            key: self.key.clone(),
            name: self.name.clone(),
            card_type: self.card_type,
            cost: self.cost,
            effects: self.effects.clone(),
            exhaust: self.exhaust,
            tags: self.tags.clone(),
            passive: self.passive.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuffDuration {
    Turns(u32),
    /// 整场战斗有效，只在战斗结束时清除。
    Combat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuffTrigger {
    pub event: TriggerEvent,
    pub kind: EffectKind,
    pub value: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuffDefinition {
    pub id: String,
    pub name: String,
    pub duration: BuffDuration,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub triggers: Vec<BuffTrigger>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnemyDefinition {
    pub key: String,
    pub name: String,
    pub max_hp: i32,
    /// 按回合循环的行动表。
    pub intents: Vec<Intent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionDefinition {
    pub id: String,
    pub name: String,
    pub boss_key: String,
    pub normal_enemies: Vec<String>,
    pub elite_enemies: Vec<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassTier {
    Base,
    Advanced,
}

/// 卡组中至少 `min_cards` 张带 `tag` 标签的卡。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvancementRequirement {
    pub tag: String,
    pub min_cards: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassDefinition {
    pub id: ClassId,
    pub name: String,
    pub tier: ClassTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<AdvancementRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub starter_deck: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlock_cards: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessoryEffect {
    MaxHp { amount: i32 },
    MaxEnergy { amount: i32 },
    Gold { amount: u32 },
    /// 每场战斗开始时获得护甲，不在选择时生效。
    CombatStartBlock { amount: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessoryDefinition {
    pub id: String,
    pub name: String,
    pub effect: AccessoryEffect,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    Tavern,
    BloodAltar,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacilityDefinition {
    pub id: String,
    pub name: String,
    pub kind: FacilityKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanionDefinition {
    pub id: String,
    pub name: String,
    pub card_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AltarBoon {
    Gold { amount: u32 },
    MaxHp { amount: i32 },
    Accessory { accessory_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AltarPenalty {
    HpCost { amount: i32 },
    GoldCost { amount: u32 },
    CurseCard { card_key: String },
    MonsterHpBuff { percent: f64 },
    MonsterAttackBuff { percent: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AltarRewardDefinition {
    pub id: String,
    pub name: String,
    pub boon: AltarBoon,
    pub penalty: AltarPenalty,
}

/// 外部内容文件的表格形式（数组），加载后按 id 建索引。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogTables {
    cards: Vec<CardDefinition>,
    buffs: Vec<BuffDefinition>,
    enemies: Vec<EnemyDefinition>,
    regions: Vec<RegionDefinition>,
    classes: Vec<ClassDefinition>,
    accessories: Vec<AccessoryDefinition>,
    facilities: Vec<FacilityDefinition>,
    companions: Vec<CompanionDefinition>,
    altar_rewards: Vec<AltarRewardDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogTables", into = "CatalogTables")]
pub struct ContentCatalog {
    cards: BTreeMap<String, CardDefinition>,
    buffs: BTreeMap<String, BuffDefinition>,
    enemies: BTreeMap<String, EnemyDefinition>,
    regions: BTreeMap<String, RegionDefinition>,
    classes: BTreeMap<ClassId, ClassDefinition>,
    accessories: BTreeMap<String, AccessoryDefinition>,
    facilities: BTreeMap<String, FacilityDefinition>,
    companions: BTreeMap<String, CompanionDefinition>,
    /// 祭坛契约保持声明顺序，"全选" 奖励按目录大小判断。
    altar_rewards: Vec<AltarRewardDefinition>,
}

impl From<CatalogTables> for ContentCatalog {
    fn from(tables: CatalogTables) -> Self {
        Self {
            cards: tables.cards.into_iter().map(|c| (c.key.clone(), c)).collect(),
            buffs: tables.buffs.into_iter().map(|b| (b.id.clone(), b)).collect(),
            enemies: tables.enemies.into_iter().map(|e| (e.key.clone(), e)).collect(),
            regions: tables.regions.into_iter().map(|r| (r.id.clone(), r)).collect(),
            classes: tables.classes.into_iter().map(|c| (c.id.clone(), c)).collect(),
            accessories: tables.accessories.into_iter().map(|a| (a.id.clone(), a)).collect(),
            facilities: tables.facilities.into_iter().map(|f| (f.id.clone(), f)).collect(),
            companions: tables.companions.into_iter().map(|c| (c.id.clone(), c)).collect(),
            altar_rewards: tables.altar_rewards,
        }
    }
}

impl From<ContentCatalog> for CatalogTables {
    fn from(catalog: ContentCatalog) -> Self {
        Self {
            cards: catalog.cards.into_values().collect(),
            buffs: catalog.buffs.into_values().collect(),
            enemies: catalog.enemies.into_values().collect(),
            regions: catalog.regions.into_values().collect(),
            classes: catalog.classes.into_values().collect(),
            accessories: catalog.accessories.into_values().collect(),
            facilities: catalog.facilities.into_values().collect(),
            companions: catalog.companions.into_values().collect(),
            altar_rewards: catalog.altar_rewards,
        }
    }
}

static SAMPLE: Lazy<ContentCatalog> = Lazy::new(build_sample);

impl ContentCatalog {
    /// 解析外部内容；悬空引用只记录警告，不拒绝加载。
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let catalog: ContentCatalog = serde_json::from_str(json)?;
        for problem in catalog.dangling_references() {
            content_warning(&problem);
        }
        Ok(catalog)
    }

    /// 内置示例区域，测试与前端调试使用。
    pub fn sample() -> Self {
        SAMPLE.clone()
    }

    pub fn card(&self, key: &str) -> Option<&CardDefinition> {
        self.cards.get(key)
    }

    pub fn buff(&self, id: &str) -> Option<&BuffDefinition> {
        self.buffs.get(id)
    }

    pub fn enemy(&self, key: &str) -> Option<&EnemyDefinition> {
        self.enemies.get(key)
    }

    pub fn region(&self, id: &str) -> Option<&RegionDefinition> {
        self.regions.get(id)
    }

    pub fn class(&self, id: &str) -> Option<&ClassDefinition> {
        self.classes.get(id)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    pub fn base_class(&self) -> Option<&ClassDefinition> {
        self.classes.values().find(|class| class.tier == ClassTier::Base)
    }

    pub fn accessory(&self, id: &str) -> Option<&AccessoryDefinition> {
        self.accessories.get(id)
    }

    pub fn accessory_ids(&self) -> impl Iterator<Item = &String> {
        self.accessories.keys()
    }

    pub fn facility(&self, id: &str) -> Option<&FacilityDefinition> {
        self.facilities.get(id)
    }

    pub fn companion(&self, id: &str) -> Option<&CompanionDefinition> {
        self.companions.get(id)
    }

    pub fn companion_ids(&self) -> impl Iterator<Item = &String> {
        self.companions.keys()
    }

    pub fn altar_reward(&self, id: &str) -> Option<&AltarRewardDefinition> {
        self.altar_rewards.iter().find(|reward| reward.id == id)
    }

    pub fn altar_rewards(&self) -> &[AltarRewardDefinition] {
        &self.altar_rewards
    }

    /// 可以出现在战斗奖励中的卡牌（按 key 排序，保证同一种子结果一致）。
    pub fn reward_pool(&self) -> Vec<&CardDefinition> {
        self.cards
            .values()
            .filter(|card| card.rarity.is_rewardable() && card.card_type != CardType::Curse)
            .collect()
    }

    pub fn insert_card(&mut self, card: CardDefinition) {
        self.cards.insert(card.key.clone(), card);
    }

    pub fn insert_buff(&mut self, buff: BuffDefinition) {
        self.buffs.insert(buff.id.clone(), buff);
    }

    pub fn insert_enemy(&mut self, enemy: EnemyDefinition) {
        self.enemies.insert(enemy.key.clone(), enemy);
    }

    pub fn dangling_references(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for card in self.cards.values() {
            for effect in &card.effects {
                if let Some(buff_id) = &effect.buff_id {
                    if !self.buffs.contains_key(buff_id) {
                        problems.push(format!(
                            "card `{}` references unknown buff `{buff_id}`",
                            card.key
                        ));
                    }
                }
            }
        }
        for region in self.regions.values() {
            let enemies = region
                .normal_enemies
                .iter()
                .chain(region.elite_enemies.iter())
                .chain(std::iter::once(&region.boss_key));
            for key in enemies {
                if !self.enemies.contains_key(key) {
                    problems.push(format!(
                        "region `{}` references unknown enemy `{key}`",
                        region.id
                    ));
                }
            }
            for facility in &region.facilities {
                if !self.facilities.contains_key(facility) {
                    problems.push(format!(
                        "region `{}` references unknown facility `{facility}`",
                        region.id
                    ));
                }
            }
        }
        for class in self.classes.values() {
            for key in class.starter_deck.iter().chain(class.unlock_cards.iter()) {
                if !self.cards.contains_key(key) {
                    problems.push(format!("class `{}` references unknown card `{key}`", class.id));
                }
            }
        }
        for companion in self.companions.values() {
            if !self.cards.contains_key(&companion.card_key) {
                problems.push(format!(
                    "companion `{}` references unknown card `{}`",
                    companion.id, companion.card_key
                ));
            }
        }
        for reward in &self.altar_rewards {
            if let AltarBoon::Accessory { accessory_id } = &reward.boon {
                if !self.accessories.contains_key(accessory_id) {
                    problems.push(format!(
                        "altar reward `{}` references unknown accessory `{accessory_id}`",
                        reward.id
                    ));
                }
            }
            if let AltarPenalty::CurseCard { card_key } = &reward.penalty {
                if !self.cards.contains_key(card_key) {
                    problems.push(format!(
                        "altar reward `{}` references unknown card `{card_key}`",
                        reward.id
                    ));
                }
            }
        }

        problems
    }
}

fn card(
    key: &str,
    name: &str,
    card_type: CardType,
    cost: i32,
    rarity: Rarity,
    effects: Vec<CardEffect>,
) -> CardDefinition {
    CardDefinition {
        key: key.into(),
        name: name.into(),
        card_type,
        cost,
        effects,
        exhaust: false,
        rarity,
        tags: Vec::new(),
        passive: None,
    }
}

fn tagged(mut definition: CardDefinition, tag: &str) -> CardDefinition {
    definition.tags.push(tag.into());
    definition
}

fn exhausting(mut definition: CardDefinition) -> CardDefinition {
    definition.exhaust = true;
    definition
}

fn enemy(key: &str, name: &str, max_hp: i32, intents: Vec<Intent>) -> EnemyDefinition {
    EnemyDefinition {
        key: key.into(),
        name: name.into(),
        max_hp,
        intents,
    }
}

fn build_sample() -> ContentCatalog {
    use CardType::{Attack, Curse, Power, Skill};
    use Intent::{Attack as Hit, Buff as Roar, Defend as Guard};

    let mut regret = card("regret", "Regret", Curse, 0, Rarity::Curse, Vec::new());
    regret.passive = Some(PassiveEffect {
        trigger: TriggerEvent::TurnStart,
        kind: EffectKind::Damage,
        value: 2,
    });

    let cards = vec![
        card("strike", "Strike", Attack, 1, Rarity::Starter, vec![CardEffect::damage(6)]),
        card("defend", "Defend", Skill, 1, Rarity::Starter, vec![CardEffect::block(5)]),
        card(
            "iron_wave",
            "Iron Wave",
            Attack,
            1,
            Rarity::Common,
            vec![CardEffect::damage(5), CardEffect::block(5)],
        ),
        card(
            "flurry",
            "Flurry",
            Attack,
            1,
            Rarity::Common,
            vec![CardEffect::damage(3), CardEffect::damage(3), CardEffect::damage(3)],
        ),
        card("battle_trance", "Battle Trance", Skill, 0, Rarity::Common, vec![CardEffect::draw(2)]),
        card(
            "metallicize",
            "Metallicize",
            Power,
            1,
            Rarity::Uncommon,
            vec![CardEffect::apply_buff("plating")],
        ),
        exhausting(card(
            "shield_wall",
            "Shield Wall",
            Skill,
            2,
            Rarity::Uncommon,
            vec![CardEffect::block(12)],
        )),
        exhausting(card(
            "adrenaline",
            "Adrenaline",
            Skill,
            0,
            Rarity::Rare,
            vec![CardEffect::energy(1), CardEffect::draw(1)],
        )),
        card(
            "fortify",
            "Fortify",
            Skill,
            1,
            Rarity::Common,
            vec![CardEffect::apply_buff("barricade")],
        ),
        tagged(
            card(
                "rage_strike",
                "Rage Strike",
                Attack,
                1,
                Rarity::Common,
                vec![CardEffect::damage(8)],
            ),
            "berserker",
        ),
        tagged(
            card(
                "blood_frenzy",
                "Blood Frenzy",
                Attack,
                2,
                Rarity::Uncommon,
                vec![CardEffect::damage(4), CardEffect::damage(4), CardEffect::damage(4)],
            ),
            "berserker",
        ),
        tagged(
            card("bulwark", "Bulwark", Skill, 1, Rarity::Common, vec![CardEffect::block(8)]),
            "guardian",
        ),
        tagged(
            card(
                "aegis",
                "Aegis",
                Skill,
                2,
                Rarity::Uncommon,
                vec![CardEffect::block(6), CardEffect::apply_buff("plating")],
            ),
            "guardian",
        ),
        tagged(
            card(
                "berserk_roar",
                "Berserk Roar",
                Power,
                1,
                Rarity::Special,
                vec![CardEffect::apply_buff("fury")],
            ),
            "berserker",
        ),
        tagged(
            exhausting(card(
                "bastion",
                "Bastion",
                Skill,
                1,
                Rarity::Special,
                vec![CardEffect::block(15)],
            )),
            "guardian",
        ),
        card("wolf_bite", "Wolf Bite", Attack, 0, Rarity::Special, vec![CardEffect::damage(4)]),
        card(
            "squire_guard",
            "Squire's Guard",
            Skill,
            0,
            Rarity::Special,
            vec![CardEffect::new(EffectKind::Block, 4, EffectTarget::Actor)],
        ),
        regret,
    ];

    let buffs = vec![
        BuffDefinition {
            id: "plating".into(),
            name: "Plating".into(),
            duration: BuffDuration::Combat,
            stackable: true,
            triggers: vec![BuffTrigger {
                event: TriggerEvent::TurnStart,
                kind: EffectKind::Block,
                value: 3,
            }],
        },
        BuffDefinition {
            id: "barricade".into(),
            name: "Barricade".into(),
            duration: BuffDuration::Turns(2),
            stackable: false,
            triggers: vec![BuffTrigger {
                event: TriggerEvent::TurnStart,
                kind: EffectKind::Block,
                value: 4,
            }],
        },
        BuffDefinition {
            id: "fury".into(),
            name: "Fury".into(),
            duration: BuffDuration::Combat,
            stackable: true,
            triggers: vec![BuffTrigger {
                event: TriggerEvent::TurnEnd,
                kind: EffectKind::Damage,
                value: 3,
            }],
        },
    ];

    let enemies = vec![
        enemy(
            "slime",
            "Acid Slime",
            20,
            vec![Hit { value: 6 }, Guard { value: 5 }, Hit { value: 8 }],
        ),
        enemy(
            "cultist",
            "Cultist",
            30,
            vec![Roar { value: 3 }, Hit { value: 7 }, Hit { value: 7 }],
        ),
        enemy(
            "goblin",
            "Goblin Raider",
            18,
            vec![Hit { value: 5 }, Hit { value: 5 }, Guard { value: 4 }],
        ),
        enemy(
            "knight",
            "Fallen Knight",
            55,
            vec![Hit { value: 12 }, Guard { value: 10 }, Hit { value: 14 }],
        ),
        enemy("hexer", "Hexer", 50, vec![Hit { value: 9 }, Roar { value: 2 }, Hit { value: 11 }]),
        enemy(
            "dragon",
            "Ember Dragon",
            120,
            vec![Hit { value: 15 }, Guard { value: 12 }, Hit { value: 20 }, Roar { value: 5 }],
        ),
    ];

    let regions = vec![RegionDefinition {
        id: "ember_vale".into(),
        name: "Ember Vale".into(),
        boss_key: "dragon".into(),
        normal_enemies: vec!["slime".into(), "cultist".into(), "goblin".into()],
        elite_enemies: vec!["knight".into(), "hexer".into()],
        facilities: vec!["tavern".into(), "blood_altar".into()],
    }];

    let mut starter_deck = vec!["strike".to_string(); 5];
    starter_deck.extend(vec!["defend".to_string(); 4]);
    starter_deck.push("iron_wave".into());

    let classes = vec![
        ClassDefinition {
            id: "warrior".into(),
            name: "Warrior".into(),
            tier: ClassTier::Base,
            requirement: None,
            starter_deck,
            unlock_cards: Vec::new(),
        },
        ClassDefinition {
            id: "berserker".into(),
            name: "Berserker".into(),
            tier: ClassTier::Advanced,
            requirement: Some(AdvancementRequirement {
                tag: "berserker".into(),
                min_cards: 3,
            }),
            starter_deck: Vec::new(),
            unlock_cards: vec!["berserk_roar".into()],
        },
        ClassDefinition {
            id: "guardian".into(),
            name: "Guardian".into(),
            tier: ClassTier::Advanced,
            requirement: Some(AdvancementRequirement {
                tag: "guardian".into(),
                min_cards: 3,
            }),
            starter_deck: Vec::new(),
            unlock_cards: vec!["bastion".into()],
        },
    ];

    let accessories = vec![
        AccessoryDefinition {
            id: "ruby_ring".into(),
            name: "Ruby Ring".into(),
            effect: AccessoryEffect::MaxHp { amount: 10 },
        },
        AccessoryDefinition {
            id: "mana_charm".into(),
            name: "Mana Charm".into(),
            effect: AccessoryEffect::MaxEnergy { amount: 1 },
        },
        AccessoryDefinition {
            id: "coin_purse".into(),
            name: "Coin Purse".into(),
            effect: AccessoryEffect::Gold { amount: 50 },
        },
        AccessoryDefinition {
            id: "iron_badge".into(),
            name: "Iron Badge".into(),
            effect: AccessoryEffect::CombatStartBlock { amount: 5 },
        },
    ];

    let facilities = vec![
        FacilityDefinition {
            id: "tavern".into(),
            name: "Tavern".into(),
            kind: FacilityKind::Tavern,
        },
        FacilityDefinition {
            id: "blood_altar".into(),
            name: "Blood Altar".into(),
            kind: FacilityKind::BloodAltar,
        },
    ];

    let companions = vec![
        CompanionDefinition {
            id: "wolf".into(),
            name: "Grey Wolf".into(),
            card_key: "wolf_bite".into(),
        },
        CompanionDefinition {
            id: "squire".into(),
            name: "Squire".into(),
            card_key: "squire_guard".into(),
        },
    ];

    let altar_rewards = vec![
        AltarRewardDefinition {
            id: "pact_of_blood".into(),
            name: "Pact of Blood".into(),
            boon: AltarBoon::Gold { amount: 100 },
            penalty: AltarPenalty::HpCost { amount: 10 },
        },
        AltarRewardDefinition {
            id: "pact_of_ash".into(),
            name: "Pact of Ash".into(),
            boon: AltarBoon::MaxHp { amount: 8 },
            penalty: AltarPenalty::CurseCard {
                card_key: "regret".into(),
            },
        },
        AltarRewardDefinition {
            id: "pact_of_fangs".into(),
            name: "Pact of Fangs".into(),
            boon: AltarBoon::Accessory {
                accessory_id: "iron_badge".into(),
            },
            penalty: AltarPenalty::MonsterHpBuff { percent: 0.2 },
        },
    ];

    ContentCatalog::from(CatalogTables {
        cards,
        buffs,
        enemies,
        regions,
        classes,
        accessories,
        facilities,
        companions,
        altar_rewards,
    })
}
