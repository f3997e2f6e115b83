//! 游戏核心逻辑模块（状态、内容表、战斗、进度与阶段状态机）。

pub mod advancement;
pub mod buffs;
pub mod combat;
pub mod config;
pub mod content;
pub mod effects;
pub mod pacing;
pub mod progression;
pub mod rules;
pub mod state;
pub mod village;

pub use buffs::{ActiveBuff, BuffLedger, TriggerTotals};
pub use config::{ConfigError, RulesConfig};
pub use content::{ClassId, ContentCatalog, ContentError};
pub use effects::{CardEffect, EffectBundle, EffectKind, EffectTarget, TriggerEvent};
pub use pacing::ScheduledStep;
pub use rules::{GameAction, RuleEngine, RuleError, RuleResolution};
pub use state::{
    BattlePhase,
    BattleState,
    Card,
    CardId,
    CardType,
    DestinationId,
    DestinationKind,
    DestinationOption,
    Enemy,
    GameEvent,
    GameState,
    IntegrityError,
    Intent,
    Player,
    RunState,
};
