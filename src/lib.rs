pub mod game;
mod log;

use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use game::{
    BattlePhase, BattleState, Card, CardEffect, CardId, CardType, ContentCatalog, DestinationId,
    DestinationKind, DestinationOption, EffectKind, Enemy, GameAction, GameEvent, GameState,
    IntegrityError, Intent, Player, RuleEngine, RuleError, RuleResolution, RulesConfig, RunState,
    ScheduledStep,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

/// 浏览器侧持有的一局冒险：规则引擎与唯一的状态快照。
#[wasm_bindgen]
pub struct RunEngine {
    engine: RuleEngine,
    state: GameState,
}

#[wasm_bindgen]
impl RunEngine {
    /// 不传内容与配置时使用内置示例区域和默认数值；传入种子可复现整局。
    #[wasm_bindgen(constructor)]
    pub fn new(
        region_id: &str,
        seed: Option<u32>,
        content_json: Option<String>,
        config_json: Option<String>,
    ) -> Result<RunEngine, JsValue> {
        let content = match content_json {
            Some(json) => ContentCatalog::from_json(&json).map_err(serde_to_js_error)?,
            None => ContentCatalog::sample(),
        };
        let config = match config_json {
            Some(json) => RulesConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => RulesConfig::default(),
        };
        let mut engine = match seed {
            Some(seed) => RuleEngine::with_seed(content, config, u64::from(seed)),
            None => RuleEngine::new(content, config),
        };
        let state = engine.start_run(region_id).map_err(to_js_error)?;
        Ok(RunEngine { engine, state })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    /// 恢复外部保存的快照，损坏的快照直接拒绝。
    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        state
            .integrity_check()
            .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
        self.state = state;
        Ok(())
    }

    pub fn apply_action_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: GameAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        self.dispatch(&action)
    }

    pub fn play_card(&mut self, card_id: u32) -> Result<String, JsValue> {
        self.dispatch(&GameAction::PlayCard { card_id })
    }

    pub fn end_turn(&mut self) -> Result<String, JsValue> {
        self.dispatch(&GameAction::EndTurn)
    }

    pub fn enemy_act(&mut self) -> Result<String, JsValue> {
        self.dispatch(&GameAction::EnemyAct)
    }

    pub fn choose_destination(&mut self, destination_id: u64) -> Result<String, JsValue> {
        self.dispatch(&GameAction::ChooseDestination { destination_id })
    }

    pub fn choose_reward_card(&mut self, card_key: Option<String>) -> Result<String, JsValue> {
        self.dispatch(&GameAction::ChooseRewardCard { card_key })
    }

    pub fn confirm_advancement(&mut self, class_id: Option<String>) -> Result<String, JsValue> {
        self.dispatch(&GameAction::ConfirmAdvancement { class_id })
    }

    pub fn enter_village(&mut self) -> Result<String, JsValue> {
        self.dispatch(&GameAction::EnterVillage)
    }

    pub fn choose_accessory(&mut self, accessory_id: String) -> Result<String, JsValue> {
        self.dispatch(&GameAction::ChooseAccessory { accessory_id })
    }

    pub fn choose_facility(&mut self, facility_id: String) -> Result<String, JsValue> {
        self.dispatch(&GameAction::ChooseFacility { facility_id })
    }

    pub fn choose_companion(&mut self, companion_id: Option<String>) -> Result<String, JsValue> {
        self.dispatch(&GameAction::ChooseCompanion { companion_id })
    }

    pub fn choose_altar_rewards(&mut self, reward_ids: JsValue) -> Result<String, JsValue> {
        let reward_ids: Vec<String> = from_value(reward_ids).map_err(JsValue::from)?;
        self.dispatch(&GameAction::ChooseAltarRewards { reward_ids })
    }

    pub fn leave_village(&mut self) -> Result<String, JsValue> {
        self.dispatch(&GameAction::LeaveVillage)
    }

    /// 当前阶段需要自动推进时，等待节奏延迟后返回下一步动作（JSON），否则立即返回 null。
    pub fn await_next_step(&self) -> Promise {
        let step = game::pacing::follow_up(&self.state, self.engine.config());

        future_to_promise(async move {
            let Some(step) = step else {
                return Ok(JsValue::NULL);
            };
            if step.delay_ms > 0 {
                TimeoutFuture::new(step.delay_ms).await;
            }
            let json = serde_json::to_string(&step.action).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

impl RunEngine {
    fn dispatch(&mut self, action: &GameAction) -> Result<String, JsValue> {
        let resolution = self
            .engine
            .resolve(&mut self.state, action)
            .map_err(to_js_error)?;
        make_resolution_json(resolution)
    }
}

#[wasm_bindgen(js_name = "createSampleCatalog")]
pub fn create_sample_catalog() -> Result<JsValue, JsValue> {
    to_value(&ContentCatalog::sample()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "defaultRulesConfig")]
pub fn default_rules_config() -> Result<JsValue, JsValue> {
    to_value(&RulesConfig::default()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

/// 纯表现层的等待，规则从不依赖它。
#[wasm_bindgen(js_name = "wait")]
pub fn wait(delay_ms: u32) -> Promise {
    future_to_promise(async move {
        TimeoutFuture::new(delay_ms).await;
        Ok(JsValue::UNDEFINED)
    })
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
