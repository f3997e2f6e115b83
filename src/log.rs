//! 诊断输出：内容数据问题与阶段切换日志。

use crate::game::BattlePhase;

#[cfg(target_arch = "wasm32")]
fn console_mirror(message: &str) {
    web_sys::console::warn_1(&message.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn console_mirror(_message: &str) {}

/// 内容数据不一致（未知 buff、未知效果类型等）时调用，只跳过最小粒度的数据。
pub fn content_warning(message: &str) {
    tracing::warn!(target: "deckbound::content", "{message}");
    console_mirror(message);
}

pub fn phase_transition(from: &BattlePhase, to: &BattlePhase) {
    tracing::debug!(target: "deckbound::phase", from = ?from, to = ?to, "phase transition");
}
