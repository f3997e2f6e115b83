//! 目的地生成：每回合给出一组互不重复类型的选项，第一项固定为普通战斗。

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

use super::config::RulesConfig;
use super::content::RegionDefinition;
use super::state::{DestinationId, DestinationKind, DestinationOption, DestinationType};
use crate::log::content_warning;

static NEXT_DESTINATION_ID: AtomicU64 = AtomicU64::new(1);

/// 进程内唯一且单调递增。
pub fn next_destination_id() -> DestinationId {
    NEXT_DESTINATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// 生成本回合的目的地选项。最终回合只有一个 boss 选项。
pub fn generate<R: Rng + ?Sized>(
    round: u32,
    total_rounds: u32,
    region: &RegionDefinition,
    config: &RulesConfig,
    rng: &mut R,
) -> Vec<DestinationOption> {
    if round == total_rounds {
        return vec![DestinationOption {
            id: next_destination_id(),
            kind: DestinationKind::Elite {
                enemy_key: region.boss_key.clone(),
                boss: true,
            },
        }];
    }

    let count = config.option_count(round);
    let mut used_enemies = Vec::new();
    let mut used_types = Vec::new();
    let mut options = Vec::with_capacity(count);

    options.push(DestinationOption {
        id: next_destination_id(),
        kind: DestinationKind::Normal {
            enemy_key: pick_enemy(&region.normal_enemies, &mut used_enemies, rng),
        },
    });

    for _ in 1..count {
        let kind = match roll_type(round, config, &used_types, rng) {
            Some(DestinationType::Elite) => {
                used_types.push(DestinationType::Elite);
                let pool = if region.elite_enemies.is_empty() {
                    &region.normal_enemies
                } else {
                    &region.elite_enemies
                };
                DestinationKind::Elite {
                    enemy_key: pick_enemy(pool, &mut used_enemies, rng),
                    boss: false,
                }
            }
            Some(DestinationType::Rest) => {
                used_types.push(DestinationType::Rest);
                DestinationKind::Rest {
                    heal_percent: config.rest_heal_percent,
                }
            }
            Some(DestinationType::Shop) => {
                used_types.push(DestinationType::Shop);
                DestinationKind::Shop
            }
            Some(DestinationType::Event) => {
                used_types.push(DestinationType::Event);
                DestinationKind::Event
            }
            Some(DestinationType::Normal) | None => DestinationKind::Normal {
                enemy_key: pick_enemy(&region.normal_enemies, &mut used_enemies, rng),
            },
        };
        options.push(DestinationOption {
            id: next_destination_id(),
            kind,
        });
    }

    options
}

/// 累积概率抽取一个特殊类型；已出现或未解锁的类型不参与累积。
fn roll_type<R: Rng + ?Sized>(
    round: u32,
    config: &RulesConfig,
    used: &[DestinationType],
    rng: &mut R,
) -> Option<DestinationType> {
    let weights = &config.destination_weights;
    let table = [
        (DestinationType::Elite, weights.elite, config.elite_min_round),
        (DestinationType::Rest, weights.rest, 0),
        (DestinationType::Shop, weights.shop, config.shop_min_round),
        (DestinationType::Event, weights.event, 0),
    ];

    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (kind, weight, min_round) in table {
        if used.contains(&kind) || round < min_round {
            continue;
        }
        cumulative += weight.max(0.0);
        if roll < cumulative {
            return Some(kind);
        }
    }
    None
}

/// 优先挑本回合还没出现过的敌人，池子用尽后允许重复。
fn pick_enemy<R: Rng + ?Sized>(pool: &[String], used: &mut Vec<String>, rng: &mut R) -> String {
    let fresh: Vec<&String> = pool.iter().filter(|key| !used.contains(key)).collect();
    let chosen = fresh
        .choose(rng)
        .map(|key| (*key).clone())
        .or_else(|| pool.choose(rng).cloned());

    match chosen {
        Some(key) => {
            used.push(key.clone());
            key
        }
        None => {
            content_warning("region has an empty enemy pool");
            String::new()
        }
    }
}
