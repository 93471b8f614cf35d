//! 促销转盘
//!
//! 奖项按权重抽取：在 `[0, 总权重)` 内均匀取一个数，
//! 落在哪个奖项的区间就中哪个奖项。

use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Prize {
    pub code: &'static str,
    pub label: &'static str,
    pub weight: u32,
}

/// 转盘上的奖项，顺序即区间顺序
pub const PRIZES: &[Prize] = &[
    Prize {
        code: "free_dessert",
        label: "Postre gratis",
        weight: 5,
    },
    Prize {
        code: "discount_20",
        label: "20% de descuento",
        weight: 10,
    },
    Prize {
        code: "discount_10",
        label: "10% de descuento",
        weight: 25,
    },
    Prize {
        code: "extra_topping",
        label: "Topping extra",
        weight: 20,
    },
    Prize {
        code: "try_again",
        label: "Sigue intentando",
        weight: 40,
    },
];

pub fn total_weight(prizes: &[Prize]) -> u32 {
    prizes.iter().map(|p| p.weight).sum()
}

/// 根据抽到的数选出奖项；`roll` 超出总权重时返回 `None`
pub fn pick_prize(prizes: &[Prize], roll: u32) -> Option<&Prize> {
    let mut upper = 0u32;
    for prize in prizes {
        upper += prize.weight;
        if roll < upper {
            return Some(prize);
        }
    }
    None
}

/// 转一次默认转盘
pub fn spin<R: Rng>(rng: &mut R) -> &'static Prize {
    let roll = rng.gen_range(0..total_weight(PRIZES));
    // 总权重内的 roll 必然落在某个区间
    pick_prize(PRIZES, roll).unwrap_or(&PRIZES[PRIZES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn weights_are_positive() {
        assert!(PRIZES.iter().all(|p| p.weight > 0));
        assert_eq!(total_weight(PRIZES), 100);
    }

    #[test]
    fn boundaries_follow_cumulative_weights() {
        assert_eq!(pick_prize(PRIZES, 0).unwrap().code, "free_dessert");
        assert_eq!(pick_prize(PRIZES, 4).unwrap().code, "free_dessert");
        assert_eq!(pick_prize(PRIZES, 5).unwrap().code, "discount_20");
        assert_eq!(pick_prize(PRIZES, 14).unwrap().code, "discount_20");
        assert_eq!(pick_prize(PRIZES, 15).unwrap().code, "discount_10");
        assert_eq!(pick_prize(PRIZES, 99).unwrap().code, "try_again");
        assert!(pick_prize(PRIZES, 100).is_none());
    }

    #[test]
    fn seeded_spins_cover_every_prize() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2_000 {
            seen.insert(spin(&mut rng).code);
        }
        assert_eq!(seen.len(), PRIZES.len());
    }

    proptest! {
        #[test]
        fn every_roll_in_range_picks_a_prize(roll in 0u32..100) {
            prop_assert!(pick_prize(PRIZES, roll).is_some());
        }
    }
}
