//! 置換表の性質テスト（proptest）

use proptest::prelude::*;
use ttable_core::tt::{GENERATION_DELTA, TTEntry, TranspositionTable};
use ttable_core::types::{Bound, DEPTH_MAX_STORABLE, DEPTH_OFFSET, Move, Value};

fn bound_strategy() -> impl Strategy<Value = Bound> {
    prop_oneof![Just(Bound::Upper), Just(Bound::Lower), Just(Bound::Exact)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// EXACT で保存した直後の probe は保存した内容をそのまま返す
    #[test]
    fn prop_exact_write_is_readable(
        key in any::<u64>().prop_filter("tag 0 is reserved", |k| *k as u16 != 0),
        value in -32000i32..=32000,
        eval in -32000i32..=32000,
        depth in DEPTH_OFFSET..=DEPTH_MAX_STORABLE,
        mv in 1u16..,
        is_pv in any::<bool>(),
    ) {
        let mut tt = TranspositionTable::new();
        tt.set_large_pages(false);
        tt.resize(1);

        tt.probe(key).write(
            Value::new(value), is_pv, Bound::Exact, depth, Move::from_u16(mv), Value::new(eval),
        );
        let hit = tt.probe(key);
        prop_assert!(hit.found);
        prop_assert_eq!(hit.data.value.raw(), value);
        prop_assert_eq!(hit.data.eval.raw(), eval);
        prop_assert_eq!(hit.data.depth, depth);
        prop_assert_eq!(hit.data.mv, Move::from_u16(mv));
        prop_assert_eq!(hit.data.bound, Bound::Exact);
        prop_assert_eq!(hit.data.is_pv, is_pv);
    }

    /// 世代が k 回進んだエントリの相対年齢は 8k（一周未満なら周回しても正しい）
    #[test]
    fn prop_relative_age_survives_wraparound(
        start in 0u8..32,
        steps in 0u8..32,
        is_pv in any::<bool>(),
        bound in bound_strategy(),
    ) {
        let written = start.wrapping_mul(GENERATION_DELTA);
        let now = written.wrapping_add(steps.wrapping_mul(GENERATION_DELTA));
        let mut entry = TTEntry::new();
        entry.save(1, Value::ZERO, is_pv, bound, 1, Move::NONE, Value::ZERO, written);
        prop_assert_eq!(entry.relative_age(now), steps.wrapping_mul(GENERATION_DELTA));
    }
}
