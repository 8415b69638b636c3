//! 置換表エントリー
//!
//! TTEntry: 10バイトのコンパクトなエントリ構造
//! TTData: 読み取り用のデータ構造

use super::{DEPTH_REPLACE_MARGIN, GENERATION_CYCLE, GENERATION_MASK};
use crate::types::{Bound, DEPTH_MAX_STORABLE, DEPTH_OFFSET, Depth, Move, Value};

/// 置換表エントリー
/// メモリ効率のため、フィールドを詰め込む（10バイト）
///
/// 全ゼロが空エントリを表す。key16 == 0 は「未使用」として予約している。
#[derive(Clone, Copy, Default)]
#[repr(C, packed)]
pub struct TTEntry {
    /// ハッシュキーの下位16bit（衝突検出用）
    key16: u16,
    /// 探索深さ（DEPTH_OFFSETを引いた値）
    depth8: u8,
    /// generation(5bit) | pv(1bit) | bound(2bit)
    gen_bound8: u8,
    /// 最善手（16bit形式）
    move16: u16,
    /// 探索値
    value16: i16,
    /// 評価値
    eval16: i16,
}

// エントリサイズが10バイトであることを保証
const _: () = assert!(std::mem::size_of::<TTEntry>() == 10);

impl TTEntry {
    /// 新しい空のエントリを作成
    #[inline]
    pub const fn new() -> Self {
        Self {
            key16: 0,
            depth8: 0,
            gen_bound8: 0,
            move16: 0,
            value16: 0,
            eval16: 0,
        }
    }

    /// エントリが使用されているか
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.key16 != 0
    }

    /// キーを取得
    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16
    }

    /// 深さを取得（DEPTH_OFFSETを加算）
    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth8 as Depth + DEPTH_OFFSET
    }

    /// 保存されている生のdepth8を取得
    #[inline]
    pub fn depth8(&self) -> u8 {
        self.depth8
    }

    /// generation | pv | bound の生の値を取得
    #[inline]
    pub fn gen_bound8(&self) -> u8 {
        self.gen_bound8
    }

    /// 格納されている世代（下位3bitを落としたもの）
    #[inline]
    pub fn generation8(&self) -> u8 {
        self.gen_bound8 & GENERATION_MASK as u8
    }

    /// 世代だけを現在のものに更新する（pv/boundは保持）
    #[inline]
    pub fn refresh(&mut self, generation8: u8) {
        self.gen_bound8 = generation8 | (self.gen_bound8 & 0x7);
    }

    /// エントリを読み取る
    pub fn read(&self) -> TTData {
        TTData {
            mv: Move::from_u16(self.move16),
            value: Value::new(self.value16 as i32),
            eval: Value::new(self.eval16 as i32),
            depth: self.depth(),
            bound: Bound::from_bits(self.gen_bound8),
            is_pv: (self.gen_bound8 & 0x4) != 0,
        }
    }

    /// エントリに保存
    ///
    /// # 引数が多い理由
    /// この関数は探索のホットパスで頻繁に呼ばれるため、
    /// 構造体にまとめるオーバーヘッドを避けて個別の引数として渡している。
    ///
    /// 書き込みはアトミックではなく、同じエントリへの並行書き込みと競合しうる。
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &mut self,
        key16: u16,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        // 新しい手がない場合は古い手を保持
        if !mv.is_none() || key16 != self.key16 {
            self.move16 = mv.to_u16();
        }

        // 上書き条件：
        // - 異なるキー
        // - DEPTH_REPLACE_MARGIN 以上深い探索
        // - BOUND_EXACT（確定値）
        let d8 = depth - DEPTH_OFFSET;
        if key16 != self.key16
            || d8 - self.depth8 as i32 >= DEPTH_REPLACE_MARGIN
            || bound == Bound::Exact
        {
            debug_assert!(
                (DEPTH_OFFSET..=DEPTH_MAX_STORABLE).contains(&depth),
                "depth out of storable range: {depth}"
            );

            self.key16 = key16;
            self.value16 = value.raw() as i16;
            self.eval16 = eval.raw() as i16;
            self.gen_bound8 = generation8 | ((is_pv as u8) << 2) | bound as u8;
            self.depth8 = d8 as u8;
        }
    }

    /// 相対的な世代（0 = 最新、1世代古いごとに8増える）
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        let age = GENERATION_CYCLE
            .wrapping_add(generation8 as u16)
            .wrapping_sub(self.gen_bound8 as u16);
        (age & GENERATION_MASK) as u8
    }

    /// 置換価値（小さいほど置換されやすい）
    #[inline]
    pub fn replace_value(&self, generation8: u8) -> i32 {
        self.depth8 as i32 - self.relative_age(generation8) as i32
    }
}

/// 置換表から読み取ったデータ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TTData {
    /// 最善手
    pub mv: Move,
    /// 探索値
    pub value: Value,
    /// 評価値
    pub eval: Value,
    /// 探索深さ
    pub depth: Depth,
    /// 境界タイプ
    pub bound: Bound,
    /// PVノードかどうか
    pub is_pv: bool,
}

impl TTData {
    /// 空のデータ
    pub const EMPTY: Self = Self {
        mv: Move::NONE,
        value: Value::NONE,
        eval: Value::NONE,
        depth: DEPTH_OFFSET,
        bound: Bound::None,
        is_pv: false,
    };
}

impl Default for TTData {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::GENERATION_DELTA;

    #[test]
    fn test_tt_entry_new() {
        let entry = TTEntry::new();
        assert!(!entry.is_occupied());
        assert_eq!(entry.key16(), 0);
        assert_eq!(entry.depth8(), 0);
    }

    #[test]
    fn test_tt_entry_save_and_read() {
        let mut entry = TTEntry::new();

        let key = 0x1234u16;
        let mv = Move::from_u16(0x0F0F);
        entry.save(key, Value::new(100), true, Bound::Exact, 10, mv, Value::new(-50), 8);

        assert!(entry.is_occupied());
        assert_eq!(entry.key16(), key);
        assert_eq!(entry.depth8(), 17);
        assert_eq!(entry.generation8(), 8);

        let data = entry.read();
        assert_eq!(data.mv, mv);
        assert_eq!(data.value.raw(), 100);
        assert_eq!(data.eval.raw(), -50);
        assert_eq!(data.depth, 10);
        assert_eq!(data.bound, Bound::Exact);
        assert!(data.is_pv);
    }

    #[test]
    fn test_tt_entry_depth_zero_is_not_empty() {
        let mut entry = TTEntry::new();
        entry.save(1, Value::ZERO, false, Bound::Lower, 0, Move::NONE, Value::ZERO, 0);
        assert_ne!(entry.depth8(), 0);
        assert_eq!(entry.read().depth, 0);
    }

    #[test]
    fn test_tt_entry_relative_age() {
        let mut entry = TTEntry::new();
        entry.save(1, Value::ZERO, false, Bound::Lower, 10, Move::NONE, Value::ZERO, 8);

        // 同じ世代では0
        assert_eq!(entry.relative_age(8), 0);

        // 世代が進むと8刻みでageが増える（GENERATION_DELTA = 8）
        assert_eq!(entry.relative_age(16), 8);
        assert_eq!(entry.relative_age(40), 32);
    }

    #[test]
    fn test_tt_entry_relative_age_ignores_flag_bits() {
        let mut entry = TTEntry::new();
        // pv=1, bound=Exact で下位3bitがすべて立つ
        entry.save(1, Value::ZERO, true, Bound::Exact, 10, Move::NONE, Value::ZERO, 16);
        assert_eq!(entry.gen_bound8() & 0x7, 0x7);
        assert_eq!(entry.relative_age(16), 0);
        assert_eq!(entry.relative_age(24), 8);
    }

    #[test]
    fn test_tt_entry_relative_age_wraparound() {
        // 世代 248 で書き込み、255 → 0 を跨いで 0 に進んだ場合
        let last = 256 - GENERATION_DELTA as u16;
        let mut entry = TTEntry::new();
        entry.save(1, Value::ZERO, true, Bound::Exact, 10, Move::NONE, Value::ZERO, last as u8);
        let wrapped = (last as u8).wrapping_add(GENERATION_DELTA);
        assert_eq!(wrapped, 0);
        assert_eq!(entry.relative_age(wrapped), GENERATION_DELTA);
        assert_eq!(entry.relative_age(wrapped.wrapping_add(GENERATION_DELTA)), 16);
    }

    #[test]
    fn test_tt_entry_refresh_keeps_flags() {
        let mut entry = TTEntry::new();
        entry.save(1, Value::ZERO, true, Bound::Upper, 3, Move::NONE, Value::ZERO, 8);
        entry.refresh(32);
        assert_eq!(entry.generation8(), 32);
        assert_eq!(entry.read().bound, Bound::Upper);
        assert!(entry.read().is_pv);
    }

    #[test]
    fn test_tt_entry_keeps_move_for_same_key() {
        let mut entry = TTEntry::new();
        let key = 0x4321u16;
        let mv = Move::from_u16(0x0ABC);
        entry.save(key, Value::new(10), false, Bound::Lower, 5, mv, Value::new(1), 0);

        // 同一キー・指し手なし・深さ差3・非EXACT → 何も書き換えない
        entry.save(key, Value::new(99), false, Bound::Lower, 8, Move::NONE, Value::new(2), 0);
        let data = entry.read();
        assert_eq!(data.mv, mv);
        assert_eq!(data.value.raw(), 10);
        assert_eq!(data.eval.raw(), 1);
        assert_eq!(data.depth, 5);
    }

    #[test]
    fn test_tt_entry_overwrites_when_deeper_by_margin() {
        let mut entry = TTEntry::new();
        let key = 0x4321u16;
        entry.save(key, Value::new(10), false, Bound::Lower, 5, Move::NONE, Value::ZERO, 0);
        entry.save(key, Value::new(20), false, Bound::Upper, 9, Move::NONE, Value::ZERO, 0);
        let data = entry.read();
        assert_eq!(data.value.raw(), 20);
        assert_eq!(data.depth, 9);
        assert_eq!(data.bound, Bound::Upper);
    }

    #[test]
    fn test_tt_entry_exact_always_overwrites() {
        let mut entry = TTEntry::new();
        let key = 0x4321u16;
        entry.save(key, Value::new(10), false, Bound::Lower, 20, Move::NONE, Value::ZERO, 0);
        entry.save(key, Value::new(30), false, Bound::Exact, 1, Move::NONE, Value::ZERO, 0);
        let data = entry.read();
        assert_eq!(data.value.raw(), 30);
        assert_eq!(data.depth, 1);
        assert_eq!(data.bound, Bound::Exact);
    }

    #[test]
    fn test_tt_entry_different_key_replaces_move() {
        let mut entry = TTEntry::new();
        entry.save(1, Value::ZERO, false, Bound::Lower, 20, Move::from_u16(7), Value::ZERO, 0);
        entry.save(2, Value::ZERO, false, Bound::Lower, 1, Move::NONE, Value::ZERO, 0);
        assert_eq!(entry.key16(), 2);
        assert_eq!(entry.read().mv, Move::NONE);
    }

    #[test]
    fn test_tt_data_empty() {
        let data = TTData::EMPTY;
        assert_eq!(data.mv, Move::NONE);
        assert_eq!(data.bound, Bound::None);
        assert!(!data.is_pv);
    }
}
