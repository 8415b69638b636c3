//! 境界値種別（Bound）

/// 境界値種別（置換表に格納する値の種類）
///
/// 2bitでエントリに詰め込まれるため、値は 0..=3 に限る。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Bound {
    /// なし
    #[default]
    None = 0,
    /// 上界（fail-low: 真の値はこれ以下）
    Upper = 1,
    /// 下界（fail-high: 真の値はこれ以上）
    Lower = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    /// 下位2bitから変換（上位bitは無視する）
    #[inline]
    pub const fn from_bits(bits: u8) -> Bound {
        match bits & 0x3 {
            1 => Bound::Upper,
            2 => Bound::Lower,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }
}
