//! 指し手（Move）
//!
//! 置換表から見た指し手は16bitの不透明な値で、
//! 0 だけが「指し手なし」として特別扱いされる。

/// 16bitの指し手表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// 指し手なし
    pub const NONE: Move = Move(0);

    /// 16bit表現から生成
    #[inline]
    pub const fn from_u16(raw: u16) -> Move {
        Move(raw)
    }

    /// 16bit表現を取得
    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// 指し手なしかどうか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_none() {
        assert!(Move::NONE.is_none());
        assert!(Move::default().is_none());
        assert!(!Move::from_u16(0x1234).is_none());
    }

    #[test]
    fn test_move_roundtrip_raw() {
        assert_eq!(Move::from_u16(0xBEEF).to_u16(), 0xBEEF);
    }
}
