//! 評価値（Value）
//!
//! 置換表には16bitに切り詰めて格納するため、
//! i16 に収まる範囲で使うことを前提とする。

/// 評価値
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// ゼロ
    pub const ZERO: Value = Value(0);
    /// 無効値
    pub const NONE: Value = Value(32002);

    /// 値から生成
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}
