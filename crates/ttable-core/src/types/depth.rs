//! 探索深さ（Depth）

/// 探索深さ
pub type Depth = i32;

/// TT格納用オフセット
///
/// depth8 = depth - DEPTH_OFFSET として格納するため、
/// 全ゼロのエントリが「depth 0」と区別できる。
pub const DEPTH_OFFSET: Depth = -7;

/// TTに格納できる最大深さ（depth8 が u8 に収まる上限）
pub const DEPTH_MAX_STORABLE: Depth = u8::MAX as Depth + DEPTH_OFFSET;

// 定数間の関係をコンパイル時に検証する
const _: () = {
    assert!(DEPTH_OFFSET == -7);
    assert!(DEPTH_MAX_STORABLE == 248);
};
