//! 基本型モジュール
//!
//! 置換表が格納する不透明な値の型を定義する。
//! 探索側の評価値・指し手・深さの意味はここでは解釈しない。
//!
//! ```text
//! Value, Move, Depth, Bound はいずれも独立
//! ```

mod bound;
mod depth;
mod moves;
mod value;

pub use bound::Bound;
pub use depth::*;
pub use moves::Move;
pub use value::Value;
