//! ttable-core
//!
//! 探索エンジン向けの共有置換表（Transposition Table）。
//!
//! - [`tt`]: 置換表本体（エントリ・クラスター・probe/write・世代・確保・クリア）
//! - [`options`]: 置換表が名前で参照するエンジンオプション
//! - [`types`]: 置換表に格納する値の型
//!
//! ```
//! use ttable_core::tt::TranspositionTable;
//! use ttable_core::types::{Bound, Move, Value};
//!
//! let tt = TranspositionTable::with_size(1);
//! tt.new_search();
//!
//! let key = 0x0123_4567_89AB_CDEF;
//! let probe = tt.probe(key);
//! assert!(!probe.found);
//! probe.write(Value::new(42), false, Bound::Exact, 8, Move::NONE, Value::new(30));
//!
//! let hit = tt.probe(key);
//! assert!(hit.found);
//! assert_eq!(hit.data.value.raw(), 42);
//! ```

pub mod options;
pub mod tt;
pub mod types;

pub use options::{OptionError, OptionValue, OptionsMap};
pub use tt::{ProbeResult, TTData, TranspositionTable};
