//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（10バイト、16bitキー）
//! - `Cluster`: エントリのグループ（32バイト）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//! - Large Pages 対応のメモリ確保とマルチスレッドのゼロクリア
//!
//! # CLUSTER_SIZE=3
//!
//! クラスターインデックスは64bitキーの上位32bitで決定し、
//! クラスター内マッチングに下位16bitを使用する。
//! 10バイトエントリ × 3 + 2パディング = 32バイト/クラスター。
//!
//! # 排他制御
//!
//! `probe` / `write` はロックもアトミック命令も使わない。
//! 複数スレッドからの同時書き込みでエントリが壊れることは許容し、
//! 16bitキーの不一致で検出、次回の書き込みで上書きされる前提で扱う。

mod alloc;
mod clear;
mod entry;
mod table;

pub use alloc::AllocError;
pub use entry::{TTData, TTEntry};
pub use table::{Cluster, ProbeResult, TranspositionTable};

/// クラスターサイズ（エントリ数）
/// 10bytes × 3 + 2padding = 32bytes
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
/// 256（u8の周期）+ 7（下位3bitのフラグが結果に影響しないためのバイアス）
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
pub const GENERATION_MASK: u16 = 0xF8; // (0xFF << GENERATION_BITS) as u8

/// キャッシュラインサイズ
pub const CACHE_LINE_SIZE: usize = 64;

/// hashfull で走査するクラスター数
pub const HASHFULL_SAMPLE_CLUSTERS: usize = 1000;

/// 同一局面で上書きするのに必要な深さの差
pub const DEPTH_REPLACE_MARGIN: i32 = 4;
