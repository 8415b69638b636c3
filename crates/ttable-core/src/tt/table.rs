//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/write操作

use super::alloc::{AllocError, AllocKind, Allocation, large_pages_enabled};
use super::clear::clear_clusters;
use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA, HASHFULL_SAMPLE_CLUSTERS};
use crate::options::{OPTION_HASH, OPTION_LARGE_PAGES, OPTION_THREADS, OptionsMap};
use crate::types::{Bound, Depth, Move, Value};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, Ordering};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
///
/// エントリは `UnsafeCell` 越しに非アトミックに読み書きする。
#[repr(C, align(32))]
pub struct Cluster {
    entries: [UnsafeCell<TTEntry>; CLUSTER_SIZE],
    _padding: [u8; 2], // 10 * 3 + 2 = 32 bytes
}

impl Cluster {
    /// 新しいクラスターを作成
    pub(super) const fn new() -> Self {
        Self {
            entries: [const { UnsafeCell::new(TTEntry::new()) }; CLUSTER_SIZE],
            _padding: [0; 2],
        }
    }

    /// i番目のエントリのコピーを読む
    #[inline]
    pub(super) fn load(&self, i: usize) -> TTEntry {
        // SAFETY: TTEntry は packed な Copy 型。並行書き込みとの競合で
        // 不整合な値を読むことはあるが、key16 の照合で検出できる
        unsafe { self.entries[i].get().read() }
    }

    #[inline]
    fn entry_ptr(&self, i: usize) -> *mut TTEntry {
        self.entries[i].get()
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

// クラスターは32バイトであることを保証（キャッシュラインに2つ収まる）
const _: () = assert!(std::mem::size_of::<Cluster>() == 32);

struct ClusterTable {
    alloc: Allocation,
    len: usize,
}

impl ClusterTable {
    /// ゼロクリアはしない（呼び出し側で clear する）
    fn new(len: usize, want_large_pages: bool) -> Result<Self, AllocError> {
        let bytes = len * std::mem::size_of::<Cluster>();
        let alloc = Allocation::allocate(bytes, want_large_pages)?;
        Ok(Self { alloc, len })
    }

    fn uses_large_pages(&self) -> bool {
        self.alloc.kind() == AllocKind::LargePages
    }
}

impl Deref for ClusterTable {
    type Target = [Cluster];

    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.alloc.ptr().as_ptr() as *const Cluster, self.len) }
    }
}

impl DerefMut for ClusterTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe {
            std::slice::from_raw_parts_mut(self.alloc.ptr().as_ptr() as *mut Cluster, self.len)
        }
    }
}

/// 置換表
///
/// `probe` / `ProbeResult::write` は `&self` で複数スレッドから同時に呼べる。
/// `resize` / `clear` は `&mut self` を要求するため、探索スレッドがすべて
/// 停止してテーブルへの参照を手放していることが型で保証される。
pub struct TranspositionTable {
    /// クラスターの配列（resize 前は未確保）
    table: Option<ClusterTable>,
    /// クラスター数
    cluster_count: usize,
    /// 世代カウンター（下位3bitは使用しない）
    generation8: AtomicU8,
    /// 最後に指定された 0 以外のサイズ（MB）
    last_mb_size: usize,
    /// clear に使うスレッド数
    threads: usize,
    /// Large Pages を使うか（オプション設定値）
    large_pages: bool,
}

impl TranspositionTable {
    /// 未確保の置換表を作成する
    ///
    /// 最初の `resize` までは probe できない。
    pub fn new() -> Self {
        Self {
            table: None,
            cluster_count: 0,
            generation8: AtomicU8::new(0),
            last_mb_size: 0,
            threads: 1,
            large_pages: true,
        }
    }

    /// サイズ（MB単位）を指定して作成
    pub fn with_size(mb_size: usize) -> Self {
        let mut tt = Self::new();
        tt.resize(mb_size);
        tt
    }

    /// オプションから作成
    pub fn with_options(options: &OptionsMap) -> Self {
        let mut tt = Self::new();
        tt.apply_options(options);
        tt
    }

    /// `Threads` / `LargePages` / `USI_Hash` を読み込み、必要ならサイズを変更する
    pub fn apply_options(&mut self, options: &OptionsMap) {
        if let Some(threads) = options.spin(OPTION_THREADS) {
            self.set_threads(threads.max(1) as usize);
        }
        if let Some(large_pages) = options.check(OPTION_LARGE_PAGES) {
            self.set_large_pages(large_pages);
        }
        if let Some(mb_size) = options.spin(OPTION_HASH) {
            self.resize(mb_size.max(0) as usize);
        }
    }

    /// clear に使うスレッド数を設定
    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    /// Large Pages の使用可否を設定（次の resize から反映）
    pub fn set_large_pages(&mut self, enabled: bool) {
        self.large_pages = enabled;
    }

    /// サイズを変更
    ///
    /// - `mb_size == 0` は前回指定したサイズを再利用する（未指定なら何もしない）
    /// - クラスター数も Large Pages の使用状態も変わらないなら何もしない
    /// - 確保後は常に clear する
    ///
    /// メモリ確保に失敗した場合はプロセスを終了する。
    pub fn resize(&mut self, mb_size: usize) {
        let mb_size = if mb_size == 0 { self.last_mb_size } else { mb_size };
        if mb_size == 0 {
            return;
        }
        self.last_mb_size = mb_size;

        let use_large_pages = large_pages_enabled(self.large_pages);
        let new_count = match cluster_count_for(mb_size) {
            Ok(count) => count,
            Err(e) => allocation_failed(e, mb_size),
        };

        if new_count == self.cluster_count && use_large_pages == self.uses_large_pages() {
            return;
        }

        // 新しいバッファを確保してから古いバッファを解放する
        let table = match ClusterTable::new(new_count, use_large_pages) {
            Ok(table) => table,
            Err(e) => allocation_failed(e, mb_size),
        };
        self.table = Some(table);
        self.cluster_count = new_count;
        log::debug!("transposition table resized: {mb_size}MB, {new_count} clusters");

        self.clear();
    }

    /// クリア（設定されたスレッド数で並列にゼロクリアする）
    pub fn clear(&mut self) {
        let threads = self.threads;
        if let Some(table) = self.table.as_mut() {
            clear_clusters(table, threads);
        }
    }

    /// 新しい探索を開始（世代を進める）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// クラスター数
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Large Pagesを使って確保されたかを返す
    pub fn uses_large_pages(&self) -> bool {
        self.table.as_ref().is_some_and(ClusterTable::uses_large_pages)
    }

    /// 置換表を検索
    ///
    /// キーが一致するか空のエントリがあればそれを返し、世代を更新する。
    /// 無ければ置換価値が最小のエントリを書き込み先として返す。
    ///
    /// 下位16bitが 0 のキーは空エントリと区別できないため、保存しても
    /// ヒットしない（空きエントリか置換対象を書き込み先として返すだけ）。
    ///
    /// 一度も `resize` していない置換表では、書き込みを捨てる結果を返す。
    pub fn probe(&self, key: u64) -> ProbeResult<'_> {
        let key16 = key as u16;
        let Some(cluster) = self.first_entry(key) else {
            return ProbeResult {
                found: false,
                data: TTData::EMPTY,
                writer: None,
                key16,
                generation8: &self.generation8,
            };
        };
        let gen8 = self.generation();

        // クラスター内を検索
        for i in 0..CLUSTER_SIZE {
            let entry = cluster.load(i);
            if entry.key16() == 0 || entry.key16() == key16 {
                // SAFETY: 非同期の書き込み。競合で壊れても次の書き込みで修復される
                unsafe { (*cluster.entry_ptr(i)).refresh(gen8) };

                let found = entry.is_occupied();
                return ProbeResult {
                    found,
                    data: if found { cluster.load(i).read() } else { TTData::EMPTY },
                    writer: Some(&cluster.entries[i]),
                    key16,
                    generation8: &self.generation8,
                };
            }
        }

        // 置換するエントリを選択（価値が最小のもの、同値なら先頭側）
        let mut replace = 0;
        let mut min_value = i32::MAX;

        for i in 0..CLUSTER_SIZE {
            // 置換価値 = depth8 - relative_age
            let value = cluster.load(i).replace_value(gen8);

            if value < min_value {
                min_value = value;
                replace = i;
            }
        }

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
            writer: Some(&cluster.entries[replace]),
            key16,
            generation8: &self.generation8,
        }
    }

    /// 置換表の使用率を1000分率で返す
    ///
    /// 先頭 `HASHFULL_SAMPLE_CLUSTERS` 個（それより小さい表なら全体）のクラスターから、
    /// 現在の世代のエントリの割合を求める。
    pub fn hashfull(&self) -> i32 {
        let sample_count = HASHFULL_SAMPLE_CLUSTERS.min(self.cluster_count);
        if sample_count == 0 {
            return 0;
        }

        let gen8 = self.generation();
        let count: usize = self
            .clusters()
            .iter()
            .take(sample_count)
            .map(|cluster| {
                (0..CLUSTER_SIZE)
                    .filter(|&i| {
                        let entry = cluster.load(i);
                        entry.is_occupied() && entry.generation8() == gen8
                    })
                    .count()
            })
            .sum();

        (count * 1000 / (sample_count * CLUSTER_SIZE)) as i32
    }

    /// 指定キーのクラスターをプリフェッチ
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let Some(cluster) = self.first_entry(key) else {
            return;
        };

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::_mm_prefetch;
            _mm_prefetch(cluster as *const _ as *const i8, 3); // _MM_HINT_T0
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = cluster; // 何もしない
    }

    #[inline]
    fn clusters(&self) -> &[Cluster] {
        self.table.as_deref().unwrap_or(&[])
    }

    /// クラスターインデックスを計算
    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        // (key >> 32) * cluster_count / 2^32 でインデックスを計算
        // 下位16bitはクラスター内の照合に使うため参照しない
        (((key >> 32) as u128 * self.cluster_count as u128) >> 32) as usize
    }

    /// クラスターの参照を取得（未確保なら None）
    #[inline]
    fn first_entry(&self, key: u64) -> Option<&Cluster> {
        self.clusters().get(self.cluster_index(key))
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// MB単位のサイズからクラスター数を求める
fn cluster_count_for(mb_size: usize) -> Result<usize, AllocError> {
    mb_size
        .checked_mul(1024 * 1024)
        .map(|bytes| bytes / std::mem::size_of::<Cluster>())
        .ok_or(AllocError::SizeOverflow { mb_size })
}

/// メモリ確保の失敗は回復できないため、報告してプロセスを終了する
fn allocation_failed(err: AllocError, mb_size: usize) -> ! {
    log::error!("Failed to allocate {mb_size}MB for transposition table: {err}");
    eprintln!("Failed to allocate {mb_size}MB for transposition table.");
    std::process::exit(1);
}

/// probe結果
///
/// 書き込み先エントリへの参照を持ち、置換表の借用が続く間だけ有効。
pub struct ProbeResult<'a> {
    /// ヒットしたか
    pub found: bool,
    /// 読み取ったデータ（ヒットしなければ `TTData::EMPTY`）
    pub data: TTData,
    /// 書き込み用エントリ（未確保の置換表では None）
    writer: Option<&'a UnsafeCell<TTEntry>>,
    key16: u16,
    /// 書き込み時点の世代を読むため、置換表の世代カウンターを参照する
    generation8: &'a AtomicU8,
}

impl ProbeResult<'_> {
    /// エントリに書き込む
    ///
    /// 置換するかどうかは `TTEntry::save` の規則に従う。
    /// 他スレッドの書き込みと競合しうるが、ロックは取らない。
    /// 世代は probe 時ではなく書き込み時点のものを記録する。
    /// キーの下位16bitが 0 の場合、書き込んでも以後の probe ではヒットしない。
    pub fn write(
        &self,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
    ) {
        let Some(writer) = self.writer else {
            return;
        };
        let generation8 = self.generation8.load(Ordering::Relaxed);

        // SAFETY: writer は resize と同時に生存できない（借用で保証）。
        // 並行書き込みとの競合は許容する
        unsafe {
            (*writer.get()).save(
                self.key16,
                value,
                is_pv,
                bound,
                depth,
                mv,
                eval,
                generation8,
            );
        }
    }

    /// 書き込み先エントリの現在の内容を読み直す
    pub fn entry(&self) -> TTEntry {
        // SAFETY: Cluster::load と同じ
        self.writer.map_or(TTEntry::new(), |writer| unsafe { writer.get().read() })
    }
}
