//! 置換表のマルチスレッド ゼロクリア
//!
//! 各スレッドが連続したクラスター範囲を担当し、最後のスレッドが端数を引き受ける。
//! first-touch ポリシーの環境では、ゼロクリアしたスレッドのNUMAノードにページが割り当たる。

use super::table::Cluster;

/// この数を超えるスレッドでクリアする場合、各スレッドをCPUに固定する
const BIND_THREAD_THRESHOLD: usize = 8;

/// `clusters` 全体を `threads` 本のスレッドでゼロクリアする
///
/// すべてのスレッドが終わるまで戻らない。
pub(super) fn clear_clusters(clusters: &mut [Cluster], threads: usize) {
    let threads = threads.max(1);

    if threads == 1 {
        zero(clusters);
        return;
    }

    let stride = clusters.len() / threads;
    let bind = threads > BIND_THREAD_THRESHOLD;

    std::thread::scope(|scope| {
        let mut rest = clusters;
        for idx in 0..threads {
            let len = if idx == threads - 1 { rest.len() } else { stride };
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(len);
            rest = tail;

            scope.spawn(move || {
                if bind {
                    bind_this_thread(idx);
                }
                zero(chunk);
            });
        }
    });
}

#[inline]
fn zero(chunk: &mut [Cluster]) {
    // SAFETY: Cluster は全ゼロが空エントリを表す有効なビットパターン
    unsafe {
        std::ptr::write_bytes(chunk.as_mut_ptr(), 0, chunk.len());
    }
}

/// 呼び出したスレッドを `idx` 番目のCPUに固定する（失敗は無視）
#[cfg(target_os = "linux")]
fn bind_this_thread(idx: usize) {
    let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());

    // SAFETY: cpu_set_t はゼロ初期化が有効な値で、pid 0 は呼び出しスレッドを指す
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(idx % cpus, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            log::debug!(
                "sched_setaffinity(cpu {}) failed: {}",
                idx % cpus,
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn bind_this_thread(_idx: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::CLUSTER_SIZE;

    fn dirty_clusters(len: usize) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = (0..len).map(|_| Cluster::new()).collect();
        // SAFETY: テスト専用。非ゼロで埋めてゼロクリアされたかを確認する
        unsafe {
            std::ptr::write_bytes(
                clusters.as_mut_ptr() as *mut u8,
                0x5A,
                len * std::mem::size_of::<Cluster>(),
            );
        }
        clusters
    }

    fn all_zero(clusters: &[Cluster]) -> bool {
        clusters
            .iter()
            .all(|c| (0..CLUSTER_SIZE).all(|i| c.load(i).key16() == 0 && c.load(i).depth8() == 0))
    }

    #[test]
    fn test_clear_single_thread() {
        let mut clusters = dirty_clusters(100);
        clear_clusters(&mut clusters, 1);
        assert!(all_zero(&clusters));
    }

    #[test]
    fn test_clear_with_remainder() {
        // 101 / 4 = 25、最後のスレッドが 26 クラスターを担当する
        let mut clusters = dirty_clusters(101);
        clear_clusters(&mut clusters, 4);
        assert!(all_zero(&clusters));
    }

    #[test]
    fn test_clear_more_threads_than_clusters() {
        let mut clusters = dirty_clusters(3);
        clear_clusters(&mut clusters, 12);
        assert!(all_zero(&clusters));
    }

    #[test]
    fn test_clear_zero_threads_treated_as_one() {
        let mut clusters = dirty_clusters(10);
        clear_clusters(&mut clusters, 0);
        assert!(all_zero(&clusters));
    }
}
