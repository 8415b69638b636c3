//! 置換表用のメモリ確保
//!
//! Large Pages を優先して試し、失敗したら通常のヒープ確保にフォールバックする。
//! どちらの経路でも先頭アドレスはキャッシュライン境界に切り上げて使う。
//! 確保した領域は常にゼロ初期化されている（mmap / VirtualAlloc は OS が、通常経路は `alloc_zeroed` が保証する）。

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;
use std::sync::OnceLock;

use super::CACHE_LINE_SIZE;

#[cfg(windows)]
use windows_sys::Win32::Foundation::{CloseHandle, ERROR_SUCCESS, GetLastError, HANDLE};
#[cfg(windows)]
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LUID, LUID_AND_ATTRIBUTES, LookupPrivilegeValueA, OpenProcessToken,
    SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
#[cfg(windows)]
use windows_sys::Win32::System::Memory::{
    GetLargePageMinimum, MEM_COMMIT, MEM_LARGE_PAGES, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
    VirtualAlloc, VirtualFree,
};
#[cfg(windows)]
use windows_sys::Win32::System::Threading::GetCurrentProcess;

/// Linux の hugetlb 既定ページサイズ
#[cfg(any(target_os = "linux", target_os = "android"))]
const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// メモリ確保の失敗
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// 通常確保も含めてすべて失敗した
    #[error("failed to allocate {bytes} bytes for transposition table")]
    OutOfMemory { bytes: usize },
    /// 要求サイズがアドレス空間を超える
    #[error("transposition table of {mb_size}MB does not fit in the address space")]
    SizeOverflow { mb_size: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum AllocKind {
    LargePages,
    Regular,
}

/// 解放方法（確保経路ごとに異なる）
enum Release {
    Heap(Layout),
    #[cfg(any(target_os = "linux", target_os = "android"))]
    Mmap(usize),
    #[cfg(windows)]
    Virtual,
}

pub(super) struct Allocation {
    /// OSから返された生のアドレス
    base: NonNull<u8>,
    /// キャッシュライン境界に切り上げたアドレス
    aligned: NonNull<u8>,
    kind: AllocKind,
    release: Release,
}

impl Allocation {
    /// `size` バイト以上を確保する
    ///
    /// `want_large_pages` が真なら Large Pages を先に試す。
    /// 失敗はログに残すだけで、通常確保に切り替える。
    pub(super) fn allocate(size: usize, want_large_pages: bool) -> Result<Self, AllocError> {
        if want_large_pages {
            match try_alloc_large_pages(size) {
                Some(alloc) => {
                    log::info!("Hash LargePages {} MiB", size >> 20);
                    return Ok(alloc);
                }
                None => log::warn!(
                    "Failed to allocate {} MiB Large Page memory for transposition table, switching to default",
                    size >> 20
                ),
            }
        }

        alloc_regular(size)
    }

    /// キャッシュライン境界に揃えた先頭アドレス
    pub(super) fn ptr(&self) -> NonNull<u8> {
        self.aligned
    }

    pub(super) fn kind(&self) -> AllocKind {
        self.kind
    }
}

/// Large Pages を使えるかどうか（プロセス内で一度だけ判定する）
///
/// Windows では SeLockMemoryPrivilege の取得、Linux では hugetlb プールの有無を見る。
/// `requested` が偽なら判定自体を行わない。
pub(super) fn large_pages_enabled(requested: bool) -> bool {
    static LARGE_PAGE_PRIVILEGE: OnceLock<bool> = OnceLock::new();

    if !requested {
        return false;
    }

    *LARGE_PAGE_PRIVILEGE.get_or_init(|| {
        let granted = acquire_large_page_privilege();
        if !granted {
            log::info!("No Privilege for Large Pages");
        }
        granted
    })
}

/// `value` を `align` の倍数に切り上げる（`align` は2の冪）
#[inline]
fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

fn aligned_ptr(base: NonNull<u8>) -> NonNull<u8> {
    let offset = align_up(base.as_ptr() as usize, CACHE_LINE_SIZE) - base.as_ptr() as usize;
    // SAFETY: offset < CACHE_LINE_SIZE であり、確保時にその分のパディングを足している
    unsafe { NonNull::new_unchecked(base.as_ptr().add(offset)) }
}

fn alloc_regular(size: usize) -> Result<Allocation, AllocError> {
    // 切り上げ後も size バイト使えるよう、キャッシュライン - 1 バイトを余分に確保する
    let padded = size
        .checked_add(CACHE_LINE_SIZE - 1)
        .ok_or(AllocError::OutOfMemory { bytes: size })?;
    let layout = Layout::from_size_align(padded, 1)
        .map_err(|_| AllocError::OutOfMemory { bytes: padded })?;

    // SAFETY: layout のサイズは CACHE_LINE_SIZE - 1 以上で 0 にならない
    let base = NonNull::new(unsafe { alloc_zeroed(layout) })
        .ok_or(AllocError::OutOfMemory { bytes: padded })?;

    Ok(Allocation {
        base,
        aligned: aligned_ptr(base),
        kind: AllocKind::Regular,
        release: Release::Heap(layout),
    })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn acquire_large_page_privilege() -> bool {
    // 特権は不要。hugetlb プールが1ページも予約されていなければ mmap は必ず失敗する
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|meminfo| {
            meminfo
                .lines()
                .find_map(|line| line.strip_prefix("HugePages_Total:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
        })
        .is_some_and(|total| total > 0)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn try_alloc_large_pages(size: usize) -> Option<Allocation> {
    let len = align_up(size, HUGE_PAGE_SIZE);

    // SAFETY: 匿名マッピングなので fd は -1、戻り値は MAP_FAILED で検査する
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        log::debug!("mmap(MAP_HUGETLB, {len}) failed: {}", std::io::Error::last_os_error());
        return None;
    }

    let base = NonNull::new(ptr as *mut u8)?;
    Some(Allocation {
        base,
        aligned: aligned_ptr(base),
        kind: AllocKind::LargePages,
        release: Release::Mmap(len),
    })
}

#[cfg(windows)]
fn acquire_large_page_privilege() -> bool {
    // SAFETY: Win32 API 呼び出し。ハンドルは取得に成功した場合のみ閉じる
    unsafe {
        if GetLargePageMinimum() == 0 {
            return false;
        }

        let mut token: HANDLE = std::ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut token)
            == 0
        {
            return false;
        }

        let mut luid = LUID {
            LowPart: 0,
            HighPart: 0,
        };
        if LookupPrivilegeValueA(std::ptr::null(), b"SeLockMemoryPrivilege\0".as_ptr(), &mut luid)
            == 0
        {
            CloseHandle(token);
            return false;
        }

        let tp = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: SE_PRIVILEGE_ENABLED,
            }],
        };

        // AdjustTokenPrivileges が非ゼロを返しても ERROR_SUCCESS でない場合は
        // 部分的な失敗（ERROR_NOT_ALL_ASSIGNED等）を意味するためチェック
        let ok = AdjustTokenPrivileges(
            token,
            0,
            &tp,
            0,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        ) != 0
            && GetLastError() == ERROR_SUCCESS;

        CloseHandle(token);
        ok
    }
}

#[cfg(windows)]
fn try_alloc_large_pages(size: usize) -> Option<Allocation> {
    // SAFETY: VirtualAlloc の戻り値は null 検査してから使う
    unsafe {
        let large_page_size = GetLargePageMinimum();
        if large_page_size == 0 {
            return None;
        }

        let ptr = VirtualAlloc(
            std::ptr::null_mut(),
            align_up(size, large_page_size),
            MEM_RESERVE | MEM_COMMIT | MEM_LARGE_PAGES,
            PAGE_READWRITE,
        );

        let base = NonNull::new(ptr as *mut u8)?;
        Some(Allocation {
            base,
            aligned: aligned_ptr(base),
            kind: AllocKind::LargePages,
            release: Release::Virtual,
        })
    }
}

#[cfg(not(any(windows, target_os = "linux", target_os = "android")))]
fn acquire_large_page_privilege() -> bool {
    false
}

#[cfg(not(any(windows, target_os = "linux", target_os = "android")))]
fn try_alloc_large_pages(_size: usize) -> Option<Allocation> {
    None
}

impl Drop for Allocation {
    fn drop(&mut self) {
        // SAFETY: base と release は確保時に対応する組で記録している
        unsafe {
            match self.release {
                Release::Heap(layout) => dealloc(self.base.as_ptr(), layout),
                #[cfg(any(target_os = "linux", target_os = "android"))]
                Release::Mmap(len) => {
                    if libc::munmap(self.base.as_ptr() as *mut _, len) != 0 {
                        eprintln!("Warning: munmap failed: {}", std::io::Error::last_os_error());
                    }
                }
                #[cfg(windows)]
                Release::Virtual => {
                    if VirtualFree(self.base.as_ptr() as *mut _, 0, MEM_RELEASE) == 0 {
                        // リソースリークの可能性があるため、リリースビルドでも警告を出力
                        eprintln!("Warning: VirtualFree failed with error {}", GetLastError());
                    }
                }
            }
        }
    }
}

// SAFETY: Allocation owns raw memory for the TT. Concurrent probe/write through it are
// intentionally unsynchronized; resize/clear require exclusive access (&mut).
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 64), 128);
    }

    #[test]
    fn test_regular_allocation_is_cache_line_aligned() {
        let alloc = Allocation::allocate(4096, false).unwrap();
        assert_eq!(alloc.kind(), AllocKind::Regular);
        assert_eq!(alloc.ptr().as_ptr() as usize % CACHE_LINE_SIZE, 0);

        // 切り上げ後の末尾バイトまで書き込めること
        unsafe {
            std::ptr::write_bytes(alloc.ptr().as_ptr(), 0xAB, 4096);
            assert_eq!(*alloc.ptr().as_ptr().add(4095), 0xAB);
        }
    }

    #[test]
    fn test_allocation_is_zeroed() {
        for want_large_pages in [false, true] {
            let alloc = Allocation::allocate(1 << 20, want_large_pages).unwrap();
            // SAFETY: 確保した 1MiB の範囲内を読む
            let bytes = unsafe { std::slice::from_raw_parts(alloc.ptr().as_ptr(), 1 << 20) };
            assert!(bytes.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_large_pages_fall_back_or_succeed() {
        // 環境によって Large Pages が使えるかは異なるが、どちらでも確保は成功する
        let alloc = Allocation::allocate(1 << 20, true).unwrap();
        assert_eq!(alloc.ptr().as_ptr() as usize % CACHE_LINE_SIZE, 0);
    }

    #[test]
    fn test_large_pages_disabled_when_not_requested() {
        assert!(!large_pages_enabled(false));
    }
}
