//! コマンド処理
//!
//! 置換表とオプションを保持し、1行ずつ受け取ったコマンドを処理する。
//! 探索は同期的に走るため、resize / clear の時点で probe 中のスレッドは存在しない。

use anyhow::Result;
use std::io::Write;

use crate::bench::{BenchConfig, run_bench};
use ttable_core::options::{
    OPTION_CLEAR_HASH, OPTION_HASH, OPTION_LARGE_PAGES, OPTION_THREADS, OptionValue,
};
use ttable_core::{OptionsMap, TranspositionTable};

/// `bench` の既定の1スレッドあたり probe 回数
const DEFAULT_BENCH_PROBES: u64 = 1_000_000;

/// コマンド処理後の継続可否
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct Engine<W: Write> {
    options: OptionsMap,
    tt: TranspositionTable,
    /// オプション変更が置換表にまだ反映されていない
    options_dirty: bool,
    out: W,
}

impl<W: Write> Engine<W> {
    pub fn new(options: OptionsMap, out: W) -> Self {
        Self {
            options,
            tt: TranspositionTable::new(),
            options_dirty: true,
            out,
        }
    }

    /// 1行分のコマンドを処理する
    pub fn handle_line(&mut self, line: &str) -> Result<Control> {
        let line = line.trim();
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match cmd {
            "" => {}
            "usi" => self.send_id_and_options()?,
            "isready" => {
                self.ensure_ready()?;
                self.println("readyok")?;
            }
            "setoption" => self.handle_setoption(rest)?,
            "usinewgame" => {
                self.ensure_ready()?;
                self.tt.clear();
            }
            "bench" => self.handle_bench(rest)?,
            "hashfull" => {
                self.ensure_ready()?;
                let hashfull = self.tt.hashfull();
                self.println(&format!("info hashfull {hashfull}"))?;
            }
            "quit" => return Ok(Control::Quit),
            _ => log::warn!("Unknown command: {line}"),
        }

        Ok(Control::Continue)
    }

    fn println(&mut self, s: &str) -> Result<()> {
        writeln!(self.out, "{s}")?;
        self.out.flush()?;
        Ok(())
    }

    fn info_string(&mut self, s: &str) -> Result<()> {
        self.println(&format!("info string {s}"))
    }

    fn send_id_and_options(&mut self) -> Result<()> {
        self.println(&format!("id name ttable-usi {}", env!("CARGO_PKG_VERSION")))?;
        self.println(&format!("id author {}", env!("CARGO_PKG_AUTHORS")))?;
        for line in self.options.usi_lines() {
            self.println(&line)?;
        }
        self.println("usiok")
    }

    /// 保留中のオプション変更を置換表に反映し、Large Pages の使用状態を通知する
    fn ensure_ready(&mut self) -> Result<()> {
        if !self.options_dirty {
            return Ok(());
        }
        self.tt.apply_options(&self.options);
        self.options_dirty = false;

        let mb_size = self.options.spin(OPTION_HASH).unwrap_or(0);
        if self.tt.uses_large_pages() {
            self.info_string(&format!("Hash LargePages {mb_size} MiB"))?;
        } else if self.options.check(OPTION_LARGE_PAGES) == Some(true) {
            self.info_string(&format!("Hash {mb_size} MiB without LargePages"))?;
        }
        Ok(())
    }

    /// `setoption name <name> [value <value>]`
    fn handle_setoption(&mut self, body: &str) -> Result<()> {
        let Some(after_name) = body.trim().strip_prefix("name") else {
            log::warn!("setoption without name: {body}");
            return Ok(());
        };
        let after_name = after_name.trim_start();
        let (name, value) = match after_name.find(" value ") {
            Some(pos) => (after_name[..pos].trim(), after_name[pos + 7..].trim()),
            None => (after_name.trim(), ""),
        };
        if name.is_empty() {
            return Ok(());
        }

        match self.options.set(name, value) {
            Ok(OptionValue::Button) if name.eq_ignore_ascii_case(OPTION_CLEAR_HASH) => {
                self.ensure_ready()?;
                self.tt.clear();
                self.info_string("Hash cleared")?;
            }
            Ok(_) => self.options_dirty = true,
            Err(e) => {
                log::warn!("{e}");
                self.info_string(&e.to_string())?;
            }
        }

        Ok(())
    }

    /// `bench [probes]`
    fn handle_bench(&mut self, args: &str) -> Result<()> {
        let probes = match args.split_whitespace().next() {
            None => DEFAULT_BENCH_PROBES,
            Some(n) => match n.parse() {
                Ok(probes) => probes,
                Err(e) => {
                    log::warn!("invalid bench probe count {n}: {e}");
                    return self.info_string(&format!("invalid bench probe count: {n}"));
                }
            },
        };
        self.ensure_ready()?;

        let config = BenchConfig {
            threads: self.options.spin(OPTION_THREADS).unwrap_or(1).max(1) as usize,
            probes_per_thread: probes,
            seed: 0x5EED,
        };
        let report = run_bench(&self.tt, &config);

        self.info_string(&format!(
            "bench threads {} probes {} hits {} time {}ms nps {}",
            config.threads,
            report.probes,
            report.hits,
            report.elapsed.as_millis(),
            report.probes_per_sec()
        ))?;
        let hashfull = self.tt.hashfull();
        self.println(&format!("info hashfull {hashfull}"))
    }
}
