mod bench;
mod engine;

use anyhow::Result;
use clap::Parser;
use std::io::{self as stdio, BufRead};

use engine::{Control, Engine};
use ttable_core::options::{OPTION_HASH, OPTION_LARGE_PAGES, OPTION_THREADS};
use ttable_core::OptionsMap;

/// 置換表を USI 風のコマンドで操作するドライバ
#[derive(Parser, Debug)]
#[command(name = "ttable-usi", version, about)]
struct Cli {
    /// 置換表サイズ（MB）
    #[arg(long)]
    hash: Option<u64>,

    /// スレッド数（クリアと bench に使用）
    #[arg(long)]
    threads: Option<u64>,

    /// Large Pages を使わない
    #[arg(long)]
    no_large_pages: bool,

    /// ログレベル（RUST_LOG が設定されていればそちらを優先）
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let mut options = OptionsMap::new();
    if let Some(hash) = cli.hash {
        options.set(OPTION_HASH, &hash.to_string())?;
    }
    if let Some(threads) = cli.threads {
        options.set(OPTION_THREADS, &threads.to_string())?;
    }
    if cli.no_large_pages {
        options.set(OPTION_LARGE_PAGES, "false")?;
    }

    let stdout = stdio::stdout();
    let mut engine = Engine::new(options, stdout.lock());

    for line in stdio::stdin().lock().lines() {
        let line = line?;
        if engine.handle_line(&line)? == Control::Quit {
            break;
        }
    }

    Ok(())
}
