//! エンジンオプション
//!
//! USI の `setoption name <name> value <value>` で設定される名前付きの値を保持する。
//! 置換表は `USI_Hash` / `Threads` / `LargePages` を名前で読み出す。

/// 置換表サイズ（MB）
pub const OPTION_HASH: &str = "USI_Hash";
/// 探索スレッド数（置換表のクリアにも使用）
pub const OPTION_THREADS: &str = "Threads";
/// Large Pages を使うか
pub const OPTION_LARGE_PAGES: &str = "LargePages";
/// 置換表のクリア
pub const OPTION_CLEAR_HASH: &str = "ClearHash";

/// オプションの種類と値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    /// 整数値（min..=max）
    Spin { value: i64, default: i64, min: i64, max: i64 },
    /// 真偽値
    Check { value: bool, default: bool },
    /// ボタン（値を持たない）
    Button,
}

/// オプション設定時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("No such option: {0}")]
    Unknown(String),
    #[error("invalid value for option {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("value {value} for option {name} is out of range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },
}

#[derive(Debug, Clone)]
struct EngineOption {
    name: &'static str,
    value: OptionValue,
}

/// 名前付きオプションの集合（登録順を保持する）
#[derive(Debug, Clone)]
pub struct OptionsMap {
    options: Vec<EngineOption>,
}

impl OptionsMap {
    /// 既定のオプションで作成
    pub fn new() -> Self {
        let max_hash = if cfg!(target_pointer_width = "64") { 33_554_432 } else { 2048 };
        Self {
            options: vec![
                EngineOption {
                    name: OPTION_HASH,
                    value: OptionValue::Spin {
                        value: 16,
                        default: 16,
                        min: 1,
                        max: max_hash,
                    },
                },
                EngineOption {
                    name: OPTION_THREADS,
                    value: OptionValue::Spin {
                        value: 1,
                        default: 1,
                        min: 1,
                        max: 1024,
                    },
                },
                EngineOption {
                    name: OPTION_LARGE_PAGES,
                    value: OptionValue::Check {
                        value: true,
                        default: true,
                    },
                },
                EngineOption {
                    name: OPTION_CLEAR_HASH,
                    value: OptionValue::Button,
                },
            ],
        }
    }

    fn find(&self, name: &str) -> Option<&EngineOption> {
        // USI のオプション名は大文字小文字を区別しない
        self.options.iter().find(|o| o.name.eq_ignore_ascii_case(name))
    }

    /// 値を取得
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        self.find(name).map(|o| o.value)
    }

    /// spin オプションの値を取得
    pub fn spin(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            OptionValue::Spin { value, .. } => Some(value),
            _ => None,
        }
    }

    /// check オプションの値を取得
    pub fn check(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            OptionValue::Check { value, .. } => Some(value),
            _ => None,
        }
    }

    /// 文字列から値を設定し、設定後の値を返す
    ///
    /// spin は範囲外ならエラー、check は `true` / `false`（大文字小文字不問）のみ受け付ける。
    pub fn set(&mut self, name: &str, raw: &str) -> Result<OptionValue, OptionError> {
        let option = self
            .options
            .iter_mut()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| OptionError::Unknown(name.to_string()))?;

        let invalid = || OptionError::InvalidValue {
            name: option.name.to_string(),
            value: raw.to_string(),
        };

        match &mut option.value {
            OptionValue::Spin { value, min, max, .. } => {
                let parsed: i64 = raw.trim().parse().map_err(|_| invalid())?;
                if !(*min..=*max).contains(&parsed) {
                    return Err(OptionError::OutOfRange {
                        name: option.name.to_string(),
                        value: parsed,
                        min: *min,
                        max: *max,
                    });
                }
                *value = parsed;
            }
            OptionValue::Check { value, .. } => {
                *value = match raw.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid()),
                };
            }
            OptionValue::Button => {}
        }

        Ok(option.value)
    }

    /// `option name ... type ...` 行を登録順に返す
    pub fn usi_lines(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|o| match o.value {
                OptionValue::Spin { default, min, max, .. } => {
                    format!("option name {} type spin default {default} min {min} max {max}", o.name)
                }
                OptionValue::Check { default, .. } => {
                    format!("option name {} type check default {default}", o.name)
                }
                OptionValue::Button => format!("option name {} type button", o.name),
            })
            .collect()
    }
}

impl Default for OptionsMap {
    fn default() -> Self {
        Self::new()
    }
}
