use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("UTCオフセットの形式が不正です ({option}): {value} ([+-]HH[:MM] で指定してください)")]
    InvalidOffset { option: &'static str, value: String },
    #[error("タイムゾーン情報のない写真があります: {missing}/{total}件 (--time-add か --time-add-force を指定してください)")]
    MissingTimezone { missing: usize, total: usize },
    #[error("撮影日時を解析できませんでした: {0}")]
    UnparseableTimestamp(String),
    #[error("外部ツールの起動に失敗しました: {tool}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("外部ツールが異常終了しました: {tool} (終了コード {code:?})")]
    ToolFailed { tool: String, code: Option<i32> },
    #[error("リネーム先が重複しています: {}", target.display())]
    RenameCollision { target: PathBuf },
    #[error("メタデータを読み込めませんでした: {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
