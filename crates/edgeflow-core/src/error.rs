use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("テンプレート構文エラー: {0}")]
    TemplateParse(String),

    #[error("無効なリソースID: {0}\nヒント: 小文字英数字とハイフンのみ使用できます (例: app-worker)")]
    InvalidResourceId(String),

    #[error("無効なシークレット参照: {0} (scheme://NAME 形式で指定してください)")]
    InvalidSecretRef(String),

    #[error("未解決の出力参照: ${{{resource}.{attribute}}}")]
    UnresolvedOutput { resource: String, attribute: String },

    #[error("シリアライズエラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResourceError>;
