//! デプロイ結果コメント設定

use crate::template::Template;
use serde::{Deserialize, Serialize};

/// デプロイ結果コメント設定
///
/// デプロイ完了後にIssueやPull Requestへ投稿されるコメントです。
/// 本文には `${resource-id.attribute}` 形式で依存リソースの出力を
/// 埋め込めます。テンプレート参照は暗黙の依存エッジになります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentConfig {
    /// リポジトリのオーナー
    pub owner: String,

    /// リポジトリ名
    pub repository: String,

    /// 投稿先のIssue / Pull Request番号
    pub issue: u64,

    /// コメント本文テンプレート
    pub body: Template,
}

impl CommentConfig {
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        issue: u64,
        body: Template,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            issue,
            body,
        }
    }
}
