//! リソース種別定義

use serde::{Deserialize, Serialize};

/// リソース種別
///
/// エンジンが扱うリソースの閉じた集合です。プロバイダーアダプタは
/// 種別ごとに登録されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// メッセージキュー
    Queue,
    /// ベクトル検索インデックス
    VectorIndex,
    /// エッジWorkerスクリプト
    Worker,
    /// Workers AI バインディング
    Ai,
    /// カスタムドメイン割り当て
    Domain,
    /// キューコンシューマ（イベントソース）
    EventSource,
    /// デプロイ結果コメント
    Comment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Queue => "queue",
            ResourceKind::VectorIndex => "vector-index",
            ResourceKind::Worker => "worker",
            ResourceKind::Ai => "ai",
            ResourceKind::Domain => "domain",
            ResourceKind::EventSource => "event-source",
            ResourceKind::Comment => "comment",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
