//! Workers AI バインディング設定

use serde::{Deserialize, Serialize};

/// Workers AI バインディング設定
///
/// アカウントレベルのAIサービスへのバインディングです。リモート側に
/// 作成・削除すべき実体はなく、Workerからの参照先として宣言します。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {}

impl AiConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
