//! アプリケーションスコープ定義
//!
//! リソースは `{app}/{stage}` の名前空間で管理されます。
//! 同じアプリでもステージが異なれば独立したリソース集合になります。

use serde::{Deserialize, Serialize};

/// 本番ステージ名
pub const STAGE_PRODUCTION: &str = "production";
/// ステージングステージ名
pub const STAGE_STAGING: &str = "staging";
/// 開発ステージ名
pub const STAGE_DEVELOPMENT: &str = "development";
/// テストステージ名
pub const STAGE_TEST: &str = "test";

/// アプリケーションスコープ
///
/// アプリ名とステージ名の組で、状態ファイルとリソースの名前空間を決定します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// アプリケーション名
    pub app: String,

    /// ステージ名（production, staging, development, test など自由形式）
    pub stage: String,
}

impl Scope {
    pub fn new(app: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            stage: stage.into(),
        }
    }

    /// 本番ステージかどうか
    ///
    /// 本番スコープでは孤立リソースの削除が常に抑止されます。
    pub fn is_production(&self) -> bool {
        self.stage == STAGE_PRODUCTION
    }

    /// `{app}/{stage}` 形式の完全修飾名
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.app, self.stage)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app, self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_detection() {
        assert!(Scope::new("deep-thought", STAGE_PRODUCTION).is_production());
        assert!(!Scope::new("deep-thought", STAGE_STAGING).is_production());
        assert!(!Scope::new("deep-thought", "prod").is_production());
    }

    #[test]
    fn test_qualified_name() {
        let scope = Scope::new("deep-thought", "development");
        assert_eq!(scope.qualified(), "deep-thought/development");
        assert_eq!(scope.to_string(), "deep-thought/development");
    }
}
