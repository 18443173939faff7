//! ベクトル検索インデックス設定

use serde::{Deserialize, Serialize};

/// 距離メトリック
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    /// コサイン類似度
    #[default]
    Cosine,
    /// ユークリッド距離
    Euclidean,
    /// 内積
    DotProduct,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::DotProduct => write!(f, "dot-product"),
        }
    }
}

/// ベクトル検索インデックス設定
///
/// 次元数とメトリックは作成後に変更できないため、変更された場合は
/// アダプタ側で検証エラーになることが想定されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// インデックス名（リモート側の識別子）
    pub name: String,

    /// ベクトル次元数（例: 768）
    pub dimensions: u32,

    /// 距離メトリック
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl VectorIndexConfig {
    pub fn new(name: impl Into<String>, dimensions: u32) -> Self {
        Self {
            name: name.into(),
            dimensions,
            metric: DistanceMetric::default(),
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}
