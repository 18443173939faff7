//! EdgeFlow Core
//!
//! EdgeFlowのリソースモデルを提供するクレートです。リソース記述子、
//! 種別ごとの設定モデル、設定フィンガープリント、シークレット参照、
//! 出力参照テンプレートを定義します。
//!
//! エンジン本体（計画・実行・状態管理）は `edgeflow-engine` クレートに
//! あります。このクレートはI/Oを行わない純粋なモデル層です。

pub mod descriptor;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod scope;
pub mod secret;
pub mod template;

// Re-exports
pub use descriptor::{ResourceDescriptor, ResourceId, ResourcePolicy};
pub use error::{ResourceError, Result};
pub use fingerprint::Fingerprint;
pub use model::{
    AiConfig, Binding, CommentConfig, DistanceMetric, DomainConfig, EventSourceConfig,
    ObservabilityConfig, QueueConfig, ResourceConfig, ResourceKind, VectorIndexConfig,
    WorkerConfig,
};
pub use scope::{
    STAGE_DEVELOPMENT, STAGE_PRODUCTION, STAGE_STAGING, STAGE_TEST, Scope,
};
pub use secret::{SecretRef, SecretString};
pub use template::{OutputRef, Template};
