//! モデル定義
//!
//! EdgeFlowで管理されるリソース種別ごとの設定モデルを定義します。
//! 各モデルは種別ごとにモジュールに分離されています。

mod ai;
mod comment;
mod config;
mod domain;
mod event_source;
mod kind;
mod queue;
mod vector_index;
mod worker;

// Re-exports
pub use ai::*;
pub use comment::*;
pub use config::*;
pub use domain::*;
pub use event_source::*;
pub use kind::*;
pub use queue::*;
pub use vector_index::*;
pub use worker::*;
