//! ページからの指標抽出
//!
//! DOMの判定は全てHTMLスナップショットに対する純粋関数で行い、
//! [`Extractor`] がページ操作と組み合わせる。

pub mod dashboard;
pub mod detail;
mod extractor;
pub mod numbers;
pub mod patterns;

pub use extractor::Extractor;
