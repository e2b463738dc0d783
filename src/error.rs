use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ナビゲーションタイムアウト: {0}")]
    NavigationTimeout(String),

    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("チェックポイントでブロック: {0}")]
    CheckpointBlocked(String),

    #[error("出品データが見つかりません: {0}")]
    ExtractionNotFound(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("JavaScriptエラー: {0}")]
    JavaScript(String),

    #[error("出品が存在しません: {0}")]
    ListingNotFound(String),

    #[error("ストアエラー: {0}")]
    Store(String),

    #[error("予期しないエラー: {0}")]
    Unexpected(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

/// リトライ制御とログで使うエラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    NavigationTimeout,
    ExtractionNotFound,
    UnexpectedRuntime,
}

impl ScraperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) | Self::CheckpointBlocked(_) => ErrorKind::Authentication,
            Self::NavigationTimeout(_) | Self::Navigation(_) => ErrorKind::NavigationTimeout,
            Self::ExtractionNotFound(_) | Self::ElementNotFound(_) => {
                ErrorKind::ExtractionNotFound
            }
            _ => ErrorKind::UnexpectedRuntime,
        }
    }

    /// 出品の不在以外はすべてリトライ対象（認証系を含む）
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ListingNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            ScraperError::CheckpointBlocked("x".into()).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ScraperError::NavigationTimeout("x".into()).kind(),
            ErrorKind::NavigationTimeout
        );
        assert_eq!(
            ScraperError::ExtractionNotFound("x".into()).kind(),
            ErrorKind::ExtractionNotFound
        );
        assert_eq!(
            ScraperError::JavaScript("x".into()).kind(),
            ErrorKind::UnexpectedRuntime
        );
    }

    #[test]
    fn test_taxonomy_is_retryable() {
        assert!(ScraperError::Authentication("bad".into()).is_retryable());
        assert!(ScraperError::CheckpointBlocked("cp".into()).is_retryable());
        assert!(ScraperError::ExtractionNotFound("none".into()).is_retryable());
        assert!(ScraperError::Unexpected("boom".into()).is_retryable());
        assert!(!ScraperError::ListingNotFound("id".into()).is_retryable());
    }
}
