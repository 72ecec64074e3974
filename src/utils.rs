use thiserror::Error;
use std::path::Path;

/// 自定义错误类型
///
/// 所有错误只影响当前文件：调用方记录日志后继续处理下一个文件。
#[derive(Error, Debug)]
pub enum LocalizeError {
    #[error("Unsupported Ruby Marshal version or invalid file (magic {0:02x?})")]
    InvalidMagic([u8; 2]),

    #[error("Token {token:#04x} at offset {offset} isn't implemented")]
    UnknownToken { token: u8, offset: u64 },

    #[error("Unexpected end of data at offset {offset}")]
    Truncated { offset: u64 },

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("Symbol link {index} isn't pointing to an existing symbol ({count} known)")]
    DanglingSymbol { index: i64, count: usize },

    #[error("Link {index} isn't pointing to an existing element ({count} slots)")]
    DanglingLink { index: i64, count: usize },

    #[error("{0} is too long for serialization")]
    Overflow(i64),

    #[error("Invalid group match at ({group},{index}): expected {expected:?}, found {found:?}")]
    GroupMismatch {
        group: usize,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid string match at ({group},{index}): expected {expected:?}, found {found:?}")]
    StringMismatch {
        group: usize,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("String id {0} is missing from the catalog")]
    UnknownStringId(String),

    #[error("Reached the end of known strings")]
    EndOfStrings,

    #[error("Location ({group},{index}) is outside of the known strings")]
    InvalidLocation { group: usize, index: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LocalizeError {
    /// 是否为格式错误（魔数、未知标记、数据截断）
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic(_) | Self::UnknownToken { .. } | Self::Truncated { .. } | Self::Format(_)
        )
    }

    /// 是否为引用错误（符号表/对象表索引越界）
    pub fn is_reference_error(&self) -> bool {
        matches!(self, Self::DanglingSymbol { .. } | Self::DanglingLink { .. })
    }

    /// 是否为结构漂移（提取时与写回时的遍历顺序不一致）
    pub fn is_structural_drift(&self) -> bool {
        matches!(
            self,
            Self::GroupMismatch { .. } | Self::StringMismatch { .. } | Self::UnknownStringId(_)
        )
    }
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<std::path::PathBuf, LocalizeError> {
    if !file_path.exists() {
        return Err(LocalizeError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "原文件不存在"
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    let backup_path = file_path.with_extension(format!("{}.{}.bak", extension, timestamp));

    std::fs::copy(file_path, &backup_path)?;

    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_error_categories() {
        assert!(LocalizeError::InvalidMagic([0, 0]).is_format_error());
        assert!(LocalizeError::Truncated { offset: 3 }.is_format_error());
        assert!(LocalizeError::DanglingLink { index: 9, count: 2 }.is_reference_error());
        assert!(LocalizeError::UnknownStringId("7".to_string()).is_structural_drift());
        assert!(!LocalizeError::EndOfStrings.is_structural_drift());
        assert!(!LocalizeError::Overflow(1 << 40).is_format_error());
    }

    #[test]
    fn test_create_backup() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("Actors.rxdata");
        std::fs::write(&file, b"\x04\x080").unwrap();

        let backup = create_backup(&file).unwrap();
        assert!(backup.exists());
        assert!(backup.to_string_lossy().ends_with(".bak"));
        assert_eq!(std::fs::read(&backup).unwrap(), b"\x04\x080");
    }

    #[test]
    fn test_create_backup_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = create_backup(&temp_dir.path().join("missing.rxdata"));
        assert!(matches!(result, Err(LocalizeError::IoError(_))));
    }
}
