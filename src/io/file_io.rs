/// Marshal 文件 IO 实现
///
/// 提供基于文件系统的默认读写实现
use std::path::Path;
use std::sync::Arc;
use memmap2::Mmap;
use super::traits::{MarshalBytes, MarshalReader, MarshalWriter, RawMarshalData};
use crate::utils::LocalizeError;

/// 默认的读取器（只读内存映射，映射随返回的数据一起存活）
#[derive(Debug, Clone, Default)]
pub struct DefaultMarshalReader;

impl MarshalReader for DefaultMarshalReader {
    fn read(&self, path: &Path) -> Result<RawMarshalData, LocalizeError> {
        let file = std::fs::File::open(path)?;
        // 空文件无法映射
        if file.metadata()?.len() == 0 {
            return Ok(RawMarshalData::new(Vec::new()));
        }
        // SAFETY: 映射只读；数据文件在处理期间不应被其他进程截断
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(RawMarshalData::new(MarshalBytes::Mapped(Arc::new(mmap))))
    }
}

/// 默认的写入器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultMarshalWriter;

impl MarshalWriter for DefaultMarshalWriter {
    fn write(&self, data: &RawMarshalData, path: &Path) -> Result<(), LocalizeError> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, &data.bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_reader() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("Actors.rxdata");

        let test_data = b"\x04\x08[\x00";
        std::fs::write(&test_file, test_data).unwrap();

        let reader = DefaultMarshalReader;
        let result = reader.read(&test_file).unwrap();
        assert!(matches!(result.bytes, MarshalBytes::Mapped(_)));
        assert_eq!(&result.bytes[..], test_data);

        // 克隆共享同一个映射
        let shared = result.clone();
        assert_eq!(shared, result);
    }

    #[test]
    fn test_reader_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("Empty.rxdata");
        std::fs::write(&test_file, b"").unwrap();

        let result = DefaultMarshalReader.read(&test_file).unwrap();
        assert!(result.bytes.is_empty());
    }

    #[test]
    fn test_reader_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = DefaultMarshalReader.read(&temp_dir.path().join("missing.rxdata"));
        assert!(matches!(result, Err(LocalizeError::IoError(_))));
    }

    #[test]
    fn test_writer_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("out").join("Data").join("Items.rxdata");

        let test_data = RawMarshalData::new(b"\x04\x080".to_vec());

        let writer = DefaultMarshalWriter;
        writer.write(&test_data, &test_file).unwrap();

        assert_eq!(std::fs::read(&test_file).unwrap(), &test_data.bytes[..]);
    }
}
