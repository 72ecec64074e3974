/// IO 抽象层 - trait 定义
///
/// 读写只搬运字节，不做解析；解析与编码由 [`crate::marshal`] 负责。

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use memmap2::Mmap;
use crate::utils::LocalizeError;

/// 文件字节：内存中的缓冲区，或仍然有效的只读映射
#[derive(Debug, Clone)]
pub enum MarshalBytes {
    Owned(Vec<u8>),
    Mapped(Arc<Mmap>),
}

impl Deref for MarshalBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            MarshalBytes::Owned(bytes) => bytes,
            MarshalBytes::Mapped(mmap) => mmap,
        }
    }
}

impl AsRef<[u8]> for MarshalBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl From<Vec<u8>> for MarshalBytes {
    fn from(bytes: Vec<u8>) -> Self {
        MarshalBytes::Owned(bytes)
    }
}

impl PartialEq for MarshalBytes {
    fn eq(&self, other: &Self) -> bool {
        self[..] == other[..]
    }
}

impl Eq for MarshalBytes {}

/// Marshal 文件原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMarshalData {
    /// 文件的原始字节数据
    pub bytes: MarshalBytes,
}

impl RawMarshalData {
    pub fn new(bytes: impl Into<MarshalBytes>) -> Self {
        Self { bytes: bytes.into() }
    }
}

/// Marshal 文件读取 trait
///
/// 批量写回时在多个线程间共享，因此要求 `Send + Sync`。
pub trait MarshalReader: Send + Sync {
    /// 读取文件的原始数据
    ///
    /// # 参数
    /// * `path` - 文件路径
    fn read(&self, path: &Path) -> Result<RawMarshalData, LocalizeError>;
}

/// Marshal 文件写入 trait
pub trait MarshalWriter: Send + Sync {
    /// 写入文件数据
    ///
    /// # 参数
    /// * `data` - 要写入的原始数据
    /// * `path` - 目标文件路径
    fn write(&self, data: &RawMarshalData, path: &Path) -> Result<(), LocalizeError>;
}
