/// 单文件提取与写回

use std::path::Path;
use crate::catalog::StringCatalog;
use crate::cursor::WalkCursor;
use crate::marshal::Document;
use crate::string_types::ExtractedGroup;
use crate::utils::LocalizeError;
use crate::walker::{self, MarshalFileKind};

/// 目录中使用的文件键：路径最后两段，如 `Data/Actors.rxdata`
pub fn file_key(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts[parts.len().saturating_sub(2)..].join("/")
}

/// 写回结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// 输出字节；未修改时为原始输入
    pub bytes: Vec<u8>,
    pub modified: bool,
}

/// 单文件写回器
///
/// 只读地持有字符串目录，可以在多个线程间共享。
#[derive(Debug, Clone, Copy)]
pub struct FilePatcher<'c> {
    catalog: &'c StringCatalog,
}

impl<'c> FilePatcher<'c> {
    pub fn new(catalog: &'c StringCatalog) -> Self {
        Self { catalog }
    }

    /// 提取文件中的字符串
    ///
    /// # 参数
    /// * `file_key` - 文件键，同时决定遍历方式
    /// * `bytes` - 文件内容
    pub fn extract(file_key: &str, bytes: &[u8]) -> Result<Vec<ExtractedGroup>, LocalizeError> {
        let doc = Document::decode(bytes)?;
        walker::extract(&doc, MarshalFileKind::from_path(file_key))
    }

    /// 写回译文
    ///
    /// 目录中没有该文件时原样返回。只有确实替换了字符串才重新编码，
    /// 否则输出就是输入本身。
    pub fn patch(&self, file_key: &str, bytes: &[u8]) -> Result<PatchOutcome, LocalizeError> {
        let unchanged = || PatchOutcome {
            bytes: bytes.to_vec(),
            modified: false,
        };

        let Some(groups) = self.catalog.groups(file_key) else {
            tracing::debug!(file_key, "目录中没有该文件，跳过");
            return Ok(unchanged());
        };

        let mut doc = Document::decode(bytes)?;
        let mut cursor = WalkCursor::new(groups, self.catalog);
        let modified = walker::patch(&mut doc, MarshalFileKind::from_path(file_key), &mut cursor)?;
        if cursor.remaining() > 0 {
            tracing::warn!(file_key, remaining = cursor.remaining(), "部分字符串槽位未被访问");
        }

        if modified {
            Ok(PatchOutcome {
                bytes: doc.encode()?,
                modified: true,
            })
        } else {
            Ok(unchanged())
        }
    }
}
