/// 多文件并行处理
///
/// 文件之间没有共享的可变状态，字符串目录在整个过程中只读。

use std::path::PathBuf;
use rayon::prelude::*;
use crate::catalog::StringCatalog;
use crate::io::{MarshalReader, MarshalWriter, RawMarshalData};
use crate::string_types::ExtractedGroup;
use crate::utils::LocalizeError;
use super::patcher::FilePatcher;

/// 一个待处理文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchJob {
    /// 目录中的文件键
    pub file_key: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// 单个文件的处理结果
#[derive(Debug)]
pub struct FileReport<T> {
    pub file_key: String,
    pub result: Result<T, LocalizeError>,
}

impl<T> FileReport<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// 并行写回多个文件
///
/// # 参数
/// * `jobs` - 待处理文件
/// * `catalog` - 只读字符串目录
/// * `reader`/`writer` - IO 实现
///
/// # 返回
/// 与 `jobs` 顺序一致的结果列表；`Ok(true)` 表示文件有修改。
/// 出错的文件记录日志后跳过，不写出任何内容。
pub fn patch_files(
    jobs: &[PatchJob],
    catalog: &StringCatalog,
    reader: &dyn MarshalReader,
    writer: &dyn MarshalWriter,
) -> Vec<FileReport<bool>> {
    let patcher = FilePatcher::new(catalog);
    jobs.par_iter()
        .map(|job| {
            let result = patch_one(job, &patcher, reader, writer);
            match &result {
                Ok(true) => tracing::info!(file = %job.file_key, "已写回译文"),
                Ok(false) => tracing::debug!(file = %job.file_key, "无需修改"),
                Err(e) => tracing::error!(file = %job.file_key, error = %e, "写回失败，跳过该文件"),
            }
            FileReport {
                file_key: job.file_key.clone(),
                result,
            }
        })
        .collect()
}

fn patch_one(
    job: &PatchJob,
    patcher: &FilePatcher<'_>,
    reader: &dyn MarshalReader,
    writer: &dyn MarshalWriter,
) -> Result<bool, LocalizeError> {
    let data = reader.read(&job.input)?;
    let outcome = patcher.patch(&job.file_key, &data.bytes)?;
    if outcome.modified || job.input != job.output {
        writer.write(&RawMarshalData::new(outcome.bytes), &job.output)?;
    }
    Ok(outcome.modified)
}

/// 并行提取多个文件的字符串
///
/// # 参数
/// * `files` - `(文件键, 路径)` 列表
///
/// # 返回
/// 与输入顺序一致的结果列表
pub fn extract_files(
    files: &[(String, PathBuf)],
    reader: &dyn MarshalReader,
) -> Vec<FileReport<Vec<ExtractedGroup>>> {
    files
        .par_iter()
        .map(|(file_key, path)| {
            let result = reader
                .read(path)
                .and_then(|data| FilePatcher::extract(file_key, &data.bytes));
            if let Err(e) = &result {
                tracing::error!(file = %file_key, error = %e, "提取失败，跳过该文件");
            }
            FileReport {
                file_key: file_key.clone(),
                result,
            }
        })
        .collect()
}
