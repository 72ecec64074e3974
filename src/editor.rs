/// 写回流程模块
///
/// 把解码、遍历、游标与编码串成单文件的提取/写回操作，
/// 并提供多文件并行处理。每个文件独立处理，一个文件出错不影响其他文件。
///
/// # 架构设计
///
/// - **patcher**: 单文件提取与写回
/// - **batch**: 多文件并行处理与结果汇总
///
/// # 使用示例
///
/// ```rust,ignore
/// use rgss_localizer::editor::{patch_files, PatchJob};
/// use rgss_localizer::io::{DefaultMarshalReader, DefaultMarshalWriter};
///
/// let catalog = StringCatalog::load(Path::new("strings.json"))?;
/// let reports = patch_files(&jobs, &catalog, &DefaultMarshalReader, &DefaultMarshalWriter);
/// ```
pub mod batch;
pub mod patcher;

// === 导出公共接口 ===
pub use batch::{extract_files, patch_files, FileReport, PatchJob};
pub use patcher::{file_key, FilePatcher, PatchOutcome};
