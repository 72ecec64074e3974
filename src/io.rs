/// IO 抽象层模块
///
/// 提供 Marshal 数据文件的读写接口，写回流程通过 trait 注入，
/// 测试时可以替换为内存实现。
///
/// # 架构设计
///
/// - **traits**: 定义 Reader/Writer trait 接口
/// - **file_io**: 基于文件系统的默认实现
///
/// # 使用示例
///
/// ```rust,ignore
/// use rgss_localizer::io::{DefaultMarshalReader, MarshalReader};
///
/// let reader = DefaultMarshalReader;
/// let data = reader.read(Path::new("Data/Actors.rxdata"))?;
/// ```
pub mod traits;
pub mod file_io;

// === 导出 trait 定义 ===
pub use traits::{MarshalBytes, MarshalReader, MarshalWriter, RawMarshalData};

// === 导出默认实现 ===
pub use file_io::{DefaultMarshalReader, DefaultMarshalWriter};
