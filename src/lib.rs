pub mod datatypes;
pub mod marshal;
pub mod catalog;
pub mod cursor;
pub mod walker;
pub mod string_types;
pub mod utils;
pub mod io;
pub mod editor;

// 重新导出主要结构
pub use marshal::{Document, Node, NodeId, ReferenceTables};
pub use catalog::{CatalogString, Slot, SlotFlags, SlotGroup, StringCatalog, StringLookup};
pub use cursor::WalkCursor;
pub use walker::MarshalFileKind;
pub use string_types::ExtractedGroup;
pub use utils::{create_backup, LocalizeError};
pub use editor::{FilePatcher, PatchOutcome};

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["rxdata", "rvdata", "rvdata2"];

/// 按数据库方式遍历的标准数据文件（`目录/文件名`，小写、无扩展名）
pub const DEFAULT_DATA_FILES: &[&str] = &[
    "data/actors",
    "data/animations",
    "data/armors",
    "data/classes",
    "data/enemies",
    "data/items",
    "data/skills",
    "data/states",
    "data/tilesets",
    "data/weapons",
];
