//! Ruby Marshal 编解码模块
//!
//! RPG Maker XP/VX/VX Ace 的数据文件（`.rxdata`/`.rvdata`/`.rvdata2`）
//! 是 Ruby Marshal 4.8 格式的对象图。本模块把它解码为 [`Document`]，
//! 允许修改其中的字符串后再编码回去；未修改的部分逐字节保持不变。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use rgss_localizer::marshal::Document;
//!
//! let mut doc = Document::decode(&bytes)?;
//! if let Some(name) = doc.field(doc.root(), b"@name") {
//!     doc.set_string_bytes(name, "Bobby".as_bytes().to_vec());
//! }
//! let patched = doc.encode()?;
//! ```

pub mod decoder;
pub mod dump;
pub mod encoder;
pub mod fixnum;
pub mod node;
pub mod tables;

pub use node::{ClassRefKind, Node, NodeId};
pub use tables::ReferenceTables;

use crate::utils::LocalizeError;
use decoder::Decoder;
use encoder::Encoder;

/// 文件头魔数（Marshal 4.8）
pub const MAGIC: [u8; 2] = [0x04, 0x08];

/// 最大嵌套层数，超出视为格式错误
pub const MAX_DEPTH: usize = 512;

/// 一次解码得到的对象图
///
/// 持有全部节点（arena）、符号表/对象表以及根节点。
/// 每次解码创建一个，编码之后即可丢弃。
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    tables: ReferenceTables,
    root: NodeId,
    /// 根节点之后的多余字节，编码时原样写回
    trailing: Vec<u8>,
}

impl Document {
    /// 解码 Marshal 数据
    pub fn decode(bytes: &[u8]) -> Result<Self, LocalizeError> {
        Decoder::new(bytes).decode()
    }

    /// 编码回字节
    ///
    /// 未修改字符串内容时输出与原始输入完全一致。
    pub fn encode(&self) -> Result<Vec<u8>, LocalizeError> {
        Encoder::new(self).encode()
    }

    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        tables: ReferenceTables,
        root: NodeId,
        trailing: Vec<u8>,
    ) -> Self {
        Self {
            nodes,
            tables,
            root,
            trailing,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 按 id 取节点
    ///
    /// # Panics
    /// `id` 不属于本文档时 panic；来源不确定的 id 用 [`Document::get`]。
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// 见 [`Document::node`]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// 按 id 取节点，id 超出本文档时返回 `None`
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// arena 中的节点数量
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }

    /// 解析反向引用
    ///
    /// `SymbolLink` 返回符号表中的符号，`Link` 返回对象表中的节点，
    /// 其他节点返回自身。
    pub fn resolve(&self, id: NodeId) -> NodeId {
        match self.node(id) {
            Node::SymbolLink(index) => self.tables.symbol(*index).unwrap_or(id),
            Node::Link(index) => self.tables.object(*index).unwrap_or(id),
            _ => id,
        }
    }

    /// 按名称查找 Hash/Object 的字段
    ///
    /// 线性扫描键值对，返回所有键（解析引用后）字节等于 `name` 的值。
    pub fn fields_by_name(&self, id: NodeId, name: &[u8]) -> Vec<NodeId> {
        match self.node(id).pairs() {
            Some(pairs) => pairs
                .iter()
                .filter(|(key, _)| self.node(self.resolve(*key)).name_bytes() == Some(name))
                .map(|(_, value)| *value)
                .collect(),
            None => Vec::new(),
        }
    }

    /// 第一个同名字段
    pub fn field(&self, id: NodeId, name: &[u8]) -> Option<NodeId> {
        self.fields_by_name(id, name).into_iter().next()
    }

    /// 键的名称字节：符号、字符串或 `I` 包装的字符串
    pub fn key_name(&self, key: NodeId) -> Option<&[u8]> {
        let resolved = self.resolve(key);
        match self.node(resolved) {
            Node::Symbol(bytes) => Some(bytes),
            _ => self.string_bytes(resolved),
        }
    }

    /// 字符串节点本身（穿过一层 `I` 包装）
    pub fn string_node(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id) {
            Node::String { .. } => Some(id),
            Node::InstanceVar { value, .. } if self.node(*value).is_string() => Some(*value),
            _ => None,
        }
    }

    /// 字符串内容（穿过一层 `I` 包装），不跟随 `@` 引用
    pub fn string_bytes(&self, id: NodeId) -> Option<&[u8]> {
        match self.node(self.string_node(id)?) {
            Node::String { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// 替换字符串内容，返回是否找到字符串
    pub fn set_string_bytes(&mut self, id: NodeId, new_bytes: Vec<u8>) -> bool {
        let Some(target) = self.string_node(id) else {
            return false;
        };
        match self.node_mut(target) {
            Node::String { bytes, .. } => {
                *bytes = new_bytes;
                true
            }
            _ => false,
        }
    }

    /// 对象/自定义类型的类名
    pub fn class_name(&self, id: NodeId) -> Option<&[u8]> {
        match self.node(id) {
            Node::Object { class_name, .. }
            | Node::UserMarshal { class_name, .. }
            | Node::UserDefined { class_name, .. } => self.node(self.resolve(*class_name)).name_bytes(),
            _ => None,
        }
    }

    pub fn array_items(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.node(id) {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn pairs(&self, id: NodeId) -> Option<&[(NodeId, NodeId)]> {
        self.node(id).pairs()
    }

    pub fn fixnum(&self, id: NodeId) -> Option<i64> {
        match self.node(id) {
            Node::Fixnum(value) => Some(*value),
            _ => None,
        }
    }
}
