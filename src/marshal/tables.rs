use super::node::NodeId;

/// 符号表与对象表
///
/// 两张表都只追加。对象表下标 0 永远空置，`@` 引用从 1 开始。
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    symtable: Vec<NodeId>,
    objtable: Vec<Option<NodeId>>,
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceTables {
    pub fn new() -> Self {
        Self {
            symtable: Vec::new(),
            objtable: vec![None],
        }
    }

    /// 登记符号，返回其下标
    pub fn push_symbol(&mut self, id: NodeId) -> usize {
        self.symtable.push(id);
        self.symtable.len() - 1
    }

    /// 预留对象槽位（负载解码之前调用）
    pub fn reserve_object(&mut self) -> usize {
        self.objtable.push(None);
        self.objtable.len() - 1
    }

    /// 节点构造完成后填充槽位
    pub fn fill_object(&mut self, slot: usize, id: NodeId) {
        if let Some(entry) = self.objtable.get_mut(slot) {
            *entry = Some(id);
        }
    }

    pub fn symbol(&self, index: usize) -> Option<NodeId> {
        self.symtable.get(index).copied()
    }

    /// 对象槽位内容；下标 0 与仍在构造中的槽位返回 None
    pub fn object(&self, index: usize) -> Option<NodeId> {
        self.objtable.get(index).copied().flatten()
    }

    pub fn symbol_count(&self) -> usize {
        self.symtable.len()
    }

    /// 对象表长度（包含下标 0 的占位）
    pub fn object_count(&self) -> usize {
        self.objtable.len()
    }

    pub fn is_valid_symbol(&self, index: i64) -> bool {
        index >= 0 && (index as u64) < self.symtable.len() as u64
    }

    pub fn is_valid_link(&self, index: i64) -> bool {
        index > 0 && (index as u64) < self.objtable.len() as u64
    }

    pub fn symbols(&self) -> &[NodeId] {
        &self.symtable
    }
}
