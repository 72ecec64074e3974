use std::io::Cursor;
use crate::datatypes::{peek_u8, read_bytes, read_u8, remaining};
use crate::utils::LocalizeError;
use super::fixnum::read_fixnum;
use super::node::{token, ClassRefKind, Node, NodeId, TRAILING_MARKER};
use super::tables::ReferenceTables;
use super::{Document, MAGIC, MAX_DEPTH};

/// Marshal 解码器
///
/// 一次解码对应一个 [`Document`]；按标记字节分派，边解码边建立引用表。
pub(crate) struct Decoder<'a> {
    cursor: Cursor<&'a [u8]>,
    nodes: Vec<Node>,
    tables: ReferenceTables,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            nodes: Vec::new(),
            tables: ReferenceTables::new(),
        }
    }

    pub(crate) fn decode(mut self) -> Result<Document, LocalizeError> {
        let data = *self.cursor.get_ref();
        if data.len() < MAGIC.len() || data[..MAGIC.len()] != MAGIC {
            let mut found = [0u8; 2];
            for (slot, byte) in found.iter_mut().zip(data.iter()) {
                *slot = *byte;
            }
            return Err(LocalizeError::InvalidMagic(found));
        }
        self.cursor.set_position(MAGIC.len() as u64);

        let root = self.read_node(0, false)?;
        let trailing = data[self.cursor.position() as usize..].to_vec();
        if !trailing.is_empty() {
            tracing::debug!(bytes = trailing.len(), "根节点之后存在多余数据，原样保留");
        }

        Ok(Document::from_parts(self.nodes, self.tables, root, trailing))
    }

    /// 解码一个节点
    ///
    /// `count_follows` 表示该子树之后紧跟一个数量字段（`I` 的实例变量数量、
    /// 对象字段数量）。子树末尾的字符串此时不能吞掉 0x06 尾随标记。
    fn read_node(&mut self, depth: usize, count_follows: bool) -> Result<NodeId, LocalizeError> {
        if depth > MAX_DEPTH {
            return Err(LocalizeError::Format(format!(
                "嵌套层数超过 {} (offset {})",
                MAX_DEPTH,
                self.cursor.position()
            )));
        }

        let offset = self.cursor.position();
        let tag = self.byte()?;
        if !is_known_token(tag) {
            return Err(LocalizeError::UnknownToken { token: tag, offset });
        }

        // 先预留槽位，负载内的引用才能指向仍在构造中的父节点
        let slot = if token::reserves_object_slot(tag) {
            Some(self.tables.reserve_object())
        } else {
            None
        };

        let node = match tag {
            token::NIL => Node::Nil,
            token::TRUE => Node::True,
            token::FALSE => Node::False,
            token::IVAR => {
                let value = self.read_node(depth + 1, true)?;
                let ivars = self.read_pairs(depth + 1, count_follows)?;
                Node::InstanceVar { value, ivars }
            }
            token::STRING => {
                let bytes = self.sized_bytes()?;
                let trailing_marker = !count_follows && self.consume_trailing_marker();
                Node::String { bytes, trailing_marker }
            }
            token::SYMBOL => Node::Symbol(self.sized_bytes()?),
            token::SYMLINK => {
                let index = self.fixnum()?;
                if !self.tables.is_valid_symbol(index) {
                    return Err(LocalizeError::DanglingSymbol {
                        index,
                        count: self.tables.symbol_count(),
                    });
                }
                Node::SymbolLink(index as usize)
            }
            token::FIXNUM => Node::Fixnum(self.fixnum()?),
            token::ARRAY => {
                let count = self.length()?;
                let mut items = Vec::with_capacity(count.min(remaining(&self.cursor)));
                for index in 0..count {
                    let last = index + 1 == count;
                    items.push(self.read_node(depth + 1, last && count_follows)?);
                }
                Node::Array(items)
            }
            token::HASH => Node::Hash(self.read_pairs(depth + 1, count_follows)?),
            token::FLOAT => Node::Float(self.sized_bytes()?),
            token::BIGNUM => {
                let sign = self.byte()?;
                let words = self.length()?;
                let length = words.checked_mul(2).ok_or_else(|| {
                    LocalizeError::Format(format!("大整数长度溢出: {} words", words))
                })?;
                Node::Bignum { sign, words: self.raw(length)? }
            }
            token::REGEX => {
                let source = self.sized_bytes()?;
                let options = self.byte()?;
                Node::Regex { source, options }
            }
            token::USER_MARSHAL => {
                let class_name = self.read_node(depth + 1, false)?;
                let data = self.read_node(depth + 1, count_follows)?;
                Node::UserMarshal { class_name, data }
            }
            token::OBJECT => {
                let class_name = self.read_node(depth + 1, true)?;
                let fields = self.read_pairs(depth + 1, count_follows)?;
                Node::Object { class_name, fields }
            }
            token::LINK => {
                let index = self.fixnum()?;
                if !self.tables.is_valid_link(index) {
                    return Err(LocalizeError::DanglingLink {
                        index,
                        count: self.tables.object_count(),
                    });
                }
                Node::Link(index as usize)
            }
            token::USER_DEFINED => {
                let class_name = self.read_node(depth + 1, false)?;
                let data = self.sized_bytes()?;
                Node::UserDefined { class_name, data }
            }
            _ => match ClassRefKind::from_token(tag) {
                Some(kind) => Node::ClassRef { kind, name: self.sized_bytes()? },
                None => return Err(LocalizeError::UnknownToken { token: tag, offset }),
            },
        };

        let id = self.alloc(node);
        if tag == token::SYMBOL {
            self.tables.push_symbol(id);
        }
        if let Some(slot) = slot {
            self.tables.fill_object(slot, id);
        }
        Ok(id)
    }

    /// 数量 + N 对 (键, 值)，不带自身标记（Hash/Object/实例变量表共用）
    ///
    /// `count_follows` 传给最后一个值：它是整个子树的末尾。
    fn read_pairs(&mut self, depth: usize, count_follows: bool) -> Result<Vec<(NodeId, NodeId)>, LocalizeError> {
        let count = self.length()?;
        let mut pairs = Vec::with_capacity(count.min(remaining(&self.cursor)));
        for index in 0..count {
            let key = self.read_node(depth, false)?;
            let value = self.read_node(depth, index + 1 == count && count_follows)?;
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn consume_trailing_marker(&mut self) -> bool {
        if peek_u8(&self.cursor) == Some(TRAILING_MARKER) {
            self.cursor.set_position(self.cursor.position() + 1);
            true
        } else {
            false
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn byte(&mut self) -> Result<u8, LocalizeError> {
        let offset = self.cursor.position();
        read_u8(&mut self.cursor).map_err(|_| LocalizeError::Truncated { offset })
    }

    fn fixnum(&mut self) -> Result<i64, LocalizeError> {
        let offset = self.cursor.position();
        read_fixnum(&mut self.cursor).map_err(|_| LocalizeError::Truncated { offset })
    }

    fn length(&mut self) -> Result<usize, LocalizeError> {
        let offset = self.cursor.position();
        let value = self.fixnum()?;
        usize::try_from(value).map_err(|_| {
            LocalizeError::Format(format!("负数长度 {} (offset {})", value, offset))
        })
    }

    fn raw(&mut self, length: usize) -> Result<Vec<u8>, LocalizeError> {
        let offset = self.cursor.position();
        read_bytes(&mut self.cursor, length).map_err(|_| LocalizeError::Truncated { offset })
    }

    fn sized_bytes(&mut self) -> Result<Vec<u8>, LocalizeError> {
        let length = self.length()?;
        self.raw(length)
    }
}

fn is_known_token(tag: u8) -> bool {
    matches!(
        tag,
        token::NIL
            | token::TRUE
            | token::FALSE
            | token::IVAR
            | token::STRING
            | token::SYMBOL
            | token::SYMLINK
            | token::FIXNUM
            | token::ARRAY
            | token::HASH
            | token::FLOAT
            | token::BIGNUM
            | token::REGEX
            | token::USER_MARSHAL
            | token::OBJECT
            | token::LINK
            | token::USER_DEFINED
            | token::MODULE_OLD
            | token::CLASS
            | token::MODULE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Document, LocalizeError> {
        Decoder::new(bytes).decode()
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(decode(b"\x04\x090"), Err(LocalizeError::InvalidMagic([0x04, 0x09]))));
        assert!(matches!(decode(b""), Err(LocalizeError::InvalidMagic([0, 0]))));
    }

    #[test]
    fn test_unknown_token() {
        match decode(b"\x04\x08S") {
            Err(LocalizeError::UnknownToken { token, offset }) => {
                assert_eq!(token, b'S');
                assert_eq!(offset, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_string() {
        let result = decode(b"\x04\x08\"\x0aBo");
        assert!(matches!(result, Err(LocalizeError::Truncated { .. })));
        assert!(result.unwrap_err().is_format_error());
    }

    #[test]
    fn test_truncated_array() {
        assert!(matches!(decode(b"\x04\x08[\x07i\x06"), Err(LocalizeError::Truncated { .. })));
    }

    #[test]
    fn test_negative_length() {
        assert!(matches!(decode(b"\x04\x08\"\xfa"), Err(LocalizeError::Format(_))));
    }

    #[test]
    fn test_dangling_symlink() {
        let result = decode(b"\x04\x08[\x07:\x06a;\x06");
        assert!(matches!(result, Err(LocalizeError::DanglingSymbol { index: 1, count: 1 })));
    }

    #[test]
    fn test_dangling_link() {
        assert!(matches!(decode(b"\x04\x08[\x06@\x00"), Err(LocalizeError::DanglingLink { index: 0, .. })));
        assert!(matches!(decode(b"\x04\x08[\x06@\x07"), Err(LocalizeError::DanglingLink { index: 2, .. })));
    }

    #[test]
    fn test_self_reference_is_legal() {
        // [@1]：数组引用自身
        let doc = decode(b"\x04\x08[\x06@\x06").unwrap();
        let items = doc.array_items(doc.root()).unwrap();
        assert_eq!(doc.resolve(items[0]), doc.root());
    }

    #[test]
    fn test_object_slot_order() {
        // [ "a", I"b" ]：数组=1，"a"=2，I=3，"b"=4
        let doc = decode(b"\x04\x08[\x07\"\x06aI\"\x06b\x00").unwrap();
        assert_eq!(doc.tables().object_count(), 5);
        let items = doc.array_items(doc.root()).unwrap().to_vec();
        assert_eq!(doc.tables().object(1), Some(doc.root()));
        assert_eq!(doc.tables().object(2), Some(items[0]));
        assert_eq!(doc.tables().object(3), Some(items[1]));
        assert_eq!(doc.string_bytes(doc.tables().object(4).unwrap()), Some(&b"b"[..]));
    }

    #[test]
    fn test_trailing_marker_detection() {
        let doc = decode(b"\x04\x08[\x07\"\x06a\x06\"\x06b").unwrap();
        let items = doc.array_items(doc.root()).unwrap().to_vec();
        assert!(matches!(doc.node(items[0]), Node::String { trailing_marker: true, .. }));
        assert!(matches!(doc.node(items[1]), Node::String { trailing_marker: false, .. }));
    }

    #[test]
    fn test_ivar_count_is_not_a_marker() {
        let doc = decode(b"\x04\x08I\"\x06a\x06:\x06ET").unwrap();
        match doc.node(doc.root()) {
            Node::InstanceVar { value, ivars } => {
                assert!(matches!(doc.node(*value), Node::String { trailing_marker: false, .. }));
                assert_eq!(ivars.len(), 1);
                assert_eq!(doc.node(ivars[0].1), &Node::True);
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_ivar_count_after_wrapped_container() {
        // I[ "a" ] 带一个实例变量：字符串之后的 0x06 是实例变量数量
        let bytes = b"\x04\x08I[\x06\"\x06a\x06:\x07@xT";
        let doc = decode(bytes).unwrap();
        let Node::InstanceVar { value, ivars } = doc.node(doc.root()) else {
            panic!("expected ivar wrapper");
        };
        assert_eq!(ivars.len(), 1);
        let items = doc.array_items(*value).unwrap();
        assert!(matches!(doc.node(items[0]), Node::String { trailing_marker: false, .. }));
        assert_eq!(doc.encode().unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_marker_inside_wrapped_container_before_last_item() {
        // I[ "a"\x06, "b" ]：只有最后一个元素紧挨实例变量数量
        let bytes = b"\x04\x08I[\x07\"\x06a\x06\"\x06b\x06:\x07@xT";
        let doc = decode(bytes).unwrap();
        let Node::InstanceVar { value, .. } = doc.node(doc.root()) else {
            panic!("expected ivar wrapper");
        };
        let items = doc.array_items(*value).unwrap();
        assert!(matches!(doc.node(items[0]), Node::String { trailing_marker: true, .. }));
        assert!(matches!(doc.node(items[1]), Node::String { trailing_marker: false, .. }));
        assert_eq!(doc.encode().unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_class_ref_registers_fresh_slot() {
        let doc = decode(b"\x04\x08[\x07c\x0dRPG::MapM\x08RPG").unwrap();
        assert_eq!(doc.tables().object_count(), 4);
        let items = doc.array_items(doc.root()).unwrap().to_vec();
        assert_eq!(doc.tables().object(2), Some(items[0]));
        assert_eq!(doc.tables().object(3), Some(items[1]));
    }

    #[test]
    fn test_nesting_limit() {
        let mut bytes = b"\x04\x08".to_vec();
        for _ in 0..(MAX_DEPTH + 2) {
            bytes.extend_from_slice(b"[\x06");
        }
        bytes.push(b'0');
        assert!(matches!(decode(&bytes), Err(LocalizeError::Format(_))));
    }
}
