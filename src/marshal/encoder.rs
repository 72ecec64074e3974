use crate::utils::LocalizeError;
use super::fixnum::write_fixnum;
use super::node::{Node, NodeId, TRAILING_MARKER};
use super::{Document, MAGIC, MAX_DEPTH};

/// Marshal 编码器
///
/// 与解码器对称：按相同顺序计数符号与对象槽位，
/// 写出 `;`/`@` 时校验下标仍落在已写出的表内。
pub(crate) struct Encoder<'d> {
    doc: &'d Document,
    out: Vec<u8>,
    symbols: usize,
    objects: usize,
}

impl<'d> Encoder<'d> {
    pub(crate) fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            out: Vec::new(),
            symbols: 0,
            // 下标 0 为占位
            objects: 1,
        }
    }

    pub(crate) fn encode(mut self) -> Result<Vec<u8>, LocalizeError> {
        self.out.extend_from_slice(&MAGIC);
        self.write_node(self.doc.root(), 0)?;
        self.out.extend_from_slice(self.doc.trailing());
        Ok(self.out)
    }

    fn write_node(&mut self, id: NodeId, depth: usize) -> Result<(), LocalizeError> {
        if depth > MAX_DEPTH {
            return Err(LocalizeError::Format(format!("嵌套层数超过 {}", MAX_DEPTH)));
        }

        let node = self.doc.node(id);
        self.out.push(node.token());
        if node.reserves_object_slot() {
            self.objects += 1;
        }

        match node {
            Node::Nil | Node::True | Node::False => {}
            Node::InstanceVar { value, ivars } => {
                self.write_node(*value, depth + 1)?;
                self.write_pairs(ivars, depth + 1)?;
            }
            Node::String { bytes, trailing_marker } => {
                self.write_sized(bytes)?;
                if *trailing_marker {
                    self.out.push(TRAILING_MARKER);
                }
            }
            Node::Symbol(bytes) => {
                self.write_sized(bytes)?;
                self.symbols += 1;
            }
            Node::SymbolLink(index) => {
                if *index >= self.symbols {
                    return Err(LocalizeError::DanglingSymbol {
                        index: *index as i64,
                        count: self.symbols,
                    });
                }
                write_fixnum(&mut self.out, *index as i64)?;
            }
            Node::Fixnum(value) => write_fixnum(&mut self.out, *value)?,
            Node::Array(items) => {
                write_fixnum(&mut self.out, items.len() as i64)?;
                for item in items {
                    self.write_node(*item, depth + 1)?;
                }
            }
            Node::Hash(pairs) => self.write_pairs(pairs, depth + 1)?,
            Node::Float(bytes) => self.write_sized(bytes)?,
            Node::Bignum { sign, words } => {
                self.out.push(*sign);
                write_fixnum(&mut self.out, (words.len() / 2) as i64)?;
                self.out.extend_from_slice(words);
            }
            Node::Regex { source, options } => {
                self.write_sized(source)?;
                self.out.push(*options);
            }
            Node::UserMarshal { class_name, data } => {
                self.write_node(*class_name, depth + 1)?;
                self.write_node(*data, depth + 1)?;
            }
            Node::Object { class_name, fields } => {
                self.write_node(*class_name, depth + 1)?;
                self.write_pairs(fields, depth + 1)?;
            }
            Node::Link(index) => {
                if *index == 0 || *index >= self.objects {
                    return Err(LocalizeError::DanglingLink {
                        index: *index as i64,
                        count: self.objects,
                    });
                }
                write_fixnum(&mut self.out, *index as i64)?;
            }
            Node::UserDefined { class_name, data } => {
                self.write_node(*class_name, depth + 1)?;
                self.write_sized(data)?;
            }
            Node::ClassRef { name, .. } => self.write_sized(name)?,
        }
        Ok(())
    }

    fn write_pairs(&mut self, pairs: &[(NodeId, NodeId)], depth: usize) -> Result<(), LocalizeError> {
        write_fixnum(&mut self.out, pairs.len() as i64)?;
        for (key, value) in pairs {
            self.write_node(*key, depth)?;
            self.write_node(*value, depth)?;
        }
        Ok(())
    }

    fn write_sized(&mut self, bytes: &[u8]) -> Result<(), LocalizeError> {
        write_fixnum(&mut self.out, bytes.len() as i64)?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }
}
