//! 对象图调试导出
//!
//! 把 [`Document`] 渲染成便于人工查看的 JSON，用于排查提取/写回问题。

use std::io::Read;
use flate2::read::ZlibDecoder;
use serde_json::{json, Map, Value};
use super::node::{ClassRefKind, Node, NodeId};
use super::Document;

impl Document {
    /// 导出为调试 JSON
    ///
    /// `is_script` 为真时，无法按 UTF-8 解码的字符串会尝试先 zlib 解压
    /// （`Scripts.rxdata` 中的脚本正文）。
    pub fn to_debug_json(&self, is_script: bool) -> Value {
        self.dump_node(self.root(), is_script)
    }

    fn dump_node(&self, id: NodeId, is_script: bool) -> Value {
        match self.node(id) {
            Node::Nil => Value::Null,
            Node::True => Value::Bool(true),
            Node::False => Value::Bool(false),
            Node::InstanceVar { value, ivars } => json!([
                "#InsVar",
                self.dump_node(*value, is_script),
                self.dump_pairs(ivars, is_script),
            ]),
            Node::String { bytes, .. } => dump_string(bytes, is_script),
            Node::Symbol(bytes) => json!(["#Symbol", String::from_utf8_lossy(bytes)]),
            Node::SymbolLink(index) => json!(["#SymbolLink", index]),
            Node::Fixnum(value) => json!(value),
            Node::Array(items) => Value::Array(
                items.iter().map(|item| self.dump_node(*item, is_script)).collect(),
            ),
            Node::Hash(pairs) => self.dump_pairs(pairs, is_script),
            Node::Float(bytes) => json!(["#Float", String::from_utf8_lossy(bytes)]),
            Node::Bignum { sign, words } => json!(["#BigNum", (*sign as char).to_string(), hex(words)]),
            Node::Regex { source, options } => json!(["#Regex", String::from_utf8_lossy(source), options]),
            Node::UserMarshal { class_name, data } => json!([
                "#UserMarshal",
                self.dump_node(*class_name, is_script),
                self.dump_node(*data, is_script),
            ]),
            Node::Object { class_name, fields } => json!([
                "#Object",
                self.dump_node(*class_name, is_script),
                self.dump_pairs(fields, is_script),
            ]),
            Node::Link(index) => json!(["#Link", index]),
            Node::UserDefined { class_name, data } => json!([
                "#UserDefined",
                self.dump_node(*class_name, is_script),
                hex(data),
            ]),
            Node::ClassRef { kind, name } => {
                let label = match kind {
                    ClassRefKind::Class => "#Class",
                    ClassRefKind::Module => "#Module",
                    ClassRefKind::ClassOrModule => "#Class/Module",
                };
                json!([label, String::from_utf8_lossy(name)])
            }
        }
    }

    /// 键值对渲染成 JSON 对象；键按可读形式转成字符串
    fn dump_pairs(&self, pairs: &[(NodeId, NodeId)], is_script: bool) -> Value {
        let mut map = Map::new();
        for (key, value) in pairs {
            let name = match self.key_name(*key) {
                Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                None => self.dump_node(*key, is_script).to_string(),
            };
            map.insert(name, self.dump_node(*value, is_script));
        }
        Value::Object(map)
    }
}

fn dump_string(bytes: &[u8], is_script: bool) -> Value {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Value::String(text.to_string());
    }
    if is_script {
        let mut decoder = ZlibDecoder::new(bytes);
        let mut text = String::new();
        if decoder.read_to_string(&mut text).is_ok() {
            return Value::String(text);
        }
    }
    Value::String("#ERROR: String of unknown encoding".to_string())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_dump_object() {
        let doc = Document::decode(b"\x04\x08o:\x0aActor\x07:\x0a@name\"\x08Bob:\x08@hpi\x69").unwrap();
        let value = doc.to_debug_json(false);
        assert_eq!(
            value,
            json!(["#Object", ["#Symbol", "Actor"], {"@name": "Bob", "@hp": 100}])
        );
    }

    #[test]
    fn test_dump_script_string() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"p \"hi\"").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut bytes = b"\x04\x08\"".to_vec();
        bytes.extend(crate::marshal::fixnum::encode_fixnum(compressed.len() as i64).unwrap());
        bytes.extend(&compressed);
        let doc = Document::decode(&bytes).unwrap();

        assert_eq!(doc.to_debug_json(true), json!("p \"hi\""));
        assert_eq!(doc.to_debug_json(false), json!("#ERROR: String of unknown encoding"));
    }
}
