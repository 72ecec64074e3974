//! 文件遍历器
//!
//! 按文件类型遍历 [`Document`]，找出可翻译的字符串位置。
//! 提取与写回共用同一次位置收集，因此两边的访问顺序天然一致。

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use crate::cursor::WalkCursor;
use crate::datatypes::RawString;
use crate::marshal::{Document, Node, NodeId};
use crate::string_types::ExtractedGroup;
use crate::utils::LocalizeError;
use crate::DEFAULT_DATA_FILES;

mod event;

/// 数据文件类型，决定遍历方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalFileKind {
    /// `Data/Scripts`：`[id, 名称, zlib 压缩的源码]` 数组
    Scripts,
    /// `Data/MapInfos`：地图 id 到 `RPG::MapInfo` 的 Hash
    MapInfos,
    /// `Data/MapXXX`：`RPG::Map`，字符串在事件页的指令列表中
    Map,
    /// `Data/CommonEvents`：`RPG::CommonEvent` 数组
    CommonEvents,
    /// `Data/Troops`：`RPG::Troop` 数组，带战斗事件页
    Troops,
    /// 标准数据库文件（角色、物品、技能等）
    Data,
    /// 其他文件，通用遍历
    Generic,
}

impl MarshalFileKind {
    /// 根据路径判断文件类型
    ///
    /// 取路径最后两段，去掉扩展名并转小写后比较，例如
    /// `Game/Data/Actors.rxdata` -> `data/actors`。
    pub fn from_path(path: &str) -> Self {
        let key = kind_key(path);
        match key.as_str() {
            "data/commonevents" => MarshalFileKind::CommonEvents,
            "data/scripts" => MarshalFileKind::Scripts,
            "data/mapinfos" => MarshalFileKind::MapInfos,
            "data/troops" => MarshalFileKind::Troops,
            k if DEFAULT_DATA_FILES.contains(&k) => MarshalFileKind::Data,
            // 必须排在 mapinfos 之后
            k if k.starts_with("data/map") => MarshalFileKind::Map,
            _ => MarshalFileKind::Generic,
        }
    }
}

fn kind_key(path: &str) -> String {
    let parts: Vec<&str> = path.split(['/', '\\']).filter(|p| !p.is_empty()).collect();
    let tail = &parts[parts.len().saturating_sub(2)..];
    tail.iter()
        .enumerate()
        .map(|(i, part)| {
            let part = if i + 1 == tail.len() {
                part.rsplit_once('.').map_or(*part, |(stem, _)| stem)
            } else {
                *part
            };
            part.to_lowercase()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// 一个字符串位置
#[derive(Debug, Clone, PartialEq, Eq)]
enum Site {
    /// 只有组名的分隔组
    Header(String),
    Text {
        group: String,
        node: NodeId,
        /// 内容是 zlib 压缩的脚本
        compressed: bool,
    },
}

/// 提取文件中的全部字符串
///
/// 相邻且组名相同的字符串（例如同一条指令的多行文本）合并为一组。
pub fn extract(doc: &Document, kind: MarshalFileKind) -> Result<Vec<ExtractedGroup>, LocalizeError> {
    let mut groups: Vec<ExtractedGroup> = Vec::new();
    let mut last_was_text = false;
    for site in collect_sites(doc, kind) {
        match site {
            Site::Header(name) => {
                groups.push(ExtractedGroup::header(name));
                last_was_text = false;
            }
            Site::Text { group, node, compressed } => {
                let text = read_text(doc, node, compressed)?;
                match groups.last_mut() {
                    Some(last) if last_was_text && last.name == group => last.strings.push(text.content),
                    _ => groups.push(ExtractedGroup::new(group, vec![text.content])),
                }
                last_was_text = true;
            }
        }
    }
    Ok(groups)
}

/// 按游标写回译文
///
/// # 返回
/// 是否有字符串被替换
pub fn patch(
    doc: &mut Document,
    kind: MarshalFileKind,
    cursor: &mut WalkCursor<'_>,
) -> Result<bool, LocalizeError> {
    for site in collect_sites(doc, kind) {
        let Site::Text { group, node, compressed } = site else {
            continue;
        };
        let text = read_text(doc, node, compressed)?;
        let translated = cursor.apply_string(&text.content, Some(group.as_str()), None)?;
        if cursor.str_modified() {
            let mut bytes = text.encode_like(&translated);
            if compressed {
                bytes = deflate(&bytes)?;
            }
            doc.set_string_bytes(node, bytes);
        }
    }
    Ok(cursor.modified())
}

fn read_text(doc: &Document, node: NodeId, compressed: bool) -> Result<RawString, LocalizeError> {
    let bytes = doc.string_bytes(node).unwrap_or_default();
    if compressed {
        Ok(RawString::decode(&inflate(bytes)?))
    } else {
        Ok(RawString::decode(bytes))
    }
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, LocalizeError> {
    let mut out = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| LocalizeError::Format(format!("脚本解压失败: {}", e)))?;
    Ok(out)
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, LocalizeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn collect_sites(doc: &Document, kind: MarshalFileKind) -> Vec<Site> {
    let mut sites = Vec::new();
    match kind {
        MarshalFileKind::Scripts => collect_scripts(doc, &mut sites),
        MarshalFileKind::MapInfos => collect_map_infos(doc, &mut sites),
        MarshalFileKind::Map => collect_map(doc, &mut sites),
        MarshalFileKind::CommonEvents => collect_common_events(doc, &mut sites),
        MarshalFileKind::Troops => collect_troops(doc, &mut sites),
        MarshalFileKind::Data => collect_data(doc, &mut sites),
        MarshalFileKind::Generic => collect_generic(doc, doc.root(), &mut sites),
    }
    sites
}

fn non_empty_string(doc: &Document, id: NodeId) -> bool {
    doc.string_bytes(id).is_some_and(|bytes| !bytes.is_empty())
}

/// 键的显示文本：符号/字符串按内容，其他键为空串
fn key_text(doc: &Document, key: NodeId) -> String {
    doc.key_name(key)
        .map(|bytes| RawString::decode(bytes).content)
        .unwrap_or_default()
}

fn collect_generic(doc: &Document, id: NodeId, sites: &mut Vec<Site>) {
    collect_generic_except(doc, id, None, sites);
}

/// 通用遍历；`skip_key` 只作用于最外层的键
fn collect_generic_except(doc: &Document, id: NodeId, skip_key: Option<&str>, sites: &mut Vec<Site>) {
    match doc.node(id) {
        Node::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                visit_value(doc, *item, index.to_string(), sites);
            }
        }
        Node::Hash(pairs) | Node::Object { fields: pairs, .. } => {
            for (key, value) in pairs {
                let key = key_text(doc, *key);
                if skip_key == Some(key.as_str()) {
                    continue;
                }
                visit_value(doc, *value, key, sites);
            }
        }
        _ => {}
    }
}

/// 字符串是叶子；其他值继续向下遍历
fn visit_value(doc: &Document, id: NodeId, group: String, sites: &mut Vec<Site>) {
    if doc.string_node(id).is_some() {
        if non_empty_string(doc, id) {
            sites.push(Site::Text {
                group,
                node: id,
                compressed: false,
            });
        }
    } else {
        collect_generic(doc, id, sites);
    }
}

/// 数据库文件：每个对象前插入 `ID n` 分隔组
fn collect_data(doc: &Document, sites: &mut Vec<Site>) {
    let Some(items) = doc.array_items(doc.root()) else {
        return;
    };
    for item in items {
        if !matches!(doc.node(*item), Node::Object { .. }) {
            continue;
        }
        let mut inner = Vec::new();
        collect_generic(doc, *item, &mut inner);
        if inner.is_empty() {
            continue;
        }
        let header = doc
            .field(*item, b"@id")
            .and_then(|id| doc.fixnum(id))
            .map(|id| format!("ID {}", id))
            .unwrap_or_default();
        sites.push(Site::Header(header));
        sites.extend(inner);
    }
}

/// 字段的文本内容，不是字符串时为 `None`
fn field_text(doc: &Document, id: NodeId, name: &[u8]) -> Option<String> {
    let value = doc.field(id, name)?;
    doc.string_bytes(value).map(|bytes| RawString::decode(bytes).content)
}

/// 地图：每个事件以事件名作分隔组，后跟各事件页
fn collect_map(doc: &Document, sites: &mut Vec<Site>) {
    let Some(events) = doc.field(doc.root(), b"@events") else {
        return;
    };
    let Some(events) = doc.pairs(events) else {
        return;
    };
    for (_, map_event) in events {
        let mut inner = Vec::new();
        if let Some(pages) = doc.field(*map_event, b"@pages") {
            event::collect_pages(doc, pages, &mut inner);
        }
        if !inner.is_empty() {
            sites.push(Site::Header(field_text(doc, *map_event, b"@name").unwrap_or_default()));
            sites.extend(inner);
        }
    }
}

/// 公共事件：分隔组为 `Common Event <id> <名称>`
fn collect_common_events(doc: &Document, sites: &mut Vec<Site>) {
    let Some(items) = doc.array_items(doc.root()) else {
        return;
    };
    for item in items {
        let Some(list) = doc.field(*item, b"@list") else {
            continue;
        };
        let mut inner = Vec::new();
        event::collect_event_list(doc, list, &mut inner);
        if inner.is_empty() {
            continue;
        }
        let mut header = "Common Event".to_string();
        if let Some(id) = doc.field(*item, b"@id").and_then(|id| doc.fixnum(id)) {
            header.push_str(&format!(" {}", id));
        }
        if doc.field(*item, b"@name").is_some() {
            header.push(' ');
            header.push_str(&field_text(doc, *item, b"@name").unwrap_or_default());
        }
        sites.push(Site::Header(header));
        sites.extend(inner);
    }
}

/// 敌群：`@pages` 以外的字段按数据库方式遍历，然后是战斗事件页
fn collect_troops(doc: &Document, sites: &mut Vec<Site>) {
    let Some(items) = doc.array_items(doc.root()) else {
        return;
    };
    for item in items {
        if doc.class_name(*item) != Some(b"RPG::Troop") {
            continue;
        }
        let mut inner = Vec::new();
        collect_generic_except(doc, *item, Some("@pages"), &mut inner);
        if !inner.is_empty() {
            let header = match doc.field(*item, b"@id").and_then(|id| doc.fixnum(id)) {
                Some(id) => format!("ID {}", id),
                None => "ID ?".to_string(),
            };
            sites.push(Site::Header(header));
            sites.extend(inner);
        }
        if let Some(pages) = doc.field(*item, b"@pages") {
            event::collect_pages(doc, pages, sites);
        }
    }
}

fn collect_scripts(doc: &Document, sites: &mut Vec<Site>) {
    let Some(entries) = doc.array_items(doc.root()) else {
        return;
    };
    for entry in entries {
        let Some(&[_, name, source, ..]) = doc.array_items(*entry) else {
            continue;
        };
        let group = match doc.string_bytes(name) {
            Some(bytes) if !bytes.is_empty() => format!("Script: {}", RawString::decode(bytes).content),
            _ => "Script".to_string(),
        };
        if non_empty_string(doc, source) {
            sites.push(Site::Text {
                group,
                node: source,
                compressed: true,
            });
        }
    }
}

fn collect_map_infos(doc: &Document, sites: &mut Vec<Site>) {
    let Some(pairs) = doc.pairs(doc.root()) else {
        return;
    };
    for (key, value) in pairs {
        if !matches!(doc.node(*value), Node::Object { .. }) {
            continue;
        }
        let Some(name) = doc.field(*value, b"@name") else {
            continue;
        };
        if non_empty_string(doc, name) {
            let map_id = match doc.fixnum(doc.resolve(*key)) {
                Some(id) => id.to_string(),
                None => key_text(doc, *key),
            };
            sites.push(Site::Text {
                group: format!("Map {}", map_id),
                node: name,
                compressed: false,
            });
        }
    }
}
