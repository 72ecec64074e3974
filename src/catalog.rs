//! 字符串目录
//!
//! 保存整个项目的字符串表（`id -> 原文/全局译文`）以及每个文件按顺序
//! 排列的字符串槽位。提取时生成，写回时只读。
//!
//! # JSON 格式
//!
//! ```json
//! {
//!   "strings": { "0": { "original": "Bob", "translation": "Bobby", "occurrences": 1 } },
//!   "files": {
//!     "Data/Actors.rxdata": [
//!       { "name": "@name", "slots": [ { "id": "0", "local": null, "unlinked": false, "ignored": false, "modified": false } ] }
//!     ]
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::string_types::ExtractedGroup;
use crate::utils::LocalizeError;

bitflags::bitflags! {
    /// 槽位标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlotFlags: u8 {
        const UNLINKED = 0x01;    // 使用本地译文（isLocal）
        const IGNORED = 0x02;     // 忽略，不做翻译
        const MODIFIED = 0x04;    // 重新提取后新增或变化
    }
}

/// 字符串表中的一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogString {
    /// 原文
    pub original: String,
    /// 全局译文
    #[serde(default)]
    pub translation: Option<String>,
    /// 在所有文件中出现的次数
    #[serde(default)]
    pub occurrences: u32,
}

impl CatalogString {
    pub fn new(original: impl Into<String>, translation: Option<String>) -> Self {
        Self {
            original: original.into(),
            translation,
            occurrences: 0,
        }
    }
}

/// 文件中的一个字符串位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSlot", into = "RawSlot")]
pub struct Slot {
    pub string_id: String,
    /// 仅对该位置生效的译文
    pub local: Option<String>,
    pub flags: SlotFlags,
}

impl Slot {
    pub fn new(string_id: impl Into<String>) -> Self {
        Self {
            string_id: string_id.into(),
            local: None,
            flags: SlotFlags::empty(),
        }
    }

    /// 设置本地译文并把槽位与全局译文解绑
    pub fn with_local(mut self, text: impl Into<String>) -> Self {
        self.local = Some(text.into());
        self.flags.insert(SlotFlags::UNLINKED);
        self
    }

    pub fn ignored(mut self) -> Self {
        self.flags.insert(SlotFlags::IGNORED);
        self
    }

    pub fn is_local(&self) -> bool {
        self.flags.contains(SlotFlags::UNLINKED)
    }

    pub fn is_ignored(&self) -> bool {
        self.flags.contains(SlotFlags::IGNORED)
    }

    pub fn is_modified(&self) -> bool {
        self.flags.contains(SlotFlags::MODIFIED)
    }
}

/// 磁盘上的槽位表示（布尔字段）
#[derive(Serialize, Deserialize)]
struct RawSlot {
    id: String,
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    unlinked: bool,
    #[serde(default)]
    ignored: bool,
    #[serde(default)]
    modified: bool,
}

impl From<RawSlot> for Slot {
    fn from(raw: RawSlot) -> Self {
        let mut flags = SlotFlags::empty();
        flags.set(SlotFlags::UNLINKED, raw.unlinked);
        flags.set(SlotFlags::IGNORED, raw.ignored);
        flags.set(SlotFlags::MODIFIED, raw.modified);
        Slot {
            string_id: raw.id,
            local: raw.local,
            flags,
        }
    }
}

impl From<Slot> for RawSlot {
    fn from(slot: Slot) -> Self {
        RawSlot {
            unlinked: slot.is_local(),
            ignored: slot.is_ignored(),
            modified: slot.is_modified(),
            id: slot.string_id,
            local: slot.local,
        }
    }
}

/// 命名的槽位组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotGroup {
    pub name: String,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl SlotGroup {
    pub fn new(name: impl Into<String>, slots: Vec<Slot>) -> Self {
        Self {
            name: name.into(),
            slots,
        }
    }
}

/// 按 id 查询字符串表
///
/// 写回过程中只读；多个文件可以并行共享同一个实现。
pub trait StringLookup {
    fn entry(&self, string_id: &str) -> Option<&CatalogString>;
}

impl StringLookup for HashMap<String, CatalogString> {
    fn entry(&self, string_id: &str) -> Option<&CatalogString> {
        self.get(string_id)
    }
}

impl StringLookup for BTreeMap<String, CatalogString> {
    fn entry(&self, string_id: &str) -> Option<&CatalogString> {
        self.get(string_id)
    }
}

/// 项目字符串目录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringCatalog {
    #[serde(default)]
    pub strings: BTreeMap<String, CatalogString>,
    #[serde(default)]
    pub files: BTreeMap<String, Vec<SlotGroup>>,
}

impl StringLookup for StringCatalog {
    fn entry(&self, string_id: &str) -> Option<&CatalogString> {
        self.strings.get(string_id)
    }
}

impl StringCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self, LocalizeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, LocalizeError> {
        Ok(serde_json::from_str(content)?)
    }

    /// 保存为 JSON 文件
    pub fn save(&self, path: &Path) -> Result<(), LocalizeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, LocalizeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 某个文件的槽位组
    pub fn groups(&self, file: &str) -> Option<&[SlotGroup]> {
        self.files.get(file).map(|groups| groups.as_slice())
    }

    /// 设置全局译文，返回 id 是否存在
    pub fn set_translation(&mut self, string_id: &str, text: Option<String>) -> bool {
        match self.strings.get_mut(string_id) {
            Some(entry) => {
                entry.translation = text;
                true
            }
            None => false,
        }
    }

    /// 按原文查 id
    pub fn find_id(&self, original: &str) -> Option<&str> {
        self.strings
            .iter()
            .find(|(_, entry)| entry.original == original)
            .map(|(id, _)| id.as_str())
    }

    /// 登记一个文件的提取结果
    ///
    /// 相同原文共用一个 id；已有的全局译文保留。重复登记同一文件时，
    /// 新旧两次的槽位序列按 id 做最长公共子序列对齐：对上的槽位沿用旧的
    /// 本地译文与标志，对不上的新槽位标记为 MODIFIED。返回该文件的槽位数量。
    pub fn register_file(&mut self, file: &str, groups: Vec<ExtractedGroup>) -> usize {
        let old_groups = self.files.remove(file);
        if let Some(old_groups) = &old_groups {
            for slot in old_groups.iter().flat_map(|group| group.slots.iter()) {
                if let Some(entry) = self.strings.get_mut(&slot.string_id) {
                    entry.occurrences = entry.occurrences.saturating_sub(1);
                }
            }
        }

        let mut reverse: HashMap<String, String> = self
            .strings
            .iter()
            .map(|(id, entry)| (entry.original.clone(), id.clone()))
            .collect();
        let mut next_id = self
            .strings
            .keys()
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);

        let mut slot_count = 0;
        let mut slot_groups = Vec::with_capacity(groups.len());
        for group in groups {
            let mut slots = Vec::with_capacity(group.strings.len());
            for text in group.strings {
                let id = match reverse.get(&text) {
                    Some(id) => id.clone(),
                    None => {
                        let id = next_id.to_string();
                        next_id += 1;
                        reverse.insert(text.clone(), id.clone());
                        self.strings.insert(id.clone(), CatalogString::new(text, None));
                        id
                    }
                };
                if let Some(entry) = self.strings.get_mut(&id) {
                    entry.occurrences += 1;
                }
                let mut slot = Slot::new(id);
                if old_groups.is_some() {
                    slot.flags.insert(SlotFlags::MODIFIED);
                }
                slots.push(slot);
                slot_count += 1;
            }
            slot_groups.push(SlotGroup::new(group.name, slots));
        }

        if let Some(old_groups) = &old_groups {
            let carried = carry_slot_state(old_groups, &mut slot_groups);
            tracing::debug!(file, carried, "已沿用旧槽位状态");
        }

        tracing::debug!(file, slots = slot_count, "已登记文件字符串");
        self.files.insert(file.to_string(), slot_groups);
        slot_count
    }
}

/// 对齐时 DP 表的单元数上限，超过后只对齐公共前缀与后缀
const MAX_ALIGN_CELLS: usize = 16 * 1024 * 1024;

/// 把旧槽位的状态复制到对齐上的新槽位，返回复制的数量
fn carry_slot_state(old_groups: &[SlotGroup], new_groups: &mut [SlotGroup]) -> usize {
    let old: Vec<&Slot> = old_groups.iter().flat_map(|group| group.slots.iter()).collect();
    let positions: Vec<(usize, usize)> = new_groups
        .iter()
        .enumerate()
        .flat_map(|(g, group)| (0..group.slots.len()).map(move |i| (g, i)))
        .collect();
    let new_ids: Vec<&str> = positions
        .iter()
        .map(|&(g, i)| new_groups[g].slots[i].string_id.as_str())
        .collect();
    let old_ids: Vec<&str> = old.iter().map(|slot| slot.string_id.as_str()).collect();

    let matches = align_ids(&new_ids, &old_ids);
    for &(new_index, old_index) in &matches {
        let (g, i) = positions[new_index];
        new_groups[g].slots[i] = old[old_index].clone();
    }
    matches.len()
}

/// 两个 id 序列的最长公共子序列，返回 `(新下标, 旧下标)` 对，按顺序排列
fn align_ids(new: &[&str], old: &[&str]) -> Vec<(usize, usize)> {
    let prefix = new.iter().zip(old).take_while(|(a, b)| a == b).count();
    let suffix = new[prefix..]
        .iter()
        .rev()
        .zip(old[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|i| (i, i)).collect();

    let new_mid = &new[prefix..new.len() - suffix];
    let old_mid = &old[prefix..old.len() - suffix];
    let (n, m) = (new_mid.len(), old_mid.len());
    if n > 0 && m > 0 {
        if (n + 1).saturating_mul(m + 1) <= MAX_ALIGN_CELLS {
            // lengths[i * (m + 1) + j]：new_mid[i..] 与 old_mid[j..] 的 LCS 长度
            let width = m + 1;
            let mut lengths = vec![0u32; (n + 1) * width];
            for i in (0..n).rev() {
                for j in (0..m).rev() {
                    lengths[i * width + j] = if new_mid[i] == old_mid[j] {
                        lengths[(i + 1) * width + j + 1] + 1
                    } else {
                        lengths[(i + 1) * width + j].max(lengths[i * width + j + 1])
                    };
                }
            }
            let (mut i, mut j) = (0, 0);
            while i < n && j < m {
                if new_mid[i] == old_mid[j] {
                    pairs.push((prefix + i, prefix + j));
                    i += 1;
                    j += 1;
                } else if lengths[(i + 1) * width + j] >= lengths[i * width + j + 1] {
                    i += 1;
                } else {
                    j += 1;
                }
            }
        } else {
            tracing::warn!(new = n, old = m, "槽位变化过大，只对齐首尾相同的部分");
        }
    }

    let new_tail = new.len() - suffix;
    let old_tail = old.len() - suffix;
    pairs.extend((0..suffix).map(|k| (new_tail + k, old_tail + k)));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_groups() -> Vec<ExtractedGroup> {
        vec![
            ExtractedGroup::new("ID 1", Vec::new()),
            ExtractedGroup::new("@name", vec!["Bob".to_string()]),
            ExtractedGroup::new("@nickname", vec!["Bob".to_string(), "Hero".to_string()]),
        ]
    }

    #[test]
    fn test_register_file_deduplicates() {
        let mut catalog = StringCatalog::new();
        assert_eq!(catalog.register_file("Data/Actors.rxdata", sample_groups()), 3);

        assert_eq!(catalog.strings.len(), 2);
        let bob = catalog.find_id("Bob").unwrap().to_string();
        assert_eq!(catalog.strings[&bob].occurrences, 2);

        let groups = catalog.groups("Data/Actors.rxdata").unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups[0].slots.is_empty());
        assert_eq!(groups[1].slots[0].string_id, bob);
        assert_eq!(groups[2].slots[0].string_id, bob);
    }

    #[test]
    fn test_register_file_twice_keeps_translations() {
        let mut catalog = StringCatalog::new();
        catalog.register_file("Data/Actors.rxdata", sample_groups());
        let bob = catalog.find_id("Bob").unwrap().to_string();
        catalog.set_translation(&bob, Some("Bobby".to_string()));

        catalog.register_file("Data/Actors.rxdata", sample_groups());
        assert_eq!(catalog.strings.len(), 2);
        assert_eq!(catalog.strings[&bob].occurrences, 2);
        assert_eq!(catalog.strings[&bob].translation.as_deref(), Some("Bobby"));
    }

    #[test]
    fn test_reregister_keeps_slot_state() {
        let mut catalog = StringCatalog::new();
        catalog.register_file("Data/Actors.rxdata", sample_groups());
        if let Some(groups) = catalog.files.get_mut("Data/Actors.rxdata") {
            groups[1].slots[0] = groups[1].slots[0].clone().with_local("Robert");
            groups[2].slots[1] = groups[2].slots[1].clone().ignored();
        }

        catalog.register_file("Data/Actors.rxdata", sample_groups());
        let groups = catalog.groups("Data/Actors.rxdata").unwrap();
        let bob = &groups[1].slots[0];
        assert_eq!(bob.local.as_deref(), Some("Robert"));
        assert!(bob.is_local());
        assert!(!bob.is_modified());
        assert!(groups[2].slots[1].is_ignored());
        assert!(!groups[2].slots[0].is_modified());
    }

    #[test]
    fn test_reregister_flags_inserted_slots() {
        let mut catalog = StringCatalog::new();
        catalog.register_file("Data/Actors.rxdata", sample_groups());
        let first = catalog.groups("Data/Actors.rxdata").unwrap();
        assert!(first.iter().flat_map(|g| g.slots.iter()).all(|slot| !slot.is_modified()));
        if let Some(groups) = catalog.files.get_mut("Data/Actors.rxdata") {
            groups[2].slots[1] = groups[2].slots[1].clone().with_local("Champion");
        }

        // 在 "Hero" 之前插入一个新字符串
        let updated = vec![
            ExtractedGroup::new("ID 1", Vec::new()),
            ExtractedGroup::new("@name", vec!["Bob".to_string()]),
            ExtractedGroup::new(
                "@nickname",
                vec!["Bob".to_string(), "Knight".to_string(), "Hero".to_string()],
            ),
        ];
        assert_eq!(catalog.register_file("Data/Actors.rxdata", updated), 4);

        let groups = catalog.groups("Data/Actors.rxdata").unwrap();
        let slots = &groups[2].slots;
        assert!(!slots[0].is_modified());
        assert!(slots[1].is_modified());
        assert_eq!(catalog.strings[&slots[1].string_id].original, "Knight");
        // 插入之后的槽位仍然对上原来的状态
        assert_eq!(slots[2].local.as_deref(), Some("Champion"));
        assert!(!slots[2].is_modified());
    }

    #[test]
    fn test_align_ids() {
        assert_eq!(align_ids(&["a", "b", "c"], &["a", "b", "c"]), vec![(0, 0), (1, 1), (2, 2)]);
        assert_eq!(align_ids(&["a", "x", "c"], &["a", "c"]), vec![(0, 0), (2, 1)]);
        assert_eq!(align_ids(&["b", "c"], &["a", "b", "d", "c"]), vec![(0, 1), (1, 3)]);
        assert!(align_ids(&[], &["a"]).is_empty());
    }

    #[test]
    fn test_json_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("project").join("strings.json");

        let mut catalog = StringCatalog::new();
        catalog.register_file("Data/Actors.rxdata", sample_groups());
        if let Some(groups) = catalog.files.get_mut("Data/Actors.rxdata") {
            groups[1].slots[0] = groups[1].slots[0].clone().with_local("Robert");
            groups[2].slots[1] = groups[2].slots[1].clone().ignored();
        }
        catalog.save(&path).unwrap();

        let loaded = StringCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        let slot = &loaded.groups("Data/Actors.rxdata").unwrap()[1].slots[0];
        assert!(slot.is_local());
        assert_eq!(slot.local.as_deref(), Some("Robert"));
        assert!(loaded.groups("Data/Actors.rxdata").unwrap()[2].slots[1].is_ignored());
    }

    #[test]
    fn test_slot_json_format() {
        let json = r#"{
            "strings": { "0": { "original": "Bob", "translation": null } },
            "files": { "Data/Actors.rxdata": [ { "name": "@name", "slots": [ { "id": "0", "unlinked": true, "local": "Rob" } ] } ] }
        }"#;
        let catalog = StringCatalog::from_json(json).unwrap();
        let slot = &catalog.groups("Data/Actors.rxdata").unwrap()[0].slots[0];
        assert_eq!(slot.string_id, "0");
        assert!(slot.is_local());
        assert!(!slot.is_ignored());
        assert_eq!(catalog.entry("0").unwrap().original, "Bob");
        assert!(catalog.entry("1").is_none());
    }
}
