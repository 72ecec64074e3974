//! 写回游标
//!
//! 提取时每个字符串位置按遍历顺序登记为一个槽位；写回时格式适配器
//! 以同样的顺序重新遍历，每遇到一个字符串就调用一次
//! [`WalkCursor::apply_string`]。游标校验组名与原文，发现两次遍历
//! 不一致时报告结构漂移错误。

use crate::catalog::{SlotGroup, StringLookup};
use crate::utils::LocalizeError;

/// 单个文件的写回游标
pub struct WalkCursor<'a> {
    groups: &'a [SlotGroup],
    lookup: &'a dyn StringLookup,
    group: usize,
    index: usize,
    /// 文件级：是否有任何字符串被替换
    modified: bool,
    /// 最近一次检查的字符串是否有译文
    str_modified: bool,
}

impl<'a> WalkCursor<'a> {
    /// 创建游标并定位到第一个非空槽位
    ///
    /// # 参数
    /// * `groups` - 该文件的槽位组（提取时的顺序）
    /// * `lookup` - 只读字符串表
    pub fn new(groups: &'a [SlotGroup], lookup: &'a dyn StringLookup) -> Self {
        let mut cursor = Self {
            groups,
            lookup,
            group: 0,
            index: 0,
            modified: false,
            str_modified: false,
        };
        cursor.skip_empty();
        cursor
    }

    /// 回到第一个槽位并清除修改标记
    pub fn reset(&mut self) {
        self.group = 0;
        self.index = 0;
        self.modified = false;
        self.str_modified = false;
        self.skip_empty();
    }

    pub fn modified(&self) -> bool {
        self.modified
    }

    pub fn str_modified(&self) -> bool {
        self.str_modified
    }

    /// 当前位置 `(组, 槽位)`
    pub fn position(&self) -> (usize, usize) {
        (self.group, self.index)
    }

    /// 剩余未访问的槽位数
    pub fn remaining(&self) -> usize {
        match self.groups.get(self.group) {
            Some(current) => {
                current.slots.len() - self.index
                    + self.groups[self.group + 1..]
                        .iter()
                        .map(|group| group.slots.len())
                        .sum::<usize>()
            }
            None => 0,
        }
    }

    /// 检查一个字符串并解析译文
    ///
    /// # 参数
    /// * `original` - 当前遍历到的原文
    /// * `expected_group` - 适配器认为所在的组名，给出时必须与槽位组一致
    /// * `location` - 显式位置 `(组, 槽位)`；给出时游标移动到该处但不前进
    ///
    /// # 返回
    /// 有效译文；忽略的槽位或无译文时返回 `None`
    pub fn check_string(
        &mut self,
        original: &str,
        expected_group: Option<&str>,
        location: Option<(usize, usize)>,
    ) -> Result<Option<&'a str>, LocalizeError> {
        self.str_modified = false;

        let (group_index, slot_index) = match location {
            Some((group, index)) => {
                let in_range = self
                    .groups
                    .get(group)
                    .is_some_and(|current| index < current.slots.len());
                if !in_range {
                    return Err(LocalizeError::InvalidLocation { group, index });
                }
                self.group = group;
                self.index = index;
                (group, index)
            }
            None => {
                if self.group >= self.groups.len() {
                    return Err(LocalizeError::EndOfStrings);
                }
                (self.group, self.index)
            }
        };

        let groups = self.groups;
        let group = &groups[group_index];
        if let Some(expected) = expected_group {
            if group.name != expected {
                return Err(LocalizeError::GroupMismatch {
                    group: group_index,
                    index: slot_index,
                    expected: group.name.clone(),
                    found: expected.to_string(),
                });
            }
        }

        let slot = &group.slots[slot_index];
        if location.is_none() {
            self.advance();
        }

        if slot.is_ignored() {
            return Ok(None);
        }

        let lookup = self.lookup;
        let entry = lookup
            .entry(&slot.string_id)
            .ok_or_else(|| LocalizeError::UnknownStringId(slot.string_id.clone()))?;
        if entry.original != original {
            return Err(LocalizeError::StringMismatch {
                group: group_index,
                index: slot_index,
                expected: entry.original.clone(),
                found: original.to_string(),
            });
        }

        let local = slot
            .local
            .as_deref()
            .filter(|text| slot.is_local() && *text != original);
        let global = entry
            .translation
            .as_deref()
            .filter(|text| !text.is_empty() && *text != original);
        let resolved = local.or(global);

        self.str_modified = resolved.is_some();
        Ok(resolved)
    }

    /// 检查字符串并返回应写回的文本
    ///
    /// 有译文时返回译文并把文件标记为已修改，否则原样返回 `original`。
    pub fn apply_string(
        &mut self,
        original: &str,
        group: Option<&str>,
        location: Option<(usize, usize)>,
    ) -> Result<String, LocalizeError> {
        match self.check_string(original, group, location)? {
            Some(translation) => {
                self.modified = true;
                Ok(translation.to_string())
            }
            None => Ok(original.to_string()),
        }
    }

    fn advance(&mut self) {
        self.index += 1;
        self.skip_empty();
    }

    /// 跳过空组与已用完的组
    fn skip_empty(&mut self) {
        while self.group < self.groups.len() && self.index >= self.groups[self.group].slots.len() {
            self.group += 1;
            self.index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogString, Slot};
    use std::collections::HashMap;

    fn lookup() -> HashMap<String, CatalogString> {
        let mut strings = HashMap::new();
        strings.insert("0".to_string(), CatalogString::new("Bob", Some("Bobby".to_string())));
        strings.insert("1".to_string(), CatalogString::new("Hero", None));
        strings.insert("2".to_string(), CatalogString::new("Potion", Some("Potion".to_string())));
        strings.insert("3".to_string(), CatalogString::new("Sword", Some(String::new())));
        strings
    }

    fn groups() -> Vec<SlotGroup> {
        vec![
            SlotGroup::new("ID 1", Vec::new()),
            SlotGroup::new("@name", vec![Slot::new("0")]),
            SlotGroup::new("@nickname", vec![Slot::new("1"), Slot::new("2")]),
            SlotGroup::new("ID 2", Vec::new()),
            SlotGroup::new("@name", vec![Slot::new("3")]),
        ]
    }

    #[test]
    fn test_in_order_walk_and_end_of_strings() {
        let strings = lookup();
        let groups = groups();
        let mut cursor = WalkCursor::new(&groups, &strings);
        assert_eq!(cursor.position(), (1, 0));
        assert_eq!(cursor.remaining(), 4);

        assert_eq!(cursor.apply_string("Bob", Some("@name"), None).unwrap(), "Bobby");
        assert!(cursor.str_modified());
        assert_eq!(cursor.apply_string("Hero", Some("@nickname"), None).unwrap(), "Hero");
        assert!(!cursor.str_modified());
        assert_eq!(cursor.apply_string("Potion", None, None).unwrap(), "Potion");
        assert_eq!(cursor.apply_string("Sword", Some("@name"), None).unwrap(), "Sword");
        assert_eq!(cursor.remaining(), 0);

        assert!(matches!(
            cursor.apply_string("Extra", None, None),
            Err(LocalizeError::EndOfStrings)
        ));
        assert!(cursor.modified());
    }

    #[test]
    fn test_local_override_wins() {
        let strings = lookup();
        let groups = vec![SlotGroup::new("@name", vec![Slot::new("0").with_local("Robert")])];
        let mut cursor = WalkCursor::new(&groups, &strings);
        assert_eq!(cursor.apply_string("Bob", None, None).unwrap(), "Robert");
    }

    #[test]
    fn test_local_equal_to_original_falls_back_to_global() {
        let strings = lookup();
        let groups = vec![SlotGroup::new("@name", vec![Slot::new("0").with_local("Bob")])];
        let mut cursor = WalkCursor::new(&groups, &strings);
        assert_eq!(cursor.apply_string("Bob", None, None).unwrap(), "Bobby");
    }

    #[test]
    fn test_noop_translation_keeps_file_unmodified() {
        let strings = lookup();
        let groups = vec![SlotGroup::new("@name", vec![Slot::new("2"), Slot::new("3")])];
        let mut cursor = WalkCursor::new(&groups, &strings);
        assert_eq!(cursor.apply_string("Potion", None, None).unwrap(), "Potion");
        assert_eq!(cursor.apply_string("Sword", None, None).unwrap(), "Sword");
        assert!(!cursor.modified());
    }

    #[test]
    fn test_string_drift() {
        let strings = lookup();
        let groups = groups();
        let mut cursor = WalkCursor::new(&groups, &strings);
        let err = cursor.apply_string("Alice", Some("@name"), None).unwrap_err();
        assert!(err.is_structural_drift());
        assert!(matches!(err, LocalizeError::StringMismatch { group: 1, index: 0, .. }));
    }

    #[test]
    fn test_group_drift() {
        let strings = lookup();
        let groups = groups();
        let mut cursor = WalkCursor::new(&groups, &strings);
        let err = cursor.apply_string("Bob", Some("@nickname"), None).unwrap_err();
        assert!(matches!(err, LocalizeError::GroupMismatch { .. }));
    }

    #[test]
    fn test_unknown_string_id() {
        let strings = lookup();
        let groups = vec![SlotGroup::new("@name", vec![Slot::new("99")])];
        let mut cursor = WalkCursor::new(&groups, &strings);
        let err = cursor.apply_string("Bob", None, None).unwrap_err();
        assert!(err.is_structural_drift());
    }

    #[test]
    fn test_ignored_slot_is_consumed() {
        let strings = lookup();
        let groups = vec![SlotGroup::new("@name", vec![Slot::new("0").ignored(), Slot::new("0")])];
        let mut cursor = WalkCursor::new(&groups, &strings);
        // 忽略的槽位不校验原文
        assert_eq!(cursor.apply_string("Anything", None, None).unwrap(), "Anything");
        assert_eq!(cursor.apply_string("Bob", None, None).unwrap(), "Bobby");
    }

    #[test]
    fn test_explicit_location() {
        let strings = lookup();
        let groups = groups();
        let mut cursor = WalkCursor::new(&groups, &strings);
        assert_eq!(cursor.apply_string("Potion", None, Some((2, 1))).unwrap(), "Potion");
        assert_eq!(cursor.position(), (2, 1));
        assert_eq!(cursor.apply_string("Potion", None, None).unwrap(), "Potion");
        assert_eq!(cursor.position(), (4, 0));

        assert!(matches!(
            cursor.apply_string("Bob", None, Some((0, 0))),
            Err(LocalizeError::InvalidLocation { group: 0, index: 0 })
        ));
    }

    #[test]
    fn test_empty_groups() {
        let strings = lookup();
        let groups = vec![SlotGroup::new("ID 1", Vec::new())];
        let mut cursor = WalkCursor::new(&groups, &strings);
        assert_eq!(cursor.remaining(), 0);
        assert!(matches!(cursor.apply_string("Bob", None, None), Err(LocalizeError::EndOfStrings)));

        cursor.reset();
        assert_eq!(cursor.position(), (1, 0));
    }
}
