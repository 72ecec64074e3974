use serde::{Serialize, Deserialize};

/// 提取出的一组字符串
///
/// 提取遍历按顺序产生若干组，组名由所在位置决定
/// （数组下标、字段名、`ID n` 等）。组内字符串也按遍历顺序排列；
/// 写回时必须以完全相同的顺序访问。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedGroup {
    /// 组名
    pub name: String,
    /// 组内的原文
    pub strings: Vec<String>,
}

impl ExtractedGroup {
    /// 创建新的字符串组
    pub fn new(name: impl Into<String>, strings: Vec<String>) -> Self {
        ExtractedGroup {
            name: name.into(),
            strings,
        }
    }

    /// 空组（只有组名，用作分隔标记）
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// 统计一组提取结果中的字符串总数
pub fn count_strings(groups: &[ExtractedGroup]) -> usize {
    groups.iter().map(|group| group.strings.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_strings() {
        let groups = vec![
            ExtractedGroup::header("ID 1"),
            ExtractedGroup::new("@name", vec!["Bob".to_string()]),
            ExtractedGroup::new("@description", vec!["A".to_string(), "B".to_string()]),
        ];
        assert!(groups[0].is_empty());
        assert_eq!(count_strings(&groups), 3);
    }
}
