use byteorder::ReadBytesExt;
use std::io::{Cursor, Read};
use encoding_rs;

// 基础读取函数
pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, std::io::Error> {
    cursor.read_u8()
}

/// 读取定长原始字节
///
/// 先检查剩余数据量，避免损坏的长度字段触发超大内存分配。
pub fn read_bytes(cursor: &mut Cursor<&[u8]>, length: usize) -> Result<Vec<u8>, std::io::Error> {
    if length > remaining(cursor) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("需要 {} 字节，剩余 {} 字节", length, remaining(cursor)),
        ));
    }
    let mut buffer = vec![0u8; length];
    cursor.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// 查看下一个字节但不移动游标
pub fn peek_u8(cursor: &Cursor<&[u8]>) -> Option<u8> {
    cursor.get_ref().get(cursor.position() as usize).copied()
}

/// 游标之后剩余的字节数
pub fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

// 支持的编码（RPG Maker XP 以后为 UTF-8，老旧日文工程常见 Shift_JIS）
const SUPPORTED_ENCODINGS: &[&str] = &["utf-8", "shift_jis", "windows-1252"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawString {
    pub content: String,
    pub encoding: &'static str,
}

impl RawString {
    /// 尝试多种编码解码
    pub fn decode(data: &[u8]) -> Self {
        for encoding_name in SUPPORTED_ENCODINGS {
            if let Some(encoding) = encoding_rs::Encoding::for_label(encoding_name.as_bytes()) {
                let (decoded, had_errors) = encoding.decode_without_bom_handling(data);
                if !had_errors {
                    return RawString {
                        content: decoded.into_owned(),
                        encoding: encoding_name,
                    };
                }
            }
        }

        // 回退到UTF-8，忽略错误
        RawString {
            content: String::from_utf8_lossy(data).into_owned(),
            encoding: "utf-8",
        }
    }

    /// 按原编码把新文本编码回字节
    ///
    /// 目标编码无法表示的字符会退回 UTF-8。
    pub fn encode_like(&self, text: &str) -> Vec<u8> {
        if self.encoding == "utf-8" {
            return text.as_bytes().to_vec();
        }
        match encoding_rs::Encoding::for_label(self.encoding.as_bytes()) {
            Some(encoding) => {
                let (encoded, _, had_unmappable) = encoding.encode(text);
                if had_unmappable {
                    tracing::warn!(encoding = self.encoding, "译文包含无法编码的字符，改用 UTF-8 写入");
                    text.as_bytes().to_vec()
                } else {
                    encoded.into_owned()
                }
            }
            None => text.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        let raw = RawString::decode("勇者アルシェス".as_bytes());
        assert_eq!(raw.content, "勇者アルシェス");
        assert_eq!(raw.encoding, "utf-8");
    }

    #[test]
    fn test_decode_shift_jis_roundtrip() {
        // "勇者" in Shift_JIS
        let sjis = [0x97, 0x45, 0x8e, 0xd2];
        let raw = RawString::decode(&sjis);
        assert_eq!(raw.encoding, "shift_jis");
        assert_eq!(raw.content, "勇者");
        assert_eq!(raw.encode_like("勇者"), sjis.to_vec());
    }

    #[test]
    fn test_read_bytes_checks_remaining() {
        let data = [1u8, 2, 3];
        let mut cursor = Cursor::new(&data[..]);
        assert!(read_bytes(&mut cursor, 4).is_err());
        assert_eq!(read_bytes(&mut cursor, 2).unwrap(), vec![1, 2]);
        assert_eq!(peek_u8(&cursor), Some(3));
        assert_eq!(remaining(&cursor), 1);
    }
}
