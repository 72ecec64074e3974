//! Marshal 变长有符号整数
//!
//! 格式：首字节为有符号数 `b`
//! - `b == 0`：值为 0
//! - `4 < b < 128`：值为 `b - 5`（1..=122）
//! - `-129 < b < -4`：值为 `b + 5`（-123..=-1）
//! - 其余：`|b|` 为后续小端字节数，`b < 0` 时再减去 `256^|b|`

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use crate::utils::LocalizeError;

/// 多字节形式最多使用的字节数
pub const MAX_FIXNUM_BYTES: usize = 4;

/// 从读取器解码一个整数
pub fn read_fixnum<R: Read>(reader: &mut R) -> Result<i64, std::io::Error> {
    let lead = reader.read_i8()? as i64;
    match lead {
        0 => Ok(0),
        5..=127 => Ok(lead - 5),
        -128..=-5 => Ok(lead + 5),
        _ => {
            let size = lead.unsigned_abs() as usize;
            let magnitude = reader.read_uint::<LittleEndian>(size)? as i64;
            if lead < 0 {
                Ok(magnitude - (1i64 << (8 * size)))
            } else {
                Ok(magnitude)
            }
        }
    }
}

/// 把整数编码写入写入器
pub fn write_fixnum<W: Write>(writer: &mut W, value: i64) -> Result<(), LocalizeError> {
    match value {
        0 => writer.write_u8(0)?,
        1..=122 => writer.write_i8((value + 5) as i8)?,
        -123..=-1 => writer.write_i8((value - 5) as i8)?,
        _ => {
            let size = byte_count(value).ok_or(LocalizeError::Overflow(value))?;
            let stored = if value < 0 {
                value + (1i64 << (8 * size))
            } else {
                value
            };
            let lead = if value < 0 { -(size as i8) } else { size as i8 };
            writer.write_i8(lead)?;
            writer.write_uint::<LittleEndian>(stored as u64, size)?;
        }
    }
    Ok(())
}

/// 编码为独立的字节序列
pub fn encode_fixnum(value: i64) -> Result<Vec<u8>, LocalizeError> {
    let mut out = Vec::with_capacity(MAX_FIXNUM_BYTES + 1);
    write_fixnum(&mut out, value)?;
    Ok(out)
}

/// 从字节切片解码，返回值与消耗的字节数
pub fn decode_fixnum(bytes: &[u8]) -> Result<(i64, usize), LocalizeError> {
    let mut cursor = Cursor::new(bytes);
    let value = read_fixnum(&mut cursor).map_err(|_| LocalizeError::Truncated {
        offset: cursor.position(),
    })?;
    Ok((value, cursor.position() as usize))
}

/// 能容纳该值的最小字节数（超过 4 字节返回 None）
fn byte_count(value: i64) -> Option<usize> {
    (1..=MAX_FIXNUM_BYTES).find(|&size| {
        let limit = 1i64 << (8 * size);
        if value < 0 {
            value >= -limit
        } else {
            value < limit
        }
    })
}
