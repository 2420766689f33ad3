/*!
ziplist、listpack、intset三种紧凑容器编码的解析,
整数元素一律以十进制渲染为字符串
*/
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::reader::RdbReader;

// ziplist整数编码标记
const ZIP_INT_16BIT: u8 = 0xC0;
const ZIP_INT_32BIT: u8 = 0xD0;
const ZIP_INT_64BIT: u8 = 0xE0;
const ZIP_INT_24BIT: u8 = 0xF0;
const ZIP_INT_8BIT: u8 = 0xFE;

/// 解析一个带长度前缀的ziplist, 返回其中所有元素
pub(crate) fn parse_ziplist<R: Read>(input: &mut RdbReader<R>) -> Result<Vec<String>> {
    let bytes = input.read_length_bytes()?;
    let mut cursor = RdbReader::new(Cursor::new(bytes));
    // zlbytes与zltail只在原地反向遍历时有用, 跳过
    cursor.read_u32_le()?;
    cursor.read_u32_le()?;
    let count = cursor.read_u16_le()?;

    let mut values = Vec::with_capacity(count as usize);
    if count == u16::MAX {
        // zllen到达上限后不再维护, 只能顺序扫描到终结符
        while cursor.peek(1)?[0] != 0xFF {
            values.push(read_ziplist_entry(&mut cursor)?);
        }
    } else {
        for _ in 0..count {
            values.push(read_ziplist_entry(&mut cursor)?);
        }
    }

    let end = cursor.read_u8()?;
    if end != 0xFF {
        return Err(Error::MalformedInput(format!(
            "ziplist expect 0xFF but {}",
            end
        )));
    }
    Ok(values)
}

// ziplist.c::ZIP_DECODE_LENGTH
fn read_ziplist_entry<R: Read>(cursor: &mut RdbReader<R>) -> Result<String> {
    // prev-entry-length只在反向遍历时有用, 消费后丢弃
    if cursor.read_u8()? == 0xFE {
        cursor.read_u32_le()?;
    }
    let flag = cursor.read_u8()?;
    match flag >> 6 {
        0 => {
            return cursor.read_fixed_string((flag & 0x3F) as usize);
        }
        1 => {
            let next = cursor.read_u8()?;
            let length = (((flag as u16) & 0x3F) << 8) | next as u16;
            return cursor.read_fixed_string(length as usize);
        }
        2 => {
            let length = cursor.read_u32_be()?;
            return cursor.read_fixed_string(length as usize);
        }
        _ => {}
    }
    match flag {
        ZIP_INT_8BIT => Ok(cursor.read_i8()?.to_string()),
        ZIP_INT_16BIT => Ok(cursor.read_i16_le()?.to_string()),
        ZIP_INT_24BIT => Ok(cursor.read_i24_le()?.to_string()),
        ZIP_INT_32BIT => Ok(cursor.read_i32_le()?.to_string()),
        ZIP_INT_64BIT => Ok(cursor.read_i64_le()?.to_string()),
        0xF1..=0xFD => Ok((((flag & 0x0F) as i64) - 1).to_string()),
        _ => Err(Error::MalformedInput(format!(
            "bad ziplist entry encoding: {}",
            flag
        ))),
    }
}

/// 解析一个带长度前缀的listpack, 返回其中所有元素
pub(crate) fn parse_listpack<R: Read>(input: &mut RdbReader<R>) -> Result<Vec<String>> {
    let bytes = input.read_length_bytes()?;
    parse_listpack_blob(bytes)
}

/// 解析一段完整的listpack字节
pub(crate) fn parse_listpack_blob(bytes: Vec<u8>) -> Result<Vec<String>> {
    let mut cursor = RdbReader::new(Cursor::new(bytes));
    // total-bytes
    cursor.read_u32_le()?;
    let count = cursor.read_u16_le()?;

    let mut values = Vec::with_capacity(count as usize);
    if count == u16::MAX {
        while cursor.peek(1)?[0] != 0xFF {
            values.push(read_listpack_entry(&mut cursor)?);
        }
    } else {
        for _ in 0..count {
            values.push(read_listpack_entry(&mut cursor)?);
        }
    }

    let end = cursor.read_u8()?;
    if end != 0xFF {
        return Err(Error::MalformedInput(format!(
            "listpack expect 0xFF but {}",
            end
        )));
    }
    Ok(values)
}

fn read_listpack_entry<R: Read>(cursor: &mut RdbReader<R>) -> Result<String> {
    let encoding = cursor.read_u8()?;

    // 字符串编码直接返回原始内容
    if encoding & 0xC0 == 0x80 {
        let length = (encoding & 0x3F) as usize;
        let value = cursor.read_fixed_string(length)?;
        skip_backlen(cursor, 1 + length)?;
        return Ok(value);
    }
    if encoding & 0xF0 == 0xE0 {
        let next = cursor.read_u8()?;
        let length = (((encoding & 0x0F) as usize) << 8) | next as usize;
        let value = cursor.read_fixed_string(length)?;
        skip_backlen(cursor, 2 + length)?;
        return Ok(value);
    }
    if encoding == 0xF0 {
        let length = cursor.read_u32_le()? as usize;
        let value = cursor.read_fixed_string(length)?;
        skip_backlen(cursor, 5 + length)?;
        return Ok(value);
    }

    // 整数编码: 先取出偏置的无符号值, 再按补码规则恢复符号
    let (unsigned, neg_start, neg_max, entry_len) = if encoding & 0x80 == 0 {
        ((encoding & 0x7F) as u64, u64::MAX, 0, 1)
    } else if encoding & 0xE0 == 0xC0 {
        let next = cursor.read_u8()?;
        let unsigned = (((encoding & 0x1F) as u64) << 8) | next as u64;
        (unsigned, 1 << 12, 8191, 2)
    } else if encoding == 0xF1 {
        (cursor.read_u16_le()? as u64, 1 << 15, u16::MAX as u64, 3)
    } else if encoding == 0xF2 {
        (cursor.read_u24_le()? as u64, 1 << 23, 0xFFFFFF, 4)
    } else if encoding == 0xF3 {
        (cursor.read_u32_le()? as u64, 1 << 31, u32::MAX as u64, 5)
    } else if encoding == 0xF4 {
        (cursor.read_u64_le()?, 1 << 63, u64::MAX, 9)
    } else {
        return Err(Error::MalformedInput(format!(
            "bad listpack entry encoding: {}",
            encoding
        )));
    };
    skip_backlen(cursor, entry_len)?;

    let value = if unsigned >= neg_start {
        -((neg_max - unsigned) as i64) - 1
    } else {
        unsigned as i64
    };
    Ok(value.to_string())
}

// listpack.c::lpEncodeBacklen
fn skip_backlen<R: Read>(cursor: &mut RdbReader<R>, entry_len: usize) -> Result<()> {
    let backlen = if entry_len <= 127 {
        1
    } else if entry_len < 16383 {
        2
    } else if entry_len < 2097151 {
        3
    } else if entry_len < 268435455 {
        4
    } else {
        5
    };
    cursor.read_bytes(backlen)?;
    Ok(())
}

/// 解析一个带长度前缀的intset, 返回其中所有整数
pub(crate) fn parse_intset<R: Read>(input: &mut RdbReader<R>) -> Result<Vec<String>> {
    let bytes = input.read_length_bytes()?;
    let mut cursor = RdbReader::new(Cursor::new(bytes));
    let encoding = cursor.read_u32_le()?;
    let count = cursor.read_u32_le()?;

    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let member = match encoding {
            2 => cursor.read_i16_le()? as i64,
            4 => cursor.read_i32_le()? as i64,
            8 => cursor.read_i64_le()?,
            _ => {
                return Err(Error::MalformedInput(format!(
                    "invalid intset encoding: {}",
                    encoding
                )));
            }
        };
        members.push(member.to_string());
    }
    Ok(members)
}
