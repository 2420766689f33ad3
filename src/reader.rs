/*!
RDB字节流读取器, 所有对字节源的解码都经由此模块
*/
use std::io::{ErrorKind, Read};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::to_string;

/// RDB长度前缀的解码结果, 由首字节的最高2位决定:
///
/// 00|XXXXXX => 长度即首字节的低6位
/// 01|XXXXXX XXXXXXXX => 长度为14位, 低6位拼上下一个字节
/// 10|XXXXXX [32 bit integer] => 长度为接下来4个字节的大端整数
/// 11|OBKIND => 内联的特殊编码, 低6位决定具体类型:
///              0,1,2为8/16/32位整数, 3为LZF压缩串
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Length {
    /// 后续数据的字节长度
    Len(u64),
    /// 内联整数, 无后续数据
    Int(i64),
    /// LZF压缩字符串(不支持解压)
    Compressed,
}

/// 对任意字节源的包装, 维护逻辑游标, 提供定宽读取与预读;
/// 所有读取都是EOF严格的: 源中剩余字节不足即报`TruncatedInput`
pub(crate) struct RdbReader<R> {
    input: R,
    peeked: Vec<u8>,
    crc: u64,
}

impl<R: Read> RdbReader<R> {
    pub(crate) fn new(input: R) -> RdbReader<R> {
        RdbReader {
            input,
            peeked: Vec::new(),
            crc: 0,
        }
    }

    /// 迄今为止所有已消费字节的CRC-64(Jones多项式, 与Redis一致)
    pub(crate) fn crc(&self) -> u64 {
        self.crc
    }

    fn fill_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let from_peek = self.peeked.len().min(buf.len());
        if from_peek > 0 {
            buf[..from_peek].copy_from_slice(&self.peeked[..from_peek]);
            self.peeked.drain(..from_peek);
        }
        if from_peek < buf.len() {
            self.input.read_exact(&mut buf[from_peek..]).map_err(|err| {
                if err.kind() == ErrorKind::UnexpectedEof {
                    Error::TruncatedInput(format!("expect {} bytes", buf.len()))
                } else {
                    Error::Io(err)
                }
            })?;
        }
        self.crc = crc64::crc64(self.crc, buf);
        Ok(())
    }

    /// 预读n个字节, 游标不前进, 校验和也不更新
    pub(crate) fn peek(&mut self, n: usize) -> Result<&[u8]> {
        if self.peeked.len() < n {
            let start = self.peeked.len();
            self.peeked.resize(n, 0);
            if let Err(err) = self.input.read_exact(&mut self.peeked[start..]) {
                self.peeked.truncate(start);
                if err.kind() == ErrorKind::UnexpectedEof {
                    return Err(Error::TruncatedInput(format!("expect {} bytes", n)));
                }
                return Err(Error::Io(err));
            }
        }
        Ok(&self.peeked[..n])
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; n];
        self.fill_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取定长字符串, 除长度外不做任何校验
    pub(crate) fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        Ok(to_string(self.read_bytes(n)?))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(&self.read_bytes(2)?))
    }

    pub(crate) fn read_i16_le(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(&self.read_bytes(2)?))
    }

    pub(crate) fn read_u24_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u24(&self.read_bytes(3)?))
    }

    pub(crate) fn read_i24_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i24(&self.read_bytes(3)?))
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(&self.read_bytes(4)?))
    }

    pub(crate) fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(&self.read_bytes(4)?))
    }

    pub(crate) fn read_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(&self.read_bytes(4)?))
    }

    pub(crate) fn read_u64_le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(&self.read_bytes(8)?))
    }

    pub(crate) fn read_i64_le(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(&self.read_bytes(8)?))
    }

    pub(crate) fn read_u64_be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(&self.read_bytes(8)?))
    }

    pub(crate) fn read_f64_le(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(&self.read_bytes(8)?))
    }

    /// 读取文本格式的double(ZSET v1的score编码),
    /// 长度字节253/254/255分别保留为NaN/+Inf/-Inf
    pub(crate) fn read_double(&mut self) -> Result<f64> {
        let len = self.read_u8()?;
        match len {
            255 => Ok(f64::NEG_INFINITY),
            254 => Ok(f64::INFINITY),
            253 => Ok(f64::NAN),
            _ => {
                let buf = self.read_bytes(len as usize)?;
                let literal = to_string(buf);
                literal
                    .parse::<f64>()
                    .map_err(|_| Error::MalformedInput(format!("invalid double literal: {}", literal)))
            }
        }
    }

    /// 读取RDB的长度前缀
    pub(crate) fn read_length(&mut self) -> Result<Length> {
        let byte = self.read_u8()?;
        match byte >> 6 {
            0 => Ok(Length::Len((byte & 0x3F) as u64)),
            1 => {
                let next = self.read_u8()?;
                Ok(Length::Len((((byte & 0x3F) as u64) << 8) | next as u64))
            }
            2 => Ok(Length::Len(self.read_u32_be()? as u64)),
            _ => match byte & 0x3F {
                0 => Ok(Length::Int(self.read_i8()? as i64)),
                1 => Ok(Length::Int(self.read_i16_le()? as i64)),
                2 => Ok(Length::Int(self.read_i32_le()? as i64)),
                3 => Ok(Length::Compressed),
                encoding => Err(Error::MalformedInput(format!(
                    "unknown length encoding: {}",
                    encoding
                ))),
            },
        }
    }

    /// 按长度前缀读取一个string, 内联整数以十进制渲染
    pub(crate) fn read_length_string(&mut self) -> Result<String> {
        match self.read_length()? {
            Length::Len(n) => self.read_fixed_string(n as usize),
            Length::Int(value) => Ok(value.to_string()),
            Length::Compressed => Err(Error::UnsupportedFeature(
                "LZF compressed string".to_string(),
            )),
        }
    }

    /// 按长度前缀读取原始字节, 只接受真实长度
    pub(crate) fn read_length_bytes(&mut self) -> Result<Vec<u8>> {
        match self.read_length()? {
            Length::Len(n) => self.read_bytes(n as usize),
            Length::Int(_) => Err(Error::MalformedInput(
                "expect length-prefixed bytes but got integer".to_string(),
            )),
            Length::Compressed => Err(Error::UnsupportedFeature(
                "LZF compressed string".to_string(),
            )),
        }
    }

    /// 按长度前缀读取一个整数
    pub(crate) fn read_length_u64(&mut self) -> Result<u64> {
        match self.read_length()? {
            Length::Len(n) => Ok(n),
            Length::Int(value) => Ok(value as u64),
            Length::Compressed => Err(Error::MalformedInput(
                "expect length-prefixed integer but got compressed string".to_string(),
            )),
        }
    }
}
