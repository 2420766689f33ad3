/*!
RESP协议的编解码, 只覆盖与master交互所需的部分
*/
use std::io::{BufRead, ErrorKind, Write};

use crate::error::{Error, Result};
use crate::to_string;

// 回车换行, 在redis响应中一般表示终结符, 或用作分隔符以分隔数据
pub(crate) const CR: u8 = b'\r';
pub(crate) const LF: u8 = b'\n';
// 代表array响应
pub(crate) const STAR: u8 = b'*';
// 代表bulk string响应
pub(crate) const DOLLAR: u8 = b'$';
// 代表simple string响应
pub(crate) const PLUS: u8 = b'+';
// 代表error响应
pub(crate) const MINUS: u8 = b'-';

/// 以RESP Array格式发送一条命令
pub(crate) fn send_command<W: Write>(output: &mut W, command: &[u8], args: &[&[u8]]) -> Result<()> {
    let mut buf = Vec::new();
    buf.push(STAR);
    buf.extend_from_slice((args.len() + 1).to_string().as_bytes());
    buf.extend_from_slice(&[CR, LF, DOLLAR]);
    buf.extend_from_slice(command.len().to_string().as_bytes());
    buf.extend_from_slice(&[CR, LF]);
    buf.extend_from_slice(command);
    buf.extend_from_slice(&[CR, LF]);
    for arg in args {
        buf.push(DOLLAR);
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(&[CR, LF]);
        buf.extend_from_slice(arg);
        buf.extend_from_slice(&[CR, LF]);
    }
    output.write_all(&buf).map_err(map_write_err)?;
    output.flush().map_err(map_write_err)
}

fn map_write_err(err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            Error::ConnectionClosed
        }
        _ => Error::Io(err),
    }
}

/// 读取一行以CRLF结尾的数据, 返回内容不含CRLF;
/// 行首的'\n'是master的keepalive填充, 直接丢弃
pub(crate) fn read_line<R: BufRead>(input: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    loop {
        let byte = read_u8(input)?;
        if line.is_empty() && byte == LF {
            continue;
        }
        if byte == CR {
            let byte = read_u8(input)?;
            if byte != LF {
                return Err(Error::ProtocolViolation("expect LF after CR".to_string()));
            }
            return Ok(line);
        }
        line.push(byte);
    }
}

/// 读取一条回复; Simple String返回其内容, Error回复转为错误
pub(crate) fn read_reply<R: BufRead>(input: &mut R) -> Result<String> {
    let line = read_line(input)?;
    match line.first() {
        Some(&PLUS) => Ok(to_string(line[1..].to_vec())),
        Some(&MINUS) => Err(Error::ProtocolViolation(to_string(line[1..].to_vec()))),
        _ => Err(Error::ProtocolViolation(format!(
            "unexpected reply: {}",
            to_string(line)
        ))),
    }
}

fn read_u8<R: BufRead>(input: &mut R) -> Result<u8> {
    let mut buf = [0; 1];
    input.read_exact(&mut buf).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            Error::ConnectionClosed
        } else {
            Error::Io(err)
        }
    })?;
    Ok(buf[0])
}
