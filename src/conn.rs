/*!
与master之间的TCP连接封装
*/
use std::io::{BufReader, Read};
use std::net::TcpStream;

use log::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resp;

/// 读端带缓冲, 写端是同一连接的克隆, 供命令与ACK独立写入
pub(crate) struct Conn {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Conn {
    /// 建立到master的TCP连接, 应用配置中的超时
    pub(crate) fn connect(config: &Config) -> Result<Conn> {
        let stream = TcpStream::connect((config.master_ip.as_str(), config.master_port))
            .map_err(Error::Io)?;
        stream.set_read_timeout(config.read_timeout).map_err(Error::Io)?;
        stream.set_write_timeout(config.write_timeout).map_err(Error::Io)?;
        info!("connected to master {}:{}", config.master_ip, config.master_port);
        let writer = stream.try_clone().map_err(Error::Io)?;
        Ok(Conn {
            reader: BufReader::new(stream),
            writer,
        })
    }

    pub(crate) fn send(&mut self, command: &[u8], args: &[&[u8]]) -> Result<()> {
        resp::send_command(&mut self.writer, command, args)
    }

    /// 读取一条Simple String回复
    pub(crate) fn read_reply(&mut self) -> Result<String> {
        resp::read_reply(&mut self.reader)
    }

    /// 读取一条回复并要求其为OK
    pub(crate) fn expect_ok(&mut self) -> Result<()> {
        let reply = self.read_reply()?;
        if reply != "OK" {
            return Err(Error::ProtocolViolation(format!("expect OK but {}", reply)));
        }
        Ok(())
    }

    /// 读取一行原始回复(不含CRLF), 用于RDB传输头
    pub(crate) fn read_header_line(&mut self) -> Result<Vec<u8>> {
        resp::read_line(&mut self.reader)
    }

    /// 从连接读取原始字节, 返回0说明连接已被对端关闭
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reader.read(buf).map_err(Error::Io)
    }

    /// 克隆底层连接的写端, 供ACK任务独立使用
    pub(crate) fn clone_writer(&self) -> Result<TcpStream> {
        self.writer.try_clone().map_err(Error::Io)
    }
}
