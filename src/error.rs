/*!
本crate统一的错误定义
*/
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 解析RDB或与master同步的过程中所有可能的致命错误
///
/// 错误一经发生, 当前的解析或同步即告终止, 内部不做任何重试
#[derive(Debug, Error)]
pub enum Error {
    /// 字节源提供的数据比格式要求的少
    #[error("truncated input: {0}")]
    TruncatedInput(String),
    /// 终结符、长度或编码标记不符合格式定义
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// 格式合法, 但本crate未实现
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    /// master的回复不符合replication协议
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// 请求部分同步, master却回复FULLRESYNC, 且调用方禁止了降级
    #[error("master requires a full synchronization")]
    PartialSyncRefused,
    /// 连接被对端关闭
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// RDB sink或AOF sink拒绝写入
    #[error("sink write failed")]
    Sink(#[source] io::Error),
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedInput(err.to_string()),
            _ => Error::Io(err),
        }
    }
}
