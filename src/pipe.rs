/*!
连接replica驱动与RDB解析器的进程内管道

典型用法: 把写端作为`rdb_sink`交给[`Replica`], 读端交给
[`RdbParser`], 全量同步收到的RDB字节即可边接收边解析

[`Replica`]: ../replica/struct.Replica.html
[`RdbParser`]: ../rdb/struct.RdbParser.html
*/
use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

// 写端最多领先读端这么多块
const PIPE_DEPTH: usize = 16;

/// 创建一对管道读写端; 写端drop后, 读端将读到EOF
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (sender, receiver) = sync_channel(PIPE_DEPTH);
    (
        PipeWriter { sender },
        PipeReader {
            receiver,
            chunk: Vec::new(),
            pos: 0,
        },
    )
}

/// 管道的写端
pub struct PipeWriter {
    sender: SyncSender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 管道的读端
pub struct PipeReader {
    receiver: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // 写端已全部关闭
                Err(_) => return Ok(0),
            }
        }
        let n = (self.chunk.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
