/*!
伪装成Redis replica的同步驱动

完成握手后, master发来的RDB快照写入`rdb_sink`, 其后的增量命令流
原样写入`aof_sink`; 同步期间由后台任务每秒向master报告复制偏移量
*/
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use log::{error, info};
use scheduled_thread_pool::{JobHandle, ScheduledThreadPool};

use crate::config::Config;
use crate::conn::Conn;
use crate::error::{Error, Result};
use crate::resp;
use crate::to_string;

/// replica所处的同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 握手协商中
    Negotiating,
    /// 全量同步
    FullSync,
    /// 部分同步
    PartialSync,
    /// 同步已结束
    Closed,
}

/// diskless传输中标记RDB结束的随机串长度
const EOF_MARK_LEN: usize = 40;
const SYNC_BUF_SIZE: usize = 10 * 1024;
const ACK_INTERVAL: Duration = Duration::from_secs(1);

/// 以replica身份同步master数据的驱动
pub struct Replica {
    config: Config,
    replica_id: String,
    replica_offset: Arc<AtomicI64>,
    mode: Mode,
    ack: Option<AckWorker>,
    ack_errors: Option<Receiver<Error>>,
}

impl Replica {
    pub fn new(config: Config) -> Replica {
        Replica {
            config,
            replica_id: String::new(),
            replica_offset: Arc::new(AtomicI64::new(0)),
            mode: Mode::Negotiating,
            ack: None,
            ack_errors: None,
        }
    }

    /// master分配的replication id, PSYNC回复之前为空
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// 当前的复制偏移量
    pub fn replica_offset(&self) -> i64 {
        self.replica_offset.load(Ordering::Relaxed)
    }

    /// 当前的同步阶段
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// ACK任务的写入失败通过此通道暴露, 不会中断主同步循环
    pub fn ack_errors(&mut self) -> Option<Receiver<Error>> {
        self.ack_errors.take()
    }

    /// 连接master并开始同步, 直到连接关闭或发生致命错误
    ///
    /// 具体的细节体现在各个方法内
    pub fn sync_with_master(&mut self) -> Result<()> {
        let mut conn = Conn::connect(&self.config)?;
        let result = self.sync(&mut conn);
        self.mode = Mode::Closed;
        if let Some(worker) = self.ack.take() {
            worker.cancel();
        }
        result
    }

    fn sync(&mut self, conn: &mut Conn) -> Result<()> {
        self.handshake(conn)?;
        let partial = self.send_psync(conn)?;
        let reply = conn.read_reply()?;
        self.start_ack(conn)?;

        if reply.starts_with("FULLRESYNC") {
            let tokens: Vec<&str> = reply.split_whitespace().collect();
            if tokens.len() != 3 {
                return Err(Error::ProtocolViolation(format!(
                    "invalid FULLRESYNC reply: {}",
                    reply
                )));
            }
            if partial && !self.config.continue_if_partial_failed {
                return Err(Error::PartialSyncRefused);
            }
            self.replica_id = tokens[1].to_string();
            let offset = tokens[2].parse::<i64>().map_err(|_| {
                Error::ProtocolViolation(format!("invalid FULLRESYNC offset: {}", reply))
            })?;
            self.mode = Mode::FullSync;
            info!(
                "master replied FULLRESYNC, replication id {}, offset {}",
                self.replica_id, offset
            );
            self.full_sync(conn, offset)
        } else if reply.starts_with("CONTINUE") {
            let tokens: Vec<&str> = reply.split_whitespace().collect();
            if tokens.len() >= 2 {
                // master换了replication id
                self.replica_id = tokens[1].to_string();
            } else {
                self.replica_id = self.config.master_replica_id.clone();
            }
            self.replica_offset
                .store(self.config.master_replica_offset, Ordering::Relaxed);
            self.mode = Mode::PartialSync;
            info!(
                "master replied CONTINUE, resuming at offset {}",
                self.config.master_replica_offset
            );
            self.stream_aof(conn)
        } else {
            Err(Error::ProtocolViolation(format!(
                "unexpected PSYNC reply: {}",
                reply
            )))
        }
    }

    // replication.c::syncWithMaster
    fn handshake(&mut self, conn: &mut Conn) -> Result<()> {
        if !self.config.master_password.is_empty() {
            let mut args: Vec<&[u8]> = Vec::new();
            if !self.config.master_user.is_empty() {
                args.push(self.config.master_user.as_bytes());
            }
            args.push(self.config.master_password.as_bytes());
            conn.send(b"AUTH", &args)?;
            conn.expect_ok()?;
        }

        conn.send(b"PING", &[])?;
        let reply = conn.read_reply()?;
        if reply != "PONG" {
            return Err(Error::ProtocolViolation(format!(
                "expect PONG but {}",
                reply
            )));
        }

        if let Some(port) = self.config.announce_port {
            let port = port.to_string();
            conn.send(b"REPLCONF", &[b"listening-port", port.as_bytes()])?;
            conn.expect_ok()?;
        }
        if let Some(ip) = &self.config.announce_ip {
            conn.send(b"REPLCONF", &[b"ip-address", ip.as_bytes()])?;
            conn.expect_ok()?;
        }

        // EOF: 支持diskless的EOF式RDB传输
        // PSYNC2: 理解+CONTINUE <new repl ID>
        conn.send(b"REPLCONF", &[b"capa", b"eof", b"capa", b"psync2"])?;
        conn.expect_ok()?;
        Ok(())
    }

    fn send_psync(&mut self, conn: &mut Conn) -> Result<bool> {
        let partial =
            !self.config.master_replica_id.is_empty() && self.config.master_replica_offset > 0;
        let (id, offset) = if partial {
            (
                self.config.master_replica_id.clone(),
                self.config.master_replica_offset.to_string(),
            )
        } else {
            ("?".to_string(), "-1".to_string())
        };
        conn.send(b"PSYNC", &[id.as_bytes(), offset.as_bytes()])?;
        Ok(partial)
    }

    fn full_sync(&mut self, conn: &mut Conn, offset: i64) -> Result<()> {
        let header = conn.read_header_line()?;
        if header.first() != Some(&resp::DOLLAR) {
            return Err(Error::ProtocolViolation(format!(
                "bad RDB transfer header: {}",
                to_string(header)
            )));
        }
        let payload = header[1..].to_vec();

        let mut sink = self.config.rdb_sink.take();
        if payload.starts_with(b"EOF:") {
            // diskless传输: 数据以头部宣告的40字节随机串结尾
            let mark = payload[4..].to_vec();
            if mark.len() != EOF_MARK_LEN {
                return Err(Error::ProtocolViolation(format!(
                    "bad EOF mark length: {}",
                    mark.len()
                )));
            }
            info!("receiving diskless RDB transfer");
            copy_until_mark(|buf| conn.read(buf), sink.as_deref_mut(), &mark)?;
        } else {
            let size = to_string(payload)
                .parse::<usize>()
                .map_err(|_| {
                    Error::ProtocolViolation(format!(
                        "bad RDB transfer header: {}",
                        to_string(header.clone())
                    ))
                })?;
            info!("receiving RDB transfer of {} bytes", size);
            copy_exact(|buf| conn.read(buf), sink.as_deref_mut(), size)?;
        }
        // drop关闭RDB sink, 下游解析器由此感知EOF
        drop(sink);
        self.replica_offset.store(offset, Ordering::Relaxed);
        info!("full synchronization finished, offset {}", offset);

        if self.config.continue_after_full_sync {
            self.stream_aof(conn)?;
        }
        Ok(())
    }

    /// 把master发来的AOF字节流原样写入sink, 累计复制偏移量
    fn stream_aof(&mut self, conn: &mut Conn) -> Result<()> {
        let mut sink = self.config.aof_sink.take();
        let mut buf = [0u8; SYNC_BUF_SIZE];
        loop {
            let n = conn.read(&mut buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            write_sink(&mut sink.as_deref_mut(), &buf[..n])?;
            self.replica_offset.fetch_add(n as i64, Ordering::Relaxed);
        }
    }

    // ACK任务以1秒为周期向master报告复制偏移量, 写入失败即退出
    fn start_ack(&mut self, conn: &Conn) -> Result<()> {
        let mut stream = conn.clone_writer()?;
        let offset = self.replica_offset.clone();
        let (sender, receiver) = mpsc::channel();
        let pool = ScheduledThreadPool::new(1);
        let live = Arc::new(AtomicBool::new(true));
        let handle = {
            let live = live.clone();
            pool.execute_at_fixed_rate(ACK_INTERVAL, ACK_INTERVAL, move || {
                if !live.load(Ordering::Relaxed) {
                    return;
                }
                let offset = offset.load(Ordering::Relaxed);
                if offset <= 0 {
                    return;
                }
                let offset = offset.to_string();
                if let Err(err) =
                    resp::send_command(&mut stream, b"REPLCONF", &[b"ACK", offset.as_bytes()])
                {
                    error!("offset ack error: {}", err);
                    live.store(false, Ordering::Relaxed);
                    let _ = sender.send(err);
                }
            })
        };
        self.ack = Some(AckWorker {
            _pool: pool,
            handle,
        });
        self.ack_errors = Some(receiver);
        Ok(())
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        if let Some(worker) = self.ack.take() {
            worker.cancel();
        }
    }
}

struct AckWorker {
    _pool: ScheduledThreadPool,
    handle: JobHandle,
}

impl AckWorker {
    fn cancel(&self) {
        self.handle.cancel();
    }
}

fn write_sink(sink: &mut Option<&mut (dyn Write + Send + 'static)>, bytes: &[u8]) -> Result<()> {
    if let Some(sink) = sink {
        sink.write_all(bytes).map_err(Error::Sink)?;
    }
    Ok(())
}

/// 按宣告的长度接收RDB
pub(crate) fn copy_exact<F>(
    mut read: F,
    mut sink: Option<&mut (dyn Write + Send + 'static)>,
    size: usize,
) -> Result<()>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    let mut buf = [0u8; SYNC_BUF_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let n = read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        write_sink(&mut sink, &buf[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// 接收diskless传输的RDB: 滑动窗口保存最近收到的`mark.len()`个字节,
/// 窗口与mark相等时传输结束; mark本身不写入sink
pub(crate) fn copy_until_mark<F>(
    mut read: F,
    mut sink: Option<&mut (dyn Write + Send + 'static)>,
    mark: &[u8],
) -> Result<()>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    let mut buf = [0u8; SYNC_BUF_SIZE];
    let mut window: Vec<u8> = Vec::with_capacity(mark.len());
    loop {
        let n = read(&mut buf)?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        if n >= mark.len() {
            write_sink(&mut sink, &window)?;
            write_sink(&mut sink, &buf[..n - mark.len()])?;
            window.clear();
            window.extend_from_slice(&buf[n - mark.len()..n]);
        } else {
            let overflow = (window.len() + n).saturating_sub(mark.len());
            if overflow > 0 {
                write_sink(&mut sink, &window[..overflow])?;
                window.drain(..overflow);
            }
            window.extend_from_slice(&buf[..n]);
        }
        if window == mark {
            return Ok(());
        }
    }
}
