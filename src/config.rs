/*!
定义[`Replica`]所需的各项配置信息

[`Replica`]: ../replica/struct.Replica.html
*/
use std::io::Write;
use std::time::Duration;

/// 配置信息结构体定义
pub struct Config {
    /// master的地址
    pub master_ip: String,
    /// master的端口
    pub master_port: u16,
    /// 用户名, 无用户名则设置为空
    pub master_user: String,
    /// 密码, 为空则跳过AUTH
    pub master_password: String,
    /// 通过REPLCONF ip-address上报的地址, None则不上报
    pub announce_ip: Option<String>,
    /// 通过REPLCONF listening-port上报的端口, None则不上报
    pub announce_port: Option<u16>,
    /// Replication ID, 若无此id, 设置为空即可
    pub master_replica_id: String,
    /// Replication Offset, 与`master_replica_id`一起设置时将尝试部分同步
    pub master_replica_offset: i64,
    /// 部分同步被master拒绝后, 是否降级为全量同步
    pub continue_if_partial_failed: bool,
    /// 全量同步期间接收RDB数据的sink, 接收完毕即被关闭(drop);
    /// None则丢弃整个RDB
    pub rdb_sink: Option<Box<dyn Write + Send>>,
    /// 全量同步完成后, 是否继续接收增量的AOF字节流
    pub continue_after_full_sync: bool,
    /// 接收AOF字节流的sink, None则丢弃
    pub aof_sink: Option<Box<dyn Write + Send>>,
    /// Read Timeout
    pub read_timeout: Option<Duration>,
    /// Write Timeout
    pub write_timeout: Option<Duration>,
}
