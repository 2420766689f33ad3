/*!
* 以Redis replica的身份接入主从复制, 将master发来的数据还原为结构化的事件流。
*
* # 原理
*
* 此crate实现了[Redis Replication协议]的replica一侧: 程序连接到master完成握手之后,
* master会将此刻内存中的全部数据以RDB的格式dump一份发送过来, 其后的写入操作(即AOF
* 命令流)也会源源不断地传播给replica。
*
* RDB部分由[`rdb::RdbParser`]流式解析, RDB中的每一条数据对应一个[`rdb::Event`];
* AOF部分不做解析, 原样写入调用方提供的sink。两者之间用[`pipe::pipe`]衔接,
* 即可做到边接收边解析。
*
* # 示例
*
* ```no_run
* use std::thread;
*
* use redis_replica::config::Config;
* use redis_replica::pipe::pipe;
* use redis_replica::rdb::RdbParser;
* use redis_replica::replica::Replica;
*
* fn main() -> redis_replica::Result<()> {
*     let (rdb_writer, rdb_reader) = pipe();
*
*     let config = Config {
*         master_ip: String::from("127.0.0.1"),
*         master_port: 6379,
*         master_user: String::new(),              // 用户名为空
*         master_password: String::new(),          // 密码为空, 跳过AUTH
*         announce_ip: None,
*         announce_port: None,
*         master_replica_id: String::new(),        // 无此前的replication id
*         master_replica_offset: 0,
*         continue_if_partial_failed: true,
*         rdb_sink: Some(Box::new(rdb_writer)),    // RDB写入管道
*         continue_after_full_sync: false,         // 全量同步后即结束
*         aof_sink: None,
*         read_timeout: None,                      // None, 即读取永不超时
*         write_timeout: None,                     // None, 即写入永不超时
*     };
*
*     // 解析线程从管道读RDB
*     let parser = thread::spawn(move || {
*         let mut events = RdbParser::new(rdb_reader).parse();
*         while events.has_next() {
*             println!("{:?}", events.next());
*         }
*     });
*
*     let mut replica = Replica::new(config);
*     replica.sync_with_master()?;
*     let _ = parser.join();
*     Ok(())
* }
* ```
*
* [Redis Replication协议]: https://redis.io/topics/replication
* [`rdb::RdbParser`]: rdb/struct.RdbParser.html
* [`rdb::Event`]: rdb/enum.Event.html
* [`pipe::pipe`]: pipe/fn.pipe.html
*/

pub mod config;
mod conn;
mod encoding;
pub mod error;
pub mod pipe;
pub mod rdb;
mod reader;
pub mod replica;
mod resp;

pub use error::{Error, Result};

/// 转换为utf-8字符串，不验证正确性
pub(crate) fn to_string(bytes: Vec<u8>) -> String {
    return unsafe { String::from_utf8_unchecked(bytes) };
}
