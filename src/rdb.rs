/*!
RDB中各项Redis数据相关的结构体定义, 以及RDB解析相关的代码在此模块下

解析运行在独立的线程上, 解析出的每一条数据作为一个[`Event`]投递到
有界通道中, 消费端通过[`EventStream`]依次拉取
*/
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;

use byteorder::{BigEndian, ByteOrder};
use log::info;

use crate::encoding;
use crate::error::{Error, Result};
use crate::reader::RdbReader;

/// 事件通道的容量, 生产与消费速度不匹配时阻塞生产端
const EVENT_CHANNEL_BOUND: usize = 128;

/// RDB中的一条数据, 以及数据之外的文件结构信息
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// 文件开头的5个字节, 内容固定为`REDIS`
    MagicNumber(String),
    /// RDB版本, 紧随magic number之后的4个ASCII数字
    Version(u32),
    /// 辅助字段, 记录生成此RDB的redis版本、位数等信息
    AuxField { field: String, value: String },
    /// 后续数据所属的db
    SelectDb(u64),
    /// 当前db的容量提示, 用于避免加载时反复rehash
    ResizeDb { db_size: u64, expires_size: u64 },
    /// 代表Redis中的String类型数据
    String(StringObject),
    /// 代表Redis中的List类型数据
    List(ListObject),
    /// 代表Redis中的Set类型数据
    Set(SetObject),
    /// 代表Redis中的SortedSet类型数据
    SortedSet(ZSetObject),
    /// 代表Redis中的Hash类型数据
    Hash(HashObject),
    /// 代表Redis中的Stream类型数据
    Stream(StreamObject),
}

/// 数据的key及其元信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisKey {
    /// 数据所属的db
    pub db_id: u64,
    /// 数据的key
    pub key: String,
    /// 过期时间戳, 单位毫秒, -1代表不过期
    pub expire_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringObject {
    pub key: RedisKey,
    /// 数据的值
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListObject {
    pub key: RedisKey,
    /// List中所有的元素, 保持原有顺序
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetObject {
    pub key: RedisKey,
    /// Set中所有的元素, 保持编码中的顺序
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZSetObject {
    pub key: RedisKey,
    /// SortedSet中所有的元素
    pub members: Vec<ZSetEntry>,
}

/// SortedSet中的一条元素
#[derive(Debug, Clone, PartialEq)]
pub struct ZSetEntry {
    /// 元素值
    pub member: String,
    /// 元素的排序分数
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashObject {
    pub key: RedisKey,
    /// 数据所有的字段
    pub fields: Vec<HashField>,
}

/// Hash类型数据中的一个字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashField {
    /// 字段名
    pub field: String,
    /// 字段值
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamObject {
    pub key: RedisKey,
    /// Stream中未被删除的entry, 按id升序
    pub entries: Vec<StreamEntry>,
    /// Stream上的所有consumer group
    pub groups: Vec<StreamGroup>,
    /// 最后一条entry的id, 无数据时为0-0
    pub last_id: StreamId,
    /// 第一条未被删除的entry的id, 仅v2格式记录
    pub first_id: Option<StreamId>,
    /// 被删除过的最大id, 仅v2格式记录
    pub max_deleted_id: Option<StreamId>,
    /// 累计写入的entry总数, 仅v2格式记录
    pub entries_added: Option<u64>,
}

/// Stream entry的id, 毫秒时间戳加序列号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: StreamId,
    /// entry的字段, 保持写入顺序
    pub fields: Vec<(String, String)>,
}

/// Stream的consumer group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGroup {
    pub name: String,
    /// 此group最后投递(未必确认)的id
    pub last_id: StreamId,
    /// global PEL: 所有已投递未确认的消息, 按id索引
    pub pel: BTreeMap<StreamId, StreamNack>,
    pub consumers: Vec<StreamConsumer>,
}

/// PEL中的一条未确认消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNack {
    pub id: StreamId,
    /// 最后一次投递的时间戳, 毫秒
    pub delivery_time_ms: u64,
    /// 累计投递次数
    pub delivery_count: u64,
    /// 最后一次投递到的consumer名字
    pub consumer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConsumer {
    pub name: String,
    /// consumer最后一次活跃的时间戳, 毫秒
    pub seen_time_ms: u64,
    /// 此consumer名下未确认消息的id, 对应group PEL中的条目
    pub pel: Vec<StreamId>,
}

/// RDB解析器, 输入为一个RDB字节源
pub struct RdbParser<R> {
    reader: RdbReader<R>,
}

impl RdbParser<File> {
    /// 从RDB文件创建解析器
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RdbParser<File>> {
        let file = File::open(path).map_err(Error::Io)?;
        Ok(RdbParser::new(file))
    }
}

impl<R: Read + Send + 'static> RdbParser<R> {
    pub fn new(input: R) -> RdbParser<R> {
        RdbParser {
            reader: RdbReader::new(input),
        }
    }

    /// 启动解析线程并返回事件流; 事件流被drop后解析随之终止
    pub fn parse(self) -> EventStream {
        let (sender, receiver) = sync_channel(EVENT_CHANNEL_BOUND);
        thread::spawn(move || {
            let mut parser = self;
            if let Err(err) = parser.run(&sender) {
                let _ = sender.send(Err(err));
            }
        });
        EventStream {
            receiver,
            current: None,
            err: None,
        }
    }

    fn run(&mut self, events: &SyncSender<Result<Event>>) -> Result<()> {
        // 开头5个字节: REDIS
        let magic = self.reader.read_fixed_string(5)?;
        if magic != "REDIS" {
            return Err(Error::MalformedInput(format!(
                "wrong magic number: {}",
                magic
            )));
        }
        if events.send(Ok(Event::MagicNumber(magic))).is_err() {
            return Ok(());
        }

        // 4个ASCII数字: rdb版本
        let raw_version = self.reader.read_fixed_string(4)?;
        let version = raw_version
            .parse::<u32>()
            .map_err(|_| Error::MalformedInput(format!("invalid rdb version: {}", raw_version)))?;
        if !(1..=11).contains(&version) {
            return Err(Error::UnsupportedFeature(format!("rdb version {}", version)));
        }
        if events.send(Ok(Event::Version(version))).is_err() {
            return Ok(());
        }

        let mut db_id: u64 = 0;
        // 过期时间只作用于紧随其后的那一条数据
        let mut expire_at_ms: i64 = -1;

        loop {
            let opcode = self.reader.read_u8()?;
            match opcode {
                RDB_OPCODE_AUX => {
                    let field = self.reader.read_length_string()?;
                    let value = self.reader.read_length_string()?;
                    info!("{}: {}", field, value);
                    if events.send(Ok(Event::AuxField { field, value })).is_err() {
                        return Ok(());
                    }
                }
                RDB_OPCODE_SELECTDB => {
                    db_id = self.reader.read_length_u64()?;
                    if events.send(Ok(Event::SelectDb(db_id))).is_err() {
                        return Ok(());
                    }
                }
                RDB_OPCODE_RESIZEDB => {
                    let db_size = self.reader.read_length_u64()?;
                    let expires_size = self.reader.read_length_u64()?;
                    if events
                        .send(Ok(Event::ResizeDb {
                            db_size,
                            expires_size,
                        }))
                        .is_err()
                    {
                        return Ok(());
                    }
                }
                RDB_OPCODE_EXPIRETIME => {
                    expire_at_ms = self.reader.read_u32_le()? as i64 * 1000;
                }
                RDB_OPCODE_EXPIRETIME_MS => {
                    expire_at_ms = self.reader.read_u64_le()? as i64;
                }
                RDB_OPCODE_FREQ => {
                    // LFU frequency
                    self.reader.read_u8()?;
                }
                RDB_OPCODE_IDLE => {
                    // LRU idle time
                    self.reader.read_length_u64()?;
                }
                RDB_OPCODE_MODULE_AUX => {
                    self.reader.read_length()?;
                    self.skip_module_value()?;
                }
                RDB_OPCODE_FUNCTION => {
                    return Err(Error::UnsupportedFeature(
                        "pre-release function format".to_string(),
                    ));
                }
                RDB_OPCODE_FUNCTION2 => {
                    return Err(Error::UnsupportedFeature("function".to_string()));
                }
                RDB_OPCODE_EOF => {
                    if version >= 5 {
                        let computed = self.reader.crc();
                        let stored = self.reader.read_u64_le()?;
                        // 校验和为0说明生成方关闭了校验
                        if stored != 0 && stored != computed {
                            return Err(Error::MalformedInput(format!(
                                "rdb checksum mismatch: expect {:016x} but {:016x}",
                                stored, computed
                            )));
                        }
                    }
                    return Ok(());
                }
                value_type => {
                    let key = self.reader.read_length_string()?;
                    let key = RedisKey {
                        db_id,
                        key,
                        expire_at_ms,
                    };
                    let event = self.read_object(value_type, key)?;
                    expire_at_ms = -1;
                    if events.send(Ok(event)).is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    // 根据传入的数据类型, 从流中读取对应类型的数据
    fn read_object(&mut self, value_type: u8, key: RedisKey) -> Result<Event> {
        match value_type {
            RDB_TYPE_STRING => {
                let value = self.reader.read_length_string()?;
                Ok(Event::String(StringObject { key, value }))
            }
            RDB_TYPE_LIST | RDB_TYPE_LIST_ZIPLIST | RDB_TYPE_LIST_QUICKLIST
            | RDB_TYPE_LIST_QUICKLIST_2 => {
                let elements = self.read_list(value_type)?;
                Ok(Event::List(ListObject { key, elements }))
            }
            RDB_TYPE_SET | RDB_TYPE_SET_INTSET | RDB_TYPE_SET_LISTPACK => {
                let members = self.read_set(value_type)?;
                Ok(Event::Set(SetObject { key, members }))
            }
            RDB_TYPE_ZSET | RDB_TYPE_ZSET_2 | RDB_TYPE_ZSET_ZIPLIST | RDB_TYPE_ZSET_LISTPACK => {
                let members = self.read_zset(value_type)?;
                Ok(Event::SortedSet(ZSetObject { key, members }))
            }
            RDB_TYPE_HASH | RDB_TYPE_HASH_ZIPLIST | RDB_TYPE_HASH_LISTPACK => {
                let fields = self.read_hash(value_type)?;
                Ok(Event::Hash(HashObject { key, fields }))
            }
            RDB_TYPE_STREAM_LISTPACKS | RDB_TYPE_STREAM_LISTPACKS_2 => {
                let stream = self.read_stream(key, value_type)?;
                Ok(Event::Stream(stream))
            }
            RDB_TYPE_MODULE | RDB_TYPE_MODULE_2 => Err(Error::UnsupportedFeature(format!(
                "module value type: {}",
                value_type
            ))),
            RDB_TYPE_HASH_ZIPMAP => {
                Err(Error::UnsupportedFeature("zipmap encoded hash".to_string()))
            }
            _ => Err(Error::UnsupportedFeature(format!(
                "rdb value type: {}",
                value_type
            ))),
        }
    }

    fn read_list(&mut self, value_type: u8) -> Result<Vec<String>> {
        match value_type {
            RDB_TYPE_LIST => {
                let count = self.reader.read_length_u64()?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(self.reader.read_length_string()?);
                }
                Ok(elements)
            }
            RDB_TYPE_LIST_ZIPLIST => encoding::parse_ziplist(&mut self.reader),
            RDB_TYPE_LIST_QUICKLIST => {
                let count = self.reader.read_length_u64()?;
                let mut elements = Vec::new();
                for _ in 0..count {
                    elements.append(&mut encoding::parse_ziplist(&mut self.reader)?);
                }
                Ok(elements)
            }
            RDB_TYPE_LIST_QUICKLIST_2 => {
                let count = self.reader.read_length_u64()?;
                let mut elements = Vec::new();
                for _ in 0..count {
                    match self.reader.read_length_u64()? {
                        QUICKLIST_NODE_PLAIN => elements.push(self.reader.read_length_string()?),
                        QUICKLIST_NODE_PACKED => {
                            elements.append(&mut encoding::parse_listpack(&mut self.reader)?);
                        }
                        container => {
                            return Err(Error::MalformedInput(format!(
                                "unknown quicklist container: {}",
                                container
                            )));
                        }
                    }
                }
                Ok(elements)
            }
            _ => Err(Error::UnsupportedFeature(format!(
                "list value type: {}",
                value_type
            ))),
        }
    }

    fn read_set(&mut self, value_type: u8) -> Result<Vec<String>> {
        match value_type {
            RDB_TYPE_SET => {
                let count = self.reader.read_length_u64()?;
                let mut members = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    members.push(self.reader.read_length_string()?);
                }
                Ok(members)
            }
            RDB_TYPE_SET_INTSET => encoding::parse_intset(&mut self.reader),
            RDB_TYPE_SET_LISTPACK => encoding::parse_listpack(&mut self.reader),
            _ => Err(Error::UnsupportedFeature(format!(
                "set value type: {}",
                value_type
            ))),
        }
    }

    fn read_zset(&mut self, value_type: u8) -> Result<Vec<ZSetEntry>> {
        match value_type {
            RDB_TYPE_ZSET | RDB_TYPE_ZSET_2 => {
                let count = self.reader.read_length_u64()?;
                let mut members = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let member = self.reader.read_length_string()?;
                    // v1的score是文本格式, v2是8字节IEEE-754
                    let score = if value_type == RDB_TYPE_ZSET_2 {
                        self.reader.read_f64_le()?
                    } else {
                        self.reader.read_double()?
                    };
                    members.push(ZSetEntry { member, score });
                }
                Ok(members)
            }
            RDB_TYPE_ZSET_ZIPLIST => {
                let flat = encoding::parse_ziplist(&mut self.reader)?;
                zset_from_pairs(flat)
            }
            RDB_TYPE_ZSET_LISTPACK => {
                let flat = encoding::parse_listpack(&mut self.reader)?;
                zset_from_pairs(flat)
            }
            _ => Err(Error::UnsupportedFeature(format!(
                "zset value type: {}",
                value_type
            ))),
        }
    }

    fn read_hash(&mut self, value_type: u8) -> Result<Vec<HashField>> {
        match value_type {
            RDB_TYPE_HASH => {
                let count = self.reader.read_length_u64()?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let field = self.reader.read_length_string()?;
                    let value = self.reader.read_length_string()?;
                    fields.push(HashField { field, value });
                }
                Ok(fields)
            }
            RDB_TYPE_HASH_ZIPLIST => {
                let flat = encoding::parse_ziplist(&mut self.reader)?;
                hash_from_pairs(flat)
            }
            RDB_TYPE_HASH_LISTPACK => {
                let flat = encoding::parse_listpack(&mut self.reader)?;
                hash_from_pairs(flat)
            }
            _ => Err(Error::UnsupportedFeature(format!(
                "hash value type: {}",
                value_type
            ))),
        }
    }

    // t_stream.c::streamAppendItem
    fn read_stream(&mut self, key: RedisKey, value_type: u8) -> Result<StreamObject> {
        let mut entries: Vec<StreamEntry> = Vec::new();

        let chunk_count = self.reader.read_length_u64()?;
        for _ in 0..chunk_count {
            // 每个listpack chunk以16字节的master id为键,
            // chunk内的entry id都是相对它的增量
            let node_key = self.reader.read_length_bytes()?;
            if node_key.len() != 16 {
                return Err(Error::MalformedInput(format!(
                    "stream node key expect 16 bytes but {}",
                    node_key.len()
                )));
            }
            let master_ms = BigEndian::read_u64(&node_key[..8]);
            let master_seq = BigEndian::read_u64(&node_key[8..]);

            let mut values = ListpackValues::new(encoding::parse_listpack(&mut self.reader)?);

            // master entry:
            // +-------+---------+------------+---------+--/--+---------+---------+-+
            // | count | deleted | num-fields | field_1 | field_2 | ... | field_N |0|
            // +-------+---------+------------+---------+--/--+---------+---------+-+
            let count = values.next_u64()?;
            let deleted = values.next_u64()?;
            let master_field_count = values.next_u64()?;
            let mut master_fields = Vec::with_capacity(master_field_count as usize);
            for _ in 0..master_field_count {
                master_fields.push(values.next()?.to_string());
            }
            if values.next()? != "0" {
                return Err(Error::MalformedInput(
                    "stream master entry must end with 0".to_string(),
                ));
            }

            // 每条entry:
            // +-----+--------+----------+-------+-------+-/-+-------+-------+--------+
            // |flags|entry-id|num-fields|field-1|value-1|...|field-N|value-N|lp-count|
            // +-----+--------+----------+-------+-------+-/-+-------+-------+--------+
            // 置SAMEFIELDS标记时字段名复用master entry的, 只记录值
            for _ in 0..count.saturating_add(deleted) {
                let flags = values.next_u64()?;
                let delta_ms = values.next_u64()?;
                let delta_seq = values.next_u64()?;
                let id = StreamId {
                    ms: master_ms.wrapping_add(delta_ms),
                    seq: master_seq.wrapping_add(delta_seq),
                };

                let mut fields = Vec::new();
                if flags & STREAM_ITEM_FLAG_SAMEFIELDS != 0 {
                    for field in &master_fields {
                        fields.push((field.clone(), values.next()?.to_string()));
                    }
                } else {
                    let field_count = values.next_u64()?;
                    for _ in 0..field_count {
                        let field = values.next()?.to_string();
                        let value = values.next()?.to_string();
                        fields.push((field, value));
                    }
                }
                // lp-count只在原地遍历时有用, 消费后丢弃
                values.next()?;

                if flags & STREAM_ITEM_FLAG_DELETED == 0 {
                    entries.push(StreamEntry { id, fields });
                }
            }
        }

        // 当前元素总数
        self.reader.read_length_u64()?;
        let last_id = StreamId {
            ms: self.reader.read_length_u64()?,
            seq: self.reader.read_length_u64()?,
        };

        let mut first_id = None;
        let mut max_deleted_id = None;
        let mut entries_added = None;
        if value_type == RDB_TYPE_STREAM_LISTPACKS_2 {
            first_id = Some(StreamId {
                ms: self.reader.read_length_u64()?,
                seq: self.reader.read_length_u64()?,
            });
            max_deleted_id = Some(StreamId {
                ms: self.reader.read_length_u64()?,
                seq: self.reader.read_length_u64()?,
            });
            entries_added = Some(self.reader.read_length_u64()?);
        }

        let mut groups = Vec::new();
        let group_count = self.reader.read_length_u64()?;
        for _ in 0..group_count {
            let name = self.reader.read_length_string()?;
            let group_last_id = StreamId {
                ms: self.reader.read_length_u64()?,
                seq: self.reader.read_length_u64()?,
            };
            if value_type == RDB_TYPE_STREAM_LISTPACKS_2 {
                // group offset
                self.reader.read_length_u64()?;
            }

            // global PEL先行加载, consumer的归属信息随后补上
            let mut pel: BTreeMap<StreamId, StreamNack> = BTreeMap::new();
            let nack_count = self.reader.read_length_u64()?;
            for _ in 0..nack_count {
                let id = StreamId {
                    ms: self.reader.read_u64_be()?,
                    seq: self.reader.read_u64_be()?,
                };
                let delivery_time_ms = self.reader.read_u64_le()?;
                let delivery_count = self.reader.read_length_u64()?;
                pel.insert(
                    id,
                    StreamNack {
                        id,
                        delivery_time_ms,
                        delivery_count,
                        consumer: None,
                    },
                );
            }

            let mut consumers = Vec::new();
            let consumer_count = self.reader.read_length_u64()?;
            for _ in 0..consumer_count {
                let consumer_name = self.reader.read_length_string()?;
                let seen_time_ms = self.reader.read_u64_le()?;

                let mut local_pel = Vec::new();
                let local_count = self.reader.read_length_u64()?;
                for _ in 0..local_count {
                    let id = StreamId {
                        ms: self.reader.read_u64_be()?,
                        seq: self.reader.read_u64_be()?,
                    };
                    let nack = pel.get_mut(&id).ok_or_else(|| {
                        Error::MalformedInput(format!(
                            "consumer pel id {} not found in group pel",
                            id
                        ))
                    })?;
                    nack.consumer = Some(consumer_name.clone());
                    local_pel.push(id);
                }
                consumers.push(StreamConsumer {
                    name: consumer_name,
                    seen_time_ms,
                    pel: local_pel,
                });
            }
            groups.push(StreamGroup {
                name,
                last_id: group_last_id,
                pel,
                consumers,
            });
        }

        Ok(StreamObject {
            key,
            entries,
            groups,
            last_id,
            first_id,
            max_deleted_id,
            entries_added,
        })
    }

    // 跳过无法解析的module数据, 按module opcode逐项丢弃
    fn skip_module_value(&mut self) -> Result<()> {
        loop {
            let opcode = self.reader.read_length_u64()?;
            match opcode {
                RDB_MODULE_OPCODE_EOF => return Ok(()),
                RDB_MODULE_OPCODE_SINT | RDB_MODULE_OPCODE_UINT => {
                    self.reader.read_length()?;
                }
                RDB_MODULE_OPCODE_FLOAT => {
                    self.reader.read_bytes(4)?;
                }
                RDB_MODULE_OPCODE_DOUBLE => {
                    self.reader.read_bytes(8)?;
                }
                RDB_MODULE_OPCODE_STRING => {
                    self.reader.read_length_bytes()?;
                }
                _ => {
                    return Err(Error::MalformedInput(format!(
                        "unknown module opcode: {}",
                        opcode
                    )));
                }
            }
        }
    }
}

fn zset_from_pairs(flat: Vec<String>) -> Result<Vec<ZSetEntry>> {
    if flat.len() % 2 != 0 {
        return Err(Error::MalformedInput(format!(
            "odd element count for zset encoding: {}",
            flat.len()
        )));
    }
    let mut members = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        let score = score
            .parse::<f64>()
            .map_err(|_| Error::MalformedInput(format!("invalid zset score: {}", score)))?;
        members.push(ZSetEntry { member, score });
    }
    Ok(members)
}

fn hash_from_pairs(flat: Vec<String>) -> Result<Vec<HashField>> {
    if flat.len() % 2 != 0 {
        return Err(Error::MalformedInput(format!(
            "odd element count for hash encoding: {}",
            flat.len()
        )));
    }
    let mut fields = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        fields.push(HashField { field, value });
    }
    Ok(fields)
}

// stream chunk的listpack元素按位置解释, 此结构维护读取进度
struct ListpackValues {
    items: Vec<String>,
    pos: usize,
}

impl ListpackValues {
    fn new(items: Vec<String>) -> ListpackValues {
        ListpackValues { items, pos: 0 }
    }

    fn next(&mut self) -> Result<&str> {
        let item = self
            .items
            .get(self.pos)
            .ok_or_else(|| Error::MalformedInput("stream listpack exhausted".to_string()))?;
        self.pos += 1;
        Ok(item)
    }

    fn next_u64(&mut self) -> Result<u64> {
        let item = self.next()?;
        item.parse::<u64>()
            .map_err(|_| Error::MalformedInput(format!("invalid stream integer: {}", item)))
    }
}

/// RDB事件流, 消费端逐个拉取事件, 直到流结束或出错
///
/// `next`只允许在`has_next`返回true之后调用
pub struct EventStream {
    receiver: Receiver<Result<Event>>,
    current: Option<Event>,
    err: Option<Error>,
}

impl EventStream {
    /// 等待下一个事件; 流结束或出现首个错误后返回false
    pub fn has_next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.receiver.recv() {
            Ok(Ok(event)) => {
                self.current = Some(event);
                true
            }
            Ok(Err(err)) => {
                self.err = Some(err);
                false
            }
            Err(_) => false,
        }
    }

    /// 取出当前事件
    pub fn next(&mut self) -> Event {
        self.current
            .take()
            .expect("has_next must return true before next")
    }

    /// 首个致命错误, 正常结束时为None
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }
}

/// Map object types to RDB object types.
///
pub(crate) const RDB_TYPE_STRING: u8 = 0;
pub(crate) const RDB_TYPE_LIST: u8 = 1;
pub(crate) const RDB_TYPE_SET: u8 = 2;
pub(crate) const RDB_TYPE_ZSET: u8 = 3;
pub(crate) const RDB_TYPE_HASH: u8 = 4;
/// ZSET version 2 with doubles stored in binary.
pub(crate) const RDB_TYPE_ZSET_2: u8 = 5;
pub(crate) const RDB_TYPE_MODULE: u8 = 6;
/// Module value with annotations for parsing without
/// the generating module being loaded.
pub(crate) const RDB_TYPE_MODULE_2: u8 = 7;

/// Object types for encoded objects.
///
pub(crate) const RDB_TYPE_HASH_ZIPMAP: u8 = 9;
pub(crate) const RDB_TYPE_LIST_ZIPLIST: u8 = 10;
pub(crate) const RDB_TYPE_SET_INTSET: u8 = 11;
pub(crate) const RDB_TYPE_ZSET_ZIPLIST: u8 = 12;
pub(crate) const RDB_TYPE_HASH_ZIPLIST: u8 = 13;
pub(crate) const RDB_TYPE_LIST_QUICKLIST: u8 = 14;
pub(crate) const RDB_TYPE_STREAM_LISTPACKS: u8 = 15;
pub(crate) const RDB_TYPE_HASH_LISTPACK: u8 = 16;
pub(crate) const RDB_TYPE_ZSET_LISTPACK: u8 = 17;
pub(crate) const RDB_TYPE_LIST_QUICKLIST_2: u8 = 18;
pub(crate) const RDB_TYPE_STREAM_LISTPACKS_2: u8 = 19;
pub(crate) const RDB_TYPE_SET_LISTPACK: u8 = 20;

/// Special RDB opcodes
///
// Pre-GA function format.
pub(crate) const RDB_OPCODE_FUNCTION2: u8 = 245;
pub(crate) const RDB_OPCODE_FUNCTION: u8 = 246;
// Module auxiliary data.
pub(crate) const RDB_OPCODE_MODULE_AUX: u8 = 247;
// LRU idle time.
pub(crate) const RDB_OPCODE_IDLE: u8 = 248;
// LFU frequency.
pub(crate) const RDB_OPCODE_FREQ: u8 = 249;
// RDB aux field.
pub(crate) const RDB_OPCODE_AUX: u8 = 250;
// Hash table resize hint.
pub(crate) const RDB_OPCODE_RESIZEDB: u8 = 251;
// Expire time in milliseconds.
pub(crate) const RDB_OPCODE_EXPIRETIME_MS: u8 = 252;
// Old expire time in seconds.
pub(crate) const RDB_OPCODE_EXPIRETIME: u8 = 253;
// DB number of the following keys.
pub(crate) const RDB_OPCODE_SELECTDB: u8 = 254;
// End of the RDB file.
pub(crate) const RDB_OPCODE_EOF: u8 = 255;

pub(crate) const RDB_MODULE_OPCODE_EOF: u64 = 0;
pub(crate) const RDB_MODULE_OPCODE_SINT: u64 = 1;
pub(crate) const RDB_MODULE_OPCODE_UINT: u64 = 2;
pub(crate) const RDB_MODULE_OPCODE_FLOAT: u64 = 3;
pub(crate) const RDB_MODULE_OPCODE_DOUBLE: u64 = 4;
pub(crate) const RDB_MODULE_OPCODE_STRING: u64 = 5;

// quicklist v2的节点容器类型
pub(crate) const QUICKLIST_NODE_PLAIN: u64 = 1;
pub(crate) const QUICKLIST_NODE_PACKED: u64 = 2;

// stream entry的标记位
pub(crate) const STREAM_ITEM_FLAG_DELETED: u64 = 1;
pub(crate) const STREAM_ITEM_FLAG_SAMEFIELDS: u64 = 2;
