//! 传输层
//!
//! 与控制器之间是两条单向 UDP 流：控制器向 `receive_port` 推送遥测，
//! 桥接端向 `peer_ip:send_port` 发送指令。上层只依赖 [`RxTransport`] /
//! [`TxTransport`]，测试中可以替换为内存实现。

use crate::config::UdpConfig;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// 传输层错误
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// 读取超时（无数据时属正常现象）
    #[error("Read timeout")]
    Timeout,

    /// 对端或本地通道已关闭
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// 将读超时类 IO 错误归一为 [`TransportError::Timeout`]
    fn from_recv(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(e),
        }
    }
}

/// 入站数据报
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// 接收序号（每个传输实例从 0 开始单调递增）
    pub seq: u64,
    /// 接收时刻
    pub received_at: Instant,
    /// 发送方地址（内存传输中为 `None`）
    pub source: Option<SocketAddr>,
    /// 原始负载
    pub data: Vec<u8>,
}

impl Datagram {
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self {
            seq,
            received_at: Instant::now(),
            source: None,
            data,
        }
    }
}

/// 接收端
pub trait RxTransport {
    /// 阻塞接收一个数据报，超时返回 [`TransportError::Timeout`]
    fn receive(&mut self) -> Result<Datagram, TransportError>;
}

/// 发送端
pub trait TxTransport {
    /// 发送一个完整数据报（不重试）
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// 可拆分为独立收发两端的传输
pub trait SplittableTransport {
    type Rx: RxTransport + Send + 'static;
    type Tx: TxTransport + Send + 'static;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

/// UDP 传输
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    buffer: Vec<u8>,
    next_seq: u64,
}

impl UdpTransport {
    /// 绑定 `bind_ip:receive_port`，指令发往 `peer_ip:send_port`
    pub fn bind(config: &UdpConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.bind_addr())?;
        let transport = Self::from_socket(socket, config.peer_addr(), config.receive_buffer_size);
        transport.set_receive_timeout(Duration::from_millis(config.receive_timeout_ms))?;
        debug!(
            "UDP transport bound to {:?}, sending to {}",
            transport.socket.local_addr().ok(),
            transport.peer
        );
        Ok(transport)
    }

    /// 使用已绑定的套接字
    pub fn from_socket(socket: UdpSocket, peer: SocketAddr, buffer_size: usize) -> Self {
        Self {
            socket,
            peer,
            buffer: vec![0u8; buffer_size],
            next_seq: 0,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// 设置读超时（0 表示阻塞，`std` 不接受零时长）
    pub fn set_receive_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }
}

impl RxTransport for UdpTransport {
    fn receive(&mut self) -> Result<Datagram, TransportError> {
        let (len, source) = self
            .socket
            .recv_from(&mut self.buffer)
            .map_err(TransportError::from_recv)?;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        trace!("Received {} bytes from {} (seq {})", len, source, seq);
        Ok(Datagram {
            seq,
            received_at: Instant::now(),
            source: Some(source),
            data: self.buffer[..len].to_vec(),
        })
    }
}

impl TxTransport for UdpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send_to(payload, self.peer)?;
        check_sent(sent, payload.len())
    }
}

/// 数据报必须整帧发出，部分发送视为 IO 错误
fn check_sent(sent: usize, expected: usize) -> Result<(), TransportError> {
    if sent != expected {
        return Err(TransportError::Io(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short send: {} of {} bytes", sent, expected),
        )));
    }
    Ok(())
}

impl SplittableTransport for UdpTransport {
    type Rx = UdpTransport;
    type Tx = UdpTxTransport;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError> {
        let tx = UdpTxTransport {
            socket: self.socket.try_clone()?,
            peer: self.peer,
        };
        Ok((self, tx))
    }
}

/// 拆分出的 UDP 发送端（与接收端共享底层套接字）
#[derive(Debug)]
pub struct UdpTxTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl TxTransport for UdpTxTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send_to(payload, self.peer)?;
        check_sent(sent, payload.len())
    }
}
