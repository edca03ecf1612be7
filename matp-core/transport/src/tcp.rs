//! TCP 传输实现
//!
//! 长度前缀格式的 JSON 信封帧：4 字节大端序长度 + JSON 数据。

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info};

use matp_protocol::Envelope;

use crate::channel::RemoteTransport;
use crate::{Result, TransportError};

/// 单个信封帧的大小上限（屏幕条目文本等列表值可能较大）
const MAX_FRAME_SIZE: u32 = 10 * 1024 * 1024;

/// TCP 传输实现
pub struct TcpTransport {
    stream: Option<TcpStream>,
    endpoint: Option<String>,
}

impl TcpTransport {
    /// 创建新的 TCP 传输
    pub fn new() -> Self {
        Self {
            stream: None,
            endpoint: None,
        }
    }

    /// 连接到远端运行时
    pub async fn connect(&mut self, endpoint: &str) -> Result<()> {
        info!("连接到远端运行时: {}", endpoint);

        let stream = TcpStream::connect(endpoint).await.map_err(|e| {
            error!("连接失败: {}", e);
            TransportError::ConnectionFailed(format!("{endpoint}: {e}"))
        })?;

        self.stream = Some(stream);
        self.endpoint = Some(endpoint.to_string());

        info!("已连接到远端运行时: {}", endpoint);
        Ok(())
    }

    /// 断开连接
    pub fn disconnect(&mut self) {
        if let Some(endpoint) = &self.endpoint {
            info!("断开远端连接: {}", endpoint);
        }
        self.stream = None;
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Disconnected("未连接到远端".to_string()))
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for TcpTransport {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        let json = envelope.encode()?;
        let stream = self.stream_mut()?;

        // 发送长度（4字节，大端序）
        let len = json.len() as u32;
        stream.write_u32(len).await.map_err(|e| {
            error!("发送帧长度失败: {}", e);
            TransportError::Disconnected(e.to_string())
        })?;

        // 发送 JSON 数据
        stream.write_all(json.as_bytes()).await.map_err(|e| {
            error!("发送帧内容失败: {}", e);
            TransportError::Disconnected(e.to_string())
        })?;

        stream.flush().await.map_err(|e| {
            error!("刷新输出缓冲失败: {}", e);
            TransportError::Disconnected(e.to_string())
        })?;

        debug!("发送了 {} 字节信封帧", len);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Envelope> {
        let stream = self.stream_mut()?;

        // 读取长度（4字节，大端序）
        let len = stream.read_u32().await.map_err(|e| {
            error!("读取帧长度失败: {}", e);
            TransportError::Disconnected(e.to_string())
        })?;

        if len > MAX_FRAME_SIZE {
            return Err(TransportError::Disconnected(format!(
                "信封帧过大: {} bytes (最大: {} bytes)",
                len, MAX_FRAME_SIZE
            )));
        }

        // 读取完整帧，半个帧整体丢弃，绝不部分交付
        let mut buffer = vec![0u8; len as usize];
        stream.read_exact(&mut buffer).await.map_err(|e| {
            error!("读取帧内容失败: {}", e);
            TransportError::Disconnected(e.to_string())
        })?;

        let json = String::from_utf8(buffer)
            .map_err(|e| TransportError::Disconnected(format!("UTF-8 解码失败: {e}")))?;

        debug!("接收了 {} 字节信封帧", len);
        Ok(Envelope::decode(&json)?)
    }
}
