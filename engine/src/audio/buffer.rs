//! 音频缓冲区模块
//!
//! 提供两种用于实时音频的缓冲区：
//!
//! - [`AudioRingBuffer`]：无锁 SPSC 环形缓冲区，用于设备回调线程向采集线程交付样本
//! - [`FrameFifo`]：带独立互斥锁的有界 FIFO，溢出时丢弃最旧样本，
//!   读取不足时补零，用于在不同时钟的回调之间传递音频块
//!
//! # 使用示例
//!
//! ```
//! use warpboard_lib::audio::buffer::FrameFifo;
//!
//! // 容量为 2 帧，每帧 4 个样本
//! let fifo = FrameFifo::new(8);
//! fifo.push_overwrite(&[0.5; 4]);
//!
//! let mut out = [1.0f32; 6];
//! let read = fifo.pop_padded(&mut out);
//! assert_eq!(read, 4);
//! assert_eq!(out, [0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);
//! ```

use parking_lot::Mutex;
use ringbuf::{
    HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};

/// 音频环形缓冲区
///
/// 封装 ringbuf 库的无锁环形缓冲区，提供音频专用的 API
pub struct AudioRingBuffer;

/// 音频缓冲区生产者
///
/// 用于向环形缓冲区写入音频数据
pub struct AudioBufferProducer {
    producer: ringbuf::HeapProd<f32>,
}

/// 音频缓冲区消费者
///
/// 用于从环形缓冲区读取音频数据
pub struct AudioBufferConsumer {
    consumer: ringbuf::HeapCons<f32>,
}

impl AudioRingBuffer {
    /// 创建新的音频环形缓冲区
    ///
    /// # Arguments
    ///
    /// * `capacity` - 缓冲区容量（样本数）
    ///
    /// # Returns
    ///
    /// 返回 (生产者, 消费者) 元组
    pub fn new(capacity: usize) -> (AudioBufferProducer, AudioBufferConsumer) {
        let rb = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = rb.split();

        (
            AudioBufferProducer { producer },
            AudioBufferConsumer { consumer },
        )
    }
}

impl AudioBufferProducer {
    /// 批量写入样本
    ///
    /// # Returns
    ///
    /// 返回实际写入的样本数，缓冲区满时多余的样本被丢弃
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// 获取可用写入空间
    pub fn available_space(&self) -> usize {
        self.producer.vacant_len()
    }

    /// 获取缓冲区容量
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }
}

impl AudioBufferConsumer {
    /// 批量读取样本到切片
    ///
    /// # Returns
    ///
    /// 返回实际读取的样本数
    pub fn pop_slice(&mut self, output: &mut [f32]) -> usize {
        self.consumer.pop_slice(output)
    }

    /// 获取可读取的样本数
    pub fn available_samples(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        let _ = self.consumer.clear();
    }
}

/// 有界音频 FIFO
///
/// 生产者和消费者可以位于任意线程，内部由一把只保护本缓冲区的锁串行化。
/// 写满时覆盖最旧的样本（陈旧的音频比丢一帧更糟），读取从不阻塞等待数据。
pub struct FrameFifo {
    ring: Mutex<HeapRb<f32>>,
}

impl FrameFifo {
    /// 创建容量为 `capacity` 个样本的 FIFO
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(HeapRb::new(capacity.max(1))),
        }
    }

    /// 按帧数创建：`frames` 个块，每块 `frame_size` 帧 × `channels` 声道
    pub fn with_frames(frames: usize, frame_size: usize, channels: u16) -> Self {
        Self::new(frames * frame_size * channels as usize)
    }

    /// 写入样本，空间不足时丢弃最旧的样本
    ///
    /// # Returns
    ///
    /// 返回被覆盖丢弃的样本数
    pub fn push_overwrite(&self, samples: &[f32]) -> usize {
        let mut ring = self.ring.lock();
        let capacity = ring.capacity().get();
        let incoming = samples.len().min(capacity);
        let tail = &samples[samples.len() - incoming..];

        let overflow = (ring.occupied_len() + incoming).saturating_sub(capacity);
        if overflow > 0 {
            ring.skip(overflow);
        }
        ring.push_slice(tail);

        overflow + (samples.len() - incoming)
    }

    /// 读取样本填满 `out`，不足部分补零
    ///
    /// # Returns
    ///
    /// 返回真实读取的样本数
    pub fn pop_padded(&self, out: &mut [f32]) -> usize {
        let read = self.ring.lock().pop_slice(out);
        out[read..].fill(0.0);
        read
    }

    /// 当前缓冲的样本数
    pub fn len(&self) -> usize {
        self.ring.lock().occupied_len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 容量（样本数）
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity().get()
    }

    /// 清空缓冲区
    pub fn clear(&self) {
        let _ = self.ring.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_slice_operations() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(1024);

        let input: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
        assert_eq!(producer.push_slice(&input), 100);
        assert_eq!(consumer.available_samples(), 100);

        let mut output = vec![0.0f32; 50];
        assert_eq!(consumer.pop_slice(&mut output), 50);
        for (i, sample) in output.iter().enumerate() {
            assert!((sample - i as f32 * 0.01).abs() < 0.0001);
        }

        consumer.clear();
        assert_eq!(consumer.available_samples(), 0);
        assert_eq!(producer.available_space(), producer.capacity());
    }

    #[test]
    fn test_ring_buffer_rejects_when_full() {
        let (mut producer, _consumer) = AudioRingBuffer::new(10);
        assert_eq!(producer.push_slice(&[1.0; 15]), 10);
        assert_eq!(producer.available_space(), 0);
    }

    #[test]
    fn test_fifo_pads_with_silence() {
        let fifo = FrameFifo::new(16);
        fifo.push_overwrite(&[0.25, 0.5]);

        let mut out = [9.0f32; 4];
        assert_eq!(fifo.pop_padded(&mut out), 2);
        assert_eq!(out, [0.25, 0.5, 0.0, 0.0]);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_drops_oldest_on_overflow() {
        let fifo = FrameFifo::new(4);
        assert_eq!(fifo.push_overwrite(&[1.0, 2.0, 3.0]), 0);
        assert_eq!(fifo.push_overwrite(&[4.0, 5.0]), 1);

        let mut out = [0.0f32; 4];
        fifo.pop_padded(&mut out);
        assert_eq!(out, [2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fifo_oversized_write_keeps_tail() {
        let fifo = FrameFifo::new(3);
        assert_eq!(fifo.push_overwrite(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2);

        let mut out = [0.0f32; 3];
        fifo.pop_padded(&mut out);
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fifo_with_frames_capacity() {
        let fifo = FrameFifo::with_frames(10, 1024, 2);
        assert_eq!(fifo.capacity(), 20480);
        fifo.push_overwrite(&[0.1; 64]);
        fifo.clear();
        assert_eq!(fifo.len(), 0);
    }
}
