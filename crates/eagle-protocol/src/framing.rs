//! 字节流 → 行重组
//!
//! 串口读取是任意分块的字节流，协议唯一的帧边界是 `\n`。
//! `LineReassembler` 保留跨调用的未完成行，每次 `feed` 只输出已完整的行。
//!
//! 行内的 `\r` 原样保留（解析器把它当作尾随空白处理）。
//! 以字节为单位缓存，因此多字节 UTF-8 字符被拆分到两个分块时也能正确拼接。

use crate::constants::LINE_DELIMITER;

/// 行重组器
///
/// # 示例
///
/// ```
/// use eagle_protocol::LineReassembler;
///
/// let mut reassembler = LineReassembler::new();
/// assert!(reassembler.feed(b"]f 1 2").is_empty());
/// assert_eq!(reassembler.feed(b" 3\r\n]sle"), vec!["]f 1 2 3\r".to_string()]);
/// assert_eq!(reassembler.pending(), b"]sle");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LineReassembler {
    /// 未完成行（最后一个 `\n` 之后的内容）
    pending: Vec<u8>,
    /// 单行长度上限（`None` 表示不限制）
    max_pending: Option<usize>,
    /// 当前行已超限，丢弃到下一个 `\n` 为止
    discarding: bool,
    /// 因超限被丢弃的行数
    overflows: u64,
}

impl LineReassembler {
    /// 创建不限长度的重组器（空缓冲区）
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带单行长度上限的重组器
    ///
    /// 一行（不含 `\n`）超过 `max_pending` 字节时整行丢弃并计入
    /// [`overflows`](Self::overflows)。无论数据如何分块，丢弃结果都相同。
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            max_pending: Some(max_pending),
            ..Self::default()
        }
    }

    /// 输入一个分块，返回其中已完整的行（按到达顺序）
    ///
    /// 空分块是无操作，返回空列表。
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == LINE_DELIMITER) {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if self.exceeds_limit(head.len()) {
                self.pending.clear();
                self.overflows += 1;
                continue;
            }

            self.pending.extend_from_slice(head);
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
        }

        if !self.discarding {
            if self.exceeds_limit(rest.len()) {
                self.pending.clear();
                self.discarding = true;
                self.overflows += 1;
            } else {
                self.pending.extend_from_slice(rest);
            }
        }

        lines
    }

    /// 当前未完成行的内容
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// 因超限被丢弃的行数
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// 清空未完成行（读错误后已缓冲的半行不再可信）
    pub fn reset(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }

    fn exceeds_limit(&self, extra: usize) -> bool {
        self.max_pending
            .is_some_and(|limit| self.pending.len() + extra > limit)
    }
}
