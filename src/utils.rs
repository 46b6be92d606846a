// 该文件是 Qingfeng （清风） 项目的一部分。
// src/utils.rs - 通用工具
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

const ANSI_BLUE: &str = "\x1b[94m";
const ANSI_YELLOW: &str = "\x1b[93m";
const ANSI_RED: &str = "\x1b[91m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";

/// 控制台消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Info,
  Warning,
  Error,
}

/// 生成带颜色的控制台消息，格式为 `<前缀><粗体><颜色>header: <重置>body`
pub fn format_message(severity: Severity, header: &str, body: &str) -> String {
  let (prefix, color) = match severity {
    Severity::Info => ("", ANSI_BLUE),
    Severity::Warning => ("⚠️ ", ANSI_YELLOW),
    Severity::Error => ("❌ ", ANSI_RED),
  };
  format!("{prefix}{ANSI_BOLD}{color}{header}: {ANSI_RESET}{body}")
}

/// 所有元素的乘积，空序列返回 1，溢出时返回 `None`
pub fn checked_product<I>(items: I) -> Option<usize>
where
  I: IntoIterator<Item = usize>,
{
  items.into_iter().try_fold(1usize, |acc, x| acc.checked_mul(x))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn product_of_shape() {
    assert_eq!(checked_product([1, 25200, 85]), Some(2_142_000));
    assert_eq!(checked_product(Vec::new()), Some(1));
    assert_eq!(checked_product([4, 0, 7]), Some(0));
  }

  #[test]
  fn product_overflow_is_none() {
    assert_eq!(checked_product([usize::MAX, 2]), None);
    assert_eq!(checked_product([1 << 62, 8]), None);
    // 溢出前出现 0 时乘积仍为 0
    assert_eq!(checked_product([0, usize::MAX, 2]), Some(0));
  }

  #[test]
  fn format_message_carries_header_and_body() {
    let msg = format_message(Severity::Error, "Inference Error", "boom");
    assert!(msg.starts_with("❌ "));
    assert!(msg.contains("Inference Error: "));
    assert!(msg.ends_with("boom"));

    let info = format_message(Severity::Info, "Frames", "12");
    assert!(info.starts_with(ANSI_BOLD));
    assert!(info.contains(ANSI_BLUE));
  }
}
