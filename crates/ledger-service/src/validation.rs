//! 订单号与金额校验
//!
//! 订单号必须是通过 Luhn（模 10）校验的正整数；金额在边界处换算为整数分，
//! 内部运算一律使用 i64。

use std::fmt;
use std::str::FromStr;

/// 校验错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 非纯数字或超出 i64 范围、非正数
    #[error("订单号格式错误: {0}")]
    Malformed(String),
    /// 校验位不正确
    #[error("订单号校验位错误: {0}")]
    BadChecksum(String),
    #[error("无效的金额: {0}")]
    InvalidAmount(String),
}

/// 通过校验的订单号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderNumber(i64);

impl OrderNumber {
    /// 解析并校验订单号，允许首尾空白
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits = raw.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::Malformed(digits.to_string()));
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| ValidationError::Malformed(digits.to_string()))?;
        if value <= 0 {
            return Err(ValidationError::Malformed(digits.to_string()));
        }

        if !luhn_valid(digits) {
            return Err(ValidationError::BadChecksum(digits.to_string()));
        }

        Ok(Self(value))
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl FromStr for OrderNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OrderNumber> for i64 {
    fn from(order: OrderNumber) -> Self {
        order.0
    }
}

/// Luhn 校验，输入必须为纯数字串
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    luhn_sum(digits) % 10 == 0
}

/// 从右向左累加，偶数位（自右数第 2、4…位）加倍
fn luhn_sum(digits: &str) -> u32 {
    digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum()
}

/// 十进制金额换算为整数分（四舍五入）
pub fn to_minor_units(value: f64) -> Result<i64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidAmount(value.to_string()));
    }

    let scaled = (value * 100.0).round();
    if scaled >= i64::MAX as f64 {
        return Err(ValidationError::InvalidAmount(value.to_string()));
    }

    Ok(scaled as i64)
}

/// 整数分换算为十进制金额
pub fn from_minor_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}
