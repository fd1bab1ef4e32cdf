//! 请求与响应 DTO

mod request;
mod response;

pub use request::{CredentialsRequest, WithdrawRequest};
pub use response::{ApiResponse, BalanceDto, OrderDto, TokenResponse, WithdrawalDto};
