//! 브로커 계약의 도메인 모델.

mod account;
mod calculations;
mod credentials;
mod health;
mod market;
mod order;
mod position;
mod signal;

pub use account::*;
pub use calculations::*;
pub use credentials::*;
pub use health::*;
pub use market::*;
pub use order::*;
pub use position::*;
pub use signal::*;
