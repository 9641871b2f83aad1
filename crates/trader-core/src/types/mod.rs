//! 브로커 계층 전반에서 사용되는 공통 타입과 유틸리티.

mod decimal;
mod symbol;

pub use decimal::*;
pub use symbol::*;
