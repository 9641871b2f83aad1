//! 포지션 변화량 → 주문 계산 공통 로직.
//!
//! 시그널 처리와 포지션 동기화에서 공유하는 순수 함수들입니다.
//! 포지션 크기는 부호가 있습니다 (양수 = 롱, 음수 = 숏, 0 = 무포지션).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::order::{PositionSide, Side};
use crate::error::{BrokerError, BrokerResult};
use crate::types::Quantity;

/// 이전 포지션 크기 불일치 경고 허용 오차.
pub const POSITION_DRIFT_TOLERANCE: Decimal = dec!(0.0001);

/// 허용 레버리지 범위.
pub const MIN_LEVERAGE: u32 = 1;
pub const MAX_LEVERAGE: u32 = 125;

/// 목표 포지션에 도달하기 위한 주문 수량과 방향을 계산합니다.
///
/// 수량은 항상 양수이며 부호 정보는 `Side`가 담습니다.
/// 변화량이 0이면 [`BrokerError::NoPositionChange`]를 반환하며,
/// 호출자는 이를 의도된 무동작으로 처리해야 합니다.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use trader_core::{calculate_order_quantity, Side};
///
/// let (qty, side) = calculate_order_quantity(dec!(0.5), dec!(-0.25)).unwrap();
/// assert_eq!(qty, dec!(0.75));
/// assert_eq!(side, Side::Sell);
/// ```
pub fn calculate_order_quantity(previous: Quantity, target: Quantity) -> BrokerResult<(Quantity, Side)> {
    let delta = target.checked_sub(previous).ok_or_else(|| {
        BrokerError::InvalidQuantity(format!("포지션 변화량 범위 초과: {} → {}", previous, target))
    })?;

    if delta.is_zero() {
        return Err(BrokerError::NoPositionChange);
    }

    if delta > Decimal::ZERO {
        Ok((delta, Side::Buy))
    } else {
        Ok((-delta, Side::Sell))
    }
}

/// 목표 포지션 크기로부터 헤지 모드 포지션 방향을 결정합니다.
pub fn derive_position_side(target: Quantity) -> PositionSide {
    if target > Decimal::ZERO {
        PositionSide::Long
    } else if target < Decimal::ZERO {
        PositionSide::Short
    } else {
        PositionSide::Both
    }
}

/// 이전 방향의 포지션 규모가 줄어드는 주문인지 판정합니다.
///
/// 0을 가로질러 방향이 뒤집히는 경우(+5 → -3)에도 `true`가 됩니다.
/// 거래소는 방향을 뒤집는 reduce-only 주문을 거부하거나 잘라낼 수 있습니다.
pub fn is_reduce_only(previous: Quantity, target: Quantity) -> bool {
    (previous > Decimal::ZERO && target < previous) || (previous < Decimal::ZERO && target > previous)
}

/// 시그널의 이전 크기와 실제 포지션 크기의 차이를 반환합니다.
///
/// 차이가 `tolerance` 이하이면 `None`.
pub fn position_drift(previous: Quantity, actual: Quantity, tolerance: Decimal) -> Option<Decimal> {
    let drift = (actual - previous).abs();
    (drift > tolerance).then_some(drift)
}

/// 레버리지가 허용 범위(1..=125) 안에 있는지 확인합니다.
pub fn is_valid_leverage(leverage: u32) -> bool {
    (MIN_LEVERAGE..=MAX_LEVERAGE).contains(&leverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_open_long() {
        let (qty, side) = calculate_order_quantity(dec!(0), dec!(0.001)).unwrap();
        assert_eq!(qty, dec!(0.001));
        assert_eq!(side, Side::Buy);
        assert_eq!(derive_position_side(dec!(0.001)), PositionSide::Long);
        assert!(!is_reduce_only(dec!(0), dec!(0.001)));
    }

    #[test]
    fn test_close_long() {
        let (qty, side) = calculate_order_quantity(dec!(0.001), dec!(0)).unwrap();
        assert_eq!(qty, dec!(0.001));
        assert_eq!(side, Side::Sell);
        assert_eq!(derive_position_side(dec!(0)), PositionSide::Both);
        assert!(is_reduce_only(dec!(0.001), dec!(0)));
    }

    #[test]
    fn test_no_change() {
        assert!(matches!(
            calculate_order_quantity(dec!(0.001), dec!(0.001)),
            Err(BrokerError::NoPositionChange)
        ));
    }

    #[test]
    fn test_delta_overflow_is_invalid_quantity() {
        let err = calculate_order_quantity(-Decimal::MAX, Decimal::MAX).unwrap_err();
        assert!(err.is(ErrorKind::InvalidQuantity));

        let err = calculate_order_quantity(Decimal::MAX, Decimal::MIN).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidQuantity(_)));

        // 극단값이라도 차이가 표현 가능하면 정상 처리
        let (qty, side) = calculate_order_quantity(Decimal::MAX, Decimal::ZERO).unwrap();
        assert_eq!(qty, Decimal::MAX);
        assert_eq!(side, Side::Sell);
    }

    #[test]
    fn test_reduce_only_short_side() {
        assert!(is_reduce_only(dec!(-2), dec!(-1)));
        assert!(!is_reduce_only(dec!(-2), dec!(-3)));
        assert!(!is_reduce_only(dec!(2), dec!(3)));
        assert_eq!(derive_position_side(dec!(-1)), PositionSide::Short);
    }

    #[test]
    fn test_reduce_only_flip_through_zero_is_marked() {
        // +5 → -3: 방향이 뒤집히지만 현재 규칙상 reduce-only로 표시된다
        assert!(is_reduce_only(dec!(5), dec!(-3)));
        assert!(is_reduce_only(dec!(-5), dec!(3)));

        let (qty, side) = calculate_order_quantity(dec!(5), dec!(-3)).unwrap();
        assert_eq!(qty, dec!(8));
        assert_eq!(side, Side::Sell);
    }

    #[test]
    fn test_leverage_bounds() {
        assert!(is_valid_leverage(1));
        assert!(is_valid_leverage(125));
        assert!(!is_valid_leverage(0));
        assert!(!is_valid_leverage(126));
    }

    #[test]
    fn test_position_drift() {
        assert_eq!(position_drift(dec!(1), dec!(1.00005), POSITION_DRIFT_TOLERANCE), None);
        assert_eq!(
            position_drift(dec!(1), dec!(0.5), POSITION_DRIFT_TOLERANCE),
            Some(dec!(0.5))
        );
    }

    fn size() -> impl Strategy<Value = Decimal> {
        (-1_000_000_000i64..1_000_000_000i64).prop_map(|n| Decimal::new(n, 6))
    }

    proptest! {
        #[test]
        fn prop_quantity_is_abs_delta(previous in size(), target in size()) {
            prop_assume!(previous != target);
            let (qty, side) = calculate_order_quantity(previous, target).unwrap();
            prop_assert_eq!(qty, (target - previous).abs());
            prop_assert!(qty > Decimal::ZERO);
            prop_assert_eq!(side == Side::Buy, target > previous);
        }

        #[test]
        fn prop_equal_sizes_report_no_change(size in size()) {
            prop_assert!(matches!(
                calculate_order_quantity(size, size),
                Err(BrokerError::NoPositionChange)
            ));
        }

        #[test]
        fn prop_position_side_follows_target_sign(target in size()) {
            let expected = if target > Decimal::ZERO {
                PositionSide::Long
            } else if target < Decimal::ZERO {
                PositionSide::Short
            } else {
                PositionSide::Both
            };
            prop_assert_eq!(derive_position_side(target), expected);
        }

        #[test]
        fn prop_reduce_only_formula(previous in size(), target in size()) {
            let expected = (previous > Decimal::ZERO && target < previous)
                || (previous < Decimal::ZERO && target > previous);
            prop_assert_eq!(is_reduce_only(previous, target), expected);
        }
    }
}
