//! 거래소별 심볼 표기 변환.

/// 심볼을 거래소 중립 형식으로 정규화합니다 (대문자, 구분자 제거).
///
/// `btc-usdt`, `BTC_USDT`, `BTC/USDT` 모두 `BTCUSDT`가 됩니다.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '/'))
        .collect::<String>()
        .to_uppercase()
}

/// 심볼을 거래소가 요구하는 형식으로 변환합니다.
///
/// OKX는 `BASE-QUOTE` 형식을 쓰고, 그 외 거래소는 대문자 연결 형식을 씁니다.
pub fn format_symbol(symbol: &str, exchange: &str) -> String {
    let symbol = symbol.trim().to_uppercase();

    match exchange.to_lowercase().as_str() {
        "okx" => {
            if symbol.contains('-') {
                return symbol;
            }
            match symbol.strip_suffix("USDT") {
                Some(base) if !base.is_empty() => format!("{}-USDT", base),
                _ => symbol,
            }
        }
        _ => symbol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("btc-usdt"), "BTCUSDT");
        assert_eq!(normalize_symbol("BTC_USDT"), "BTCUSDT");
        assert_eq!(normalize_symbol("eth/usdt"), "ETHUSDT");
    }

    #[test]
    fn test_format_symbol() {
        assert_eq!(format_symbol("btcusdt", "binance"), "BTCUSDT");
        assert_eq!(format_symbol("BTCUSDT", "okx"), "BTC-USDT");
        assert_eq!(format_symbol("BTC-USDT", "OKX"), "BTC-USDT");
        assert_eq!(format_symbol("USDT", "okx"), "USDT");
    }
}
