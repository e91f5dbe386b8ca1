/// One row of the static currency table.
pub struct CurrencyOption {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
}

pub const CURRENCIES: &[CurrencyOption] = &[
    CurrencyOption { code: "USD", symbol: "$", name: "US Dollar" },
    CurrencyOption { code: "EUR", symbol: "€", name: "Euro" },
    CurrencyOption { code: "GBP", symbol: "£", name: "British Pound" },
    CurrencyOption { code: "JPY", symbol: "¥", name: "Japanese Yen" },
    CurrencyOption { code: "AUD", symbol: "A$", name: "Australian Dollar" },
    CurrencyOption { code: "CAD", symbol: "C$", name: "Canadian Dollar" },
    CurrencyOption { code: "CHF", symbol: "CHF", name: "Swiss Franc" },
    CurrencyOption { code: "CNY", symbol: "¥", name: "Chinese Yuan" },
    CurrencyOption { code: "INR", symbol: "₹", name: "Indian Rupee" },
    CurrencyOption { code: "SGD", symbol: "S$", name: "Singapore Dollar" },
    CurrencyOption { code: "BRL", symbol: "R$", name: "Brazilian Real" },
    CurrencyOption { code: "MXN", symbol: "MX$", name: "Mexican Peso" },
];

/// Display symbol for a currency code. Unknown codes are used verbatim,
/// so this never fails.
pub fn currency_symbol(code: &str) -> &str {
    CURRENCIES
        .iter()
        .find(|c| c.code == code)
        .map(|c| c.symbol)
        .unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve_to_symbols() {
        assert_eq!(currency_symbol("USD"), "$");
        assert_eq!(currency_symbol("EUR"), "€");
        assert_eq!(currency_symbol("GBP"), "£");
    }

    #[test]
    fn unknown_code_falls_back_to_itself() {
        assert_eq!(currency_symbol("ZZZ"), "ZZZ");
        assert_eq!(currency_symbol(""), "");
    }

    #[test]
    fn codes_are_unique() {
        for (i, a) in CURRENCIES.iter().enumerate() {
            for b in &CURRENCIES[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }
}
