//! Exchange suffix handling for A-share codes

/// Exchange a six-digit code trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    pub fn suffix(&self) -> &'static str {
        match self {
            Exchange::Shanghai => "SH",
            Exchange::Shenzhen => "SZ",
            Exchange::Beijing => "BJ",
        }
    }

    /// Classify a bare code by its leading digits
    pub fn from_code(code: &str) -> Option<Self> {
        const SHENZHEN: [&str; 6] = ["00", "30", "15", "16", "18", "12"];
        const SHANGHAI: [&str; 4] = ["60", "68", "11", "13"];
        const BEIJING: [&str; 3] = ["83", "43", "87"];

        if SHENZHEN.iter().any(|p| code.starts_with(p)) {
            Some(Exchange::Shenzhen)
        } else if SHANGHAI.iter().any(|p| code.starts_with(p)) {
            Some(Exchange::Shanghai)
        } else if BEIJING.iter().any(|p| code.starts_with(p)) {
            Some(Exchange::Beijing)
        } else {
            None
        }
    }
}

/// Add the exchange suffix to a bare six-digit code.
///
/// Codes that already carry a suffix are upper-cased and returned as-is;
/// codes that are not six digits or have an unknown prefix come back trimmed
/// but otherwise untouched.
pub fn normalize_symbol(code: &str) -> String {
    let code = code.trim();
    if let Some((base, suffix)) = code.split_once('.') {
        return format!("{}.{}", base, suffix.to_ascii_uppercase());
    }
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return code.to_string();
    }
    match Exchange::from_code(code) {
        Some(exchange) => format!("{}.{}", code, exchange.suffix()),
        None => code.to_string(),
    }
}

/// Drop the exchange suffix, if any
pub fn strip_suffix(symbol: &str) -> &str {
    symbol.split('.').next().unwrap_or(symbol)
}

/// Main-board codes (Shanghai 60xxxx, Shenzhen 00xxxx)
pub fn is_main_board(symbol: &str) -> bool {
    let code = strip_suffix(symbol);
    code.starts_with("60") || code.starts_with("00")
}
