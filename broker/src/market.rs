//! Exchange code tables.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which family of KIS endpoints and field names an exchange uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Market {
    /// Korea Exchange (KOSPI/KOSDAQ).
    Domestic,
    /// Every foreign exchange KIS routes to.
    Overseas,
}

/// Exchanges supported by the KIS Open API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Exchange {
    Seoul,
    /// All US exchanges.
    Us,
    Nasdaq,
    Nyse,
    Amex,
    HongKong,
    Shanghai,
    Shenzhen,
    Tokyo,
    Hanoi,
    HoChiMinh,
}

impl Exchange {
    pub const ALL: [Exchange; 11] = [
        Exchange::Seoul,
        Exchange::Us,
        Exchange::Nasdaq,
        Exchange::Nyse,
        Exchange::Amex,
        Exchange::HongKong,
        Exchange::Shanghai,
        Exchange::Shenzhen,
        Exchange::Tokyo,
        Exchange::Hanoi,
        Exchange::HoChiMinh,
    ];

    pub fn market(self) -> Market {
        match self {
            Exchange::Seoul => Market::Domestic,
            _ => Market::Overseas,
        }
    }

    /// Code used by the overseas trading (order/balance) endpoints.
    pub fn trading_code(self) -> &'static str {
        match self {
            Exchange::Seoul => "KRX",
            Exchange::Us => "NASD",
            Exchange::Nasdaq => "NAS",
            Exchange::Nyse => "NYSE",
            Exchange::Amex => "AMEX",
            Exchange::HongKong => "SEHK",
            Exchange::Shanghai => "SHAA",
            Exchange::Shenzhen => "SZAA",
            Exchange::Tokyo => "TKSE",
            Exchange::Hanoi => "HASE",
            Exchange::HoChiMinh => "VNSE",
        }
    }

    /// Code used by the overseas quotation endpoints.
    ///
    /// Quotations have no "all US" code; `Us` queries Nasdaq.
    pub fn quote_code(self) -> &'static str {
        match self {
            Exchange::Seoul => "KRX",
            Exchange::Us | Exchange::Nasdaq => "NAS",
            Exchange::Nyse => "NYS",
            Exchange::Amex => "AMS",
            Exchange::HongKong => "HKS",
            Exchange::Shanghai => "SHS",
            Exchange::Shenzhen => "SZS",
            Exchange::Tokyo => "TSE",
            Exchange::Hanoi => "HNX",
            Exchange::HoChiMinh => "HSX",
        }
    }

    pub fn currency(self) -> &'static str {
        match self {
            Exchange::Seoul => "KRW",
            Exchange::Us | Exchange::Nasdaq | Exchange::Nyse | Exchange::Amex => "USD",
            Exchange::HongKong => "HKD",
            Exchange::Shanghai | Exchange::Shenzhen => "CNY",
            Exchange::Tokyo => "JPY",
            Exchange::Hanoi | Exchange::HoChiMinh => "VND",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Exchange::Seoul => "seoul",
            Exchange::Us => "us",
            Exchange::Nasdaq => "nasdaq",
            Exchange::Nyse => "nyse",
            Exchange::Amex => "amex",
            Exchange::HongKong => "hong-kong",
            Exchange::Shanghai => "shanghai",
            Exchange::Shenzhen => "shenzhen",
            Exchange::Tokyo => "tokyo",
            Exchange::Hanoi => "hanoi",
            Exchange::HoChiMinh => "ho-chi-minh",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Domestic => f.write_str("domestic"),
            Market::Overseas => f.write_str("overseas"),
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Exchange::ALL
            .into_iter()
            .find(|e| e.name() == lower)
            .ok_or_else(|| format!("unknown exchange '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets() {
        assert_eq!(Exchange::Seoul.market(), Market::Domestic);
        assert!(
            Exchange::ALL
                .iter()
                .filter(|e| **e != Exchange::Seoul)
                .all(|e| e.market() == Market::Overseas)
        );
    }

    #[test]
    fn codes() {
        assert_eq!(Exchange::Us.trading_code(), "NASD");
        assert_eq!(Exchange::Us.quote_code(), "NAS");
        assert_eq!(Exchange::Nyse.quote_code(), "NYS");
        assert_eq!(Exchange::Tokyo.currency(), "JPY");
        assert_eq!(Exchange::HoChiMinh.currency(), "VND");
    }

    #[test]
    fn parse_round_trips_display() {
        for e in Exchange::ALL {
            assert_eq!(e.to_string().parse::<Exchange>(), Ok(e));
        }
        assert_eq!(" NASDAQ ".parse::<Exchange>(), Ok(Exchange::Nasdaq));
        assert!("moon".parse::<Exchange>().is_err());
    }

    #[test]
    fn deserialize_kebab_case() {
        #[derive(Deserialize)]
        struct W {
            e: Exchange,
        }
        let w: W = serde_json::from_str(r#"{"e":"hong-kong"}"#).unwrap();
        assert_eq!(w.e, Exchange::HongKong);
    }
}
