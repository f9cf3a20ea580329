//! Gateway selection. Pure decision function over an ordered rule table;
//! the selected processor is only an identifier, never a network call.

use serde::{Deserialize, Serialize};

use super::money::Currency;

/// Supported payment processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayId {
    Stripe,
    Paypal,
    Flutterwave,
    Paystack,
}

impl std::fmt::Display for GatewayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GatewayId::Stripe => "stripe",
            GatewayId::Paypal => "paypal",
            GatewayId::Flutterwave => "flutterwave",
            GatewayId::Paystack => "paystack",
        };
        write!(f, "{}", name)
    }
}

/// What we know about the buyer at routing time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyerSignal {
    pub ip: String,
    pub bin_country: Option<String>,
}

/// A regional corridor: vendors in these countries, or charges in the
/// corridor's local currencies, route to a dedicated processor.
#[derive(Debug, Clone)]
pub struct Corridor {
    pub name: &'static str,
    pub countries: &'static [&'static str],
    pub local_currencies: &'static [&'static str],
    pub gateway: GatewayId,
}

/// Broader-region fallback checked after every corridor.
#[derive(Debug, Clone)]
pub struct RegionFallback {
    pub region: &'static str,
    pub countries: &'static [&'static str],
    pub gateway: GatewayId,
}

/// Ordered routing rules. Precedence is the listed order of the fields and
/// of the entries within each Vec; nothing here iterates an unordered map.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    pub reserve_currencies: Vec<&'static str>,
    pub reserve_gateway: GatewayId,
    pub corridors: Vec<Corridor>,
    pub region_fallbacks: Vec<RegionFallback>,
    pub default_gateway: GatewayId,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            reserve_currencies: vec!["USD", "EUR", "GBP"],
            reserve_gateway: GatewayId::Stripe,
            corridors: vec![Corridor {
                name: "west-africa",
                countries: &["NG"],
                local_currencies: &["NGN", "GHS", "KES", "ZAR"],
                gateway: GatewayId::Paystack,
            }],
            region_fallbacks: vec![RegionFallback {
                region: "africa",
                countries: &[
                    "GH", "KE", "ZA", "UG", "TZ", "RW", "CI", "SN", "CM", "EG", "MA",
                ],
                gateway: GatewayId::Flutterwave,
            }],
            default_gateway: GatewayId::Paypal,
        }
    }
}

impl RoutingTable {
    /// Selects a processor. First match wins:
    /// 1. global reserve currency, 2. corridor (vendor country or local
    /// currency), 3. region fallback by vendor country, 4. default.
    pub fn select(
        &self,
        currency: &Currency,
        _buyer: &BuyerSignal,
        vendor_location: &str,
    ) -> GatewayId {
        let code = currency.code();
        let vendor = vendor_location.trim().to_ascii_uppercase();

        if self.reserve_currencies.iter().any(|c| *c == code) {
            return self.reserve_gateway;
        }

        for corridor in &self.corridors {
            let vendor_in_corridor = corridor.countries.iter().any(|c| *c == vendor);
            let currency_local = corridor.local_currencies.iter().any(|c| *c == code);
            if vendor_in_corridor || currency_local {
                return corridor.gateway;
            }
        }

        for fallback in &self.region_fallbacks {
            if fallback.countries.iter().any(|c| *c == vendor) {
                return fallback.gateway;
            }
        }

        self.default_gateway
    }
}
