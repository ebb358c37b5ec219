//! Platform payload parsers.
//!
//! Each sales platform posts its own JSON shape; a parser translates that
//! shape into the [`NormalizedLead`] the rest of the pipeline works with.
//! Parsers are pure structural mappings: a missing field becomes `None`,
//! never an error, and no cross-field validation happens here.
//!
//! Adding a platform means implementing [`PlatformParser`] and registering
//! it; the classifier and worker never change.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RecoveryError, RecoveryResult};
use crate::model::NormalizedLead;

/// Translates one platform's webhook payload into a [`NormalizedLead`].
pub trait PlatformParser: Send + Sync {
    /// Platform name as it appears in the webhook URL path.
    fn platform(&self) -> &'static str;

    /// Maps the raw payload. Infallible: unknown shapes produce an empty
    /// lead, not an error.
    fn normalize(&self, raw: &Value) -> NormalizedLead;
}

/// Lookup table from platform name to parser.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Arc<dyn PlatformParser>>,
}

impl ParserRegistry {
    /// Empty registry, for callers that want full control over platforms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every shipped platform registered.
    pub fn with_default_platforms() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GenericParser));
        registry.register(Arc::new(HotmartParser));
        registry.register(Arc::new(AdooreiParser));
        registry
    }

    /// Registers a parser under its own platform name, replacing any
    /// previous parser for that name.
    pub fn register(&mut self, parser: Arc<dyn PlatformParser>) {
        self.parsers.insert(parser.platform(), parser);
    }

    /// Whether a parser is registered for `platform`.
    pub fn supports(&self, platform: &str) -> bool {
        self.parsers.contains_key(platform)
    }

    /// Normalizes `raw` with the parser registered for `platform`.
    pub fn normalize(&self, platform: &str, raw: &Value) -> RecoveryResult<NormalizedLead> {
        self.parsers
            .get(platform)
            .map(|parser| parser.normalize(raw))
            .ok_or_else(|| RecoveryError::UnsupportedPlatform(platform.to_string()))
    }

    /// Registered platform names, for startup logging.
    pub fn platforms(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.parsers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn string_at(raw: &Value, pointer: &str) -> Option<String> {
    raw.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn number_at(raw: &Value, pointer: &str) -> Option<f64> {
    raw.pointer(pointer).and_then(Value::as_f64)
}

/// The neutral shape: `customer`, `product` and `transaction` objects with
/// self-describing field names. Platforms without a dedicated integration
/// post this.
pub struct GenericParser;

impl PlatformParser for GenericParser {
    fn platform(&self) -> &'static str {
        "generic"
    }

    fn normalize(&self, raw: &Value) -> NormalizedLead {
        NormalizedLead {
            customer_name: string_at(raw, "/customer/name"),
            customer_email: string_at(raw, "/customer/email"),
            customer_phone: string_at(raw, "/customer/phone"),
            product_name: string_at(raw, "/product/name"),
            total_value: number_at(raw, "/transaction/value"),
            currency: string_at(raw, "/transaction/currency"),
            payment_method: string_at(raw, "/transaction/payment_method"),
            status: string_at(raw, "/event_type"),
        }
    }
}

/// Hotmart posts buyer/purchase objects; the phone number arrives split
/// into area code and local number, joined here when both parts exist.
pub struct HotmartParser;

impl PlatformParser for HotmartParser {
    fn platform(&self) -> &'static str {
        "hotmart"
    }

    fn normalize(&self, raw: &Value) -> NormalizedLead {
        let phone = match (
            string_at(raw, "/buyer/phone_area_code"),
            string_at(raw, "/buyer/phone_number"),
        ) {
            (Some(area), Some(number)) => Some(format!("{area}{number}")),
            _ => None,
        };

        NormalizedLead {
            customer_name: string_at(raw, "/buyer/name"),
            customer_email: string_at(raw, "/buyer/email"),
            customer_phone: phone,
            product_name: string_at(raw, "/product/name"),
            total_value: number_at(raw, "/purchase/price/value"),
            currency: string_at(raw, "/purchase/price/currency_code"),
            payment_method: string_at(raw, "/purchase/payment/type"),
            status: string_at(raw, "/event"),
        }
    }
}

/// Adoorei nests everything under `resource`, mirroring the envelope its
/// event stream uses for order lifecycle notifications.
pub struct AdooreiParser;

impl PlatformParser for AdooreiParser {
    fn platform(&self) -> &'static str {
        "adoorei"
    }

    fn normalize(&self, raw: &Value) -> NormalizedLead {
        NormalizedLead {
            customer_name: string_at(raw, "/resource/customer/name"),
            customer_email: string_at(raw, "/resource/customer/email"),
            customer_phone: string_at(raw, "/resource/customer/phone"),
            product_name: string_at(raw, "/resource/product/name"),
            total_value: number_at(raw, "/resource/total"),
            currency: string_at(raw, "/resource/currency"),
            payment_method: string_at(raw, "/resource/payment_method"),
            status: string_at(raw, "/resource/status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generic_parser_maps_the_neutral_shape() {
        let raw = json!({
            "event_type": "ABANDONED_CART",
            "customer": {"name": "Ana Souza", "email": "ana@example.com", "phone": "+5511999990000"},
            "product": {"name": "Curso de Violão"},
            "transaction": {"value": 297.5, "currency": "BRL", "payment_method": "pix"}
        });

        let lead = GenericParser.normalize(&raw);
        assert_eq!(lead.customer_name.as_deref(), Some("Ana Souza"));
        assert_eq!(lead.customer_email.as_deref(), Some("ana@example.com"));
        assert_eq!(lead.customer_phone.as_deref(), Some("+5511999990000"));
        assert_eq!(lead.product_name.as_deref(), Some("Curso de Violão"));
        assert_eq!(lead.total_value, Some(297.5));
        assert_eq!(lead.currency.as_deref(), Some("BRL"));
        assert_eq!(lead.payment_method.as_deref(), Some("pix"));
        assert_eq!(lead.status.as_deref(), Some("ABANDONED_CART"));
    }

    #[test]
    fn generic_parser_leaves_missing_fields_unset() {
        let lead = GenericParser.normalize(&json!({"event_type": "ORDER_PAID"}));
        assert_eq!(lead.status.as_deref(), Some("ORDER_PAID"));
        assert_eq!(lead.customer_name, None);
        assert_eq!(lead.total_value, None);
    }

    #[test]
    fn hotmart_parser_joins_the_split_phone_number() {
        let raw = json!({
            "event": "PURCHASE_DELAYED",
            "buyer": {
                "name": "Carlos Lima",
                "email": "carlos@example.com",
                "phone_area_code": "21",
                "phone_number": "988887777"
            },
            "product": {"name": "Mentoria"},
            "purchase": {
                "price": {"value": 1200.0, "currency_code": "BRL"},
                "payment": {"type": "BILLET"}
            }
        });

        let lead = HotmartParser.normalize(&raw);
        assert_eq!(lead.customer_phone.as_deref(), Some("21988887777"));
        assert_eq!(lead.total_value, Some(1200.0));
        assert_eq!(lead.currency.as_deref(), Some("BRL"));
        assert_eq!(lead.payment_method.as_deref(), Some("BILLET"));
        assert_eq!(lead.status.as_deref(), Some("PURCHASE_DELAYED"));
    }

    #[test]
    fn hotmart_parser_drops_phone_when_a_part_is_missing() {
        let raw = json!({"buyer": {"phone_number": "988887777"}});
        assert_eq!(HotmartParser.normalize(&raw).customer_phone, None);

        let raw = json!({"buyer": {"phone_area_code": "21"}});
        assert_eq!(HotmartParser.normalize(&raw).customer_phone, None);
    }

    #[test]
    fn adoorei_parser_reads_the_resource_envelope() {
        let raw = json!({
            "event": "order.created",
            "resource": {
                "status": "pending",
                "gateway_transaction_id": "tx2",
                "customer": {"name": "Bia Rocha", "email": "bia@example.com", "phone": "+5531977776666"},
                "product": {"name": "Planilha Financeira"},
                "total": 49.9,
                "currency": "BRL",
                "payment_method": "credit_card"
            }
        });

        let lead = AdooreiParser.normalize(&raw);
        assert_eq!(lead.customer_name.as_deref(), Some("Bia Rocha"));
        assert_eq!(lead.customer_email.as_deref(), Some("bia@example.com"));
        assert_eq!(lead.total_value, Some(49.9));
        assert_eq!(lead.status.as_deref(), Some("pending"));
    }

    #[test]
    fn registry_rejects_unknown_platforms() {
        let registry = ParserRegistry::with_default_platforms();
        let err = registry.normalize("kiwify", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::UnsupportedPlatform(name) if name == "kiwify"
        ));
    }

    #[test]
    fn registry_ships_all_three_platforms() {
        let registry = ParserRegistry::with_default_platforms();
        assert_eq!(registry.platforms(), vec!["adoorei", "generic", "hotmart"]);
        assert!(registry.supports("hotmart"));
        assert!(!registry.supports("kiwify"));
    }

    #[test]
    fn registry_accepts_custom_platforms() {
        struct KiwifyParser;
        impl PlatformParser for KiwifyParser {
            fn platform(&self) -> &'static str {
                "kiwify"
            }
            fn normalize(&self, raw: &Value) -> NormalizedLead {
                NormalizedLead {
                    customer_email: string_at(raw, "/Customer/email"),
                    ..NormalizedLead::default()
                }
            }
        }

        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(KiwifyParser));
        let lead = registry
            .normalize("kiwify", &json!({"Customer": {"email": "x@y.z"}}))
            .unwrap();
        assert_eq!(lead.customer_email.as_deref(), Some("x@y.z"));
    }
}
