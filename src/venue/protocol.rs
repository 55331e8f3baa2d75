//! Deriv WebSocket API messages
//!
//! Outbound requests are plain serde structs. Inbound frames share one
//! envelope keyed by `msg_type` and are narrowed into [`VenueMessage`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::VenueError;
use crate::strategy::SessionConfig;

/// Currency every request is denominated in
pub const CURRENCY: &str = "USD";

/// Opaque contract id assigned by the venue (numeric on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContractId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => ContractId(n.to_string()),
            Raw::Text(s) => ContractId(s),
        })
    }
}

/// Serialize a decimal as a bare JSON number (`100`, not `"100"` or `100.0`)
fn as_json_number<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        if let Some(n) = normalized.to_i64() {
            return serializer.serialize_i64(n);
        }
    }
    serializer.serialize_f64(normalized.to_f64().unwrap_or_default())
}

/// Contract parameters shared by `proposal` and `buy`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractParameters {
    #[serde(serialize_with = "as_json_number")]
    pub amount: Decimal,
    pub basis: &'static str,
    pub contract_type: String,
    pub currency: &'static str,
    pub duration: u32,
    pub duration_unit: String,
    pub symbol: String,
    #[serde(serialize_with = "as_json_number")]
    pub barrier: Decimal,
}

impl ContractParameters {
    /// Stake-based parameters for `symbol` using the session's contract settings
    pub fn for_symbol(config: &SessionConfig, stake: Decimal, symbol: &str) -> Self {
        Self {
            amount: stake,
            basis: "stake",
            contract_type: config.contract_type.clone(),
            currency: CURRENCY,
            duration: config.duration,
            duration_unit: config.duration_unit.clone(),
            symbol: symbol.to_string(),
            barrier: config.barrier,
        }
    }
}

/// `proposal` request: a trial price for the given parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalRequest {
    pub proposal: u8,
    #[serde(flatten)]
    pub parameters: ContractParameters,
}

/// `buy` request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyRequest {
    pub buy: u8,
    #[serde(serialize_with = "as_json_number")]
    pub price: Decimal,
    pub parameters: ContractParameters,
    /// Stream `proposal_open_contract` updates until the contract is sold
    pub subscribe: u8,
}

/// Requests the bot sends to the venue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VenueRequest {
    Authorize { authorize: String },
    Proposal(ProposalRequest),
    Buy(BuyRequest),
    Balance { balance: u8 },
}

impl VenueRequest {
    pub fn authorize(token: impl Into<String>) -> Self {
        Self::Authorize {
            authorize: token.into(),
        }
    }

    pub fn proposal(parameters: ContractParameters) -> Self {
        Self::Proposal(ProposalRequest {
            proposal: 1,
            parameters,
        })
    }

    /// Buy at most `parameters.amount`
    pub fn buy(parameters: ContractParameters) -> Self {
        Self::Buy(BuyRequest {
            buy: 1,
            price: parameters.amount,
            parameters,
            subscribe: 1,
        })
    }

    pub fn balance() -> Self {
        Self::Balance { balance: 1 }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authorize { .. } => "authorize",
            Self::Proposal(_) => "proposal",
            Self::Buy(_) => "buy",
            Self::Balance { .. } => "balance",
        }
    }

    pub fn to_json(&self) -> Result<String, VenueError> {
        serde_json::to_string(self).map_err(|e| VenueError::Encode(e.to_string()))
    }
}

/// Settlement-relevant fields of a `proposal_open_contract` push
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContractUpdate {
    pub contract_id: ContractId,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_sold: bool,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub profit: Option<Decimal>,
}

impl ContractUpdate {
    /// Realized profit, 0 when the venue omits it
    pub fn realized_profit(&self) -> Decimal {
        self.profit.unwrap_or(Decimal::ZERO)
    }
}

/// Inbound venue messages
#[derive(Debug, Clone, PartialEq)]
pub enum VenueMessage {
    Authorized { balance: Decimal, currency: Option<String> },
    AuthorizeFailed { message: String },
    /// A quote for `symbol`; `ok` is false when the venue returned an error
    Proposal { symbol: String, ok: bool },
    Bought { contract_id: ContractId, symbol: String },
    BuyFailed { symbol: Option<String>, message: String },
    Contract(ContractUpdate),
    Balance { balance: Decimal },
    /// Error reply to any other request
    Error { msg_type: String, message: String },
    /// Well-formed but not something the bot acts on
    Unknown { msg_type: String },
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AuthorizePayload {
    #[serde(default, deserialize_with = "lenient_decimal")]
    balance: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BuyPayload {
    contract_id: ContractId,
}

#[derive(Debug, Deserialize)]
struct BalancePayload {
    #[serde(default, deserialize_with = "lenient_decimal")]
    balance: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    msg_type: String,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    echo_req: Value,
    #[serde(default)]
    authorize: Option<AuthorizePayload>,
    #[serde(default)]
    proposal: Option<Value>,
    #[serde(default)]
    buy: Option<BuyPayload>,
    #[serde(default)]
    proposal_open_contract: Option<ContractUpdate>,
    #[serde(default)]
    balance: Option<BalancePayload>,
}

impl Envelope {
    fn echoed_symbol(&self) -> Option<String> {
        self.echo_req
            .get("symbol")
            .or_else(|| self.echo_req.pointer("/parameters/symbol"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl VenueMessage {
    /// Parse one text frame
    pub fn parse(text: &str) -> Result<Self, VenueError> {
        let env: Envelope =
            serde_json::from_str(text).map_err(|e| VenueError::Malformed(e.to_string()))?;
        let missing = |field: &str| VenueError::Malformed(format!("{} without payload", field));

        if let Some(error) = &env.error {
            let message = error.message.clone();
            return Ok(match env.msg_type.as_str() {
                "authorize" => Self::AuthorizeFailed { message },
                "proposal" => Self::Proposal {
                    symbol: env.echoed_symbol().unwrap_or_else(|| "unknown".into()),
                    ok: false,
                },
                "buy" => Self::BuyFailed {
                    symbol: env.echoed_symbol(),
                    message,
                },
                _ => Self::Error {
                    msg_type: env.msg_type.clone(),
                    message,
                },
            });
        }

        match env.msg_type.as_str() {
            "authorize" => {
                let payload = env.authorize.ok_or_else(|| missing("authorize"))?;
                Ok(Self::Authorized {
                    balance: payload.balance.unwrap_or(Decimal::ZERO),
                    currency: payload.currency,
                })
            }
            "proposal" => Ok(Self::Proposal {
                symbol: env.echoed_symbol().unwrap_or_else(|| "unknown".into()),
                ok: env.proposal.as_ref().is_some_and(|p| !p.is_null()),
            }),
            "buy" => {
                let symbol = env.echoed_symbol().unwrap_or_else(|| "unknown".into());
                let payload = env.buy.ok_or_else(|| missing("buy"))?;
                Ok(Self::Bought {
                    contract_id: payload.contract_id,
                    symbol,
                })
            }
            "proposal_open_contract" => env
                .proposal_open_contract
                .map(Self::Contract)
                .ok_or_else(|| missing("proposal_open_contract")),
            "balance" => {
                let payload = env.balance.ok_or_else(|| missing("balance"))?;
                Ok(Self::Balance {
                    balance: payload.balance.unwrap_or(Decimal::ZERO),
                })
            }
            other => Ok(Self::Unknown {
                msg_type: other.to_string(),
            }),
        }
    }
}

/// Accept numbers, numeric strings, or null
fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    Ok(decimal_from_value(&Value::deserialize(deserializer)?))
}

/// Accept booleans or 0/1
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

/// Coerce a JSON value to a decimal the way a loosely typed client would
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        _ => None,
    }
}
