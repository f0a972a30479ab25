//! Land Registry contract binding.
//!
//! Wraps the contract's JSON ABI and deployed address, encoding calls and decoding
//! call results and receipt logs with `alloy-dyn-abi`. The ABI shipped with the
//! crate is embedded at compile time; a different one can be loaded with
//! [`LandRegistryContract::from_json`] as long as it exposes the same methods.

use std::collections::BTreeMap;

use alloy_dyn_abi::{DynSolValue, EventExt, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::{Address, Bytes, U256, address};

use crate::error::WalletError;
use crate::provider::ReceiptLog;
use crate::units::{ETHER_EXPONENT, format_base_units};

/// Land Registry ABI embedded at compile time
pub const EMBEDDED_ABI: &str = include_str!("../abi/LandRegistry.json");

/// Address of the deployed Land Registry contract
pub const DEFAULT_CONTRACT_ADDRESS: Address =
    address!("322D4Ab5baC728982Fb228CC37f527b599817836");

pub mod methods {
    pub const REGISTER_LAND: &str = "registerLand";
    pub const UPDATE_LAND: &str = "updateLand";
    pub const BUY_LAND: &str = "buyLand";
    pub const CHANGE_LAND_PRICE: &str = "changeLandPrice";
    pub const TOGGLE_FOR_SALE: &str = "toggleForSale";
    pub const LANDS: &str = "lands";
    pub const GET_LANDS_BY_OWNER: &str = "getLandsByOwner";
    pub const GET_TRANSACTION_COUNT: &str = "getTransactionCount";
}

pub mod events {
    pub const LAND_REGISTERED: &str = "LandRegistered";
    pub const LAND_TRANSFERRED: &str = "LandTransferred";
    pub const LAND_PRICE_CHANGED: &str = "LandPriceChanged";
    pub const LAND_STATUS_CHANGED: &str = "LandStatusChanged";
}

/// Methods the binding needs; an ABI missing any of them is rejected
const REQUIRED_METHODS: [&str; 8] = [
    methods::REGISTER_LAND,
    methods::UPDATE_LAND,
    methods::BUY_LAND,
    methods::CHANGE_LAND_PRICE,
    methods::TOGGLE_FOR_SALE,
    methods::LANDS,
    methods::GET_LANDS_BY_OWNER,
    methods::GET_TRANSACTION_COUNT,
];

/// Decoded event fields keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    pub fields: BTreeMap<String, DynSolValue>,
}

impl EventPayload {
    pub fn get(&self, name: &str) -> Option<&DynSolValue> {
        self.fields.get(name)
    }

    pub fn uint(&self, name: &str) -> Option<U256> {
        self.get(name).and_then(|v| v.as_uint()).map(|(u, _)| u)
    }

    pub fn address(&self, name: &str) -> Option<Address> {
        self.get(name).and_then(DynSolValue::as_address)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(DynSolValue::as_bool)
    }

    /// Every field rendered as text, for display and JSON output
    pub fn display_fields(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), format_abi_value(value)))
            .collect()
    }
}

/// A land parcel as stored by the contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandRecord {
    pub id: U256,
    pub owner: Address,
    pub title: String,
    pub location: String,
    pub description: String,
    /// Asking price in base units
    pub price: U256,
    pub for_sale: bool,
    /// Unix timestamp of registration
    pub registration_date: U256,
}

impl LandRecord {
    /// Builds a record from the outputs of the `lands(uint256)` accessor
    pub fn from_values(values: &[DynSolValue]) -> Result<Self, WalletError> {
        let [
            id,
            owner,
            title,
            location,
            description,
            price,
            for_sale,
            registration_date,
        ] = values
        else {
            return Err(WalletError::Abi(format!(
                "expected 8 land fields, got {}",
                values.len()
            )));
        };

        Ok(Self {
            id: expect_uint(id, "id")?,
            owner: owner
                .as_address()
                .ok_or_else(|| field_type_error("owner", "address"))?,
            title: expect_string(title, "title")?,
            location: expect_string(location, "location")?,
            description: expect_string(description, "description")?,
            price: expect_uint(price, "price")?,
            for_sale: for_sale
                .as_bool()
                .ok_or_else(|| field_type_error("forSale", "bool"))?,
            registration_date: expect_uint(registration_date, "registrationDate")?,
        })
    }

    /// Price in ether with trailing zeros trimmed
    pub fn price_display(&self) -> String {
        format_base_units(self.price, ETHER_EXPONENT)
    }

    /// A zero owner means the id was never registered
    pub fn exists(&self) -> bool {
        self.owner != Address::ZERO
    }
}

fn expect_uint(value: &DynSolValue, field: &str) -> Result<U256, WalletError> {
    value
        .as_uint()
        .map(|(u, _)| u)
        .ok_or_else(|| field_type_error(field, "uint256"))
}

fn expect_string(value: &DynSolValue, field: &str) -> Result<String, WalletError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| field_type_error(field, "string"))
}

fn field_type_error(field: &str, expected: &str) -> WalletError {
    WalletError::Abi(format!("land field {field} is not a {expected}"))
}

#[derive(Debug, Clone)]
pub struct LandRegistryContract {
    address: Address,
    abi: JsonAbi,
}

impl LandRegistryContract {
    /// Binds the embedded ABI to `address`
    pub fn embedded(address: Address) -> Result<Self, WalletError> {
        Self::from_json(address, EMBEDDED_ABI)
    }

    pub fn from_json(address: Address, abi_json: &str) -> Result<Self, WalletError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| WalletError::Abi(format!("Invalid ABI JSON: {e}")))?;

        let missing: Vec<&str> = REQUIRED_METHODS
            .iter()
            .copied()
            .filter(|name| abi.function(name).is_none_or(|f| f.is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(WalletError::Abi(format!(
                "ABI is missing methods: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { address, abi })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    fn function(&self, method: &str) -> Result<&Function, WalletError> {
        self.abi
            .function(method)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| WalletError::Abi(format!("Function {method} not found in ABI")))
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.abi.event(name).and_then(|overloads| overloads.first())
    }

    /// ABI-encodes a call to `method`, selector included
    pub fn encode_call(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, WalletError> {
        let function = self.function(method)?;
        function
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|e| WalletError::Abi(format!("Failed to encode {method}: {e}")))
    }

    pub fn decode_output(
        &self,
        method: &str,
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, WalletError> {
        let function = self.function(method)?;
        function
            .abi_decode_output(data)
            .map_err(|e| WalletError::Abi(format!("Failed to decode {method} output: {e}")))
    }

    /// Decodes the contract's events out of a receipt's logs.
    ///
    /// Logs from other addresses and logs whose first topic matches no known event
    /// are skipped. When an event fires more than once the last occurrence wins.
    pub fn decode_events(&self, logs: &[ReceiptLog]) -> BTreeMap<String, EventPayload> {
        let mut decoded = BTreeMap::new();
        for log in logs.iter().filter(|log| log.address == self.address) {
            let Some(selector) = log.topics.first() else {
                continue;
            };
            let Some(event) = self
                .abi
                .events()
                .find(|event| !event.anonymous && event.selector() == *selector)
            else {
                continue;
            };
            match decode_log(event, log) {
                Ok(payload) => {
                    decoded.insert(event.name.clone(), payload);
                }
                Err(e) => {
                    tracing::warn!("Skipping undecodable {} log: {e}", event.name);
                }
            }
        }
        decoded
    }
}

fn decode_log(event: &Event, log: &ReceiptLog) -> Result<EventPayload, WalletError> {
    let decoded = event
        .decode_log_parts(log.topics.iter().copied(), &log.data)
        .map_err(|e| WalletError::Abi(e.to_string()))?;

    // Indexed reference types come back as their topic hash
    let (indexed, body): (Vec<_>, Vec<_>) = event.inputs.iter().partition(|p| p.indexed);
    let fields = indexed
        .into_iter()
        .zip(decoded.indexed)
        .chain(body.into_iter().zip(decoded.body))
        .map(|(param, value)| (param.name.clone(), value))
        .collect();

    Ok(EventPayload { fields })
}

pub fn format_abi_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(addr) => addr.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::FixedBytes(b, size) => format!("0x{}", hex::encode(&b[..*size])),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => format!(
            "[{}]",
            items
                .iter()
                .map(format_abi_value)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        _ => "<unsupported>".to_string(),
    }
}
