//! Move type tags
//!
//! Parses the textual form used by the ledger (`0x2::coin::Coin<0x2::sui::SUI>`)
//! into the structured form carried in transactions. Variant order matches
//! the canonical encoding, so the derived `Serialize` is the wire format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::address::Address;
use crate::error::{Error, Result};

/// Fully-qualified type of the native gas coin
pub const NATIVE_COIN_TYPE: &str = "0x2::sui::SUI";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructTag {
    pub address: Address,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

impl StructTag {
    /// Whether this is the native gas coin type
    pub fn is_native_coin(&self) -> bool {
        self.address == Address::from_u8(2)
            && self.module == "sui"
            && self.name == "SUI"
            && self.type_params.is_empty()
    }
}

/// Normalise a coin type string to its long, canonical form
///
/// `0x2::sui::SUI` and the fully padded spelling compare equal afterwards.
pub fn canonical_coin_type(coin_type: &str) -> Result<String> {
    Ok(coin_type.parse::<StructTag>()?.to_string())
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser::new(s);
        let tag = parser.parse_type()?;
        parser.expect_end()?;
        Ok(tag)
    }
}

impl FromStr for StructTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<TypeTag>()? {
            TypeTag::Struct(tag) => Ok(*tag),
            other => Err(Error::InvalidTypeTag(format!(
                "expected a struct type, got {}",
                other
            ))),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            rest: input.trim(),
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::InvalidTypeTag(format!("'{}': {}", self.input, reason))
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if let Some(rest) = self.rest.strip_prefix(token) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error("expected identifier"));
        }
        let (ident, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(ident)
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_ws();
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    fn parse_type(&mut self) -> Result<TypeTag> {
        let head = self.ident()?;
        let tag = match head {
            "bool" => TypeTag::Bool,
            "u8" => TypeTag::U8,
            "u16" => TypeTag::U16,
            "u32" => TypeTag::U32,
            "u64" => TypeTag::U64,
            "u128" => TypeTag::U128,
            "u256" => TypeTag::U256,
            "address" => TypeTag::Address,
            "signer" => TypeTag::Signer,
            "vector" => {
                if !self.eat("<") {
                    return Err(self.error("expected '<' after vector"));
                }
                let inner = self.parse_type()?;
                if !self.eat(">") {
                    return Err(self.error("expected '>'"));
                }
                TypeTag::Vector(Box::new(inner))
            }
            address => {
                let address: Address = address.parse()?;
                if !self.eat("::") {
                    return Err(self.error("expected '::' after address"));
                }
                let module = self.ident()?.to_string();
                if !self.eat("::") {
                    return Err(self.error("expected '::' after module"));
                }
                let name = self.ident()?.to_string();

                let mut type_params = Vec::new();
                if self.eat("<") {
                    loop {
                        type_params.push(self.parse_type()?);
                        if self.eat(">") {
                            break;
                        }
                        if !self.eat(",") {
                            return Err(self.error("expected ',' or '>'"));
                        }
                    }
                }

                TypeTag::Struct(Box::new(StructTag {
                    address,
                    module,
                    name,
                    type_params,
                }))
            }
        };
        Ok(tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::U8 => write!(f, "u8"),
            TypeTag::U16 => write!(f, "u16"),
            TypeTag::U32 => write!(f, "u32"),
            TypeTag::U64 => write!(f, "u64"),
            TypeTag::U128 => write!(f, "u128"),
            TypeTag::U256 => write!(f, "u256"),
            TypeTag::Address => write!(f, "address"),
            TypeTag::Signer => write!(f, "signer"),
            TypeTag::Vector(inner) => write!(f, "vector<{}>", inner),
            TypeTag::Struct(tag) => write!(f, "{}", tag),
        }
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)?;
        if !self.type_params.is_empty() {
            write!(f, "<")?;
            for (i, param) in self.type_params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", param)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}
