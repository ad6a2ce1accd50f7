//! Canonical binary encoding of transactions
//!
//! Mirrors the ledger's `TransactionData` layout. Enum variant order is
//! significant: the derived `Serialize` writes the variant index.

use serde::Serialize;
use std::collections::HashMap;

use super::address::{Address, ObjectId};
use super::type_tag::TypeTag;
use super::ObjectRef;
use crate::error::{Error, Result};
use crate::transaction::{Argument, Command, Input, ObjectInput, TransactionDraft};

/// Object digest, length-prefixed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::Serialization(format!("bad digest {}: {}", s, e)))?;
        if bytes.len() != 32 {
            return Err(Error::Serialization(format!(
                "digest {} has {} bytes, expected 32",
                s,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }
}

pub type WireObjectRef = (Address, u64, Digest);

fn wire_ref(object: &ObjectRef) -> Result<WireObjectRef> {
    Ok((
        object.object_id,
        object.version,
        Digest::from_base58(&object.digest)?,
    ))
}

#[derive(Debug, Serialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

#[derive(Debug, Serialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: Address,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

#[derive(Debug, Serialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Debug, Serialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<WireCommand>,
}

#[derive(Debug, Serialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Serialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(WireObjectRef),
    SharedObject {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Debug, Serialize)]
pub enum WireCommand {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

#[derive(Debug, Serialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Serialize)]
pub struct GasData {
    pub payment: Vec<WireObjectRef>,
    pub owner: Address,
    pub price: u64,
    pub budget: u64,
}

impl GasData {
    pub fn new(payment: &[ObjectRef], owner: Address, price: u64, budget: u64) -> Result<Self> {
        Ok(Self {
            payment: payment.iter().map(wire_ref).collect::<Result<_>>()?,
            owner,
            price,
            budget,
        })
    }
}

#[derive(Debug, Serialize)]
pub enum TransactionExpiration {
    None,
    Epoch(u64),
}

/// How the ledger says an id-only object input must be referenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedObject {
    Owned(ObjectRef),
    Shared { initial_shared_version: u64 },
}

/// Convert a draft into its programmable form
///
/// Every id-only object input must have an entry in `resolved`.
pub fn programmable(
    draft: &TransactionDraft,
    resolved: &HashMap<ObjectId, ResolvedObject>,
) -> Result<ProgrammableTransaction> {
    let inputs = draft
        .inputs()
        .iter()
        .map(|input| match input {
            Input::Pure(bytes) => Ok(CallArg::Pure(bytes.clone())),
            Input::Object(ObjectInput::Owned(object)) => {
                Ok(CallArg::Object(ObjectArg::ImmOrOwnedObject(wire_ref(object)?)))
            }
            Input::Object(ObjectInput::Id { id, mutable }) => match resolved.get(id) {
                Some(ResolvedObject::Owned(object)) => {
                    Ok(CallArg::Object(ObjectArg::ImmOrOwnedObject(wire_ref(object)?)))
                }
                Some(ResolvedObject::Shared {
                    initial_shared_version,
                }) => Ok(CallArg::Object(ObjectArg::SharedObject {
                    id: *id,
                    initial_shared_version: *initial_shared_version,
                    mutable: *mutable,
                })),
                None => Err(Error::TransactionBuild(format!(
                    "object {} was not resolved",
                    id
                ))),
            },
        })
        .collect::<Result<Vec<_>>>()?;

    let commands = draft
        .commands()
        .iter()
        .map(|command| match command {
            Command::MoveCall(call) => WireCommand::MoveCall(Box::new(ProgrammableMoveCall {
                package: call.package,
                module: call.module.clone(),
                function: call.function.clone(),
                type_arguments: call.type_arguments.clone(),
                arguments: call.arguments.clone(),
            })),
            Command::TransferObjects { objects, recipient } => {
                WireCommand::TransferObjects(objects.clone(), *recipient)
            }
            Command::SplitCoins { coin, amounts } => WireCommand::SplitCoins(*coin, amounts.clone()),
            Command::MergeCoins {
                destination,
                sources,
            } => WireCommand::MergeCoins(*destination, sources.clone()),
        })
        .collect();

    Ok(ProgrammableTransaction { inputs, commands })
}

/// Bytes of the transaction kind alone, as read-only simulation expects
pub fn transaction_kind_bytes(
    draft: &TransactionDraft,
    resolved: &HashMap<ObjectId, ResolvedObject>,
) -> Result<Vec<u8>> {
    let kind = TransactionKind::ProgrammableTransaction(programmable(draft, resolved)?);
    Ok(bcs::to_bytes(&kind)?)
}

/// Bytes of the full transaction data, ready for signing
pub fn transaction_data_bytes(
    draft: &TransactionDraft,
    resolved: &HashMap<ObjectId, ResolvedObject>,
    sender: Address,
    gas_data: GasData,
) -> Result<Vec<u8>> {
    let data = TransactionData::V1(TransactionDataV1 {
        kind: TransactionKind::ProgrammableTransaction(programmable(draft, resolved)?),
        sender,
        gas_data,
        expiration: TransactionExpiration::None,
    });
    Ok(bcs::to_bytes(&data)?)
}
