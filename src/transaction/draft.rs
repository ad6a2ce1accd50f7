//! In-memory transaction drafts
//!
//! A draft is an ordered list of inputs and commands. Commands reference
//! inputs, the gas coin, or results of earlier commands only; `validate`
//! checks that before anything is encoded.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::ledger::{Address, ObjectId, ObjectRef, TypeTag};

/// Reference to a value inside a draft
///
/// Variant order matches the canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Argument {
    /// The coin paying for gas
    GasCoin,
    /// Input at the given index
    Input(u16),
    /// Single result of the command at the given index
    Result(u16),
    /// Element of a multi-value command result
    NestedResult(u16, u16),
}

/// Object input, either fully referenced or awaiting resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectInput {
    /// Owned object whose version and digest are already known
    Owned(ObjectRef),
    /// Object known only by id; the ledger resolves ownership before encoding
    Id { id: ObjectId, mutable: bool },
}

impl ObjectInput {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectInput::Owned(r) => r.object_id,
            ObjectInput::Id { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Pre-encoded pure value
    Pure(Vec<u8>),
    Object(ObjectInput),
}

/// Call into a Move function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

impl MoveCall {
    /// Build a call from a `package::module::function` target
    pub fn new(target: &str, type_arguments: Vec<TypeTag>, arguments: Vec<Argument>) -> Result<Self> {
        let parts: Vec<&str> = target.split("::").collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(Error::TransactionBuild(format!(
                "Invalid call target: {}",
                target
            )));
        }

        Ok(Self {
            package: parts[0].parse()?,
            module: parts[1].to_string(),
            function: parts[2].to_string(),
            type_arguments,
            arguments,
        })
    }

    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveCall(MoveCall),
    TransferObjects {
        objects: Vec<Argument>,
        recipient: Argument,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
}

impl Command {
    fn arguments(&self) -> Vec<Argument> {
        match self {
            Command::MoveCall(call) => call.arguments.clone(),
            Command::TransferObjects { objects, recipient } => {
                let mut args = objects.clone();
                args.push(*recipient);
                args
            }
            Command::SplitCoins { coin, amounts } => {
                let mut args = vec![*coin];
                args.extend(amounts.iter().copied());
                args
            }
            Command::MergeCoins {
                destination,
                sources,
            } => {
                let mut args = vec![*destination];
                args.extend(sources.iter().copied());
                args
            }
        }
    }

    /// Short label used in logs and dry-run output
    pub fn label(&self) -> String {
        match self {
            Command::MoveCall(call) => format!("call {}::{}", call.module, call.function),
            Command::TransferObjects { objects, .. } => format!("transfer x{}", objects.len()),
            Command::SplitCoins { amounts, .. } => format!("split x{}", amounts.len()),
            Command::MergeCoins { sources, .. } => format!("merge x{}", sources.len()),
        }
    }
}

/// Ordered, append-only sequence of ledger operations for one account action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDraft {
    sender: Option<Address>,
    inputs: Vec<Input>,
    commands: Vec<Command>,
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    pub fn set_sender(&mut self, sender: Address) {
        self.sender = Some(sender);
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn gas(&self) -> Argument {
        Argument::GasCoin
    }

    /// Add a pure value, encoded canonically
    pub fn pure<T: Serialize>(&mut self, value: &T) -> Result<Argument> {
        let bytes = bcs::to_bytes(value)?;
        Ok(self.push_input(Input::Pure(bytes)))
    }

    pub fn pure_u64(&mut self, value: u64) -> Result<Argument> {
        self.pure(&value)
    }

    pub fn pure_address(&mut self, address: Address) -> Result<Argument> {
        self.pure(&address)
    }

    /// Add an object input; the same object id always maps to the same input
    pub fn object(&mut self, object: ObjectInput) -> Argument {
        let id = object.id();
        let existing = self.inputs.iter().position(|input| match input {
            Input::Object(o) => o.id() == id,
            Input::Pure(_) => false,
        });

        match existing {
            Some(index) => {
                // Promote to mutable if a later use needs it
                if let (Input::Object(ObjectInput::Id { mutable, .. }), ObjectInput::Id { mutable: true, .. }) =
                    (&mut self.inputs[index], &object)
                {
                    *mutable = true;
                }
                Argument::Input(index as u16)
            }
            None => self.push_input(Input::Object(object)),
        }
    }

    /// Add a prepared input, de-duplicating objects
    pub fn input(&mut self, input: Input) -> Argument {
        match input {
            Input::Object(object) => self.object(object),
            pure => self.push_input(pure),
        }
    }

    /// Shared or otherwise unresolved object referenced by id
    pub fn object_id(&mut self, id: ObjectId, mutable: bool) -> Argument {
        self.object(ObjectInput::Id { id, mutable })
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> Argument {
        self.push_command(Command::MergeCoins {
            destination,
            sources,
        })
    }

    /// Split `amounts` off `coin`, returning one fragment per amount
    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Vec<Argument> {
        let count = amounts.len();
        let result = self.push_command(Command::SplitCoins { coin, amounts });
        nested(result, count)
    }

    pub fn move_call(&mut self, call: MoveCall) -> Argument {
        self.push_command(Command::MoveCall(call))
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, recipient: Argument) -> Argument {
        self.push_command(Command::TransferObjects { objects, recipient })
    }

    fn push_input(&mut self, input: Input) -> Argument {
        self.inputs.push(input);
        Argument::Input((self.inputs.len() - 1) as u16)
    }

    fn push_command(&mut self, command: Command) -> Argument {
        self.commands.push(command);
        Argument::Result((self.commands.len() - 1) as u16)
    }

    /// Check the forward-reference ordering of every command
    pub fn validate(&self) -> Result<()> {
        if self.commands.is_empty() {
            return Err(Error::TransactionBuild("draft has no commands".into()));
        }

        for (index, command) in self.commands.iter().enumerate() {
            for arg in command.arguments() {
                let ok = match arg {
                    Argument::GasCoin => true,
                    Argument::Input(i) => (i as usize) < self.inputs.len(),
                    Argument::Result(i) | Argument::NestedResult(i, _) => (i as usize) < index,
                };
                if !ok {
                    return Err(Error::TransactionBuild(format!(
                        "command {} ({}) references {:?} before it exists",
                        index,
                        command.label(),
                        arg
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn merge_count(&self) -> usize {
        self.count(|c| matches!(c, Command::MergeCoins { .. }))
    }

    pub fn split_count(&self) -> usize {
        self.count(|c| matches!(c, Command::SplitCoins { .. }))
    }

    pub fn transfer_count(&self) -> usize {
        self.count(|c| matches!(c, Command::TransferObjects { .. }))
    }

    pub fn move_calls(&self) -> Vec<&MoveCall> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::MoveCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    /// One-line description of the command sequence
    pub fn summary(&self) -> String {
        self.commands
            .iter()
            .map(Command::label)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

fn nested(result: Argument, count: usize) -> Vec<Argument> {
    match result {
        Argument::Result(index) => (0..count as u16)
            .map(|i| Argument::NestedResult(index, i))
            .collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_returns_nested_results() {
        let mut draft = TransactionDraft::new();
        let a = draft.pure_u64(10).unwrap();
        let b = draft.pure_u64(20).unwrap();
        let fragments = draft.split_coins(Argument::GasCoin, vec![a, b]);

        assert_eq!(
            fragments,
            vec![Argument::NestedResult(0, 0), Argument::NestedResult(0, 1)]
        );
        assert_eq!(draft.split_count(), 1);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_object_inputs_are_deduplicated() {
        let mut draft = TransactionDraft::new();
        let clock = Address::from_u8(6);
        let first = draft.object_id(clock, false);
        let second = draft.object_id(clock, false);
        assert_eq!(first, second);
        assert_eq!(draft.inputs().len(), 1);
    }

    #[test]
    fn test_mutable_use_promotes_input() {
        let mut draft = TransactionDraft::new();
        let id = Address::from_u8(9);
        draft.object_id(id, false);
        draft.object_id(id, true);
        assert_eq!(
            draft.inputs()[0],
            Input::Object(ObjectInput::Id { id, mutable: true })
        );
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let mut draft = TransactionDraft::new();
        let recipient = draft.pure_address(Address::from_u8(1)).unwrap();
        // Result 3 does not exist yet
        draft.transfer_objects(vec![Argument::Result(3)], recipient);
        assert!(matches!(draft.validate(), Err(Error::TransactionBuild(_))));
    }

    #[test]
    fn test_validate_rejects_empty_draft() {
        assert!(TransactionDraft::new().validate().is_err());
    }

    #[test]
    fn test_move_call_target_parsing() {
        let call = MoveCall::new("0x2::coin::from_balance", vec![], vec![]).unwrap();
        assert_eq!(call.package, Address::from_u8(2));
        assert_eq!(call.function, "from_balance");
        assert!(MoveCall::new("0x2::coin", vec![], vec![]).is_err());
    }

    #[test]
    fn test_summary() {
        let mut draft = TransactionDraft::new();
        let amount = draft.pure_u64(5).unwrap();
        let parts = draft.split_coins(Argument::GasCoin, vec![amount]);
        let to = draft.pure_address(Address::from_u8(1)).unwrap();
        draft.transfer_objects(parts, to);
        assert_eq!(draft.summary(), "split x1 -> transfer x1");
    }
}
