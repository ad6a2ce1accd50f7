//! Submission pipeline
//!
//! Takes ownership of a finished draft, so a draft cannot change after it
//! has been handed off. One call, one atomic ledger outcome, no retries.

use tracing::{debug, error, info};

use super::draft::TransactionDraft;
use crate::error::{Error, Result};
use crate::ledger::{LedgerClient, TransactionResult};
use crate::wallet::signer::TransactionSigner;

/// Sign and dispatch `draft`
///
/// The sender defaults to the signer's address. A rejected transaction, or
/// one whose effects report failure, becomes `SubmissionFailure` carrying
/// the ledger's message unchanged.
pub async fn submit(
    ledger: &dyn LedgerClient,
    signer: &dyn TransactionSigner,
    mut draft: TransactionDraft,
    gas_budget: u64,
) -> Result<TransactionResult> {
    let address = signer.address();
    match draft.sender() {
        None => draft.set_sender(address),
        Some(sender) if sender != address => {
            return Err(Error::TransactionBuild(format!(
                "draft sender {} does not match signer {}",
                sender, address
            )));
        }
        Some(_) => {}
    }
    draft.validate()?;

    debug!("Submitting {}", draft.summary());
    let tx_bytes = ledger.build_transaction(&draft, gas_budget).await?;
    let signature = signer.sign_transaction(&tx_bytes)?;
    let result = ledger.execute_transaction(&tx_bytes, &signature).await?;

    if !result.success {
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| format!("transaction {} failed", result.digest));
        error!("Transaction {} failed: {}", result.digest, message);
        return Err(Error::SubmissionFailure(message));
    }

    info!(
        "Transaction {} succeeded (gas used: {})",
        result.digest,
        result.gas_used.map(|g| g.to_string()).unwrap_or_else(|| "?".into())
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedger;
    use crate::ledger::Address;
    use crate::wallet::signer::MnemonicSigner;

    const PHRASE: &str = "film crazy soon outside stand loop subway crumble thrive popular green nuclear struggle pistol arm wife phrase warfare march wheat nephew ask sunny firm";

    fn transfer_draft() -> TransactionDraft {
        let mut draft = TransactionDraft::new();
        let object = draft.object_id(Address::from_u8(0x77), true);
        let recipient = draft.pure_address(Address::from_u8(0x01)).unwrap();
        draft.transfer_objects(vec![object], recipient);
        draft
    }

    #[tokio::test]
    async fn test_submit_sets_sender_and_signs() {
        let ledger = MockLedger::new();
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();

        let result = submit(&ledger, &signer, transfer_draft(), 10_000_000).await.unwrap();

        assert!(result.success);
        let built = ledger.built.lock().unwrap();
        assert_eq!(built[0].sender(), Some(signer.address()));
        let executed = ledger.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert!(!executed[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_message_is_verbatim() {
        let ledger = MockLedger::new().rejecting("MoveAbort(0x1::lending, 1503) in command 2");
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();

        let err = submit(&ledger, &signer, transfer_draft(), 10_000_000)
            .await
            .unwrap_err();

        match err {
            Error::SubmissionFailure(msg) => {
                assert_eq!(msg, "MoveAbort(0x1::lending, 1503) in command 2")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_ledger() {
        let ledger = MockLedger::new();
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();

        let err = submit(&ledger, &signer, TransactionDraft::new(), 1).await.unwrap_err();

        assert!(matches!(err, Error::TransactionBuild(_)));
        assert!(ledger.built.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_sender_rejected() {
        let ledger = MockLedger::new();
        let signer = MnemonicSigner::from_phrase(PHRASE, 0).unwrap();
        let mut draft = transfer_draft();
        draft.set_sender(Address::from_u8(0x99));

        assert!(submit(&ledger, &signer, draft, 1).await.is_err());
        assert!(ledger.executed.lock().unwrap().is_empty());
    }
}
