//! Classifies transaction rejections reported by the cluster into the program's custom errors.
//!
//! The remote error is always kept verbatim; classification only adds a [`DaoError`] when the text
//! names one of the program's error messages or carries its custom error code.

use dao_interface::error::DaoError;
use lazy_regex::regex_captures;
use solana_client::{
    client_error::{
        ClientError,
        ClientErrorKind,
    },
    rpc_request::{
        RpcError,
        RpcResponseErrorData,
    },
};
use solana_instruction_error::InstructionError;
use solana_transaction_error::TransactionError;
use strum::IntoEnumIterator;

/// A transaction the cluster refused, either during preflight simulation or after landing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// The error message exactly as reported.
    pub message: String,
    /// Program logs from the failed simulation, when the cluster returned them.
    pub logs: Vec<String>,
    pub program_error: Option<DaoError>,
}

impl Rejection {
    pub fn new(message: impl Into<String>, logs: Vec<String>) -> Self {
        let message = message.into();
        let program_error = std::iter::once(message.as_str())
            .chain(logs.iter().map(String::as_str))
            .find_map(classify);
        Self {
            message,
            logs,
            program_error,
        }
    }

    /// Returns `None` when the client error isn't a rejection, e.g. a transport failure.
    pub fn from_client_error(error: &ClientError) -> Option<Self> {
        let transaction_error = error.get_transaction_error()?;
        let logs = match error.kind() {
            ClientErrorKind::RpcError(RpcError::RpcResponseError {
                data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
                ..
            }) => simulation.logs.clone().unwrap_or_default(),
            _ => vec![],
        };
        let mut rejection = Self::new(error.to_string(), logs);
        rejection.program_error = rejection
            .program_error
            .or_else(|| custom_program_error(&transaction_error));
        Some(rejection)
    }

    pub fn from_transaction_error(error: &TransactionError) -> Self {
        let mut rejection = Self::new(error.to_string(), vec![]);
        rejection.program_error = rejection
            .program_error
            .or_else(|| custom_program_error(error));
        rejection
    }

    /// The program's own message when the rejection was recognized, otherwise the raw message.
    pub fn reason(&self) -> &str {
        self.program_error
            .as_ref()
            .map_or(self.message.as_str(), |err| err.message())
    }
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.program_error {
            Some(err) => write!(f, "Transaction rejected: {err}"),
            None => write!(f, "Transaction rejected: {}", self.message),
        }
    }
}

impl std::error::Error for Rejection {}

/// Recognizes a program error in free-form text.
///
/// The program's error messages and Anchor's `Error Code: <Name>.` log line are checked first;
/// failing that, a `custom program error: 0x..` code in the program's range.
pub fn classify(text: &str) -> Option<DaoError> {
    DaoError::iter()
        .find(|err| {
            text.contains(err.message()) || text.contains(&format!("Error Code: {}.", err.name()))
        })
        .or_else(|| {
            let (_, hex) = regex_captures!(r"custom program error: 0x([0-9a-fA-F]+)", text)?;
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(DaoError::from_code)
        })
}

fn custom_program_error(error: &TransactionError) -> Option<DaoError> {
    match error {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
            DaoError::from_code(*code)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_message_text() {
        assert_eq!(
            classify("Error Message: You have already voted."),
            Some(DaoError::AlreadyVoted)
        );
        assert_eq!(
            classify("AnchorError occurred. Error Code: VotingNotEnded. Error Number: 6005."),
            Some(DaoError::VotingNotEnded)
        );
    }

    #[test]
    fn classifies_by_custom_code() {
        assert_eq!(
            classify("Error processing Instruction 1: custom program error: 0x1776"),
            Some(DaoError::AlreadyVoted)
        );
        assert_eq!(
            classify("custom program error: 0x1770"),
            Some(DaoError::InvalidTokenMint)
        );
        // Anchor's own framework errors live outside the program's range.
        assert_eq!(classify("custom program error: 0xbc4"), None);
        assert_eq!(classify("Blockhash not found"), None);
    }

    #[test]
    fn rejection_keeps_raw_message() {
        let rejection = Rejection::new(
            "Transaction simulation failed: Error processing Instruction 0: custom program \
             error: 0x1773",
            vec!["Program log: AnchorError thrown in programs/dao/src/lib.rs:52.".to_string()],
        );
        assert_eq!(rejection.program_error, Some(DaoError::VotingEnded));
        assert_eq!(rejection.reason(), "Voting has already ended.");
        assert!(rejection.message.starts_with("Transaction simulation failed"));

        let unknown = Rejection::new("insufficient funds for rent", vec![]);
        assert_eq!(unknown.program_error, None);
        assert_eq!(unknown.reason(), "insufficient funds for rent");
    }

    #[test]
    fn landed_transaction_error() {
        let error = TransactionError::InstructionError(0, InstructionError::Custom(6004));
        let rejection = Rejection::from_transaction_error(&error);
        assert_eq!(rejection.program_error, Some(DaoError::InvalidOption));
    }
}
