use crate::core::{Block, Transaction};
use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};

/// The five message kinds of the gossip protocol, with their fixed wire
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    QueryLatest,
    QueryAll,
    ResponseBlockchain,
    QueryTransactionPool,
    ResponseTransactionPool,
}

impl MessageKind {
    fn to_wire(self) -> u32 {
        match self {
            MessageKind::QueryLatest => 0,
            MessageKind::QueryAll => 1,
            MessageKind::ResponseBlockchain => 2,
            MessageKind::QueryTransactionPool => 3,
            MessageKind::ResponseTransactionPool => 4,
        }
    }

    fn from_wire(value: u32) -> Result<MessageKind> {
        match value {
            0 => Ok(MessageKind::QueryLatest),
            1 => Ok(MessageKind::QueryAll),
            2 => Ok(MessageKind::ResponseBlockchain),
            3 => Ok(MessageKind::QueryTransactionPool),
            4 => Ok(MessageKind::ResponseTransactionPool),
            other => Err(NodeError::Serialization(format!(
                "Unknown message type {other}"
            ))),
        }
    }
}

/// One peer message: a numeric type tag and an optional payload. The
/// payload is itself a JSON-encoded string, so block and transaction lists
/// ride inside the frame as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    message_type: u32,
    data: Option<String>,
}

impl Message {
    pub fn query_latest() -> Message {
        Message {
            message_type: MessageKind::QueryLatest.to_wire(),
            data: None,
        }
    }

    pub fn query_all() -> Message {
        Message {
            message_type: MessageKind::QueryAll.to_wire(),
            data: None,
        }
    }

    pub fn query_transaction_pool() -> Message {
        Message {
            message_type: MessageKind::QueryTransactionPool.to_wire(),
            data: None,
        }
    }

    pub fn response_blockchain(blocks: &[Block]) -> Result<Message> {
        Ok(Message {
            message_type: MessageKind::ResponseBlockchain.to_wire(),
            data: Some(serde_json::to_string(blocks)?),
        })
    }

    pub fn response_transaction_pool(transactions: &[Transaction]) -> Result<Message> {
        Ok(Message {
            message_type: MessageKind::ResponseTransactionPool.to_wire(),
            data: Some(serde_json::to_string(transactions)?),
        })
    }

    /// The message kind, rejecting tags this protocol does not know.
    pub fn get_kind(&self) -> Result<MessageKind> {
        MessageKind::from_wire(self.message_type)
    }

    pub fn decode_blocks(&self) -> Result<Vec<Block>> {
        let data = self.data.as_ref().ok_or_else(|| {
            NodeError::Serialization("Blockchain response carries no payload".to_string())
        })?;
        Ok(serde_json::from_str(data)?)
    }

    pub fn decode_transactions(&self) -> Result<Vec<Transaction>> {
        let data = self.data.as_ref().ok_or_else(|| {
            NodeError::Serialization("Transaction pool response carries no payload".to_string())
        })?;
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_messages_have_no_payload() {
        let json = serde_json::to_string(&Message::query_latest()).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.get_kind().unwrap(), MessageKind::QueryLatest);
        assert!(decoded.data.is_none());
    }

    #[test]
    fn test_wire_numbers_are_fixed() {
        assert_eq!(MessageKind::QueryLatest.to_wire(), 0);
        assert_eq!(MessageKind::QueryAll.to_wire(), 1);
        assert_eq!(MessageKind::ResponseBlockchain.to_wire(), 2);
        assert_eq!(MessageKind::QueryTransactionPool.to_wire(), 3);
        assert_eq!(MessageKind::ResponseTransactionPool.to_wire(), 4);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let decoded: Message = serde_json::from_str(r#"{"type": 9, "data": null}"#).unwrap();
        assert!(decoded.get_kind().is_err());
    }

    #[test]
    fn test_blockchain_payload_round_trip() {
        let blocks = vec![Block::genesis()];
        let message = Message::response_blockchain(&blocks).unwrap();

        let json = serde_json::to_string(&message).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.get_kind().unwrap(), MessageKind::ResponseBlockchain);
        assert_eq!(decoded.decode_blocks().unwrap(), blocks);
    }

    #[test]
    fn test_payload_is_a_json_string() {
        // The data field holds JSON-in-a-string, not a nested object
        let message = Message::response_blockchain(&[Block::genesis()]).unwrap();
        let value: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert!(value["data"].is_string());
    }

    #[test]
    fn test_decoding_absent_payload_fails() {
        let message = Message::query_all();
        assert!(message.decode_blocks().is_err());
    }

    #[test]
    fn test_garbage_payload_fails() {
        let decoded: Message =
            serde_json::from_str(r#"{"type": 2, "data": "not json"}"#).unwrap();
        assert!(decoded.decode_blocks().is_err());
    }
}
