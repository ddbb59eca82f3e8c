// This file implements the transaction system - the core of how value moves in the chain
// Every transaction consumes unspent outputs and creates new ones; the set of
// unspent outputs at any point is the authoritative ledger.

use crate::error::{NodeError, Result};
use crate::utils::{hex_decode, hex_encode, is_hex, sha256_hex};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fixed reward minted by the coinbase transaction of every block.
pub const COINBASE_AMOUNT: u64 = 50;

// An address is an uncompressed secp256k1 public key: "04" followed by the
// x and y coordinates, 130 lowercase hex characters in total.
const ADDRESS_LEN: usize = 130;
const TX_ID_LEN: usize = 64;

// This references a previous transaction output - "spend output #2 of transaction ABC"
// The signature binds the spending transaction's id, never the signature itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    tx_out_id: String,
    tx_out_index: u32,
    signature: String,
}

impl TxIn {
    /// A new unsigned input; the signature is filled in after the
    /// transaction id is known.
    pub fn new(tx_out_id: String, tx_out_index: u32) -> TxIn {
        TxIn {
            tx_out_id,
            tx_out_index,
            signature: String::new(),
        }
    }

    pub fn get_tx_out_id(&self) -> &str {
        self.tx_out_id.as_str()
    }

    pub fn get_tx_out_index(&self) -> u32 {
        self.tx_out_index
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    pub(crate) fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }
}

// A transaction output locks an amount to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    address: String,
    amount: u64,
}

impl TxOut {
    pub fn new(address: String, amount: u64) -> Result<TxOut> {
        if !is_valid_address(&address) {
            return Err(NodeError::InvalidAddress(address));
        }
        Ok(TxOut { address, amount })
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

/// A transaction output identified by the transaction and index that
/// produced it. The chain's UTXO set is a sequence of these, unique by
/// (txOutId, txOutIndex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentTxOut {
    tx_out_id: String,
    tx_out_index: u32,
    address: String,
    amount: u64,
}

impl UnspentTxOut {
    pub fn new(tx_out_id: String, tx_out_index: u32, address: String, amount: u64) -> UnspentTxOut {
        UnspentTxOut {
            tx_out_id,
            tx_out_index,
            address,
            amount,
        }
    }

    pub fn get_tx_out_id(&self) -> &str {
        self.tx_out_id.as_str()
    }

    pub fn get_tx_out_index(&self) -> u32 {
        self.tx_out_index
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

// The main transaction structure. The id is the hash of the input references
// and the outputs; signatures are deliberately excluded from the preimage so
// each input can sign the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: String,
    tx_ins: Vec<TxIn>,
    tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Assemble a transaction and stamp it with its computed id.
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Transaction {
        let id = compute_transaction_id(&tx_ins, &tx_outs);
        Transaction {
            id,
            tx_ins,
            tx_outs,
        }
    }

    /// The coinbase transaction of a block mints the fixed reward. Its single
    /// input spends nothing; the block index in txOutIndex keeps coinbase ids
    /// unique across blocks.
    pub fn new_coinbase(address: &str, block_index: u64) -> Result<Transaction> {
        let tx_out = TxOut::new(address.to_string(), COINBASE_AMOUNT)?;
        let tx_in = TxIn::new(String::new(), block_index as u32);
        Ok(Transaction::new(vec![tx_in], vec![tx_out]))
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_tx_ins(&self) -> &[TxIn] {
        self.tx_ins.as_slice()
    }

    pub fn get_tx_outs(&self) -> &[TxOut] {
        self.tx_outs.as_slice()
    }

    // Signing happens after the id is computed; the signature is not part
    // of the id preimage, so attaching it leaves the id intact.
    pub(crate) fn set_input_signature(&mut self, index: usize, signature: String) {
        self.tx_ins[index].set_signature(signature);
    }
}

/// Deterministic transaction id: SHA-256 over the concatenated input
/// references and outputs, in declared order.
pub fn compute_transaction_id(tx_ins: &[TxIn], tx_outs: &[TxOut]) -> String {
    let mut content = String::new();
    for tx_in in tx_ins {
        content.push_str(&tx_in.tx_out_id);
        content.push_str(&tx_in.tx_out_index.to_string());
    }
    for tx_out in tx_outs {
        content.push_str(&tx_out.address);
        content.push_str(&tx_out.amount.to_string());
    }
    sha256_hex(content.as_bytes())
}

/// A valid address is an uncompressed secp256k1 public key in hex.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN && address.starts_with("04") && is_hex(address)
}

/// Locate the UTXO an input references. Both the producing transaction id
/// and the output index must match.
pub fn find_unspent_tx_out<'a>(
    tx_out_id: &str,
    tx_out_index: u32,
    unspent_tx_outs: &'a [UnspentTxOut],
) -> Option<&'a UnspentTxOut> {
    unspent_tx_outs
        .iter()
        .find(|u| u.tx_out_id == tx_out_id && u.tx_out_index == tx_out_index)
}

/// Shape checks on a transaction received from the outside world. Deeper
/// semantic validation happens against a UTXO set.
pub fn is_valid_transaction_structure(tx: &Transaction) -> bool {
    if tx.id.len() != TX_ID_LEN || !is_hex(&tx.id) {
        return false;
    }
    if tx.tx_ins.is_empty() || tx.tx_outs.is_empty() {
        return false;
    }
    for tx_in in &tx.tx_ins {
        if !tx_in.tx_out_id.is_empty() && !is_hex(&tx_in.tx_out_id) {
            return false;
        }
        if !tx_in.signature.is_empty() && !is_hex(&tx_in.signature) {
            return false;
        }
    }
    tx.tx_outs.iter().all(|o| is_valid_address(&o.address))
}

/// Produce the hex-encoded DER signature for one input of a transaction.
/// The private key must control the address of the referenced UTXO.
pub fn sign_tx_in(
    tx: &Transaction,
    tx_in_index: usize,
    secret_key: &SecretKey,
    unspent_tx_outs: &[UnspentTxOut],
) -> Result<String> {
    let tx_in = tx.tx_ins.get(tx_in_index).ok_or_else(|| {
        NodeError::Transaction(format!("No input at index {tx_in_index} to sign"))
    })?;

    let referenced = find_unspent_tx_out(&tx_in.tx_out_id, tx_in.tx_out_index, unspent_tx_outs)
        .ok_or_else(|| {
            NodeError::Transaction(format!(
                "Referenced UTXO not found: {}:{}",
                tx_in.tx_out_id, tx_in.tx_out_index
            ))
        })?;

    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, secret_key);
    let own_address = hex_encode(&public_key.serialize_uncompressed());
    if own_address != referenced.address {
        return Err(NodeError::Signature(format!(
            "Key does not control the referenced output at {}:{}",
            tx_in.tx_out_id, tx_in.tx_out_index
        )));
    }

    let digest = hex_decode(&tx.id)?;
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| NodeError::Signature(format!("Invalid signing digest: {e}")))?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex_encode(&signature.serialize_der()))
}

fn verify_tx_in(tx: &Transaction, tx_in: &TxIn, unspent_tx_outs: &[UnspentTxOut]) -> Result<()> {
    let referenced = find_unspent_tx_out(&tx_in.tx_out_id, tx_in.tx_out_index, unspent_tx_outs)
        .ok_or_else(|| {
            NodeError::Transaction(format!(
                "Referenced UTXO not found: {}:{}",
                tx_in.tx_out_id, tx_in.tx_out_index
            ))
        })?;

    let secp = Secp256k1::verification_only();
    let public_key = PublicKey::from_slice(&hex_decode(&referenced.address)?)
        .map_err(|e| NodeError::Signature(format!("Invalid public key in UTXO: {e}")))?;
    let signature = Signature::from_der(&hex_decode(&tx_in.signature)?)
        .map_err(|e| NodeError::Signature(format!("Invalid DER signature: {e}")))?;
    let digest = hex_decode(&tx.id)?;
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| NodeError::Signature(format!("Invalid message digest: {e}")))?;

    secp.verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| {
            NodeError::Signature(format!(
                "Signature does not verify for input {}:{}",
                tx_in.tx_out_id, tx_in.tx_out_index
            ))
        })
}

/// Full semantic validation of a non-coinbase transaction against a UTXO
/// set: id recomputation, per-input UTXO lookup and signature check, and
/// input/output balance.
pub fn validate_transaction(tx: &Transaction, unspent_tx_outs: &[UnspentTxOut]) -> Result<()> {
    if compute_transaction_id(&tx.tx_ins, &tx.tx_outs) != tx.id {
        return Err(NodeError::Transaction(format!(
            "Transaction id mismatch: {}",
            tx.id
        )));
    }

    for tx_in in &tx.tx_ins {
        verify_tx_in(tx, tx_in, unspent_tx_outs)?;
    }

    let mut total_in: u64 = 0;
    for tx_in in &tx.tx_ins {
        // Lookup cannot fail here, every input was just verified
        let referenced = find_unspent_tx_out(&tx_in.tx_out_id, tx_in.tx_out_index, unspent_tx_outs)
            .ok_or_else(|| NodeError::Transaction("Referenced UTXO vanished".to_string()))?;
        total_in = total_in
            .checked_add(referenced.amount)
            .ok_or_else(|| NodeError::Transaction("Input amount overflow".to_string()))?;
    }

    let mut total_out: u64 = 0;
    for tx_out in &tx.tx_outs {
        total_out = total_out
            .checked_add(tx_out.amount)
            .ok_or_else(|| NodeError::Transaction("Output amount overflow".to_string()))?;
    }

    if total_in != total_out {
        return Err(NodeError::Transaction(format!(
            "Amounts unbalanced in {}: inputs {total_in}, outputs {total_out}",
            tx.id
        )));
    }

    Ok(())
}

/// Coinbase transactions mint coins, so they follow their own rules: one
/// unsigned input whose txOutIndex carries the block index, and one output
/// of exactly the fixed reward.
pub fn validate_coinbase(tx: &Transaction, block_index: u64) -> Result<()> {
    if compute_transaction_id(&tx.tx_ins, &tx.tx_outs) != tx.id {
        return Err(NodeError::Transaction(format!(
            "Coinbase id mismatch: {}",
            tx.id
        )));
    }
    if tx.tx_ins.len() != 1 {
        return Err(NodeError::Transaction(
            "Coinbase must have exactly one input".to_string(),
        ));
    }
    let tx_in = &tx.tx_ins[0];
    if !tx_in.signature.is_empty() || !tx_in.tx_out_id.is_empty() {
        return Err(NodeError::Transaction(
            "Coinbase input must be unsigned and reference nothing".to_string(),
        ));
    }
    if u64::from(tx_in.tx_out_index) != block_index {
        return Err(NodeError::Transaction(format!(
            "Coinbase input index {} does not match block index {block_index}",
            tx_in.tx_out_index
        )));
    }
    if tx.tx_outs.len() != 1 {
        return Err(NodeError::Transaction(
            "Coinbase must have exactly one output".to_string(),
        ));
    }
    if tx.tx_outs[0].amount != COINBASE_AMOUNT {
        return Err(NodeError::Transaction(format!(
            "Coinbase amount {} is not the fixed reward {COINBASE_AMOUNT}",
            tx.tx_outs[0].amount
        )));
    }
    Ok(())
}

/// Validate all transactions of one block: a leading coinbase, no output
/// spent twice within the block, and every other transaction valid against
/// the UTXO set.
pub fn validate_block_transactions(
    transactions: &[Transaction],
    unspent_tx_outs: &[UnspentTxOut],
    block_index: u64,
) -> Result<()> {
    let coinbase = transactions.first().ok_or_else(|| {
        NodeError::Transaction("Block has no transactions, coinbase required".to_string())
    })?;
    validate_coinbase(coinbase, block_index)?;

    let mut spent: HashSet<(&str, u32)> = HashSet::new();
    for tx in transactions {
        for tx_in in &tx.tx_ins {
            if !spent.insert((tx_in.tx_out_id.as_str(), tx_in.tx_out_index)) {
                return Err(NodeError::Transaction(format!(
                    "Duplicate input in block: {}:{}",
                    tx_in.tx_out_id, tx_in.tx_out_index
                )));
            }
        }
    }

    for tx in &transactions[1..] {
        validate_transaction(tx, unspent_tx_outs)?;
    }

    Ok(())
}

/// Validate a block's transactions and evolve the UTXO set: consumed
/// outputs leave, produced outputs join. Existing entries keep their order
/// so balance selection stays deterministic.
pub fn process_transactions(
    transactions: &[Transaction],
    unspent_tx_outs: &[UnspentTxOut],
    block_index: u64,
) -> Result<Vec<UnspentTxOut>> {
    validate_block_transactions(transactions, unspent_tx_outs, block_index)?;
    Ok(update_unspent_tx_outs(transactions, unspent_tx_outs))
}

fn update_unspent_tx_outs(
    transactions: &[Transaction],
    unspent_tx_outs: &[UnspentTxOut],
) -> Vec<UnspentTxOut> {
    let consumed: HashSet<(&str, u32)> = transactions
        .iter()
        .flat_map(|tx| tx.tx_ins.iter())
        .map(|tx_in| (tx_in.tx_out_id.as_str(), tx_in.tx_out_index))
        .collect();

    let produced = transactions.iter().flat_map(|tx| {
        tx.tx_outs.iter().enumerate().map(|(index, tx_out)| {
            UnspentTxOut::new(
                tx.id.clone(),
                index as u32,
                tx_out.address.clone(),
                tx_out.amount,
            )
        })
    });

    unspent_tx_outs
        .iter()
        .filter(|u| !consumed.contains(&(u.tx_out_id.as_str(), u.tx_out_index)))
        .cloned()
        .chain(produced)
        .collect()
}
