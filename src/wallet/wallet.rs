// The wallet owns the node's single private key. It can say what it is
// worth against a UTXO snapshot and assemble fully signed transactions,
// but it performs no I/O beyond the keystore at construction.

use crate::core::transaction::{
    is_valid_address, sign_tx_in, Transaction, TxIn, TxOut, UnspentTxOut,
};
use crate::error::{NodeError, Result};
use crate::utils::hex_encode;
use crate::wallet::Keystore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

pub struct Wallet {
    secret_key: SecretKey,
    address: String,
}

impl Wallet {
    /// Load the key from the provider, generating one on first use.
    pub fn new(keystore: &Keystore) -> Result<Wallet> {
        Ok(Self::from_secret_key(keystore.load_or_generate()?))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Wallet {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let address = hex_encode(&public_key.serialize_uncompressed());
        Wallet {
            secret_key,
            address,
        }
    }

    /// The uncompressed public key in hex; this is the node's address.
    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    /// Sum of the UTXOs locked to this wallet.
    pub fn get_balance(&self, unspent_tx_outs: &[UnspentTxOut]) -> u64 {
        unspent_tx_outs
            .iter()
            .filter(|u| u.get_address() == self.address)
            .map(|u| u.get_amount())
            .sum()
    }

    /// Build and sign a transfer. Candidate inputs are this wallet's UTXOs
    /// minus anything a pooled transaction already references, accumulated
    /// greedily in the set's iteration order. Change, when any, returns to
    /// this wallet as a second output.
    pub fn build_transaction(
        &self,
        receiver: &str,
        amount: u64,
        unspent_tx_outs: &[UnspentTxOut],
        pool_transactions: &[Transaction],
    ) -> Result<Transaction> {
        if !is_valid_address(receiver) {
            return Err(NodeError::InvalidAddress(receiver.to_string()));
        }

        let spendable = self.spendable_outputs(unspent_tx_outs, pool_transactions);

        let mut accumulated: u64 = 0;
        let mut selected: Vec<&UnspentTxOut> = Vec::new();
        for utxo in &spendable {
            selected.push(utxo);
            accumulated = accumulated.checked_add(utxo.get_amount()).ok_or_else(|| {
                NodeError::Wallet("Accumulated input amount overflow".to_string())
            })?;
            if accumulated >= amount {
                break;
            }
        }
        if accumulated < amount {
            return Err(NodeError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let tx_ins: Vec<TxIn> = selected
            .iter()
            .map(|u| TxIn::new(u.get_tx_out_id().to_string(), u.get_tx_out_index()))
            .collect();

        let mut tx_outs = vec![TxOut::new(receiver.to_string(), amount)?];
        let change = accumulated - amount;
        if change > 0 {
            tx_outs.push(TxOut::new(self.address.clone(), change)?);
        }

        let mut tx = Transaction::new(tx_ins, tx_outs);
        for index in 0..tx.get_tx_ins().len() {
            let signature = sign_tx_in(&tx, index, &self.secret_key, unspent_tx_outs)?;
            tx.set_input_signature(index, signature);
        }
        Ok(tx)
    }

    // Own UTXOs not already claimed by an input sitting in the pool.
    fn spendable_outputs(
        &self,
        unspent_tx_outs: &[UnspentTxOut],
        pool_transactions: &[Transaction],
    ) -> Vec<UnspentTxOut> {
        unspent_tx_outs
            .iter()
            .filter(|u| u.get_address() == self.address)
            .filter(|u| {
                !pool_transactions.iter().any(|tx| {
                    tx.get_tx_ins().iter().any(|tx_in| {
                        tx_in.get_tx_out_id() == u.get_tx_out_id()
                            && tx_in.get_tx_out_index() == u.get_tx_out_index()
                    })
                })
            })
            .cloned()
            .collect()
    }
}
