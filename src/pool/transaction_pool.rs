use crate::core::transaction::{
    find_unspent_tx_out, validate_transaction, Transaction, UnspentTxOut,
};
use crate::error::{NodeError, Result};
use log::info;

/// Unconfirmed transactions in insertion order. The pool lives inside the
/// chain state and is mutated only on the chain's mutation lane, so it
/// carries no locking of its own.
#[derive(Debug, Default)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool {
            transactions: Vec::new(),
        }
    }

    /// Admit a transaction: it must validate against the given UTXO set and
    /// must not reference any output an already-pooled transaction spends.
    pub fn add(&mut self, tx: Transaction, unspent_tx_outs: &[UnspentTxOut]) -> Result<()> {
        validate_transaction(&tx, unspent_tx_outs)?;

        for pooled in &self.transactions {
            for pooled_in in pooled.get_tx_ins() {
                if tx.get_tx_ins().iter().any(|tx_in| {
                    tx_in.get_tx_out_id() == pooled_in.get_tx_out_id()
                        && tx_in.get_tx_out_index() == pooled_in.get_tx_out_index()
                }) {
                    return Err(NodeError::Pool(format!(
                        "Transaction {} conflicts with pooled transaction {}",
                        tx.get_id(),
                        pooled.get_id()
                    )));
                }
            }
        }

        info!("Admitted transaction {} to the pool", tx.get_id());
        self.transactions.push(tx);
        Ok(())
    }

    /// Defensive copy for readers off the mutation lane.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// After a chain change, drop every transaction with an input that no
    /// longer resolves against the new UTXO set. Survivor order is kept.
    pub fn reconcile(&mut self, unspent_tx_outs: &[UnspentTxOut]) {
        let before = self.transactions.len();
        self.transactions.retain(|tx| {
            tx.get_tx_ins().iter().all(|tx_in| {
                find_unspent_tx_out(tx_in.get_tx_out_id(), tx_in.get_tx_out_index(), unspent_tx_outs)
                    .is_some()
            })
        });
        let dropped = before - self.transactions.len();
        if dropped > 0 {
            info!("Dropped {dropped} stale transaction(s) from the pool");
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{sign_tx_in, TxIn, TxOut, COINBASE_AMOUNT};
    use crate::utils::hex_encode;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn test_key() -> (SecretKey, String) {
        let secret_key = SecretKey::from_slice(&[0x33; 32]).unwrap();
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        (secret_key, hex_encode(&public_key.serialize_uncompressed()))
    }

    fn utxos_for(address: &str) -> Vec<UnspentTxOut> {
        vec![
            UnspentTxOut::new("a".repeat(64), 0, address.to_string(), COINBASE_AMOUNT),
            UnspentTxOut::new("b".repeat(64), 0, address.to_string(), COINBASE_AMOUNT),
        ]
    }

    fn signed_spend(
        secret_key: &SecretKey,
        address: &str,
        utxo: &UnspentTxOut,
        utxos: &[UnspentTxOut],
    ) -> Transaction {
        let tx_in = TxIn::new(utxo.get_tx_out_id().to_string(), utxo.get_tx_out_index());
        let tx_out = TxOut::new(address.to_string(), utxo.get_amount()).unwrap();
        let mut tx = Transaction::new(vec![tx_in], vec![tx_out]);
        let signature = sign_tx_in(&tx, 0, secret_key, utxos).unwrap();
        tx.set_input_signature(0, signature);
        tx
    }

    #[test]
    fn test_add_and_snapshot() {
        let (secret_key, address) = test_key();
        let utxos = utxos_for(&address);
        let tx = signed_spend(&secret_key, &address, &utxos[0], &utxos);

        let mut pool = TransactionPool::new();
        pool.add(tx.clone(), &utxos).unwrap();
        assert_eq!(pool.snapshot(), vec![tx]);
    }

    #[test]
    fn test_conflicting_spend_rejected() {
        let (secret_key, address) = test_key();
        let utxos = utxos_for(&address);
        let first = signed_spend(&secret_key, &address, &utxos[0], &utxos);
        let second = signed_spend(&secret_key, &address, &utxos[0], &utxos);

        let mut pool = TransactionPool::new();
        pool.add(first, &utxos).unwrap();
        let err = pool.add(second, &utxos).unwrap_err();
        assert!(matches!(err, NodeError::Pool(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_transaction_rejected() {
        let (secret_key, address) = test_key();
        let utxos = utxos_for(&address);
        let tx = signed_spend(&secret_key, &address, &utxos[0], &utxos);

        let mut pool = TransactionPool::new();
        // Validate against an empty UTXO set, the inputs cannot resolve
        assert!(pool.add(tx, &[]).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_reconcile_drops_spent_and_keeps_order() {
        let (secret_key, address) = test_key();
        let utxos = utxos_for(&address);
        let spend_a = signed_spend(&secret_key, &address, &utxos[0], &utxos);
        let spend_b = signed_spend(&secret_key, &address, &utxos[1], &utxos);

        let mut pool = TransactionPool::new();
        pool.add(spend_a, &utxos).unwrap();
        pool.add(spend_b.clone(), &utxos).unwrap();

        // The first referenced UTXO disappears after a chain change
        let remaining = vec![utxos[1].clone()];
        pool.reconcile(&remaining);
        assert_eq!(pool.snapshot(), vec![spend_b]);
    }
}
