//! Blockchain confirmation verifier
//!
//! Reports externally observed confirmation state for a transaction hash on
//! a supported network. The ledger records what this verifier reports; it
//! does not guarantee finality. Results share the provider TTL cache and the
//! stale-fallback policy.

use crate::clients::cache::TtlCache;
use crate::error::{Error, Result};
use card_ledger::{ChainNetwork, Clock};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Externally observed confirmation state
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Network queried
    pub network: ChainNetwork,

    /// Transaction hash queried
    pub tx_hash: String,

    /// Whether the transaction succeeded on chain
    pub verified: bool,

    /// Confirmations at observation time
    pub confirmations: u64,

    /// Block number (EVM) or slot (Solana), once mined
    pub block_ref: Option<u64>,

    /// Provider-reported status: confirmed, failed, or pending
    pub status: String,
}

/// Chain verifier over JSON-RPC endpoints
pub struct ChainVerifier {
    http: reqwest::Client,
    solana_url: String,
    ethereum_url: String,
    polygon_url: String,
    cache: TtlCache<(ChainNetwork, String), VerificationReport>,
}

impl ChainVerifier {
    /// Create a verifier; `ttl_secs` bounds confirmation-cache freshness
    pub fn new(
        http: reqwest::Client,
        solana_url: String,
        ethereum_url: String,
        polygon_url: String,
        ttl_secs: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            solana_url,
            ethereum_url,
            polygon_url,
            cache: TtlCache::new(ttl_secs, clock),
        }
    }

    /// Verify a transaction hash on `network`, from cache when fresh
    pub async fn verify(&self, network: ChainNetwork, tx_hash: &str) -> Result<VerificationReport> {
        let key = (network, tx_hash.to_string());
        if let Some(report) = self.cache.fresh(&key) {
            return Ok(report);
        }

        let fetched = match network {
            ChainNetwork::Solana => self.verify_solana(tx_hash).await,
            ChainNetwork::Ethereum | ChainNetwork::Polygon => {
                self.verify_evm(network, tx_hash).await
            }
        };

        match fetched {
            Ok(report) => {
                self.cache.put(key, report.clone());
                Ok(report)
            }
            Err(e) => {
                if let Some(stale) = self.cache.any(&key) {
                    tracing::warn!(error = %e, %tx_hash, "verifier failed, serving stale cache");
                    Ok(stale)
                } else {
                    tracing::error!(error = %e, %tx_hash, "verifier failed with no cached fallback");
                    Err(Error::Upstream("unable to verify transaction".into()))
                }
            }
        }
    }

    async fn verify_solana(
        &self,
        tx_hash: &str,
    ) -> std::result::Result<VerificationReport, reqwest::Error> {
        let response = self
            .rpc(
                &self.solana_url,
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "getTransaction",
                    "params": [tx_hash, "json"],
                }),
            )
            .await?;

        match parse_solana_transaction(&response, tx_hash) {
            Some((report, Some(slot))) if report.verified => {
                // Confirmations need the tip slot
                let tip = self
                    .rpc(
                        &self.solana_url,
                        json!({"jsonrpc": "2.0", "id": 1, "method": "getSlot", "params": []}),
                    )
                    .await?;
                let current = tip["result"].as_u64().unwrap_or(slot);
                Ok(VerificationReport {
                    confirmations: current.saturating_sub(slot),
                    ..report
                })
            }
            Some((report, _)) => Ok(report),
            None => Ok(pending_report(ChainNetwork::Solana, tx_hash)),
        }
    }

    async fn verify_evm(
        &self,
        network: ChainNetwork,
        tx_hash: &str,
    ) -> std::result::Result<VerificationReport, reqwest::Error> {
        let url = match network {
            ChainNetwork::Polygon => &self.polygon_url,
            _ => &self.ethereum_url,
        };

        let receipt = self
            .rpc(
                url,
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "eth_getTransactionReceipt",
                    "params": [tx_hash],
                }),
            )
            .await?;

        match parse_evm_receipt(&receipt, network, tx_hash) {
            Some(mut report) => {
                if let Some(block) = report.block_ref {
                    let tip = self
                        .rpc(
                            url,
                            json!({"jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber", "params": []}),
                        )
                        .await?;
                    if let Some(current) = tip["result"].as_str().and_then(parse_hex) {
                        report.confirmations = current.saturating_sub(block);
                    }
                }
                Ok(report)
            }
            None => Ok(pending_report(network, tx_hash)),
        }
    }

    async fn rpc(
        &self,
        url: &str,
        body: Value,
    ) -> std::result::Result<Value, reqwest::Error> {
        self.http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

fn pending_report(network: ChainNetwork, tx_hash: &str) -> VerificationReport {
    VerificationReport {
        network,
        tx_hash: tx_hash.to_string(),
        verified: false,
        confirmations: 0,
        block_ref: None,
        status: "pending".to_string(),
    }
}

/// Parse a Solana `getTransaction` response. Returns the report and the slot
/// when the transaction was found; `None` when it is unknown or the node
/// errored.
fn parse_solana_transaction(
    response: &Value,
    tx_hash: &str,
) -> Option<(VerificationReport, Option<u64>)> {
    if response.get("error").is_some() {
        return None;
    }
    let result = response.get("result")?;
    if result.is_null() {
        return None;
    }

    let slot = result["slot"].as_u64();
    let succeeded = result["meta"]["err"].is_null();
    Some((
        VerificationReport {
            network: ChainNetwork::Solana,
            tx_hash: tx_hash.to_string(),
            verified: succeeded,
            confirmations: 0,
            block_ref: slot,
            status: if succeeded { "confirmed" } else { "failed" }.to_string(),
        },
        slot,
    ))
}

/// Parse an EVM `eth_getTransactionReceipt` response. `None` means not yet
/// mined.
fn parse_evm_receipt(
    response: &Value,
    network: ChainNetwork,
    tx_hash: &str,
) -> Option<VerificationReport> {
    if response.get("error").is_some() {
        return None;
    }
    let receipt = response.get("result")?;
    if receipt.is_null() {
        return None;
    }

    let succeeded = receipt["status"].as_str() == Some("0x1");
    let block_ref = receipt["blockNumber"].as_str().and_then(parse_hex);
    Some(VerificationReport {
        network,
        tx_hash: tx_hash.to_string(),
        verified: succeeded,
        confirmations: 0,
        block_ref,
        status: if succeeded { "confirmed" } else { "failed" }.to_string(),
    })
}

fn parse_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_successful_solana_transaction() {
        let response = json!({
            "jsonrpc": "2.0",
            "result": {
                "slot": 250_000_000u64,
                "blockTime": 1700000000,
                "meta": {"err": null, "fee": 5000}
            }
        });
        let (report, slot) = parse_solana_transaction(&response, "sig").unwrap();
        assert!(report.verified);
        assert_eq!(report.status, "confirmed");
        assert_eq!(slot, Some(250_000_000));
    }

    #[test]
    fn failed_solana_transactions_are_unverified() {
        let response = json!({
            "jsonrpc": "2.0",
            "result": {
                "slot": 100u64,
                "meta": {"err": {"InstructionError": [0, "Custom"]}}
            }
        });
        let (report, _) = parse_solana_transaction(&response, "sig").unwrap();
        assert!(!report.verified);
        assert_eq!(report.status, "failed");
    }

    #[test]
    fn node_errors_and_unknown_hashes_parse_to_none() {
        let error = json!({"jsonrpc": "2.0", "error": {"message": "not found"}});
        assert!(parse_solana_transaction(&error, "sig").is_none());

        let missing = json!({"jsonrpc": "2.0", "result": null});
        assert!(parse_solana_transaction(&missing, "sig").is_none());
        assert!(parse_evm_receipt(&missing, ChainNetwork::Ethereum, "0xabc").is_none());
    }

    #[test]
    fn parses_an_evm_receipt() {
        let response = json!({
            "jsonrpc": "2.0",
            "result": {
                "status": "0x1",
                "blockNumber": "0x112a880",
                "gasUsed": "0x5208"
            }
        });
        let report = parse_evm_receipt(&response, ChainNetwork::Ethereum, "0xabc").unwrap();
        assert!(report.verified);
        assert_eq!(report.block_ref, Some(0x112a880));

        let reverted = json!({
            "jsonrpc": "2.0",
            "result": {"status": "0x0", "blockNumber": "0x10"}
        });
        let report = parse_evm_receipt(&reverted, ChainNetwork::Polygon, "0xdef").unwrap();
        assert!(!report.verified);
        assert_eq!(report.status, "failed");
    }

    #[test]
    fn hex_block_numbers_parse() {
        assert_eq!(parse_hex("0x10"), Some(16));
        assert_eq!(parse_hex("10"), Some(16));
        assert_eq!(parse_hex("0xzz"), None);
    }
}
