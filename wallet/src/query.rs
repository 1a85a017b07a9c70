//! Read-only queries against the local name index.

use anyhow::bail;
use quill_core::policy::Policy;
use quill_core::store::NameStore;
use quill_core::types::NameRecord;
use serde_json::json;

use crate::cli::ScanArgs;

/// Values are opaque bytes; show them as text when they are text.
fn value_json(value: &[u8]) -> serde_json::Value {
    match std::str::from_utf8(value) {
        Ok(text) => json!(text),
        Err(_) => json!(hex::encode(value)),
    }
}

fn record_json(name: &[u8], record: &NameRecord, policy: &dyn Policy) -> serde_json::Value {
    json!({
        "name": String::from_utf8_lossy(name),
        "value": value_json(&record.value),
        "height": record.height,
        "expires_at": record.height + policy.expiration_depth(record.height),
        "position": record.pos.to_string(),
    })
}

pub fn show(store: &NameStore, policy: &dyn Policy, name: &[u8]) -> anyhow::Result<()> {
    match store.current_record(name)? {
        Some(record) => println!("{:#}", record_json(name, &record, policy)),
        None => bail!("{} is not registered", String::from_utf8_lossy(name)),
    }
    Ok(())
}

pub fn history(store: &NameStore, policy: &dyn Policy, name: &[u8]) -> anyhow::Result<()> {
    let records: Vec<_> = store
        .history(name)?
        .iter()
        .map(|record| record_json(name, record, policy))
        .collect();
    println!("{:#}", serde_json::Value::Array(records));
    Ok(())
}

pub fn scan(store: &NameStore, policy: &dyn Policy, args: ScanArgs) -> anyhow::Result<()> {
    let mut entries = Vec::new();
    let mut count: u64 = 0;
    for item in store.scan(args.start.as_bytes()).take(args.max) {
        let (name, record) = item?;
        count += 1;
        if !args.stat {
            entries.push(record_json(&name, &record, policy));
        }
    }
    if args.stat {
        println!("{:#}", json!({ "names": count }));
    } else {
        println!("{:#}", serde_json::Value::Array(entries));
    }
    Ok(())
}

pub fn verify(store: &NameStore) -> anyhow::Result<()> {
    let report = store.verify()?;
    println!(
        "{:#}",
        json!({
            "names": report.names,
            "records": report.records,
            "failures": report.failures,
        })
    );
    if report.failures > 0 {
        bail!("{} histories failed verification", report.failures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quill_core::policy::StandardPolicy;
    use quill_core::types::{BlockNumber, Coin, TxPosition};

    struct ShortLease;

    impl Policy for ShortLease {
        fn expiration_depth(&self, _height: BlockNumber) -> BlockNumber {
            10
        }

        fn registration_fee(&self, _height: BlockNumber) -> Coin {
            1
        }

        fn strict_position_height(&self) -> BlockNumber {
            0
        }

        fn tag_enforcement_height(&self) -> BlockNumber {
            0
        }
    }

    #[test]
    fn expiry_display_follows_the_policy() {
        let record = NameRecord {
            height: 100,
            value: b"hello".to_vec(),
            pos: TxPosition { file: 0, offset: 7 },
        };

        let shown = record_json(b"alice", &record, &ShortLease);
        assert_eq!(shown["expires_at"], json!(110));

        let shown = record_json(b"alice", &record, &StandardPolicy);
        assert_eq!(shown["expires_at"], json!(525_700));
    }
}
