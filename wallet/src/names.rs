//! Registration workflow: commitment generation, the wallet's book of its
//! own reveals, and the scripts handed back to the caller for embedding in
//! transactions.

use anyhow::bail;
use parity_scale_codec::{Decode, Encode};
use quill_core::hashes::H160;
use quill_core::name_op::{commitment_hash, first_update_script, new_script, update_script};
use quill_core::policy::REGISTRATION_FEE;
use quill_core::store::NameStore;
use quill_core::types::{MAX_NAME_LENGTH, MIN_AMOUNT};
use rand_core::{OsRng, RngCore};
use serde_json::json;

use crate::cli::{NameFirstupdateArgs, NameNewArgs, NameUpdateArgs};

/// Stricter value cap applied when building operations, below the
/// consensus limit.
pub const MAX_UI_VALUE_LENGTH: usize = 520;

const REVEAL_LENGTH: usize = 8;
const MY_NAMES_TREE: &str = "my-names";

/// One registration started by this wallet. The reveal must survive until
/// the activation is mined, or the commitment is unprovable.
#[derive(Encode, Decode, Debug, PartialEq, Eq, Clone)]
struct MyName {
    reveal: Vec<u8>,
    commitment: H160,
}

fn check_name(name: &[u8]) -> anyhow::Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        bail!("name must be 1 to {} bytes", MAX_NAME_LENGTH);
    }
    Ok(())
}

fn check_value(value: &str) -> anyhow::Result<()> {
    if value.len() > MAX_UI_VALUE_LENGTH {
        bail!("value must be at most {} bytes", MAX_UI_VALUE_LENGTH);
    }
    Ok(())
}

pub fn name_new(db: &sled::Db, store: &NameStore, args: NameNewArgs) -> anyhow::Result<()> {
    let name = args.name.as_bytes();
    check_name(name)?;

    let book = open_book(db)?;
    if !args.force {
        if store.current_record(name)?.is_some() {
            bail!("{} has a registration record; pass --force to commit anyway", args.name);
        }
        if book.get(name)?.is_some() {
            bail!("a commitment for {} is already in this wallet; pass --force to replace it", args.name);
        }
    }

    let mut reveal = vec![0u8; REVEAL_LENGTH];
    OsRng.fill_bytes(&mut reveal);
    let commitment = commitment_hash(&reveal, name);
    let entry = MyName {
        reveal: reveal.clone(),
        commitment,
    };
    book.insert(name, entry.encode())?;

    let script = new_script(&commitment, &args.pay_to);
    println!(
        "{:#}",
        json!({
            "name": args.name,
            "reveal": hex::encode(&reveal),
            "commitment": format!("{:?}", commitment),
            "script": script.to_string(),
            "min_output_value": MIN_AMOUNT,
        })
    );
    Ok(())
}

pub fn name_first_update(db: &sled::Db, args: NameFirstupdateArgs) -> anyhow::Result<()> {
    let name = args.name.as_bytes();
    check_name(name)?;
    check_value(&args.value)?;

    let book = open_book(db)?;
    let entry = match book.get(name)? {
        Some(bytes) => MyName::decode(&mut &bytes[..])
            .map_err(|_| anyhow::anyhow!("corrupt registration book entry for {}", args.name))?,
        None => bail!("no commitment for {} in this wallet; run name-new first", args.name),
    };

    let script = first_update_script(name, &entry.reveal, args.value.as_bytes(), &args.pay_to);
    println!(
        "{:#}",
        json!({
            "name": args.name,
            "value": args.value,
            "reveal": hex::encode(&entry.reveal),
            "script": script.to_string(),
            "min_output_value": MIN_AMOUNT,
            "required_burn": REGISTRATION_FEE,
        })
    );
    Ok(())
}

pub fn name_update(args: NameUpdateArgs) -> anyhow::Result<()> {
    let name = args.name.as_bytes();
    check_name(name)?;
    check_value(&args.value)?;

    let script = update_script(name, args.value.as_bytes(), &args.pay_to);
    println!(
        "{:#}",
        json!({
            "name": args.name,
            "value": args.value,
            "script": script.to_string(),
            "min_output_value": MIN_AMOUNT,
        })
    );
    Ok(())
}

fn open_book(db: &sled::Db) -> anyhow::Result<sled::Tree> {
    Ok(db.open_tree(MY_NAMES_TREE)?)
}

pub fn my_names(db: &sled::Db) -> anyhow::Result<()> {
    let book = open_book(db)?;
    let mut entries = Vec::new();
    for item in book.iter() {
        let (name, bytes) = item?;
        let entry = MyName::decode(&mut &bytes[..]).map_err(|_| {
            anyhow::anyhow!(
                "corrupt registration book entry for {}",
                String::from_utf8_lossy(&name)
            )
        })?;
        entries.push(json!({
            "name": String::from_utf8_lossy(&name),
            "reveal": hex::encode(&entry.reveal),
            "commitment": format!("{:?}", entry.commitment),
        }));
    }
    println!("{:#}", serde_json::Value::Array(entries));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quill_core::name_op::{decode_name_script, NameOp};
    use quill_core::script::Script;

    #[test]
    fn name_and_value_limits() {
        assert!(check_name(b"").is_err());
        assert!(check_name(&[b'x'; 255]).is_ok());
        assert!(check_name(&[b'x'; 256]).is_err());

        assert!(check_value(&"v".repeat(520)).is_ok());
        assert!(check_value(&"v".repeat(521)).is_err());
    }

    #[test]
    fn book_entry_round_trips_through_the_database() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let book = open_book(&db).unwrap();

        let entry = MyName {
            reveal: vec![1, 2, 3],
            commitment: commitment_hash(&[1, 2, 3], b"alice"),
        };
        book.insert(b"alice", entry.encode()).unwrap();

        let stored = book.get(b"alice").unwrap().unwrap();
        assert_eq!(MyName::decode(&mut &stored[..]).unwrap(), entry);
    }

    #[test]
    fn built_scripts_decode_back_to_their_operation() {
        let reveal = vec![9u8; REVEAL_LENGTH];
        let script = first_update_script(b"alice", &reveal, b"hello", &Script::new());
        let op = decode_name_script(&script).unwrap();
        assert_eq!(
            op,
            NameOp::FirstUpdate {
                name: b"alice".to_vec(),
                reveal,
                value: b"hello".to_vec(),
            }
        );
    }
}
