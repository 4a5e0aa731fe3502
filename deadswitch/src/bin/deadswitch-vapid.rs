//! Standalone VAPID keypair generator, for operators who want to provision
//! `vapid.priv`/`vapid.pub` ahead of first boot instead of letting the
//! server generate them lazily.

use std::path::PathBuf;

use deadswitch::crypto::load_or_create_vapid;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let storage_dir = args.next().unwrap_or_else(|| "./data".to_string());
    let dir = PathBuf::from(storage_dir);
    std::fs::create_dir_all(&dir)?;

    let priv_path = dir.join("vapid.priv");
    let pub_path = dir.join("vapid.pub");
    let keys = load_or_create_vapid(&priv_path, &pub_path)?;

    println!("VAPID public key: {}", keys.public_key_b64);
    println!("private key written to {}", priv_path.display());
    println!("public key written to {}", pub_path.display());
    Ok(())
}
