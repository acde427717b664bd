//! Basic example using the in-memory backends

use session_keystore::{Keystore, MemoryCache, MemoryStore, SessionConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> session_keystore::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("session_keystore=debug")),
        )
        .init();

    let config = SessionConfig::new();
    let cache = MemoryCache::with_prefix(config.cache_prefix.clone()).with_ttl(config.cache_ttl);
    let keystore = Keystore::new(MemoryStore::new(), cache, config)?;

    // First request: anonymous visitor
    let mut session = keystore.new_session();
    let views: i32 = session.get("views").await?.unwrap_or(0);
    session.set("views", views + 1)?;
    session.save().await?;
    let key = session.key().clone();
    println!("New session {} (views = {})", key.short(), views + 1);

    // Second request: same key, count again
    let mut session = keystore.session(key.clone());
    let views: i32 = session.get("views").await?.unwrap_or(0);
    session.set("views", views + 1)?;
    session.save().await?;
    println!("Returning session {} (views = {})", key.short(), views + 1);

    // Third request: the visitor logs in, so the key is rotated
    let mut session = keystore.session(key.clone());
    session.set("user", "alice")?;
    session.cycle_key().await?;
    session.save().await?;
    let user: Option<String> = session.get("user").await?;
    println!(
        "Logged in as {:?}; key rotated {} -> {}",
        user,
        key.short(),
        session.key().short()
    );
    println!("Old key still exists: {}", keystore.key_exists(&key).await?);
    println!("Session created at: {:?}", session.created_at().await?);

    Ok(())
}
