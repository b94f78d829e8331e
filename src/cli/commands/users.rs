//! User account command handlers

use crate::config::Config;
use crate::db::Store;
use crate::models::user::User;
use crate::state::SharedState;

/// Every user with their photo count.
async fn user_summaries(store: &Store) -> anyhow::Result<Vec<(User, u64)>> {
    let users = store.list_users().await?;
    let mut rows = Vec::with_capacity(users.len());
    for user in users {
        let photos = store.count_photos_for_user(user.id).await?;
        rows.push((user, photos));
    }
    Ok(rows)
}

pub async fn cmd_users_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let rows = user_summaries(&store).await?;

    if rows.is_empty() {
        println!("No users registered.");
        return Ok(());
    }

    println!("Users ({} total)", rows.len());
    println!("{:-<70}", "");

    for (user, photos) in rows {
        let origin = if user.external_id.is_some() {
            "cognito"
        } else {
            "local"
        };

        println!("[{}] {} <{}>", user.id, user.username, user.email);
        println!(
            "  Photos: {} | Account: {} | Created: {}",
            photos, origin, user.created_at
        );
    }

    Ok(())
}

pub async fn cmd_users_remove(config: &Config, email: &str, yes: bool) -> anyhow::Result<()> {
    let state = SharedState::new(config.clone()).await?;

    let Some(user) = state.store.get_user_by_email(email).await? else {
        println!("No user with email {email}.");
        return Ok(());
    };

    let photos = state.store.count_photos_for_user(user.id).await?;

    if !yes {
        println!(
            "Delete '{}' <{}> and {} photo(s)? This also removes stored files.",
            user.username, user.email, photos
        );
        println!("Enter 'y' to confirm, anything else to cancel:");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = state
        .photos
        .remove_user(&user)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to remove user: {e}"))?;

    println!(
        "✓ Removed {} ({} photo rows, {} stored files)",
        user.email, photos, removed
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use sea_orm::{ConnectionTrait, Statement};

    async fn store_with_user() -> (Store, std::path::PathBuf) {
        let path =
            std::env::temp_dir().join(format!("cloudalbum-cli-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        };
        store
            .create_user("cli@example.com", "cli", "password123", &security)
            .await
            .unwrap()
            .unwrap();
        (store, path)
    }

    #[tokio::test]
    async fn test_user_summaries_counts_photos() {
        let (store, path) = store_with_user().await;

        let rows = user_summaries(&store).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.email, "cli@example.com");
        assert_eq!(rows[0].1, 0);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_user_summaries_surfaces_count_errors() {
        let (store, path) = store_with_user().await;
        let backend = store.conn.get_database_backend();
        store
            .conn
            .execute(Statement::from_string(backend, "DROP TABLE photos".to_string()))
            .await
            .unwrap();

        assert!(user_summaries(&store).await.is_err());

        let _ = std::fs::remove_file(path);
    }
}
