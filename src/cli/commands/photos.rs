use crate::config::Config;
use crate::db::Store;
use crate::services::image::sizeof_fmt;

pub async fn cmd_photos_list(config: &Config, email: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let Some(user) = store.get_user_by_email(email).await? else {
        println!("No user with email {email}.");
        return Ok(());
    };

    let photos = store.list_photos_for_user(user.id).await?;

    if photos.is_empty() {
        println!("{} has no photos.", user.email);
        return Ok(());
    }

    println!("Photos of {} ({} total)", user.email, photos.len());
    println!("{:-<70}", "");

    for photo in photos {
        let size = sizeof_fmt(u64::try_from(photo.filesize).unwrap_or_default());
        let place = [photo.city.as_deref(), photo.nation.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");

        println!("[{}] {} ({})", photo.id, photo.filename_orig, size);
        println!(
            "  Uploaded: {} | Taken: {} | Place: {}",
            photo.upload_date,
            photo.taken_date.as_deref().unwrap_or("-"),
            if place.is_empty() { "-" } else { &place }
        );
        if let Some(tags) = &photo.tags {
            println!("  Tags: {tags}");
        }
    }

    Ok(())
}
