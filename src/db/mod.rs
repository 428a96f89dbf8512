use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection, Database};

use crate::config::AppConfig;

pub mod models;

use models::{
    Donation, DonationStatus, RecentDonation, RecipientProfile, Role, Story, UserDonationStats,
    UserRole, UserSettings, VerificationRecord, VerificationStatus,
};

/// Most recent entries kept on a user's stats document.
const RECENT_DONATIONS_CAP: usize = 10;

pub async fn init_db(config: &AppConfig) -> anyhow::Result<Database> {
    let client = Client::with_uri_str(&config.mongodb_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to document store: {}", e))?;
    Ok(client.database(&config.mongodb_db))
}

fn donations(db: &Database) -> Collection<Donation> {
    db.collection("donations")
}

fn user_stats(db: &Database) -> Collection<UserDonationStats> {
    db.collection("userStats")
}

fn user_roles(db: &Database) -> Collection<UserRole> {
    db.collection("userRoles")
}

fn user_settings(db: &Database) -> Collection<UserSettings> {
    db.collection("userSettings")
}

fn recipients(db: &Database) -> Collection<RecipientProfile> {
    db.collection("recipients")
}

fn verifications(db: &Database) -> Collection<VerificationRecord> {
    db.collection("verifications")
}

fn stories(db: &Database) -> Collection<Story> {
    db.collection("stories")
}

// Donations

pub async fn create_donation(db: &Database, donation: &Donation) -> anyhow::Result<()> {
    donations(db).insert_one(donation).await?;
    Ok(())
}

pub async fn get_donation(db: &Database, id: &str) -> anyhow::Result<Option<Donation>> {
    Ok(donations(db).find_one(doc! { "_id": id }).await?)
}

pub async fn list_donations(db: &Database) -> anyhow::Result<Vec<Donation>> {
    let cursor = donations(db)
        .find(doc! {})
        .sort(doc! { "timestamp": -1 })
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn list_user_donations(db: &Database, user_id: &str) -> anyhow::Result<Vec<Donation>> {
    let cursor = donations(db)
        .find(doc! { "donorId": user_id })
        .sort(doc! { "timestamp": -1 })
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn set_donation_order(db: &Database, id: &str, order_id: &str) -> anyhow::Result<bool> {
    let result = donations(db)
        .update_one(doc! { "_id": id }, doc! { "$set": { "orderId": order_id } })
        .await?;
    Ok(result.matched_count > 0)
}

/// Marks a donation completed. Only a pending donation transitions; a
/// donation already completed or failed is left untouched.
pub async fn complete_donation(
    db: &Database,
    id: &str,
    payment_id: &str,
    verified_at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = donations(db)
        .update_one(
            doc! { "_id": id, "status": "pending" },
            doc! { "$set": {
                "status": "completed",
                "paymentId": payment_id,
                "verifiedAt": verified_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            } },
        )
        .await?;
    Ok(result.matched_count > 0)
}

pub async fn get_donation_status(
    db: &Database,
    id: &str,
) -> anyhow::Result<Option<DonationStatus>> {
    Ok(get_donation(db, id).await?.map(|d| d.status))
}

// User donation stats (second, non-transactional write of the submission flow)

pub async fn get_user_stats(
    db: &Database,
    user_id: &str,
) -> anyhow::Result<Option<UserDonationStats>> {
    Ok(user_stats(db).find_one(doc! { "_id": user_id }).await?)
}

pub async fn record_donation_stats(
    db: &Database,
    user_id: &str,
    donation_id: &str,
    amount: f64,
    timestamp: DateTime<Utc>,
) -> anyhow::Result<()> {
    let entry = RecentDonation {
        id: donation_id.to_string(),
        amount,
        timestamp,
    };

    let mut stats = get_user_stats(db, user_id)
        .await?
        .unwrap_or(UserDonationStats {
            user_id: user_id.to_string(),
            total_donations: 0.0,
            donation_count: 0,
            recent_donations: Vec::new(),
        });

    stats.total_donations += amount;
    stats.donation_count += 1;
    stats.recent_donations.push(entry);
    let len = stats.recent_donations.len();
    if len > RECENT_DONATIONS_CAP {
        stats.recent_donations.drain(..len - RECENT_DONATIONS_CAP);
    }

    user_stats(db)
        .replace_one(doc! { "_id": user_id }, &stats)
        .upsert(true)
        .await?;
    Ok(())
}

// Roles and settings

pub async fn get_user_role(db: &Database, user_id: &str) -> anyhow::Result<Option<UserRole>> {
    Ok(user_roles(db).find_one(doc! { "_id": user_id }).await?)
}

pub async fn set_user_role(db: &Database, user_id: &str, role: Role) -> anyhow::Result<()> {
    let record = UserRole {
        user_id: user_id.to_string(),
        role,
        verification_status: None,
        updated_at: Some(Utc::now()),
    };
    user_roles(db)
        .replace_one(doc! { "_id": user_id }, &record)
        .upsert(true)
        .await?;
    Ok(())
}

pub async fn set_role_verification_status(
    db: &Database,
    user_id: &str,
    status: VerificationStatus,
) -> anyhow::Result<bool> {
    let status_value = mongodb::bson::to_bson(&status)?;
    let result = user_roles(db)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "verificationStatus": status_value } },
        )
        .await?;
    Ok(result.matched_count > 0)
}

/// Seeds the default donor role and settings documents for a first sign-in.
/// Existing documents are left alone.
pub async fn ensure_user_defaults(db: &Database, user_id: &str) -> anyhow::Result<()> {
    if get_user_role(db, user_id).await?.is_none() {
        set_user_role(db, user_id, Role::Donor).await?;
    }
    if get_user_settings(db, user_id).await?.is_none() {
        put_user_settings(db, &UserSettings::default_for(user_id)).await?;
    }
    Ok(())
}

pub async fn get_user_settings(
    db: &Database,
    user_id: &str,
) -> anyhow::Result<Option<UserSettings>> {
    Ok(user_settings(db).find_one(doc! { "_id": user_id }).await?)
}

pub async fn put_user_settings(db: &Database, settings: &UserSettings) -> anyhow::Result<()> {
    user_settings(db)
        .replace_one(doc! { "_id": &settings.user_id }, settings)
        .upsert(true)
        .await?;
    Ok(())
}

// Recipient profiles

pub async fn get_recipient_profile(
    db: &Database,
    user_id: &str,
) -> anyhow::Result<Option<RecipientProfile>> {
    Ok(recipients(db).find_one(doc! { "_id": user_id }).await?)
}

pub async fn create_recipient_profile(
    db: &Database,
    profile: &RecipientProfile,
) -> anyhow::Result<()> {
    recipients(db).insert_one(profile).await?;
    Ok(())
}

// Verification records

pub async fn get_verification(
    db: &Database,
    user_id: &str,
) -> anyhow::Result<Option<VerificationRecord>> {
    Ok(verifications(db).find_one(doc! { "_id": user_id }).await?)
}

pub async fn put_verification(db: &Database, record: &VerificationRecord) -> anyhow::Result<()> {
    verifications(db)
        .replace_one(doc! { "_id": &record.user_id }, record)
        .upsert(true)
        .await?;
    Ok(())
}

// Stories

pub async fn list_stories(db: &Database) -> anyhow::Result<Vec<Story>> {
    let cursor = stories(db)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?;
    Ok(cursor.try_collect().await?)
}

pub async fn get_story(db: &Database, id: &str) -> anyhow::Result<Option<Story>> {
    Ok(stories(db).find_one(doc! { "_id": id }).await?)
}

pub async fn create_story(db: &Database, story: &Story) -> anyhow::Result<()> {
    stories(db).insert_one(story).await?;
    Ok(())
}

pub async fn replace_story(db: &Database, story: &Story) -> anyhow::Result<bool> {
    let result = stories(db)
        .replace_one(doc! { "_id": &story.id }, story)
        .await?;
    Ok(result.matched_count > 0)
}

pub async fn delete_story(db: &Database, id: &str) -> anyhow::Result<bool> {
    let result = stories(db).delete_one(doc! { "_id": id }).await?;
    Ok(result.deleted_count > 0)
}
