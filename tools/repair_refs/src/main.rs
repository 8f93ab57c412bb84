use std::env;

use dotenvy::dotenv;
use halaqat::derive::teacher_ref_repairs;
use halaqat::identity::{FirebaseIdentity, IdentityConfig, IdentityProvider, TokenSlot};
use halaqat::models::{Halaqa, Student};
use halaqat::store::firestore::{FirestoreConfig, FirestoreStore};
use halaqat::store::{Collection, Fields, RecordStore, WriteBatch, list_records};

fn is_dry_run() -> bool {
    !env::args().any(|a| a == "--apply")
}

fn summary_line(dry_run: bool, repaired: usize, total: usize) -> String {
    if dry_run {
        format!("Would repair: {} / {}", repaired, total)
    } else {
        format!("Students repaired: {} / {}", repaired, total)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let email = env::var("ADMIN_EMAIL")?;
    let password = env::var("ADMIN_PASSWORD")?;

    let token = TokenSlot::new();
    let identity = FirebaseIdentity::new(IdentityConfig::new_from_env()?, token.clone())?;
    let store = FirestoreStore::new(FirestoreConfig::new_from_env()?, token)?;
    identity.sign_in(&email, &password).await?;

    let students: Vec<Student> = list_records(&store).await?;
    let halaqat: Vec<Halaqa> = list_records(&store).await?;
    let repairs = teacher_ref_repairs(&students, &halaqat);

    let dry_run = is_dry_run();
    let mut batch = WriteBatch::new();

    for repair in &repairs {
        if dry_run {
            println!(
                "[DRY RUN] Would update student {} ({}) teacherId {} -> {}",
                repair.student_id, repair.halaqa_id, repair.current, repair.expected
            );
        } else {
            let mut fields = Fields::new();
            fields.insert("teacherId".into(), repair.expected.as_str().into());
            batch.update(Collection::Students, &repair.student_id, fields);
        }
    }

    if !batch.is_empty() {
        store.commit(batch).await?;
        println!("Committed one batch");
    }

    println!("{}", summary_line(dry_run, repairs.len(), students.len()));

    identity.sign_out().await?;
    Ok(())
}
