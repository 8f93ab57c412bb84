#![allow(dead_code)]

use std::sync::Arc;

use halaqat::identity::InMemoryIdentity;
use halaqat::models::{Halaqa, Student, Teacher};
use halaqat::services::DataService;
use halaqat::store::{InMemoryStore, Record};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub const ADMIN_EMAIL: &str = "admin123@quran.system";

pub fn student(id: &str, halaqa_id: &str, teacher_id: &str) -> Student {
    Student {
        id: id.to_string(),
        name: format!("Student {}", id),
        age: 12,
        father_phone_number: None,
        halaqa_id: halaqa_id.to_string(),
        teacher_id: teacher_id.to_string(),
        memorization_progress: 80.0,
        attendance_rate: 95.0,
        parent_id: None,
    }
}

fn put<R: Record>(store: &InMemoryStore, record: &R, id: &str) {
    store.insert(R::COLLECTION, id, record.to_fields());
}

/// Teachers t1/t2, circle h1 (t1) with s1 and s2, circle h2 (t2) with s3.
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    for (id, name) in [("t1", "Teacher One"), ("t2", "Teacher Two")] {
        let teacher = Teacher {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@quran.system", id),
        };
        put(&store, &teacher, id);
    }
    for (id, name, teacher_id) in [("h1", "Al-Fajr", "t1"), ("h2", "An-Nur", "t2")] {
        let halaqa = Halaqa {
            id: id.to_string(),
            name: name.to_string(),
            teacher_id: teacher_id.to_string(),
            student_count: 0,
        };
        put(&store, &halaqa, id);
    }
    for (id, halaqa_id, teacher_id) in [("s1", "h1", "t1"), ("s2", "h1", "t1"), ("s3", "h2", "t2")] {
        put(&store, &student(id, halaqa_id, teacher_id), id);
    }
    Arc::new(store)
}

pub fn data_service(store: &Arc<InMemoryStore>) -> Arc<DataService> {
    Arc::new(DataService::new(store.clone()))
}

/// Admin plus a login for teacher t1.
pub fn identity() -> Arc<InMemoryIdentity> {
    let identity = InMemoryIdentity::new();
    identity.add_account("admin-uid", ADMIN_EMAIL, "admin-pass");
    identity.add_account("t1", "t1@quran.system", "teacher-pass");
    identity.add_account("ghost", "ghost@quran.system", "ghost-pass");
    Arc::new(identity)
}

pub async fn settings_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}
