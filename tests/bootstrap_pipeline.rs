//! End-to-end ingestion tests: raw .eml files on disk through loading,
//! threading, and the atomic store commit.

use std::fs;
use std::path::Path;

use maildex::config::AppConfig;
use maildex::ingest;
use maildex::store::{self, StoreState};

fn write_eml(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("failed to write fixture email");
}

fn fixture_config(root: &Path) -> AppConfig {
    AppConfig {
        db_path: root.join("db").join("emails.db"),
        mail_dir: root.join("mail"),
        fallback_window_days: 14,
        search_limit: 20,
    }
}

fn seed_mail_dir(mail_dir: &Path) {
    fs::create_dir_all(mail_dir).unwrap();

    // Thread 1: explicit reference chain of three messages.
    write_eml(
        mail_dir,
        "001.eml",
        "Message-ID: <root@example.com>\r\n\
         From: Alice <alice@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Mon, 01 Jan 2024 10:00:00 +0000\r\n\
         Subject: Scheduler regression on large boxes\r\n\
         \r\n\
         The scheduler regresses badly with many runqueues.\r\n",
    );
    write_eml(
        mail_dir,
        "002.eml",
        "Message-ID: <reply1@example.com>\r\n\
         In-Reply-To: <root@example.com>\r\n\
         From: Bob <bob@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Mon, 01 Jan 2024 11:00:00 +0000\r\n\
         Subject: Re: Scheduler regression on large boxes\r\n\
         \r\n\
         Reproduced here, bisecting now.\r\n",
    );
    write_eml(
        mail_dir,
        "003.eml",
        "Message-ID: <reply2@example.com>\r\n\
         References: <root@example.com> <reply1@example.com>\r\n\
         From: Alice <alice@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Mon, 01 Jan 2024 12:00:00 +0000\r\n\
         Subject: Re: Scheduler regression on large boxes\r\n\
         \r\n\
         Thanks, the bisect points at the load balancer rework.\r\n",
    );

    // Thread 2: no references, joined to a same-subject reply by the
    // fallback, with a dangling reference that must be ignored.
    write_eml(
        mail_dir,
        "004.eml",
        "Message-ID: <docs@example.com>\r\n\
         From: Carol <carol@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Tue, 02 Jan 2024 09:00:00 +0000\r\n\
         Subject: Documentation for the new API\r\n\
         \r\n\
         Draft docs attached inline below.\r\n",
    );
    write_eml(
        mail_dir,
        "005.eml",
        "Message-ID: <docs-reply@example.com>\r\n\
         References: <never-seen@example.com>\r\n\
         From: Dave <dave@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Wed, 03 Jan 2024 09:00:00 +0000\r\n\
         Subject: Re: Documentation for the new API\r\n\
         \r\n\
         Looks good, a few typos in section two.\r\n",
    );

    // A lone message with no Message-ID at all.
    write_eml(
        mail_dir,
        "006.eml",
        "From: Erin <erin@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Thu, 04 Jan 2024 09:00:00 +0000\r\n\
         Subject: Release checklist\r\n\
         \r\n\
         Checklist for the next release.\r\n",
    );
}

#[tokio::test]
async fn bootstrap_commits_partitioned_threads() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture_config(dir.path());
    seed_mail_dir(&config.mail_dir);

    assert_eq!(store::state(&config.db_path), StoreState::Unbuilt);
    let pool = ingest::bootstrap_if_absent(&config).await.unwrap();
    assert_eq!(store::state(&config.db_path), StoreState::Ready);

    assert_eq!(store::count_emails(&pool).await.unwrap(), 6);
    assert_eq!(store::count_threads(&pool).await.unwrap(), 3);

    // Every email belongs to exactly one thread.
    let threads = store::list_threads(&pool, 50, 0).await.unwrap();
    let mut seen = Vec::new();
    for thread in &threads {
        let detail = store::get_thread(&pool, thread.id).await.unwrap();
        assert_eq!(detail.thread.message_count as usize, detail.emails.len());
        for email in &detail.emails {
            seen.push(email.id);
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);

    // The reference chain forms one chronologically ordered thread.
    let scheduler = threads
        .iter()
        .find(|t| t.subject.contains("Scheduler"))
        .expect("scheduler thread exists");
    let detail = store::get_thread(&pool, scheduler.id).await.unwrap();
    assert_eq!(
        detail.emails.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(detail.thread.root_email_id, 1);

    // The fallback pairs the docs messages despite the dangling reference.
    let docs = threads
        .iter()
        .find(|t| t.subject.contains("Documentation"))
        .expect("docs thread exists");
    let detail = store::get_thread(&pool, docs.id).await.unwrap();
    assert_eq!(
        detail.emails.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![4, 5]
    );

    // No staging leftovers after a successful commit.
    let staging = config.db_path.with_extension("db.staging");
    assert!(!staging.exists());
}

#[tokio::test]
async fn bootstrap_is_idempotent_once_committed() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture_config(dir.path());
    seed_mail_dir(&config.mail_dir);

    let pool = ingest::bootstrap_if_absent(&config).await.unwrap();
    assert_eq!(store::count_emails(&pool).await.unwrap(), 6);
    pool.close().await;

    // New mail arriving after the commit must not change the store.
    write_eml(
        &config.mail_dir,
        "007.eml",
        "Message-ID: <late@example.com>\r\n\
         From: Frank <frank@example.com>\r\n\
         To: Devs <devs@example.com>\r\n\
         Date: Fri, 05 Jan 2024 09:00:00 +0000\r\n\
         Subject: Late arrival\r\n\
         \r\n\
         This one must not be ingested.\r\n",
    );

    let pool = ingest::bootstrap_if_absent(&config).await.unwrap();
    assert_eq!(store::count_emails(&pool).await.unwrap(), 6);
    assert_eq!(store::count_threads(&pool).await.unwrap(), 3);
}

#[tokio::test]
async fn bootstrap_skips_malformed_messages() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture_config(dir.path());
    seed_mail_dir(&config.mail_dir);

    // Unparseable (no headers at all) and undated messages are skipped,
    // not fatal.
    write_eml(&config.mail_dir, "garbage.eml", "not an email at all");

    let pool = ingest::bootstrap_if_absent(&config).await.unwrap();
    assert_eq!(store::count_emails(&pool).await.unwrap(), 6);
}
