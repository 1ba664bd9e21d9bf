mod common;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use common::{remote, Device};
use passfile_core::{
    PassFileId, PassFileState, PassFileType, PassfileError, PwdItem, PwdSection, Resolution,
    SyncOutcome,
};

const PASSPHRASE: &str = "correct horse";

fn logins() -> Vec<PwdSection> {
    vec![
        PwdSection::new("Mail")
            .with_url("https://mail.example")
            .with_item(PwdItem::new(vec!["me@mail.example".into()], "mail-1")),
        PwdSection::new("Bank")
            .with_url("https://bank.example")
            .with_item(PwdItem::new(vec!["1234".into()], "bank-1")),
    ]
}

fn set_password(sections: &mut [PwdSection], name: &str, password: &str) {
    let section = sections
        .iter_mut()
        .find(|section| section.name == name)
        .expect("section should exist");
    section.items[0].password = password.to_string();
}

async fn edit(device: &Device, id: PassFileId, name: &'static str, password: &'static str) {
    device
        .context
        .update_content::<PwdSection, _>(
            id,
            move |sections| set_password(sections, name, password),
            &CancellationToken::new(),
        )
        .await
        .expect("update should succeed");
}

/// Laptop creates and uploads; phone downloads and unlocks.
async fn shared_passfile() -> (std::sync::Arc<passfile_core::MemoryRemote>, Device, Device, PassFileId) {
    let remote = remote();
    let laptop = Device::new(&remote);
    let phone = Device::new(&remote);
    let cancel = CancellationToken::new();

    let local_id = laptop
        .context
        .create("Logins", None, PASSPHRASE.into(), logins(), &cancel)
        .await
        .expect("create should succeed");
    let SyncOutcome::Created { id } = laptop.context.sync(local_id, &cancel).await.unwrap() else {
        panic!("first sync should create the passfile");
    };
    phone.context.sync_all(&cancel).await.unwrap();
    phone.prompt.push(PASSPHRASE);
    phone
        .context
        .content::<PwdSection>(id, &cancel)
        .await
        .expect("phone should unlock");
    (remote, laptop, phone, id)
}

fn password(sections: &[PwdSection], name: &str) -> String {
    sections
        .iter()
        .find(|section| section.name == name)
        .map(|section| section.items[0].password.clone())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_edits_to_different_sections_merge_cleanly() {
    let (remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "mail-2").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Bank", "bank-2").await;
    assert_eq!(phone.context.sync(id, &cancel).await.unwrap(), SyncOutcome::NeedsMerge);

    let pending = phone
        .context
        .begin_merge::<PwdSection>(id, &cancel)
        .await
        .expect("merge should start");
    assert!(!pending.merge().degraded);
    assert_eq!(pending.merge().conflict_count(), 0);
    assert_eq!(pending.remote_info().version, 2);

    let outcome = phone.context.commit_merge(&pending, &cancel).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Uploaded);
    assert_eq!(phone.context.state(id).unwrap(), PassFileState::Clean);
    assert_eq!(remote.info(id).map(|info| info.version), Some(3));

    assert_eq!(laptop.context.sync(id, &cancel).await.unwrap(), SyncOutcome::Downloaded);
    let merged = laptop.context.content::<PwdSection>(id, &cancel).await.unwrap();
    assert_eq!(password(&merged, "Mail"), "mail-2");
    assert_eq!(password(&merged, "Bank"), "bank-2");
    assert_eq!(
        merged.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["Mail", "Bank"]
    );
}

#[tokio::test]
async fn test_same_section_conflict_needs_resolution() {
    let (_remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "laptop-pw").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Mail", "phone-pw").await;
    phone.context.sync(id, &cancel).await.unwrap();

    let mut pending = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();
    let conflicts = pending.merge().conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].local.as_ref().unwrap().items[0].password, "phone-pw");
    assert_eq!(conflicts[0].remote.as_ref().unwrap().items[0].password, "laptop-pw");

    let unresolved = phone.context.commit_merge(&pending, &cancel).await;
    assert!(matches!(unresolved, Err(PassfileError::UnresolvedConflicts(1))));
    assert_eq!(phone.context.state(id).unwrap(), PassFileState::NeedsMerge);

    pending.merge_mut().resolve(0, Resolution::KeepLocal).unwrap();
    assert_eq!(
        phone.context.commit_merge(&pending, &cancel).await.unwrap(),
        SyncOutcome::Uploaded
    );

    laptop.context.sync(id, &cancel).await.unwrap();
    let merged = laptop.context.content::<PwdSection>(id, &cancel).await.unwrap();
    assert_eq!(password(&merged, "Mail"), "phone-pw");
    assert_eq!(password(&merged, "Bank"), "bank-1");
}

#[tokio::test]
async fn test_keep_both_adds_remote_copy() {
    let (_remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "laptop-pw").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Mail", "phone-pw").await;
    phone.context.sync(id, &cancel).await.unwrap();

    let mut pending = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();
    pending.merge_mut().resolve_all(Resolution::KeepBoth);
    phone.context.commit_merge(&pending, &cancel).await.unwrap();

    let merged = phone.context.content::<PwdSection>(id, &cancel).await.unwrap();
    assert_eq!(merged.len(), 3);
    let mails: Vec<&PwdSection> = merged.iter().filter(|s| s.name == "Mail").collect();
    assert_eq!(mails.len(), 2);
    assert_ne!(mails[0].id, mails[1].id);
}

#[tokio::test]
async fn test_remote_moving_during_merge_needs_another_merge() {
    let (remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "mail-2").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Bank", "bank-2").await;
    phone.context.sync(id, &cancel).await.unwrap();

    let pending = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();
    let current = remote.content(id).unwrap();
    remote.push_content(id, current);

    let outcome = phone.context.commit_merge(&pending, &cancel).await.unwrap();

    assert_eq!(outcome, SyncOutcome::NeedsMerge);
    let passfile = phone.context.get(id).unwrap();
    assert_eq!(passfile.state(), PassFileState::NeedsMerge);
    assert_eq!(passfile.origin.as_ref().map(|o| o.version), Some(2));

    // The merged content stays local; merging again converges.
    let retry = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();
    assert_eq!(retry.merge().conflict_count(), 0);
    assert_eq!(
        phone.context.commit_merge(&retry, &cancel).await.unwrap(),
        SyncOutcome::Uploaded
    );
    let merged = phone.context.content::<PwdSection>(id, &cancel).await.unwrap();
    assert_eq!(password(&merged, "Mail"), "mail-2");
    assert_eq!(password(&merged, "Bank"), "bank-2");
}

#[tokio::test]
async fn test_offline_merge_upload_keeps_merged_mark() {
    let (remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "mail-2").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Bank", "bank-2").await;
    phone.context.sync(id, &cancel).await.unwrap();
    let pending = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();

    remote.set_offline(true);
    let outcome = phone.context.commit_merge(&pending, &cancel).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Failed(passfile_core::model::ErrorKind::Uploading));
    let passfile = phone.context.get(id).unwrap();
    assert!(passfile.mark.merged);
    assert!(!passfile.mark.needs_merge);

    remote.set_offline(false);
    assert_eq!(phone.context.sync(id, &cancel).await.unwrap(), SyncOutcome::Uploaded);
    assert_eq!(phone.context.state(id).unwrap(), PassFileState::Clean);
}

#[tokio::test]
async fn test_merge_commit_never_lowers_local_version() {
    let (remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "mail-2").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Bank", "bank-2").await;
    edit(&phone, id, "Bank", "bank-3").await;
    edit(&phone, id, "Bank", "bank-4").await;
    assert_eq!(phone.context.get(id).unwrap().version, 4);
    assert_eq!(phone.context.sync(id, &cancel).await.unwrap(), SyncOutcome::NeedsMerge);
    let pending = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();
    assert_eq!(pending.remote_info().version, 2);

    remote.set_offline(true);
    phone.context.commit_merge(&pending, &cancel).await.unwrap();

    assert_eq!(phone.context.get(id).unwrap().version, 5);
}

#[tokio::test]
async fn test_missing_origin_content_degrades_merge() {
    let (_remote, laptop, phone, id) = shared_passfile().await;
    let cancel = CancellationToken::new();

    edit(&laptop, id, "Mail", "mail-2").await;
    laptop.context.sync(id, &cancel).await.unwrap();
    edit(&phone, id, "Bank", "bank-2").await;
    phone.context.sync(id, &cancel).await.unwrap();
    phone.remove_origin_file(id, PassFileType::Pwd).await;

    let pending = phone.context.begin_merge::<PwdSection>(id, &cancel).await.unwrap();

    assert!(pending.merge().degraded);
    // Without the baseline both edited sections look like divergent edits.
    assert_eq!(pending.merge().conflict_count(), 2);
}

#[tokio::test]
async fn test_merge_with_wrong_section_type_is_rejected() {
    let (_remote, _laptop, phone, id) = shared_passfile().await;
    let result = phone
        .context
        .begin_merge::<passfile_core::TxtSection>(id, &CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(PassfileError::TypeMismatch {
            expected: PassFileType::Txt,
            actual: PassFileType::Pwd
        })
    ));
}
