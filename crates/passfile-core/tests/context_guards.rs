mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use common::{remote, Device, SERVER};
use passfile_core::{
    ContextEvent, ContextOptions, LocalFileRepository, PassFileContext, PassFileStore,
    PassFileType, PassfileError, PassphrasePrompt, PromptPurpose, PromptRequest, Purpose,
    PwdSection, SyncOutcome, TxtSection,
};

const PASSPHRASE: &str = "correct horse";

fn note(text: &str) -> Vec<TxtSection> {
    vec![TxtSection::new("Note", text)]
}

/// Holds every prompt open until the test releases it.
struct GatedPrompt {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PassphrasePrompt for GatedPrompt {
    async fn ask(&self, _request: PromptRequest) -> Option<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Some(PASSPHRASE.to_string())
    }
}

#[tokio::test]
async fn test_second_mutation_of_same_passfile_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let prompt = Arc::new(GatedPrompt {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let context = Arc::new(PassFileContext::new(
        PassFileStore::new(Arc::new(LocalFileRepository::new(
            dir.path(),
            SERVER,
            Purpose::PassFiles,
        ))),
        remote(),
        prompt.clone(),
        ContextOptions::default(),
    ));
    let cancel = CancellationToken::new();
    let busy = context
        .create("Busy", None, PASSPHRASE.into(), note("v0"), &cancel)
        .await
        .expect("create should succeed");
    let other = context
        .create("Other", None, PASSPHRASE.into(), note("v0"), &cancel)
        .await
        .expect("create should succeed");
    context.lock_all();

    let editing = tokio::spawn({
        let context = context.clone();
        async move {
            context
                .update_content::<TxtSection, _>(
                    busy,
                    |sections| sections[0].content = "edited".to_string(),
                    &CancellationToken::new(),
                )
                .await
        }
    });
    prompt.entered.notified().await;

    let second = context.update_info(busy, "Renamed", None, &cancel).await;
    assert!(matches!(second, Err(PassfileError::ConcurrentMutation(id)) if id == busy));
    context
        .update_info(other, "Still editable", None, &cancel)
        .await
        .expect("other passfiles should stay editable");

    prompt.release.notify_one();
    editing
        .await
        .expect("task should not panic")
        .expect("update should succeed");

    let passfile = context.get(busy).unwrap();
    assert_eq!(passfile.name, "Busy");
    assert_eq!(passfile.version, 1);
    context
        .update_info(busy, "Renamed", None, &cancel)
        .await
        .expect("lock should be released");
}

#[tokio::test]
async fn test_cancelled_update_leaves_passfile_untouched() {
    let remote = remote();
    let device = Device::new(&remote);
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("before"), &CancellationToken::new())
        .await
        .unwrap();
    let before = device.context.get(id).unwrap();
    let revision = device.context.revision();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = device
        .context
        .update_content::<TxtSection, _>(
            id,
            |sections| sections[0].content = "after".to_string(),
            &cancel,
        )
        .await;

    assert!(matches!(result, Err(PassfileError::Cancelled)));
    assert_eq!(device.context.get(id).unwrap(), before);
    assert_eq!(device.context.revision(), revision);
    let sections = device
        .context
        .content::<TxtSection>(id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sections[0].content, "before");

    let restarted = device.restart(&remote).await;
    assert_eq!(restarted.get(id).unwrap(), before);
}

#[tokio::test]
async fn test_wrong_passphrase_is_asked_again() {
    let remote = remote();
    let device = Device::new(&remote);
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("secret"), &cancel)
        .await
        .unwrap();
    device.context.lock_all();

    device.prompt.push("wrong");
    device.prompt.push("also wrong");
    device.prompt.push(PASSPHRASE);
    let sections = device.context.content::<TxtSection>(id, &cancel).await.unwrap();

    assert_eq!(sections[0].content, "secret");
    let requests = device.prompt.requests();
    assert_eq!(
        requests.iter().map(|r| r.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(requests.iter().all(|r| r.purpose == PromptPurpose::Unlock));
    assert!(requests[1].message.starts_with("Incorrect passphrase"));

    // Cached for the rest of the session.
    device.context.content::<TxtSection>(id, &cancel).await.unwrap();
    assert_eq!(device.prompt.asked(), 3);
}

#[tokio::test]
async fn test_attempts_run_out() {
    let remote = remote();
    let device = Device::new(&remote);
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("secret"), &cancel)
        .await
        .unwrap();
    device.context.lock_all();

    for _ in 0..3 {
        device.prompt.push("wrong");
    }
    let result = device.context.content::<TxtSection>(id, &cancel).await;

    assert!(matches!(result, Err(PassfileError::AuthenticationFailed)));
    assert_eq!(device.prompt.asked(), 3);
}

#[tokio::test]
async fn test_dismissed_prompt_cancels() {
    let remote = remote();
    let device = Device::new(&remote);
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("secret"), &cancel)
        .await
        .unwrap();
    device.context.lock_all();

    let result = device.context.content::<TxtSection>(id, &cancel).await;

    assert!(matches!(result, Err(PassfileError::Cancelled)));
    assert_eq!(device.prompt.asked(), 1);
}

#[tokio::test]
async fn test_content_of_wrong_type_is_rejected() {
    let device = Device::new(&remote());
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("x"), &cancel)
        .await
        .unwrap();

    let result = device.context.content::<PwdSection>(id, &cancel).await;

    assert!(matches!(
        result,
        Err(PassfileError::TypeMismatch {
            expected: PassFileType::Pwd,
            actual: PassFileType::Txt
        })
    ));
}

#[tokio::test]
async fn test_change_passphrase_bumps_version() {
    let device = Device::new(&remote());
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("x"), &cancel)
        .await
        .unwrap();

    device
        .context
        .change_passphrase(id, "battery staple".into(), &cancel)
        .await
        .expect("change should succeed");
    assert_eq!(device.context.get(id).unwrap().version, 1);

    device.context.lock_all();
    device.prompt.push(PASSPHRASE);
    device.prompt.push("battery staple");
    let sections = device.context.content::<TxtSection>(id, &cancel).await.unwrap();
    assert_eq!(sections[0].content, "x");
    assert_eq!(device.prompt.asked(), 2);
}

#[tokio::test]
async fn test_names_and_colors_are_validated() {
    let device = Device::new(&remote());
    let cancel = CancellationToken::new();

    let blank = device
        .context
        .create("   ", None, PASSPHRASE.into(), note("x"), &cancel)
        .await;
    assert!(matches!(blank, Err(PassfileError::InvalidInput(_))));
    let bad_color = device
        .context
        .create("Notes", Some("blue".into()), PASSPHRASE.into(), note("x"), &cancel)
        .await;
    assert!(matches!(bad_color, Err(PassfileError::InvalidInput(_))));
    let empty_passphrase = device
        .context
        .create("Notes", None, "  ".into(), note("x"), &cancel)
        .await;
    assert!(matches!(empty_passphrase, Err(PassfileError::InvalidInput(_))));
    assert!(device.context.list().is_empty());

    let id = device
        .context
        .create(" Notes ", Some("#3A7BD5".into()), PASSPHRASE.into(), note("x"), &cancel)
        .await
        .unwrap();
    let passfile = device.context.get(id).unwrap();
    assert_eq!(passfile.name, "Notes");
    assert_eq!(passfile.color.as_deref(), Some("#3a7bd5"));

    device
        .context
        .update_info(id, "Notes", Some(" ".into()), &cancel)
        .await
        .unwrap();
    assert_eq!(device.context.get(id).unwrap().color, None);
}

#[tokio::test]
async fn test_delete_and_restore() {
    let remote = remote();
    let device = Device::new(&remote);
    let cancel = CancellationToken::new();
    let local_id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("x"), &cancel)
        .await
        .unwrap();
    let SyncOutcome::Created { id } = device.context.sync(local_id, &cancel).await.unwrap() else {
        panic!("first sync should create the passfile");
    };
    let before = device.context.get(id).unwrap();

    device.context.delete(id, &cancel).await.unwrap();
    assert!(device.context.list().is_empty());
    assert_eq!(device.context.list_deleted().len(), 1);
    let edit = device
        .context
        .update_info(id, "Renamed", None, &cancel)
        .await;
    assert!(matches!(edit, Err(PassfileError::InvalidInput(_))));

    device.context.restore(id, &cancel).await.unwrap();
    assert_eq!(device.context.get(id).unwrap(), before);
    assert!(device.context.list_deleted().is_empty());
}

#[tokio::test]
async fn test_deleting_local_only_passfile_removes_it() {
    let remote = remote();
    let device = Device::new(&remote);
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Draft", None, PASSPHRASE.into(), note("x"), &cancel)
        .await
        .unwrap();
    let file = passfile_core::storage::content_file_name(
        id,
        PassFileType::Txt,
        passfile_core::storage::ContentSlot::Current,
    );
    assert!(device.has_file(&file).await);

    device.context.delete(id, &cancel).await.unwrap();

    assert!(matches!(device.context.get(id), Err(PassfileError::NotFound(_))));
    assert!(device.context.list_deleted().is_empty());
    assert!(!device.has_file(&file).await);
    assert_eq!(device.restart(&remote).await.list().len(), 0);
}

#[tokio::test]
async fn test_subscribers_see_changes_in_order() {
    let device = Device::new(&remote());
    let cancel = CancellationToken::new();
    let seen: Arc<Mutex<Vec<(u8, ContextEvent)>>> = Arc::default();
    for tag in [1u8, 2] {
        let seen = seen.clone();
        device
            .context
            .subscribe(move |event| seen.lock().unwrap().push((tag, *event)));
    }
    let start = device.context.revision();

    let local_id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("x"), &cancel)
        .await
        .unwrap();
    let SyncOutcome::Created { id } = device.context.sync(local_id, &cancel).await.unwrap() else {
        panic!("first sync should create the passfile");
    };

    let rekeyed = ContextEvent::Rekeyed {
        old: local_id,
        new: id,
    };
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (1, ContextEvent::Changed(local_id)),
            (2, ContextEvent::Changed(local_id)),
            (1, rekeyed),
            (2, rekeyed),
        ]
    );
    assert_eq!(device.context.revision(), start + 2);
}

#[tokio::test]
async fn test_export_is_plain_and_needs_unlock() {
    let device = Device::new(&remote());
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Notes", None, PASSPHRASE.into(), note("plain text"), &cancel)
        .await
        .unwrap();
    device.context.lock_all();
    device.prompt.push(PASSPHRASE);

    let exported = device
        .context
        .export::<TxtSection>(id, true, &cancel)
        .await
        .unwrap();

    let text = String::from_utf8(exported).unwrap();
    assert!(text.contains("plain text"));
    assert!(text.contains('\n'));
    assert_eq!(device.prompt.asked(), 1);
}
