//! Output formatting helpers for the CLI.

use passfile_core::model::ErrorKind;
use passfile_core::{PassFile, PassFileState, PwdSection, TxtSection};

use crate::helpers::mask;

pub fn state_label(state: PassFileState) -> String {
    match state {
        PassFileState::Clean => "synced".to_string(),
        PassFileState::LocallyModified => "modified".to_string(),
        PassFileState::NeedsMerge => "needs merge".to_string(),
        PassFileState::Merged => "merged, not uploaded".to_string(),
        PassFileState::Error(kind) => format!("error ({})", failed_step(kind)),
    }
}

fn failed_step(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Downloading => "downloading",
        ErrorKind::Uploading => "uploading",
        ErrorKind::RemoteDeleting => "remote delete",
        ErrorKind::Other => "other",
    }
}

/// Convert a passfile's metadata to JSON for output.
pub fn passfile_json(passfile: &PassFile) -> serde_json::Value {
    serde_json::json!({
        "id": passfile.id,
        "type": passfile.passfile_type,
        "name": passfile.name,
        "color": passfile.color,
        "version": passfile.version,
        "state": state_label(passfile.state()),
        "created_on": passfile.created_on,
        "info_changed_on": passfile.info_changed_on,
        "version_changed_on": passfile.version_changed_on,
        "deleted_on": passfile.local_deleted_on,
    })
}

/// One line per passfile: id, type, name, state.
pub fn print_listing(passfiles: &[PassFile]) {
    for passfile in passfiles {
        println!(
            "{:>6}  {}  {}  [{}]",
            passfile.id,
            passfile.passfile_type,
            passfile.name,
            state_label(passfile.state())
        );
    }
}

pub fn print_header(passfile: &PassFile) {
    println!("ID: {}", passfile.id);
    println!("Name: {}", passfile.name);
    if let Some(color) = &passfile.color {
        println!("Color: {}", color);
    }
    println!("Type: {} (v{})", passfile.passfile_type, passfile.version);
    println!("State: {}", state_label(passfile.state()));
    println!("Changed: {}", passfile.version_changed_on);
    println!();
}

pub fn print_pwd_sections(sections: &[PwdSection], reveal: bool) {
    for section in sections {
        println!("[{}]", section.name);
        if !section.website_url.is_empty() {
            println!("  url: {}", section.website_url);
        }
        for item in &section.items {
            let password = if reveal {
                item.password.clone()
            } else {
                mask(&item.password)
            };
            println!("  - {} / {}", item.usernames.join(", "), password);
            if !item.remark.is_empty() {
                println!("    {}", item.remark);
            }
        }
    }
}

pub fn print_txt_sections(sections: &[TxtSection]) {
    for section in sections {
        println!("[{}]", section.name);
        println!("{}", section.content);
    }
}
